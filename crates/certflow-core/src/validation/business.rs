//! Step-specific business rules
//!
//! Business rules cover checks that do not derive from a single field
//! definition. They are registered per step id and run after the field
//! rules of that step.

use std::collections::HashMap;
use std::sync::Arc;

use super::{rule_ids, RuleFailure, RuleViolation};
use crate::config::WorkflowConfig;
use crate::types::{non_blank, parse_decimal, FieldMap, FileValue};

/// Inputs visible to a business rule
#[derive(Debug, Clone, Copy)]
pub struct BusinessRuleContext<'a> {
    /// Step being validated
    pub step_id: &'a str,

    /// Submitted form data
    pub form_data: &'a FieldMap,

    /// Instance data accumulated so far
    pub instance_data: &'a FieldMap,

    /// Decision attached to the submission
    pub decision: Option<&'a str>,
}

/// A predicate over a step submission
pub trait BusinessRule: Send + Sync {
    /// Identifier reported in violations
    fn id(&self) -> &str;

    /// Evaluate the rule, returning its failures
    fn evaluate(&self, ctx: &BusinessRuleContext<'_>) -> Vec<RuleFailure>;
}

/// Business rules keyed by step id
#[derive(Clone, Default)]
pub struct BusinessRuleRegistry {
    rules: HashMap<String, Vec<Arc<dyn BusinessRule>>>,
}

impl BusinessRuleRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in rules wired to the configured step ids
    pub fn with_defaults(config: &WorkflowConfig) -> Self {
        let mut registry = Self::new();
        registry.register(&config.document_upload_step, Arc::new(AtLeastOneDocument));
        registry.register(
            &config.final_approval_step,
            Arc::new(SafetyScoreThreshold::new(
                &config.safety_score_field,
                config.safety_score_threshold,
            )),
        );
        registry
    }

    /// Register `rule` for `step_id`
    pub fn register(&mut self, step_id: &str, rule: Arc<dyn BusinessRule>) {
        self.rules.entry(step_id.to_string()).or_default().push(rule);
    }

    /// Number of rules registered for `step_id`
    pub fn rule_count(&self, step_id: &str) -> usize {
        self.rules.get(step_id).map(Vec::len).unwrap_or(0)
    }

    /// Run every rule registered for the context's step
    pub fn evaluate(&self, ctx: &BusinessRuleContext<'_>) -> Vec<RuleViolation> {
        let Some(rules) = self.rules.get(ctx.step_id) else {
            return Vec::new();
        };

        rules
            .iter()
            .flat_map(|rule| {
                rule.evaluate(ctx)
                    .into_iter()
                    .map(move |failure| RuleViolation::from_failure(rule.id(), failure))
            })
            .collect()
    }
}

impl std::fmt::Debug for BusinessRuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut steps: Vec<_> = self.rules.iter().map(|(k, v)| (k.as_str(), v.len())).collect();
        steps.sort();
        f.debug_struct("BusinessRuleRegistry").field("rules", &steps).finish()
    }
}

/// At least one submitted field must carry an uploaded file
#[derive(Debug, Clone, Copy, Default)]
pub struct AtLeastOneDocument;

impl BusinessRule for AtLeastOneDocument {
    fn id(&self) -> &str {
        rule_ids::AT_LEAST_ONE_DOCUMENT
    }

    fn evaluate(&self, ctx: &BusinessRuleContext<'_>) -> Vec<RuleFailure> {
        let has_document = ctx.form_data.values().any(|value| {
            FileValue::parse(value)
                .map(|files| !files.files().is_empty())
                .unwrap_or(false)
        });

        if has_document {
            Vec::new()
        } else {
            vec![RuleFailure::new(
                "documents",
                "At least one document must be uploaded",
            )]
        }
    }
}

/// Approval is blocked while the safety score is below a threshold.
///
/// The score is read from the submission first, then from the instance data.
#[derive(Debug, Clone)]
pub struct SafetyScoreThreshold {
    field: String,
    threshold: f64,
}

impl SafetyScoreThreshold {
    /// Guard approvals on `field` against `threshold`
    pub fn new(field: &str, threshold: f64) -> Self {
        Self {
            field: field.to_string(),
            threshold,
        }
    }

    fn is_approval(decision: &str) -> bool {
        matches!(decision.trim().to_lowercase().as_str(), "approve" | "approved")
    }
}

impl BusinessRule for SafetyScoreThreshold {
    fn id(&self) -> &str {
        rule_ids::SAFETY_SCORE_THRESHOLD
    }

    fn evaluate(&self, ctx: &BusinessRuleContext<'_>) -> Vec<RuleFailure> {
        if !ctx.decision.map(Self::is_approval).unwrap_or(false) {
            return Vec::new();
        }

        // A score that was never recorded does not block approval
        let score = non_blank(ctx.form_data, &self.field)
            .or_else(|| non_blank(ctx.instance_data, &self.field))
            .and_then(parse_decimal);
        match score {
            Some(score) if score < self.threshold => vec![RuleFailure::new(
                self.field.as_str(),
                format!(
                    "Cannot approve: safety score {} is below the minimum of {}",
                    score, self.threshold
                ),
            )],
            _ => Vec::new(),
        }
    }
}
