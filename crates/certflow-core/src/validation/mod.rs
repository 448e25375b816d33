//! Step validation
//!
//! Field rules are built from a step's field definitions by the
//! [`factory::RuleFactory`], evaluated independently, and their failures
//! concatenated into a [`ValidationReport`]. Step-specific business rules
//! from the [`business::BusinessRuleRegistry`] run after the field rules.

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod business;
pub mod factory;
pub mod rules;

pub use business::{BusinessRule, BusinessRuleContext, BusinessRuleRegistry};
pub use factory::RuleFactory;
pub use rules::Rule;

/// Stable rule identifiers
pub mod rule_ids {
    /// Field must be present and non-blank
    pub const REQUIRED: &str = "required";

    /// Numeric value within bounds
    pub const NUMERIC_RANGE: &str = "numeric_range";

    /// Value matches a regular expression
    pub const PATTERN: &str = "pattern";

    /// Uploaded file count, size and extension checks
    pub const FILE_UPLOAD: &str = "file_upload";

    /// Table has enough rows
    pub const MIN_TABLE_ENTRIES: &str = "min_table_entries";

    /// Conditional requirement
    pub const REQUIRED_IF: &str = "required_if";

    /// Value is one of the declared options
    pub const ALLOWED_VALUES: &str = "allowed_values";

    /// At least one document uploaded
    pub const AT_LEAST_ONE_DOCUMENT: &str = "at_least_one_document";

    /// Approval blocked below the safety score threshold
    pub const SAFETY_SCORE_THRESHOLD: &str = "safety_score_threshold";
}

/// Failure reported by a single evaluator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleFailure {
    /// Field the failure refers to
    pub field: String,

    /// Human-readable message
    pub message: String,
}

impl RuleFailure {
    /// Create a failure for `field`
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// A failure tagged with the rule that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleViolation {
    /// Identifier of the failing rule
    pub rule_id: String,

    /// Field the violation refers to
    pub field: String,

    /// Human-readable message
    pub message: String,
}

impl RuleViolation {
    /// Create a violation
    pub fn new(rule_id: &str, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            field: field.into(),
            message: message.into(),
        }
    }

    /// Tag an evaluator failure with its rule id
    pub fn from_failure(rule_id: &str, failure: RuleFailure) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            field: failure.field,
            message: failure.message,
        }
    }
}

impl fmt::Display for RuleViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} (field: {})", self.rule_id, self.message, self.field)
    }
}

/// Aggregate outcome of validating one step submission
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    violations: Vec<RuleViolation>,
}

impl ValidationReport {
    /// A report with no violations
    pub fn success() -> Self {
        Self::default()
    }

    /// Build a report from collected violations
    pub fn from_violations(violations: Vec<RuleViolation>) -> Self {
        Self { violations }
    }

    /// Whether the submission passed every rule
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// Violations in evaluation order
    pub fn violations(&self) -> &[RuleViolation] {
        &self.violations
    }

    /// Append violations produced by another evaluator
    pub fn extend(&mut self, violations: impl IntoIterator<Item = RuleViolation>) {
        self.violations.extend(violations);
    }

    /// Violations raised by a given rule
    pub fn by_rule<'a>(&'a self, rule_id: &'a str) -> impl Iterator<Item = &'a RuleViolation> + 'a {
        self.violations.iter().filter(move |v| v.rule_id == rule_id)
    }

    /// Violations referring to a given field
    pub fn for_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a RuleViolation> + 'a {
        self.violations.iter().filter(move |v| v.field == field)
    }

    /// Consume the report
    pub fn into_violations(self) -> Vec<RuleViolation> {
        self.violations
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.violations.is_empty() {
            return write!(f, "Validation passed");
        }

        write!(f, "Validation failed ({} issues):", self.violations.len())?;
        for (i, violation) in self.violations.iter().enumerate() {
            write!(f, "\n  {}. {}", i + 1, violation)?;
        }
        Ok(())
    }
}
