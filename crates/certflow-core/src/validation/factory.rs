use regex::Regex;
use std::collections::HashSet;
use tracing::debug;

use super::rules::{normalize_extension, Rule};
use crate::domain::workflow_definition::{FieldDefinition, FieldType, WorkflowStep};
use crate::CoreError;

/// Builds field rules from a step's field definitions
pub struct RuleFactory;

impl RuleFactory {
    /// Build the rule list for `step`.
    ///
    /// Rules are emitted per field in declaration order. Fails with
    /// [`CoreError::MalformedStep`] when a field definition cannot be
    /// turned into a rule.
    pub fn build(step: &WorkflowStep) -> Result<Vec<Rule>, CoreError> {
        let mut seen = HashSet::new();
        let mut rules = Vec::new();

        for field in &step.fields {
            if !seen.insert(field.key.as_str()) {
                return Err(malformed(step, format!("duplicate field key '{}'", field.key)));
            }
            rules.extend(Self::rules_for_field(step, field)?);
        }

        debug!(step_id = %step.id, rule_count = rules.len(), "Built validation rules");
        Ok(rules)
    }

    fn rules_for_field(step: &WorkflowStep, field: &FieldDefinition) -> Result<Vec<Rule>, CoreError> {
        let key = field.key.clone();
        let label = field.display_name().to_string();
        let mut rules = Vec::new();

        if field.required {
            rules.push(Rule::Required {
                field: key.clone(),
                label: label.clone(),
            });
        }

        if field.field_type == FieldType::Number && (field.min.is_some() || field.max.is_some()) {
            if let (Some(min), Some(max)) = (field.min, field.max) {
                if min > max {
                    return Err(malformed(
                        step,
                        format!("field '{}' has min {} greater than max {}", key, min, max),
                    ));
                }
            }
            rules.push(Rule::NumericRange {
                field: key.clone(),
                label: label.clone(),
                min: field.min,
                max: field.max,
                depends_on: field.depends_on.clone(),
            });
        }

        if let Some(pattern) = field.pattern.as_deref().filter(|p| !p.is_empty()) {
            let regex = Regex::new(pattern).map_err(|e| {
                malformed(step, format!("field '{}' has an invalid pattern: {}", key, e))
            })?;
            rules.push(Rule::Pattern {
                field: key.clone(),
                label: label.clone(),
                regex,
                message: field.pattern_message.clone(),
            });
        }

        if field.field_type == FieldType::File {
            rules.push(Rule::FileUpload {
                field: key.clone(),
                label: label.clone(),
                accept: field
                    .accept
                    .iter()
                    .filter(|ext| !ext.trim().is_empty())
                    .map(|ext| normalize_extension(ext))
                    .collect(),
                max_file_size: field.max_file_size,
                multiple: field.multiple,
                max_files: field.max_files,
            });
        }

        if field.field_type == FieldType::Table {
            if let Some(min_rows) = field.min_rows {
                rules.push(Rule::MinTableEntries {
                    field: key.clone(),
                    label: label.clone(),
                    min_rows,
                });
            }
        }

        if let Some(constraint) = &field.required_if {
            if constraint.values.is_empty() {
                return Err(malformed(
                    step,
                    format!("field '{}' has a requiredIf without trigger values", key),
                ));
            }
            rules.push(Rule::RequiredIf {
                dependent_field: constraint.field.clone(),
                values: constraint.values.clone(),
                targets: vec![(key.clone(), label.clone())],
            });
        }

        if matches!(field.field_type, FieldType::Select | FieldType::Radio) && !field.options.is_empty() {
            rules.push(Rule::AllowedValues {
                field: key,
                label,
                allowed: field.options.iter().map(|o| o.value.clone()).collect(),
            });
        }

        Ok(rules)
    }
}

fn malformed(step: &WorkflowStep, detail: String) -> CoreError {
    CoreError::MalformedStep(format!("step {}: {}", step.id, detail))
}
