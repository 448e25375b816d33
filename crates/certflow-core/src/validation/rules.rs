//! Field rule evaluators
//!
//! Every evaluator receives the submitted field map and the instance's
//! accumulated data as context, and returns its failures. An empty list
//! means the rule passed.

use regex::Regex;
use serde_json::Value;

use super::{rule_ids, RuleFailure, RuleViolation, ValidationReport};
use crate::types::{as_list, is_blank, non_blank, parse_decimal, value_to_string, FieldMap, FileValue};

/// A configured field rule
#[derive(Debug, Clone)]
pub enum Rule {
    /// Field must be present and non-blank
    Required {
        /// Field key
        field: String,
        /// Label used in messages
        label: String,
    },

    /// Present values must parse as a finite decimal within the bounds
    NumericRange {
        /// Field key
        field: String,
        /// Label used in messages
        label: String,
        /// Inclusive lower bound
        min: Option<f64>,
        /// Inclusive upper bound
        max: Option<f64>,
        /// Only evaluate when this field has a value
        depends_on: Option<String>,
    },

    /// Present values must match the expression
    Pattern {
        /// Field key
        field: String,
        /// Label used in messages
        label: String,
        /// Compiled expression
        regex: Regex,
        /// Message overriding the default one
        message: Option<String>,
    },

    /// Uploaded file metadata checks
    FileUpload {
        /// Field key
        field: String,
        /// Label used in messages
        label: String,
        /// Normalised allowed extensions; empty allows everything
        accept: Vec<String>,
        /// Per-file size limit in bytes
        max_file_size: Option<u64>,
        /// Whether more than one file is allowed
        multiple: bool,
        /// Upper bound on the file count
        max_files: Option<usize>,
    },

    /// Table must have enough rows
    MinTableEntries {
        /// Field key
        field: String,
        /// Label used in messages
        label: String,
        /// Minimum row count
        min_rows: usize,
    },

    /// Targets become required when the dependent field holds a trigger value
    RequiredIf {
        /// Field whose value is checked
        dependent_field: String,
        /// Trigger values
        values: Vec<String>,
        /// `(key, label)` of each target field
        targets: Vec<(String, String)>,
    },

    /// Present values must be one of the options
    AllowedValues {
        /// Field key
        field: String,
        /// Label used in messages
        label: String,
        /// Allowed option values
        allowed: Vec<String>,
    },
}

impl Rule {
    /// Stable identifier reported in violations
    pub fn rule_id(&self) -> &'static str {
        match self {
            Rule::Required { .. } => rule_ids::REQUIRED,
            Rule::NumericRange { .. } => rule_ids::NUMERIC_RANGE,
            Rule::Pattern { .. } => rule_ids::PATTERN,
            Rule::FileUpload { .. } => rule_ids::FILE_UPLOAD,
            Rule::MinTableEntries { .. } => rule_ids::MIN_TABLE_ENTRIES,
            Rule::RequiredIf { .. } => rule_ids::REQUIRED_IF,
            Rule::AllowedValues { .. } => rule_ids::ALLOWED_VALUES,
        }
    }

    /// Evaluate the rule against a submission
    pub fn evaluate(&self, data: &FieldMap, context: &FieldMap) -> Vec<RuleFailure> {
        match self {
            Rule::Required { field, label } => check_required(data, field, label),
            Rule::NumericRange {
                field,
                label,
                min,
                max,
                depends_on,
            } => {
                if let Some(dependency) = depends_on {
                    if lookup(data, context, dependency).is_none() {
                        return Vec::new();
                    }
                }
                check_numeric_range(data, field, label, *min, *max)
            }
            Rule::Pattern {
                field,
                label,
                regex,
                message,
            } => check_pattern(data, field, label, regex, message.as_deref()),
            Rule::FileUpload {
                field,
                label,
                accept,
                max_file_size,
                multiple,
                max_files,
            } => check_files(data, field, label, accept, *max_file_size, *multiple, *max_files),
            Rule::MinTableEntries {
                field,
                label,
                min_rows,
            } => check_min_rows(data, field, label, *min_rows),
            Rule::RequiredIf {
                dependent_field,
                values,
                targets,
            } => check_required_if(data, context, dependent_field, values, targets),
            Rule::AllowedValues {
                field,
                label,
                allowed,
            } => check_allowed(data, field, label, allowed),
        }
    }
}

/// Run every rule and concatenate the failures in rule order
pub fn evaluate_rules(rules: &[Rule], data: &FieldMap, context: &FieldMap) -> ValidationReport {
    let mut report = ValidationReport::success();
    for rule in rules {
        let rule_id = rule.rule_id();
        report.extend(
            rule.evaluate(data, context)
                .into_iter()
                .map(|failure| RuleViolation::from_failure(rule_id, failure)),
        );
    }
    report
}

/// Normalise an extension to lowercase with a leading dot
pub fn normalize_extension(ext: &str) -> String {
    format!(".{}", ext.trim().trim_start_matches('.').to_lowercase())
}

// Submission first, then the accumulated instance data
fn lookup<'a>(data: &'a FieldMap, context: &'a FieldMap, key: &str) -> Option<&'a Value> {
    non_blank(data, key).or_else(|| non_blank(context, key))
}

fn check_required(data: &FieldMap, field: &str, label: &str) -> Vec<RuleFailure> {
    match data.get(field) {
        Some(value) if !is_blank(value) => Vec::new(),
        _ => vec![RuleFailure::new(field, format!("{} is required", label))],
    }
}

fn check_numeric_range(
    data: &FieldMap,
    field: &str,
    label: &str,
    min: Option<f64>,
    max: Option<f64>,
) -> Vec<RuleFailure> {
    let Some(value) = non_blank(data, field) else {
        return Vec::new();
    };

    let Some(number) = parse_decimal(value) else {
        return vec![RuleFailure::new(field, format!("{} must be a valid number", label))];
    };

    let mut failures = Vec::new();
    if let Some(min) = min {
        if number < min {
            failures.push(RuleFailure::new(field, format!("{} must be at least {}", label, min)));
        }
    }
    if let Some(max) = max {
        if number > max {
            failures.push(RuleFailure::new(field, format!("{} must be at most {}", label, max)));
        }
    }
    failures
}

fn check_pattern(
    data: &FieldMap,
    field: &str,
    label: &str,
    regex: &Regex,
    message: Option<&str>,
) -> Vec<RuleFailure> {
    let Some(value) = non_blank(data, field) else {
        return Vec::new();
    };
    let text = value_to_string(value);
    if regex.is_match(&text) {
        return Vec::new();
    }

    let message = message
        .map(str::to_string)
        .unwrap_or_else(|| format!("{} has an invalid format", label));
    vec![RuleFailure::new(field, message)]
}

fn check_files(
    data: &FieldMap,
    field: &str,
    label: &str,
    accept: &[String],
    max_file_size: Option<u64>,
    multiple: bool,
    max_files: Option<usize>,
) -> Vec<RuleFailure> {
    let Some(value) = non_blank(data, field) else {
        return Vec::new();
    };

    let Some(parsed) = FileValue::parse(value) else {
        return vec![RuleFailure::new(
            field,
            format!("{} must contain uploaded file metadata", label),
        )];
    };
    let files = parsed.files();

    let mut failures = Vec::new();
    if !multiple && files.len() > 1 {
        failures.push(RuleFailure::new(
            field,
            format!("{} accepts only one file, got {}", label, files.len()),
        ));
    }
    if let Some(max) = max_files {
        if files.len() > max {
            failures.push(RuleFailure::new(
                field,
                format!("{} accepts at most {} files, got {}", label, max, files.len()),
            ));
        }
    }

    for file in files {
        if let Some(max) = max_file_size {
            if file.size > max {
                failures.push(RuleFailure::new(
                    field,
                    format!(
                        "File {} is {} bytes, exceeding the limit of {} bytes",
                        file.name, file.size, max
                    ),
                ));
            }
        }

        if !accept.is_empty() {
            let allowed = file
                .normalized_extension()
                .map(|ext| accept.contains(&ext))
                .unwrap_or(false);
            if !allowed {
                failures.push(RuleFailure::new(
                    field,
                    format!(
                        "File {} has a disallowed type (allowed: {})",
                        file.name,
                        accept.join(", ")
                    ),
                ));
            }
        }
    }

    failures
}

fn check_min_rows(data: &FieldMap, field: &str, label: &str, min_rows: usize) -> Vec<RuleFailure> {
    let rows = data
        .get(field)
        .and_then(as_list)
        .map(|items| items.len())
        .unwrap_or(0);

    if rows < min_rows {
        vec![RuleFailure::new(
            field,
            format!("{} requires at least {} entries, got {}", label, min_rows, rows),
        )]
    } else {
        Vec::new()
    }
}

fn check_required_if(
    data: &FieldMap,
    context: &FieldMap,
    dependent_field: &str,
    values: &[String],
    targets: &[(String, String)],
) -> Vec<RuleFailure> {
    let Some(current) = lookup(data, context, dependent_field) else {
        return Vec::new();
    };
    let current = value_to_string(current);
    if !values.iter().any(|v| v == &current) {
        return Vec::new();
    }

    targets
        .iter()
        .filter(|(key, _)| non_blank(data, key).is_none())
        .map(|(key, label)| {
            RuleFailure::new(
                key.as_str(),
                format!("{} is required when {} is {}", label, dependent_field, current),
            )
        })
        .collect()
}

fn check_allowed(data: &FieldMap, field: &str, label: &str, allowed: &[String]) -> Vec<RuleFailure> {
    let Some(value) = non_blank(data, field) else {
        return Vec::new();
    };

    let submitted: Vec<String> = match value {
        Value::Array(items) => items.iter().map(value_to_string).collect(),
        other => vec![value_to_string(other)],
    };

    submitted
        .into_iter()
        .filter(|v| !allowed.contains(v))
        .map(|v| {
            RuleFailure::new(
                field,
                format!("{} has invalid value '{}' (allowed: {})", label, v, allowed.join(", ")),
            )
        })
        .collect()
}
