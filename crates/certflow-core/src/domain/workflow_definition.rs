use crate::domain::workflow_instance::{DefinitionId, COMPLETED_STEP};
use crate::CoreError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Represents a loaded certification workflow definition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDefinition {
    /// ID of the certification type
    pub id: DefinitionId,

    /// Human-readable name
    pub name: String,

    /// The definition version
    #[serde(default)]
    pub version: String,

    /// Ordered step references; the first one is where instances start
    pub steps: Vec<StepReference>,

    /// Advisory completion deadline, in hours from creation
    #[serde(default)]
    pub sla_hours: Option<i64>,
}

/// Pointer from a definition to a step's field configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StepReference {
    /// ID of the step
    pub id: String,

    /// Path of the step configuration (e.g. `steps/boiler/document_upload`)
    pub step_ref: String,

    /// Successor step id, or `"completed"`
    pub next_step: String,
}

/// Definition-side description of a single step
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStep {
    /// ID of the step
    pub id: String,

    /// Title shown to the user
    #[serde(default)]
    pub title: String,

    /// Role responsible for completing the step
    #[serde(default)]
    pub actor: Option<String>,

    /// Form fields collected by this step
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

/// Field type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Single-line text
    Text,
    /// Multi-line text
    Textarea,
    /// E-mail address
    Email,
    /// Decimal number
    Number,
    /// Calendar date
    Date,
    /// Drop-down selection
    Select,
    /// Radio group
    Radio,
    /// Checkbox
    Checkbox,
    /// File upload
    File,
    /// Repeating rows
    Table,
}

/// One selectable option of a select/radio field
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldOption {
    /// Submitted value
    pub value: String,

    /// Display label
    #[serde(default)]
    pub label: String,
}

/// Conditional requirement: the field becomes required when `field`
/// holds one of `values`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequiredIfConstraint {
    /// Field whose value triggers the requirement
    pub field: String,

    /// Trigger values
    pub values: Vec<String>,
}

/// A form field with its declared constraints
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    /// Key under which the value is submitted
    pub key: String,

    /// Type tag
    #[serde(rename = "type")]
    pub field_type: FieldType,

    /// Display label, also used in messages
    #[serde(default)]
    pub label: String,

    /// Field must be filled in
    #[serde(default)]
    pub required: bool,

    /// Inclusive lower bound for numbers
    #[serde(default)]
    pub min: Option<f64>,

    /// Inclusive upper bound for numbers
    #[serde(default)]
    pub max: Option<f64>,

    /// Regular expression the value must match
    #[serde(default)]
    pub pattern: Option<String>,

    /// Message reported when the pattern does not match
    #[serde(default)]
    pub pattern_message: Option<String>,

    /// Allowed file extensions
    #[serde(default)]
    pub accept: Vec<String>,

    /// Per-file size limit in bytes
    #[serde(default)]
    pub max_file_size: Option<u64>,

    /// Whether several files may be uploaded
    #[serde(default)]
    pub multiple: bool,

    /// Upper bound on the number of files
    #[serde(default)]
    pub max_files: Option<usize>,

    /// Enum options for select/radio fields
    #[serde(default)]
    pub options: Vec<FieldOption>,

    /// Minimum number of rows for table fields
    #[serde(default)]
    pub min_rows: Option<usize>,

    /// Numeric checks only run when this field has a value
    #[serde(default)]
    pub depends_on: Option<String>,

    /// Conditional requirement
    #[serde(default)]
    pub required_if: Option<RequiredIfConstraint>,
}

impl FieldDefinition {
    /// Create a field with no constraints
    pub fn new(key: &str, field_type: FieldType, label: &str) -> Self {
        Self {
            key: key.to_string(),
            field_type,
            label: label.to_string(),
            required: false,
            min: None,
            max: None,
            pattern: None,
            pattern_message: None,
            accept: Vec::new(),
            max_file_size: None,
            multiple: false,
            max_files: None,
            options: Vec::new(),
            min_rows: None,
            depends_on: None,
            required_if: None,
        }
    }

    /// Label used in messages, falling back to the key
    pub fn display_name(&self) -> &str {
        if self.label.trim().is_empty() {
            &self.key
        } else {
            &self.label
        }
    }

    /// Mark the field as required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Set numeric bounds
    pub fn with_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    /// Set a pattern constraint
    pub fn with_pattern(mut self, pattern: &str) -> Self {
        self.pattern = Some(pattern.to_string());
        self
    }

    /// Set file constraints
    pub fn with_files(mut self, accept: &[&str], max_file_size: Option<u64>, multiple: bool) -> Self {
        self.accept = accept.iter().map(|a| a.to_string()).collect();
        self.max_file_size = max_file_size;
        self.multiple = multiple;
        self
    }

    /// Set the minimum row count of a table field
    pub fn with_min_rows(mut self, min_rows: usize) -> Self {
        self.min_rows = Some(min_rows);
        self
    }

    /// Set enum options
    pub fn with_options(mut self, values: &[&str]) -> Self {
        self.options = values
            .iter()
            .map(|v| FieldOption {
                value: v.to_string(),
                label: v.to_string(),
            })
            .collect();
        self
    }

    /// Make the field required when `field` holds one of `values`
    pub fn required_if(mut self, field: &str, values: &[&str]) -> Self {
        self.required_if = Some(RequiredIfConstraint {
            field: field.to_string(),
            values: values.iter().map(|v| v.to_string()).collect(),
        });
        self
    }
}

impl WorkflowDefinition {
    /// The step every new instance starts at
    pub fn first_step(&self) -> Option<&StepReference> {
        self.steps.first()
    }

    /// Validate the workflow definition
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.steps.is_empty() {
            return Err(CoreError::ConfigurationError(format!(
                "Workflow definition {} must have at least one step",
                self.id.0
            )));
        }

        if let Some(hours) = self.sla_hours {
            if hours <= 0 {
                return Err(CoreError::ConfigurationError(format!(
                    "Workflow definition {} has a non-positive SLA of {} hours",
                    self.id.0, hours
                )));
            }
        }

        let mut step_ids = HashSet::new();
        for step in &self.steps {
            if step.id == COMPLETED_STEP {
                return Err(CoreError::ConfigurationError(format!(
                    "Step id '{}' is reserved",
                    COMPLETED_STEP
                )));
            }
            if !step_ids.insert(step.id.as_str()) {
                return Err(CoreError::ConfigurationError(format!(
                    "Duplicate step ID: {}",
                    step.id
                )));
            }
        }

        for step in &self.steps {
            if step.next_step != COMPLETED_STEP && !step_ids.contains(step.next_step.as_str()) {
                return Err(CoreError::ConfigurationError(format!(
                    "Step {} references non-existent next step: {}",
                    step.id, step.next_step
                )));
            }
        }

        Ok(())
    }
}
