//! Configuration for the workflow core
//!
//! Values default to the behaviour of the certificate workflows shipped
//! with the system and can be overridden from environment variables.

use serde::{Deserialize, Serialize};
use std::env;
use tracing::{info, warn};

use crate::CoreError;

/// How a submitted step id is matched against a definition's step references
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepMatching {
    /// Only the step reference id matches
    #[default]
    Exact,

    /// Also match a reference whose `step_ref` path equals or ends with the id
    LegacySuffix,
}

/// Workflow core configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowConfig {
    /// Step reference matching mode
    #[serde(default)]
    pub step_matching: StepMatching,

    /// SLA applied when a definition declares none, in hours
    #[serde(default)]
    pub default_sla_hours: Option<i64>,

    /// Minimum safety score required to approve
    #[serde(default = "default_safety_score_threshold")]
    pub safety_score_threshold: f64,

    /// Instance data key holding the safety score
    #[serde(default = "default_safety_score_field")]
    pub safety_score_field: String,

    /// Step id that must carry at least one document
    #[serde(default = "default_document_upload_step")]
    pub document_upload_step: String,

    /// Step id guarded by the safety score threshold
    #[serde(default = "default_final_approval_step")]
    pub final_approval_step: String,
}

fn default_safety_score_threshold() -> f64 {
    60.0
}

fn default_safety_score_field() -> String {
    "safety_score".to_string()
}

fn default_document_upload_step() -> String {
    "document_upload".to_string()
}

fn default_final_approval_step() -> String {
    "final_approval".to_string()
}

impl WorkflowConfig {
    /// Load configuration from environment variables
    pub fn load() -> Result<Self, CoreError> {
        Self::load_from(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable lookup
    pub fn load_from<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Start with defaults
        let mut config = Self::default();

        if let Some(matching) = lookup("CERTFLOW_STEP_MATCHING") {
            match matching.trim().to_lowercase().as_str() {
                "exact" => config.step_matching = StepMatching::Exact,
                "legacy_suffix" | "legacy" => config.step_matching = StepMatching::LegacySuffix,
                _ => warn!("Invalid CERTFLOW_STEP_MATCHING value: {}, using exact", matching),
            }
        }

        if let Some(hours) = lookup("CERTFLOW_DEFAULT_SLA_HOURS") {
            if let Ok(hours) = hours.trim().parse::<i64>() {
                config.default_sla_hours = Some(hours);
            } else {
                warn!("Invalid CERTFLOW_DEFAULT_SLA_HOURS value: {}", hours);
            }
        }

        if let Some(threshold) = lookup("CERTFLOW_SAFETY_SCORE_THRESHOLD") {
            match threshold.trim().parse::<f64>() {
                Ok(value) if value.is_finite() => config.safety_score_threshold = value,
                _ => warn!("Invalid CERTFLOW_SAFETY_SCORE_THRESHOLD value: {}", threshold),
            }
        }

        if let Some(field) = lookup("CERTFLOW_SAFETY_SCORE_FIELD") {
            config.safety_score_field = field;
        }

        if let Some(step) = lookup("CERTFLOW_DOCUMENT_UPLOAD_STEP") {
            config.document_upload_step = step;
        }

        if let Some(step) = lookup("CERTFLOW_FINAL_APPROVAL_STEP") {
            config.final_approval_step = step;
        }

        config.validate()?;

        info!(
            step_matching = ?config.step_matching,
            safety_score_threshold = config.safety_score_threshold,
            "Loaded workflow configuration"
        );
        Ok(config)
    }

    /// Check semantic constraints
    pub fn validate(&self) -> Result<(), CoreError> {
        if let Some(hours) = self.default_sla_hours {
            if hours <= 0 {
                return Err(CoreError::ConfigurationError(format!(
                    "Default SLA must be positive, got {} hours",
                    hours
                )));
            }
        }

        if self.safety_score_threshold < 0.0 {
            return Err(CoreError::ConfigurationError(format!(
                "Safety score threshold must not be negative, got {}",
                self.safety_score_threshold
            )));
        }

        for (name, value) in [
            ("safety score field", &self.safety_score_field),
            ("document upload step", &self.document_upload_step),
            ("final approval step", &self.final_approval_step),
        ] {
            if value.trim().is_empty() {
                return Err(CoreError::ConfigurationError(format!("The {} must not be empty", name)));
            }
        }

        Ok(())
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            step_matching: StepMatching::default(),
            default_sla_hours: None,
            safety_score_threshold: default_safety_score_threshold(),
            safety_score_field: default_safety_score_field(),
            document_upload_step: default_document_upload_step(),
            final_approval_step: default_final_approval_step(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<WorkflowConfig, CoreError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        WorkflowConfig::load_from(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config, WorkflowConfig::default());
        assert_eq!(config.step_matching, StepMatching::Exact);
        assert_eq!(config.safety_score_threshold, 60.0);
        assert_eq!(config.document_upload_step, "document_upload");
        assert_eq!(config.final_approval_step, "final_approval");
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("CERTFLOW_STEP_MATCHING", "legacy_suffix"),
            ("CERTFLOW_DEFAULT_SLA_HOURS", "48"),
            ("CERTFLOW_SAFETY_SCORE_THRESHOLD", "75.5"),
            ("CERTFLOW_SAFETY_SCORE_FIELD", "score"),
            ("CERTFLOW_FINAL_APPROVAL_STEP", "approval"),
        ])
        .unwrap();

        assert_eq!(config.step_matching, StepMatching::LegacySuffix);
        assert_eq!(config.default_sla_hours, Some(48));
        assert_eq!(config.safety_score_threshold, 75.5);
        assert_eq!(config.safety_score_field, "score");
        assert_eq!(config.final_approval_step, "approval");
    }

    #[test]
    fn test_invalid_values_are_ignored() {
        let config = load(&[
            ("CERTFLOW_STEP_MATCHING", "fuzzy"),
            ("CERTFLOW_DEFAULT_SLA_HOURS", "two days"),
            ("CERTFLOW_SAFETY_SCORE_THRESHOLD", "NaN"),
        ])
        .unwrap();

        assert_eq!(config, WorkflowConfig::default());
    }

    #[test]
    fn test_semantic_errors_rejected() {
        assert!(matches!(
            load(&[("CERTFLOW_DEFAULT_SLA_HOURS", "0")]),
            Err(CoreError::ConfigurationError(_))
        ));
        assert!(matches!(
            load(&[("CERTFLOW_SAFETY_SCORE_THRESHOLD", "-1")]),
            Err(CoreError::ConfigurationError(_))
        ));
        assert!(matches!(
            load(&[("CERTFLOW_DOCUMENT_UPLOAD_STEP", " ")]),
            Err(CoreError::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: WorkflowConfig =
            serde_json::from_str(r#"{"step_matching": "legacy_suffix"}"#).unwrap();
        assert_eq!(config.step_matching, StepMatching::LegacySuffix);
        assert_eq!(config.safety_score_field, "safety_score");
    }
}
