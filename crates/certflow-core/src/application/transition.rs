use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::StepMatching;
use crate::domain::repository::DefinitionProvider;
use crate::domain::workflow_definition::{StepReference, WorkflowDefinition, WorkflowStep};
use crate::domain::workflow_instance::{WorkflowInstance, COMPLETED_STEP};
use crate::CoreError;

/// Outcome of resolving the successor of a step
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Move on to `step_id`, handled by `actor`
    Advance {
        /// Next step id
        step_id: String,
        /// Actor of the next step
        actor: Option<String>,
    },

    /// Reached the completed sentinel
    Complete,
}

impl Transition {
    /// Apply the transition to an instance
    pub fn apply_to(&self, instance: &mut WorkflowInstance) -> Result<(), CoreError> {
        match self {
            Transition::Advance { step_id, actor } => instance.advance_to(step_id, actor.clone()),
            Transition::Complete => instance.complete(),
        }
    }

    /// Whether this transition ends the workflow
    pub fn is_terminal(&self) -> bool {
        matches!(self, Transition::Complete)
    }
}

/// Resolves step references and successor steps of a definition
#[derive(Clone)]
pub struct StepTransitionResolver {
    definitions: Arc<dyn DefinitionProvider>,
    matching: StepMatching,
}

impl StepTransitionResolver {
    /// Create a resolver backed by `definitions`
    pub fn new(definitions: Arc<dyn DefinitionProvider>, matching: StepMatching) -> Self {
        Self {
            definitions,
            matching,
        }
    }

    /// Find the step reference matching `step_id`.
    ///
    /// An exact id match always wins. In legacy mode a reference whose
    /// `step_ref` path equals or ends with `step_id` is accepted as well.
    pub fn find_reference<'a>(
        &self,
        definition: &'a WorkflowDefinition,
        step_id: &str,
    ) -> Option<&'a StepReference> {
        if let Some(reference) = definition.steps.iter().find(|s| s.id == step_id) {
            return Some(reference);
        }

        match self.matching {
            StepMatching::Exact => None,
            // Every path ends with the empty string
            StepMatching::LegacySuffix if step_id.trim().is_empty() => None,
            StepMatching::LegacySuffix => {
                let found = definition
                    .steps
                    .iter()
                    .find(|s| s.step_ref == step_id || s.step_ref.ends_with(step_id));
                if let Some(reference) = found {
                    warn!(
                        definition_id = %definition.id,
                        step_id = %step_id,
                        matched = %reference.id,
                        "Step matched by legacy step_ref suffix"
                    );
                }
                found
            }
        }
    }

    /// Load the field configuration of the step `step_id`
    pub async fn load_step(
        &self,
        definition: &WorkflowDefinition,
        step_id: &str,
    ) -> Result<WorkflowStep, CoreError> {
        let reference = self.find_reference(definition, step_id).ok_or_else(|| {
            CoreError::StepNotFound(format!("{} in definition {}", step_id, definition.id))
        })?;
        self.load_referenced(reference).await
    }

    /// Resolve what follows `step_id`
    pub async fn resolve(
        &self,
        definition: &WorkflowDefinition,
        step_id: &str,
    ) -> Result<Transition, CoreError> {
        let reference = self.find_reference(definition, step_id).ok_or_else(|| {
            CoreError::StepNotFound(format!("{} in definition {}", step_id, definition.id))
        })?;

        if reference.next_step == COMPLETED_STEP {
            debug!(definition_id = %definition.id, step_id = %reference.id, "Step completes the workflow");
            return Ok(Transition::Complete);
        }

        let next = definition
            .steps
            .iter()
            .find(|s| s.id == reference.next_step)
            .ok_or_else(|| {
                CoreError::StepNotFound(format!(
                    "{} (next step of {}) in definition {}",
                    reference.next_step, reference.id, definition.id
                ))
            })?;
        let next_step = self.load_referenced(next).await?;

        debug!(
            definition_id = %definition.id,
            from = %reference.id,
            to = %next.id,
            "Resolved step transition"
        );
        Ok(Transition::Advance {
            step_id: next.id.clone(),
            actor: next_step.actor,
        })
    }

    async fn load_referenced(&self, reference: &StepReference) -> Result<WorkflowStep, CoreError> {
        self.definitions
            .get_step(&reference.step_ref)
            .await?
            .ok_or_else(|| {
                CoreError::StepNotFound(format!("{} ({})", reference.id, reference.step_ref))
            })
    }
}
