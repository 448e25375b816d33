use crate::{
    application::transition::StepTransitionResolver,
    config::WorkflowConfig,
    domain::change_tracker::FieldChangeTracker,
    domain::events::DomainEvent,
    domain::repository::{DefinitionProvider, WorkflowInstanceRepository},
    domain::workflow_definition::WorkflowDefinition,
    domain::workflow_instance::{
        DefinitionId, Priority, WorkflowInstance, WorkflowInstanceId, WorkflowStatus,
    },
    types::FieldMap,
    validation::{rules::evaluate_rules, BusinessRuleContext, BusinessRuleRegistry, RuleFactory, ValidationReport},
    CoreError,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Form field carrying an inline decision
const DECISION_FIELD: &str = "decision";

/// Data submitted for one step
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StepSubmission {
    /// Step the data belongs to
    pub step_id: String,

    /// Submitted form data
    #[serde(default)]
    pub data: FieldMap,

    /// Who submits
    pub submitted_by: String,

    /// Optional decision, e.g. `approve`
    #[serde(default)]
    pub decision: Option<String>,

    /// Optional free-text comment
    #[serde(default)]
    pub comments: Option<String>,
}

impl StepSubmission {
    /// Create a submission without decision or comments
    pub fn new(step_id: &str, data: FieldMap, submitted_by: &str) -> Self {
        Self {
            step_id: step_id.to_string(),
            data,
            submitted_by: submitted_by.to_string(),
            decision: None,
            comments: None,
        }
    }

    /// Attach a decision
    pub fn with_decision(mut self, decision: &str) -> Self {
        self.decision = Some(decision.to_string());
        self
    }

    /// Attach a comment
    pub fn with_comments(mut self, comments: &str) -> Self {
        self.comments = Some(comments.to_string());
        self
    }

    /// The explicit decision, falling back to a `decision` form field
    pub fn effective_decision(&self) -> Option<&str> {
        self.decision.as_deref().or_else(|| form_decision(&self.data))
    }
}

fn form_decision(data: &FieldMap) -> Option<&str> {
    data.get(DECISION_FIELD).and_then(Value::as_str)
}

/// Handler for domain events
#[async_trait]
pub trait DomainEventHandler: Send + Sync {
    /// Handle a domain event
    async fn handle_event(&self, event: Box<dyn DomainEvent>) -> Result<(), CoreError>;
}

/// Event handler that writes every event to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventHandler;

#[async_trait]
impl DomainEventHandler for TracingEventHandler {
    async fn handle_event(&self, event: Box<dyn DomainEvent>) -> Result<(), CoreError> {
        info!(
            event_type = event.event_type(),
            instance_id = %event.workflow_instance_id(),
            timestamp = %event.timestamp(),
            "Workflow event"
        );
        Ok(())
    }
}

/// Result of validating a submission against a loaded instance
struct ValidatedStep {
    definition: WorkflowDefinition,
    step_id: String,
    report: ValidationReport,
}

/// Orchestrates instance creation, step validation and step submission
pub struct WorkflowService {
    /// Repository for workflow instances
    instances: Arc<dyn WorkflowInstanceRepository>,

    /// Source of definitions and step configurations
    definitions: Arc<dyn DefinitionProvider>,

    /// Step matching and successor resolution
    resolver: StepTransitionResolver,

    /// Step-specific business rules
    business_rules: BusinessRuleRegistry,

    /// Event handler
    event_handler: Arc<dyn DomainEventHandler>,

    /// Configuration
    config: WorkflowConfig,
}

impl WorkflowService {
    /// Create a new workflow service with the default business rules
    pub fn new(
        instances: Arc<dyn WorkflowInstanceRepository>,
        definitions: Arc<dyn DefinitionProvider>,
        event_handler: Arc<dyn DomainEventHandler>,
        config: WorkflowConfig,
    ) -> Self {
        let resolver = StepTransitionResolver::new(definitions.clone(), config.step_matching);
        let business_rules = BusinessRuleRegistry::with_defaults(&config);
        Self {
            instances,
            definitions,
            resolver,
            business_rules,
            event_handler,
            config,
        }
    }

    /// Replace the business-rule registry
    pub fn with_business_rules(mut self, business_rules: BusinessRuleRegistry) -> Self {
        self.business_rules = business_rules;
        self
    }

    /// The active configuration
    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Start a new workflow instance at the definition's first step
    pub async fn create_instance(
        &self,
        definition_id: &DefinitionId,
        created_by: &str,
        priority: Priority,
        tags: Vec<String>,
    ) -> Result<WorkflowInstance, CoreError> {
        let definition = self.get_definition(definition_id).await?;

        let first = definition.first_step().ok_or_else(|| {
            CoreError::StepNotFound(format!("definition {} has no steps", definition_id))
        })?;
        let first_step = self.resolver.load_step(&definition, &first.id).await?;

        let sla_hours = definition.sla_hours.or(self.config.default_sla_hours);

        let mut instance = WorkflowInstance::new(
            definition_id.clone(),
            &first.id,
            first_step.actor,
            created_by,
            priority,
            tags,
            sla_hours,
        );
        instance.version = 1;

        self.instances.save(&instance, None).await?;

        info!(
            instance_id = %instance.id,
            definition_id = %definition_id,
            step_id = %instance.current_step,
            "Created workflow instance"
        );

        self.handle_events(&mut instance).await;
        Ok(instance)
    }

    /// Validate form data for a step without changing anything
    pub async fn validate_step(
        &self,
        instance_id: &WorkflowInstanceId,
        step_id: &str,
        form_data: &FieldMap,
    ) -> Result<ValidationReport, CoreError> {
        let instance = self.get_instance(instance_id).await?;
        let validated = self
            .validate_loaded(&instance, step_id, form_data, form_decision(form_data))
            .await?;
        Ok(validated.report)
    }

    /// Validate, merge and advance a step submission
    pub async fn submit_step(
        &self,
        instance_id: &WorkflowInstanceId,
        submission: StepSubmission,
    ) -> Result<WorkflowInstance, CoreError> {
        let mut instance = self.get_instance(instance_id).await?;

        if !instance.is_in_progress() {
            return Err(CoreError::InvalidOperation(format!(
                "Cannot submit step {} for instance {} in state: {}",
                submission.step_id, instance_id, instance.status
            )));
        }

        let decision = submission.effective_decision();
        let validated = self
            .validate_loaded(&instance, &submission.step_id, &submission.data, decision)
            .await?;

        if !validated.report.is_valid() {
            warn!(
                instance_id = %instance_id,
                step_id = %validated.step_id,
                violations = validated.report.violations().len(),
                "Step submission rejected"
            );
            return Err(CoreError::ValidationFailed(validated.report));
        }

        let transition = self
            .resolver
            .resolve(&validated.definition, &validated.step_id)
            .await?;

        let changes = FieldChangeTracker::diff(&instance.current_data, &submission.data);
        let expected_version = instance.version;

        instance.record_submission(
            &validated.step_id,
            &submission.data,
            changes,
            &submission.submitted_by,
            decision.map(str::to_string),
            submission.comments.clone(),
        )?;
        transition.apply_to(&mut instance)?;
        instance.version = expected_version + 1;

        self.instances.save(&instance, Some(expected_version)).await?;

        info!(
            instance_id = %instance_id,
            step_id = %validated.step_id,
            next_step = %instance.current_step,
            status = %instance.status,
            version = instance.version,
            "Step submitted"
        );

        self.handle_events(&mut instance).await;
        Ok(instance)
    }

    /// Instances in `status`, optionally restricted to an assigned actor
    pub async fn get_workflows_by_status(
        &self,
        status: WorkflowStatus,
        actor: Option<&str>,
    ) -> Result<Vec<WorkflowInstance>, CoreError> {
        self.instances
            .list_by_status(status, actor.map(str::to_string))
            .await
    }

    /// Load an instance
    pub async fn get_instance(&self, id: &WorkflowInstanceId) -> Result<WorkflowInstance, CoreError> {
        self.instances
            .find_by_id(id)
            .await?
            .ok_or_else(|| CoreError::InstanceNotFound(id.to_string()))
    }

    /// Load a definition
    pub async fn get_definition(&self, id: &DefinitionId) -> Result<WorkflowDefinition, CoreError> {
        self.definitions
            .get_definition(id)
            .await?
            .ok_or_else(|| CoreError::DefinitionNotFound(id.to_string()))
    }

    async fn validate_loaded(
        &self,
        instance: &WorkflowInstance,
        step_id: &str,
        data: &FieldMap,
        decision: Option<&str>,
    ) -> Result<ValidatedStep, CoreError> {
        let definition = self.get_definition(&instance.definition_id).await?;

        let canonical = self
            .resolver
            .find_reference(&definition, step_id)
            .map(|r| r.id.clone())
            .unwrap_or_else(|| step_id.to_string());
        instance.ensure_current_step(&canonical)?;

        let step = self.resolver.load_step(&definition, &canonical).await?;
        let rules = RuleFactory::build(&step)?;

        let mut report = evaluate_rules(&rules, data, &instance.current_data);
        report.extend(self.business_rules.evaluate(&BusinessRuleContext {
            step_id: &canonical,
            form_data: data,
            instance_data: &instance.current_data,
            decision,
        }));

        debug!(
            instance_id = %instance.id,
            step_id = %canonical,
            rules = rules.len(),
            violations = report.violations().len(),
            "Validated step data"
        );

        Ok(ValidatedStep {
            definition,
            step_id: canonical,
            report,
        })
    }

    /// Dispatch recorded domain events
    async fn handle_events(&self, instance: &mut WorkflowInstance) {
        for event in instance.take_events() {
            let event_type = event.event_type();
            if let Err(e) = self.event_handler.handle_event(event).await {
                // The instance is already persisted
                error!(instance_id = %instance.id, event_type, error = %e, "Event handler failed");
            }
        }
    }
}

impl Clone for WorkflowService {
    fn clone(&self) -> Self {
        Self {
            instances: self.instances.clone(),
            definitions: self.definitions.clone(),
            resolver: self.resolver.clone(),
            business_rules: self.business_rules.clone(),
            event_handler: self.event_handler.clone(),
            config: self.config.clone(),
        }
    }
}
