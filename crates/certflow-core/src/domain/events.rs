use crate::domain::workflow_instance::{DefinitionId, WorkflowInstanceId};
use chrono::{DateTime, Utc};
use std::fmt::Debug;

/// Domain event trait for all events in the system
pub trait DomainEvent: Debug + Send + Sync {
    /// Returns the type of the event as a string
    fn event_type(&self) -> &'static str;

    /// Returns the workflow instance ID this event is associated with
    fn workflow_instance_id(&self) -> &WorkflowInstanceId;

    /// Returns the timestamp when the event occurred
    fn timestamp(&self) -> DateTime<Utc>;
}

/// Event: Workflow instance created
#[derive(Debug)]
pub struct WorkflowInstanceCreated {
    /// The unique identifier of the workflow instance
    pub workflow_instance_id: WorkflowInstanceId,

    /// The identifier of the workflow definition
    pub definition_id: DefinitionId,

    /// Step the instance starts at
    pub first_step: String,

    /// The timestamp when the instance was created
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent for WorkflowInstanceCreated {
    fn event_type(&self) -> &'static str {
        "workflow_instance.created"
    }

    fn workflow_instance_id(&self) -> &WorkflowInstanceId {
        &self.workflow_instance_id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Event: Step data accepted and merged
#[derive(Debug)]
pub struct StepSubmitted {
    /// The unique identifier of the workflow instance
    pub workflow_instance_id: WorkflowInstanceId,

    /// The step that was submitted
    pub step_id: String,

    /// Who submitted it
    pub submitted_by: String,

    /// Number of added or changed fields
    pub changed_fields: usize,

    /// The timestamp when the event occurred
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent for StepSubmitted {
    fn event_type(&self) -> &'static str {
        "step.submitted"
    }

    fn workflow_instance_id(&self) -> &WorkflowInstanceId {
        &self.workflow_instance_id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Event: Workflow reached the completed sentinel
#[derive(Debug)]
pub struct WorkflowCompleted {
    /// The unique identifier of the workflow instance
    pub workflow_instance_id: WorkflowInstanceId,

    /// Length of the step history at completion
    pub steps_submitted: usize,

    /// The timestamp when the event occurred
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent for WorkflowCompleted {
    fn event_type(&self) -> &'static str {
        "workflow_instance.completed"
    }

    fn workflow_instance_id(&self) -> &WorkflowInstanceId {
        &self.workflow_instance_id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}
