use crate::{
    domain::change_tracker::ChangeSet,
    domain::events::{DomainEvent, StepSubmitted, WorkflowCompleted, WorkflowInstanceCreated},
    types::FieldMap,
    CoreError,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Sentinel step id marking a finished workflow
pub const COMPLETED_STEP: &str = "completed";

/// Workflow instance status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Instance is collecting step data
    InProgress,

    /// Instance reached the completed sentinel
    Completed,
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkflowStatus::InProgress => "in_progress",
            WorkflowStatus::Completed => "completed",
        };
        write!(f, "{}", s)
    }
}

/// Application priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Low priority
    Low,
    /// Default priority
    #[default]
    Normal,
    /// High priority
    High,
    /// Urgent
    Urgent,
}

/// Value object: Workflow Instance ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowInstanceId(pub String);

/// Value object: Definition ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DefinitionId(pub String);

impl fmt::Display for WorkflowInstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for DefinitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Audit entry appended for every accepted submission
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StepHistoryEntry {
    /// Step that was submitted
    pub step_id: String,

    /// When the submission was accepted
    pub completed_at: DateTime<Utc>,

    /// Who submitted it
    pub completed_by: String,

    /// Full instance data after the merge
    pub data_snapshot: FieldMap,

    /// Fields added or changed by this submission
    pub changed_fields: ChangeSet,

    /// Optional decision, e.g. `approve`
    pub decision: Option<String>,

    /// Optional free-text comment
    pub comments: Option<String>,
}

/// Aggregate: Workflow instance
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowInstance {
    /// Unique identifier
    pub id: WorkflowInstanceId,

    /// Definition this instance runs
    pub definition_id: DefinitionId,

    /// Current step id, or [`COMPLETED_STEP`]
    pub current_step: String,

    /// Current status
    pub status: WorkflowStatus,

    /// Role responsible for the current step
    pub assigned_actor: Option<String>,

    /// Applicant that started the workflow
    pub created_by: String,

    /// Handling priority
    pub priority: Priority,

    /// Free-form labels
    pub tags: Vec<String>,

    /// Accumulated form data
    pub current_data: FieldMap,

    /// Append-only audit trail
    pub step_history: Vec<StepHistoryEntry>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last updated timestamp
    pub updated_at: DateTime<Utc>,

    /// Advisory completion deadline
    pub sla_deadline: Option<DateTime<Utc>>,

    /// Set when the completed sentinel is reached
    pub completed_at: Option<DateTime<Utc>>,

    /// Optimistic concurrency counter, incremented on every accepted write
    pub version: u64,

    /// Domain events
    #[serde(skip)]
    pub events: Vec<Box<dyn DomainEvent>>,
}

// Manually implement Clone for WorkflowInstance
impl Clone for WorkflowInstance {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            definition_id: self.definition_id.clone(),
            current_step: self.current_step.clone(),
            status: self.status,
            assigned_actor: self.assigned_actor.clone(),
            created_by: self.created_by.clone(),
            priority: self.priority,
            tags: self.tags.clone(),
            current_data: self.current_data.clone(),
            step_history: self.step_history.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            sla_deadline: self.sla_deadline,
            completed_at: self.completed_at,
            version: self.version,
            events: Vec::new(), // We don't clone domain events
        }
    }
}

impl WorkflowInstance {
    /// Create a new instance positioned at `first_step`.
    ///
    /// `sla_hours` sets the advisory deadline relative to the creation time.
    pub fn new(
        definition_id: DefinitionId,
        first_step: &str,
        assigned_actor: Option<String>,
        created_by: &str,
        priority: Priority,
        tags: Vec<String>,
        sla_hours: Option<i64>,
    ) -> Self {
        let instance_id = WorkflowInstanceId(Uuid::new_v4().to_string());
        let now = Utc::now();

        let mut instance = Self {
            id: instance_id.clone(),
            definition_id: definition_id.clone(),
            current_step: first_step.to_string(),
            status: WorkflowStatus::InProgress,
            assigned_actor,
            created_by: created_by.to_string(),
            priority,
            tags,
            current_data: FieldMap::new(),
            step_history: Vec::new(),
            created_at: now,
            updated_at: now,
            sla_deadline: sla_hours
                .and_then(Duration::try_hours)
                .and_then(|sla| now.checked_add_signed(sla)),
            completed_at: None,
            version: 0,
            events: Vec::with_capacity(4),
        };

        instance.record_event(Box::new(WorkflowInstanceCreated {
            workflow_instance_id: instance_id,
            definition_id,
            first_step: first_step.to_string(),
            timestamp: now,
        }));

        instance
    }

    /// Update the timestamp
    #[inline]
    pub fn update_timestamp(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Whether the instance is still collecting data
    #[inline]
    pub fn is_in_progress(&self) -> bool {
        self.status == WorkflowStatus::InProgress
    }

    /// Reject `step_id` unless it is the instance's current step
    pub fn ensure_current_step(&self, step_id: &str) -> Result<(), CoreError> {
        if self.current_step != step_id {
            return Err(CoreError::InvalidStep(format!(
                "Step {} is not the current step of instance {} (current: {})",
                step_id, self.id.0, self.current_step
            )));
        }
        Ok(())
    }

    /// Merge an accepted submission and append its history entry
    pub fn record_submission(
        &mut self,
        step_id: &str,
        data: &FieldMap,
        changed_fields: ChangeSet,
        completed_by: &str,
        decision: Option<String>,
        comments: Option<String>,
    ) -> Result<(), CoreError> {
        if !self.is_in_progress() {
            return Err(CoreError::InvalidOperation(format!(
                "Cannot submit step while workflow is in state: {}",
                self.status
            )));
        }

        // Shallow merge: submitted keys overwrite stored keys
        for (key, value) in data {
            self.current_data.insert(key.clone(), value.clone());
        }

        let now = Utc::now();
        let changed_count = changed_fields.len();
        self.step_history.push(StepHistoryEntry {
            step_id: step_id.to_string(),
            completed_at: now,
            completed_by: completed_by.to_string(),
            data_snapshot: self.current_data.clone(),
            changed_fields,
            decision,
            comments,
        });

        self.record_event(Box::new(StepSubmitted {
            workflow_instance_id: self.id.clone(),
            step_id: step_id.to_string(),
            submitted_by: completed_by.to_string(),
            changed_fields: changed_count,
            timestamp: now,
        }));

        self.update_timestamp();
        Ok(())
    }

    /// Move to the next step and hand it to `actor`
    pub fn advance_to(&mut self, step_id: &str, actor: Option<String>) -> Result<(), CoreError> {
        if !self.is_in_progress() {
            return Err(CoreError::InvalidOperation(format!(
                "Cannot advance workflow in state: {}",
                self.status
            )));
        }

        self.current_step = step_id.to_string();
        self.assigned_actor = actor;
        self.update_timestamp();
        Ok(())
    }

    /// Finish the workflow
    pub fn complete(&mut self) -> Result<(), CoreError> {
        if !self.is_in_progress() {
            return Err(CoreError::InvalidOperation(format!(
                "Cannot complete workflow in state: {}",
                self.status
            )));
        }

        let now = Utc::now();
        self.status = WorkflowStatus::Completed;
        self.current_step = COMPLETED_STEP.to_string();
        self.assigned_actor = None;
        self.completed_at = Some(now);

        self.record_event(Box::new(WorkflowCompleted {
            workflow_instance_id: self.id.clone(),
            steps_submitted: self.step_history.len(),
            timestamp: now,
        }));

        self.update_timestamp();
        Ok(())
    }

    /// Record a domain event
    pub fn record_event(&mut self, event: Box<dyn DomainEvent>) {
        self.events.push(event);
    }

    /// Get and clear all domain events
    pub fn take_events(&mut self) -> Vec<Box<dyn DomainEvent>> {
        std::mem::take(&mut self.events)
    }
}
