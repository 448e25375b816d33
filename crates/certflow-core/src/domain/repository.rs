//! Repository traits for the certflow core
//!
//! This module defines the collaborator traits the orchestrator depends on.
//! External crates implement them to provide definition loading and
//! instance persistence.

use async_trait::async_trait;

use super::workflow_definition::{WorkflowDefinition, WorkflowStep};
use super::workflow_instance::{DefinitionId, WorkflowInstance, WorkflowInstanceId, WorkflowStatus};
use crate::CoreError;

/// Source of workflow definitions and step configurations
#[async_trait]
pub trait DefinitionProvider: Send + Sync {
    /// Find a workflow definition by ID
    async fn get_definition(&self, id: &DefinitionId) -> Result<Option<WorkflowDefinition>, CoreError>;

    /// Find a step configuration by its reference path
    async fn get_step(&self, step_ref: &str) -> Result<Option<WorkflowStep>, CoreError>;
}

/// Repository for workflow instances
#[async_trait]
pub trait WorkflowInstanceRepository: Send + Sync {
    /// Find a workflow instance by ID
    async fn find_by_id(&self, id: &WorkflowInstanceId) -> Result<Option<WorkflowInstance>, CoreError>;

    /// Save a workflow instance.
    ///
    /// With `expected_version = None` the instance must not exist yet.
    /// With `Some(v)` the stored instance must still be at version `v`,
    /// otherwise the save fails with [`CoreError::ConcurrencyConflict`].
    async fn save(
        &self,
        instance: &WorkflowInstance,
        expected_version: Option<u64>,
    ) -> Result<(), CoreError>;

    /// List instances in `status`, optionally restricted to an assigned actor
    async fn list_by_status(
        &self,
        status: WorkflowStatus,
        actor: Option<String>,
    ) -> Result<Vec<WorkflowInstance>, CoreError>;
}
