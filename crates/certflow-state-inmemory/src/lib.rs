//! In-memory state store implementation for certflow
//!
//! This crate provides in-memory implementations of the repository
//! interfaces defined in the certflow-core crate. It is primarily useful for
//! development, testing, and simple deployments where persistence is not required.

use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub mod repositories;
pub use repositories::{
    DefinitionBundle, InMemoryDefinitionProvider, InMemoryWorkflowInstanceRepository,
};

use certflow_core::{
    DomainEventHandler, WorkflowConfig, WorkflowDefinition, WorkflowInstance, WorkflowService,
    WorkflowStep,
};

/// Provider for in-memory state store repositories
pub struct InMemoryStateStoreProvider {
    // Shared storage for workflow instances
    instances: Arc<RwLock<HashMap<String, WorkflowInstance>>>,

    // Shared storage for workflow definitions
    definitions: Arc<DashMap<String, WorkflowDefinition>>,

    // Shared storage for step configurations, keyed by step_ref
    steps: Arc<DashMap<String, WorkflowStep>>,
}

impl InMemoryStateStoreProvider {
    /// Create a new in-memory state store provider
    pub fn new() -> Self {
        Self {
            instances: Arc::new(RwLock::new(HashMap::new())),
            definitions: Arc::new(DashMap::new()),
            steps: Arc::new(DashMap::new()),
        }
    }

    /// Create repositories sharing this provider's storage
    pub fn create_repositories(
        &self,
    ) -> (
        Arc<InMemoryWorkflowInstanceRepository>,
        Arc<InMemoryDefinitionProvider>,
    ) {
        let instance_repo = Arc::new(InMemoryWorkflowInstanceRepository::new(self.instances.clone()));
        let definition_provider = Arc::new(InMemoryDefinitionProvider::new(
            self.definitions.clone(),
            self.steps.clone(),
        ));
        (instance_repo, definition_provider)
    }

    /// Create a workflow service backed by this provider's storage
    pub fn create_service(
        &self,
        event_handler: Arc<dyn DomainEventHandler>,
        config: WorkflowConfig,
    ) -> WorkflowService {
        let (instance_repo, definition_provider) = self.create_repositories();
        WorkflowService::new(instance_repo, definition_provider, event_handler, config)
    }
}

impl Default for InMemoryStateStoreProvider {
    fn default() -> Self {
        Self::new()
    }
}
