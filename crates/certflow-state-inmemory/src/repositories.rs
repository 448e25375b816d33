use async_trait::async_trait;
use dashmap::DashMap;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use certflow_core::{
    CoreError, DefinitionId, DefinitionProvider, WorkflowDefinition, WorkflowInstance,
    WorkflowInstanceId, WorkflowInstanceRepository, WorkflowStatus, WorkflowStep,
};

/// Definitions and step configurations as loaded from a JSON document
#[derive(Debug, Default, Deserialize)]
pub struct DefinitionBundle {
    /// Workflow definitions
    #[serde(default)]
    pub definitions: Vec<WorkflowDefinition>,

    /// Step configurations keyed by their `step_ref` path
    #[serde(default)]
    pub steps: HashMap<String, WorkflowStep>,
}

/// In-memory implementation of the DefinitionProvider
pub struct InMemoryDefinitionProvider {
    definitions: Arc<DashMap<String, WorkflowDefinition>>,
    steps: Arc<DashMap<String, WorkflowStep>>,
}

impl InMemoryDefinitionProvider {
    /// Create a new in-memory definition provider
    pub fn new(
        definitions: Arc<DashMap<String, WorkflowDefinition>>,
        steps: Arc<DashMap<String, WorkflowStep>>,
    ) -> Self {
        Self { definitions, steps }
    }

    /// Register a definition after checking its structure
    pub fn add_definition(&self, definition: WorkflowDefinition) -> Result<(), CoreError> {
        definition.validate()?;
        self.insert_definition(definition);
        Ok(())
    }

    fn insert_definition(&self, definition: WorkflowDefinition) {
        debug!(definition_id = %definition.id, steps = definition.steps.len(), "Registered workflow definition");
        self.definitions.insert(definition.id.0.clone(), definition);
    }

    /// Register the configuration of a step under its `step_ref` path
    pub fn add_step(&self, step_ref: &str, step: WorkflowStep) {
        self.steps.insert(step_ref.to_string(), step);
    }

    /// Register everything contained in a JSON [`DefinitionBundle`].
    ///
    /// Nothing is registered unless every definition in the bundle is valid.
    pub fn load_json(&self, json: &str) -> Result<(), CoreError> {
        let bundle: DefinitionBundle = serde_json::from_str(json)?;
        for definition in &bundle.definitions {
            definition.validate()?;
        }

        for (step_ref, step) in bundle.steps {
            self.add_step(&step_ref, step);
        }
        for definition in bundle.definitions {
            for reference in &definition.steps {
                if !self.steps.contains_key(&reference.step_ref) {
                    warn!(
                        definition_id = %definition.id,
                        step_ref = %reference.step_ref,
                        "Definition references an unknown step configuration"
                    );
                }
            }
            self.insert_definition(definition);
        }
        Ok(())
    }
}

#[async_trait]
impl DefinitionProvider for InMemoryDefinitionProvider {
    async fn get_definition(&self, id: &DefinitionId) -> Result<Option<WorkflowDefinition>, CoreError> {
        Ok(self.definitions.get(&id.0).map(|entry| entry.value().clone()))
    }

    async fn get_step(&self, step_ref: &str) -> Result<Option<WorkflowStep>, CoreError> {
        Ok(self.steps.get(step_ref).map(|entry| entry.value().clone()))
    }
}

/// In-memory implementation of the WorkflowInstanceRepository
pub struct InMemoryWorkflowInstanceRepository {
    instances: Arc<RwLock<HashMap<String, WorkflowInstance>>>,
}

impl InMemoryWorkflowInstanceRepository {
    /// Create a new in-memory workflow instance repository
    pub fn new(instances: Arc<RwLock<HashMap<String, WorkflowInstance>>>) -> Self {
        Self { instances }
    }

    /// Number of stored instances
    pub async fn len(&self) -> usize {
        self.instances.read().await.len()
    }

    /// Whether no instance is stored
    pub async fn is_empty(&self) -> bool {
        self.instances.read().await.is_empty()
    }
}

#[async_trait]
impl WorkflowInstanceRepository for InMemoryWorkflowInstanceRepository {
    async fn find_by_id(&self, id: &WorkflowInstanceId) -> Result<Option<WorkflowInstance>, CoreError> {
        let instances = self.instances.read().await;
        Ok(instances.get(&id.0).cloned())
    }

    async fn save(
        &self,
        instance: &WorkflowInstance,
        expected_version: Option<u64>,
    ) -> Result<(), CoreError> {
        // Version check and write happen under one lock
        let mut instances = self.instances.write().await;
        let stored_version = instances.get(&instance.id.0).map(|stored| stored.version);

        match (expected_version, stored_version) {
            (None, None) => {}
            (None, Some(_)) => {
                return Err(CoreError::ConcurrencyConflict(format!(
                    "Workflow instance {} already exists",
                    instance.id
                )));
            }
            (Some(expected), Some(stored)) if expected == stored => {}
            (Some(expected), Some(stored)) => {
                warn!(
                    instance_id = %instance.id,
                    expected,
                    stored,
                    "Rejected stale workflow instance write"
                );
                return Err(CoreError::ConcurrencyConflict(format!(
                    "Workflow instance {} is at version {}, expected {}",
                    instance.id, stored, expected
                )));
            }
            (Some(_), None) => {
                return Err(CoreError::InstanceNotFound(instance.id.to_string()));
            }
        }

        instances.insert(instance.id.0.clone(), instance.clone());
        debug!(instance_id = %instance.id, version = instance.version, "Saved workflow instance");
        Ok(())
    }

    async fn list_by_status(
        &self,
        status: WorkflowStatus,
        actor: Option<String>,
    ) -> Result<Vec<WorkflowInstance>, CoreError> {
        let instances = self.instances.read().await;

        let mut result: Vec<WorkflowInstance> = instances
            .values()
            .filter(|instance| instance.status == status)
            .filter(|instance| match &actor {
                Some(actor) => instance.assigned_actor.as_deref() == Some(actor.as_str()),
                None => true,
            })
            .cloned()
            .collect();

        result.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.0.cmp(&b.id.0)));
        Ok(result)
    }
}
