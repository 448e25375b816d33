//!
//! Certflow Core - Step validation and transition core
//!
//! This crate defines the domain model of certificate-application
//! workflows, the field rules and business rules that validate step
//! submissions, and the orchestrator that merges accepted data and moves
//! instances through their steps. Persistence and definition loading are
//! provided by other crates through the repository traits.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Domain layer - workflow models, events and repository traits
pub mod domain;

/// Application services - transition resolution and orchestration
pub mod application;

/// Field rules, rule factory and business rules
pub mod validation;

/// Configuration
pub mod config;

/// Core types and helpers
pub mod types;

/// Error types
pub mod error;

// Re-export key types
pub use config::{StepMatching, WorkflowConfig};
pub use error::CoreError;
pub use types::{FieldMap, FileMetadata, FileValue};

// Application services
pub use application::transition::{StepTransitionResolver, Transition};
pub use application::workflow_service::{
    DomainEventHandler, StepSubmission, TracingEventHandler, WorkflowService,
};

// Re-export main API types for easy use
pub use domain::change_tracker::{ChangeSet, FieldChange, FieldChangeTracker};
pub use domain::events::DomainEvent;
pub use domain::repository::{DefinitionProvider, WorkflowInstanceRepository};
pub use domain::workflow_definition::{
    FieldDefinition, FieldOption, FieldType, RequiredIfConstraint, StepReference,
    WorkflowDefinition, WorkflowStep,
};
pub use domain::workflow_instance::{
    DefinitionId, Priority, StepHistoryEntry, WorkflowInstance, WorkflowInstanceId,
    WorkflowStatus, COMPLETED_STEP,
};
pub use validation::{
    BusinessRule, BusinessRuleContext, BusinessRuleRegistry, Rule, RuleFactory, RuleFailure,
    RuleViolation, ValidationReport,
};
