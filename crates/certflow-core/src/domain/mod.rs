/// Workflow instance domain models
pub mod workflow_instance;

/// Domain events
pub mod events;

/// Workflow definition domain models
pub mod workflow_definition;

/// Field-level audit diffing
pub mod change_tracker;

/// Repository interfaces
pub mod repository;
