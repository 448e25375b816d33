/// Step reference matching and successor resolution
pub mod transition;

/// Workflow orchestration service
pub mod workflow_service;
