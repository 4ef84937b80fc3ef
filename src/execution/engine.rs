//! Workflow Engine Interface
//!
//! The seam between the lifecycle manager and the external engine that
//! actually schedules step containers. Implementations must not retry
//! submissions on their own.

use std::collections::BTreeMap;
use std::time::Duration;

use super::retention::RetentionPolicy;
use super::status::WorkflowStatus;
use crate::error::{EngineError, SubmissionError};
use crate::workflow::compiler::WorkflowDag;

/// Everything the engine needs to create one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRequest {
    pub dag: WorkflowDag,
    /// Name prefix; the engine appends a unique suffix
    pub generate_name: String,
    pub labels: BTreeMap<String, String>,
    pub ttl_after_success: Duration,
    /// Ceiling on concurrently running tasks
    pub parallelism: Option<usize>,
    pub retention: RetentionPolicy,
}

impl SubmissionRequest {
    pub fn new(dag: &WorkflowDag, retention: RetentionPolicy) -> Self {
        Self {
            generate_name: format!("{}-", dag.recipe_id),
            labels: retention.labels(&dag.recipe_id),
            ttl_after_success: retention.ttl_after_success(),
            parallelism: dag.parallelism,
            retention,
            dag: dag.clone(),
        }
    }
}

/// Operations offered by a workflow engine.
pub trait WorkflowEngine {
    /// Creates a run and returns the name the engine assigned to it.
    fn submit(&self, request: &SubmissionRequest) -> Result<String, SubmissionError>;

    /// Current status of a run.
    fn status(&self, workflow_name: &str) -> Result<WorkflowStatus, EngineError>;

    /// Deletes a run, stopping it if it is still active.
    fn delete(&self, workflow_name: &str) -> Result<(), EngineError>;
}

impl<E: WorkflowEngine + ?Sized> WorkflowEngine for &E {
    fn submit(&self, request: &SubmissionRequest) -> Result<String, SubmissionError> {
        (**self).submit(request)
    }

    fn status(&self, workflow_name: &str) -> Result<WorkflowStatus, EngineError> {
        (**self).status(workflow_name)
    }

    fn delete(&self, workflow_name: &str) -> Result<(), EngineError> {
        (**self).delete(workflow_name)
    }
}

impl<E: WorkflowEngine + ?Sized> WorkflowEngine for Box<E> {
    fn submit(&self, request: &SubmissionRequest) -> Result<String, SubmissionError> {
        (**self).submit(request)
    }

    fn status(&self, workflow_name: &str) -> Result<WorkflowStatus, EngineError> {
        (**self).status(workflow_name)
    }

    fn delete(&self, workflow_name: &str) -> Result<(), EngineError> {
        (**self).delete(workflow_name)
    }
}
