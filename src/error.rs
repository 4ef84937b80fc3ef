//! Error Types
//!
//! One error enum per layer: recipe loading, compilation, submission,
//! engine queries, and the wait loop.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::execution::status::WorkflowStatus;
use crate::workflow::model::WorkflowKind;

/// Errors raised while loading a recipe directory.
#[derive(Error, Debug)]
pub enum RecipeError {
    #[error("I/O error on path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse recipe metadata '{path}': {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid recipe id '{0}': only lower-case alphanumeric characters, '.' and '-' are allowed")]
    InvalidId(String),
}

/// Errors raised while compiling a recipe into a workflow DAG.
///
/// All of these are fatal: nothing is submitted when compilation fails.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("Invalid parallel configuration: {0}")]
    Configuration(String),

    #[error("Command at step {index} is invalid ({reason}): {command:?}")]
    InvalidCommand {
        index: usize,
        command: String,
        reason: String,
    },

    #[error("Workflow type '{kind}' is not supported: {reason}")]
    UnsupportedWorkflowType { kind: WorkflowKind, reason: String },

    #[error("Compiled workflow graph is malformed: {0}")]
    MalformedDag(String),
}

/// Errors raised when the engine does not accept a workflow.
///
/// Submission is never retried: a second attempt would create a second run.
#[derive(Error, Debug)]
pub enum SubmissionError {
    #[error("Workflow for recipe '{0}' has no tasks to submit")]
    EmptyWorkflow(String),

    #[error("Workflow engine rejected the submission (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Workflow engine unavailable: {0}")]
    Unavailable(String),

    #[error("Workflow engine returned an unexpected response: {0}")]
    InvalidResponse(String),
}

/// Errors raised by status queries and deletion calls.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Workflow '{0}' not found")]
    NotFound(String),

    #[error("Workflow engine request failed (HTTP {status}): {message}")]
    Request { status: u16, message: String },

    #[error("Workflow engine unavailable: {0}")]
    Unavailable(String),

    #[error("Workflow engine returned an unexpected response: {0}")]
    InvalidResponse(String),
}

/// Errors raised while waiting for a run to reach a terminal state.
///
/// `Failed` and `Error` workflow outcomes are not errors; they are returned
/// as the observed status of the run.
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Timed out after {elapsed:?} waiting for workflow '{workflow_name}' (last status: {last_status})")]
    Timeout {
        workflow_name: String,
        elapsed: Duration,
        last_status: WorkflowStatus,
    },

    #[error("Wait for workflow '{0}' was cancelled")]
    Cancelled(String),

    #[error(transparent)]
    Engine(#[from] EngineError),
}
