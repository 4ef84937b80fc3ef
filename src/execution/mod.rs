//! Workflow Execution Module
//!
//! Everything between a compiled DAG and a finished run on the engine.
//!
//! # Architecture
//!
//! - [`step`]: Step template builder turning commands into container tasks
//! - [`stage`]: Input fetch and output publish containers around the DAG
//! - [`engine`]: Engine trait and submission request
//! - [`argo`]: Argo Workflows manifest rendering and REST client
//! - [`status`]: Run status state machine
//! - [`retention`]: Retention and archival labels
//! - [`lifecycle`]: Submission, blocking wait, and deletion

pub mod argo;
pub mod engine;
pub mod lifecycle;
pub mod retention;
pub mod stage;
pub mod status;
pub mod step;

pub use argo::{render_manifest, ArgoEngine};
pub use engine::{SubmissionRequest, WorkflowEngine};
pub use lifecycle::{Clock, ManualClock, SystemClock, WorkflowManager, WorkflowRun};
pub use retention::{Retention, RetentionPolicy};
pub use status::WorkflowStatus;
pub use step::{StepTask, StepTemplateBuilder};
