//! Workflow Lifecycle Manager
//!
//! Submits compiled DAGs to a workflow engine and observes the resulting
//! runs until they finish:
//! - One best-effort submission, never retried
//! - Blocking wait that polls on a fixed interval
//! - Local timeout and cancellation that leave the remote run alone
//! - Explicit deletion

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::engine::{SubmissionRequest, WorkflowEngine};
use super::retention::{Retention, RetentionPolicy};
use super::status::WorkflowStatus;
use crate::error::{EngineError, LifecycleError, SubmissionError};
use crate::monitoring::StatusTimeline;
use crate::workflow::compiler::WorkflowDag;

/// Smallest interval used between two polls.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Time source of the wait loop.
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

/// Wall clock with real sleeps.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Clock that only moves when slept on.
#[derive(Debug)]
pub struct ManualClock {
    start: Instant,
    elapsed_nanos: AtomicU64,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            elapsed_nanos: AtomicU64::new(0),
        }
    }

    /// Total time slept so far.
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.elapsed_nanos.load(Ordering::SeqCst))
    }

    pub fn advance(&self, duration: Duration) {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        self.elapsed_nanos.fetch_add(nanos, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.start + self.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}

/// A submitted workflow run, as last observed.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct WorkflowRun {
    /// Name assigned by the engine
    pub workflow_name: String,
    pub recipe_id: String,
    pub status: WorkflowStatus,
    pub retention: RetentionPolicy,
    pub labels: BTreeMap<String, String>,
    pub submitted_at: DateTime<Utc>,
}

impl WorkflowRun {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_successful(&self) -> bool {
        self.status.is_successful()
    }

    /// How long the engine keeps this run in its current status.
    pub fn retention_period(&self) -> Retention {
        self.retention.retention_for(self.status)
    }

    pub fn should_archive(&self) -> bool {
        self.retention.should_archive(self.status)
    }

    fn with_status(&self, status: WorkflowStatus) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }
}

/// Drives workflow runs on an engine.
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
///
/// use recipeflow::config::EngineSettings;
/// use recipeflow::execution::{ArgoEngine, RetentionPolicy, WorkflowManager};
/// use recipeflow::workflow::{DagCompiler, RecipeDescription};
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let recipe = RecipeDescription::new("ice-basins", vec!["gdalinfo $INPUT_DIR".to_string()]);
///     let dag = DagCompiler::new().compile(&recipe)?;
///
///     let manager = WorkflowManager::new(ArgoEngine::new(EngineSettings::from_env())?);
///     let run = manager.submit(&dag, RetentionPolicy::for_recipe(&recipe))?;
///     let done = manager.await_terminal(&run, Duration::from_secs(5), Duration::from_secs(600))?;
///     println!("{} finished: {}", done.workflow_name, done.status);
///     Ok(())
/// }
/// ```
pub struct WorkflowManager<E, C = SystemClock> {
    engine: E,
    clock: C,
    cancel: Arc<AtomicBool>,
}

impl<E: WorkflowEngine> WorkflowManager<E, SystemClock> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            clock: SystemClock,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl<E: WorkflowEngine, C: Clock> WorkflowManager<E, C> {
    /// Replaces the time source of the wait loop.
    pub fn with_clock<C2: Clock>(self, clock: C2) -> WorkflowManager<E, C2> {
        WorkflowManager {
            engine: self.engine,
            clock,
            cancel: self.cancel,
        }
    }

    /// Uses an existing cancellation flag.
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Flag that aborts a running wait once set.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Submits `dag` once.
    ///
    /// Empty DAGs are refused before the engine is contacted.
    pub fn submit(
        &self,
        dag: &WorkflowDag,
        retention: RetentionPolicy,
    ) -> Result<WorkflowRun, SubmissionError> {
        if dag.is_empty() {
            warn!("Recipe '{}' compiled to an empty workflow, not submitting", dag.recipe_id);
            return Err(SubmissionError::EmptyWorkflow(dag.recipe_id.clone()));
        }

        let request = SubmissionRequest::new(dag, retention);
        info!(
            "Submitting workflow for recipe '{}' ({} tasks)",
            dag.recipe_id,
            dag.node_count()
        );

        let workflow_name = self.engine.submit(&request)?;
        info!("Submitted workflow '{}'", workflow_name);

        Ok(WorkflowRun {
            workflow_name,
            recipe_id: dag.recipe_id.clone(),
            status: WorkflowStatus::Pending,
            retention,
            labels: request.labels,
            submitted_at: Utc::now(),
        })
    }

    /// Queries the current status of `run` once.
    pub fn refresh(&self, run: &WorkflowRun) -> Result<WorkflowRun, EngineError> {
        let status = self.engine.status(&run.workflow_name)?;
        Ok(run.with_status(status))
    }

    /// Blocks until `run` reaches a terminal status.
    ///
    /// `Failed` and `Error` runs are returned as `Ok`; only the wait itself
    /// can fail. A timeout or cancellation leaves the remote run executing.
    pub fn await_terminal(
        &self,
        run: &WorkflowRun,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<WorkflowRun, LifecycleError> {
        let mut timeline = StatusTimeline::new();
        let result = self.watch(run, poll_interval, timeout, &mut timeline);
        debug!("{}", timeline.report());
        result
    }

    /// Same as [`await_terminal`](Self::await_terminal), recording every
    /// observed status into `timeline`.
    pub fn watch(
        &self,
        run: &WorkflowRun,
        poll_interval: Duration,
        timeout: Duration,
        timeline: &mut StatusTimeline,
    ) -> Result<WorkflowRun, LifecycleError> {
        let poll_interval = poll_interval.max(MIN_POLL_INTERVAL);
        let start = self.clock.now();
        let mut last = run.status;

        info!(
            "Waiting for workflow '{}' (poll every {:?}, timeout {:?})",
            run.workflow_name, poll_interval, timeout
        );

        loop {
            if self.cancel.load(Ordering::SeqCst) {
                info!("Stopped waiting for workflow '{}'", run.workflow_name);
                return Err(LifecycleError::Cancelled(run.workflow_name.clone()));
            }

            let status = self.engine.status(&run.workflow_name)?;
            let elapsed = self.clock.now().saturating_duration_since(start);

            if timeline.record(status, elapsed) && !last.can_transition_to(status) {
                warn!(
                    "Workflow '{}' reported unexpected transition {} -> {}",
                    run.workflow_name, last, status
                );
            }
            last = status;

            if status.is_terminal() {
                info!(
                    "Workflow '{}' finished with status {} after {:?}",
                    run.workflow_name, status, elapsed
                );
                return Ok(run.with_status(status));
            }

            info!(
                "Workflow '{}' is {} ({}s elapsed)",
                run.workflow_name,
                status,
                elapsed.as_secs()
            );

            if elapsed >= timeout {
                warn!(
                    "Timed out waiting for workflow '{}', it keeps running on the engine",
                    run.workflow_name
                );
                return Err(LifecycleError::Timeout {
                    workflow_name: run.workflow_name.clone(),
                    elapsed,
                    last_status: status,
                });
            }

            self.clock.sleep(poll_interval.min(timeout - elapsed));
        }
    }

    /// Deletes `run` on the engine, stopping it if still active.
    pub fn delete(&self, run: &WorkflowRun) -> Result<(), EngineError> {
        info!("Deleting workflow '{}'", run.workflow_name);
        self.engine.delete(&run.workflow_name)
    }
}
