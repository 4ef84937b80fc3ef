//! Run Retention
//!
//! Decides how long the engine keeps a finished run and whether it is
//! archived. Successful runs expire after one day, or seven days when the
//! recipe publishes a temporary artifact. Unsuccessful runs are kept for
//! manual inspection and never archived.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::status::WorkflowStatus;
use crate::workflow::model::{OutputPolicy, RecipeDescription};

pub const SECONDS_PER_DAY: u64 = 86_400;

/// Days a successful run is kept by default.
pub const DEFAULT_RETENTION_DAYS: u64 = 1;

/// Days a successful run with a temporary artifact is kept.
pub const TEMPORARY_RETENTION_DAYS: u64 = 7;

pub const LABEL_RECIPE_ID: &str = "recipeflow/recipe-id";
pub const LABEL_OUTPUT_POLICY: &str = "recipeflow/output-policy";
pub const LABEL_RETENTION_DAYS: &str = "recipeflow/retention-days";
pub const LABEL_PERSIST: &str = "recipeflow/persist-workflow-in-archive";
pub const LABEL_ARCHIVE_STRATEGY: &str = "workflows.argoproj.io/archive-strategy";

/// How long a run is kept once it reaches a terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retention {
    Days(u64),
    Indefinite,
}

/// Retention and archival request attached to a submission.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetentionPolicy {
    pub output: OutputPolicy,
    /// Archive the run once it succeeds
    pub archive: bool,
}

impl RetentionPolicy {
    pub fn new(output: OutputPolicy) -> Self {
        Self {
            output,
            archive: false,
        }
    }

    /// Policy derived from the recipe's output configuration.
    pub fn for_recipe(recipe: &RecipeDescription) -> Self {
        Self::new(recipe.output)
    }

    pub fn with_archive(mut self, archive: bool) -> Self {
        self.archive = archive;
        self
    }

    /// Days a successful run is kept.
    pub fn success_days(&self) -> u64 {
        match self.output {
            OutputPolicy::Temporary => TEMPORARY_RETENTION_DAYS,
            OutputPolicy::Pvc | OutputPolicy::DataOne => DEFAULT_RETENTION_DAYS,
        }
    }

    /// Engine TTL applied after success.
    pub fn ttl_after_success(&self) -> Duration {
        Duration::from_secs(self.success_days() * SECONDS_PER_DAY)
    }

    pub fn retention_for(&self, status: WorkflowStatus) -> Retention {
        if status.is_successful() {
            Retention::Days(self.success_days())
        } else {
            Retention::Indefinite
        }
    }

    /// Only successful runs are archived, and only on request.
    pub fn should_archive(&self, status: WorkflowStatus) -> bool {
        self.archive && status.is_successful()
    }

    /// Labels attached to the submitted run.
    pub fn labels(&self, recipe_id: &str) -> BTreeMap<String, String> {
        let mut labels = BTreeMap::new();
        labels.insert(LABEL_RECIPE_ID.to_string(), recipe_id.to_string());
        labels.insert(LABEL_OUTPUT_POLICY.to_string(), self.output.to_string());
        labels.insert(
            LABEL_RETENTION_DAYS.to_string(),
            self.success_days().to_string(),
        );
        labels.insert(LABEL_PERSIST.to_string(), self.archive.to_string());
        if !self.archive {
            labels.insert(LABEL_ARCHIVE_STRATEGY.to_string(), "false".to_string());
        }
        labels
    }
}
