//! Recipe Data Model
//!
//! Typed, already-validated description of a recipe: its commands, inputs,
//! workflow kind, optional parallel configuration, and output policy.
//!
//! # Example YAML Format
//!
//! ```yaml
//! name: Ice basins reprojection
//! id: ice-basins
//! input:
//!   params:
//!     - value: https://example.com/basins-1.gpkg
//!       type: url
//!     - value: https://example.com/basins-2.gpkg
//!       type: url
//! output:
//!   type: temporary
//! workflow:
//!   type: shell
//!   sh_file: recipe.sh
//!   parallel:
//!     enabled: true
//!     partition_strategy: files
//!     partition_size: 2
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Default number of files per partition when none is configured.
pub const DEFAULT_PARTITION_SIZE: usize = 1;

/// Default ceiling on concurrently running partition tasks.
pub const DEFAULT_MAX_PARALLELISM: usize = 5;

/// Kinds of workflow a recipe can declare.
///
/// Each kind carries its compilation capabilities, so adding a kind is an
/// exhaustive-match update.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    /// One shell command per line, executed in sequence
    #[default]
    Shell,
    /// Fixed batch/stage/rasterize visualization pipeline
    Visualization,
}

impl WorkflowKind {
    /// Whether the kind has a file-partitioning implementation.
    pub fn supports_partitioning(self) -> bool {
        match self {
            Self::Shell => true,
            Self::Visualization => false,
        }
    }

    /// Whether the kind compiles into a DAG of recipe command steps.
    pub fn compiles_to_command_dag(self) -> bool {
        match self {
            Self::Shell => true,
            Self::Visualization => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Shell => "shell",
            Self::Visualization => "visualization",
        }
    }
}

impl fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How input work is divided between partitions.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PartitionStrategy {
    /// Fixed number of input files per partition
    #[default]
    Files,
}

/// Parallel execution settings of a recipe.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ParallelConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub partition_strategy: PartitionStrategy,

    /// Files per partition
    #[serde(default = "default_partition_size")]
    pub partition_size: usize,

    /// Maximum number of partition tasks the engine may run at once
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_parallelism: Option<usize>,
}

fn default_partition_size() -> usize {
    DEFAULT_PARTITION_SIZE
}

impl ParallelConfig {
    /// Creates an enabled file-partitioning configuration.
    pub fn files(partition_size: usize) -> Self {
        Self {
            enabled: true,
            partition_strategy: PartitionStrategy::Files,
            partition_size,
            max_parallelism: None,
        }
    }

    pub fn with_max_parallelism(mut self, max: usize) -> Self {
        self.max_parallelism = Some(max);
        self
    }

    /// Effective concurrency ceiling handed to the engine.
    pub fn parallelism(&self) -> usize {
        self.max_parallelism.unwrap_or(DEFAULT_MAX_PARALLELISM)
    }
}

/// Where the final output of a recipe is published.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutputPolicy {
    /// Shared persistent volume, kept until overwritten
    #[default]
    Pvc,
    /// Zipped artifact in the engine's artifact store
    Temporary,
    /// DataONE publication, accepted but not published yet
    #[serde(rename = "dataone")]
    DataOne,
}

impl OutputPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pvc => "pvc",
            Self::Temporary => "temporary",
            Self::DataOne => "dataone",
        }
    }
}

impl fmt::Display for OutputPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Origin of an input reference.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    Url,
    FileSystem,
    PvcMount,
}

/// A single recipe input.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct InputParam {
    pub value: String,

    #[serde(rename = "type")]
    pub kind: InputKind,
}

impl InputParam {
    pub fn url(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            kind: InputKind::Url,
        }
    }

    pub fn file(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            kind: InputKind::FileSystem,
        }
    }

    /// Name of the file once fetched into the recipe input directory.
    pub fn file_name(&self) -> &str {
        file_name_of(&self.value)
    }
}

/// Returns the last path segment of a path or URL.
pub fn file_name_of(reference: &str) -> &str {
    let trimmed = reference.trim().trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// An immutable, already-validated recipe.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RecipeDescription {
    /// Unique identifier, usable in Kubernetes object names
    pub id: String,

    /// Human readable name
    #[serde(default)]
    pub name: String,

    /// One single-line shell invocation per pipeline step
    pub commands: Vec<String>,

    /// Ordered input file references
    #[serde(default)]
    pub inputs: Vec<InputParam>,

    #[serde(default)]
    pub kind: WorkflowKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel: Option<ParallelConfig>,

    #[serde(default)]
    pub output: OutputPolicy,
}

impl RecipeDescription {
    /// Creates a shell recipe with the given commands.
    ///
    /// # Example
    ///
    /// ```
    /// use recipeflow::workflow::{ParallelConfig, RecipeDescription};
    ///
    /// let recipe = RecipeDescription::new("ice-basins", vec!["gdalinfo $INPUT_FILE".to_string()])
    ///     .with_parallel(ParallelConfig::files(2));
    /// assert!(recipe.parallel_enabled());
    /// ```
    pub fn new(id: impl Into<String>, commands: Vec<String>) -> Self {
        let id = id.into().trim().to_string();
        Self {
            name: id.clone(),
            id,
            commands,
            inputs: Vec::new(),
            kind: WorkflowKind::Shell,
            parallel: None,
            output: OutputPolicy::Pvc,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_inputs(mut self, inputs: Vec<InputParam>) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn with_kind(mut self, kind: WorkflowKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_parallel(mut self, parallel: ParallelConfig) -> Self {
        self.parallel = Some(parallel);
        self
    }

    pub fn with_output(mut self, output: OutputPolicy) -> Self {
        self.output = output;
        self
    }

    /// Returns the parallel configuration only when it is enabled.
    pub fn active_parallel_config(&self) -> Option<&ParallelConfig> {
        self.parallel.as_ref().filter(|p| p.enabled)
    }

    pub fn parallel_enabled(&self) -> bool {
        self.active_parallel_config().is_some()
    }

    /// Input references in declaration order.
    pub fn input_files(&self) -> Vec<String> {
        self.inputs.iter().map(|p| p.value.clone()).collect()
    }
}
