//! Step Template Builder
//!
//! Turns one recipe command into an executable step task:
//! - Input/output directory derivation
//! - File source selection (whole directory, manifest, directory scan)
//! - Shell script generation
//! - Container template for the workflow engine

use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::{EngineSettings, DEFAULT_WORKFLOW_ROOT};
use crate::environment::context::{
    join_path, EnvBinding, ExecutionContext, FileContext, FileSource,
};
use crate::error::CompileError;
use crate::workflow::model::file_name_of;
use crate::workflow::partition::Partition;

/// One executable unit of the workflow DAG.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StepTask {
    /// Unique task name within the workflow
    pub name: String,
    /// Position of the command in the recipe (0-based)
    pub command_index: usize,
    /// Partition processed by this task, when running in parallel
    pub partition_id: Option<usize>,
    /// Literal recipe command
    pub command: String,
    pub context: ExecutionContext,
}

impl StepTask {
    pub fn input_dir(&self) -> &str {
        &self.context.input_dir
    }

    pub fn output_dir(&self) -> &str {
        &self.context.output_dir
    }

    pub fn env_bindings(&self) -> Vec<EnvBinding> {
        self.context.env_bindings()
    }

    /// Per-file bindings known before the step runs.
    ///
    /// Only manifest-driven steps know their files up front; directory
    /// scans discover them at run time.
    pub fn manifest_files(&self) -> Vec<FileContext> {
        match &self.context.source {
            FileSource::Manifest(files) => files.iter().map(|f| self.context.for_file(f)).collect(),
            FileSource::WholeDirectory | FileSource::DirectoryScan => Vec::new(),
        }
    }

    /// Shell script executed by the step container.
    ///
    /// Per-file iterations run in their own subshell so exported variables
    /// never leak from one file to the next. Any failing file fails the task.
    pub fn script(&self) -> String {
        let mut script = String::from("set -e\n\nmkdir -p \"$OUTPUT_DIR\"\n\n");

        match &self.context.source {
            FileSource::WholeDirectory => {
                script.push_str(&self.command);
                script.push('\n');
            }
            FileSource::Manifest(files) => {
                let names: Vec<String> = files
                    .iter()
                    .map(|f| shell_quote(file_name_of(f)))
                    .collect();

                script.push_str("echo \"Processing partition with files: $PARTITION_MANIFEST\"\n");
                script.push_str(&format!("for name in {}; do\n", names.join(" ")));
                script.push_str(&self.per_file_block(
                    "        export INPUT_FILE=\"$INPUT_DIR/$name\"\n",
                ));
                script.push_str("done\n");
            }
            FileSource::DirectoryScan => {
                script.push_str("if [ ! -d \"$INPUT_DIR\" ]; then\n");
                script.push_str("    echo \"ERROR: Input directory does not exist: $INPUT_DIR\" >&2\n");
                script.push_str("    exit 1\n");
                script.push_str("fi\n\n");
                script.push_str("for path in \"$INPUT_DIR\"/*; do\n");
                script.push_str("    [ -f \"$path\" ] || continue\n");
                script.push_str("    name=$(basename \"$path\")\n");
                script.push_str(&self.per_file_block("        export INPUT_FILE=\"$path\"\n"));
                script.push_str("done\n");
            }
        }

        script
    }

    fn per_file_block(&self, input_binding: &str) -> String {
        let mut block = String::from("    (\n");
        block.push_str(input_binding);
        block.push_str("        export OUTPUT_FILE=\"$OUTPUT_DIR/$name\"\n");
        block.push_str("        echo \"Processing file: $INPUT_FILE\"\n");
        block.push_str(&format!("        {}\n", self.command));
        block.push_str("    )\n");
        block
    }

    /// Container template running this task on the engine.
    pub fn container(&self, settings: &EngineSettings) -> ContainerTemplate {
        ContainerTemplate {
            name: self.name.clone(),
            image: settings.image.clone(),
            command: vec!["sh".to_string(), "-c".to_string()],
            args: vec![self.script()],
            env: self.env_bindings(),
            volume_mounts: vec![VolumeMount::shared(settings)],
            output_archive: None,
        }
    }
}

/// Container definition of a step, independent of the engine wire format.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ContainerTemplate {
    pub name: String,
    pub image: String,
    pub command: Vec<String>,
    pub args: Vec<String>,
    pub env: Vec<EnvBinding>,
    pub volume_mounts: Vec<VolumeMount>,
    /// File kept by the engine as the run's output artifact
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_archive: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VolumeMount {
    pub name: String,
    pub mount_path: String,
}

impl VolumeMount {
    /// The workflow volume every container of a run mounts.
    pub fn shared(settings: &EngineSettings) -> Self {
        Self {
            name: settings.volume_claim.clone(),
            mount_path: settings.mount_path.clone(),
        }
    }
}

/// Builds step tasks for one recipe.
///
/// Directory layout under the workflow root:
///
/// ```text
/// <root>/<recipe_id>/inputs                    fetched recipe inputs
/// <root>/<recipe_id>/output                    published `pvc` output
/// <root>/<recipe_id>/cmd-<i>                   serial step output
/// <root>/<recipe_id>/cmd-<i>-partition-<p>     parallel step output
/// ```
#[derive(Debug, Clone)]
pub struct StepTemplateBuilder {
    recipe_id: String,
    workflow_root: String,
}

impl StepTemplateBuilder {
    pub fn new(recipe_id: impl Into<String>) -> Self {
        Self {
            recipe_id: recipe_id.into(),
            workflow_root: DEFAULT_WORKFLOW_ROOT.to_string(),
        }
    }

    pub fn with_workflow_root(mut self, root: impl Into<String>) -> Self {
        self.workflow_root = root.into();
        self
    }

    fn recipe_dir(&self) -> String {
        join_path(&self.workflow_root, &self.recipe_id)
    }

    /// Directory holding the fetched recipe inputs.
    pub fn input_root(&self) -> String {
        join_path(&self.recipe_dir(), "inputs")
    }

    /// Directory the final outputs are published to under `pvc` output.
    pub fn publish_dir(&self) -> String {
        join_path(&self.recipe_dir(), "output")
    }

    /// Output directory of a step.
    pub fn output_dir(&self, command_index: usize, partition_id: Option<usize>) -> String {
        join_path(&self.recipe_dir(), &task_name(command_index, partition_id))
    }

    /// Input directory of a step: the recipe inputs for the first command,
    /// otherwise the previous command's output for the same partition.
    pub fn input_dir(&self, command_index: usize, partition_id: Option<usize>) -> String {
        match command_index {
            0 => self.input_root(),
            i => self.output_dir(i - 1, partition_id),
        }
    }

    /// Builds the task for `command` at `command_index`.
    ///
    /// `partition` is `None` in serial mode.
    pub fn build(
        &self,
        command: &str,
        command_index: usize,
        partition: Option<&Partition>,
    ) -> Result<StepTask, CompileError> {
        validate_command(command, command_index)?;

        let partition_id = partition.map(|p| p.id);
        let source = match (partition, command_index) {
            (None, _) => FileSource::WholeDirectory,
            (Some(p), 0) => FileSource::Manifest(p.files.clone()),
            (Some(_), _) => FileSource::DirectoryScan,
        };

        let context = ExecutionContext::new(
            self.input_dir(command_index, partition_id),
            self.output_dir(command_index, partition_id),
            source,
        );

        let task = StepTask {
            name: task_name(command_index, partition_id),
            command_index,
            partition_id,
            command: command.trim().to_string(),
            context,
        };

        debug!(
            "Built task '{}': {} -> {}",
            task.name,
            task.input_dir(),
            task.output_dir()
        );

        Ok(task)
    }
}

/// Task name for a command index and optional partition.
pub fn task_name(command_index: usize, partition_id: Option<usize>) -> String {
    match partition_id {
        Some(p) => format!("cmd-{}-partition-{}", command_index, p),
        None => format!("cmd-{}", command_index),
    }
}

/// Enforces the single-line execution contract of recipe commands.
pub fn validate_command(command: &str, index: usize) -> Result<(), CompileError> {
    let invalid = |reason: &str| CompileError::InvalidCommand {
        index,
        command: command.to_string(),
        reason: reason.to_string(),
    };

    if command.contains('\n') || command.contains('\r') {
        return Err(invalid("multi-line commands are not supported"));
    }

    if command.trim().is_empty() {
        return Err(invalid("command is empty"));
    }

    Ok(())
}

/// Wraps a value in single quotes for POSIX shells.
pub(crate) fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
