//! DAG Compiler
//!
//! Compiles a recipe into a workflow DAG:
//! - Serial recipes become a chain of one task per command
//! - Parallel recipes become one independent branch per input partition
//! - Recipe inputs and the output policy travel with the DAG for the
//!   fetch and publish stages around it
//!
//! Compilation is pure: the same recipe always yields the same DAG.

use std::collections::BTreeMap;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::model::{InputParam, OutputPolicy, RecipeDescription};
use super::partition::{plan, Partition};
use super::validator::validate_dag;
use crate::config::{EngineSettings, DEFAULT_WORKFLOW_ROOT};
use crate::error::CompileError;
use crate::execution::step::{task_name, validate_command, StepTask, StepTemplateBuilder};

/// Dependency edge: `to` starts only after `from` succeeded.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct DagEdge {
    pub from: String,
    pub to: String,
}

impl DagEdge {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Compiled workflow, ready for submission.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct WorkflowDag {
    pub recipe_id: String,
    /// Tasks ordered by command index, then partition
    pub nodes: Vec<StepTask>,
    pub edges: Vec<DagEdge>,
    /// Ceiling on concurrently running tasks, set for parallel recipes
    pub parallelism: Option<usize>,
    /// Recipe inputs, staged into `input_root` before any task runs
    pub inputs: Vec<InputParam>,
    pub input_root: String,
    /// What happens to the final task outputs once every task succeeded
    pub output: OutputPolicy,
    /// Destination of `pvc` output
    pub publish_dir: String,
}

impl WorkflowDag {
    pub fn new(recipe_id: impl Into<String>) -> Self {
        Self {
            recipe_id: recipe_id.into(),
            nodes: Vec::new(),
            edges: Vec::new(),
            parallelism: None,
            inputs: Vec::new(),
            input_root: String::new(),
            output: OutputPolicy::default(),
            publish_dir: String::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn node(&self, name: &str) -> Option<&StepTask> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// Finds the task for a command and partition.
    pub fn task(&self, command_index: usize, partition_id: Option<usize>) -> Option<&StepTask> {
        self.nodes
            .iter()
            .find(|n| n.command_index == command_index && n.partition_id == partition_id)
    }

    /// Names of the tasks `name` waits for.
    pub fn dependencies_of(&self, name: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|e| e.to == name)
            .map(|e| e.from.as_str())
            .collect()
    }

    /// Names of the tasks waiting for `name`.
    pub fn dependents_of(&self, name: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|e| e.from == name)
            .map(|e| e.to.as_str())
            .collect()
    }

    /// Tasks nothing depends on: their outputs are the recipe's results.
    pub fn final_tasks(&self) -> Vec<&StepTask> {
        self.nodes
            .iter()
            .filter(|n| self.dependents_of(&n.name).is_empty())
            .collect()
    }

    /// Tasks grouped by command index.
    pub fn layers(&self) -> Vec<Vec<&StepTask>> {
        let mut layers: BTreeMap<usize, Vec<&StepTask>> = BTreeMap::new();
        for node in &self.nodes {
            layers.entry(node.command_index).or_default().push(node);
        }
        layers.into_values().collect()
    }

    /// Number of independent partition branches (0 for serial DAGs).
    pub fn partition_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.command_index == 0 && n.partition_id.is_some())
            .count()
    }
}

/// Compiles recipes into workflow DAGs.
#[derive(Debug, Clone)]
pub struct DagCompiler {
    workflow_root: String,
}

impl Default for DagCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl DagCompiler {
    pub fn new() -> Self {
        Self {
            workflow_root: DEFAULT_WORKFLOW_ROOT.to_string(),
        }
    }

    /// Compiler whose step directories live on the engine's shared volume.
    pub fn from_settings(settings: &EngineSettings) -> Self {
        Self {
            workflow_root: settings.mount_path.clone(),
        }
    }

    /// Compiles `recipe` into a validated DAG.
    ///
    /// A parallel recipe without input files compiles to an empty DAG.
    pub fn compile(&self, recipe: &RecipeDescription) -> Result<WorkflowDag, CompileError> {
        if !recipe.kind.compiles_to_command_dag() {
            return Err(CompileError::UnsupportedWorkflowType {
                kind: recipe.kind,
                reason: "no command DAG compilation strategy".to_string(),
            });
        }

        // Commands are checked even when no partition would run them.
        for (index, command) in recipe.commands.iter().enumerate() {
            validate_command(command, index)?;
        }

        let builder = StepTemplateBuilder::new(&recipe.id).with_workflow_root(&self.workflow_root);

        let mut dag = match recipe.active_parallel_config() {
            Some(parallel) => {
                if !recipe.kind.supports_partitioning() {
                    return Err(CompileError::UnsupportedWorkflowType {
                        kind: recipe.kind,
                        reason: "parallel execution is not supported".to_string(),
                    });
                }

                if parallel.max_parallelism == Some(0) {
                    return Err(CompileError::Configuration(
                        "max_parallelism must be a positive integer".to_string(),
                    ));
                }

                let partitions = plan(&recipe.input_files(), parallel.partition_size)?;
                let mut dag = self.compile_parallel(recipe, &builder, &partitions)?;
                dag.parallelism = Some(parallel.parallelism());
                dag
            }
            None => self.compile_serial(recipe, &builder)?,
        };
        dag.inputs = recipe.inputs.clone();
        dag.input_root = builder.input_root();
        dag.output = recipe.output;
        dag.publish_dir = builder.publish_dir();

        validate_dag(&dag)?;

        info!(
            "Compiled recipe '{}': {} tasks, {} edges",
            recipe.id,
            dag.node_count(),
            dag.edge_count()
        );

        Ok(dag)
    }

    fn compile_serial(
        &self,
        recipe: &RecipeDescription,
        builder: &StepTemplateBuilder,
    ) -> Result<WorkflowDag, CompileError> {
        let mut dag = WorkflowDag::new(&recipe.id);

        for (index, command) in recipe.commands.iter().enumerate() {
            let task = builder.build(command, index, None)?;
            if let Some(previous) = dag.nodes.last() {
                dag.edges.push(DagEdge::new(&previous.name, &task.name));
            }
            dag.nodes.push(task);
        }

        debug!("Serial chain of {} tasks", dag.node_count());
        Ok(dag)
    }

    fn compile_parallel(
        &self,
        recipe: &RecipeDescription,
        builder: &StepTemplateBuilder,
        partitions: &[Partition],
    ) -> Result<WorkflowDag, CompileError> {
        let mut dag = WorkflowDag::new(&recipe.id);

        for (index, command) in recipe.commands.iter().enumerate() {
            for partition in partitions {
                let task = builder.build(command, index, Some(partition))?;
                if index > 0 {
                    let previous = task_name(index - 1, Some(partition.id));
                    dag.edges.push(DagEdge::new(previous, &task.name));
                }
                dag.nodes.push(task);
            }
        }

        if partitions.is_empty() {
            info!("Recipe '{}' has no input files, nothing to run in parallel", recipe.id);
        } else {
            debug!(
                "{} partition branches of {} tasks",
                partitions.len(),
                recipe.commands.len()
            );
        }

        Ok(dag)
    }
}
