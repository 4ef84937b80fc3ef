//! DAG Validation
//!
//! Checks the structural invariants of a compiled workflow DAG:
//! - Unique task names
//! - Edge endpoints refer to existing tasks
//! - No cyclic dependencies (Kahn's algorithm)
//! - Disjoint output directories
//! - Every consumer reads the output directory of its producer

use std::collections::{HashMap, HashSet, VecDeque};

use log::{debug, info};
use thiserror::Error;

use super::compiler::WorkflowDag;
use crate::error::CompileError;

/// Structural defects of a compiled DAG.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Duplicate task name: '{0}'")]
    DuplicateTaskName(String),

    #[error("Edge '{from}' -> '{to}' references an unknown task")]
    UnknownEndpoint { from: String, to: String },

    #[error("Workflow DAG contains a cycle")]
    CyclicDependency,

    #[error("Tasks '{first}' and '{second}' both write to '{dir}'")]
    SharedOutputDir { dir: String, first: String, second: String },

    #[error("Task '{task}' does not read the output of its dependency '{producer}'")]
    BrokenWiring { task: String, producer: String },
}

impl From<ValidationError> for CompileError {
    fn from(err: ValidationError) -> Self {
        CompileError::MalformedDag(err.to_string())
    }
}

/// Validates a compiled DAG.
///
/// Returns the task names in a topological order on success.
pub fn validate_dag(dag: &WorkflowDag) -> Result<Vec<String>, CompileError> {
    debug!(
        "Validating DAG of '{}' with {} tasks",
        dag.recipe_id,
        dag.node_count()
    );

    let mut names: HashSet<&str> = HashSet::new();
    for node in &dag.nodes {
        if !names.insert(node.name.as_str()) {
            return Err(ValidationError::DuplicateTaskName(node.name.clone()).into());
        }
    }

    for edge in &dag.edges {
        if !names.contains(edge.from.as_str()) || !names.contains(edge.to.as_str()) {
            return Err(ValidationError::UnknownEndpoint {
                from: edge.from.clone(),
                to: edge.to.clone(),
            }
            .into());
        }
    }

    let mut outputs: HashMap<&str, &str> = HashMap::new();
    for node in &dag.nodes {
        if let Some(first) = outputs.insert(node.output_dir(), node.name.as_str()) {
            return Err(ValidationError::SharedOutputDir {
                dir: node.output_dir().to_string(),
                first: first.to_string(),
                second: node.name.clone(),
            }
            .into());
        }
    }

    for edge in &dag.edges {
        let producer = dag.node(&edge.from);
        let consumer = dag.node(&edge.to);
        if let (Some(producer), Some(consumer)) = (producer, consumer) {
            if consumer.input_dir() != producer.output_dir() {
                return Err(ValidationError::BrokenWiring {
                    task: consumer.name.clone(),
                    producer: producer.name.clone(),
                }
                .into());
            }
        }
    }

    let order = topological_order(dag)?;

    info!("DAG of '{}' validated: {} tasks", dag.recipe_id, order.len());
    Ok(order)
}

/// Orders task names so that every dependency comes first.
///
/// Uses Kahn's algorithm; leftover tasks mean a cycle.
pub fn topological_order(dag: &WorkflowDag) -> Result<Vec<String>, ValidationError> {
    let mut in_degree: HashMap<&str, usize> =
        dag.nodes.iter().map(|n| (n.name.as_str(), 0)).collect();
    let mut successors: HashMap<&str, Vec<&str>> = HashMap::new();

    for edge in &dag.edges {
        if let Some(degree) = in_degree.get_mut(edge.to.as_str()) {
            *degree += 1;
        }
        successors
            .entry(edge.from.as_str())
            .or_default()
            .push(edge.to.as_str());
    }

    // Roots in node order keep the result deterministic
    let mut queue: VecDeque<&str> = dag
        .nodes
        .iter()
        .map(|n| n.name.as_str())
        .filter(|name| in_degree.get(name) == Some(&0))
        .collect();

    let mut sorted: Vec<String> = Vec::with_capacity(dag.nodes.len());

    while let Some(current) = queue.pop_front() {
        sorted.push(current.to_string());

        for &next in successors.get(current).map(Vec::as_slice).unwrap_or(&[]) {
            if let Some(degree) = in_degree.get_mut(next) {
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(next);
                }
            }
        }
    }

    if sorted.len() != dag.nodes.len() {
        return Err(ValidationError::CyclicDependency);
    }

    debug!("Topological order: {:?}", sorted);
    Ok(sorted)
}
