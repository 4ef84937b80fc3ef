//! Recipe Compilation Module
//!
//! Provides data structures and utilities for loading recipes and
//! compiling them into workflow DAGs.
//!
//! # Structure
//!
//! - [`model`]: Recipe data structures
//! - [`parser`]: Recipe directory loading
//! - [`partition`]: Input file partitioning
//! - [`compiler`]: DAG compilation
//! - [`validator`]: DAG invariant checks

pub mod compiler;
pub mod model;
pub mod parser;
pub mod partition;
pub mod validator;

pub use compiler::{DagCompiler, DagEdge, WorkflowDag};
pub use model::{
    InputKind, InputParam, OutputPolicy, ParallelConfig, PartitionStrategy, RecipeDescription,
    WorkflowKind,
};
pub use parser::load_recipe;
pub use partition::{plan, Partition};
pub use validator::validate_dag;
