//! recipeflow - Recipe Compiler for Argo Workflows
//!
//! Compiles data-processing recipes (an ordered list of shell commands and
//! a set of input files) into workflow DAGs, optionally fanning the inputs
//! out into independent partitions, and manages the resulting runs on an
//! Argo Workflows server.
//!
//! # Architecture
//!
//! The library is organized into these modules:
//!
//! - [`workflow`]: Recipe model, loading, partitioning, and DAG compilation
//! - [`execution`]: Step templates, engine backend, and run lifecycle
//! - [`environment`]: Typed execution context of each step
//! - [`monitoring`]: Status timeline of a watched run
//! - [`config`]: Engine connection settings
//! - [`error`]: Error types
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use recipeflow::config::EngineSettings;
//! use recipeflow::{load_recipe, ArgoEngine, DagCompiler, RetentionPolicy, WorkflowManager};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Load and compile a recipe
//!     let recipe = load_recipe("recipes/ice-basins")?;
//!     let dag = DagCompiler::new().compile(&recipe)?;
//!
//!     // Submit it and wait for the outcome
//!     let manager = WorkflowManager::new(ArgoEngine::new(EngineSettings::from_env())?);
//!     let run = manager.submit(&dag, RetentionPolicy::for_recipe(&recipe))?;
//!     let done = manager.await_terminal(&run, Duration::from_secs(5), Duration::from_secs(3600))?;
//!
//!     println!("{}: {}", done.workflow_name, done.status);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod environment;
pub mod error;
pub mod execution;
pub mod monitoring;
pub mod workflow;

// Re-export commonly used types
pub use error::{CompileError, EngineError, LifecycleError, RecipeError, SubmissionError};
pub use execution::{ArgoEngine, RetentionPolicy, WorkflowManager, WorkflowRun, WorkflowStatus};
pub use workflow::compiler::{DagCompiler, WorkflowDag};
pub use workflow::model::RecipeDescription;
pub use workflow::parser::load_recipe;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "recipeflow";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_version() {
        assert!(!VERSION.is_empty());
        assert!(VERSION.contains('.'));
    }

    #[test]
    fn test_app_name() {
        assert_eq!(APP_NAME, "recipeflow");
    }

    #[test]
    fn test_module_exports_compile() {
        let recipe = RecipeDescription::new("test", vec!["echo test".to_string()]);
        let dag = DagCompiler::new().compile(&recipe).unwrap();
        assert_eq!(dag.node_count(), 1);
    }

    #[test]
    fn test_version_format() {
        let parts: Vec<&str> = VERSION.split('.').collect();
        assert!(parts.len() >= 2, "Version should have at least major.minor");
        for part in parts {
            assert!(part.parse::<u32>().is_ok(), "Version components should be numeric");
        }
    }
}
