//! Step Environment
//!
//! Typed execution context handed to each generated step container.

pub mod context;

pub use context::{EnvBinding, ExecutionContext, FileContext, FileSource};
