//! gocalls: find every call site of Go functions and methods.
//!
//! This library correlates exported definitions found with a tree-sitter Go
//! syntax tree against references reported by gopls, and describes each
//! call site by its enclosing function and call expression.

#![warn(missing_docs)]
// env_logger is used by src/main.rs (binary), not this library
#![expect(unused_crate_dependencies)]

pub mod analyze;
pub mod cli;
pub mod config;
pub mod correlate;
pub mod error;
pub mod lsp;
pub mod render;
pub mod resolve;

/// Re-export common error types for convenience.
pub use error::{GocallsError, Result};

/// Re-export the orchestrator for convenience.
pub use correlate::{Matcher, ResultEntry};

/// gocalls version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
