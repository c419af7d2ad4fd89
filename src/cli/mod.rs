//! Command-line interface for gocalls.
//!
//! This module handles argument parsing and the JSON error payload only.
//! No analysis or server interaction happens here.

use crate::config::ConfigOverrides;
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;

/// gocalls: find every call site of Go functions and methods.
#[derive(Parser, Debug)]
#[command(name = "gocalls")]
#[command(author, version, about, long_about = None)]
#[command(subcommand_required = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Emit debug logging to stderr (RUST_LOG takes precedence).
    #[arg(short, long, global = true)]
    pub debug: bool,
}

/// Available gocalls commands.
#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Find and print references to specific functions or methods.
    ///
    /// Each pattern is a glob on a function name (`New*`), or
    /// `Type.Method` with a glob on each side (`Client.Do`, `*.Close`).
    ///
    /// The listing is plain text: call snippets are printed with no syntax
    /// colouring.
    Refs {
        /// Package holding the definitions: import path or relative directory.
        package: String,

        /// Function or Type.Method patterns.
        #[arg(required = true, num_args = 1..)]
        patterns: Vec<String>,

        /// Output format.
        #[arg(short, long = "fmt", value_enum, default_value_t = OutputFormat::Print)]
        fmt: OutputFormat,

        /// Path to gopls (default: found on PATH).
        #[arg(long, value_name = "PATH")]
        gopls: Option<PathBuf>,

        /// Path to go (default: found on PATH).
        #[arg(long, value_name = "PATH")]
        go: Option<PathBuf>,

        /// Per-request timeout in seconds; 0 disables it.
        #[arg(long, value_name = "SECS", default_value_t = crate::config::DEFAULT_TIMEOUT_SECS)]
        timeout: u64,

        /// Workspace root (default: current directory).
        #[arg(short = 'C', long, value_name = "DIR")]
        workspace: Option<PathBuf>,
    },
}

/// Output format for results.
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human readable listing (plain text, no syntax colouring).
    Print,
    /// One JSON object per line.
    Json,
}

impl Commands {
    /// Configuration overrides carried by the command's flags.
    pub fn config_overrides(&self) -> ConfigOverrides {
        match self {
            Commands::Refs {
                gopls,
                go,
                timeout,
                workspace,
                ..
            } => ConfigOverrides {
                workspace: workspace.clone(),
                gopls: gopls.clone(),
                go: go.clone(),
                timeout_secs: Some(*timeout),
            },
        }
    }
}

/// Parse command-line arguments.
///
/// Exits with a usage message on invalid arguments.
pub fn parse_args() -> Cli {
    Cli::parse()
}

/// JSON error payload for CLI responses.
#[derive(Serialize)]
pub struct CliErrorPayload {
    /// Status indicator ("error").
    pub status: &'static str,
    /// Structured error details.
    pub error: ErrorDetails,
}

/// Details for a CLI error payload.
#[derive(Serialize)]
pub struct ErrorDetails {
    /// Error kind identifier (ProtocolError, etc.).
    pub kind: &'static str,
    /// Human-readable message.
    pub message: String,
    /// Optional file context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl CliErrorPayload {
    /// Build payload from a GocallsError instance.
    pub fn from_error(error: &crate::GocallsError) -> Self {
        let file = error
            .file_path()
            .map(|path| path.to_string_lossy().to_string());

        CliErrorPayload {
            status: "error",
            error: ErrorDetails {
                kind: error.kind(),
                message: error.to_string(),
                file,
            },
        }
    }
}
