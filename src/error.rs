//! Gocalls error types.
//!
//! All errors are typed and provide root cause information.

use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Main error type for gocalls operations.
#[derive(Error, Debug)]
pub enum GocallsError {
    /// I/O error during file or process operations.
    #[error("I/O error for path {path}: {source}")]
    Io {
        /// The file path that caused the I/O error.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Source file could not be parsed as Go.
    #[error("Parse error in {file}: {message}")]
    Parse {
        /// The file that failed to parse.
        file: PathBuf,
        /// The parse error message.
        message: String,
    },

    /// Package identifier could not be resolved to a directory.
    #[error("Cannot resolve package '{package}': {message}")]
    Resolution {
        /// The package identifier as given by the caller.
        package: String,
        /// Why resolution failed (usually `go list` stderr).
        message: String,
    },

    /// A function pattern is not a valid glob.
    #[error("Invalid pattern '{pattern}': {message}")]
    Pattern {
        /// The offending pattern.
        pattern: String,
        /// The glob parser's message.
        message: String,
    },

    /// A line/column position lies outside the file.
    #[error("Invalid position {file}:{line}:{column}: {message}")]
    Position {
        /// File the position refers to.
        file: PathBuf,
        /// Line number (1-based).
        line: usize,
        /// Column number (1-based, UTF-16 code units).
        column: usize,
        /// What is wrong with the position.
        message: String,
    },

    /// No call expression encloses the position.
    #[error("No call expression at {file}:{line}:{column}")]
    NoCallExpression {
        /// File the position refers to.
        file: PathBuf,
        /// Line number (1-based).
        line: usize,
        /// Column number (1-based, UTF-16 code units).
        column: usize,
    },

    /// Malformed frame or unexpected message shape from the language server.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The language server answered with an error payload.
    #[error("Server error {code} in '{method}': {message}")]
    Server {
        /// The request method that failed.
        method: String,
        /// JSON-RPC error code.
        code: i64,
        /// The server's message, verbatim.
        message: String,
    },

    /// No response arrived within the request timeout.
    #[error("Timed out after {}s waiting for '{method}'", timeout.as_secs())]
    Timeout {
        /// The request method that was pending.
        method: String,
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// Operation not valid in the current session state.
    #[error("Session error: {0}")]
    Session(String),

    /// A required external tool is not available.
    #[error("{tool} not found: {message}")]
    ToolNotFound {
        /// The tool name (`gopls`, `go`).
        tool: String,
        /// Lookup failure details.
        message: String,
    },

    /// JSON encoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{0}")]
    Other(String),
}

impl GocallsError {
    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GocallsError::Io {
            path: path.into(),
            source,
        }
    }

    /// Stable identifier for the error kind, used in JSON error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            GocallsError::Io { .. } => "Io",
            GocallsError::Parse { .. } => "ParseError",
            GocallsError::Resolution { .. } => "ResolutionError",
            GocallsError::Pattern { .. } => "PatternError",
            GocallsError::Position { .. } => "PositionError",
            GocallsError::NoCallExpression { .. } => "NoCallExpressionError",
            GocallsError::Protocol(_) => "ProtocolError",
            GocallsError::Server { .. } => "ServerError",
            GocallsError::Timeout { .. } => "TimeoutError",
            GocallsError::Session(_) => "SessionError",
            GocallsError::ToolNotFound { .. } => "ToolNotFound",
            GocallsError::Json(_) => "JsonError",
            GocallsError::Other(_) => "Other",
        }
    }

    /// The file involved in the error, if any.
    pub fn file_path(&self) -> Option<&Path> {
        match self {
            GocallsError::Io { path, .. } => Some(path),
            GocallsError::Parse { file, .. }
            | GocallsError::Position { file, .. }
            | GocallsError::NoCallExpression { file, .. } => Some(file),
            _ => None,
        }
    }
}

impl From<std::io::Error> for GocallsError {
    fn from(err: std::io::Error) -> Self {
        GocallsError::Io {
            path: PathBuf::from("<unknown>"),
            source: err,
        }
    }
}

/// Result type alias for gocalls operations.
pub type Result<T> = std::result::Result<T, GocallsError>;
