//! Package identifier → directory and source file resolution.
//!
//! The Go toolchain owns the rules for turning an import path (or a relative
//! directory like `./internal/store`) into the list of files that belong to a
//! build, so resolution shells out to `go list`.

use crate::error::{GocallsError, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Command;

/// A package resolved to its directory and Go source files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPackage {
    /// Canonical import path.
    pub import_path: String,

    /// Absolute package directory.
    pub dir: PathBuf,

    /// Absolute paths of the non-test Go files in the build.
    pub files: Vec<PathBuf>,
}

/// Maps a package identifier to its files.
pub trait PackageResolver {
    /// Resolve `package`, failing with [`GocallsError::Resolution`] when it
    /// cannot be located.
    fn resolve(&self, package: &str) -> Result<ResolvedPackage>;
}

/// Resolves packages with `go list -json`, run from the workspace root.
#[derive(Debug, Clone)]
pub struct GoListResolver {
    go: PathBuf,
    workspace_root: PathBuf,
}

/// The subset of `go list -json` output we read.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GoListPackage {
    dir: PathBuf,
    import_path: String,
    #[serde(default)]
    go_files: Vec<String>,
    #[serde(default)]
    error: Option<GoListError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GoListError {
    err: String,
}

impl GoListResolver {
    /// Create a resolver using the `go` binary at `go`.
    pub fn new(go: impl Into<PathBuf>, workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            go: go.into(),
            workspace_root: workspace_root.into(),
        }
    }

    fn resolution_error(package: &str, message: impl Into<String>) -> GocallsError {
        GocallsError::Resolution {
            package: package.to_string(),
            message: message.into(),
        }
    }
}

impl PackageResolver for GoListResolver {
    fn resolve(&self, package: &str) -> Result<ResolvedPackage> {
        let output = Command::new(&self.go)
            .args(["list", "-json", package])
            .current_dir(&self.workspace_root)
            .output()
            .map_err(|e| {
                Self::resolution_error(
                    package,
                    format!("failed to run {}: {}", self.go.display(), e),
                )
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Self::resolution_error(package, stderr.trim()));
        }

        parse_go_list(package, &output.stdout)
    }
}

/// Decode a single-package `go list -json` document.
fn parse_go_list(package: &str, stdout: &[u8]) -> Result<ResolvedPackage> {
    let listed: GoListPackage = serde_json::from_slice(stdout).map_err(|e| {
        GoListResolver::resolution_error(package, format!("unexpected go list output: {}", e))
    })?;

    if let Some(error) = listed.error {
        return Err(GoListResolver::resolution_error(package, error.err));
    }

    let files = listed
        .go_files
        .iter()
        .map(|name| listed.dir.join(name))
        .collect();

    Ok(ResolvedPackage {
        import_path: listed.import_path,
        dir: listed.dir,
        files,
    })
}
