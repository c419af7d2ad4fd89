//! Run configuration: workspace root, tool locations and request timeout.

use crate::error::{GocallsError, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default bound on a single language server request, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Arguments gopls is started with. `-remote=auto` shares a daemon between
/// runs so repeated invocations skip the workspace load.
pub const DEFAULT_GOPLS_ARGS: &[&str] = &["-remote=auto"];

/// Values supplied on the command line; `None` means "discover".
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Workspace root directory.
    pub workspace: Option<PathBuf>,
    /// Path to the gopls binary.
    pub gopls: Option<PathBuf>,
    /// Path to the go binary.
    pub go: Option<PathBuf>,
    /// Request timeout in seconds; `0` disables it.
    pub timeout_secs: Option<u64>,
}

/// Resolved configuration for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Absolute workspace root; references outside it are dropped.
    pub workspace_root: PathBuf,
    /// gopls executable.
    pub gopls: PathBuf,
    /// Extra arguments for gopls.
    pub gopls_args: Vec<String>,
    /// go executable, used for package resolution.
    pub go: PathBuf,
    /// Bound on each request, `None` for no bound.
    pub request_timeout: Option<Duration>,
}

impl Config {
    /// Build the configuration, locating tools on `PATH` unless given.
    pub fn discover(overrides: &ConfigOverrides) -> Result<Self> {
        let workspace = overrides
            .workspace
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));
        let workspace_root =
            std::path::absolute(&workspace).map_err(|e| GocallsError::io(&workspace, e))?;
        let metadata =
            std::fs::metadata(&workspace_root).map_err(|e| GocallsError::io(&workspace_root, e))?;
        if !metadata.is_dir() {
            return Err(GocallsError::Other(format!(
                "workspace {} is not a directory",
                workspace_root.display()
            )));
        }

        let config = Config {
            gopls: find_tool("gopls", overrides.gopls.as_deref())?,
            go: find_tool("go", overrides.go.as_deref())?,
            gopls_args: DEFAULT_GOPLS_ARGS.iter().map(|s| s.to_string()).collect(),
            request_timeout: timeout_from_secs(
                overrides.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
            workspace_root,
        };
        log::debug!("{:?}", config);
        Ok(config)
    }
}

/// `0` disables the timeout.
pub fn timeout_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

fn find_tool(tool: &str, explicit: Option<&Path>) -> Result<PathBuf> {
    let found = match explicit {
        Some(path) => which::which(path),
        None => which::which(tool),
    };
    found.map_err(|e| GocallsError::ToolNotFound {
        tool: tool.to_string(),
        message: match explicit {
            Some(path) => format!("{}: {}", path.display(), e),
            None => format!("not on PATH ({})", e),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[cfg(unix)]
    fn fake_tool(dir: &Path, name: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        std::fs::write(&path, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn test_timeout_zero_disables() {
        assert_eq!(timeout_from_secs(0), None);
        assert_eq!(timeout_from_secs(5), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_missing_explicit_tool() {
        let dir = TempDir::new().unwrap();
        let overrides = ConfigOverrides {
            workspace: Some(dir.path().to_path_buf()),
            gopls: Some(dir.path().join("no-such-gopls")),
            ..Default::default()
        };
        match Config::discover(&overrides) {
            Err(GocallsError::ToolNotFound { tool, .. }) => assert_eq!(tool, "gopls"),
            other => panic!("expected ToolNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_workspace_must_exist() {
        let dir = TempDir::new().unwrap();
        let overrides = ConfigOverrides {
            workspace: Some(dir.path().join("missing")),
            ..Default::default()
        };
        assert!(matches!(
            Config::discover(&overrides),
            Err(GocallsError::Io { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_explicit_tools_win() {
        let dir = TempDir::new().unwrap();
        let gopls = fake_tool(dir.path(), "gopls");
        let go = fake_tool(dir.path(), "go");
        let overrides = ConfigOverrides {
            workspace: Some(dir.path().to_path_buf()),
            gopls: Some(gopls.clone()),
            go: Some(go.clone()),
            timeout_secs: Some(0),
        };
        let config = Config::discover(&overrides).unwrap();
        assert_eq!(config.gopls, gopls);
        assert_eq!(config.go, go);
        assert_eq!(config.gopls_args, vec!["-remote=auto".to_string()]);
        assert_eq!(config.request_timeout, None);
        assert!(config.workspace_root.is_absolute());
    }
}
