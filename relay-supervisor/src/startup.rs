//! Startup checks
//!
//! All three checks must pass before the supervisor declares readiness:
//! the external tool answers a version probe, the repository path is a
//! directory, and the bus answers a liveness probe. Failures are fatal.

use relay_core::WorkerError;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tracing::info;

/// Verify the external tool is invocable.
pub async fn probe_tool(tool_path: &str) -> Result<(), WorkerError> {
    let probe = Command::new(tool_path)
        .arg("--version")
        .kill_on_drop(true)
        .output();

    let output = tokio::time::timeout(Duration::from_secs(10), probe)
        .await
        .map_err(|_| WorkerError::ToolUnavailable {
            tool: tool_path.to_string(),
            reason: "version probe timed out".to_string(),
        })?
        .map_err(|e| WorkerError::ToolUnavailable {
            tool: tool_path.to_string(),
            reason: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(WorkerError::ToolUnavailable {
            tool: tool_path.to_string(),
            reason: format!(
                "version probe exited with {}",
                output.status.code().unwrap_or(-1)
            ),
        });
    }

    let version = String::from_utf8_lossy(&output.stdout);
    info!(tool = %tool_path, version = %version.trim(), "external tool probe ok");
    Ok(())
}

/// Verify the repository path exists and is a directory.
pub fn check_repo(path: &Path) -> Result<(), WorkerError> {
    if !path.is_dir() {
        return Err(WorkerError::InvalidRepoPath {
            path: path.display().to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_probe_rejects_missing_tool() {
        let err = probe_tool("/no/such/binary-at-all").await.unwrap_err();
        assert!(matches!(err, WorkerError::ToolUnavailable { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_probe_accepts_real_tool() {
        // Any POSIX system has `true`, which ignores --version and exits 0
        probe_tool("true").await.expect("true is invocable");
    }

    #[test]
    fn test_check_repo() {
        assert!(check_repo(&std::env::temp_dir()).is_ok());
        assert!(check_repo(Path::new("/no/such/dir")).is_err());
    }
}
