//! Subprocess execution with streamed output and a two-stage timeout
//!
//! The child is spawned with both stdio streams piped. Two reader tasks
//! forward each line to the caller's channel while accumulating the full
//! capture. On timeout the child first receives a termination signal;
//! if it is still alive after the grace window it is killed outright.

use relay_core::{TaskOutcome, WorkerError};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Which stream a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSource {
    Stdout,
    Stderr,
}

/// One line of subprocess output, streamed as it appears.
#[derive(Debug, Clone)]
pub struct OutputLine {
    pub source: OutputSource,
    pub text: String,
}

/// Captured result of one task subprocess.
#[derive(Debug, Clone)]
pub struct TaskExecution {
    pub outcome: TaskOutcome,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: i64,
    pub timed_out: bool,
}

/// Spawn the external tool and run it to completion.
///
/// Every output line is sent on `output_tx` as it is read; the sender is
/// dropped when both streams close, so the consumer's loop terminates
/// naturally.
pub async fn run_task(
    tool_path: &str,
    repo_path: &Path,
    command_path: &Path,
    timeout: Duration,
    kill_grace: Duration,
    output_tx: mpsc::UnboundedSender<OutputLine>,
) -> Result<TaskExecution, WorkerError> {
    let start = Instant::now();

    let mut child = Command::new(tool_path)
        .arg(command_path)
        .current_dir(repo_path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| WorkerError::SpawnFailed {
            tool: tool_path.to_string(),
            reason: e.to_string(),
        })?;

    let stdout_task = stream_lines(
        child.stdout.take(),
        OutputSource::Stdout,
        output_tx.clone(),
    );
    let stderr_task = stream_lines(child.stderr.take(), OutputSource::Stderr, output_tx);

    // Wait for exit or deadline.
    let timed_out;
    let status = match tokio::time::timeout(timeout, child.wait()).await {
        Ok(status) => {
            timed_out = false;
            status
        }
        Err(_) => {
            timed_out = true;
            warn!(timeout_secs = timeout.as_secs(), "task deadline passed, terminating child");
            terminate(&mut child, kill_grace).await;
            child.wait().await
        }
    }
    .map_err(|e| WorkerError::SpawnFailed {
        tool: tool_path.to_string(),
        reason: format!("wait failed: {e}"),
    })?;

    let stdout = stdout_task.await.unwrap_or_default();
    let stderr = stderr_task.await.unwrap_or_default();
    let exit_code = status.code().unwrap_or(-1);
    let duration_ms = start.elapsed().as_millis() as i64;

    debug!(exit_code, duration_ms, timed_out, "task subprocess finished");

    Ok(TaskExecution {
        outcome: if exit_code == 0 && !timed_out {
            TaskOutcome::Completed
        } else {
            TaskOutcome::Failed
        },
        exit_code,
        stdout,
        stderr,
        duration_ms,
        timed_out,
    })
}

/// Forward one stream line-by-line, returning the accumulated capture.
fn stream_lines<R>(
    stream: Option<R>,
    source: OutputSource,
    output_tx: mpsc::UnboundedSender<OutputLine>,
) -> JoinHandle<String>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut captured = String::new();
        let Some(stream) = stream else {
            return captured;
        };
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            captured.push_str(&line);
            captured.push('\n');
            let _ = output_tx.send(OutputLine {
                source,
                text: line,
            });
        }
        captured
    })
}

/// Graceful-then-forceful termination: SIGTERM, a grace window, SIGKILL.
async fn terminate(child: &mut Child, grace: Duration) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        // Ask nicely first.
        let sent = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) } == 0;
        if sent {
            let deadline = Instant::now() + grace;
            while Instant::now() < deadline {
                match child.try_wait() {
                    Ok(Some(_)) => return,
                    Ok(None) => tokio::time::sleep(Duration::from_millis(100)).await,
                    Err(_) => break,
                }
            }
        }
    }
    if let Err(e) = child.start_kill() {
        warn!(%e, "forceful kill failed");
    }
}

// ============================================================================
// TESTS
// ============================================================================
