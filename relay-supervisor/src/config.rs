//! Supervisor configuration

use relay_core::{env_parse, env_string, ConfigError, RequiredVars, WorkerError};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration of one worker supervisor.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Agent identity claimed on the bus (e.g. "frontend"). Required.
    pub agent_name: String,
    /// Repository the subprocess runs in. Required; must be a directory.
    pub repo_path: PathBuf,
    /// Scratch file name, relative to the repository.
    pub command_file: String,
    /// Executable name or absolute path of the external tool.
    pub tool_path: String,
    /// Default per-task execution timeout.
    pub task_timeout: Duration,
    /// Status heartbeat cadence.
    pub heartbeat_interval: Duration,
    /// How long a shutdown waits for the current task to finish.
    pub shutdown_grace: Duration,
    /// Grace between the termination signal and the forceful kill.
    pub kill_grace: Duration,
}

impl SupervisorConfig {
    /// Create from environment variables.
    ///
    /// - `RELAY_AGENT_NAME`: agent identity (required)
    /// - `RELAY_REPO_PATH`: working directory for subprocesses (required)
    /// - `RELAY_COMMAND_FILE`: scratch file name (default: .claude-command.md)
    /// - `RELAY_TOOL_PATH`: external tool executable (default: claude)
    /// - `RELAY_TASK_TIMEOUT_SECS`: default task timeout (default: 1800)
    /// - `RELAY_HEARTBEAT_SECS`: status cadence (default: 60)
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut required = RequiredVars::new();
        let agent_name = required.take("RELAY_AGENT_NAME");
        let repo_path = required.take("RELAY_REPO_PATH");
        required.finish()?;

        Ok(Self {
            agent_name,
            repo_path: PathBuf::from(repo_path),
            command_file: env_string("RELAY_COMMAND_FILE", ".claude-command.md"),
            tool_path: env_string("RELAY_TOOL_PATH", "claude"),
            task_timeout: Duration::from_secs(env_parse("RELAY_TASK_TIMEOUT_SECS", 1800)),
            heartbeat_interval: Duration::from_secs(env_parse("RELAY_HEARTBEAT_SECS", 60)),
            shutdown_grace: Duration::from_secs(30),
            kill_grace: Duration::from_secs(5),
        })
    }

    /// Validate filesystem preconditions.
    pub fn validate(&self) -> Result<(), WorkerError> {
        if !self.repo_path.is_dir() {
            return Err(WorkerError::InvalidRepoPath {
                path: self.repo_path.display().to_string(),
            });
        }
        Ok(())
    }

    /// Absolute path of the scratch command file.
    pub fn command_path(&self) -> PathBuf {
        self.repo_path.join(&self.command_file)
    }
}
