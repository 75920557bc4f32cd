//! Orchestrator configuration

use relay_core::env_parse;
use std::time::Duration;

/// Numeric knobs of the turn loop, all with defaults.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Maximum turns kept per conversation; oldest dropped first.
    pub history_cap: usize,
    /// Conversations idle longer than this are evicted on sweep.
    pub idle_timeout: Duration,
    /// Deadline for each agent-consultation tool call.
    pub tool_timeout: Duration,
    /// Execution timeout forwarded with task assignments.
    pub task_timeout: Duration,
    /// Safety cap on tool rounds within one turn.
    pub max_tool_iterations: usize,
    /// Cadence of the conversation/correlation sweeper.
    pub sweep_interval: Duration,
    /// Worker status entries expire after this long without a heartbeat
    /// (two missed 60-second heartbeats).
    pub status_expiry: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            history_cap: 50,
            idle_timeout: Duration::from_secs(3600),
            tool_timeout: Duration::from_secs(300),
            task_timeout: Duration::from_secs(1800),
            max_tool_iterations: 8,
            sweep_interval: Duration::from_secs(60),
            status_expiry: Duration::from_secs(120),
        }
    }
}

impl OrchestratorConfig {
    /// Create from environment variables.
    ///
    /// - `RELAY_HISTORY_CAP`: conversation history cap (default: 50)
    /// - `RELAY_CONVERSATION_IDLE_SECS`: idle eviction threshold (default: 3600)
    /// - `RELAY_TOOL_TIMEOUT_SECS`: per-tool-call deadline (default: 300)
    /// - `RELAY_TASK_TIMEOUT_SECS`: forwarded task timeout (default: 1800)
    /// - `RELAY_MAX_TOOL_ITERATIONS`: tool-round safety cap (default: 8)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            history_cap: env_parse("RELAY_HISTORY_CAP", defaults.history_cap),
            idle_timeout: Duration::from_secs(env_parse(
                "RELAY_CONVERSATION_IDLE_SECS",
                defaults.idle_timeout.as_secs(),
            )),
            tool_timeout: Duration::from_secs(env_parse(
                "RELAY_TOOL_TIMEOUT_SECS",
                defaults.tool_timeout.as_secs(),
            )),
            task_timeout: Duration::from_secs(env_parse(
                "RELAY_TASK_TIMEOUT_SECS",
                defaults.task_timeout.as_secs(),
            )),
            max_tool_iterations: env_parse(
                "RELAY_MAX_TOOL_ITERATIONS",
                defaults.max_tool_iterations,
            ),
            sweep_interval: defaults.sweep_interval,
            status_expiry: defaults.status_expiry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.history_cap, 50);
        assert_eq!(config.idle_timeout, Duration::from_secs(3600));
        assert_eq!(config.tool_timeout, Duration::from_secs(300));
        assert_eq!(config.task_timeout, Duration::from_secs(1800));
        assert_eq!(config.status_expiry, Duration::from_secs(120));
    }
}
