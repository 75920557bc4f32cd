//! Error types for RELAY operations

use thiserror::Error;

/// Bus transport errors.
#[derive(Debug, Clone, Error)]
pub enum BusError {
    #[error("Failed to connect to bus at {url}: {reason}")]
    ConnectFailed { url: String, reason: String },

    #[error("Publish to '{channel}' failed: {reason}")]
    PublishFailed { channel: String, reason: String },

    #[error("Subscribe to '{channel}' failed: {reason}")]
    SubscribeFailed { channel: String, reason: String },

    #[error("Bus liveness probe failed: {reason}")]
    PingFailed { reason: String },

    #[error("Bus client is closed")]
    Closed,
}

/// Request/response correlation errors, surfaced to waiting callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// The tracked request's deadline passed with no response. The
    /// rendering is part of the observable contract: it is forwarded
    /// verbatim to the LLM as an error tool result.
    #[error("Agent {agent} did not respond within {timeout_ms} ms")]
    Timeout { agent: String, timeout_ms: i64 },

    #[error("Request to {agent} rejected: {reason}")]
    Rejected { agent: String, reason: String },

    /// The tracking slot vanished before a result was delivered.
    #[error("Pending request slot dropped before completion")]
    SlotDropped,
}

/// Structural validation errors for inbound bus messages.
#[derive(Debug, Clone, Error)]
pub enum ProtocolError {
    #[error("Response envelope {id} is missing in_response_to")]
    MissingCorrelation { id: String },

    #[error("Envelope {id} of kind '{kind}' must not carry in_response_to")]
    UnexpectedCorrelation { id: String, kind: &'static str },

    #[error("Malformed payload: {reason}")]
    MalformedPayload { reason: String },
}

/// Activity-log store errors. Never fatal on a bus path.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Failed to connect to log store: {reason}")]
    ConnectFailed { reason: String },

    #[error("Insert into {table} failed: {reason}")]
    InsertFailed { table: &'static str, reason: String },

    #[error("Log store health check failed: {reason}")]
    HealthCheckFailed { reason: String },
}

/// LLM provider errors.
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    #[error("Request to {provider} failed: {message}")]
    RequestFailed { provider: String, message: String },

    #[error("Invalid API key for {provider}")]
    InvalidApiKey { provider: String },

    #[error("Rate limited by {provider}")]
    RateLimited { provider: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },
}

/// Worker supervisor errors.
#[derive(Debug, Clone, Error)]
pub enum WorkerError {
    #[error("Invalid worker transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("External tool '{tool}' is not invocable: {reason}")]
    ToolUnavailable { tool: String, reason: String },

    #[error("Repository path '{path}' is not a directory")]
    InvalidRepoPath { path: String },

    #[error("Failed to write command file '{path}': {reason}")]
    CommandFileWrite { path: String, reason: String },

    #[error("Failed to spawn '{tool}': {reason}")]
    SpawnFailed { tool: String, reason: String },
}

/// Configuration errors. Always fatal at startup.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {}", fields.join(", "))]
    MissingRequired { fields: Vec<String> },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

// ============================================================================
// TOP-LEVEL ERROR
// ============================================================================

/// Top-level error wrapping all RELAY error categories.
#[derive(Debug, Clone, Error)]
pub enum RelayError {
    #[error(transparent)]
    Bus(#[from] BusError),

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Worker(#[from] WorkerError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Process-level startup failures that fit no other category, such
    /// as a listener that cannot bind.
    #[error("Startup failed: {reason}")]
    Startup { reason: String },
}

/// Result alias used across the workspace.
pub type RelayResult<T> = Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message_rendering() {
        let err = RequestError::Timeout {
            agent: "researcher".to_string(),
            timeout_ms: 1000,
        };
        assert_eq!(
            err.to_string(),
            "Agent researcher did not respond within 1000 ms"
        );
    }

    #[test]
    fn test_missing_required_lists_all_fields() {
        let err = ConfigError::MissingRequired {
            fields: vec![
                "RELAY_ANTHROPIC_API_KEY".to_string(),
                "RELAY_REPO_PATH".to_string(),
            ],
        };
        let rendered = err.to_string();
        assert!(rendered.contains("RELAY_ANTHROPIC_API_KEY"));
        assert!(rendered.contains("RELAY_REPO_PATH"));
    }

    #[test]
    fn test_relay_error_wraps_categories() {
        let err: RelayError = BusError::Closed.into();
        assert!(matches!(err, RelayError::Bus(_)));

        let err: RelayError = RequestError::SlotDropped.into();
        assert_eq!(err.to_string(), "Pending request slot dropped before completion");
    }
}
