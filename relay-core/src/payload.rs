//! Typed envelope payloads
//!
//! Envelopes carry `serde_json::Value` payloads on the wire; these structs
//! give every well-known payload a schema. Producers build them, consumers
//! parse them with [`crate::Envelope::payload_as`].

use crate::identity::{TaskId, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

// ============================================================================
// GATEWAY <-> ORCHESTRATOR
// ============================================================================

/// A stamped human message published on `human-input`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HumanInput {
    /// Stable conversation partner id; falls back to the WebSocket
    /// client id when the browser does not supply one.
    pub user_id: String,
    /// The raw message text.
    pub content: String,
    /// Stamped by the gateway at receipt.
    pub timestamp: Timestamp,
    /// Where the message entered the system (e.g. "websocket").
    pub source: String,
}

/// A user-visible reply published on `chatter-output`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatterOutput {
    pub user_id: String,
    pub content: String,
    pub timestamp: Timestamp,
    /// Present and true when the content is an error apology.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<bool>,
}

// ============================================================================
// WORKER TASKS
// ============================================================================

/// A job handed to a worker supervisor on its agent channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskAssignment {
    pub task_id: TaskId,
    /// Full markdown command payload, written verbatim to the scratch
    /// file inside the target repository.
    pub command_file: String,
    /// Per-task execution timeout override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_duration: Option<String>,
}

/// A busy worker's immediate answer to a task it cannot take.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRejection {
    /// Always "rejected".
    pub status: String,
    pub reason: String,
}

impl TaskRejection {
    /// The one rejection this system produces: the worker is busy.
    pub fn busy() -> Self {
        Self {
            status: "rejected".to_string(),
            reason: "Worker is busy".to_string(),
        }
    }
}

/// Terminal outcome of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskOutcome {
    Completed,
    Failed,
}

impl fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskOutcome::Completed => f.write_str("completed"),
            TaskOutcome::Failed => f.write_str("failed"),
        }
    }
}

/// Captured subprocess result carried inside a [`TaskCompletion`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// The terminal envelope payload for a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskCompletion {
    pub task_id: TaskId,
    pub status: TaskOutcome,
    pub result: ProcessResult,
    pub duration_ms: i64,
}

/// A streamed chunk of subprocess output on `agent:progress`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub task_id: TaskId,
    pub output: String,
}

// ============================================================================
// STATUS AND BROADCAST
// ============================================================================

/// Periodic worker state on `agent:status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    /// Wire name of the worker status (e.g. "idle", "working").
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_task_id: Option<TaskId>,
    pub completed_count: u64,
    pub uptime_seconds: u64,
}

/// A system command on the `broadcast` channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastCommand {
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl BroadcastCommand {
    /// The shutdown command every agent obeys.
    pub const SHUTDOWN: &'static str = "shutdown";

    pub fn is_shutdown(&self) -> bool {
        self.command == Self::SHUTDOWN
    }
}

/// Helper: serialize any payload struct into an envelope payload value.
///
/// Serialization of these payload types cannot fail; the fallback null
/// keeps the signature infallible for callers on the publish path.
pub fn to_payload<T: Serialize>(value: &T) -> JsonValue {
    serde_json::to_value(value).unwrap_or(JsonValue::Null)
}

// ============================================================================
// TESTS
// ============================================================================
