//! The envelope - the sole unit of communication on the bus
//!
//! Every message published on any channel is an [`Envelope`]. Request and
//! response envelopes are paired by `in_response_to`; everything else is
//! fire-and-forget.

use crate::error::ProtocolError;
use crate::identity::{EntityIdType, MessageId, Timestamp};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

// ============================================================================
// MESSAGE KIND
// ============================================================================

/// The kind of an envelope, serialized as the `type` wire field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// A job handed to a worker; carries a command payload.
    Task,
    /// A request expecting a correlated response.
    Question,
    /// The terminal answer to a task or question; always correlated.
    Response,
    /// Periodic agent state, not correlated.
    Status,
    /// Streamed, non-terminal output for a running task.
    Progress,
    /// An error notification.
    Error,
}

impl MessageKind {
    /// Wire name of the kind, for log rows and constraint checks.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Task => "task",
            MessageKind::Question => "question",
            MessageKind::Response => "response",
            MessageKind::Status => "status",
            MessageKind::Progress => "progress",
            MessageKind::Error => "error",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// ENVELOPE
// ============================================================================

/// The broadcast target: envelopes addressed to every agent use `"*"`.
pub const BROADCAST_TARGET: &str = "*";

/// The unit of communication on the bus.
///
/// Invariant: `kind == Response` if and only if `in_response_to` is set.
/// The constructors below uphold this; [`Envelope::validate`] checks it
/// for envelopes arriving off the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Unique id generated by the sender; responses echo it back in
    /// `in_response_to`.
    pub id: MessageId,

    /// Sender identity; free-form but stable per process.
    pub from: String,

    /// Target agent name, or `"*"` for broadcasts.
    pub to: String,

    /// Envelope kind (wire field `type`).
    #[serde(rename = "type")]
    pub kind: MessageKind,

    /// Kind-specific structured payload.
    pub payload: JsonValue,

    /// Wall-clock send instant.
    pub timestamp: Timestamp,

    /// Set iff `kind == Response`: the id of the originating request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_response_to: Option<MessageId>,
}

impl Envelope {
    /// Create an envelope with a fresh id and the current timestamp.
    ///
    /// Response envelopes must be built with [`Envelope::response_to`] or
    /// [`Envelope::reply`] so the correlation id is never forgotten.
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        kind: MessageKind,
        payload: JsonValue,
    ) -> Self {
        Self {
            id: MessageId::random(),
            from: from.into(),
            to: to.into(),
            kind,
            payload,
            timestamp: Utc::now(),
            in_response_to: None,
        }
    }

    /// A `question` envelope: a request expecting a correlated response.
    pub fn question(
        from: impl Into<String>,
        to: impl Into<String>,
        payload: JsonValue,
    ) -> Self {
        Self::new(from, to, MessageKind::Question, payload)
    }

    /// A `task` envelope handed to a worker.
    pub fn task(from: impl Into<String>, to: impl Into<String>, payload: JsonValue) -> Self {
        Self::new(from, to, MessageKind::Task, payload)
    }

    /// A broadcast `status` envelope.
    pub fn status(from: impl Into<String>, payload: JsonValue) -> Self {
        Self::new(from, BROADCAST_TARGET, MessageKind::Status, payload)
    }

    /// A `progress` envelope for streamed task output.
    pub fn progress(from: impl Into<String>, payload: JsonValue) -> Self {
        Self::new(from, BROADCAST_TARGET, MessageKind::Progress, payload)
    }

    /// An `error` envelope.
    pub fn error(from: impl Into<String>, to: impl Into<String>, payload: JsonValue) -> Self {
        Self::new(from, to, MessageKind::Error, payload)
    }

    /// The `response` envelope answering `request`, addressed back to its
    /// sender and correlated by its id.
    pub fn response_to(request: &Envelope, from: impl Into<String>, payload: JsonValue) -> Self {
        Self::reply(from, request.from.clone(), request.id, payload)
    }

    /// A `response` envelope correlated to `in_response_to`.
    pub fn reply(
        from: impl Into<String>,
        to: impl Into<String>,
        in_response_to: MessageId,
        payload: JsonValue,
    ) -> Self {
        Self {
            id: MessageId::random(),
            from: from.into(),
            to: to.into(),
            kind: MessageKind::Response,
            payload,
            timestamp: Utc::now(),
            in_response_to: Some(in_response_to),
        }
    }

    /// Check the response/correlation invariant for an envelope that
    /// arrived off the wire.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        match (self.kind, self.in_response_to) {
            (MessageKind::Response, None) => Err(ProtocolError::MissingCorrelation {
                id: self.id.to_string(),
            }),
            (kind, Some(_)) if kind != MessageKind::Response => {
                Err(ProtocolError::UnexpectedCorrelation {
                    id: self.id.to_string(),
                    kind: kind.as_str(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Whether this envelope is the response to the given request id.
    pub fn answers(&self, request_id: MessageId) -> bool {
        self.kind == MessageKind::Response && self.in_response_to == Some(request_id)
    }

    /// Whether this envelope is addressed to every agent.
    pub fn is_broadcast(&self) -> bool {
        self.to == BROADCAST_TARGET
    }

    /// Serialize to the self-describing JSON string put on the wire.
    pub fn to_wire(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::MalformedPayload {
            reason: e.to_string(),
        })
    }

    /// Parse an envelope from its wire form, validating the correlation
    /// invariant.
    pub fn from_wire(raw: &str) -> Result<Self, ProtocolError> {
        let envelope: Envelope =
            serde_json::from_str(raw).map_err(|e| ProtocolError::MalformedPayload {
                reason: e.to_string(),
            })?;
        envelope.validate()?;
        Ok(envelope)
    }

    /// Deserialize the payload into a typed struct.
    pub fn payload_as<T: serde::de::DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        serde_json::from_value(self.payload.clone()).map_err(|e| ProtocolError::MalformedPayload {
            reason: e.to_string(),
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_question_has_no_correlation() {
        let envelope = Envelope::question("chatter", "researcher", json!({"question": "hi"}));
        assert_eq!(envelope.kind, MessageKind::Question);
        assert!(envelope.in_response_to.is_none());
        assert!(envelope.validate().is_ok());
    }

    #[test]
    fn test_response_to_carries_correlation() {
        let request = Envelope::question("chatter", "researcher", json!({"question": "hi"}));
        let response = Envelope::response_to(&request, "researcher", json!({"answer": 42}));

        assert_eq!(response.kind, MessageKind::Response);
        assert_eq!(response.to, "chatter");
        assert_eq!(response.in_response_to, Some(request.id));
        assert!(response.answers(request.id));
        assert!(response.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_uncorrelated_response() {
        let mut envelope = Envelope::question("a", "b", json!({}));
        envelope.kind = MessageKind::Response;
        assert!(matches!(
            envelope.validate(),
            Err(ProtocolError::MissingCorrelation { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_correlated_non_response() {
        let request = Envelope::question("a", "b", json!({}));
        let mut envelope = Envelope::response_to(&request, "b", json!({}));
        envelope.kind = MessageKind::Progress;
        assert!(matches!(
            envelope.validate(),
            Err(ProtocolError::UnexpectedCorrelation { .. })
        ));
    }

    #[test]
    fn test_wire_round_trip() {
        let envelope = Envelope::task(
            "chatter",
            "frontend",
            json!({"task_id": "t-1", "command_file": "# Build the thing"}),
        );
        let wire = envelope.to_wire().expect("serialize");
        let parsed = Envelope::from_wire(&wire).expect("parse");
        assert_eq!(envelope, parsed);
    }

    #[test]
    fn test_wire_field_names() {
        let envelope = Envelope::status("frontend", json!({"status": "idle"}));
        let wire = envelope.to_wire().expect("serialize");
        assert!(wire.contains("\"type\":\"status\""));
        assert!(wire.contains("\"from\":\"frontend\""));
        // Absent correlation is omitted entirely, not null
        assert!(!wire.contains("in_response_to"));
    }

    #[test]
    fn test_from_wire_rejects_garbage() {
        assert!(Envelope::from_wire("{not json").is_err());
        assert!(Envelope::from_wire("{\"type\":\"question\"}").is_err());
    }

    #[test]
    fn test_broadcast_target() {
        let envelope = Envelope::status("backend", json!({}));
        assert!(envelope.is_broadcast());
        let direct = Envelope::question("a", "b", json!({}));
        assert!(!direct.is_broadcast());
    }

    #[test]
    fn test_kind_as_str_matches_wire() {
        for (kind, name) in [
            (MessageKind::Task, "task"),
            (MessageKind::Question, "question"),
            (MessageKind::Response, "response"),
            (MessageKind::Status, "status"),
            (MessageKind::Progress, "progress"),
            (MessageKind::Error, "error"),
        ] {
            assert_eq!(kind.as_str(), name);
            let json = serde_json::to_string(&kind).expect("serialize kind");
            assert_eq!(json, format!("\"{}\"", name));
        }
    }
}
