//! WebSocket framing
//!
//! Three frame families cross the browser socket: system frames the
//! gateway originates (welcome, ack, error, heartbeat), bus frames
//! wrapping forwarded envelopes, and the single inbound client message
//! shape.

use relay_core::{ClientId, Envelope, Timestamp};
use serde::{Deserialize, Serialize};

/// Frames the gateway sends on its own behalf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SystemFrame {
    /// First frame after the upgrade, carrying the minted client id.
    Welcome { client_id: ClientId },
    /// The client's last message was accepted and published.
    Ack,
    /// The client's last message failed validation; connection stays open.
    Error { message: String },
    /// Periodic keep-alive.
    Heartbeat,
}

/// A bus envelope forwarded to the browser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusFrame {
    pub channel: String,
    pub data: Envelope,
    pub timestamp: Timestamp,
}

/// The only inbound frame the gateway accepts.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClientMessage {
    pub content: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

impl ClientMessage {
    /// Parse and validate an inbound text frame.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let message: ClientMessage =
            serde_json::from_str(raw).map_err(|e| format!("invalid message: {e}"))?;
        if message.content.trim().is_empty() {
            return Err("content must not be empty".to_string());
        }
        Ok(message)
    }
}
