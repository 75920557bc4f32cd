//! RELAY Test Utilities
//!
//! Centralized test infrastructure for the RELAY workspace:
//! - An in-memory [`MemoryBus`] implementing the real `Bus` trait with
//!   per-channel delivery order
//! - A [`ScriptedProvider`] that replays queued chat responses and
//!   records every request it saw
//! - Store doubles: [`MemoryStore`], [`NullStore`], [`FailingStore`]
//! - Proptest generators for envelopes and payloads

mod bus;
mod provider;
mod store;

pub use bus::MemoryBus;
pub use provider::{RecordedCall, ScriptedProvider};
pub use store::{FailingStore, MemoryStore, NullStore};

// Re-export core types for convenience
pub use relay_core::{
    agent_channel, Envelope, EntityIdType, MessageId, MessageKind, TaskId,
};

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for RELAY wire types.

    use proptest::prelude::*;
    use relay_core::{Envelope, EntityIdType, MessageId, MessageKind};
    use serde_json::json;

    /// Any message kind.
    pub fn arb_message_kind() -> impl Strategy<Value = MessageKind> {
        prop_oneof![
            Just(MessageKind::Task),
            Just(MessageKind::Question),
            Just(MessageKind::Response),
            Just(MessageKind::Status),
            Just(MessageKind::Progress),
            Just(MessageKind::Error),
        ]
    }

    /// Agent names as they appear on the bus.
    pub fn arb_agent_name() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("chatter".to_string()),
            Just("gateway".to_string()),
            Just("planner".to_string()),
            Just("researcher".to_string()),
            Just("frontend".to_string()),
            Just("backend".to_string()),
            Just("archivist".to_string()),
        ]
    }

    /// Small structured payloads.
    pub fn arb_payload() -> impl Strategy<Value = serde_json::Value> {
        prop_oneof![
            Just(json!({})),
            "[a-z ]{0,32}".prop_map(|content| json!({ "content": content })),
            (any::<bool>(), 0u64..1000).prop_map(|(flag, n)| json!({ "ok": flag, "n": n })),
        ]
    }

    /// A well-formed envelope: the correlation invariant always holds.
    pub fn arb_envelope() -> impl Strategy<Value = Envelope> {
        (
            arb_message_kind(),
            arb_agent_name(),
            arb_agent_name(),
            arb_payload(),
        )
            .prop_map(|(kind, from, to, payload)| match kind {
                MessageKind::Response => {
                    Envelope::reply(from, to, MessageId::random(), payload)
                }
                other => Envelope::new(from, to, other, payload),
            })
    }
}
