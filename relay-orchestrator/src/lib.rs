//! RELAY Orchestrator - The Conversational Coordinator
//!
//! The "chatter" agent turns each human message into a single synthesized
//! reply, optionally consulting sibling agents over the bus. One LLM turn
//! may loop through several rounds of tool calls; every consultation is a
//! correlated request with a deadline, every task handoff is
//! fire-and-forget, and every turn ends with something published on
//! `chatter-output` - a real answer or a terse apology.

pub mod config;
pub mod conversation;
pub mod orchestrator;
pub mod prompt;
pub mod status;
pub mod tools;

pub use config::OrchestratorConfig;
pub use conversation::ConversationStore;
pub use orchestrator::Orchestrator;
pub use status::StatusRegistry;

/// The identity this process claims on the bus.
pub const CHATTER_AGENT: &str = "chatter";

/// Recipient identity for user-bound replies.
pub const HUMAN_AGENT: &str = "human";

/// Sibling agents the orchestrator may consult; it subscribes to each
/// one's channel for correlated responses.
pub const SIBLING_AGENTS: [&str; 5] = ["planner", "researcher", "frontend", "backend", "archivist"];

/// Agents that accept task assignments.
pub const WORKER_AGENTS: [&str; 2] = ["frontend", "backend"];
