//! RELAY Core - Wire and State Types
//!
//! Pure data structures with no behavior beyond validation. All other
//! crates depend on this. This crate contains ONLY data types - no
//! transport, no IO, no business logic.

// Core modules
mod channel;
mod config;
mod envelope;
mod error;
mod health;
mod identity;
mod payload;
mod worker;

// Re-export channel names and helpers
pub use channel::*;

// Re-export configuration helpers
pub use config::*;

// Re-export the envelope types
pub use envelope::*;

// Re-export error types
pub use error::*;

// Re-export health report shapes
pub use health::*;

// Re-export identity types
pub use identity::*;

// Re-export typed payloads
pub use payload::*;

// Re-export worker state types
pub use worker::*;
