//! RELAY Bus - Transport and Correlation
//!
//! This crate provides the two primitives every agent is built on:
//!
//! - [`Bus`] / [`RedisBus`]: a channel-oriented pub/sub client with a
//!   dedicated subscriber connection, automatic reconnection, and
//!   publish-side retry.
//! - [`CorrelationTable`]: the process-local map that turns the pub/sub
//!   protocol into a request/reply calling convention with deadlines.

mod client;
mod correlation;

pub use client::{Bus, BusConfig, EnvelopeHandler, RedisBus};
pub use correlation::{CorrelationTable, PendingResponse};
