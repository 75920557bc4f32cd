//! RELAY Store - Append-Only Activity Log
//!
//! Two tables back the platform's observability: `activities` (every
//! message that crossed the bus path worth remembering) and `logs`
//! (agent-level log lines). Writes are always fire-and-forget from the
//! caller's point of view: a store outage must never block or fail a bus
//! path, so components go through [`spawn_activity`] / [`spawn_log`]
//! which log failures and move on.

mod postgres;
mod record;

pub use postgres::{PostgresStore, StoreConfig};
pub use record::{ActivityRecord, LogLevel, LogRecord};

use async_trait::async_trait;
use relay_core::StoreError;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

// ============================================================================
// STORE TRAIT
// ============================================================================

/// The activity-log seam. `PostgresStore` is the production
/// implementation; tests use the in-memory and no-op stores from
/// relay-test-utils.
#[async_trait]
pub trait ActivityStore: Send + Sync + 'static {
    /// Append one row to `activities`.
    async fn record_activity(&self, activity: ActivityRecord) -> Result<(), StoreError>;

    /// Append one row to `logs`.
    async fn record_log(&self, log: LogRecord) -> Result<(), StoreError>;

    /// Liveness probe; returns round-trip latency.
    async fn health_check(&self) -> Result<Duration, StoreError>;
}

// ============================================================================
// FIRE-AND-FORGET HELPERS
// ============================================================================

/// Write an activity row without blocking the caller. Failures are
/// logged and dropped.
pub fn spawn_activity(store: &Arc<dyn ActivityStore>, activity: ActivityRecord) {
    let store = Arc::clone(store);
    tokio::spawn(async move {
        if let Err(e) = store.record_activity(activity).await {
            warn!(%e, "activity log write failed");
        }
    });
}

/// Write a log row without blocking the caller. Failures are logged and
/// dropped.
pub fn spawn_log(store: &Arc<dyn ActivityStore>, log: LogRecord) {
    let store = Arc::clone(store);
    tokio::spawn(async move {
        if let Err(e) = store.record_log(log).await {
            warn!(%e, "log store write failed");
        }
    });
}
