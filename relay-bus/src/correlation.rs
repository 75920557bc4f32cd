//! Request correlation table
//!
//! Lets an agent issue a bus request and later receive its matching
//! response as if it were a local call, while bounding the wait. Each
//! tracked id owns a one-shot slot; an inbound response resolves it, a
//! deadline task rejects it, and whichever happens first removes the
//! entry. Late arrivals for a removed id are logged and dropped.

use relay_core::{MessageId, RequestError};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, warn};

type Slot = oneshot::Sender<Result<JsonValue, RequestError>>;

struct PendingRequest {
    target_agent: String,
    deadline: Instant,
    slot: Slot,
}

/// Handle returned by [`CorrelationTable::track`]; completes with the
/// response payload or a timeout error.
pub struct PendingResponse {
    rx: oneshot::Receiver<Result<JsonValue, RequestError>>,
}

impl PendingResponse {
    /// Wait for the response or the deadline, whichever comes first.
    pub async fn wait(self) -> Result<JsonValue, RequestError> {
        match self.rx.await {
            Ok(result) => result,
            // The table was dropped with the request still pending.
            Err(_) => Err(RequestError::SlotDropped),
        }
    }
}

/// Process-local map from request id to a pending one-shot slot.
///
/// Cloning shares the underlying table; every agent process keeps exactly
/// one and hands clones to its subscription handlers.
#[derive(Clone, Default)]
pub struct CorrelationTable {
    inner: Arc<Mutex<HashMap<MessageId, PendingRequest>>>,
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a slot for `id` and arm its deadline.
    ///
    /// Must be called BEFORE the request envelope is published, otherwise
    /// a fast response could race the registration and be dropped.
    pub fn track(
        &self,
        id: MessageId,
        target_agent: impl Into<String>,
        timeout: Duration,
    ) -> PendingResponse {
        let target_agent = target_agent.into();
        let (tx, rx) = oneshot::channel();
        let deadline = Instant::now() + timeout;

        let stale = {
            let mut map = lock(&self.inner);
            map.insert(
                id,
                PendingRequest {
                    target_agent: target_agent.clone(),
                    deadline,
                    slot: tx,
                },
            )
        };
        if stale.is_some() {
            // Ids are random 128-bit values; a collision here means the
            // caller reused an id, which loses the earlier slot.
            warn!(%id, "replaced an already-tracked request id");
        }

        let table = self.clone();
        let timeout_ms = timeout.as_millis() as i64;
        tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            table.reject(
                id,
                RequestError::Timeout {
                    agent: target_agent,
                    timeout_ms,
                },
            );
        });

        PendingResponse { rx }
    }

    /// Resolve the slot for `id` with a response payload.
    ///
    /// Returns whether a slot was found; late responses for an already
    /// removed id are logged and dropped (single delivery).
    pub fn deliver(&self, id: MessageId, payload: JsonValue) -> bool {
        let entry = lock(&self.inner).remove(&id);
        match entry {
            Some(pending) => {
                debug!(%id, agent = %pending.target_agent, "response delivered");
                // The waiter may have been dropped; nothing left to do.
                let _ = pending.slot.send(Ok(payload));
                true
            }
            None => {
                warn!(%id, "discarding response for unknown or expired request");
                false
            }
        }
    }

    /// Reject the slot for `id`, if still present.
    pub fn reject(&self, id: MessageId, error: RequestError) {
        let entry = lock(&self.inner).remove(&id);
        if let Some(pending) = entry {
            debug!(%id, agent = %pending.target_agent, %error, "request rejected");
            let _ = pending.slot.send(Err(error));
        }
    }

    /// Clear entries that somehow outlived their deadline without being
    /// rejected. The per-entry deadline task already covers the normal
    /// path; the sweep is the backstop.
    pub fn sweep(&self) {
        let now = Instant::now();
        let expired: Vec<(MessageId, PendingRequest)> = {
            let mut map = lock(&self.inner);
            let ids: Vec<MessageId> = map
                .iter()
                .filter(|(_, pending)| pending.deadline <= now)
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter()
                .filter_map(|id| map.remove(&id).map(|pending| (id, pending)))
                .collect()
        };

        for (id, pending) in expired {
            warn!(%id, agent = %pending.target_agent, "sweeping expired request");
            let timeout_ms = 0;
            let _ = pending.slot.send(Err(RequestError::Timeout {
                agent: pending.target_agent,
                timeout_ms,
            }));
        }
    }

    /// Number of in-flight requests.
    pub fn len(&self) -> usize {
        lock(&self.inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Mutex poisoning only happens if a holder panicked; the map itself is
/// still structurally sound, so recover the guard and continue.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::EntityIdType;
    use serde_json::json;

    #[tokio::test]
    async fn test_deliver_resolves_waiter() {
        let table = CorrelationTable::new();
        let id = MessageId::random();
        let pending = table.track(id, "researcher", Duration::from_secs(5));

        assert!(table.deliver(id, json!({"auth_exists": false})));
        let payload = pending.wait().await.expect("delivered");
        assert_eq!(payload["auth_exists"], false);
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_timeout_rejects_with_agent_message() {
        let table = CorrelationTable::new();
        let id = MessageId::random();
        let pending = table.track(id, "researcher", Duration::from_millis(50));

        let err = pending.wait().await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Agent researcher did not respond within 50 ms"
        );
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_timeout_window() {
        // A 200 ms timeout against a silent target rejects no earlier
        // than the deadline and within a small overshoot.
        let table = CorrelationTable::new();
        let id = MessageId::random();
        let started = Instant::now();
        let pending = table.track(id, "researcher", Duration::from_millis(200));

        let err = pending.wait().await.unwrap_err();
        let elapsed = started.elapsed();
        assert!(matches!(err, RequestError::Timeout { .. }));
        assert!(elapsed >= Duration::from_millis(200), "rejected early: {elapsed:?}");
        assert!(elapsed < Duration::from_millis(500), "rejected late: {elapsed:?}");
    }

    #[tokio::test]
    async fn test_single_delivery() {
        let table = CorrelationTable::new();
        let id = MessageId::random();
        let pending = table.track(id, "planner", Duration::from_secs(5));

        assert!(table.deliver(id, json!({"n": 1})));
        // Second delivery is a no-op that reports the miss
        assert!(!table.deliver(id, json!({"n": 2})));

        let payload = pending.wait().await.expect("first delivery wins");
        assert_eq!(payload["n"], 1);
    }

    #[tokio::test]
    async fn test_late_response_after_timeout_is_dropped() {
        let table = CorrelationTable::new();
        let id = MessageId::random();
        let pending = table.track(id, "backend", Duration::from_millis(30));

        let err = pending.wait().await.unwrap_err();
        assert!(matches!(err, RequestError::Timeout { .. }));

        // The remote finally answers; the entry is long gone
        assert!(!table.deliver(id, json!({"too": "late"})));
    }

    #[tokio::test]
    async fn test_reject_surfaces_error() {
        let table = CorrelationTable::new();
        let id = MessageId::random();
        let pending = table.track(id, "frontend", Duration::from_secs(5));

        table.reject(
            id,
            RequestError::Rejected {
                agent: "frontend".to_string(),
                reason: "Worker is busy".to_string(),
            },
        );

        let err = pending.wait().await.unwrap_err();
        assert!(matches!(err, RequestError::Rejected { .. }));
    }

    #[tokio::test]
    async fn test_concurrent_track_and_deliver() {
        let table = CorrelationTable::new();
        let mut waiters = Vec::new();
        let mut ids = Vec::new();

        for _ in 0..32 {
            let id = MessageId::random();
            waiters.push(table.track(id, "planner", Duration::from_secs(5)));
            ids.push(id);
        }

        let deliverer = {
            let table = table.clone();
            let ids = ids.clone();
            tokio::spawn(async move {
                for (n, id) in ids.into_iter().enumerate() {
                    assert!(table.deliver(id, json!({ "n": n })));
                }
            })
        };

        for (n, pending) in waiters.into_iter().enumerate() {
            let payload = pending.wait().await.expect("delivered");
            assert_eq!(payload["n"], n);
        }
        deliverer.await.expect("deliverer task");
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_sweep_clears_expired_entries() {
        let table = CorrelationTable::new();
        let id = MessageId::random();
        // Insert directly with an already-passed deadline to simulate an
        // entry whose timer task was lost.
        let (tx, rx) = oneshot::channel();
        lock(&table.inner).insert(
            id,
            PendingRequest {
                target_agent: "archivist".to_string(),
                deadline: Instant::now() - Duration::from_secs(1),
                slot: tx,
            },
        );

        table.sweep();
        assert!(table.is_empty());
        let result = rx.await.expect("sweep resolved the slot");
        assert!(matches!(result, Err(RequestError::Timeout { .. })));
    }
}
