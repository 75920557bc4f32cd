//! In-memory bus double
//!
//! Delivers envelopes to handlers synchronously in publish order, which
//! gives tests the per-channel ordering guarantee of the real transport
//! with none of its timing.

use async_trait::async_trait;
use relay_bus::{Bus, EnvelopeHandler};
use relay_core::{BusError, Envelope};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

/// In-memory `Bus` implementation for tests.
///
/// Also records every published envelope so assertions can inspect
/// traffic on channels nobody subscribed to.
#[derive(Clone, Default)]
pub struct MemoryBus {
    handlers: Arc<RwLock<HashMap<String, Vec<EnvelopeHandler>>>>,
    published: Arc<Mutex<Vec<(String, Envelope)>>>,
    closed: Arc<AtomicBool>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything published on `channel`, in order.
    pub fn published_on(&self, channel: &str) -> Vec<Envelope> {
        self.published
            .lock()
            .expect("published log lock")
            .iter()
            .filter(|(c, _)| c == channel)
            .map(|(_, envelope)| envelope.clone())
            .collect()
    }

    /// Total number of published envelopes.
    pub fn published_count(&self) -> usize {
        self.published.lock().expect("published log lock").len()
    }

    /// Inject an envelope as if a remote peer had published it.
    pub fn inject(&self, channel: &str, envelope: Envelope) {
        let handlers: Vec<EnvelopeHandler> = self
            .handlers
            .read()
            .expect("handler registry lock")
            .get(channel)
            .cloned()
            .unwrap_or_default();
        for handler in handlers {
            handler(envelope.clone());
        }
    }
}

#[async_trait]
impl Bus for MemoryBus {
    async fn publish(&self, channel: &str, envelope: &Envelope) -> Result<(), BusError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BusError::Closed);
        }
        self.published
            .lock()
            .expect("published log lock")
            .push((channel.to_string(), envelope.clone()));
        self.inject(channel, envelope.clone());
        Ok(())
    }

    async fn subscribe(&self, channel: &str, handler: EnvelopeHandler) -> Result<(), BusError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BusError::Closed);
        }
        self.handlers
            .write()
            .expect("handler registry lock")
            .entry(channel.to_string())
            .or_default()
            .push(handler);
        Ok(())
    }

    async fn ping(&self) -> Result<Duration, BusError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BusError::PingFailed {
                reason: "bus closed".to_string(),
            });
        }
        Ok(Duration::from_micros(10))
    }

    fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), BusError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::MessageKind;
    use serde_json::json;
    use std::sync::mpsc;

    #[tokio::test]
    async fn test_publish_reaches_subscriber_in_order() {
        let bus = MemoryBus::new();
        let (tx, rx) = mpsc::channel();

        bus.subscribe(
            "test-channel",
            Arc::new(move |envelope| {
                let _ = tx.send(envelope);
            }),
        )
        .await
        .expect("subscribe");

        for n in 0..5 {
            let envelope = Envelope::new("a", "b", MessageKind::Status, json!({ "n": n }));
            bus.publish("test-channel", &envelope).await.expect("publish");
        }

        for n in 0..5 {
            let received = rx.recv().expect("delivery");
            assert_eq!(received.payload["n"], n);
        }
    }

    #[tokio::test]
    async fn test_published_log_records_unsubscribed_channels() {
        let bus = MemoryBus::new();
        let envelope = Envelope::new("a", "b", MessageKind::Progress, json!({}));
        bus.publish("nobody-listens", &envelope).await.expect("publish");
        assert_eq!(bus.published_on("nobody-listens").len(), 1);
        assert_eq!(bus.published_on("elsewhere").len(), 0);
    }

    #[tokio::test]
    async fn test_closed_bus_errors() {
        let bus = MemoryBus::new();
        bus.close().await.expect("close");
        let envelope = Envelope::new("a", "b", MessageKind::Status, json!({}));
        assert!(bus.publish("x", &envelope).await.is_err());
        assert!(bus.ping().await.is_err());
        assert!(!bus.is_connected());
    }
}
