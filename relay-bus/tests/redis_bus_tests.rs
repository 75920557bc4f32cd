//! Live-Redis integration tests for the bus client
//!
//! Require a Redis reachable at `RELAY_BUS_URL` (default localhost) and
//! run only with `--features redis-tests`, the same gating the workspace
//! uses for database-backed suites.

#![cfg(feature = "redis-tests")]

use relay_bus::{Bus, BusConfig, RedisBus};
use relay_core::Envelope;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

async fn test_bus() -> RedisBus {
    RedisBus::connect(&BusConfig::from_env())
        .await
        .expect("redis reachable for redis-tests")
}

#[tokio::test]
async fn publish_then_subscribe_round_trips_envelope() {
    let bus = test_bus().await;
    let (tx, mut rx) = mpsc::unbounded_channel();

    bus.subscribe(
        "relay-test-roundtrip",
        Arc::new(move |envelope| {
            let _ = tx.send(envelope);
        }),
    )
    .await
    .expect("subscribe");

    // Give the subscriber task a beat to establish the channel set.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let sent = Envelope::question("tester", "echo", json!({"question": "ping?"}));
    bus.publish("relay-test-roundtrip", &sent).await.expect("publish");

    let received = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("delivery within 2s")
        .expect("channel open");

    assert_eq!(received, sent);
    bus.close().await.expect("close");
}

#[tokio::test]
async fn ping_reports_latency() {
    let bus = test_bus().await;
    let latency = bus.ping().await.expect("ping");
    assert!(latency < Duration::from_secs(1));
    bus.close().await.expect("close");
}

#[tokio::test]
async fn closed_bus_refuses_operations() {
    let bus = test_bus().await;
    bus.close().await.expect("close");

    let envelope = Envelope::status("tester", json!({}));
    assert!(bus.publish("relay-test-closed", &envelope).await.is_err());
    assert!(bus.ping().await.is_err());
    assert!(!bus.is_connected());
}
