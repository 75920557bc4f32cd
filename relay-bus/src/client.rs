//! Redis pub/sub bus client
//!
//! The client keeps two independent connections: a multiplexed connection
//! for PUBLISH and liveness probes, and a dedicated connection for
//! subscriptions. Redis mandates the split: a subscribing connection
//! cannot issue unrelated commands.
//!
//! The subscriber task owns its connection, re-establishes the full
//! channel set after every reconnect, and dispatches each inbound message
//! to the registered handlers. Handlers must return promptly; components
//! enqueue the envelope onto their own task's queue.

use async_trait::async_trait;
use futures_util::StreamExt;
use redis::{AsyncCommands, IntoConnectionInfo};
use relay_core::{env_opt, env_string, BusError, Envelope};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Handler invoked for each inbound envelope on a subscribed channel.
pub type EnvelopeHandler = Arc<dyn Fn(Envelope) + Send + Sync>;

/// Reconnect schedule: `min(50 * attempt, 2000)` milliseconds, unbounded
/// attempts.
fn reconnect_delay(attempt: u32) -> Duration {
    Duration::from_millis((u64::from(attempt) * 50).min(2000))
}

/// Publish retry backoff, capped at a short ceiling.
fn publish_backoff(attempt: u32) -> Duration {
    Duration::from_millis((100u64 << attempt.min(4)).min(2000))
}

const PUBLISH_RETRIES: u32 = 3;

// ============================================================================
// BUS TRAIT
// ============================================================================

/// Agent-agnostic transport over a channel-oriented pub/sub service.
#[async_trait]
pub trait Bus: Send + Sync + 'static {
    /// Serialize the envelope and emit it on `channel`. Returns once the
    /// transport accepted the message or a terminal error occurred;
    /// transient errors are retried with capped backoff.
    async fn publish(&self, channel: &str, envelope: &Envelope) -> Result<(), BusError>;

    /// Register `handler` for each inbound envelope on `channel`.
    /// Malformed payloads are logged and discarded before the handler is
    /// reached. Handlers MUST NOT block the subscriber.
    async fn subscribe(&self, channel: &str, handler: EnvelopeHandler) -> Result<(), BusError>;

    /// Round-trip liveness probe.
    async fn ping(&self) -> Result<Duration, BusError>;

    /// Best-effort connection state.
    fn is_connected(&self) -> bool;

    /// Release all connections.
    async fn close(&self) -> Result<(), BusError>;
}

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Bus connection configuration.
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Redis URL, e.g. `redis://127.0.0.1:6379`.
    pub url: String,
    /// Optional password, applied on top of the URL.
    pub password: Option<String>,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            password: None,
        }
    }
}

impl BusConfig {
    /// Create from environment variables.
    ///
    /// - `RELAY_BUS_URL`: transport endpoint (default: redis://127.0.0.1:6379)
    /// - `RELAY_BUS_PASSWORD`: credentials (default: none)
    pub fn from_env() -> Self {
        Self {
            url: env_string("RELAY_BUS_URL", "redis://127.0.0.1:6379"),
            password: env_opt("RELAY_BUS_PASSWORD"),
        }
    }
}

// ============================================================================
// REDIS BUS
// ============================================================================

/// Commands for the subscriber task.
enum SubscriberCommand {
    /// The channel set changed; cycle the connection and resubscribe.
    Resync,
    /// Tear down and exit.
    Shutdown,
}

type HandlerMap = Arc<RwLock<HashMap<String, Vec<EnvelopeHandler>>>>;

/// Pub/sub client backed by Redis.
pub struct RedisBus {
    client: redis::Client,
    url: String,
    publish_conn: Mutex<Option<redis::aio::MultiplexedConnection>>,
    handlers: HandlerMap,
    commands: mpsc::UnboundedSender<SubscriberCommand>,
    connected: Arc<AtomicBool>,
    closed: AtomicBool,
}

impl RedisBus {
    /// Connect to the bus. The publish connection is established eagerly
    /// so credential and endpoint problems surface at startup; the
    /// subscriber task starts alongside and retries forever.
    pub async fn connect(config: &BusConfig) -> Result<Self, BusError> {
        let mut info = config
            .url
            .as_str()
            .into_connection_info()
            .map_err(|e| BusError::ConnectFailed {
                url: config.url.clone(),
                reason: e.to_string(),
            })?;
        if let Some(password) = &config.password {
            info.redis.password = Some(password.clone());
        }

        let client = redis::Client::open(info).map_err(|e| BusError::ConnectFailed {
            url: config.url.clone(),
            reason: e.to_string(),
        })?;

        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| BusError::ConnectFailed {
                url: config.url.clone(),
                reason: e.to_string(),
            })?;
        info!(url = %config.url, "bus connected");

        let handlers: HandlerMap = Arc::new(RwLock::new(HashMap::new()));
        let connected = Arc::new(AtomicBool::new(true));
        let (commands, command_rx) = mpsc::unbounded_channel();

        tokio::spawn(subscriber_loop(
            client.clone(),
            Arc::clone(&handlers),
            command_rx,
            Arc::clone(&connected),
        ));

        Ok(Self {
            client,
            url: config.url.clone(),
            publish_conn: Mutex::new(Some(conn)),
            handlers,
            commands,
            connected,
            closed: AtomicBool::new(false),
        })
    }

    async fn publish_once(&self, channel: &str, wire: &str) -> redis::RedisResult<()> {
        let mut guard = self.publish_conn.lock().await;
        let conn = match guard.take() {
            Some(conn) => guard.insert(conn),
            None => {
                let fresh = self.client.get_multiplexed_async_connection().await?;
                info!(url = %self.url, "bus publish connection re-established");
                guard.insert(fresh)
            }
        };
        let _receivers: i64 = conn.publish(channel, wire).await?;
        Ok(())
    }
}

#[async_trait]
impl Bus for RedisBus {
    async fn publish(&self, channel: &str, envelope: &Envelope) -> Result<(), BusError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BusError::Closed);
        }
        let wire = envelope.to_wire().map_err(|e| BusError::PublishFailed {
            channel: channel.to_string(),
            reason: e.to_string(),
        })?;

        let mut attempt = 0;
        loop {
            match self.publish_once(channel, &wire).await {
                Ok(()) => {
                    debug!(%channel, id = %envelope.id, kind = %envelope.kind, "published");
                    return Ok(());
                }
                Err(e) if attempt < PUBLISH_RETRIES => {
                    attempt += 1;
                    warn!(%channel, %e, attempt, "publish failed, retrying");
                    // Drop the cached connection so the retry reconnects.
                    *self.publish_conn.lock().await = None;
                    tokio::time::sleep(publish_backoff(attempt)).await;
                }
                Err(e) => {
                    return Err(BusError::PublishFailed {
                        channel: channel.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }
    }

    async fn subscribe(&self, channel: &str, handler: EnvelopeHandler) -> Result<(), BusError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BusError::Closed);
        }
        match self.handlers.write() {
            Ok(mut map) => map.entry(channel.to_string()).or_default().push(handler),
            Err(_) => {
                return Err(BusError::SubscribeFailed {
                    channel: channel.to_string(),
                    reason: "handler registry poisoned".to_string(),
                })
            }
        }
        self.commands
            .send(SubscriberCommand::Resync)
            .map_err(|_| BusError::SubscribeFailed {
                channel: channel.to_string(),
                reason: "subscriber task is gone".to_string(),
            })
    }

    async fn ping(&self) -> Result<Duration, BusError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BusError::Closed);
        }
        let start = Instant::now();
        let mut guard = self.publish_conn.lock().await;
        let conn = match guard.take() {
            Some(conn) => guard.insert(conn),
            None => {
                let fresh = self
                    .client
                    .get_multiplexed_async_connection()
                    .await
                    .map_err(|e| BusError::PingFailed {
                        reason: e.to_string(),
                    })?;
                guard.insert(fresh)
            }
        };
        let pong: String = redis::cmd("PING")
            .query_async(conn)
            .await
            .map_err(|e| BusError::PingFailed {
                reason: e.to_string(),
            })?;
        if pong != "PONG" {
            return Err(BusError::PingFailed {
                reason: format!("unexpected reply: {pong}"),
            });
        }
        Ok(start.elapsed())
    }

    fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::SeqCst) && self.connected.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), BusError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let _ = self.commands.send(SubscriberCommand::Shutdown);
        *self.publish_conn.lock().await = None;
        self.connected.store(false, Ordering::SeqCst);
        info!("bus closed");
        Ok(())
    }
}

// ============================================================================
// SUBSCRIBER TASK
// ============================================================================

/// Owns the subscription connection for the lifetime of the bus client.
///
/// The loop rebuilds the connection (and the full channel set) after any
/// error, after `min(50 * attempt, 2000)` ms. Adding a subscription at
/// runtime also cycles the connection, which keeps the resubscribe logic
/// in one place.
async fn subscriber_loop(
    client: redis::Client,
    handlers: HandlerMap,
    mut commands: mpsc::UnboundedReceiver<SubscriberCommand>,
    connected: Arc<AtomicBool>,
) {
    let mut attempt: u32 = 0;
    loop {
        let channels: Vec<String> = match handlers.read() {
            Ok(map) => map.keys().cloned().collect(),
            Err(_) => {
                error!("handler registry poisoned, subscriber exiting");
                return;
            }
        };

        // Nothing to subscribe yet: park until the first registration.
        if channels.is_empty() {
            match commands.recv().await {
                Some(SubscriberCommand::Resync) => continue,
                Some(SubscriberCommand::Shutdown) | None => return,
            }
        }

        match client.get_async_pubsub().await {
            Ok(mut pubsub) => {
                let mut subscribed = true;
                for channel in &channels {
                    if let Err(e) = pubsub.subscribe(channel).await {
                        warn!(%channel, %e, "subscribe failed");
                        subscribed = false;
                        break;
                    }
                }

                if subscribed {
                    attempt = 0;
                    connected.store(true, Ordering::SeqCst);
                    info!(channels = channels.len(), "bus subscriber ready");

                    let mut stream = pubsub.on_message();
                    loop {
                        tokio::select! {
                            message = stream.next() => match message {
                                Some(message) => dispatch(&handlers, &message),
                                None => {
                                    warn!("bus subscriber connection lost");
                                    break;
                                }
                            },
                            command = commands.recv() => match command {
                                Some(SubscriberCommand::Resync) => {
                                    debug!("channel set changed, resubscribing");
                                    break;
                                }
                                Some(SubscriberCommand::Shutdown) | None => {
                                    connected.store(false, Ordering::SeqCst);
                                    info!("bus subscriber shut down");
                                    return;
                                }
                            }
                        }
                    }
                    // Resync requests do not count as connection failures.
                    continue;
                }
            }
            Err(e) => {
                error!(%e, "bus subscriber connect failed");
            }
        }

        connected.store(false, Ordering::SeqCst);
        attempt += 1;
        let delay = reconnect_delay(attempt);
        info!(attempt, delay_ms = delay.as_millis() as u64, "bus reconnecting");
        tokio::time::sleep(delay).await;
    }
}

/// Parse and fan out one inbound message. Malformed payloads are reported
/// to the error log and discarded; the bus is fire-and-forget so the
/// sender is never notified.
fn dispatch(handlers: &HandlerMap, message: &redis::Msg) {
    let channel = message.get_channel_name().to_string();
    let payload: String = match message.get_payload() {
        Ok(payload) => payload,
        Err(e) => {
            error!(%channel, %e, "discarding non-text bus payload");
            return;
        }
    };

    let envelope = match Envelope::from_wire(&payload) {
        Ok(envelope) => envelope,
        Err(e) => {
            error!(%channel, %e, "discarding malformed envelope");
            return;
        }
    };

    let channel_handlers: Vec<EnvelopeHandler> = match handlers.read() {
        Ok(map) => map.get(&channel).cloned().unwrap_or_default(),
        Err(_) => {
            error!("handler registry poisoned, dropping message");
            return;
        }
    };

    for handler in channel_handlers {
        handler(envelope.clone());
    }
}

// ============================================================================
// TESTS
// ============================================================================
