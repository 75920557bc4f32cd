//! Gateway configuration
//!
//! Loaded from environment variables with development defaults; the CORS
//! allow-list is empty in dev mode, which means allow all origins.

use relay_core::{env_list, env_parse, env_string, CHATTER_OUTPUT, SYSTEM};
use std::time::Duration;

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Bind host.
    pub bind: String,
    /// HTTP port.
    pub port: u16,
    /// Allowed CORS origins (empty = allow all, dev mode).
    pub cors_origins: Vec<String>,
    /// Bus channels forwarded to every connected WebSocket client.
    pub forward_channels: Vec<String>,
    /// Keep-alive frame interval.
    pub heartbeat_interval: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 3000,
            cors_origins: Vec::new(),
            forward_channels: vec![CHATTER_OUTPUT.to_string(), SYSTEM.to_string()],
            heartbeat_interval: Duration::from_secs(30),
        }
    }
}

impl GatewayConfig {
    /// Create from environment variables.
    ///
    /// - `RELAY_GATEWAY_BIND`: bind host (default: 0.0.0.0)
    /// - `RELAY_GATEWAY_PORT`: HTTP port (default: 3000)
    /// - `RELAY_CORS_ORIGINS`: comma-separated allow-list (default: empty)
    /// - `RELAY_FORWARD_CHANNELS`: comma-separated channel names
    ///   (default: chatter-output,system)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let forward_channels = {
            let listed = env_list("RELAY_FORWARD_CHANNELS");
            if listed.is_empty() {
                defaults.forward_channels
            } else {
                listed
            }
        };

        Self {
            bind: env_string("RELAY_GATEWAY_BIND", &defaults.bind),
            port: env_parse("RELAY_GATEWAY_PORT", defaults.port),
            cors_origins: env_list("RELAY_CORS_ORIGINS"),
            forward_channels,
            heartbeat_interval: Duration::from_secs(env_parse(
                "RELAY_HEARTBEAT_SECS",
                defaults.heartbeat_interval.as_secs(),
            )),
        }
    }

    /// Socket address string for the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}
