//! Health report shapes for the gateway's health surface

use crate::identity::Timestamp;
use serde::{Deserialize, Serialize};

/// Overall service health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Health of one backing dependency, with its probe latency.
///
/// `latency_ms` is `-1` when the dependency is unreachable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyHealth {
    pub connected: bool,
    pub latency_ms: i64,
}

impl DependencyHealth {
    pub fn up(latency_ms: i64) -> Self {
        Self {
            connected: true,
            latency_ms,
        }
    }

    pub fn down() -> Self {
        Self {
            connected: false,
            latency_ms: -1,
        }
    }
}

/// WebSocket surface health: how many sockets are currently open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebSocketHealth {
    pub connections: usize,
}

/// Per-dependency breakdown inside a [`HealthReport`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServicesHealth {
    pub bus: DependencyHealth,
    pub log_store: DependencyHealth,
    pub websocket: WebSocketHealth,
}

/// The body of `GET /api/health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub timestamp: Timestamp,
    pub uptime_seconds: u64,
    pub services: ServicesHealth,
    pub response_time_ms: i64,
}

impl HealthReport {
    /// Healthy iff every dependency's probe succeeded.
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_dependency_health_constructors() {
        let up = DependencyHealth::up(3);
        assert!(up.connected);
        assert_eq!(up.latency_ms, 3);

        let down = DependencyHealth::down();
        assert!(!down.connected);
        assert_eq!(down.latency_ms, -1);
    }

    #[test]
    fn test_report_serialization() {
        let report = HealthReport {
            status: HealthStatus::Healthy,
            timestamp: Utc::now(),
            uptime_seconds: 12,
            services: ServicesHealth {
                bus: DependencyHealth::up(1),
                log_store: DependencyHealth::up(2),
                websocket: WebSocketHealth { connections: 10 },
            },
            response_time_ms: 4,
        };
        let json = serde_json::to_string(&report).expect("serialize");
        assert!(json.contains("\"status\":\"healthy\""));
        assert!(json.contains("\"connections\":10"));
    }
}
