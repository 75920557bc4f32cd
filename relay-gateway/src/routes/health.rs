//! Health check endpoint
//!
//! `GET /api/health` probes both backing dependencies and reports the
//! WebSocket connection count. 200 when everything answered, 503
//! otherwise; an unreachable dependency reports latency -1.

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;
use relay_core::{
    DependencyHealth, HealthReport, HealthStatus, ServicesHealth, WebSocketHealth,
};
use std::time::Instant;
use tracing::debug;

/// GET /api/health
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let start = Instant::now();

    let bus = match state.bus.ping().await {
        Ok(latency) => DependencyHealth::up(latency.as_millis() as i64),
        Err(e) => {
            debug!(error = %e, "bus health probe failed");
            DependencyHealth::down()
        }
    };

    let log_store = match state.store.health_check().await {
        Ok(latency) => DependencyHealth::up(latency.as_millis() as i64),
        Err(e) => {
            debug!(error = %e, "log store health probe failed");
            DependencyHealth::down()
        }
    };

    let healthy = bus.connected && log_store.connected;
    let report = HealthReport {
        status: if healthy {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        },
        timestamp: Utc::now(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        services: ServicesHealth {
            bus,
            log_store,
            websocket: WebSocketHealth {
                connections: state.hub.count(),
            },
        },
        response_time_ms: start.elapsed().as_millis() as i64,
    };

    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(report))
}
