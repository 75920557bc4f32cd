//! Shared application state for the gateway

use crate::config::GatewayConfig;
use crate::hub::WsHub;
use relay_bus::Bus;
use relay_store::ActivityStore;
use std::sync::Arc;
use std::time::Instant;

/// State injected into every route handler.
#[derive(Clone)]
pub struct AppState {
    pub bus: Arc<dyn Bus>,
    pub store: Arc<dyn ActivityStore>,
    pub hub: Arc<WsHub>,
    pub config: Arc<GatewayConfig>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        bus: Arc<dyn Bus>,
        store: Arc<dyn ActivityStore>,
        config: GatewayConfig,
    ) -> Self {
        Self {
            bus,
            store,
            hub: Arc::new(WsHub::new()),
            config: Arc::new(config),
            started_at: Instant::now(),
        }
    }
}
