//! RELAY Gateway entry point
//!
//! Bootstraps configuration, connects the bus and the log store, wires
//! the forwarding subscriptions, and serves the Axum router until a
//! termination signal arrives.

use std::process::ExitCode;
use std::sync::Arc;

use relay_bus::{Bus, BusConfig, RedisBus};
use relay_core::RelayError;
use relay_gateway::{create_router, forward, AppState, GatewayConfig};
use relay_store::{ActivityStore, PostgresStore, StoreConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("relay=info,relay_gateway=info,info")),
        )
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("gateway startup failed: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), RelayError> {
    let config = GatewayConfig::from_env();

    let bus: Arc<dyn Bus> = Arc::new(RedisBus::connect(&BusConfig::from_env()).await?);
    let store: Arc<dyn ActivityStore> =
        Arc::new(PostgresStore::connect(&StoreConfig::from_env()).await?);

    let addr = config.bind_addr();
    let state = AppState::new(Arc::clone(&bus), store, config);
    forward::start_forwarding(&state).await?;

    let app = create_router(state);

    tracing::info!(%addr, "starting RELAY gateway");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| RelayError::Startup {
            reason: format!("failed to bind {addr}: {e}"),
        })?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!(error = %e, "server error");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    bus.close().await?;
    Ok(())
}
