//! RELAY Supervisor entry point
//!
//! Runs one worker identity until SIGINT/SIGTERM or a broadcast shutdown
//! command, then drains and exits 0.

use std::process::ExitCode;
use std::sync::Arc;

use relay_bus::{Bus, BusConfig, RedisBus};
use relay_core::RelayResult;
use relay_store::{ActivityStore, PostgresStore, StoreConfig};
use relay_supervisor::{Supervisor, SupervisorConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("relay=info,relay_supervisor=info,info")),
        )
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("supervisor startup failed: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> RelayResult<()> {
    let config = SupervisorConfig::from_env()?;

    let bus: Arc<dyn Bus> = Arc::new(RedisBus::connect(&BusConfig::from_env()).await?);
    let store: Arc<dyn ActivityStore> =
        Arc::new(PostgresStore::connect(&StoreConfig::from_env()).await?);

    let supervisor = Supervisor::new(bus, store, config);
    let mut broadcast_shutdown = supervisor.start().await?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("SIGINT received");
        }
        _ = terminate_signal() => {
            tracing::info!("SIGTERM received");
        }
        reason = broadcast_shutdown.recv() => {
            tracing::info!(reason = reason.as_deref().unwrap_or("unknown"), "broadcast shutdown received");
        }
    }

    supervisor.shutdown().await;
    Ok(())
}

#[cfg(unix)]
async fn terminate_signal() {
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(mut signal) => {
            signal.recv().await;
        }
        Err(e) => {
            tracing::warn!(%e, "failed to install SIGTERM handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate_signal() {
    std::future::pending::<()>().await;
}
