//! RELAY Orchestrator entry point

use std::process::ExitCode;
use std::sync::Arc;

use relay_bus::{Bus, BusConfig, RedisBus};
use relay_core::RelayResult;
use relay_llm::{AnthropicProvider, ChatProvider, LlmConfig};
use relay_orchestrator::{Orchestrator, OrchestratorConfig};
use relay_store::{ActivityStore, PostgresStore, StoreConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("relay=info,relay_orchestrator=info,info")),
        )
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("orchestrator startup failed: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> RelayResult<()> {
    let llm_config = LlmConfig::from_env()?;
    let config = OrchestratorConfig::from_env();

    let bus: Arc<dyn Bus> = Arc::new(RedisBus::connect(&BusConfig::from_env()).await?);
    let store: Arc<dyn ActivityStore> =
        Arc::new(PostgresStore::connect(&StoreConfig::from_env()).await?);
    let provider: Arc<dyn ChatProvider> = Arc::new(AnthropicProvider::new(&llm_config));

    let orchestrator = Orchestrator::new(Arc::clone(&bus), provider, store, config);
    orchestrator.start().await?;

    tracing::info!(model = %llm_config.model, "orchestrator running");
    tokio::signal::ctrl_c().await.ok();
    tracing::info!("shutdown signal received");

    bus.close().await?;
    Ok(())
}
