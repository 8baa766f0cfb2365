//! Multi-pool staking devnet application library

pub mod devnet;

use std::sync::Arc;
use std::time::Duration;

use staking_api::AppState;
use staking_core::{AppConfig, Network};

use devnet::BlockProducer;

/// Environment variable naming a JSON configuration file
pub const CONFIG_ENV: &str = "MULTIPOOL_CONFIG";

/// Install the global tracing subscriber
pub fn init_tracing() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("multipool=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
}

/// Load configuration from `MULTIPOOL_CONFIG`, or defaults when unset
pub fn load_config() -> anyhow::Result<AppConfig> {
    match std::env::var(CONFIG_ENV) {
        Ok(path) => {
            tracing::info!(path = %path, "loading configuration");
            Ok(AppConfig::load(&path)?)
        }
        Err(_) => {
            tracing::info!("{} not set, using default devnet configuration", CONFIG_ENV);
            Ok(AppConfig::default())
        }
    }
}

/// Run the staking API against an in-process devnet ledger
pub async fn run() -> anyhow::Result<()> {
    init_tracing()?;

    tracing::info!("Starting multipool staking server");

    let config = load_config()?;
    tracing::debug!(config = %serde_json::to_string(&config)?, "effective configuration");

    if config.network != Network::Devnet {
        anyhow::bail!(
            "network {} needs an RPC-backed ledger gateway; only devnet is served in-process",
            config.network
        );
    }

    let ledger = Arc::new(devnet::seed_ledger(&config)?);

    let producer = BlockProducer::new();
    if config.devnet.block_interval_ms > 0 {
        producer.start(
            Arc::clone(&ledger),
            Duration::from_millis(config.devnet.block_interval_ms),
        );
    }

    let state = AppState::new(config, ledger);
    let served = staking_api::start_server(state).await;
    producer.stop();
    served?;

    Ok(())
}
