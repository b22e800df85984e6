pub mod cli;
pub mod core;
pub mod providers;

use crate::core::QuoteProvider;
use crate::core::config::AppConfig;
use crate::providers::CoinMarketCapProvider;
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Commands that run against an existing configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppCommand {
    Show,
    Watch,
}

fn provider_for(config: &AppConfig) -> Result<Arc<dyn QuoteProvider>> {
    Ok(Arc::new(CoinMarketCapProvider::new(
        config.base_url(),
        &config.api_key,
    )?))
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("coinwatch starting...");

    let path = match config_path {
        Some(path) => PathBuf::from(path),
        None => AppConfig::default_config_path()?,
    };
    let config = AppConfig::load_from_path(&path)?;
    debug!(
        cryptocurrencies = %config.cryptocurrencies,
        currency = %config.currency,
        scan_interval = config.scan_interval,
        "Loaded config"
    );

    match command {
        AppCommand::Show => {
            let provider = provider_for(&config)?;
            cli::show::show(config, provider).await
        }
        AppCommand::Watch => cli::watch::watch(config, &path, provider_for).await,
    }
}
