//! Setup, teardown and reconfiguration of one configured integration.

use crate::core::config::{AppConfig, DOMAIN};
use crate::core::coordinator::QuoteCoordinator;
use crate::core::quote::QuoteProvider;
use crate::core::reading::{CurrencyReading, Reading, ReadingState, StatePublisher, TotalValueReading};
use crate::core::registry::{EntityEntry, Registry};
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info, warn};

fn device_id(symbol: Option<&str>) -> String {
    match symbol {
        Some(symbol) => format!("{DOMAIN}_{}", symbol.to_lowercase()),
        None => format!("{DOMAIN}_portfolio"),
    }
}

pub struct Integration {
    config: AppConfig,
    provider: Arc<dyn QuoteProvider>,
    registry: Arc<Registry>,
    publisher: Arc<dyn StatePublisher>,
    coordinator: Arc<QuoteCoordinator>,
    readings: Vec<Arc<dyn Reading>>,
}

impl Integration {
    /// Creates the coordinator and readings and waits for the first refresh.
    ///
    /// A failed first refresh does not fail setup: readings start out unavailable and the
    /// schedule keeps trying.
    pub async fn setup(
        config: AppConfig,
        provider: Arc<dyn QuoteProvider>,
        registry: Arc<Registry>,
        publisher: Arc<dyn StatePublisher>,
    ) -> Result<Self> {
        config.validate()?;
        let holdings = config.holdings()?;

        let coordinator = QuoteCoordinator::new(
            Arc::clone(&provider),
            config.cryptocurrencies.clone(),
            &config.display_currency(),
            config.scan_interval(),
        )?;

        let mut readings: Vec<Arc<dyn Reading>> = config
            .cryptocurrencies
            .iter()
            .map(|symbol| -> Arc<dyn Reading> {
                CurrencyReading::attach(
                    &coordinator,
                    symbol,
                    holdings.get(symbol),
                    Arc::clone(&publisher),
                )
            })
            .collect();
        readings.push(TotalValueReading::attach(
            &coordinator,
            holdings,
            Arc::clone(&publisher),
        ));

        for reading in &readings {
            registry.get_or_create(EntityEntry {
                unique_id: reading.unique_id(),
                name: reading.name(),
                symbol: reading.symbol().map(str::to_string),
                device_id: Some(device_id(reading.symbol())),
            });
        }

        match coordinator.start().await {
            Ok(snapshot) => info!(
                prices = snapshot.prices.len(),
                readings = readings.len(),
                "Integration ready"
            ),
            Err(e) => warn!(error = %e, "Initial refresh failed, readings are unavailable"),
        }

        Ok(Self {
            config,
            provider,
            registry,
            publisher,
            coordinator,
            readings,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn coordinator(&self) -> &Arc<QuoteCoordinator> {
        &self.coordinator
    }

    pub fn readings(&self) -> &[Arc<dyn Reading>] {
        &self.readings
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn states(&self) -> Vec<ReadingState> {
        self.readings.iter().map(|r| r.state()).collect()
    }

    /// Detaches every reading and stops the coordinator's schedule.
    pub fn unload(&self) {
        for reading in &self.readings {
            reading.detach();
        }
        self.coordinator.shutdown();
        debug!("Integration unloaded");
    }

    /// Applies a new configuration. Entities and devices of symbols no longer tracked are
    /// removed from the registry before the integration is set up again.
    pub async fn reconfigure(
        self,
        config: AppConfig,
        provider: Option<Arc<dyn QuoteProvider>>,
    ) -> Result<Self> {
        let removed = self
            .config
            .cryptocurrencies
            .difference(&config.cryptocurrencies);
        let added = config
            .cryptocurrencies
            .difference(&self.config.cryptocurrencies);
        debug!(?removed, ?added, "Reconfiguring integration");

        if !removed.is_empty() {
            let entities = self.registry.remove_symbols(&removed);
            info!(?entities, "Removed entities for untracked cryptocurrencies");
        }

        self.unload();
        let provider = provider.unwrap_or_else(|| Arc::clone(&self.provider));
        let integration = Integration::setup(config, provider, self.registry, self.publisher).await?;

        // Unique ids embed the display currency, so a currency change leaves old ones behind.
        let current: Vec<String> = integration.readings.iter().map(|r| r.unique_id()).collect();
        let stale = integration.registry.retain_unique_ids(&current);
        if !stale.is_empty() {
            info!(?stale, "Removed entities no longer produced");
        }
        Ok(integration)
    }
}
