use super::board::Board;
use super::ui;
use crate::core::{QuoteProvider, StatePublisher};
use crate::core::config::AppConfig;
use crate::core::integration::Integration;
use crate::core::registry::Registry;
use anyhow::Result;
use std::sync::Arc;
use tracing::debug;

/// Fetches quotes once and prints every reading.
pub async fn show(config: AppConfig, provider: Arc<dyn QuoteProvider>) -> Result<()> {
    let board = Arc::new(Board::new(false));
    let spinner = ui::new_spinner("Fetching quotes from CoinMarketCap...");
    let integration = Integration::setup(
        config,
        provider,
        Arc::new(Registry::new()),
        Arc::clone(&board) as Arc<dyn StatePublisher>,
    )
    .await;
    spinner.finish_and_clear();
    let integration = integration?;

    let coordinator = integration.coordinator();
    println!(
        "{}",
        board.display_as_table(&format!("Prices in {}", coordinator.display_currency()))
    );
    if let Some(error) = coordinator.last_error() {
        println!(
            "{}",
            ui::style_text(&format!("Refresh failed: {error}"), ui::StyleType::Error)
        );
    }
    debug!(readings = integration.readings().len(), "Displayed readings");

    integration.unload();
    Ok(())
}
