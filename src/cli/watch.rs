//! Long-running view that re-renders on every refresh and follows configuration edits.

use super::board::Board;
use crate::core::config::AppConfig;
use crate::core::coordinator::{ListenerId, RefreshListener};
use crate::core::integration::Integration;
use crate::core::registry::Registry;
use crate::core::{QuoteProvider, StatePublisher};
use anyhow::Result;
use std::future::Future;
use std::path::Path;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// How often the configuration file is re-read.
pub const CONFIG_POLL_INTERVAL: Duration = Duration::from_secs(5);

fn attach_board(integration: &Integration, board: &Arc<Board>) -> ListenerId {
    let listener: Weak<dyn RefreshListener> = Arc::downgrade(board) as Weak<dyn RefreshListener>;
    let id = integration.coordinator().subscribe(listener);
    board.on_refresh(integration.coordinator());
    id
}

/// Runs until Ctrl-C.
pub async fn watch<F>(config: AppConfig, config_path: &Path, make_provider: F) -> Result<()>
where
    F: Fn(&AppConfig) -> Result<Arc<dyn QuoteProvider>>,
{
    let board = Arc::new(Board::new(true));
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };
    watch_until(
        config,
        config_path,
        make_provider,
        board,
        Arc::new(Registry::new()),
        shutdown,
    )
    .await
}

/// Keeps the integration running until `shutdown` resolves. Whenever the configuration file
/// holds a different valid configuration, the integration is reconfigured with it.
pub async fn watch_until<F, S>(
    config: AppConfig,
    config_path: &Path,
    make_provider: F,
    board: Arc<Board>,
    registry: Arc<Registry>,
    shutdown: S,
) -> Result<()>
where
    F: Fn(&AppConfig) -> Result<Arc<dyn QuoteProvider>>,
    S: Future<Output = ()>,
{
    let provider = make_provider(&config)?;
    let publisher: Arc<dyn StatePublisher> = Arc::clone(&board) as Arc<dyn StatePublisher>;
    let mut integration = Integration::setup(config, provider, registry, publisher).await?;
    let mut board_id = attach_board(&integration, &board);

    let mut poll = tokio::time::interval(CONFIG_POLL_INTERVAL);
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
    poll.tick().await;
    let mut last_load_error: Option<String> = None;

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Stopping watch");
                break;
            }
            _ = poll.tick() => {
                let next = match AppConfig::load_from_path(config_path) {
                    Ok(next) => next,
                    Err(e) => {
                        let message = format!("{e:#}");
                        if last_load_error.as_deref() != Some(message.as_str()) {
                            warn!(error = %message, "Ignoring unreadable configuration");
                            last_load_error = Some(message);
                        }
                        continue;
                    }
                };
                last_load_error = None;
                if &next == integration.config() {
                    continue;
                }
                if let Err(e) = next.validate() {
                    warn!(code = e.code(), error = %e, "Ignoring invalid configuration");
                    continue;
                }

                info!(cryptocurrencies = %next.cryptocurrencies, "Configuration changed, reloading");
                integration.coordinator().unsubscribe(board_id);
                let provider = make_provider(&next)?;
                integration = integration.reconfigure(next, Some(provider)).await?;

                let ids: Vec<String> = integration.readings().iter().map(|r| r.unique_id()).collect();
                board.retain_ids(&ids);
                board_id = attach_board(&integration, &board);
                debug!(readings = ids.len(), "Watch reattached");
            }
        }
    }

    integration.unload();
    Ok(())
}
