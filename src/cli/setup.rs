//! Interactive `setup` and `options` commands.

use super::ui;
use crate::core::QuoteProvider;
use crate::core::config::AppConfig;
use crate::core::flow::{ConfigDraft, FlowOutcome, SelectionInput, Step};
use crate::providers::CoinMarketCapProvider;
use anyhow::{Context, Result};
use console::Term;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Source of answers for the configuration forms.
pub trait Prompt {
    /// Reads one line. An empty answer yields `default` when one is given.
    fn input(&mut self, label: &str, default: Option<&str>) -> Result<String>;
    fn confirm(&mut self, label: &str, default: bool) -> Result<bool>;
    fn message(&mut self, text: &str);
}

/// Prompts on the controlling terminal.
pub struct TermPrompt {
    term: Term,
}

impl TermPrompt {
    pub fn new() -> Self {
        Self {
            term: Term::stdout(),
        }
    }
}

impl Default for TermPrompt {
    fn default() -> Self {
        Self::new()
    }
}

impl Prompt for TermPrompt {
    fn input(&mut self, label: &str, default: Option<&str>) -> Result<String> {
        let prompt = match default {
            Some(d) if !d.is_empty() => format!("{label} [{d}]: "),
            _ => format!("{label}: "),
        };
        if !self.term.is_term() {
            anyhow::bail!("An interactive terminal is required to answer: {label}");
        }
        self.term.write_str(&prompt)?;
        let line = self.term.read_line()?;
        let line = line.trim();
        Ok(match default {
            Some(d) if line.is_empty() => d.to_string(),
            _ => line.to_string(),
        })
    }

    fn confirm(&mut self, label: &str, default: bool) -> Result<bool> {
        let hint = if default { "Y/n" } else { "y/N" };
        let answer = self.input(&format!("{label} ({hint})"), None)?;
        Ok(match answer.to_lowercase().as_str() {
            "y" | "yes" => true,
            "n" | "no" => false,
            _ => default,
        })
    }

    fn message(&mut self, text: &str) {
        // Nothing useful to do if the terminal is gone.
        let _ = self.term.write_line(text);
    }
}

fn split_symbols(text: &str) -> Vec<String> {
    text.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn show_choices(prompt: &mut dyn Prompt, draft: &ConfigDraft) {
    prompt.message(&ui::style_text("Available cryptocurrencies", ui::StyleType::Title));
    for (symbol, name) in draft.choices() {
        let marker = if draft.selected.contains(&symbol) { "x" } else { " " };
        prompt.message(&format!("  [{marker}] {symbol:<6} {name}"));
    }
}

/// Walks the forms until the flow produces a configuration.
///
/// `make_provider` builds the client used to check custom symbols from the draft's API key.
pub async fn run_flow<F>(
    prompt: &mut dyn Prompt,
    start: FlowOutcome,
    make_provider: F,
) -> Result<AppConfig>
where
    F: Fn(&ConfigDraft) -> Result<Arc<dyn QuoteProvider>>,
{
    let mut outcome = start;
    loop {
        let (step, draft, error) = match outcome {
            FlowOutcome::CreateEntry(config) => return Ok(config),
            FlowOutcome::Form { step, draft, error } => (step, draft, error),
        };
        if let Some(error) = error {
            prompt.message(&ui::style_text(
                &format!("{error} ({})", error.code()),
                ui::StyleType::Error,
            ));
        }

        outcome = match step {
            Step::User => {
                let api_key = loop {
                    let key = prompt.input("CoinMarketCap API key", None)?;
                    if !key.trim().is_empty() {
                        break key;
                    }
                };
                draft.submit_user(&api_key)
            }
            Step::SelectCryptocurrencies => {
                show_choices(prompt, &draft);
                let current = draft.selected.joined();
                let picked = prompt.input("Cryptocurrencies (comma separated)", Some(current.as_str()))?;
                let currency = prompt.input("Display currency", Some(draft.currency.as_str()))?;
                let interval_default = draft.scan_interval.to_string();
                let interval =
                    prompt.input("Scan interval in seconds", Some(interval_default.as_str()))?;
                let add_custom = prompt.confirm("Add a cryptocurrency not listed above?", false)?;
                draft.submit_selection(&SelectionInput {
                    cryptocurrencies: split_symbols(&picked),
                    currency,
                    // Unparseable input is reported the same way as zero.
                    scan_interval: interval.trim().parse().unwrap_or(0),
                    add_custom,
                })
            }
            Step::AddCryptocurrency => {
                let symbol = prompt.input("Symbol to add (blank to go back)", None)?;
                if symbol.trim().is_empty() {
                    draft.cancel_custom_symbol()
                } else {
                    let provider = make_provider(&draft)?;
                    let spinner = ui::new_spinner("Checking symbol with CoinMarketCap...");
                    let next = draft.submit_custom_symbol(provider.as_ref(), &symbol).await;
                    spinner.finish_and_clear();
                    next
                }
            }
            Step::CoinAmounts => {
                let mut amounts = BTreeMap::new();
                for symbol in draft.selected.iter() {
                    let current = draft.coin_amounts.get(symbol).map(String::as_str);
                    let amount = prompt.input(
                        &format!("Amount of {symbol} held (blank for none)"),
                        current,
                    )?;
                    amounts.insert(symbol.to_string(), amount);
                }
                draft.submit_amounts(&amounts)
            }
        };
    }
}

fn live_provider(draft: &ConfigDraft) -> Result<Arc<dyn QuoteProvider>> {
    let base_url = draft
        .providers
        .coinmarketcap
        .as_ref()
        .map_or(crate::core::config::DEFAULT_BASE_URL, |p| p.base_url.as_str());
    Ok(Arc::new(CoinMarketCapProvider::new(base_url, &draft.api_key)?))
}

fn resolve_path(config_path: Option<&str>) -> Result<PathBuf> {
    match config_path {
        Some(path) => Ok(PathBuf::from(path)),
        None => AppConfig::default_config_path(),
    }
}

/// Creates a configuration file by asking for the API key and tracked cryptocurrencies.
pub async fn setup(config_path: Option<&str>) -> Result<()> {
    let path = resolve_path(config_path)?;
    setup_at_path(&path, &mut TermPrompt::new(), live_provider).await
}

pub async fn setup_at_path<F>(path: &Path, prompt: &mut dyn Prompt, make_provider: F) -> Result<()>
where
    F: Fn(&ConfigDraft) -> Result<Arc<dyn QuoteProvider>>,
{
    if path.exists() {
        anyhow::bail!("Configuration file already exists at {}", path.display());
    }

    let config = run_flow(prompt, ConfigDraft::new().start(), make_provider).await?;
    config.save_to_path(path)?;

    tracing::info!("Created configuration at {}", path.display());
    prompt.message(&format!("Saved configuration to {}", path.display()));
    Ok(())
}

/// Edits the tracked cryptocurrencies, currency, interval and holdings of an existing file.
pub async fn options(config_path: Option<&str>) -> Result<()> {
    let path = resolve_path(config_path)?;
    options_at_path(&path, &mut TermPrompt::new(), live_provider).await
}

pub async fn options_at_path<F>(
    path: &Path,
    prompt: &mut dyn Prompt,
    make_provider: F,
) -> Result<()>
where
    F: Fn(&ConfigDraft) -> Result<Arc<dyn QuoteProvider>>,
{
    let current = AppConfig::load_from_path(path)
        .with_context(|| format!("No configuration to edit at {}", path.display()))?;

    let config = run_flow(
        prompt,
        ConfigDraft::from_config(&current).start(),
        make_provider,
    )
    .await?;
    config.save_to_path(path)?;

    tracing::info!("Updated configuration at {}", path.display());
    prompt.message("Options saved. A running `watch` picks them up on its next check.");
    Ok(())
}
