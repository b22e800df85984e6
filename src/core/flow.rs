//! Configuration wizard and options editor.
//!
//! Each step takes the current [`ConfigDraft`] by reference plus the user's input and returns
//! a [`FlowOutcome`]: either the next form to show (with a fresh draft and an optional error)
//! or the finished configuration. Drafts are never mutated in place, so a failed step leaves
//! the caller's draft exactly as it was.

use crate::core::config::{
    AppConfig, DEFAULT_CURRENCY, DEFAULT_SCAN_INTERVAL, ProvidersConfig,
};
use crate::core::error::FlowError;
use crate::core::holdings::parse_amount;
use crate::core::quote::QuoteProvider;
use crate::core::symbols::{TrackedSymbols, normalize_symbol};
use std::collections::BTreeMap;
use tracing::{debug, info};

pub const TOP_CRYPTOCURRENCIES: [(&str, &str); 10] = [
    ("BTC", "Bitcoin"),
    ("ETH", "Ethereum"),
    ("USDT", "Tether"),
    ("BNB", "Binance Coin"),
    ("ADA", "Cardano"),
    ("XRP", "XRP"),
    ("DOGE", "Dogecoin"),
    ("USDC", "USD Coin"),
    ("DOT", "Polkadot"),
    ("UNI", "Uniswap"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowMode {
    /// First-time setup, starting from the API key.
    Create,
    /// Editing an existing configuration.
    Options,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    User,
    SelectCryptocurrencies,
    AddCryptocurrency,
    CoinAmounts,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigDraft {
    pub mode: FlowMode,
    pub api_key: String,
    pub selected: TrackedSymbols,
    pub currency: String,
    pub scan_interval: u64,
    pub coin_amounts: BTreeMap<String, String>,
    pub providers: ProvidersConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowOutcome {
    Form {
        step: Step,
        draft: ConfigDraft,
        error: Option<FlowError>,
    },
    CreateEntry(AppConfig),
}

impl FlowOutcome {
    fn form(step: Step, draft: ConfigDraft) -> Self {
        FlowOutcome::Form {
            step,
            draft,
            error: None,
        }
    }

    fn error(step: Step, draft: ConfigDraft, error: FlowError) -> Self {
        debug!(?step, code = error.code(), "Re-showing form with error");
        FlowOutcome::Form {
            step,
            draft,
            error: Some(error),
        }
    }
}

/// Input of the currency selection form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionInput {
    pub cryptocurrencies: Vec<String>,
    pub currency: String,
    pub scan_interval: u64,
    pub add_custom: bool,
}

impl ConfigDraft {
    pub fn new() -> Self {
        Self {
            mode: FlowMode::Create,
            api_key: String::new(),
            selected: TrackedSymbols::new(),
            currency: DEFAULT_CURRENCY.to_string(),
            scan_interval: DEFAULT_SCAN_INTERVAL.as_secs(),
            coin_amounts: BTreeMap::new(),
            providers: ProvidersConfig::default(),
        }
    }

    /// Draft for the options editor, pre-filled from an existing entry.
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            mode: FlowMode::Options,
            api_key: config.api_key.clone(),
            selected: config.cryptocurrencies.clone(),
            currency: config.currency.clone(),
            scan_interval: config.scan_interval,
            coin_amounts: config.coin_amounts.clone(),
            providers: config.providers.clone(),
        }
    }

    /// First form of the flow for this draft's mode.
    pub fn start(self) -> FlowOutcome {
        match self.mode {
            FlowMode::Create => FlowOutcome::form(Step::User, self),
            FlowMode::Options => FlowOutcome::form(Step::SelectCryptocurrencies, self),
        }
    }

    /// Symbols offered by the selection form: the popular list plus any custom picks.
    pub fn choices(&self) -> Vec<(String, String)> {
        let mut choices: Vec<(String, String)> = TOP_CRYPTOCURRENCIES
            .iter()
            .map(|(symbol, name)| (symbol.to_string(), name.to_string()))
            .collect();
        for symbol in self.selected.iter() {
            if !choices.iter().any(|(s, _)| s == symbol) {
                choices.push((symbol.to_string(), symbol.to_string()));
            }
        }
        choices
    }

    pub fn submit_user(&self, api_key: &str) -> FlowOutcome {
        debug!("Entered user step");
        let mut draft = self.clone();
        draft.api_key = api_key.trim().to_string();
        FlowOutcome::form(Step::SelectCryptocurrencies, draft)
    }

    pub fn submit_selection(&self, input: &SelectionInput) -> FlowOutcome {
        debug!(?input, "Entered select_cryptocurrencies step");
        let picked: TrackedSymbols = input.cryptocurrencies.iter().collect();

        if input.add_custom {
            // Keep what was already chosen so the custom symbol is added on top of it.
            let mut draft = self.clone();
            for symbol in picked.iter() {
                draft.selected.insert(symbol);
            }
            return FlowOutcome::form(Step::AddCryptocurrency, draft);
        }

        if picked.is_empty() {
            return FlowOutcome::error(
                Step::SelectCryptocurrencies,
                self.clone(),
                FlowError::NoCurrenciesSelected,
            );
        }
        if input.scan_interval == 0 {
            return FlowOutcome::error(
                Step::SelectCryptocurrencies,
                self.clone(),
                FlowError::InvalidScanInterval,
            );
        }

        let mut draft = self.clone();
        draft.selected = picked;
        draft.currency = input.currency.trim().to_uppercase();
        draft.scan_interval = input.scan_interval;
        FlowOutcome::form(Step::CoinAmounts, draft)
    }

    /// Validates a custom ticker against the API before adding it to the selection.
    pub async fn submit_custom_symbol(
        &self,
        provider: &dyn QuoteProvider,
        symbol: &str,
    ) -> FlowOutcome {
        let symbol = normalize_symbol(symbol);
        debug!(%symbol, "Entered add_cryptocurrency step");
        if symbol.is_empty() {
            return FlowOutcome::error(
                Step::AddCryptocurrency,
                self.clone(),
                FlowError::SymbolNotFound(symbol),
            );
        }

        match provider.lookup_symbol(&symbol).await {
            Ok(()) => {
                let mut draft = self.clone();
                draft.selected.insert(&symbol);
                info!(%symbol, "Added custom cryptocurrency");
                FlowOutcome::form(Step::SelectCryptocurrencies, draft)
            }
            Err(e) => FlowOutcome::error(Step::AddCryptocurrency, self.clone(), e),
        }
    }

    /// Leaves the custom symbol form without adding anything.
    pub fn cancel_custom_symbol(&self) -> FlowOutcome {
        FlowOutcome::form(Step::SelectCryptocurrencies, self.clone())
    }

    /// Parses one optional amount per selected symbol. Blank means no holding. Any invalid
    /// amount re-shows the form and commits none of them.
    pub fn submit_amounts(&self, amounts: &BTreeMap<String, String>) -> FlowOutcome {
        debug!("Entered coin_amounts step");
        if self.selected.is_empty() {
            return FlowOutcome::error(
                Step::SelectCryptocurrencies,
                self.clone(),
                FlowError::NoCurrenciesSelected,
            );
        }

        let mut parsed = BTreeMap::new();
        for (symbol, input) in amounts {
            let symbol = normalize_symbol(symbol);
            if !self.selected.contains(&symbol) || input.trim().is_empty() {
                continue;
            }
            match parse_amount(&symbol, input) {
                Ok(amount) => {
                    parsed.insert(symbol, amount.to_string());
                }
                Err(e) => return FlowOutcome::error(Step::CoinAmounts, self.clone(), e),
            }
        }

        let mut draft = self.clone();
        draft.coin_amounts = parsed;
        info!(
            cryptocurrencies = %draft.selected,
            "Saving configuration"
        );
        FlowOutcome::CreateEntry(draft.into_config())
    }

    fn into_config(self) -> AppConfig {
        AppConfig {
            api_key: self.api_key,
            cryptocurrencies: self.selected,
            currency: self.currency,
            scan_interval: self.scan_interval,
            coin_amounts: self.coin_amounts,
            providers: self.providers,
        }
    }
}

impl Default for ConfigDraft {
    fn default() -> Self {
        Self::new()
    }
}
