//! Typed errors for refreshes and the configuration flow.

use thiserror::Error;

/// A batched quote fetch did not produce a snapshot.
///
/// Cloneable so every caller coalesced into the same in-flight refresh
/// receives the same outcome.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshFailure {
    #[error("Error communicating with CoinMarketCap: HTTP {0}")]
    Status(u16),
    #[error("Error communicating with CoinMarketCap: {0}")]
    Transport(String),
    #[error("Failed to decode CoinMarketCap response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for RefreshFailure {
    fn from(err: reqwest::Error) -> Self {
        RefreshFailure::Transport(format!("{err:#}"))
    }
}

/// User-correctable errors raised while stepping through the configuration flow.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),
    #[error("Cannot connect to CoinMarketCap: {0}")]
    CannotConnect(String),
    #[error("Invalid amount for {symbol}: {input}")]
    InvalidAmount { symbol: String, input: String },
    #[error("No cryptocurrencies selected")]
    NoCurrenciesSelected,
    #[error("Scan interval must be a positive number of seconds")]
    InvalidScanInterval,
    #[error("Unexpected error: {0}")]
    Unknown(String),
}

impl FlowError {
    /// Form-level error code shown next to the step that failed.
    pub fn code(&self) -> &'static str {
        match self {
            FlowError::SymbolNotFound(_) => "invalid_cryptocurrency",
            FlowError::CannotConnect(_) => "cannot_connect",
            FlowError::InvalidAmount { .. } => "invalid_amount",
            FlowError::NoCurrenciesSelected => "no_cryptocurrencies",
            FlowError::InvalidScanInterval => "invalid_scan_interval",
            FlowError::Unknown(_) => "unknown",
        }
    }
}

/// Invalid coordinator settings. The subsystem must not be started.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    #[error("At least one cryptocurrency must be tracked")]
    NoSymbols,
    #[error("Scan interval must be greater than zero")]
    InvalidInterval,
}
