//! Quote abstractions and the shared snapshot type

use crate::core::error::{FlowError, RefreshFailure};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Prices from one successful batched fetch, in a single display currency.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteSnapshot {
    pub prices: HashMap<String, Decimal>,
    pub currency: String,
    pub fetched_at: DateTime<Utc>,
}

impl QuoteSnapshot {
    pub fn new(prices: HashMap<String, Decimal>, currency: &str) -> Self {
        Self {
            prices,
            currency: currency.to_string(),
            fetched_at: Utc::now(),
        }
    }

    pub fn price(&self, symbol: &str) -> Option<Decimal> {
        self.prices.get(symbol).copied()
    }
}

#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Fetches the latest price of every symbol in one request, converted into `convert`.
    /// Symbols the API does not return are left out of the map.
    async fn fetch_quotes(
        &self,
        symbols: &[String],
        convert: &str,
    ) -> Result<HashMap<String, Decimal>, RefreshFailure>;

    /// Confirms a single symbol is known to the API.
    async fn lookup_symbol(&self, symbol: &str) -> Result<(), FlowError>;
}
