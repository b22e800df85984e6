use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use tracing::{debug, instrument, warn};

use crate::core::error::{FlowError, RefreshFailure};
use crate::core::quote::QuoteProvider;
use crate::core::symbols::normalize_symbol;

const QUOTES_ENDPOINT: &str = "/v1/cryptocurrency/quotes/latest";
const API_KEY_HEADER: &str = "X-CMC_PRO_API_KEY";

// Decodes from the number's shortest f64 text, so a price like 100.005 stays exactly 100.005.
fn decimal_from_json(number: &serde_json::Number) -> Option<Decimal> {
    let text = number.to_string();
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

#[derive(Deserialize, Debug)]
struct QuotesResponse {
    #[serde(default)]
    data: HashMap<String, Listing>,
}

// Symbol queries return one object per symbol, or a list when a ticker is ambiguous.
// `Many` comes first: a struct also deserializes from a one-element sequence.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum Listing {
    Many(Vec<ListingItem>),
    One(ListingItem),
}

impl Listing {
    fn first(&self) -> Option<&ListingItem> {
        match self {
            Listing::One(item) => Some(item),
            Listing::Many(items) => items.first(),
        }
    }
}

#[derive(Deserialize, Debug)]
struct ListingItem {
    #[serde(default)]
    quote: HashMap<String, QuoteItem>,
}

#[derive(Deserialize, Debug)]
struct QuoteItem {
    price: Option<serde_json::Number>,
}

pub struct CoinMarketCapProvider {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl CoinMarketCapProvider {
    pub fn new(base_url: &str, api_key: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("coinwatch/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(CoinMarketCapProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
        })
    }

    fn quotes_url(&self, params: &[(&str, &str)]) -> Result<Url, String> {
        Url::parse_with_params(&format!("{}{}", self.base_url, QUOTES_ENDPOINT), params)
            .map_err(|e| format!("Invalid CoinMarketCap URL {}: {e}", self.base_url))
    }

    async fn get(&self, url: Url) -> Result<(StatusCode, String), reqwest::Error> {
        let response = self
            .client
            .get(url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;
        let status = response.status();
        debug!(%status, "Received CoinMarketCap response");
        let body = response.text().await?;
        Ok((status, body))
    }
}

#[async_trait]
impl QuoteProvider for CoinMarketCapProvider {
    #[instrument(
        name = "CoinMarketCapQuotes",
        skip(self, symbols, convert),
        fields(symbols = %symbols.join(","), convert = %convert)
    )]
    async fn fetch_quotes(
        &self,
        symbols: &[String],
        convert: &str,
    ) -> Result<HashMap<String, Decimal>, RefreshFailure> {
        let joined = symbols.join(",");
        let url = self
            .quotes_url(&[("symbol", joined.as_str()), ("convert", convert)])
            .map_err(RefreshFailure::Transport)?;
        debug!("Requesting quotes from {}", url);

        let (status, body) = self.get(url).await?;
        if status != StatusCode::OK {
            return Err(RefreshFailure::Status(status.as_u16()));
        }

        let response: QuotesResponse =
            serde_json::from_str(&body).map_err(|e| RefreshFailure::Decode(e.to_string()))?;

        let mut prices = HashMap::new();
        for symbol in symbols {
            let price = response
                .data
                .get(symbol)
                .and_then(Listing::first)
                .and_then(|item| item.quote.get(convert))
                .and_then(|quote| quote.price.as_ref())
                .and_then(decimal_from_json);
            match price {
                Some(price) => {
                    prices.insert(normalize_symbol(symbol), price);
                }
                None => warn!(symbol = %symbol, "No {} price in response", convert),
            }
        }
        Ok(prices)
    }

    #[instrument(name = "CoinMarketCapLookup", skip(self))]
    async fn lookup_symbol(&self, symbol: &str) -> Result<(), FlowError> {
        let symbol = normalize_symbol(symbol);
        let url = self
            .quotes_url(&[("symbol", symbol.as_str())])
            .map_err(FlowError::Unknown)?;
        debug!("Looking up symbol at {}", url);

        let (status, body) = self
            .get(url)
            .await
            .map_err(|e| FlowError::CannotConnect(format!("{e:#}")))?;
        if status != StatusCode::OK {
            return Err(FlowError::CannotConnect(format!("HTTP {status}")));
        }

        let response: QuotesResponse =
            serde_json::from_str(&body).map_err(|e| FlowError::Unknown(e.to_string()))?;
        if response.data.contains_key(&symbol) {
            Ok(())
        } else {
            warn!(symbol = %symbol, "Symbol not found in API response");
            Err(FlowError::SymbolNotFound(symbol))
        }
    }
}
