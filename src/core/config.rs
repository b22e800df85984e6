use crate::core::error::FlowError;
use crate::core::holdings::Holdings;
use crate::core::symbols::TrackedSymbols;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

pub const DOMAIN: &str = "coinmarketcap";
pub const DEFAULT_CURRENCY: &str = "USD";
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(10 * 60);
pub const DEFAULT_BASE_URL: &str = "https://pro-api.coinmarketcap.com";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct CoinMarketCapProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct ProvidersConfig {
    pub coinmarketcap: Option<CoinMarketCapProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            coinmarketcap: Some(CoinMarketCapProviderConfig {
                base_url: DEFAULT_BASE_URL.to_string(),
            }),
        }
    }
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

fn default_scan_interval() -> u64 {
    DEFAULT_SCAN_INTERVAL.as_secs()
}

// Amounts may be written as YAML numbers or strings; both are kept as text until parsed.
fn deserialize_amounts<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, serde_yaml::Value>::deserialize(deserializer)?;
    raw.into_iter()
        .map(|(symbol, value)| {
            let amount = match value {
                serde_yaml::Value::String(s) => s,
                serde_yaml::Value::Number(n) => n.to_string(),
                other => {
                    return Err(serde::de::Error::custom(format!(
                        "invalid amount for {symbol}: {other:?}"
                    )));
                }
            };
            Ok((symbol.to_uppercase(), amount))
        })
        .collect()
}

/// Persisted configuration entry.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub api_key: String,
    pub cryptocurrencies: TrackedSymbols,
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Seconds between scheduled refreshes.
    #[serde(default = "default_scan_interval")]
    pub scan_interval: u64,
    #[serde(default, deserialize_with = "deserialize_amounts")]
    pub coin_amounts: BTreeMap<String, String>,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

impl AppConfig {
    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("io", "coinwatch", "coinwatch")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn save_to_path<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file to {}", path.display()))?;
        debug!("Saved config to {}", path.display());
        Ok(())
    }

    /// Checks the invariants the coordinator relies on before anything is started.
    pub fn validate(&self) -> Result<(), FlowError> {
        if self.cryptocurrencies.is_empty() {
            return Err(FlowError::NoCurrenciesSelected);
        }
        if self.scan_interval == 0 {
            return Err(FlowError::InvalidScanInterval);
        }
        self.holdings().map(|_| ())
    }

    pub fn holdings(&self) -> Result<Holdings, FlowError> {
        Holdings::parse(&self.coin_amounts)
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval)
    }

    /// Display currency as sent to the API.
    pub fn display_currency(&self) -> String {
        self.currency.trim().to_uppercase()
    }

    pub fn base_url(&self) -> &str {
        self.providers
            .coinmarketcap
            .as_ref()
            .map_or(DEFAULT_BASE_URL, |p| &p.base_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_config_deserialization() {
        let yaml_str = r#"
api_key: "secret"
cryptocurrencies:
  - btc
  - ETH
  - BTC
coin_amounts:
  btc: "0.5"
  ETH: 2
"#;

        let config: AppConfig = serde_yaml::from_str(yaml_str).expect("Failed to deserialize");
        assert_eq!(config.api_key, "secret");
        assert_eq!(
            config.cryptocurrencies.iter().collect::<Vec<_>>(),
            vec!["BTC", "ETH"]
        );
        assert_eq!(config.currency, "USD");
        assert_eq!(config.scan_interval, 600);
        assert_eq!(config.scan_interval(), DEFAULT_SCAN_INTERVAL);
        assert_eq!(config.base_url(), DEFAULT_BASE_URL);

        let holdings = config.holdings().unwrap();
        assert_eq!(holdings.get("BTC"), Some(dec!(0.5)));
        assert_eq!(holdings.get("ETH"), Some(dec!(2)));
        assert!(config.validate().is_ok());

        let yaml_str_with_providers = r#"
api_key: "secret"
cryptocurrencies: [DOGE]
currency: "eur"
scan_interval: 30
providers:
  coinmarketcap:
    base_url: "http://example.com/cmc"
        "#;
        let config_with_providers: AppConfig =
            serde_yaml::from_str(yaml_str_with_providers).unwrap();
        assert_eq!(config_with_providers.base_url(), "http://example.com/cmc");
        assert_eq!(config_with_providers.display_currency(), "EUR");
        assert_eq!(config_with_providers.scan_interval(), Duration::from_secs(30));
        assert!(config_with_providers.coin_amounts.is_empty());
    }

    #[test]
    fn test_validate_rejects_bad_entries() {
        let mut config: AppConfig =
            serde_yaml::from_str("api_key: k\ncryptocurrencies: []\n").unwrap();
        assert_eq!(config.validate(), Err(FlowError::NoCurrenciesSelected));

        config.cryptocurrencies.insert("BTC");
        config.scan_interval = 0;
        assert_eq!(config.validate(), Err(FlowError::InvalidScanInterval));

        config.scan_interval = 60;
        config
            .coin_amounts
            .insert("BTC".to_string(), "half".to_string());
        assert_eq!(config.validate().unwrap_err().code(), "invalid_amount");
    }

    #[test]
    fn test_save_and_reload() -> Result<()> {
        let temp_dir = tempfile::TempDir::new()?;
        let path = temp_dir.path().join("nested").join("config.yaml");

        let mut config: AppConfig =
            serde_yaml::from_str("api_key: k\ncryptocurrencies: [BTC, ETH]\n")?;
        config
            .coin_amounts
            .insert("BTC".to_string(), "0.25".to_string());
        config.save_to_path(&path)?;

        let reloaded = AppConfig::load_from_path(&path)?;
        assert_eq!(reloaded, config);
        Ok(())
    }
}
