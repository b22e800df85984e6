use std::fs;
use std::sync::Arc;
use tracing::info;

// Adds automatic logging to test
mod test_utils {
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub async fn create_mock_server(symbols: &str, status: u16, mock_response: &str) -> MockServer {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/cryptocurrency/quotes/latest"))
            .and(query_param("symbol", symbols))
            .and(header("X-CMC_PRO_API_KEY", "test-key"))
            .respond_with(ResponseTemplate::new(status).set_body_string(mock_response))
            .mount(&mock_server)
            .await;

        mock_server
    }

    pub fn write_config(path: &std::path::Path, base_url: &str, extra: &str) {
        let content = format!(
            r#"
api_key: test-key
cryptocurrencies: [BTC, ETH]
currency: USD
scan_interval: 600
providers:
  coinmarketcap:
    base_url: {base_url}
{extra}
"#
        );
        std::fs::write(path, content).expect("Failed to write config file");
    }
}

const QUOTES: &str = r#"{
    "status": {"error_code": 0},
    "data": {
        "BTC": {"symbol": "BTC", "quote": {"USD": {"price": 50000.0}}},
        "ETH": {"symbol": "ETH", "quote": {"USD": {"price": 3000.0}}}
    }
}"#;

#[test_log::test(tokio::test)]
async fn test_full_app_flow_with_mock() {
    let mock_server = test_utils::create_mock_server("BTC,ETH", 200, QUOTES).await;

    let config_file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
    let config_path = config_file.path();
    test_utils::write_config(config_path, &mock_server.uri(), "coin_amounts:\n  BTC: 0.5\n");

    let result = coinwatch::run_command(
        coinwatch::AppCommand::Show,
        Some(config_path.to_str().unwrap()),
    )
    .await;
    assert!(
        result.is_ok(),
        "Main function failed with: {:?}",
        result.err()
    );
}

#[test_log::test(tokio::test)]
async fn test_show_survives_api_error() {
    let mock_server = test_utils::create_mock_server("BTC,ETH", 401, r#"{"status": {}}"#).await;

    let config_file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
    let config_path = config_file.path();
    test_utils::write_config(config_path, &mock_server.uri(), "");

    let result = coinwatch::run_command(
        coinwatch::AppCommand::Show,
        Some(config_path.to_str().unwrap()),
    )
    .await;
    assert!(result.is_ok(), "Show failed with: {:?}", result.err());
}

#[test_log::test(tokio::test)]
async fn test_show_rejects_empty_selection() {
    let config_file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
    fs::write(config_file.path(), "api_key: test-key\ncryptocurrencies: []\n")
        .expect("Failed to write config file");

    let result = coinwatch::run_command(
        coinwatch::AppCommand::Show,
        Some(config_file.path().to_str().unwrap()),
    )
    .await;
    assert!(result.is_err());
}

#[test_log::test(tokio::test)]
async fn test_portfolio_readings_from_api() {
    use coinwatch::core::config::AppConfig;
    use coinwatch::core::integration::Integration;
    use coinwatch::core::registry::Registry;
    use coinwatch::core::{QuoteProvider, StatePublisher};
    use coinwatch::cli::board::Board;
    use coinwatch::providers::CoinMarketCapProvider;
    use rust_decimal_macros::dec;

    let mock_server = test_utils::create_mock_server("BTC,ETH", 200, QUOTES).await;
    let config_file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
    test_utils::write_config(
        config_file.path(),
        &mock_server.uri(),
        "coin_amounts:\n  BTC: '0.5'\n  ETH: '2'\n",
    );
    let config = AppConfig::load_from_path(config_file.path()).unwrap();

    let provider: Arc<dyn QuoteProvider> =
        Arc::new(CoinMarketCapProvider::new(config.base_url(), &config.api_key).unwrap());
    let board = Arc::new(Board::new(false));
    let integration = Integration::setup(
        config,
        provider,
        Arc::new(Registry::new()),
        Arc::clone(&board) as Arc<dyn StatePublisher>,
    )
    .await
    .unwrap();

    let states = board.snapshot();
    info!(?states, "Published readings");
    let values: Vec<_> = states.iter().map(|s| (s.unique_id.as_str(), s.value)).collect();
    assert_eq!(
        values,
        vec![
            ("coinmarketcap_btc_usd", Some(dec!(25000.00))),
            ("coinmarketcap_eth_usd", Some(dec!(6000.00))),
            ("coinmarketcap_total_portfolio_value_usd", Some(dec!(31000.00))),
        ]
    );
    integration.unload();
}
