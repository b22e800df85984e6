//! Valuation readings derived from the coordinator's snapshot.

use crate::core::config::DOMAIN;
use crate::core::coordinator::{ListenerId, QuoteCoordinator, RefreshListener};
use crate::core::holdings::Holdings;
use crate::core::quote::QuoteSnapshot;
use crate::core::symbols::{TrackedSymbols, normalize_symbol};
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

pub const ICON: &str = "mdi:currency-usd";

/// Rounds a monetary value to cents.
pub fn round_cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Price times held amount, rounded once. `None` when the product does not fit a `Decimal`.
pub fn weighted_value(price: Decimal, amount: Decimal) -> Option<Decimal> {
    price.checked_mul(amount).map(round_cents)
}

/// Sum of price times amount over tracked symbols with a configured holding. Symbols without
/// a price contribute nothing. Only the final sum is rounded. `None` on overflow.
pub fn portfolio_total(
    snapshot: &QuoteSnapshot,
    symbols: &TrackedSymbols,
    holdings: &Holdings,
) -> Option<Decimal> {
    symbols
        .iter()
        .filter_map(|symbol| Some((snapshot.price(symbol)?, holdings.get(symbol)?)))
        .try_fold(Decimal::ZERO, |total, (price, amount)| {
            total.checked_add(price.checked_mul(amount)?)
        })
        .map(round_cents)
}

pub fn currency_unique_id(symbol: &str, currency: &str) -> String {
    format!("{DOMAIN}_{symbol}_{currency}").to_lowercase()
}

pub fn total_unique_id(currency: &str) -> String {
    format!("{DOMAIN}_total_portfolio_value_{currency}").to_lowercase()
}

/// What a reading publishes to the host after each recompute.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadingState {
    pub unique_id: String,
    pub name: String,
    pub value: Option<Decimal>,
    pub unit: String,
    pub available: bool,
    pub icon: &'static str,
    pub attributes: BTreeMap<String, String>,
}

/// Host callback that receives a reading's current state.
pub trait StatePublisher: Send + Sync {
    fn write_state(&self, state: ReadingState);
}

pub trait Reading: Send + Sync {
    fn name(&self) -> String;
    fn unique_id(&self) -> String;
    fn unit_of_measurement(&self) -> String;
    fn current_value(&self) -> Option<Decimal>;
    fn is_available(&self) -> bool;

    /// Ticker this reading belongs to; `None` for the portfolio total.
    fn symbol(&self) -> Option<&str>;

    /// Stops following coordinator refreshes.
    fn detach(&self);

    fn icon(&self) -> &'static str {
        ICON
    }

    fn attributes(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    fn state(&self) -> ReadingState {
        ReadingState {
            unique_id: self.unique_id(),
            name: self.name(),
            value: self.current_value(),
            unit: self.unit_of_measurement(),
            available: self.is_available(),
            icon: self.icon(),
            attributes: self.attributes(),
        }
    }
}

/// Value of one tracked currency: its price, or price times the held amount.
pub struct CurrencyReading {
    coordinator: Weak<QuoteCoordinator>,
    symbol: String,
    currency: String,
    amount: Option<Decimal>,
    publisher: Arc<dyn StatePublisher>,
    listener_id: ListenerId,
}

impl CurrencyReading {
    /// Creates the reading and subscribes it to the coordinator.
    pub fn attach(
        coordinator: &Arc<QuoteCoordinator>,
        symbol: &str,
        amount: Option<Decimal>,
        publisher: Arc<dyn StatePublisher>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me: &Weak<Self>| {
            let listener: Weak<dyn RefreshListener> = me.clone();
            Self {
                coordinator: Arc::downgrade(coordinator),
                symbol: normalize_symbol(symbol),
                currency: coordinator.display_currency().to_string(),
                amount,
                publisher,
                listener_id: coordinator.subscribe(listener),
            }
        })
    }

    fn snapshot(&self) -> Option<Arc<QuoteSnapshot>> {
        self.coordinator.upgrade()?.snapshot()
    }

    fn price(&self) -> Option<Decimal> {
        self.snapshot()?.price(&self.symbol)
    }
}

impl Reading for CurrencyReading {
    fn name(&self) -> String {
        format!("{} Value", self.symbol)
    }

    fn unique_id(&self) -> String {
        currency_unique_id(&self.symbol, &self.currency)
    }

    fn unit_of_measurement(&self) -> String {
        self.currency.clone()
    }

    fn current_value(&self) -> Option<Decimal> {
        let price = self.price()?;
        match self.amount {
            Some(amount) => {
                let value = weighted_value(price, amount);
                if value.is_none() {
                    warn!(symbol = %self.symbol, %price, %amount, "Holding value overflowed");
                }
                value
            }
            None => Some(price),
        }
    }

    fn is_available(&self) -> bool {
        self.coordinator
            .upgrade()
            .is_some_and(|c| c.last_refresh_succeeded())
    }

    fn symbol(&self) -> Option<&str> {
        Some(self.symbol.as_str())
    }

    fn detach(&self) {
        if let Some(coordinator) = self.coordinator.upgrade() {
            coordinator.unsubscribe(self.listener_id);
        }
    }

    fn attributes(&self) -> BTreeMap<String, String> {
        let mut attributes = BTreeMap::new();
        attributes.insert("cryptocurrency".to_string(), self.symbol.clone());
        if let Some(amount) = self.amount {
            attributes.insert("amount".to_string(), amount.normalize().to_string());
        }
        if let Some(price) = self.price() {
            attributes.insert("price".to_string(), price.to_string());
        }
        attributes
    }
}

impl RefreshListener for CurrencyReading {
    fn on_refresh(&self, _coordinator: &QuoteCoordinator) {
        debug!(symbol = %self.symbol, "Publishing reading");
        self.publisher.write_state(self.state());
    }
}

/// Combined value of every tracked currency with a configured holding.
pub struct TotalValueReading {
    coordinator: Weak<QuoteCoordinator>,
    currency: String,
    symbols: TrackedSymbols,
    holdings: Holdings,
    publisher: Arc<dyn StatePublisher>,
    listener_id: ListenerId,
}

impl TotalValueReading {
    pub fn attach(
        coordinator: &Arc<QuoteCoordinator>,
        holdings: Holdings,
        publisher: Arc<dyn StatePublisher>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me: &Weak<Self>| {
            let listener: Weak<dyn RefreshListener> = me.clone();
            Self {
                coordinator: Arc::downgrade(coordinator),
                currency: coordinator.display_currency().to_string(),
                symbols: coordinator.symbols().clone(),
                holdings,
                publisher,
                listener_id: coordinator.subscribe(listener),
            }
        })
    }
}

impl Reading for TotalValueReading {
    fn name(&self) -> String {
        "Total Portfolio Value".to_string()
    }

    fn unique_id(&self) -> String {
        total_unique_id(&self.currency)
    }

    fn unit_of_measurement(&self) -> String {
        self.currency.clone()
    }

    fn current_value(&self) -> Option<Decimal> {
        let snapshot = self.coordinator.upgrade()?.snapshot()?;
        let total = portfolio_total(&snapshot, &self.symbols, &self.holdings);
        if total.is_none() {
            warn!("Portfolio total overflowed");
        }
        total
    }

    fn is_available(&self) -> bool {
        self.coordinator
            .upgrade()
            .is_some_and(|c| c.last_refresh_succeeded())
    }

    fn symbol(&self) -> Option<&str> {
        None
    }

    fn detach(&self) {
        if let Some(coordinator) = self.coordinator.upgrade() {
            coordinator.unsubscribe(self.listener_id);
        }
    }

    fn attributes(&self) -> BTreeMap<String, String> {
        let held: Vec<&str> = self
            .symbols
            .iter()
            .filter(|symbol| self.holdings.get(symbol).is_some())
            .collect();
        let mut attributes = BTreeMap::new();
        attributes.insert("cryptocurrencies".to_string(), held.join(","));
        attributes
    }
}

impl RefreshListener for TotalValueReading {
    fn on_refresh(&self, _coordinator: &QuoteCoordinator) {
        debug!("Publishing portfolio total");
        self.publisher.write_state(self.state());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::coordinator::tests::FakeQuoteProvider;
    use crate::core::error::RefreshFailure;
    use rust_decimal_macros::dec;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingPublisher {
        states: Mutex<Vec<ReadingState>>,
    }

    impl StatePublisher for RecordingPublisher {
        fn write_state(&self, state: ReadingState) {
            self.states.lock().unwrap().push(state);
        }
    }

    fn setup(
        prices: &[(&str, Decimal)],
        symbols: &[&str],
    ) -> (Arc<FakeQuoteProvider>, Arc<QuoteCoordinator>) {
        let provider = Arc::new(FakeQuoteProvider::with_prices(prices));
        let symbols: TrackedSymbols = symbols.iter().collect();
        let coordinator =
            QuoteCoordinator::new(provider.clone(), symbols, "USD", Duration::from_secs(60))
                .unwrap();
        (provider, coordinator)
    }

    #[test]
    fn test_weighted_value_is_exact() {
        assert_eq!(weighted_value(dec!(100.005), dec!(2)), Some(dec!(200.01)));
        assert_eq!(weighted_value(dec!(0.1), dec!(3)), Some(dec!(0.30)));
        assert_eq!(weighted_value(dec!(19.999), dec!(1)), Some(dec!(20.00)));
    }

    #[test]
    fn test_total_rounds_once() {
        let snapshot = QuoteSnapshot::new(
            [("A", dec!(0.005)), ("B", dec!(0.005)), ("C", dec!(0.005))]
                .into_iter()
                .map(|(s, p)| (s.to_string(), p))
                .collect(),
            "USD",
        );
        let symbols: TrackedSymbols = ["A", "B", "C"].into_iter().collect();
        let mut holdings = Holdings::new();
        for symbol in ["A", "B", "C"] {
            holdings.insert(symbol, dec!(1));
        }

        let per_term: Decimal = symbols
            .iter()
            .map(|s| weighted_value(snapshot.price(s).unwrap(), dec!(1)).unwrap())
            .sum();
        assert_eq!(per_term, dec!(0.03));
        assert_eq!(portfolio_total(&snapshot, &symbols, &holdings), Some(dec!(0.02)));
    }

    #[test]
    fn test_overflowing_value_is_unknown() {
        let amount = crate::core::holdings::parse_amount("SHIB", "1000000000000000").unwrap();
        assert_eq!(weighted_value(dec!(100000000000000), amount), None);

        let snapshot = QuoteSnapshot::new(
            [("SHIB".to_string(), dec!(100000000000000))]
                .into_iter()
                .collect(),
            "USD",
        );
        let symbols: TrackedSymbols = ["SHIB"].into_iter().collect();
        let mut holdings = Holdings::new();
        holdings.insert("SHIB", amount);
        assert_eq!(portfolio_total(&snapshot, &symbols, &holdings), None);
    }

    #[tokio::test]
    async fn test_overflowing_holding_does_not_stop_refresh() {
        let (_, coordinator) = setup(
            &[("BTC", dec!(10)), ("SHIB", dec!(100000000000000))],
            &["BTC", "SHIB"],
        );
        let publisher = Arc::new(RecordingPublisher::default());
        let mut holdings = Holdings::new();
        holdings.insert("BTC", dec!(2));
        holdings.insert("SHIB", dec!(1000000000000000));

        let btc = CurrencyReading::attach(&coordinator, "BTC", holdings.get("BTC"), publisher.clone());
        let shib = CurrencyReading::attach(&coordinator, "SHIB", holdings.get("SHIB"), publisher.clone());
        let total = TotalValueReading::attach(&coordinator, holdings, publisher.clone());
        coordinator.refresh().await.unwrap();

        assert_eq!(btc.current_value(), Some(dec!(20.00)));
        assert_eq!(shib.current_value(), None);
        assert_eq!(total.current_value(), None);
        assert_eq!(publisher.states.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_total_ignores_untracked_holdings() {
        let snapshot = QuoteSnapshot::new(
            [("BTC".to_string(), dec!(10)), ("ETH".to_string(), dec!(5))]
                .into_iter()
                .collect(),
            "USD",
        );
        let symbols: TrackedSymbols = ["BTC"].into_iter().collect();
        let mut holdings = Holdings::new();
        holdings.insert("BTC", dec!(2));
        holdings.insert("ETH", dec!(100));
        assert_eq!(portfolio_total(&snapshot, &symbols, &holdings), Some(dec!(20)));
    }

    #[test]
    fn test_unique_ids() {
        assert_eq!(currency_unique_id("BTC", "USD"), "coinmarketcap_btc_usd");
        assert_eq!(
            total_unique_id("EUR"),
            "coinmarketcap_total_portfolio_value_eur"
        );
    }

    #[tokio::test]
    async fn test_portfolio_scenario() {
        let (_, coordinator) = setup(
            &[("BTC", dec!(50000.00)), ("ETH", dec!(3000.00))],
            &["BTC", "ETH"],
        );
        let publisher = Arc::new(RecordingPublisher::default());
        let mut holdings = Holdings::new();
        holdings.insert("BTC", dec!(0.5));

        let btc = CurrencyReading::attach(&coordinator, "btc", holdings.get("BTC"), publisher.clone());
        let eth = CurrencyReading::attach(&coordinator, "ETH", holdings.get("ETH"), publisher.clone());
        let total = TotalValueReading::attach(&coordinator, holdings, publisher.clone());

        assert!(btc.current_value().is_none());
        assert!(!total.is_available());

        coordinator.refresh().await.unwrap();

        assert_eq!(btc.current_value(), Some(dec!(25000.00)));
        assert_eq!(eth.current_value(), Some(dec!(3000.00)));
        assert_eq!(total.current_value(), Some(dec!(25000.00)));
        assert!(btc.is_available() && eth.is_available() && total.is_available());
        assert_eq!(btc.name(), "BTC Value");
        assert_eq!(btc.unit_of_measurement(), "USD");
        assert_eq!(total.attributes()["cryptocurrencies"], "BTC");
        assert_eq!(btc.attributes()["amount"], "0.5");

        let states = publisher.states.lock().unwrap();
        assert_eq!(states.len(), 3);
        assert_eq!(states[0].unique_id, "coinmarketcap_btc_usd");
        assert_eq!(states[2].value, Some(dec!(25000.00)));
    }

    #[tokio::test]
    async fn test_missing_price_is_unknown_for_that_reading_only() {
        let (_, coordinator) = setup(&[("BTC", dec!(10))], &["BTC", "XYZ"]);
        let publisher = Arc::new(RecordingPublisher::default());
        let mut holdings = Holdings::new();
        holdings.insert("BTC", dec!(1));
        holdings.insert("XYZ", dec!(1));

        let xyz = CurrencyReading::attach(&coordinator, "XYZ", holdings.get("XYZ"), publisher.clone());
        let total = TotalValueReading::attach(&coordinator, holdings, publisher);
        coordinator.refresh().await.unwrap();

        assert!(xyz.is_available());
        assert_eq!(xyz.current_value(), None);
        assert_eq!(total.current_value(), Some(dec!(10.00)));
    }

    #[tokio::test]
    async fn test_failed_refresh_marks_readings_unavailable() {
        let (provider, coordinator) = setup(&[("BTC", dec!(10))], &["BTC"]);
        let publisher = Arc::new(RecordingPublisher::default());
        let btc = CurrencyReading::attach(&coordinator, "BTC", Some(dec!(3)), publisher.clone());
        coordinator.refresh().await.unwrap();

        provider.fail(Some(RefreshFailure::Status(429)));
        provider.set_price("BTC", dec!(99));
        let _ = coordinator.refresh().await;

        assert!(!btc.is_available());
        assert_eq!(btc.current_value(), Some(dec!(30.00)));
        let states = publisher.states.lock().unwrap();
        assert_eq!(states.len(), 2);
        assert!(!states[1].available);
    }

    #[tokio::test]
    async fn test_detach_stops_publishing() {
        let (_, coordinator) = setup(&[("BTC", dec!(10))], &["BTC"]);
        let publisher = Arc::new(RecordingPublisher::default());
        let btc = CurrencyReading::attach(&coordinator, "BTC", None, publisher.clone());

        btc.detach();
        coordinator.refresh().await.unwrap();
        assert!(publisher.states.lock().unwrap().is_empty());
        assert_eq!(btc.current_value(), Some(dec!(10)));
    }
}
