//! Per-currency held amounts as exact decimals.

use crate::core::error::FlowError;
use crate::core::symbols::normalize_symbol;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

/// Parses a user-entered amount. A comma decimal separator is accepted.
pub fn parse_amount(symbol: &str, input: &str) -> Result<Decimal, FlowError> {
    let normalized = input.trim().replace(',', ".");
    let invalid = || FlowError::InvalidAmount {
        symbol: normalize_symbol(symbol),
        input: input.to_string(),
    };
    if normalized.is_empty() {
        return Err(invalid());
    }
    let amount = Decimal::from_str(&normalized)
        .or_else(|_| Decimal::from_scientific(&normalized))
        .map_err(|_| invalid())?;
    if amount.is_sign_negative() {
        return Err(invalid());
    }
    Ok(amount.normalize())
}

/// Amount held per ticker. Symbols without an entry have no configured holding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Holdings(HashMap<String, Decimal>);

impl Holdings {
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    /// Parses the persisted symbol to amount mapping. Fails on the first invalid amount and
    /// commits nothing.
    pub fn parse(raw: &BTreeMap<String, String>) -> Result<Self, FlowError> {
        let mut holdings = Holdings::new();
        for (symbol, input) in raw {
            let amount = parse_amount(symbol, input)?;
            holdings.insert(symbol, amount);
        }
        Ok(holdings)
    }

    pub fn insert(&mut self, symbol: &str, amount: Decimal) {
        self.0.insert(normalize_symbol(symbol), amount);
    }

    pub fn get(&self, symbol: &str) -> Option<Decimal> {
        self.0.get(&normalize_symbol(symbol)).copied()
    }
}
