//! Ordered, de-duplicated set of ticker symbols.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Upper-cases and trims a ticker so it can be compared or used as a key.
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

/// Tracked cryptocurrencies in the order they were chosen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackedSymbols(Vec<String>);

impl TrackedSymbols {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Adds a symbol unless it is blank or already present. Returns true if it was added.
    pub fn insert(&mut self, symbol: &str) -> bool {
        let symbol = normalize_symbol(symbol);
        if symbol.is_empty() || self.0.contains(&symbol) {
            return false;
        }
        self.0.push(symbol);
        true
    }

    pub fn contains(&self, symbol: &str) -> bool {
        let symbol = normalize_symbol(symbol);
        self.0.iter().any(|s| *s == symbol)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Symbols present here but not in `other`.
    pub fn difference(&self, other: &TrackedSymbols) -> Vec<String> {
        self.0
            .iter()
            .filter(|s| !other.contains(s))
            .cloned()
            .collect()
    }

    /// Comma-joined list as expected by the batched quote query.
    pub fn joined(&self) -> String {
        self.0.join(",")
    }
}

impl<S: AsRef<str>> FromIterator<S> for TrackedSymbols {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut symbols = TrackedSymbols::new();
        for symbol in iter {
            symbols.insert(symbol.as_ref());
        }
        symbols
    }
}

impl fmt::Display for TrackedSymbols {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(", "))
    }
}

impl Serialize for TrackedSymbols {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TrackedSymbols {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Vec::<String>::deserialize(deserializer)?;
        Ok(raw.iter().collect())
    }
}
