use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::settings::Settings;
use super::stock::Stock;
use super::transaction::Transaction;

/// The main data container. Everything in here is serialized to the
/// portfolio JSON document on disk.
///
/// Contains: the watchlist (which tickers the refresh worker polls),
/// the buy/sell ledger, and user settings. Price data lives in its own
/// cache documents owned by the quote service — not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Portfolio {
    /// Watched stocks (ticker, name, native currency)
    pub stocks: Vec<Stock>,

    /// All buy/sell transactions, kept sorted by date
    pub transactions: Vec<Transaction>,

    /// User settings (display currency, refresh knobs, retention)
    pub settings: Settings,

    /// Transactions that have been removed but can be restored (undo support).
    #[serde(default)]
    pub trash: Vec<Transaction>,
}

impl Default for Portfolio {
    fn default() -> Self {
        Self {
            stocks: Vec::new(),
            transactions: Vec::new(),
            settings: Settings::default(),
            trash: Vec::new(),
        }
    }
}

impl Portfolio {
    /// Look up a watchlist entry by ticker (case-insensitive).
    #[must_use]
    pub fn find_stock(&self, ticker: &str) -> Option<&Stock> {
        let upper = ticker.to_uppercase();
        self.stocks.iter().find(|s| s.ticker == upper)
    }

    /// All watched tickers, sorted and deduplicated.
    #[must_use]
    pub fn tickers(&self) -> BTreeSet<String> {
        self.stocks.iter().map(|s| s.ticker.clone()).collect()
    }
}
