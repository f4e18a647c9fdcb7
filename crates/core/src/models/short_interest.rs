use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One disclosed holder of a short position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionHolder {
    /// Name of the institution holding the position
    pub name: String,

    /// Their share of outstanding stock sold short, in percent
    pub percent: f64,
}

/// Aggregated short interest in one stock on one disclosure date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortPosition {
    /// Ticker symbol, uppercased
    pub ticker: String,

    /// Total percent of outstanding shares sold short
    pub percent_of_shares: f64,

    /// Individual disclosed holders, largest first
    #[serde(default)]
    pub holders: Vec<PositionHolder>,

    /// Disclosure date of this figure
    pub date: NaiveDate,
}

/// The validated short-interest document: what the upstream feed
/// published, after boundary validation dropped malformed entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShortInterestDocument {
    /// When the upstream producer generated the document
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,

    /// Current positions, one per ticker
    #[serde(default)]
    pub positions: Vec<ShortPosition>,
}

impl ShortInterestDocument {
    #[must_use]
    pub fn position(&self, ticker: &str) -> Option<&ShortPosition> {
        let upper = ticker.to_uppercase();
        self.positions.iter().find(|p| p.ticker == upper)
    }
}

/// One retained history sample: short percent for a ticker on a date.
/// History is bounded by the 365-day retention policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShortHistoryPoint {
    pub date: NaiveDate,
    pub percent: f64,
}
