use serde::{Deserialize, Serialize};

use super::price::Freshness;

/// Summary of the entire portfolio at a point in time.
///
/// All monetary values are in the display currency. Stale or degraded
/// price data is surfaced through the per-holding flags — the summary
/// itself never fails just because a series is old.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioSummary {
    /// Date this summary was computed for
    pub as_of: chrono::NaiveDate,

    /// Currency used for all monetary values
    pub currency: String,

    /// Total market value of all open positions
    pub total_market_value: f64,

    /// Total FIFO cost basis of all open positions
    pub total_cost_basis: f64,

    /// Unrealized gain/loss: market value − cost basis
    pub total_unrealized: f64,

    /// Realized gain/loss from sells (proceeds − matched lot cost − sell fees)
    pub total_realized: f64,

    /// Sum of all brokerage fees paid (buys and sells)
    pub total_fees: f64,

    /// Percentage return: (unrealized + realized) / cost basis × 100
    pub total_return_pct: f64,

    /// Per-holding breakdown, largest allocation first
    pub holdings: Vec<HoldingSummary>,

    /// Tickers whose series was flagged stale while computing this summary
    pub stale_tickers: Vec<String>,
}

/// Summary of a single open position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldingSummary {
    /// Ticker symbol
    pub ticker: String,

    /// Display name from the watchlist
    pub name: String,

    /// Native trading currency
    pub currency: String,

    /// Shares held
    pub volume: u32,

    /// Volume-weighted average purchase price, native currency
    pub average_price: f64,

    /// FIFO cost basis converted to the display currency
    pub cost_basis: f64,

    /// Latest cached price per share, native currency (None if never fetched)
    pub last_price: Option<f64>,

    /// Market value in the display currency (0 when no price data exists)
    pub market_value: f64,

    /// Unrealized gain/loss in the display currency
    pub unrealized: f64,

    /// Realized gain/loss from sells of this stock, display currency
    pub realized: f64,

    /// Percentage return against cost basis
    pub return_pct: f64,

    /// Share of total portfolio market value, in percent
    pub allocation_pct: f64,

    /// Freshness of the series backing these numbers
    pub freshness: Freshness,

    /// True if the last refresh attempt for this ticker failed
    pub fallback: bool,
}

/// One day of the historical portfolio valuation series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValuationPoint {
    pub date: chrono::NaiveDate,

    /// Portfolio value in the display currency; carried forward on days
    /// without price samples (weekends, holidays)
    pub value: f64,
}
