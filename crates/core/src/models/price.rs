use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A single daily price sample (date → closing price).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub price: f64,
}

/// Freshness flag surfaced to consumers alongside cached data.
///
/// Staleness is a display hint, never an error: a stale series is still
/// the best available value and should be shown with an indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Freshness {
    /// Newest sample is within the configured staleness threshold.
    Fresh,
    /// Newest sample is older than the staleness threshold (or no data at all).
    Stale,
}

/// Cached per-ticker price series — owned exclusively by the quote service.
///
/// Samples are kept sorted by date and are idempotent by date key:
/// re-merging the same period replaces or fills gaps, never duplicates.
/// `last_fetch` is the TTL clock for refresh decisions; `fallback` marks
/// that the most recent upstream attempt failed and the data shown is
/// last-known-good.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickerSeries {
    /// Ticker symbol, uppercased (e.g., "AAPL", "ERIC-B.ST")
    pub ticker: String,

    /// Daily samples, sorted ascending by date
    pub points: Vec<PricePoint>,

    /// When the upstream source was last queried successfully
    #[serde(default)]
    pub last_fetch: Option<DateTime<Utc>>,

    /// Transient flag: the latest refresh attempt failed and cached
    /// data is being served as fallback
    #[serde(default)]
    pub fallback: bool,
}

impl TickerSeries {
    pub fn new(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into().to_uppercase(),
            points: Vec::new(),
            last_fetch: None,
            fallback: false,
        }
    }

    /// The newest sample, if any.
    #[must_use]
    pub fn latest(&self) -> Option<&PricePoint> {
        self.points.last()
    }

    /// Insert or replace a sample, keyed by date. Maintains sorted order
    /// using binary search (O(log n) lookup).
    pub fn upsert(&mut self, point: PricePoint) {
        match self.points.binary_search_by_key(&point.date, |p| p.date) {
            Ok(idx) => self.points[idx] = point,
            Err(idx) => self.points.insert(idx, point),
        }
    }

    /// Exact-date lookup via binary search.
    #[must_use]
    pub fn price_on(&self, date: NaiveDate) -> Option<f64> {
        self.points
            .binary_search_by_key(&date, |p| p.date)
            .ok()
            .map(|idx| self.points[idx].price)
    }

    /// Closest sample at or before `date` (weekends/holidays have no sample
    /// of their own, so valuation carries the previous close forward).
    #[must_use]
    pub fn price_on_or_before(&self, date: NaiveDate) -> Option<f64> {
        let idx = match self.points.binary_search_by_key(&date, |p| p.date) {
            Ok(idx) => return Some(self.points[idx].price),
            Err(idx) => idx,
        };
        idx.checked_sub(1).map(|i| self.points[i].price)
    }

    /// Drop all samples dated before `cutoff`. Returns how many were removed.
    pub fn prune_before(&mut self, cutoff: NaiveDate) -> usize {
        let split = self
            .points
            .binary_search_by_key(&cutoff, |p| p.date)
            .unwrap_or_else(|pos| pos);
        self.points.drain(..split).count()
    }
}

/// Read-side view of a cached series, returned by `QuoteService::get`.
///
/// Never an error: a ticker with no cached data yields an empty, stale
/// series. Consumers receive a snapshot and cannot mutate the cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSeries {
    pub ticker: String,
    pub points: Vec<PricePoint>,
    pub freshness: Freshness,
    pub fallback: bool,
}

impl PriceSeries {
    /// Empty series for a ticker that has never been fetched.
    pub fn missing(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into().to_uppercase(),
            points: Vec::new(),
            freshness: Freshness::Stale,
            fallback: false,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[must_use]
    pub fn latest(&self) -> Option<&PricePoint> {
        self.points.last()
    }

    #[must_use]
    pub fn price_on(&self, date: NaiveDate) -> Option<f64> {
        self.points
            .binary_search_by_key(&date, |p| p.date)
            .ok()
            .map(|idx| self.points[idx].price)
    }

    #[must_use]
    pub fn price_on_or_before(&self, date: NaiveDate) -> Option<f64> {
        let idx = match self.points.binary_search_by_key(&date, |p| p.date) {
            Ok(idx) => return Some(self.points[idx].price),
            Err(idx) => idx,
        };
        idx.checked_sub(1).map(|i| self.points[i].price)
    }
}

/// Per-ticker entry in the current-snapshot document on disk.
/// Derived from the newest sample of the series plus its fetch metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteSnapshot {
    pub price: f64,
    pub date: NaiveDate,
    #[serde(default)]
    pub last_fetch: Option<DateTime<Utc>>,
    #[serde(default)]
    pub fallback: bool,
}

/// Outcome of one refresh cycle, per ticker.
///
/// `failed` carries the error text for logging/display; the failed
/// tickers keep serving last-known-good data with the fallback flag set.
#[derive(Debug, Clone, Default)]
pub struct RefreshResult {
    /// Tickers whose series was fetched and merged this cycle
    pub refreshed: Vec<String>,
    /// Tickers skipped because their cache entry was within the TTL
    pub skipped: Vec<String>,
    /// Tickers whose upstream fetch failed: (ticker, error message)
    pub failed: Vec<(String, String)>,
    /// Total number of anomalous samples rejected across all tickers
    pub rejected_samples: usize,
}

impl RefreshResult {
    /// True when no ticker failed this cycle.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    #[must_use]
    pub fn attempted(&self) -> usize {
        self.refreshed.len() + self.failed.len()
    }
}
