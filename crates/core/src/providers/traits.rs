use async_trait::async_trait;
use chrono::NaiveDate;

use crate::errors::CoreError;
use crate::models::price::PricePoint;

/// Trait abstraction for upstream quote sources.
///
/// The upstream APIs are unofficial and schema-unstable; each
/// implementation owns the boundary parsing and maps everything into
/// `PricePoint`s. If a source stops working or changes, we replace only
/// that one implementation — the rest of the codebase is untouched.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Human-readable name of this provider (for logs/errors).
    fn name(&self) -> &str;

    /// Get the most recent available quote for a ticker.
    async fn latest_quote(&self, ticker: &str) -> Result<PricePoint, CoreError>;

    /// Get daily closing prices for a date range (inclusive).
    /// Returns samples sorted by date; days without trading are absent.
    async fn daily_history(
        &self,
        ticker: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PricePoint>, CoreError>;
}

/// Trait abstraction for fiat exchange-rate sources.
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Human-readable name of this provider (for logs/errors).
    fn name(&self) -> &str;

    /// Exchange rate from `base` to `quote` on a given date
    /// (e.g., rate_on("USD", "SEK", d) ≈ 10.5).
    async fn rate_on(
        &self,
        base: &str,
        quote: &str,
        date: NaiveDate,
    ) -> Result<f64, CoreError>;
}
