use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use time::OffsetDateTime;

use super::traits::QuoteProvider;
use crate::errors::CoreError;
use crate::models::price::PricePoint;

/// Yahoo Finance provider for stock quotes.
///
/// - **Free**: No API key required.
/// - **No strict rate limits** (unofficial public API).
/// - **Coverage**: Global equities, ETFs, indices.
/// - **Data**: Real-time quotes + full historical OHLCV.
///
/// Uses the `yahoo_finance_api` crate which wraps Yahoo Finance's
/// public endpoints. Prices come back in the stock's native trading
/// currency; conversion to the display currency is CurrencyService's job.
///
/// The API is unofficial, so every response field is treated as
/// fallible here — parse errors become `CoreError::Api`, and the quote
/// service decides whether to fall back to cached data.
pub struct YahooFinanceProvider {
    connector: yahoo_finance_api::YahooConnector,
}

impl YahooFinanceProvider {
    pub fn new() -> Result<Self, CoreError> {
        let connector = yahoo_finance_api::YahooConnector::new()
            .map_err(|e| CoreError::Api {
                provider: "Yahoo Finance".into(),
                message: format!("Failed to create connector: {e}"),
            })?;
        Ok(Self { connector })
    }

    /// Convert a `chrono::NaiveDate` to `time::OffsetDateTime` (midnight UTC).
    fn to_offset_datetime(date: NaiveDate) -> Result<OffsetDateTime, CoreError> {
        let month: time::Month = match date.month() {
            1 => time::Month::January,
            2 => time::Month::February,
            3 => time::Month::March,
            4 => time::Month::April,
            5 => time::Month::May,
            6 => time::Month::June,
            7 => time::Month::July,
            8 => time::Month::August,
            9 => time::Month::September,
            10 => time::Month::October,
            11 => time::Month::November,
            12 => time::Month::December,
            _ => unreachable!(),
        };

        let odt = time::Date::from_calendar_date(date.year(), month, date.day() as u8)
            .map_err(|e| CoreError::Api {
                provider: "Yahoo Finance".into(),
                message: format!("Invalid date {date}: {e}"),
            })?
            .with_hms(0, 0, 0)
            .map_err(|e| CoreError::Api {
                provider: "Yahoo Finance".into(),
                message: format!("Invalid time for {date}: {e}"),
            })?
            .assume_utc();
        Ok(odt)
    }

    /// Convert a unix timestamp (seconds) to `chrono::NaiveDate`.
    fn timestamp_to_naive_date(ts: i64) -> Option<NaiveDate> {
        chrono::DateTime::from_timestamp(ts, 0).map(|dt| dt.date_naive())
    }
}

#[async_trait]
impl QuoteProvider for YahooFinanceProvider {
    fn name(&self) -> &str {
        "Yahoo Finance"
    }

    async fn latest_quote(&self, ticker: &str) -> Result<PricePoint, CoreError> {
        let resp = self
            .connector
            .get_latest_quotes(ticker, "1d")
            .await
            .map_err(|e| CoreError::Api {
                provider: "Yahoo Finance".into(),
                message: format!("Failed to fetch latest quote for {ticker}: {e}"),
            })?;

        let quote = resp.last_quote().map_err(|e| CoreError::Api {
            provider: "Yahoo Finance".into(),
            message: format!("No quote data for {ticker}: {e}"),
        })?;

        let date = Self::timestamp_to_naive_date(quote.timestamp).ok_or_else(|| {
            CoreError::Api {
                provider: "Yahoo Finance".into(),
                message: format!("Unparseable quote timestamp for {ticker}: {}", quote.timestamp),
            }
        })?;

        Ok(PricePoint {
            date,
            price: quote.close,
        })
    }

    async fn daily_history(
        &self,
        ticker: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PricePoint>, CoreError> {
        let start = Self::to_offset_datetime(from)?;
        let end = Self::to_offset_datetime(to + chrono::Duration::days(1))?; // inclusive end

        let resp = self
            .connector
            .get_quote_history(ticker, start, end)
            .await
            .map_err(|e| CoreError::Api {
                provider: "Yahoo Finance".into(),
                message: format!("Failed to fetch history for {ticker}: {e}"),
            })?;

        let quotes = resp.quotes().map_err(|e| CoreError::Api {
            provider: "Yahoo Finance".into(),
            message: format!("Failed to parse quotes for {ticker}: {e}"),
        })?;

        let points: Vec<PricePoint> = quotes
            .iter()
            .filter_map(|q| {
                let date = Self::timestamp_to_naive_date(q.timestamp)?;
                if date >= from && date <= to {
                    Some(PricePoint {
                        date,
                        price: q.close,
                    })
                } else {
                    None
                }
            })
            .collect();

        Ok(points)
    }
}
