use std::collections::HashMap;

use chrono::NaiveDate;

use crate::errors::CoreError;
use crate::models::analytics::ValuationPoint;
use crate::models::portfolio::Portfolio;
use crate::models::price::PriceSeries;
use crate::models::transaction::{Transaction, TransactionKind};
use crate::services::currency_service::CurrencyService;
use crate::services::quote_service::QuoteService;

/// Maximum valuation range in days (10 years).
const MAX_RANGE_DAYS: i64 = 3650;

/// Computes the historical portfolio value series from cached price
/// data only — another strict reader of the quote cache.
///
/// Days without a price sample (weekends, holidays) carry the previous
/// close forward, and days where no held ticker has any data carry the
/// previous portfolio value forward, so the series never collapses to
/// zero mid-chart because of a data gap.
pub struct ValuationService;

impl ValuationService {
    pub fn new() -> Self {
        Self
    }

    /// Portfolio value per day over `[from, to]` in the display currency.
    ///
    /// Uses incremental computation: holdings are replayed once and
    /// advanced day by day, O(days + transactions) instead of
    /// O(days × transactions).
    pub async fn portfolio_value_range(
        &self,
        portfolio: &Portfolio,
        quotes: &QuoteService,
        currency_service: &CurrencyService,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ValuationPoint>, CoreError> {
        if from > to {
            return Err(CoreError::ValidationError(format!(
                "'from' date ({from}) must not be after 'to' date ({to})"
            )));
        }
        let range_days = (to - from).num_days();
        if range_days > MAX_RANGE_DAYS {
            return Err(CoreError::ValidationError(format!(
                "Valuation range of {range_days} days exceeds maximum of {MAX_RANGE_DAYS} days (10 years)"
            )));
        }

        let display_currency = portfolio.settings.display_currency.clone();

        // One cache read per ticker for the whole range.
        let mut series: HashMap<String, PriceSeries> = HashMap::new();
        for stock in &portfolio.stocks {
            series.insert(stock.ticker.clone(), quotes.get(&stock.ticker));
        }

        // Share volumes held at the start of the range (before `from`).
        let mut volumes: HashMap<String, i64> = HashMap::new();
        let mut transactions_by_date: HashMap<NaiveDate, Vec<&Transaction>> = HashMap::new();
        for tx in &portfolio.transactions {
            if tx.date < from {
                Self::apply(&mut volumes, tx);
            } else if tx.date <= to {
                transactions_by_date.entry(tx.date).or_default().push(tx);
            }
        }

        let mut points = Vec::with_capacity(range_days as usize + 1);
        let mut last_known_value = 0.0;
        let mut current = from;

        while current <= to {
            if let Some(day_transactions) = transactions_by_date.get(&current) {
                for tx in day_transactions {
                    Self::apply(&mut volumes, tx);
                }
            }

            let mut value = 0.0;
            let mut any_price_found = false;

            for (ticker, volume) in &volumes {
                if *volume <= 0 {
                    continue;
                }
                let Some(price) = series
                    .get(ticker)
                    .and_then(|s| s.price_on_or_before(current))
                else {
                    continue;
                };
                let currency = portfolio
                    .find_stock(ticker)
                    .map(|s| s.currency.as_str())
                    .unwrap_or(display_currency.as_str());
                value += currency_service
                    .convert(price * (*volume as f64), currency, &display_currency, current)
                    .await?;
                any_price_found = true;
            }

            // Carry forward on days with no usable price data
            if !volumes.values().all(|v| *v <= 0) && !any_price_found {
                value = last_known_value;
            } else {
                last_known_value = value;
            }

            points.push(ValuationPoint {
                date: current,
                value,
            });

            match current.succ_opt() {
                Some(next) => current = next,
                None => break,
            }
        }

        Ok(points)
    }

    fn apply(volumes: &mut HashMap<String, i64>, tx: &Transaction) {
        let volume = volumes.entry(tx.ticker.clone()).or_insert(0);
        match tx.kind {
            TransactionKind::Buy => *volume += i64::from(tx.volume),
            TransactionKind::Sell => *volume -= i64::from(tx.volume),
        }
    }
}

impl Default for ValuationService {
    fn default() -> Self {
        Self::new()
    }
}
