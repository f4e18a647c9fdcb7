use std::collections::HashMap;
use std::sync::RwLock;

use chrono::NaiveDate;
use tracing::debug;

use crate::errors::CoreError;
use crate::providers::frankfurter::FrankfurterProvider;
use crate::providers::traits::RateProvider;

/// Converts amounts between currencies using cached daily exchange rates.
///
/// Each (base, quote, date) rate is fetched at most once and then served
/// from the in-memory cache, so a valuation over a year of history makes
/// one upstream call per currency pair per distinct date — and none at
/// all for same-currency conversions.
pub struct CurrencyService {
    provider: Box<dyn RateProvider>,
    rates: RwLock<HashMap<(String, String, NaiveDate), f64>>,
}

impl CurrencyService {
    /// Default construction with the Frankfurter ECB-data provider.
    pub fn new() -> Self {
        Self::with_provider(Box::new(FrankfurterProvider::new()))
    }

    /// Construct with a custom rate source (tests, offline fixtures).
    pub fn with_provider(provider: Box<dyn RateProvider>) -> Self {
        Self {
            provider,
            rates: RwLock::new(HashMap::new()),
        }
    }

    /// Exchange rate from `base` to `quote` on `date`, cached.
    pub async fn rate(
        &self,
        base: &str,
        quote: &str,
        date: NaiveDate,
    ) -> Result<f64, CoreError> {
        let base = base.to_uppercase();
        let quote = quote.to_uppercase();

        if base == quote {
            return Ok(1.0);
        }

        let key = (base.clone(), quote.clone(), date);
        if let Some(rate) = self
            .rates
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key)
        {
            return Ok(*rate);
        }

        let rate = self.provider.rate_on(&base, &quote, date).await?;
        if !rate.is_finite() || rate <= 0.0 {
            return Err(CoreError::Api {
                provider: self.provider.name().to_string(),
                message: format!("Invalid rate {rate} for {base}/{quote} on {date}"),
            });
        }

        debug!(%base, %quote, %date, rate, "cached exchange rate");
        self.rates
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, rate);
        Ok(rate)
    }

    /// Convert an amount from one currency to another on a given date.
    pub async fn convert(
        &self,
        amount: f64,
        from: &str,
        to: &str,
        date: NaiveDate,
    ) -> Result<f64, CoreError> {
        let rate = self.rate(from, to, date).await?;
        Ok(amount * rate)
    }

    /// Number of cached rates (for diagnostics).
    #[must_use]
    pub fn cached_rate_count(&self) -> usize {
        self.rates.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Default for CurrencyService {
    fn default() -> Self {
        Self::new()
    }
}
