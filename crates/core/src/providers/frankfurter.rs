use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;

use super::traits::RateProvider;
use crate::errors::CoreError;

const BASE_URL: &str = "https://api.frankfurter.dev/v1";

/// Frankfurter API provider for fiat currency exchange rates.
///
/// - **Free**: No API key, no rate limits, open-source.
/// - **Source**: European Central Bank (ECB) data.
/// - **Coverage**: ~30+ currencies (EUR, USD, SEK, GBP, JPY, etc.)
/// - **Endpoints**: `/latest`, `/{date}`
///
/// Weekends and holidays have no rate of their own; Frankfurter
/// resolves a dated request to the last published banking day.
pub struct FrankfurterProvider {
    client: Client,
}

impl FrankfurterProvider {
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }
}

impl Default for FrankfurterProvider {
    fn default() -> Self {
        Self::new()
    }
}

// ── Frankfurter API response types ──────────────────────────────────
// The schema is not guaranteed stable: only the `rates` map is relied
// upon, and a missing target currency is an explicit error.

#[derive(Deserialize)]
struct RatesResponse {
    #[serde(default)]
    rates: HashMap<String, f64>,
}

#[async_trait]
impl RateProvider for FrankfurterProvider {
    fn name(&self) -> &str {
        "Frankfurter"
    }

    async fn rate_on(
        &self,
        base: &str,
        quote: &str,
        date: NaiveDate,
    ) -> Result<f64, CoreError> {
        let base = base.to_uppercase();
        let quote = quote.to_uppercase();

        // Same currency → rate is 1.0
        if base == quote {
            return Ok(1.0);
        }

        let date_str = date.format("%Y-%m-%d");
        let url = format!("{BASE_URL}/{date_str}?base={base}&symbols={quote}");

        let resp: RatesResponse = self
            .client
            .get(&url)
            .send()
            .await?
            .json()
            .await
            .map_err(|e| CoreError::Api {
                provider: "Frankfurter".into(),
                message: format!("Failed to parse rate for {base}/{quote} on {date}: {e}"),
            })?;

        resp.rates.get(&quote).copied().ok_or_else(|| CoreError::Api {
            provider: "Frankfurter".into(),
            message: format!("No rate found for {base} → {quote} on {date}"),
        })
    }
}
