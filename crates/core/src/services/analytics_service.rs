use chrono::NaiveDate;

use crate::errors::CoreError;
use crate::models::analytics::{HoldingSummary, PortfolioSummary};
use crate::models::portfolio::Portfolio;
use crate::models::price::Freshness;
use crate::services::currency_service::CurrencyService;
use crate::services::portfolio_service::PortfolioService;
use crate::services::quote_service::QuoteService;

/// Computes portfolio analytics: market value, unrealized and realized
/// gain/loss, allocation breakdown.
///
/// Strictly a reader of the quote cache: it calls `get` and never
/// triggers upstream fetches or merges. Missing or old price data
/// degrades to flags on the summary — a holding without any cached
/// price contributes zero market value and shows up stale, it does not
/// fail the whole summary.
pub struct AnalyticsService {
    portfolio_service: PortfolioService,
}

impl AnalyticsService {
    pub fn new() -> Self {
        Self {
            portfolio_service: PortfolioService::new(),
        }
    }

    /// Generate a full portfolio summary at a given date.
    pub async fn portfolio_summary(
        &self,
        portfolio: &Portfolio,
        quotes: &QuoteService,
        currency_service: &CurrencyService,
        as_of: NaiveDate,
    ) -> Result<PortfolioSummary, CoreError> {
        let display_currency = portfolio.settings.display_currency.clone();
        let holdings = self.portfolio_service.holdings(portfolio, as_of);
        let realized = self.portfolio_service.realized_profit(portfolio, as_of);

        let mut summaries = Vec::with_capacity(holdings.len());
        let mut stale_tickers = Vec::new();
        let mut total_market_value = 0.0;
        let mut total_cost_basis = 0.0;

        for (ticker, holding) in &holdings {
            let series = quotes.get(ticker);
            let last_price = series.price_on_or_before(as_of);

            if series.freshness == Freshness::Stale {
                stale_tickers.push(ticker.clone());
            }

            let native_value = last_price.map_or(0.0, |p| p * f64::from(holding.volume()));
            let market_value = currency_service
                .convert(native_value, &holding.currency, &display_currency, as_of)
                .await?;
            let cost_basis = currency_service
                .convert(holding.cost_basis(), &holding.currency, &display_currency, as_of)
                .await?;
            let realized_native = realized.get(ticker).copied().unwrap_or(0.0);
            let realized_value = currency_service
                .convert(realized_native, &holding.currency, &display_currency, as_of)
                .await?;

            let unrealized = market_value - cost_basis;
            let name = portfolio
                .find_stock(ticker)
                .map(|s| s.name.clone())
                .unwrap_or_default();

            total_market_value += market_value;
            total_cost_basis += cost_basis;

            summaries.push(HoldingSummary {
                ticker: ticker.clone(),
                name,
                currency: holding.currency.clone(),
                volume: holding.volume(),
                average_price: holding.average_price(),
                cost_basis,
                last_price,
                market_value,
                unrealized,
                realized: realized_value,
                return_pct: if cost_basis > 0.0 {
                    ((unrealized + realized_value) / cost_basis) * 100.0
                } else {
                    0.0
                },
                allocation_pct: 0.0, // filled below once the total is known
                freshness: series.freshness,
                fallback: series.fallback,
            });
        }

        for summary in &mut summaries {
            summary.allocation_pct = if total_market_value > 0.0 {
                (summary.market_value / total_market_value) * 100.0
            } else {
                0.0
            };
        }

        // Sort by allocation (largest first)
        summaries.sort_by(|a, b| {
            b.allocation_pct
                .partial_cmp(&a.allocation_pct)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        // Realized profit on closed positions has no holding entry —
        // fold it into the total separately.
        let mut total_realized = 0.0;
        for (ticker, profit) in &realized {
            let currency = portfolio
                .find_stock(ticker)
                .map(|s| s.currency.clone())
                .unwrap_or_else(|| display_currency.clone());
            total_realized += currency_service
                .convert(*profit, &currency, &display_currency, as_of)
                .await?;
        }

        let total_unrealized = total_market_value - total_cost_basis;
        let total_return_pct = if total_cost_basis > 0.0 {
            ((total_unrealized + total_realized) / total_cost_basis) * 100.0
        } else {
            0.0
        };

        stale_tickers.sort();

        Ok(PortfolioSummary {
            as_of,
            currency: display_currency,
            total_market_value,
            total_cost_basis,
            total_unrealized,
            total_realized,
            total_fees: self.portfolio_service.total_fees(portfolio, as_of),
            total_return_pct,
            holdings: summaries,
            stale_tickers,
        })
    }
}

impl Default for AnalyticsService {
    fn default() -> Self {
        Self::new()
    }
}
