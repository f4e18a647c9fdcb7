// ═══════════════════════════════════════════════════════════════════
// Provider Tests — registry ordering, rate provider seam,
// CurrencyService caching
// ═══════════════════════════════════════════════════════════════════

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;

use stock_tracker_core::errors::CoreError;
use stock_tracker_core::models::price::PricePoint;
use stock_tracker_core::providers::registry::ProviderRegistry;
use stock_tracker_core::providers::traits::{QuoteProvider, RateProvider};
use stock_tracker_core::services::currency_service::CurrencyService;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

// ═══════════════════════════════════════════════════════════════════
// Mocks
// ═══════════════════════════════════════════════════════════════════

struct NamedProvider {
    name: &'static str,
}

#[async_trait]
impl QuoteProvider for NamedProvider {
    fn name(&self) -> &str {
        self.name
    }

    async fn latest_quote(&self, _ticker: &str) -> Result<PricePoint, CoreError> {
        Ok(PricePoint {
            date: d(2026, 1, 2),
            price: 1.0,
        })
    }

    async fn daily_history(
        &self,
        _ticker: &str,
        _from: NaiveDate,
        _to: NaiveDate,
    ) -> Result<Vec<PricePoint>, CoreError> {
        Ok(vec![])
    }
}

/// Counts upstream calls so tests can verify the rate cache works.
struct CountingRateProvider {
    rate: f64,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl RateProvider for CountingRateProvider {
    fn name(&self) -> &str {
        "CountingRates"
    }

    async fn rate_on(
        &self,
        _base: &str,
        _quote: &str,
        _date: NaiveDate,
    ) -> Result<f64, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.rate)
    }
}

struct FailingRateProvider;

#[async_trait]
impl RateProvider for FailingRateProvider {
    fn name(&self) -> &str {
        "FailingRates"
    }

    async fn rate_on(
        &self,
        _base: &str,
        _quote: &str,
        _date: NaiveDate,
    ) -> Result<f64, CoreError> {
        Err(CoreError::Network("rates unreachable".into()))
    }
}

struct BogusRateProvider;

#[async_trait]
impl RateProvider for BogusRateProvider {
    fn name(&self) -> &str {
        "BogusRates"
    }

    async fn rate_on(
        &self,
        _base: &str,
        _quote: &str,
        _date: NaiveDate,
    ) -> Result<f64, CoreError> {
        Ok(-3.0)
    }
}

// ═══════════════════════════════════════════════════════════════════
// ProviderRegistry
// ═══════════════════════════════════════════════════════════════════

mod registry {
    use super::*;

    #[test]
    fn empty_registry() {
        let registry = ProviderRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert!(registry.provider_names().is_empty());
    }

    #[test]
    fn registration_order_is_fallback_priority() {
        let mut registry = ProviderRegistry::new();
        registry.register(Box::new(NamedProvider { name: "primary" }));
        registry.register(Box::new(NamedProvider { name: "backup" }));
        assert_eq!(registry.provider_names(), vec!["primary", "backup"]);
        assert_eq!(registry.providers()[0].name(), "primary");
    }

    #[test]
    fn default_is_empty_registry() {
        let registry = ProviderRegistry::default();
        assert!(registry.is_empty());
    }
}

// ═══════════════════════════════════════════════════════════════════
// CurrencyService
// ═══════════════════════════════════════════════════════════════════

mod currency_service {
    use super::*;

    #[tokio::test]
    async fn same_currency_needs_no_provider() {
        let calls = Arc::new(AtomicUsize::new(0));
        let service = CurrencyService::with_provider(Box::new(CountingRateProvider {
            rate: 2.0,
            calls: calls.clone(),
        }));

        let rate = service.rate("usd", "USD", d(2026, 1, 2)).await.unwrap();
        assert!((rate - 1.0).abs() < f64::EPSILON);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn rate_is_fetched_once_then_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let service = CurrencyService::with_provider(Box::new(CountingRateProvider {
            rate: 0.095,
            calls: calls.clone(),
        }));

        let first = service.rate("SEK", "USD", d(2026, 1, 2)).await.unwrap();
        let second = service.rate("SEK", "USD", d(2026, 1, 2)).await.unwrap();
        assert!((first - second).abs() < f64::EPSILON);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(service.cached_rate_count(), 1);
    }

    #[tokio::test]
    async fn distinct_dates_are_distinct_cache_keys() {
        let calls = Arc::new(AtomicUsize::new(0));
        let service = CurrencyService::with_provider(Box::new(CountingRateProvider {
            rate: 0.095,
            calls: calls.clone(),
        }));

        service.rate("SEK", "USD", d(2026, 1, 2)).await.unwrap();
        service.rate("SEK", "USD", d(2026, 1, 3)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(service.cached_rate_count(), 2);
    }

    #[tokio::test]
    async fn convert_multiplies_by_rate() {
        let service = CurrencyService::with_provider(Box::new(CountingRateProvider {
            rate: 0.1,
            calls: Arc::new(AtomicUsize::new(0)),
        }));

        let converted = service
            .convert(550.0, "SEK", "USD", d(2026, 1, 2))
            .await
            .unwrap();
        assert!((converted - 55.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn provider_failure_propagates() {
        let service = CurrencyService::with_provider(Box::new(FailingRateProvider));
        let err = service.rate("SEK", "USD", d(2026, 1, 2)).await.unwrap_err();
        assert!(matches!(err, CoreError::Network(_)));
    }

    #[tokio::test]
    async fn non_positive_rate_is_rejected_not_cached() {
        let service = CurrencyService::with_provider(Box::new(BogusRateProvider));
        let err = service.rate("SEK", "USD", d(2026, 1, 2)).await.unwrap_err();
        assert!(matches!(err, CoreError::Api { .. }));
        assert_eq!(service.cached_rate_count(), 0);
    }
}
