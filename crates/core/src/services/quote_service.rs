use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::{debug, info, warn};

use crate::errors::CoreError;
use crate::models::price::{
    Freshness, PricePoint, PriceSeries, QuoteSnapshot, RefreshResult, TickerSeries,
};
use crate::models::settings::Settings;
use crate::providers::registry::ProviderRegistry;
use crate::storage::manager::StorageManager;

/// Tuning knobs for the quote cache, snapshotted from `Settings`.
///
/// The fetch TTL and the staleness threshold are independent durations:
/// the TTL gates upstream requests, the threshold gates the stale flag
/// shown to consumers.
#[derive(Debug, Clone)]
pub struct QuoteConfig {
    pub fetch_ttl: Duration,
    pub staleness_threshold: Duration,
    pub retention_days: i64,
    pub backfill_days: i64,
    pub max_daily_jump_ratio: f64,
}

impl From<&Settings> for QuoteConfig {
    fn from(s: &Settings) -> Self {
        Self {
            fetch_ttl: Duration::seconds(s.fetch_ttl_secs as i64),
            staleness_threshold: Duration::seconds(s.staleness_threshold_secs as i64),
            retention_days: i64::from(s.history_retention_days),
            backfill_days: i64::from(s.history_backfill_days),
            max_daily_jump_ratio: s.max_daily_jump_ratio,
        }
    }
}

impl Default for QuoteConfig {
    fn default() -> Self {
        (&Settings::default()).into()
    }
}

/// The fetch-cache-fallback component: keeps per-ticker daily price
/// series fresh without blocking readers, tolerating an unreliable
/// upstream source.
///
/// Ownership model: this service is the single writer of the quote
/// cache. Readers go through `get`, which clones an `Arc` under a short
/// read lock — a slow fetch for one ticker never blocks a display path,
/// and per-ticker replacement is copy-on-write. No lock is ever held
/// across a network call; the merge swap is the only critical section.
///
/// Failure semantics: an upstream error for one ticker marks that
/// ticker's fallback flag and moves on — the next scheduled cycle
/// retries. Local storage errors abort the cycle and surface to the
/// caller; they mean the data directory itself is broken.
pub struct QuoteService {
    registry: ProviderRegistry,
    store: RwLock<HashMap<String, Arc<TickerSeries>>>,
    config: RwLock<QuoteConfig>,
    storage: StorageManager,
}

impl QuoteService {
    /// Build the service and hydrate the in-memory cache from the
    /// on-disk documents (if any).
    pub fn new(
        registry: ProviderRegistry,
        config: QuoteConfig,
        storage: StorageManager,
    ) -> Result<Self, CoreError> {
        let history = storage.load_price_history()?.unwrap_or_default();
        let snapshots = storage.load_quote_snapshots()?.unwrap_or_default();

        let mut store = HashMap::with_capacity(history.len());
        for (ticker, mut points) in history {
            points.sort_by_key(|p| p.date);
            let meta = snapshots.get(&ticker);
            store.insert(
                ticker.clone(),
                Arc::new(TickerSeries {
                    ticker,
                    points,
                    last_fetch: meta.and_then(|m| m.last_fetch),
                    fallback: meta.is_some_and(|m| m.fallback),
                }),
            );
        }

        Ok(Self {
            registry,
            store: RwLock::new(store),
            config: RwLock::new(config),
            storage,
        })
    }

    /// Swap in new tuning knobs (takes effect from the next cycle).
    pub fn update_config(&self, config: QuoteConfig) {
        *self.config.write().unwrap_or_else(|e| e.into_inner()) = config;
    }

    fn config_snapshot(&self) -> QuoteConfig {
        self.config.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    // ── Refresh (write path) ────────────────────────────────────────

    /// Refresh all given tickers using the configured fetch TTL.
    pub async fn refresh(&self, tickers: &BTreeSet<String>) -> Result<RefreshResult, CoreError> {
        let ttl = self.config_snapshot().fetch_ttl;
        self.refresh_with_ttl(tickers, ttl).await
    }

    /// Refresh each ticker independently: skip entries younger than
    /// `ttl`, fetch and merge the rest. One ticker's failure never
    /// aborts the others — it keeps its cached data and gains the
    /// fallback flag until a later cycle succeeds.
    pub async fn refresh_with_ttl(
        &self,
        tickers: &BTreeSet<String>,
        ttl: Duration,
    ) -> Result<RefreshResult, CoreError> {
        let config = self.config_snapshot();
        let now = Utc::now();
        let today = now.date_naive();
        let mut result = RefreshResult::default();

        for ticker in tickers {
            let ticker = ticker.to_uppercase();

            // Short read: grab the current series handle, then release.
            let existing = self.read_series(&ticker);

            if let Some(series) = &existing {
                if let Some(fetched_at) = series.last_fetch {
                    if now - fetched_at < ttl {
                        debug!(%ticker, "cache entry within TTL, skipping upstream call");
                        result.skipped.push(ticker);
                        continue;
                    }
                }
            }

            let from = match existing.as_ref().and_then(|s| s.latest()) {
                Some(latest) => latest.date, // re-fetch the newest day: fills gaps, replaces partial closes
                None => today - Duration::days(config.backfill_days),
            };

            match self.fetch_history(&ticker, from, today).await {
                Ok(points) => {
                    let (series, rejected) =
                        Self::merge(&ticker, existing.as_deref(), points, &config, now, today);
                    result.rejected_samples += rejected;
                    self.swap_series(series);
                    result.refreshed.push(ticker);
                }
                Err(e) => {
                    warn!(%ticker, error = %e, "upstream fetch failed, serving last-known-good");
                    // Copy-on-write: flag the existing series (or record an
                    // empty one) without touching its samples. last_fetch is
                    // left unchanged so the next cycle retries.
                    let mut flagged = existing
                        .as_deref()
                        .cloned()
                        .unwrap_or_else(|| TickerSeries::new(&ticker));
                    flagged.fallback = true;
                    self.swap_series(flagged);
                    result.failed.push((ticker, e.to_string()));
                }
            }
        }

        // Persist once per cycle; a storage failure here is fatal.
        if !result.refreshed.is_empty() || !result.failed.is_empty() {
            self.persist()?;
        }

        info!(
            refreshed = result.refreshed.len(),
            skipped = result.skipped.len(),
            failed = result.failed.len(),
            rejected_samples = result.rejected_samples,
            "refresh cycle complete"
        );
        Ok(result)
    }

    /// Try each registered provider in fallback order.
    async fn fetch_history(
        &self,
        ticker: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PricePoint>, CoreError> {
        let providers = self.registry.providers();
        if providers.is_empty() {
            return Err(CoreError::NoProvider);
        }

        let mut last_error = None;
        for provider in providers {
            match provider.daily_history(ticker, from, to).await {
                Ok(points) => return Ok(points),
                Err(e) => {
                    debug!(%ticker, provider = provider.name(), error = %e, "provider failed, trying next");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(CoreError::NoProvider))
    }

    /// Validate incoming samples and merge them into a fresh copy of
    /// the series. Merging is idempotent: samples are keyed by date, so
    /// re-fetching the same period replaces or fills gaps, never
    /// duplicates. Returns the new series and the rejected-sample count.
    fn merge(
        ticker: &str,
        existing: Option<&TickerSeries>,
        incoming: Vec<PricePoint>,
        config: &QuoteConfig,
        now: DateTime<Utc>,
        today: NaiveDate,
    ) -> (TickerSeries, usize) {
        let mut series = existing
            .cloned()
            .unwrap_or_else(|| TickerSeries::new(ticker));

        let mut rejected = 0;
        let mut prev_date: Option<NaiveDate> = None;
        let mut prev_price: Option<f64> = None;

        for point in incoming {
            if !point.price.is_finite() || point.price <= 0.0 {
                warn!(%ticker, date = %point.date, price = point.price, "rejecting sample with non-positive price");
                rejected += 1;
                continue;
            }

            if let Some(d) = prev_date {
                if point.date <= d {
                    warn!(%ticker, date = %point.date, "rejecting out-of-order sample");
                    rejected += 1;
                    continue;
                }
            }

            // Jump bound: compare against the previous accepted sample of
            // this payload, falling back to the cached sample just before
            // this date when the payload starts mid-series.
            let reference = prev_price.or_else(|| series.price_on_or_before(point.date));
            if let Some(reference) = reference {
                if reference > 0.0 {
                    let ratio = if point.price > reference {
                        point.price / reference
                    } else {
                        reference / point.price
                    };
                    if ratio > config.max_daily_jump_ratio {
                        warn!(
                            %ticker,
                            date = %point.date,
                            price = point.price,
                            reference,
                            "rejecting sample with anomalous jump"
                        );
                        rejected += 1;
                        continue;
                    }
                }
            }

            series.upsert(point);
            prev_date = Some(point.date);
            prev_price = Some(point.price);
        }

        series.prune_before(today - Duration::days(config.retention_days));
        series.last_fetch = Some(now);
        series.fallback = false;

        (series, rejected)
    }

    // ── Read path ───────────────────────────────────────────────────

    /// Best-available view of a ticker's series. Fresh if recent,
    /// last-known-good otherwise, empty-and-stale if never fetched —
    /// never an error, regardless of network state.
    #[must_use]
    pub fn get(&self, ticker: &str) -> PriceSeries {
        let key = ticker.to_uppercase();
        match self.read_series(&key) {
            Some(series) => PriceSeries {
                ticker: key,
                points: series.points.clone(),
                freshness: self.freshness_of(&series),
                fallback: series.fallback,
            },
            None => PriceSeries::missing(key),
        }
    }

    /// Latest cached sample for a ticker, if any.
    #[must_use]
    pub fn latest_price(&self, ticker: &str) -> Option<PricePoint> {
        self.read_series(&ticker.to_uppercase())
            .and_then(|s| s.latest().copied())
    }

    /// True when the ticker's newest sample is older than the staleness
    /// threshold (or there is no data at all).
    #[must_use]
    pub fn is_stale(&self, ticker: &str) -> bool {
        match self.read_series(&ticker.to_uppercase()) {
            Some(series) => self.freshness_of(&series) == Freshness::Stale,
            None => true,
        }
    }

    fn freshness_of(&self, series: &TickerSeries) -> Freshness {
        let threshold = self.config_snapshot().staleness_threshold;
        match series.latest() {
            Some(point) => {
                let sample_time = point
                    .date
                    .and_hms_opt(0, 0, 0)
                    .map(|dt| dt.and_utc())
                    .unwrap_or_else(Utc::now);
                if Utc::now() - sample_time > threshold {
                    Freshness::Stale
                } else {
                    Freshness::Fresh
                }
            }
            None => Freshness::Stale,
        }
    }

    // ── Cache management ────────────────────────────────────────────

    /// All tickers present in the cache, sorted.
    #[must_use]
    pub fn cached_tickers(&self) -> Vec<String> {
        let store = self.store.read().unwrap_or_else(|e| e.into_inner());
        let mut tickers: Vec<String> = store.keys().cloned().collect();
        tickers.sort();
        tickers
    }

    /// Total number of cached samples across all tickers.
    #[must_use]
    pub fn total_samples(&self) -> usize {
        let store = self.store.read().unwrap_or_else(|e| e.into_inner());
        store.values().map(|s| s.points.len()).sum()
    }

    /// Remove all samples older than `cutoff` and persist.
    /// Returns the number of samples removed.
    pub fn prune_before(&self, cutoff: NaiveDate) -> Result<usize, CoreError> {
        let mut removed = 0;
        {
            let mut store = self.store.write().unwrap_or_else(|e| e.into_inner());
            let tickers: Vec<String> = store.keys().cloned().collect();
            for ticker in tickers {
                let Some(series) = store.get(&ticker).cloned() else {
                    continue;
                };
                let mut pruned = (*series).clone();
                let dropped = pruned.prune_before(cutoff);
                if dropped > 0 {
                    removed += dropped;
                    if pruned.points.is_empty() && pruned.last_fetch.is_none() {
                        store.remove(&ticker);
                    } else {
                        store.insert(ticker, Arc::new(pruned));
                    }
                }
            }
        }
        if removed > 0 {
            self.persist()?;
        }
        Ok(removed)
    }

    /// Drop everything, in memory and on disk.
    pub fn clear(&self) -> Result<(), CoreError> {
        self.store
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        self.persist()
    }

    /// Insert a series directly, bypassing the upstream fetch. Useful
    /// for offline seeding, historical imports, and tests.
    pub fn set_cached_series(
        &self,
        ticker: &str,
        mut points: Vec<PricePoint>,
        last_fetch: Option<DateTime<Utc>>,
    ) -> Result<(), CoreError> {
        points.sort_by_key(|p| p.date);
        points.dedup_by_key(|p| p.date);
        self.swap_series(TickerSeries {
            ticker: ticker.to_uppercase(),
            points,
            last_fetch,
            fallback: false,
        });
        self.persist()
    }

    // ── Internal ────────────────────────────────────────────────────

    fn read_series(&self, ticker: &str) -> Option<Arc<TickerSeries>> {
        self.store
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(ticker)
            .cloned()
    }

    /// The single short critical section on the write path.
    fn swap_series(&self, series: TickerSeries) {
        let mut store = self.store.write().unwrap_or_else(|e| e.into_inner());
        store.insert(series.ticker.clone(), Arc::new(series));
    }

    /// Write the snapshot and history documents. The state is copied
    /// out under a read lock first, so serialization and disk I/O run
    /// without blocking readers or the refresh path.
    fn persist(&self) -> Result<(), CoreError> {
        let entries: Vec<Arc<TickerSeries>> = {
            let store = self.store.read().unwrap_or_else(|e| e.into_inner());
            store.values().cloned().collect()
        };

        let mut snapshots = HashMap::with_capacity(entries.len());
        let mut history = HashMap::with_capacity(entries.len());

        for series in entries {
            if let Some(latest) = series.latest() {
                snapshots.insert(
                    series.ticker.clone(),
                    QuoteSnapshot {
                        price: latest.price,
                        date: latest.date,
                        last_fetch: series.last_fetch,
                        fallback: series.fallback,
                    },
                );
            }
            history.insert(series.ticker.clone(), series.points.clone());
        }

        self.storage.save_quote_snapshots(&snapshots)?;
        self.storage.save_price_history(&history)?;
        Ok(())
    }
}
