pub mod errors;
pub mod models;
pub mod providers;
pub mod services;
pub mod storage;

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::Duration as StdDuration;

use chrono::{NaiveDate, Utc};

use errors::CoreError;
use models::{
    analytics::{PortfolioSummary, ValuationPoint},
    holding::Holding,
    portfolio::Portfolio,
    price::{PricePoint, PriceSeries, RefreshResult},
    settings::Settings,
    short_interest::{ShortHistoryPoint, ShortPosition},
    stock::{normalize_currency, Stock},
    transaction::{Transaction, TransactionKind, TransactionSortOrder},
};
use providers::registry::ProviderRegistry;
use providers::traits::RateProvider;
use services::{
    analytics_service::AnalyticsService,
    currency_service::CurrencyService,
    portfolio_service::PortfolioService,
    quote_service::{QuoteConfig, QuoteService},
    refresh_worker::{RefreshWorker, RefreshWorkerHandle, SharedWatchlist},
    short_interest_service::{ShortInterestService, ShortRefreshOutcome, SnapshotTransport},
    valuation_service::ValuationService,
};
use storage::manager::StorageManager;

/// Main entry point for the Stock Tracker core library.
///
/// The explicit context object: it owns the portfolio, the services,
/// and the quote cache — no module-level globals anywhere. Front ends
/// (terminal UI, chat bots) construct one of these and use its read
/// APIs; only the refresh paths inside ever write to the quote cache.
#[must_use]
pub struct StockTracker {
    portfolio: Portfolio,
    storage: StorageManager,
    portfolio_service: PortfolioService,
    currency_service: CurrencyService,
    analytics_service: AnalyticsService,
    valuation_service: ValuationService,
    quote_service: Arc<QuoteService>,
    watchlist: SharedWatchlist,
    short_interest: Option<ShortInterestService>,
    /// Tracks whether any mutation has occurred since the last save/load.
    dirty: bool,
}

impl std::fmt::Debug for StockTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StockTracker")
            .field("stocks", &self.portfolio.stocks.len())
            .field("transactions", &self.portfolio.transactions.len())
            .field("settings", &self.portfolio.settings)
            .field("cached_samples", &self.quote_service.total_samples())
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl StockTracker {
    /// Open a tracker on a data directory: loads the portfolio document
    /// if one exists (otherwise starts empty) and hydrates the quote
    /// cache. Uses the default Yahoo Finance + Frankfurter providers.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self, CoreError> {
        Self::open_with(
            data_dir,
            ProviderRegistry::new_with_defaults(),
            None,
        )
    }

    /// Open with a custom quote provider registry and (optionally) a
    /// custom exchange-rate source. This is the seam tests and offline
    /// deployments use.
    pub fn open_with(
        data_dir: impl AsRef<Path>,
        registry: ProviderRegistry,
        rate_provider: Option<Box<dyn RateProvider>>,
    ) -> Result<Self, CoreError> {
        let storage = StorageManager::new(data_dir.as_ref())?;
        let portfolio = storage.load_portfolio()?.unwrap_or_default();

        let quote_service = Arc::new(QuoteService::new(
            registry,
            QuoteConfig::from(&portfolio.settings),
            storage.clone(),
        )?);

        let watchlist: SharedWatchlist = Arc::new(RwLock::new(portfolio.tickers()));

        let currency_service = match rate_provider {
            Some(provider) => CurrencyService::with_provider(provider),
            None => CurrencyService::new(),
        };

        Ok(Self {
            portfolio,
            storage,
            portfolio_service: PortfolioService::new(),
            currency_service,
            analytics_service: AnalyticsService::new(),
            valuation_service: ValuationService::new(),
            quote_service,
            watchlist,
            short_interest: None,
            dirty: false,
        })
    }

    /// Persist the portfolio document. The quote cache persists itself
    /// on every refresh cycle, so this only writes `portfolio.json`.
    /// Clears the unsaved-changes flag on success.
    pub fn save(&mut self) -> Result<(), CoreError> {
        self.storage.save_portfolio(&self.portfolio)?;
        self.dirty = false;
        Ok(())
    }

    /// Returns `true` if the portfolio has been modified since the last save or load.
    #[must_use]
    pub fn has_unsaved_changes(&self) -> bool {
        self.dirty
    }

    /// The data directory this tracker operates on.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        self.storage.data_dir()
    }

    // ── Watchlist ───────────────────────────────────────────────────

    /// Add a stock to the watchlist. The background worker starts
    /// polling it on the next cycle.
    pub fn add_stock(
        &mut self,
        ticker: &str,
        name: &str,
        currency: &str,
    ) -> Result<(), CoreError> {
        let stock = Stock::new(ticker, name, currency)?;
        let ticker = stock.ticker.clone();
        self.portfolio_service.add_stock(&mut self.portfolio, stock)?;
        self.watchlist
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(ticker);
        self.dirty = true;
        Ok(())
    }

    /// Remove a stock from the watchlist. Fails while a position is
    /// still open in it.
    pub fn remove_stock(&mut self, ticker: &str) -> Result<Stock, CoreError> {
        let removed = self.portfolio_service.remove_stock(&mut self.portfolio, ticker)?;
        self.watchlist
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&removed.ticker);
        self.dirty = true;
        Ok(removed)
    }

    /// All watched stocks, sorted by ticker.
    #[must_use]
    pub fn stocks(&self) -> &[Stock] {
        &self.portfolio.stocks
    }

    /// Look up a watchlist entry by ticker (case-insensitive).
    #[must_use]
    pub fn find_stock(&self, ticker: &str) -> Option<&Stock> {
        self.portfolio.find_stock(ticker)
    }

    // ── Trading ─────────────────────────────────────────────────────

    /// Record a buy: opens a new FIFO lot for the ticker.
    pub fn buy(
        &mut self,
        ticker: &str,
        volume: u32,
        price: f64,
        fee: f64,
        date: NaiveDate,
    ) -> Result<uuid::Uuid, CoreError> {
        let tx = Transaction::new(TransactionKind::Buy, ticker, volume, price, fee, date);
        let id = tx.id;
        self.portfolio_service.add_transaction(&mut self.portfolio, tx)?;
        self.dirty = true;
        Ok(id)
    }

    /// Record a sell: consumes the oldest lots first. Fails if the
    /// volume exceeds what is held on that date.
    pub fn sell(
        &mut self,
        ticker: &str,
        volume: u32,
        price: f64,
        fee: f64,
        date: NaiveDate,
    ) -> Result<uuid::Uuid, CoreError> {
        let tx = Transaction::new(TransactionKind::Sell, ticker, volume, price, fee, date);
        let id = tx.id;
        self.portfolio_service.add_transaction(&mut self.portfolio, tx)?;
        self.dirty = true;
        Ok(id)
    }

    /// Record a transaction with notes attached.
    #[allow(clippy::too_many_arguments)]
    pub fn add_transaction_with_notes(
        &mut self,
        kind: TransactionKind,
        ticker: &str,
        volume: u32,
        price: f64,
        fee: f64,
        date: NaiveDate,
        notes: impl Into<String>,
    ) -> Result<uuid::Uuid, CoreError> {
        let tx = Transaction::with_notes(kind, ticker, volume, price, fee, date, notes);
        let id = tx.id;
        self.portfolio_service.add_transaction(&mut self.portfolio, tx)?;
        self.dirty = true;
        Ok(id)
    }

    /// Remove a transaction by its ID.
    /// Validates that removal doesn't strand a later sell.
    pub fn remove_transaction(&mut self, transaction_id: uuid::Uuid) -> Result<(), CoreError> {
        self.portfolio_service
            .remove_transaction(&mut self.portfolio, transaction_id)?;
        self.dirty = true;
        Ok(())
    }

    /// Update an existing transaction by its ID.
    /// Validates the updated ledger before committing.
    #[allow(clippy::too_many_arguments)]
    pub fn update_transaction(
        &mut self,
        transaction_id: uuid::Uuid,
        kind: TransactionKind,
        ticker: &str,
        volume: u32,
        price: f64,
        fee: f64,
        date: NaiveDate,
    ) -> Result<(), CoreError> {
        self.portfolio_service.update_transaction(
            &mut self.portfolio,
            transaction_id,
            kind,
            ticker,
            volume,
            price,
            fee,
            date,
        )?;
        self.dirty = true;
        Ok(())
    }

    /// Set or clear notes on an existing transaction.
    pub fn set_transaction_notes(
        &mut self,
        transaction_id: uuid::Uuid,
        notes: Option<String>,
    ) -> Result<(), CoreError> {
        self.portfolio_service
            .set_notes(&mut self.portfolio, transaction_id, notes)?;
        self.dirty = true;
        Ok(())
    }

    // ── Transaction queries ─────────────────────────────────────────

    /// Get a single transaction by its ID.
    #[must_use]
    pub fn get_transaction(&self, transaction_id: uuid::Uuid) -> Option<&Transaction> {
        self.portfolio
            .transactions
            .iter()
            .find(|t| t.id == transaction_id)
    }

    /// All transactions, newest first.
    #[must_use]
    pub fn transactions(&self) -> Vec<&Transaction> {
        self.portfolio_service.transactions(&self.portfolio)
    }

    /// Transactions for one ticker, newest first.
    #[must_use]
    pub fn transactions_for(&self, ticker: &str) -> Vec<&Transaction> {
        let upper = ticker.to_uppercase();
        let mut transactions: Vec<&Transaction> = self
            .portfolio
            .transactions
            .iter()
            .filter(|t| t.ticker == upper)
            .collect();
        transactions.reverse(); // internal storage is oldest-first
        transactions
    }

    /// Transactions within a date range (inclusive), newest first.
    #[must_use]
    pub fn transactions_in_range(&self, from: NaiveDate, to: NaiveDate) -> Vec<&Transaction> {
        let mut transactions: Vec<&Transaction> = self
            .portfolio
            .transactions
            .iter()
            .filter(|t| t.date >= from && t.date <= to)
            .collect();
        transactions.reverse();
        transactions
    }

    /// Search transactions by matching query against ticker and notes
    /// (case-insensitive).
    #[must_use]
    pub fn search_transactions(&self, query: &str) -> Vec<&Transaction> {
        let q = query.to_lowercase();
        self.portfolio
            .transactions
            .iter()
            .filter(|t| {
                t.ticker.to_lowercase().contains(&q)
                    || t.notes.as_deref().unwrap_or("").to_lowercase().contains(&q)
            })
            .collect()
    }

    /// Transactions sorted by a specific order.
    #[must_use]
    pub fn transactions_sorted(&self, order: &TransactionSortOrder) -> Vec<&Transaction> {
        let mut transactions: Vec<&Transaction> = self.portfolio.transactions.iter().collect();
        match order {
            TransactionSortOrder::DateDesc => transactions.sort_by(|a, b| b.date.cmp(&a.date)),
            TransactionSortOrder::DateAsc => transactions.sort_by(|a, b| a.date.cmp(&b.date)),
            TransactionSortOrder::ValueDesc => transactions.sort_by(|a, b| {
                b.gross_value()
                    .partial_cmp(&a.gross_value())
                    .unwrap_or(std::cmp::Ordering::Equal)
            }),
            TransactionSortOrder::ValueAsc => transactions.sort_by(|a, b| {
                a.gross_value()
                    .partial_cmp(&b.gross_value())
                    .unwrap_or(std::cmp::Ordering::Equal)
            }),
            TransactionSortOrder::TickerAsc => {
                transactions.sort_by(|a, b| a.ticker.cmp(&b.ticker));
            }
            TransactionSortOrder::TickerDesc => {
                transactions.sort_by(|a, b| b.ticker.cmp(&a.ticker));
            }
        }
        transactions
    }

    /// Total number of transactions without materializing a sorted vector.
    #[must_use]
    pub fn transaction_count(&self) -> usize {
        self.portfolio.transactions.len()
    }

    /// Date of the earliest transaction in the ledger.
    #[must_use]
    pub fn earliest_transaction_date(&self) -> Option<NaiveDate> {
        self.portfolio.transactions.first().map(|t| t.date)
    }

    // ── Holdings ────────────────────────────────────────────────────

    /// Open positions as of a given date, with their FIFO lots.
    #[must_use]
    pub fn holdings(&self, date: NaiveDate) -> HashMap<String, Holding> {
        self.portfolio_service.holdings(&self.portfolio, date)
    }

    /// Open positions as of today.
    #[must_use]
    pub fn current_holdings(&self) -> HashMap<String, Holding> {
        self.holdings(Utc::now().date_naive())
    }

    /// Realized gain/loss per ticker as of a given date (native currency).
    #[must_use]
    pub fn realized_profit(&self, date: NaiveDate) -> HashMap<String, f64> {
        self.portfolio_service.realized_profit(&self.portfolio, date)
    }

    // ── Quotes ──────────────────────────────────────────────────────

    /// Best-available price series for a ticker. Never fails: missing
    /// data yields an empty series with the stale flag set.
    #[must_use]
    pub fn get_series(&self, ticker: &str) -> PriceSeries {
        self.quote_service.get(ticker)
    }

    /// Latest cached price for a ticker, if any.
    #[must_use]
    pub fn latest_price(&self, ticker: &str) -> Option<PricePoint> {
        self.quote_service.latest_price(ticker)
    }

    /// Manually refresh all watched tickers now, honoring the fetch TTL.
    pub async fn refresh_quotes(&self) -> Result<RefreshResult, CoreError> {
        let tickers = self.portfolio.tickers();
        self.quote_service.refresh(&tickers).await
    }

    /// Spawn the background refresh worker on the configured interval.
    /// Must be called from within a tokio runtime.
    pub fn spawn_refresh_worker(&self) -> RefreshWorkerHandle {
        RefreshWorker::spawn(
            self.quote_service.clone(),
            self.watchlist.clone(),
            StdDuration::from_secs(self.portfolio.settings.refresh_interval_secs),
        )
    }

    /// Shared handle to the quote service, for consumers that outlive
    /// the tracker borrow (UI threads, workers). Display paths should
    /// stick to `get`-style reads; cache writes belong to the refresh
    /// paths and to explicit offline imports.
    #[must_use]
    pub fn quote_service(&self) -> Arc<QuoteService> {
        self.quote_service.clone()
    }

    // ── Analytics ───────────────────────────────────────────────────

    /// Full portfolio summary at a given date, in the display currency.
    pub async fn portfolio_summary(
        &self,
        date: NaiveDate,
    ) -> Result<PortfolioSummary, CoreError> {
        self.analytics_service
            .portfolio_summary(
                &self.portfolio,
                &self.quote_service,
                &self.currency_service,
                date,
            )
            .await
    }

    /// Total portfolio market value at a given date, display currency.
    pub async fn portfolio_value(&self, date: NaiveDate) -> Result<f64, CoreError> {
        Ok(self.portfolio_summary(date).await?.total_market_value)
    }

    /// Daily portfolio value over a date range, from cached data.
    pub async fn portfolio_value_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ValuationPoint>, CoreError> {
        self.valuation_service
            .portfolio_value_range(
                &self.portfolio,
                &self.quote_service,
                &self.currency_service,
                from,
                to,
            )
            .await
    }

    // ── Short interest ──────────────────────────────────────────────

    /// Wire up the short-interest feed with a transport. Hydrates any
    /// previously cached document from disk.
    pub fn enable_short_interest(
        &mut self,
        transport: Box<dyn SnapshotTransport>,
    ) -> Result<(), CoreError> {
        let service = ShortInterestService::new(
            transport,
            self.storage.clone(),
            self.portfolio.settings.history_retention_days,
        )?;
        self.short_interest = Some(service);
        Ok(())
    }

    /// Refresh the short-interest document, honoring its TTL.
    /// No-op returning `None` when the feed is not enabled.
    pub async fn refresh_short_interest(
        &self,
    ) -> Result<Option<ShortRefreshOutcome>, CoreError> {
        let Some(service) = &self.short_interest else {
            return Ok(None);
        };
        let ttl = chrono::Duration::seconds(
            self.portfolio.settings.short_interest_ttl_secs as i64,
        );
        Ok(Some(service.refresh(ttl).await?))
    }

    /// Current short position for a ticker, if the feed is enabled and
    /// the ticker is disclosed.
    #[must_use]
    pub fn short_position(&self, ticker: &str) -> Option<ShortPosition> {
        self.short_interest.as_ref()?.position(ticker)
    }

    /// Short-percent history for a ticker over the trailing `days`.
    #[must_use]
    pub fn short_history(&self, ticker: &str, days: u32) -> Vec<ShortHistoryPoint> {
        self.short_interest
            .as_ref()
            .map(|s| s.history(ticker, days))
            .unwrap_or_default()
    }

    /// Access to the short-interest service, if enabled.
    #[must_use]
    pub fn short_interest(&self) -> Option<&ShortInterestService> {
        self.short_interest.as_ref()
    }

    // ── Settings ────────────────────────────────────────────────────

    /// Current settings.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.portfolio.settings
    }

    /// Set the display currency (e.g., "USD", "SEK", "EUR").
    /// Currency code must be a 3-letter alphabetic string.
    pub fn set_display_currency(&mut self, currency: &str) -> Result<(), CoreError> {
        self.portfolio.settings.display_currency = normalize_currency(currency)?;
        self.dirty = true;
        Ok(())
    }

    /// Set the background refresh interval (takes effect for workers
    /// spawned after this call).
    pub fn set_refresh_interval_secs(&mut self, secs: u64) {
        self.portfolio.settings.refresh_interval_secs = secs;
        self.dirty = true;
    }

    /// Set the fetch TTL: how old a cache entry may be before a refresh
    /// cycle re-queries upstream.
    pub fn set_fetch_ttl_secs(&mut self, secs: u64) {
        self.portfolio.settings.fetch_ttl_secs = secs;
        self.quote_service
            .update_config(QuoteConfig::from(&self.portfolio.settings));
        self.dirty = true;
    }

    /// Set the staleness threshold: how old the newest sample may be
    /// before the series is flagged stale to consumers. Independent of
    /// the fetch TTL.
    pub fn set_staleness_threshold_secs(&mut self, secs: u64) {
        self.portfolio.settings.staleness_threshold_secs = secs;
        self.quote_service
            .update_config(QuoteConfig::from(&self.portfolio.settings));
        self.dirty = true;
    }

    /// Set how many days of price history are retained on disk.
    pub fn set_history_retention_days(&mut self, days: u32) {
        self.portfolio.settings.history_retention_days = days;
        self.quote_service
            .update_config(QuoteConfig::from(&self.portfolio.settings));
        self.dirty = true;
    }

    // ── Trash (undo) ────────────────────────────────────────────────

    /// Remove a transaction and keep it in the trash for potential undo.
    /// Returns the removed transaction.
    pub fn remove_transaction_to_trash(
        &mut self,
        transaction_id: uuid::Uuid,
    ) -> Result<Transaction, CoreError> {
        let removed = self
            .portfolio_service
            .remove_transaction(&mut self.portfolio, transaction_id)?;
        self.portfolio.trash.push(removed.clone());
        self.dirty = true;
        Ok(removed)
    }

    /// Restore the most recently trashed transaction back into the ledger.
    /// Returns the restored transaction, or `None` if the trash is empty.
    pub fn undo_last_removal(&mut self) -> Result<Option<Transaction>, CoreError> {
        let Some(transaction) = self.portfolio.trash.pop() else {
            return Ok(None);
        };

        if let Err(e) = self
            .portfolio_service
            .add_transaction(&mut self.portfolio, transaction.clone())
        {
            // Put it back so the undo isn't silently lost
            self.portfolio.trash.push(transaction);
            return Err(e);
        }
        self.dirty = true;
        Ok(Some(transaction))
    }

    /// Transactions currently in the trash.
    #[must_use]
    pub fn trash(&self) -> &[Transaction] {
        &self.portfolio.trash
    }

    /// Clear all trashed transactions permanently.
    pub fn clear_trash(&mut self) {
        if !self.portfolio.trash.is_empty() {
            self.portfolio.trash.clear();
            self.dirty = true;
        }
    }

    // ── Export / Import ─────────────────────────────────────────────

    /// Export all transactions as a JSON string.
    pub fn export_transactions_to_json(&self) -> Result<String, CoreError> {
        serde_json::to_string_pretty(&self.portfolio.transactions).map_err(|e| {
            CoreError::Serialization(format!("Failed to serialize transactions: {e}"))
        })
    }

    /// Export all transactions as a CSV string.
    /// Columns: id, kind, ticker, volume, price, fee, date, notes
    #[must_use]
    pub fn export_transactions_to_csv(&self) -> String {
        let mut csv = String::from("id,kind,ticker,volume,price,fee,date,notes\n");
        for tx in &self.portfolio.transactions {
            let notes = tx.notes.as_deref().unwrap_or("");
            // Escape CSV: quote fields containing commas, quotes, or newlines
            let escaped_notes =
                if notes.contains(',') || notes.contains('"') || notes.contains('\n') {
                    format!("\"{}\"", notes.replace('"', "\"\""))
                } else {
                    notes.to_string()
                };
            csv.push_str(&format!(
                "{},{},{},{},{},{},{},{}\n",
                tx.id, tx.kind, tx.ticker, tx.volume, tx.price, tx.fee, tx.date, escaped_notes,
            ));
        }
        csv
    }

    /// Import transactions from a JSON string. Each is validated in
    /// order against a temporary copy of the ledger; if any fails, none
    /// are imported (all-or-nothing). Returns the number imported.
    pub fn import_transactions_from_json(&mut self, json: &str) -> Result<usize, CoreError> {
        let transactions: Vec<Transaction> = serde_json::from_str(json)?;
        let count = transactions.len();

        let mut staged = self.portfolio.clone();
        for tx in transactions {
            self.portfolio_service.add_transaction(&mut staged, tx)?;
        }

        self.portfolio = staged;
        self.dirty = true;
        Ok(count)
    }

    // ── Cache management ────────────────────────────────────────────

    /// Total number of cached price samples across all tickers.
    #[must_use]
    pub fn cache_total_samples(&self) -> usize {
        self.quote_service.total_samples()
    }

    /// Number of tickers present in the quote cache.
    #[must_use]
    pub fn cache_ticker_count(&self) -> usize {
        self.quote_service.cached_tickers().len()
    }

    /// Remove all cached samples older than `before`.
    /// Returns the number of samples removed.
    pub fn cache_prune_before(&self, before: NaiveDate) -> Result<usize, CoreError> {
        self.quote_service.prune_before(before)
    }

    /// Clear all cached price data, in memory and on disk.
    pub fn cache_clear(&self) -> Result<(), CoreError> {
        self.quote_service.clear()
    }
}
