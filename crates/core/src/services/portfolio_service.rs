use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::errors::CoreError;
use crate::models::holding::{Holding, Lot};
use crate::models::portfolio::Portfolio;
use crate::models::stock::Stock;
use crate::models::transaction::{Transaction, TransactionKind};

/// Manages the watchlist and the buy/sell ledger, and derives holdings
/// and realized profit by FIFO replay.
///
/// Pure business logic — no I/O, no API calls. Easy to test.
pub struct PortfolioService;

impl PortfolioService {
    pub fn new() -> Self {
        Self
    }

    // ── Watchlist ───────────────────────────────────────────────────

    /// Add a stock to the watchlist. Tickers are unique.
    pub fn add_stock(&self, portfolio: &mut Portfolio, stock: Stock) -> Result<(), CoreError> {
        if portfolio.find_stock(&stock.ticker).is_some() {
            return Err(CoreError::ValidationError(format!(
                "Stock {} is already on the watchlist",
                stock.ticker
            )));
        }
        portfolio.stocks.push(stock);
        portfolio.stocks.sort_by(|a, b| a.ticker.cmp(&b.ticker));
        Ok(())
    }

    /// Remove a stock from the watchlist. Refused while the ledger
    /// still holds an open position in it.
    pub fn remove_stock(&self, portfolio: &mut Portfolio, ticker: &str) -> Result<Stock, CoreError> {
        let upper = ticker.to_uppercase();
        let idx = portfolio
            .stocks
            .iter()
            .position(|s| s.ticker == upper)
            .ok_or_else(|| CoreError::StockNotFound(upper.clone()))?;

        let today = Utc::now().date_naive();
        let holdings = self.holdings(portfolio, today);
        if holdings.get(&upper).is_some_and(|h| h.volume() > 0) {
            return Err(CoreError::ValidationError(format!(
                "Cannot remove {upper}: position still open — sell all shares first"
            )));
        }

        Ok(portfolio.stocks.remove(idx))
    }

    // ── Ledger mutation ─────────────────────────────────────────────

    /// Add a transaction to the ledger.
    /// Validates before inserting (e.g., can't sell more than you own).
    pub fn add_transaction(
        &self,
        portfolio: &mut Portfolio,
        transaction: Transaction,
    ) -> Result<(), CoreError> {
        self.validate_transaction(portfolio, &transaction)?;
        let id = transaction.id;
        Self::binary_insert(&mut portfolio.transactions, transaction);

        // A backdated sell can pass its own check yet strand a later
        // sell; replay the whole ledger and roll back if so.
        if let Err(e) = self.validate_ledger(portfolio) {
            portfolio.transactions.retain(|t| t.id != id);
            return Err(e);
        }
        Ok(())
    }

    /// Remove a transaction by its UUID.
    /// Revalidates the whole ledger so removal of a buy can't strand a
    /// later sell; rolls back on inconsistency.
    pub fn remove_transaction(
        &self,
        portfolio: &mut Portfolio,
        transaction_id: Uuid,
    ) -> Result<Transaction, CoreError> {
        let idx = portfolio
            .transactions
            .iter()
            .position(|t| t.id == transaction_id)
            .ok_or_else(|| CoreError::TransactionNotFound(transaction_id.to_string()))?;

        let removed = portfolio.transactions.remove(idx);

        if removed.kind == TransactionKind::Buy {
            if let Err(e) = self.validate_ledger(portfolio) {
                // Rollback: re-insert at the correct position
                Self::binary_insert(&mut portfolio.transactions, removed);
                return Err(e);
            }
        }

        Ok(removed)
    }

    /// Update an existing transaction. Validates the new ledger state
    /// before committing; rolls back on failure.
    #[allow(clippy::too_many_arguments)]
    pub fn update_transaction(
        &self,
        portfolio: &mut Portfolio,
        transaction_id: Uuid,
        kind: TransactionKind,
        ticker: &str,
        volume: u32,
        price: f64,
        fee: f64,
        date: NaiveDate,
    ) -> Result<(), CoreError> {
        let idx = portfolio
            .transactions
            .iter()
            .position(|t| t.id == transaction_id)
            .ok_or_else(|| CoreError::TransactionNotFound(transaction_id.to_string()))?;

        let old = portfolio.transactions.remove(idx);

        let updated = Transaction {
            id: old.id,
            kind,
            ticker: ticker.to_uppercase(),
            volume,
            price,
            fee,
            date,
            notes: old.notes.clone(),
        };

        if let Err(e) = self.validate_transaction(portfolio, &updated) {
            Self::binary_insert(&mut portfolio.transactions, old);
            return Err(e);
        }

        Self::binary_insert(&mut portfolio.transactions, updated);

        if let Err(e) = self.validate_ledger(portfolio) {
            // Rollback: swap back to the old transaction
            if let Some(new_idx) = portfolio.transactions.iter().position(|t| t.id == old.id) {
                portfolio.transactions.remove(new_idx);
            }
            Self::binary_insert(&mut portfolio.transactions, old);
            return Err(e);
        }

        Ok(())
    }

    /// Set or clear the notes on an existing transaction.
    pub fn set_notes(
        &self,
        portfolio: &mut Portfolio,
        transaction_id: Uuid,
        notes: Option<String>,
    ) -> Result<(), CoreError> {
        let transaction = portfolio
            .transactions
            .iter_mut()
            .find(|t| t.id == transaction_id)
            .ok_or_else(|| CoreError::TransactionNotFound(transaction_id.to_string()))?;
        transaction.notes = notes;
        Ok(())
    }

    // ── Derived state (FIFO replay) ─────────────────────────────────

    /// Open positions as of `date`: ticker → holding with its remaining
    /// FIFO lots. Positions sold down to zero are absent.
    #[must_use]
    pub fn holdings(&self, portfolio: &Portfolio, date: NaiveDate) -> HashMap<String, Holding> {
        self.replay(portfolio, date).0
    }

    /// Realized gain/loss per ticker as of `date`: sell proceeds minus
    /// matched FIFO lot cost minus the sell's fee.
    #[must_use]
    pub fn realized_profit(
        &self,
        portfolio: &Portfolio,
        date: NaiveDate,
    ) -> HashMap<String, f64> {
        self.replay(portfolio, date).1
    }

    /// Replay the ledger in date order up to and including `date`,
    /// building the FIFO lot queues and accumulating realized profit.
    fn replay(
        &self,
        portfolio: &Portfolio,
        date: NaiveDate,
    ) -> (HashMap<String, Holding>, HashMap<String, f64>) {
        let mut holdings: HashMap<String, Holding> = HashMap::new();
        let mut realized: HashMap<String, f64> = HashMap::new();

        for tx in &portfolio.transactions {
            if tx.date > date {
                continue; // ledger is date-sorted, but stay robust to ties
            }

            match tx.kind {
                TransactionKind::Buy => {
                    let currency = portfolio
                        .find_stock(&tx.ticker)
                        .map(|s| s.currency.clone())
                        .unwrap_or_else(|| "USD".to_string());
                    holdings
                        .entry(tx.ticker.clone())
                        .or_insert_with(|| Holding::new(&tx.ticker, currency))
                        .lots
                        .push(Lot {
                            id: tx.id,
                            volume: tx.volume,
                            price: tx.price,
                            date: tx.date,
                        });
                }
                TransactionKind::Sell => {
                    let Some(holding) = holdings.get_mut(&tx.ticker) else {
                        continue; // unmatched sell — ledger validation prevents this
                    };

                    let mut to_sell = tx.volume;
                    let mut matched_cost = 0.0;

                    // FIFO: consume the oldest lots first
                    while to_sell > 0 && !holding.lots.is_empty() {
                        let lot = &mut holding.lots[0];
                        let taken = lot.volume.min(to_sell);
                        matched_cost += f64::from(taken) * lot.price;
                        lot.volume -= taken;
                        to_sell -= taken;
                        if lot.volume == 0 {
                            holding.lots.remove(0);
                        }
                    }

                    let sold = tx.volume - to_sell;
                    let proceeds = f64::from(sold) * tx.price;
                    *realized.entry(tx.ticker.clone()).or_insert(0.0) +=
                        proceeds - matched_cost - tx.fee;

                    if holding.lots.is_empty() {
                        holdings.remove(&tx.ticker);
                    }
                }
            }
        }

        (holdings, realized)
    }

    /// Total brokerage fees paid up to `date`.
    #[must_use]
    pub fn total_fees(&self, portfolio: &Portfolio, date: NaiveDate) -> f64 {
        portfolio
            .transactions
            .iter()
            .filter(|t| t.date <= date)
            .map(|t| t.fee)
            .sum()
    }

    /// All transactions sorted by date (newest first for display).
    #[must_use]
    pub fn transactions<'a>(&self, portfolio: &'a Portfolio) -> Vec<&'a Transaction> {
        let mut transactions: Vec<&Transaction> = portfolio.transactions.iter().collect();
        transactions.sort_by(|a, b| b.date.cmp(&a.date)); // newest first
        transactions
    }

    // ── Validation ──────────────────────────────────────────────────

    /// Validate a transaction before adding it.
    ///
    /// Rules:
    /// - The ticker must be on the watchlist
    /// - Volume must be positive, price and fee finite and non-negative
    /// - Can't sell more than you hold at that date
    /// - Date must not be in the future (+1 day tolerance for timezones)
    fn validate_transaction(
        &self,
        portfolio: &Portfolio,
        transaction: &Transaction,
    ) -> Result<(), CoreError> {
        if portfolio.find_stock(&transaction.ticker).is_none() {
            return Err(CoreError::StockNotFound(transaction.ticker.clone()));
        }

        if transaction.volume == 0 {
            return Err(CoreError::ValidationError(
                "Transaction volume must be positive".into(),
            ));
        }

        if !transaction.price.is_finite() || transaction.price < 0.0 {
            return Err(CoreError::ValidationError(format!(
                "Invalid price {}: must be finite and non-negative",
                transaction.price
            )));
        }

        if !transaction.fee.is_finite() || transaction.fee < 0.0 {
            return Err(CoreError::ValidationError(format!(
                "Invalid fee {}: must be finite and non-negative",
                transaction.fee
            )));
        }

        let today = Utc::now().date_naive();
        if let Some(tomorrow) = today.succ_opt() {
            if transaction.date > tomorrow {
                return Err(CoreError::ValidationError(format!(
                    "Transaction date {} is in the future",
                    transaction.date
                )));
            }
        }

        if transaction.kind == TransactionKind::Sell {
            let holdings = self.holdings(portfolio, transaction.date);
            let held = holdings
                .get(&transaction.ticker)
                .map_or(0, Holding::volume);
            if held < transaction.volume {
                return Err(CoreError::ValidationError(format!(
                    "Cannot sell {} {} — only {} held on {}",
                    transaction.volume, transaction.ticker, held, transaction.date
                )));
            }
        }

        Ok(())
    }

    /// Validate that no sell in the ledger exceeds the volume held at
    /// its date. Used after removal or update of earlier transactions.
    fn validate_ledger(&self, portfolio: &Portfolio) -> Result<(), CoreError> {
        let mut held: HashMap<String, i64> = HashMap::new();

        for tx in &portfolio.transactions {
            let volume = held.entry(tx.ticker.clone()).or_insert(0);
            match tx.kind {
                TransactionKind::Buy => *volume += i64::from(tx.volume),
                TransactionKind::Sell => {
                    *volume -= i64::from(tx.volume);
                    if *volume < 0 {
                        return Err(CoreError::ValidationError(format!(
                            "Ledger would become inconsistent: sell of {} {} on {} exceeds held volume",
                            tx.volume, tx.ticker, tx.date
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Binary insert into a date-sorted Vec<Transaction> in O(log n).
    fn binary_insert(transactions: &mut Vec<Transaction>, transaction: Transaction) {
        let pos = transactions
            .binary_search_by_key(&transaction.date, |t| t.date)
            .unwrap_or_else(|pos| pos);
        transactions.insert(pos, transaction);
    }
}

impl Default for PortfolioService {
    fn default() -> Self {
        Self::new()
    }
}
