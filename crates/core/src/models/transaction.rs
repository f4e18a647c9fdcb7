use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Type of ledger transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionKind {
    /// Buying shares — opens a new FIFO cost-basis lot
    Buy,
    /// Selling shares — consumes the oldest lots first
    Sell,
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionKind::Buy => write!(f, "Buy"),
            TransactionKind::Sell => write!(f, "Sell"),
        }
    }
}

/// Sort order for transaction listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionSortOrder {
    /// Newest date first (default for display)
    DateDesc,
    /// Oldest date first
    DateAsc,
    /// Largest gross value (volume × price) first
    ValueDesc,
    /// Smallest gross value first
    ValueAsc,
    /// Alphabetical by ticker
    TickerAsc,
    /// Reverse alphabetical by ticker
    TickerDesc,
}

/// A single buy/sell entry in the ledger.
///
/// The ledger is the source of truth: holdings, FIFO lots, and realized
/// profit are all derived by replaying it in date order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique identifier
    pub id: Uuid,

    /// Buy or Sell
    pub kind: TransactionKind,

    /// Ticker of the traded stock, uppercased
    pub ticker: String,

    /// Number of shares (whole shares, always positive)
    pub volume: u32,

    /// Price per share in the stock's native currency
    pub price: f64,

    /// Brokerage fee for this transaction, in the native currency
    #[serde(default)]
    pub fee: f64,

    /// Trade date (no time component — daily granularity)
    pub date: NaiveDate,

    /// Optional free-text notes (e.g., broker, order reference)
    #[serde(default)]
    pub notes: Option<String>,
}

impl Transaction {
    pub fn new(
        kind: TransactionKind,
        ticker: impl Into<String>,
        volume: u32,
        price: f64,
        fee: f64,
        date: NaiveDate,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            ticker: ticker.into().to_uppercase(),
            volume,
            price,
            fee,
            date,
            notes: None,
        }
    }

    /// Create a transaction with notes attached.
    pub fn with_notes(
        kind: TransactionKind,
        ticker: impl Into<String>,
        volume: u32,
        price: f64,
        fee: f64,
        date: NaiveDate,
        notes: impl Into<String>,
    ) -> Self {
        let mut tx = Self::new(kind, ticker, volume, price, fee, date);
        tx.notes = Some(notes.into());
        tx
    }

    /// Gross value of the trade (volume × price), fee excluded.
    #[must_use]
    pub fn gross_value(&self) -> f64 {
        f64::from(self.volume) * self.price
    }
}
