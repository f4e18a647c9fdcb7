use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One FIFO cost-basis lot: shares bought together at one price.
///
/// Lots are consumed front-first by sells; `volume` is what remains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lot {
    /// Identity of the buy transaction that opened this lot
    pub id: Uuid,

    /// Remaining shares in this lot
    pub volume: u32,

    /// Purchase price per share, native currency
    pub price: f64,

    /// Purchase date
    pub date: NaiveDate,
}

/// A derived position in one stock: the FIFO lot queue that remains
/// after replaying the ledger. Never persisted — always recomputed,
/// so the ledger stays the single source of truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    /// Ticker symbol, uppercased
    pub ticker: String,

    /// Native trading currency of the stock
    pub currency: String,

    /// Open lots, oldest first (FIFO order)
    pub lots: Vec<Lot>,
}

impl Holding {
    pub fn new(ticker: impl Into<String>, currency: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into().to_uppercase(),
            currency: currency.into(),
            lots: Vec::new(),
        }
    }

    /// Total shares held across all open lots.
    #[must_use]
    pub fn volume(&self) -> u32 {
        self.lots.iter().map(|l| l.volume).sum()
    }

    /// Total cost of the open lots (Σ volume × purchase price).
    /// Brokerage fees are tracked separately in the analytics summary.
    #[must_use]
    pub fn cost_basis(&self) -> f64 {
        self.lots
            .iter()
            .map(|l| f64::from(l.volume) * l.price)
            .sum()
    }

    /// Volume-weighted average purchase price of the open lots.
    #[must_use]
    pub fn average_price(&self) -> f64 {
        let volume = self.volume();
        if volume == 0 {
            0.0
        } else {
            self.cost_basis() / f64::from(volume)
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lots.is_empty()
    }
}
