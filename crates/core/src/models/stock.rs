use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

/// Maximum accepted ticker length (exchange-qualified symbols like
/// "ERIC-B.ST" stay well under this).
const MAX_TICKER_LEN: usize = 16;

/// A watchlist entry: one tradable instrument the tracker follows.
///
/// Adding a stock makes the background refresh poll its ticker; holdings
/// are derived separately from the transaction ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stock {
    /// Exchange-qualified ticker symbol, uppercased (e.g., "AAPL", "VOLV-B.ST")
    pub ticker: String,

    /// Human-readable display name (e.g., "Apple Inc.", "Volvo B")
    pub name: String,

    /// Native trading currency, 3-letter code (e.g., "USD", "SEK")
    pub currency: String,
}

impl PartialEq for Stock {
    fn eq(&self, other: &Self) -> bool {
        self.ticker == other.ticker
    }
}

impl Eq for Stock {}

impl Stock {
    /// Create a validated watchlist entry. The ticker is checked
    /// syntactically at this boundary — whether the symbol actually
    /// exists upstream only surfaces on the first fetch.
    pub fn new(
        ticker: impl Into<String>,
        name: impl Into<String>,
        currency: impl Into<String>,
    ) -> Result<Self, CoreError> {
        let ticker = normalize_ticker(&ticker.into())?;
        let currency = normalize_currency(&currency.into())?;
        Ok(Self {
            ticker,
            name: name.into(),
            currency,
        })
    }
}

/// Uppercase and validate a ticker symbol: non-empty, bounded length,
/// ASCII alphanumeric plus `.`, `-`, `^` (index prefixes).
pub fn normalize_ticker(raw: &str) -> Result<String, CoreError> {
    let ticker = raw.trim().to_uppercase();
    if ticker.is_empty() || ticker.len() > MAX_TICKER_LEN {
        return Err(CoreError::InvalidTicker(raw.to_string()));
    }
    if !ticker
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^'))
    {
        return Err(CoreError::InvalidTicker(raw.to_string()));
    }
    Ok(ticker)
}

/// Uppercase and validate a 3-letter ISO-style currency code.
pub fn normalize_currency(raw: &str) -> Result<String, CoreError> {
    let code = raw.trim().to_uppercase();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(CoreError::ValidationError(format!(
            "Invalid currency code '{raw}': must be exactly 3 ASCII letters (e.g., USD, EUR, SEK)"
        )));
    }
    Ok(code)
}
