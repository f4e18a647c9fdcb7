use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::errors::CoreError;
use crate::models::portfolio::Portfolio;
use crate::models::price::{PricePoint, QuoteSnapshot};
use crate::models::short_interest::{ShortHistoryPoint, ShortInterestDocument};

/// On-disk document I/O for one data directory.
///
/// Layout (all plain JSON, human-inspectable):
/// - `portfolio.json`       — watchlist, ledger, settings
/// - `quotes.json`          — current snapshot per ticker
/// - `history.json`         — daily price series per ticker, bounded retention
/// - `short_interest.json`  — latest short-interest document
/// - `short_history.json`   — per-ticker short percent history
///
/// Every save goes through write-temp-then-rename so a crash or
/// cancelled task never leaves a half-written document behind. Storage
/// failures (disk full, permissions) are fatal `CoreError::Storage` —
/// they indicate a configuration problem, not a transient condition.
#[derive(Debug, Clone)]
pub struct StorageManager {
    data_dir: PathBuf,
}

impl StorageManager {
    /// Open (and create if needed) a data directory.
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir)?;
        Ok(Self { data_dir })
    }

    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    // ── Document paths ──────────────────────────────────────────────

    #[must_use]
    pub fn portfolio_path(&self) -> PathBuf {
        self.data_dir.join("portfolio.json")
    }

    #[must_use]
    pub fn quotes_path(&self) -> PathBuf {
        self.data_dir.join("quotes.json")
    }

    #[must_use]
    pub fn history_path(&self) -> PathBuf {
        self.data_dir.join("history.json")
    }

    #[must_use]
    pub fn short_interest_path(&self) -> PathBuf {
        self.data_dir.join("short_interest.json")
    }

    #[must_use]
    pub fn short_history_path(&self) -> PathBuf {
        self.data_dir.join("short_history.json")
    }

    // ── Portfolio ───────────────────────────────────────────────────

    pub fn save_portfolio(&self, portfolio: &Portfolio) -> Result<(), CoreError> {
        self.save_json(&self.portfolio_path(), portfolio)
    }

    pub fn load_portfolio(&self) -> Result<Option<Portfolio>, CoreError> {
        Self::load_json(&self.portfolio_path())
    }

    // ── Quote cache documents ───────────────────────────────────────

    pub fn save_quote_snapshots(
        &self,
        snapshots: &HashMap<String, QuoteSnapshot>,
    ) -> Result<(), CoreError> {
        self.save_json(&self.quotes_path(), snapshots)
    }

    pub fn load_quote_snapshots(
        &self,
    ) -> Result<Option<HashMap<String, QuoteSnapshot>>, CoreError> {
        Self::load_json(&self.quotes_path())
    }

    pub fn save_price_history(
        &self,
        history: &HashMap<String, Vec<PricePoint>>,
    ) -> Result<(), CoreError> {
        self.save_json(&self.history_path(), history)
    }

    pub fn load_price_history(
        &self,
    ) -> Result<Option<HashMap<String, Vec<PricePoint>>>, CoreError> {
        Self::load_json(&self.history_path())
    }

    // ── Short interest documents ────────────────────────────────────

    pub fn save_short_interest(&self, doc: &ShortInterestDocument) -> Result<(), CoreError> {
        self.save_json(&self.short_interest_path(), doc)
    }

    pub fn load_short_interest(&self) -> Result<Option<ShortInterestDocument>, CoreError> {
        Self::load_json(&self.short_interest_path())
    }

    pub fn save_short_history(
        &self,
        history: &HashMap<String, Vec<ShortHistoryPoint>>,
    ) -> Result<(), CoreError> {
        self.save_json(&self.short_history_path(), history)
    }

    pub fn load_short_history(
        &self,
    ) -> Result<Option<HashMap<String, Vec<ShortHistoryPoint>>>, CoreError> {
        Self::load_json(&self.short_history_path())
    }

    // ── Generic JSON I/O ────────────────────────────────────────────

    /// Atomic save: serialize → write to a temp file in the same
    /// directory → rename over the target. Rename within one directory
    /// is atomic on POSIX filesystems, so readers and crashes only ever
    /// see the old or the new complete document.
    fn save_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), CoreError> {
        let json = serde_json::to_string_pretty(value)
            .map_err(|e| CoreError::Serialization(format!("Failed to serialize document: {e}")))?;

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, json.as_bytes())?;
        fs::rename(&tmp, path)?;

        debug!(path = %path.display(), "saved document");
        Ok(())
    }

    /// Load a JSON document. A missing file is `Ok(None)` (first run);
    /// a malformed file is a `Deserialization` error the caller must see.
    fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, CoreError> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let value = serde_json::from_slice(&bytes).map_err(|e| {
            CoreError::Deserialization(format!(
                "Malformed document {}: {e}",
                path.display()
            ))
        })?;
        Ok(Some(value))
    }
}
