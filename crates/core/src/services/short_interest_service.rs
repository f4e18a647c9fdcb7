use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::errors::CoreError;
use crate::models::short_interest::{
    PositionHolder, ShortHistoryPoint, ShortInterestDocument, ShortPosition,
};
use crate::storage::manager::StorageManager;

/// Transport abstraction for fetching the short-interest document.
///
/// The document is produced by a server-side scheduled job; the client
/// only decides where to read it from. Local filesystem and HTTP cover
/// the supported deployments — swapping transports never touches the
/// cache logic.
#[async_trait]
pub trait SnapshotTransport: Send + Sync {
    /// Human-readable name of this transport (for logs/errors).
    fn name(&self) -> &str;

    /// Fetch the raw document bytes from wherever they live.
    async fn fetch(&self) -> Result<Vec<u8>, CoreError>;
}

/// Reads the document from a local path (e.g., a mounted share).
pub struct FileTransport {
    path: PathBuf,
}

impl FileTransport {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SnapshotTransport for FileTransport {
    fn name(&self) -> &str {
        "file"
    }

    async fn fetch(&self) -> Result<Vec<u8>, CoreError> {
        tokio::fs::read(&self.path).await.map_err(|e| {
            CoreError::Network(format!(
                "Failed to read {}: {e}",
                self.path.display()
            ))
        })
    }
}

/// Fetches the document over HTTP(S).
pub struct HttpTransport {
    url: String,
    client: Client,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: Client::builder()
                .timeout(StdDuration::from_secs(30))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }
}

#[async_trait]
impl SnapshotTransport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch(&self) -> Result<Vec<u8>, CoreError> {
        let resp = self.client.get(&self.url).send().await?;
        let resp = resp.error_for_status()?;
        Ok(resp.bytes().await?.to_vec())
    }
}

// ── Boundary types ──────────────────────────────────────────────────
// The producer's schema is not guaranteed stable: every field is
// optional here, and malformed positions are dropped with a warning
// instead of failing the whole document.

#[derive(Deserialize)]
struct RawDocument {
    #[serde(default)]
    last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    positions: Option<Vec<RawPosition>>,
}

#[derive(Deserialize)]
struct RawPosition {
    #[serde(default)]
    ticker: Option<String>,
    #[serde(default)]
    percent_of_shares: Option<f64>,
    #[serde(default)]
    holders: Option<Vec<RawHolder>>,
    #[serde(default)]
    date: Option<NaiveDate>,
}

#[derive(Deserialize)]
struct RawHolder {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    percent: Option<f64>,
}

/// Outcome of one short-interest refresh attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortRefreshOutcome {
    /// A new document was fetched and merged
    Fetched,
    /// The cached document was still within the TTL
    SkippedFresh,
    /// The transport failed; last-known-good data is being served
    Failed,
}

struct ShortInterestState {
    document: ShortInterestDocument,
    history: HashMap<String, Vec<ShortHistoryPoint>>,
    last_fetch: Option<DateTime<Utc>>,
    fallback: bool,
}

/// TTL-cached client for the short-interest feed.
///
/// Same contract as the quote cache: `refresh` is the only writer and
/// respects a TTL, `get`-style readers never fail, a transport error
/// degrades to last-known-good data with the fallback flag set, and
/// history is retained for a bounded window (365 days for this
/// regulatory feed).
pub struct ShortInterestService {
    transport: Box<dyn SnapshotTransport>,
    storage: StorageManager,
    state: RwLock<ShortInterestState>,
    retention: Duration,
}

impl ShortInterestService {
    /// Build the client and hydrate cached state from disk.
    pub fn new(
        transport: Box<dyn SnapshotTransport>,
        storage: StorageManager,
        retention_days: u32,
    ) -> Result<Self, CoreError> {
        let document = storage.load_short_interest()?.unwrap_or_default();
        let history = storage.load_short_history()?.unwrap_or_default();

        Ok(Self {
            transport,
            storage,
            state: RwLock::new(ShortInterestState {
                last_fetch: document.last_updated,
                document,
                history,
                fallback: false,
            }),
            retention: Duration::days(i64::from(retention_days)),
        })
    }

    // ── Refresh (write path) ────────────────────────────────────────

    /// Fetch and merge the document unless the cached one is younger
    /// than `ttl`. Transport failures keep the cached document and set
    /// the fallback flag; only storage failures are returned as errors.
    pub async fn refresh(&self, ttl: Duration) -> Result<ShortRefreshOutcome, CoreError> {
        let now = Utc::now();

        {
            let state = self.state.read().unwrap_or_else(|e| e.into_inner());
            if let Some(fetched_at) = state.last_fetch {
                if now - fetched_at < ttl {
                    debug!("short-interest document within TTL, skipping fetch");
                    return Ok(ShortRefreshOutcome::SkippedFresh);
                }
            }
        }

        let bytes = match self.transport.fetch().await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(transport = self.transport.name(), error = %e, "short-interest fetch failed, serving last-known-good");
                let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
                state.fallback = true;
                return Ok(ShortRefreshOutcome::Failed);
            }
        };

        let raw: RawDocument = match serde_json::from_slice(&bytes) {
            Ok(raw) => raw,
            Err(e) => {
                // A malformed document is an upstream problem, not ours:
                // same degradation as a transport failure.
                warn!(error = %e, "short-interest document malformed, serving last-known-good");
                let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
                state.fallback = true;
                return Ok(ShortRefreshOutcome::Failed);
            }
        };

        let document = Self::validate(raw, now.date_naive());
        let position_count = document.positions.len();

        {
            let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
            Self::merge_history(&mut state.history, &document);
            Self::prune_history(&mut state.history, now.date_naive() - self.retention);
            state.document = document;
            state.last_fetch = Some(now);
            state.fallback = false;
        }

        self.persist()?;
        info!(positions = position_count, "short-interest document refreshed");
        Ok(ShortRefreshOutcome::Fetched)
    }

    /// Drop raw positions that lack a ticker or a usable percentage;
    /// clamp obviously-wrong disclosure dates to nothing.
    fn validate(raw: RawDocument, today: NaiveDate) -> ShortInterestDocument {
        let positions = raw
            .positions
            .unwrap_or_default()
            .into_iter()
            .filter_map(|p| {
                let ticker = p.ticker?.trim().to_uppercase();
                let percent = p.percent_of_shares?;
                if ticker.is_empty() || !percent.is_finite() || !(0.0..=100.0).contains(&percent) {
                    warn!(%ticker, percent, "dropping malformed short position");
                    return None;
                }
                let holders = p
                    .holders
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|h| {
                        let name = h.name?;
                        let percent = h.percent?;
                        percent.is_finite().then_some(PositionHolder { name, percent })
                    })
                    .collect();
                Some(ShortPosition {
                    ticker,
                    percent_of_shares: percent,
                    holders,
                    date: p.date.unwrap_or(today),
                })
            })
            .collect();

        ShortInterestDocument {
            last_updated: raw.last_updated,
            positions,
        }
    }

    /// Append each position to its ticker's history, idempotent by
    /// (ticker, date): re-fetching the same document replaces, never
    /// duplicates.
    fn merge_history(
        history: &mut HashMap<String, Vec<ShortHistoryPoint>>,
        document: &ShortInterestDocument,
    ) {
        for position in &document.positions {
            let entries = history.entry(position.ticker.clone()).or_default();
            let point = ShortHistoryPoint {
                date: position.date,
                percent: position.percent_of_shares,
            };
            match entries.binary_search_by_key(&point.date, |p| p.date) {
                Ok(idx) => entries[idx] = point,
                Err(idx) => entries.insert(idx, point),
            }
        }
    }

    fn prune_history(history: &mut HashMap<String, Vec<ShortHistoryPoint>>, cutoff: NaiveDate) {
        for entries in history.values_mut() {
            let split = entries
                .binary_search_by_key(&cutoff, |p| p.date)
                .unwrap_or_else(|pos| pos);
            entries.drain(..split);
        }
        history.retain(|_, v| !v.is_empty());
    }

    // ── Read path ───────────────────────────────────────────────────

    /// Current short position for a ticker, if disclosed.
    #[must_use]
    pub fn position(&self, ticker: &str) -> Option<ShortPosition> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state.document.position(ticker).cloned()
    }

    /// All current positions, sorted by percent (largest first).
    #[must_use]
    pub fn positions(&self) -> Vec<ShortPosition> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        let mut positions = state.document.positions.clone();
        positions.sort_by(|a, b| {
            b.percent_of_shares
                .partial_cmp(&a.percent_of_shares)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        positions
    }

    /// Retained history for a ticker over the trailing `days` window.
    #[must_use]
    pub fn history(&self, ticker: &str, days: u32) -> Vec<ShortHistoryPoint> {
        let cutoff = Utc::now().date_naive() - Duration::days(i64::from(days));
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state
            .history
            .get(&ticker.to_uppercase())
            .map(|entries| {
                let split = entries
                    .binary_search_by_key(&cutoff, |p| p.date)
                    .unwrap_or_else(|pos| pos);
                entries[split..].to_vec()
            })
            .unwrap_or_default()
    }

    /// When the producer last generated the cached document.
    #[must_use]
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state.document.last_updated
    }

    /// True while the most recent fetch attempt failed.
    #[must_use]
    pub fn fallback_active(&self) -> bool {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state.fallback
    }

    // ── Internal ────────────────────────────────────────────────────

    fn persist(&self) -> Result<(), CoreError> {
        let (document, history) = {
            let state = self.state.read().unwrap_or_else(|e| e.into_inner());
            (state.document.clone(), state.history.clone())
        };
        self.storage.save_short_interest(&document)?;
        self.storage.save_short_history(&history)?;
        Ok(())
    }
}
