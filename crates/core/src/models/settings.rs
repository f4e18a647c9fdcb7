use serde::{Deserialize, Serialize};

/// User-configurable settings, stored inside the portfolio document.
///
/// The fetch TTL and the staleness threshold are deliberately two
/// independent knobs: the TTL decides when a refresh attempt is due,
/// the staleness threshold decides when cached data is flagged to the
/// consumer as old. The threshold is typically much larger so that a
/// weekend without trading does not flag every series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// The currency in which portfolio values are displayed (e.g., "USD", "SEK").
    pub display_currency: String,

    /// Interval between background refresh cycles, in seconds.
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    /// Max age of a cache entry before a refresh cycle re-queries upstream.
    #[serde(default = "default_fetch_ttl_secs")]
    pub fetch_ttl_secs: u64,

    /// Age of the newest sample beyond which a series is flagged stale.
    #[serde(default = "default_staleness_threshold_secs")]
    pub staleness_threshold_secs: u64,

    /// Days of price history kept on disk; older samples are pruned on merge.
    #[serde(default = "default_history_retention_days")]
    pub history_retention_days: u32,

    /// Days of history requested upstream when a ticker has no cache yet.
    #[serde(default = "default_history_backfill_days")]
    pub history_backfill_days: u32,

    /// Day-over-day price ratio above which a sample is rejected as anomalous.
    #[serde(default = "default_max_daily_jump_ratio")]
    pub max_daily_jump_ratio: f64,

    /// Max age of the short-interest document before a refresh is due.
    #[serde(default = "default_short_interest_ttl_secs")]
    pub short_interest_ttl_secs: u64,
}

fn default_refresh_interval_secs() -> u64 {
    300 // 5 minutes
}

fn default_fetch_ttl_secs() -> u64 {
    300
}

fn default_staleness_threshold_secs() -> u64 {
    4 * 24 * 3600 // 4 days: tolerates a weekend plus a holiday
}

fn default_history_retention_days() -> u32 {
    365
}

fn default_history_backfill_days() -> u32 {
    365
}

fn default_max_daily_jump_ratio() -> f64 {
    5.0 // a 500% day-over-day move is treated as bad data
}

fn default_short_interest_ttl_secs() -> u64 {
    6 * 3600 // disclosures are published at most a few times per day
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            display_currency: "USD".to_string(),
            refresh_interval_secs: default_refresh_interval_secs(),
            fetch_ttl_secs: default_fetch_ttl_secs(),
            staleness_threshold_secs: default_staleness_threshold_secs(),
            history_retention_days: default_history_retention_days(),
            history_backfill_days: default_history_backfill_days(),
            max_daily_jump_ratio: default_max_daily_jump_ratio(),
            short_interest_ttl_secs: default_short_interest_ttl_secs(),
        }
    }
}
