//! Historical backfill orchestration.
//!
//! One run backfills a single record kind across all configured accounts
//! and the full active symbol universe, resuming each `(symbol, account)`
//! pair from the store's high-water mark.

use std::time::Duration;

use thiserror::Error;

use crate::exchange::ExchangeError;
use crate::storage::StorageError;

pub mod runner;

pub use runner::{AccountContext, BackfillRunner};

/// Fatal run errors. Per-symbol failures are absorbed by the runner and
/// surface only in the [`RunSummary`].
#[derive(Error, Debug)]
pub enum BackfillError {
    #[error("Symbol discovery failed: {0}")]
    Discovery(#[source] ExchangeError),

    #[error("Store not ready after {attempts} attempts: {source}")]
    Readiness {
        attempts: u32,
        #[source]
        source: StorageError,
    },
}

/// Errors scoped to one symbol's backfill.
#[derive(Error, Debug)]
pub enum SymbolError {
    #[error("Exchange error: {0}")]
    Exchange(#[from] ExchangeError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Pacing and retry policy for a run.
#[derive(Debug, Clone)]
pub struct BackfillConfig {
    /// Records requested per page. A page shorter than this means the
    /// symbol's history is exhausted.
    pub page_limit: u32,
    /// Delay between consecutive page fetches for one symbol.
    pub page_delay: Duration,
    /// Cool-down after a symbol fails, before moving to the next one.
    pub error_cooldown: Duration,
    /// Delay between retries while the symbol universe comes back empty.
    pub discovery_retry_delay: Duration,
    /// Startup readiness probe attempts against the store.
    pub readiness_attempts: u32,
    /// First readiness retry delay; doubles after each failed attempt.
    pub readiness_backoff_base: Duration,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            page_limit: 1000,
            page_delay: Duration::from_secs(1),
            error_cooldown: Duration::from_secs(1),
            discovery_retry_delay: Duration::from_secs(1),
            readiness_attempts: 5,
            readiness_backoff_base: Duration::from_secs(1),
        }
    }
}

/// Outcome counters for a completed (or cancelled) run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub symbols_completed: usize,
    pub symbols_failed: usize,
    pub pages_fetched: u64,
    pub records_written: u64,
    pub cancelled: bool,
}
