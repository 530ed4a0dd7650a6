//! Analytical store access.
//!
//! Defines the [`RecordSink`] trait the backfill writes through, plus the
//! Postgres-backed implementation and the table definitions it manages.

use async_trait::async_trait;
use thiserror::Error;

pub mod migrations;
pub mod repository;

pub use repository::TradeArchive;

use crate::schema::{Kind, RecordBatch, SchemaError};

/// Store errors
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Row conversion error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Destination for backfilled records.
///
/// Writes are idempotent: re-persisting records already present must not
/// create duplicates, so overlapping pages after a resume are harmless.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Verify the store is reachable and the destination table exists,
    /// creating it if needed.
    async fn ensure_ready(&self, kind: Kind) -> StorageResult<()>;

    /// Next identifier to fetch for `(symbol, account)`: one past the highest
    /// identifier already stored, or zero when nothing is stored yet.
    async fn resume_cursor(&self, kind: Kind, symbol: &str, account: &str) -> StorageResult<u64>;

    /// Persist a fetched page, stamping each row with `account`. Returns the
    /// number of rows actually written (duplicates excluded).
    async fn persist_batch(
        &self,
        batch: &RecordBatch,
        account: &str,
    ) -> StorageResult<usize>;
}

#[async_trait]
impl<T: RecordSink + ?Sized> RecordSink for std::sync::Arc<T> {
    async fn ensure_ready(&self, kind: Kind) -> StorageResult<()> {
        (**self).ensure_ready(kind).await
    }

    async fn resume_cursor(&self, kind: Kind, symbol: &str, account: &str) -> StorageResult<u64> {
        (**self).resume_cursor(kind, symbol, account).await
    }

    async fn persist_batch(&self, batch: &RecordBatch, account: &str) -> StorageResult<usize> {
        (**self).persist_batch(batch, account).await
    }
}
