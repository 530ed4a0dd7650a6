//! Resumable backfill of exchange account history into Postgres.
//!
//! Fetches complete fill and order history for configured accounts through
//! paged, signed REST requests and persists it idempotently, resuming from
//! the store's per-`(symbol, account)` high-water mark on every run.

pub mod backfill;
pub mod cli;
pub mod config;
pub mod exchange;
pub mod schema;
pub mod shutdown;
pub mod storage;
pub mod symbols;

pub use backfill::{BackfillConfig, BackfillRunner, RunSummary};
pub use schema::Kind;
