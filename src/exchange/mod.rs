//! Exchange access layer
//!
//! Defines the [`HistorySource`] trait for paged historical account data
//! (fills and orders) plus the REST client and request signer that back it
//! in production.

use async_trait::async_trait;
use thiserror::Error;

pub mod client;
pub mod signer;
pub mod types;

pub use client::FuturesRestClient;
pub use signer::HmacSigner;
pub use types::{ExchangeInfo, OrderRecord, SymbolInfo, TradeRecord};

/// Exchange access errors
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ExchangeError {
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

pub type ExchangeResult<T> = Result<T, ExchangeError>;

/// Read-only source of historical account data.
///
/// Pages are ordered ascending by the record identifier and fetched with an
/// exclusive lower bound: passing `from_id` returns records whose id is
/// `>= from_id`.
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Fetch exchange metadata, including the tradable symbol list.
    async fn exchange_info(&self) -> ExchangeResult<ExchangeInfo>;

    /// Fetch one page of account fills for `symbol`, starting at `from_id`.
    async fn trades_page(
        &self,
        symbol: &str,
        from_id: u64,
        limit: u32,
    ) -> ExchangeResult<Vec<TradeRecord>>;

    /// Fetch one page of account orders for `symbol`, starting at `from_order_id`.
    async fn orders_page(
        &self,
        symbol: &str,
        from_order_id: u64,
        limit: u32,
    ) -> ExchangeResult<Vec<OrderRecord>>;
}

#[async_trait]
impl<T: HistorySource + ?Sized> HistorySource for std::sync::Arc<T> {
    async fn exchange_info(&self) -> ExchangeResult<ExchangeInfo> {
        (**self).exchange_info().await
    }

    async fn trades_page(
        &self,
        symbol: &str,
        from_id: u64,
        limit: u32,
    ) -> ExchangeResult<Vec<TradeRecord>> {
        (**self).trades_page(symbol, from_id, limit).await
    }

    async fn orders_page(
        &self,
        symbol: &str,
        from_order_id: u64,
        limit: u32,
    ) -> ExchangeResult<Vec<OrderRecord>> {
        (**self).orders_page(symbol, from_order_id, limit).await
    }
}
