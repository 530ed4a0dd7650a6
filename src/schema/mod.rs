//! Record kinds and batch containers.
//!
//! A backfill run processes exactly one [`Kind`]. [`RecordBatch`] carries one
//! fetched page through the pipeline without the orchestration code needing
//! to know which kind it holds.

use std::fmt;

pub mod rows;

pub use rows::{OrderRow, SchemaError, TradeRow};

use crate::exchange::types::{OrderRecord, TradeRecord};

/// Which record stream a run backfills.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Trades,
    Orders,
}

impl Kind {
    /// Destination table name.
    pub fn table(&self) -> &'static str {
        match self {
            Kind::Trades => "trades",
            Kind::Orders => "orders",
        }
    }

    /// Column holding the exchange-assigned record identifier.
    pub fn id_column(&self) -> &'static str {
        match self {
            Kind::Trades => "id",
            Kind::Orders => "orderId",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Trades => write!(f, "trades"),
            Kind::Orders => write!(f, "orders"),
        }
    }
}

/// One page of fetched records, ordered ascending by identifier.
#[derive(Debug, Clone)]
pub enum RecordBatch {
    Trades(Vec<TradeRecord>),
    Orders(Vec<OrderRecord>),
}

impl RecordBatch {
    pub fn len(&self) -> usize {
        match self {
            RecordBatch::Trades(records) => records.len(),
            RecordBatch::Orders(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Identifier of the last record in the page, if any.
    pub fn last_id(&self) -> Option<u64> {
        match self {
            RecordBatch::Trades(records) => records.last().map(|r| r.id),
            RecordBatch::Orders(records) => records.last().map(|r| r.order_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_table_and_id_column() {
        assert_eq!(Kind::Trades.table(), "trades");
        assert_eq!(Kind::Trades.id_column(), "id");
        assert_eq!(Kind::Orders.table(), "orders");
        assert_eq!(Kind::Orders.id_column(), "orderId");
    }

    #[test]
    fn test_empty_batch_has_no_last_id() {
        let batch = RecordBatch::Trades(vec![]);
        assert!(batch.is_empty());
        assert_eq!(batch.last_id(), None);
    }
}
