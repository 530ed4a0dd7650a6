//! Canonical storage rows.
//!
//! Converts wire records into the typed rows the store persists: decimal
//! strings become `f64`, identifiers become `i64`, and a `date` column is
//! derived from the record's epoch-millisecond time. The account name is
//! stamped onto every row as `name`.

use chrono::{DateTime, TimeZone, Utc};
use thiserror::Error;

use crate::exchange::types::{OrderRecord, TradeRecord};

/// Row conversion errors
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Invalid decimal in field '{field}': '{value}'")]
    InvalidDecimal { field: &'static str, value: String },

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(i64),
}

pub type SchemaResult<T> = Result<T, SchemaError>;

fn parse_decimal(field: &'static str, value: &str) -> SchemaResult<f64> {
    value.trim().parse::<f64>().map_err(|_| SchemaError::InvalidDecimal {
        field,
        value: value.to_string(),
    })
}

fn derive_date(time_ms: i64) -> SchemaResult<DateTime<Utc>> {
    Utc.timestamp_millis_opt(time_ms)
        .single()
        .ok_or(SchemaError::InvalidTimestamp(time_ms))
}

/// A fill ready for persistence.
#[derive(Debug, Clone)]
pub struct TradeRow {
    pub buyer: bool,
    pub commission: f64,
    pub commission_asset: String,
    pub id: i64,
    pub price: f64,
    pub qty: f64,
    pub quote_qty: f64,
    pub realized_pnl: f64,
    pub position_side: String,
    pub symbol: String,
    pub name: String,
    pub time: i64,
    pub date: DateTime<Utc>,
}

impl TradeRow {
    pub fn from_record(record: &TradeRecord, account: &str) -> SchemaResult<Self> {
        Ok(Self {
            buyer: record.buyer,
            commission: parse_decimal("commission", &record.commission)?,
            commission_asset: record.commission_asset.clone(),
            id: record.id as i64,
            price: parse_decimal("price", &record.price)?,
            qty: parse_decimal("qty", &record.qty)?,
            quote_qty: parse_decimal("quoteQty", &record.quote_qty)?,
            realized_pnl: parse_decimal("realizedPnl", &record.realized_pnl)?,
            position_side: record.position_side.clone(),
            symbol: record.symbol.clone(),
            name: account.to_string(),
            time: record.time,
            date: derive_date(record.time)?,
        })
    }
}

/// An order ready for persistence.
#[derive(Debug, Clone)]
pub struct OrderRow {
    pub avg_price: f64,
    pub client_order_id: String,
    pub cum_quote: f64,
    pub executed_qty: f64,
    pub order_id: i64,
    pub orig_qty: f64,
    pub orig_type: String,
    pub price: f64,
    pub reduce_only: bool,
    pub side: String,
    pub position_side: String,
    pub status: String,
    pub stop_price: f64,
    pub close_position: bool,
    pub symbol: String,
    pub time: i64,
    pub time_in_force: String,
    pub order_type: String,
    pub activate_price: f64,
    pub price_rate: f64,
    pub update_time: i64,
    pub working_type: String,
    pub price_protect: bool,
    pub price_match: String,
    pub self_trade_prevention_mode: String,
    pub good_till_date: i64,
    pub name: String,
    pub date: DateTime<Utc>,
}

impl OrderRow {
    pub fn from_record(record: &OrderRecord, account: &str) -> SchemaResult<Self> {
        Ok(Self {
            avg_price: parse_decimal("avgPrice", &record.avg_price)?,
            client_order_id: record.client_order_id.clone(),
            cum_quote: parse_decimal("cumQuote", &record.cum_quote)?,
            executed_qty: parse_decimal("executedQty", &record.executed_qty)?,
            order_id: record.order_id as i64,
            orig_qty: parse_decimal("origQty", &record.orig_qty)?,
            orig_type: record.orig_type.clone(),
            price: parse_decimal("price", &record.price)?,
            reduce_only: record.reduce_only,
            side: record.side.clone(),
            position_side: record.position_side.clone(),
            status: record.status.clone(),
            stop_price: parse_decimal("stopPrice", &record.stop_price)?,
            close_position: record.close_position,
            symbol: record.symbol.clone(),
            time: record.time,
            time_in_force: record.time_in_force.clone(),
            order_type: record.order_type.clone(),
            activate_price: parse_decimal("activatePrice", &record.activate_price)?,
            price_rate: parse_decimal("priceRate", &record.price_rate)?,
            update_time: record.update_time,
            working_type: record.working_type.clone(),
            price_protect: record.price_protect,
            price_match: record.price_match.clone(),
            self_trade_prevention_mode: record.self_trade_prevention_mode.clone(),
            good_till_date: record.good_till_date,
            name: account.to_string(),
            date: derive_date(record.time)?,
        })
    }
}
