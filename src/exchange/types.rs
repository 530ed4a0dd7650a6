//! Wire types for the futures REST API.
//!
//! Monetary fields arrive as decimal strings and are kept as strings here;
//! coercion to storage types happens in [`crate::schema`].

use serde::Deserialize;

/// Exchange metadata returned by the exchange-info endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeInfo {
    pub symbols: Vec<SymbolInfo>,
}

/// Per-symbol metadata. Only the fields the backfill needs.
#[derive(Debug, Clone, Deserialize)]
pub struct SymbolInfo {
    pub symbol: String,
    pub status: String,
}

/// A single account fill.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRecord {
    pub symbol: String,
    pub id: u64,
    pub order_id: u64,
    pub side: String,
    pub position_side: String,
    pub buyer: bool,
    pub price: String,
    pub qty: String,
    pub quote_qty: String,
    pub realized_pnl: String,
    pub commission: String,
    pub commission_asset: String,
    /// Fill time, epoch milliseconds.
    pub time: i64,
}

/// A single account order, in any terminal or live state.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    pub symbol: String,
    pub order_id: u64,
    pub client_order_id: String,
    pub side: String,
    pub position_side: String,
    pub status: String,
    #[serde(rename = "type")]
    pub order_type: String,
    pub orig_type: String,
    pub time_in_force: String,
    pub price: String,
    pub avg_price: String,
    pub orig_qty: String,
    pub executed_qty: String,
    pub cum_quote: String,
    pub stop_price: String,
    pub reduce_only: bool,
    pub close_position: bool,
    pub working_type: String,
    pub price_protect: bool,
    /// Trailing-stop only; absent on other order types.
    #[serde(default = "default_decimal")]
    pub activate_price: String,
    /// Trailing-stop only; absent on other order types.
    #[serde(default = "default_decimal")]
    pub price_rate: String,
    #[serde(default)]
    pub price_match: String,
    #[serde(default)]
    pub self_trade_prevention_mode: String,
    #[serde(default)]
    pub good_till_date: i64,
    /// Placement time, epoch milliseconds.
    pub time: i64,
    /// Last update time, epoch milliseconds.
    pub update_time: i64,
}

fn default_decimal() -> String {
    "0".to_string()
}
