//! Postgres-backed record archive.
//!
//! Implements [`RecordSink`] over a connection pool. Batches are written as
//! a single multi-row `INSERT ... ON CONFLICT DO NOTHING`, chunked to stay
//! under the bind-parameter limit.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::debug;

use crate::config::DatabaseSettings;
use crate::schema::{Kind, OrderRow, RecordBatch, TradeRow};
use crate::storage::{migrations, RecordSink, StorageResult};

const TRADE_COLUMNS: usize = 13;
const ORDER_COLUMNS: usize = 28;

/// Postgres archive for backfilled trades and orders.
pub struct TradeArchive {
    pool: PgPool,
    batch_size: usize,
}

impl TradeArchive {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            batch_size: 500,
        }
    }

    /// Build the archive without connecting. The first readiness probe
    /// establishes the actual connection, so startup retry policy applies.
    pub fn connect_lazy(settings: &DatabaseSettings) -> StorageResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .min_connections(settings.min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect_lazy(&settings.url)?;

        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn insert_trade_rows(&self, rows: &[TradeRow]) -> StorageResult<usize> {
        let query = build_insert_sql(
            "INSERT INTO trades (
                buyer, commission, commissionAsset, id, price, qty, quoteQty,
                realizedPnl, positionSide, symbol, name, time, date
            ) VALUES ",
            rows.len(),
            TRADE_COLUMNS,
        );

        let mut sqlx_query = sqlx::query(&query);
        for row in rows {
            sqlx_query = sqlx_query
                .bind(row.buyer)
                .bind(row.commission)
                .bind(&row.commission_asset)
                .bind(row.id)
                .bind(row.price)
                .bind(row.qty)
                .bind(row.quote_qty)
                .bind(row.realized_pnl)
                .bind(&row.position_side)
                .bind(&row.symbol)
                .bind(&row.name)
                .bind(row.time)
                .bind(row.date);
        }

        let result = sqlx_query.execute(&self.pool).await?;
        Ok(result.rows_affected() as usize)
    }

    async fn insert_order_rows(&self, rows: &[OrderRow]) -> StorageResult<usize> {
        let query = build_insert_sql(
            "INSERT INTO orders (
                avgPrice, clientOrderId, cumQuote, executedQty, orderId,
                origQty, origType, price, reduceOnly, side, positionSide,
                status, stopPrice, closePosition, symbol, time, timeInForce,
                type, activatePrice, priceRate, updateTime, workingType,
                priceProtect, priceMatch, selfTradePreventionMode,
                goodTillDate, name, date
            ) VALUES ",
            rows.len(),
            ORDER_COLUMNS,
        );

        let mut sqlx_query = sqlx::query(&query);
        for row in rows {
            sqlx_query = sqlx_query
                .bind(row.avg_price)
                .bind(&row.client_order_id)
                .bind(row.cum_quote)
                .bind(row.executed_qty)
                .bind(row.order_id)
                .bind(row.orig_qty)
                .bind(&row.orig_type)
                .bind(row.price)
                .bind(row.reduce_only)
                .bind(&row.side)
                .bind(&row.position_side)
                .bind(&row.status)
                .bind(row.stop_price)
                .bind(row.close_position)
                .bind(&row.symbol)
                .bind(row.time)
                .bind(&row.time_in_force)
                .bind(&row.order_type)
                .bind(row.activate_price)
                .bind(row.price_rate)
                .bind(row.update_time)
                .bind(&row.working_type)
                .bind(row.price_protect)
                .bind(&row.price_match)
                .bind(&row.self_trade_prevention_mode)
                .bind(row.good_till_date)
                .bind(&row.name)
                .bind(row.date);
        }

        let result = sqlx_query.execute(&self.pool).await?;
        Ok(result.rows_affected() as usize)
    }
}

/// Build a multi-row insert with numbered placeholders.
fn build_insert_sql(prefix: &str, row_count: usize, columns: usize) -> String {
    let mut query = String::from(prefix);
    let mut param = 1;

    for i in 0..row_count {
        if i > 0 {
            query.push_str(", ");
        }
        query.push('(');
        for c in 0..columns {
            if c > 0 {
                query.push_str(", ");
            }
            query.push_str(&format!("${}", param));
            param += 1;
        }
        query.push(')');
    }

    query.push_str(" ON CONFLICT DO NOTHING");
    query
}

/// Map the stored high-water mark to the next fetch cursor.
fn cursor_after(max_id: Option<i64>) -> u64 {
    match max_id {
        Some(id) if id >= 0 => id as u64 + 1,
        _ => 0,
    }
}

#[async_trait]
impl RecordSink for TradeArchive {
    async fn ensure_ready(&self, kind: Kind) -> StorageResult<()> {
        migrations::ensure_table(&self.pool, kind).await
    }

    async fn resume_cursor(&self, kind: Kind, symbol: &str, account: &str) -> StorageResult<u64> {
        let query = format!(
            "SELECT MAX({}) FROM {} WHERE symbol = $1 AND name = $2",
            kind.id_column(),
            kind.table()
        );

        let max_id: Option<i64> = sqlx::query_scalar(&query)
            .bind(symbol)
            .bind(account)
            .fetch_one(&self.pool)
            .await?;

        Ok(cursor_after(max_id))
    }

    async fn persist_batch(&self, batch: &RecordBatch, account: &str) -> StorageResult<usize> {
        if batch.is_empty() {
            return Ok(0);
        }

        let mut total = 0;
        match batch {
            RecordBatch::Trades(records) => {
                let rows = records
                    .iter()
                    .map(|r| TradeRow::from_record(r, account))
                    .collect::<Result<Vec<_>, _>>()?;
                for chunk in rows.chunks(self.batch_size) {
                    total += self.insert_trade_rows(chunk).await?;
                }
            }
            RecordBatch::Orders(records) => {
                let rows = records
                    .iter()
                    .map(|r| OrderRow::from_record(r, account))
                    .collect::<Result<Vec<_>, _>>()?;
                for chunk in rows.chunks(self.batch_size) {
                    total += self.insert_order_rows(chunk).await?;
                }
            }
        }

        debug!(account, written = total, "Persisted batch");
        Ok(total)
    }
}
