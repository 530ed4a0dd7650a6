//! Table definitions.
//!
//! Each record kind has one destination table. The unique constraint over
//! `(symbol, name, <id>)` is what makes persistence idempotent: inserts run
//! with `ON CONFLICT DO NOTHING`, so replayed pages after a resume are
//! silently deduplicated.

use sqlx::PgPool;

use crate::schema::Kind;
use crate::storage::StorageResult;

const CREATE_TRADES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS trades (
    buyer           BOOLEAN NOT NULL,
    commission      DOUBLE PRECISION NOT NULL,
    commissionAsset TEXT NOT NULL,
    id              BIGINT NOT NULL,
    price           DOUBLE PRECISION NOT NULL,
    qty             DOUBLE PRECISION NOT NULL,
    quoteQty        DOUBLE PRECISION NOT NULL,
    realizedPnl     DOUBLE PRECISION NOT NULL,
    positionSide    TEXT NOT NULL,
    symbol          TEXT NOT NULL,
    name            TEXT NOT NULL,
    time            BIGINT NOT NULL,
    date            TIMESTAMPTZ NOT NULL,
    UNIQUE (symbol, name, id)
)
"#;

const CREATE_ORDERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS orders (
    avgPrice                DOUBLE PRECISION NOT NULL,
    clientOrderId           TEXT NOT NULL,
    cumQuote                DOUBLE PRECISION NOT NULL,
    executedQty             DOUBLE PRECISION NOT NULL,
    orderId                 BIGINT NOT NULL,
    origQty                 DOUBLE PRECISION NOT NULL,
    origType                TEXT NOT NULL,
    price                   DOUBLE PRECISION NOT NULL,
    reduceOnly              BOOLEAN NOT NULL,
    side                    TEXT NOT NULL,
    positionSide            TEXT NOT NULL,
    status                  TEXT NOT NULL,
    stopPrice               DOUBLE PRECISION NOT NULL,
    closePosition           BOOLEAN NOT NULL,
    symbol                  TEXT NOT NULL,
    time                    BIGINT NOT NULL,
    timeInForce             TEXT NOT NULL,
    type                    TEXT NOT NULL,
    activatePrice           DOUBLE PRECISION NOT NULL,
    priceRate               DOUBLE PRECISION NOT NULL,
    updateTime              BIGINT NOT NULL,
    workingType             TEXT NOT NULL,
    priceProtect            BOOLEAN NOT NULL,
    priceMatch              TEXT NOT NULL,
    selfTradePreventionMode TEXT NOT NULL,
    goodTillDate            BIGINT NOT NULL,
    name                    TEXT NOT NULL,
    date                    TIMESTAMPTZ NOT NULL,
    UNIQUE (symbol, name, orderId)
)
"#;

/// Create the destination table for `kind` if it does not exist.
pub async fn ensure_table(pool: &PgPool, kind: Kind) -> StorageResult<()> {
    let ddl = match kind {
        Kind::Trades => CREATE_TRADES_TABLE,
        Kind::Orders => CREATE_ORDERS_TABLE,
    };

    sqlx::query(ddl).execute(pool).await?;
    Ok(())
}
