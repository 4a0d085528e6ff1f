use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::EngineError;
use crate::models::Trade;

pub struct TradeStore;

impl TradeStore {
    pub async fn append(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        ticker: &str,
        buyer_order_id: Uuid,
        seller_order_id: Uuid,
        price: i64,
        quantity: i64,
    ) -> Result<Trade, EngineError> {
        let trade = sqlx::query_as::<_, Trade>(
            "INSERT INTO trades (id, ticker, buyer_order_id, seller_order_id, price, quantity)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING id, ticker, buyer_order_id, seller_order_id, price, quantity, timestamp",
        )
        .bind(id)
        .bind(ticker)
        .bind(buyer_order_id)
        .bind(seller_order_id)
        .bind(price)
        .bind(quantity)
        .fetch_one(&mut **tx)
        .await?;
        Ok(trade)
    }

    pub async fn list_by_ticker(
        pool: &PgPool,
        ticker: &str,
        limit: i64,
    ) -> Result<Vec<Trade>, EngineError> {
        let trades = sqlx::query_as::<_, Trade>(
            "SELECT id, ticker, buyer_order_id, seller_order_id, price, quantity, timestamp
             FROM trades WHERE ticker = $1
             ORDER BY timestamp DESC, id DESC
             LIMIT $2",
        )
        .bind(ticker)
        .bind(limit)
        .fetch_all(pool)
        .await?;
        Ok(trades)
    }

    pub async fn list_by_order(
        pool: &PgPool,
        order_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Trade>, EngineError> {
        let trades = sqlx::query_as::<_, Trade>(
            "SELECT id, ticker, buyer_order_id, seller_order_id, price, quantity, timestamp
             FROM trades WHERE buyer_order_id = $1 OR seller_order_id = $1
             ORDER BY timestamp ASC, id ASC
             LIMIT $2 OFFSET $3",
        )
        .bind(order_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;
        Ok(trades)
    }
}
