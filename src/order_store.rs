use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::EngineError;
use crate::models::{Order, OrderStatus, OrderType, Side};

pub struct OrderStore;

impl OrderStore {
    #[allow(clippy::too_many_arguments)]
    pub async fn insert(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        user_id: Uuid,
        ticker: &str,
        side: Side,
        order_type: OrderType,
        price: Option<i64>,
        quantity: i64,
    ) -> Result<Order, EngineError> {
        let order = sqlx::query_as::<_, Order>(
            "INSERT INTO orders (id, user_id, ticker, side, order_type, price, quantity, filled, status)
             VALUES ($1, $2, $3, $4, $5, $6, $7, 0, 'new')
             RETURNING id, user_id, ticker, side, order_type, price, quantity, filled, status, created_at",
        )
        .bind(id)
        .bind(user_id)
        .bind(ticker)
        .bind(side)
        .bind(order_type)
        .bind(price)
        .bind(quantity)
        .fetch_one(&mut **tx)
        .await?;
        Ok(order)
    }

    pub async fn get(pool: &PgPool, id: Uuid) -> Result<Order, EngineError> {
        sqlx::query_as::<_, Order>(
            "SELECT id, user_id, ticker, side, order_type, price, quantity, filled, status, created_at
             FROM orders WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(EngineError::NotFound)
    }

    pub async fn get_for_update(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<Order, EngineError> {
        sqlx::query_as::<_, Order>(
            "SELECT id, user_id, ticker, side, order_type, price, quantity, filled, status, created_at
             FROM orders WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(EngineError::NotFound)
    }

    pub async fn list_by_user(
        pool: &PgPool,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Order>, EngineError> {
        let orders = sqlx::query_as::<_, Order>(
            "SELECT id, user_id, ticker, side, order_type, price, quantity, filled, status, created_at
             FROM orders WHERE user_id = $1
             ORDER BY created_at DESC, id DESC
             LIMIT $2 OFFSET $3",
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;
        Ok(orders)
    }

    /// Resting candidates for the match loop. Not sorted by this store —
    /// price-time priority ordering is the matching engine's job.
    pub async fn list_active_by_ticker(
        tx: &mut Transaction<'_, Postgres>,
        ticker: &str,
    ) -> Result<Vec<Order>, EngineError> {
        let orders = sqlx::query_as::<_, Order>(
            "SELECT id, user_id, ticker, side, order_type, price, quantity, filled, status, created_at
             FROM orders
             WHERE ticker = $1 AND status IN ('new', 'partially_executed') AND order_type = 'limit'
             FOR UPDATE",
        )
        .bind(ticker)
        .fetch_all(&mut **tx)
        .await?;
        Ok(orders)
    }

    pub async fn update_fill(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        new_filled: i64,
        new_status: OrderStatus,
    ) -> Result<(), EngineError> {
        sqlx::query("UPDATE orders SET filled = $2, status = $3 WHERE id = $1")
            .bind(id)
            .bind(new_filled)
            .bind(new_status)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}
