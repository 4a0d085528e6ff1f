use std::collections::BTreeMap;

use serde::Serialize;
use sqlx::PgPool;

use crate::error::EngineError;
use crate::models::{Order, Side};

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Level {
    pub price: i64,
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookSnapshot {
    pub bids: Vec<Level>,
    pub asks: Vec<Level>,
}

/// L2 depth snapshot: active resting LIMIT orders grouped by price level,
/// bids descending from the best bid, asks ascending from the best ask,
/// each side truncated to `depth` (clamped to [1, 25]).
pub async fn get_book(pool: &PgPool, ticker: &str, depth: u32) -> Result<BookSnapshot, EngineError> {
    let depth = depth.clamp(1, 25) as usize;

    let orders = sqlx::query_as::<_, Order>(
        "SELECT id, user_id, ticker, side, order_type, price, quantity, filled, status, created_at
         FROM orders
         WHERE ticker = $1 AND status IN ('new', 'partially_executed') AND order_type = 'limit'",
    )
    .bind(ticker)
    .fetch_all(pool)
    .await?;

    let mut bids: BTreeMap<i64, i64> = BTreeMap::new();
    let mut asks: BTreeMap<i64, i64> = BTreeMap::new();
    for order in orders {
        let Some(price) = order.price else { continue };
        let qty = order.remaining();
        match order.side {
            Side::Buy => *bids.entry(price).or_insert(0) += qty,
            Side::Sell => *asks.entry(price).or_insert(0) += qty,
        }
    }

    let bids = bids
        .into_iter()
        .rev()
        .take(depth)
        .map(|(price, quantity)| Level { price, quantity })
        .collect();
    let asks = asks
        .into_iter()
        .take(depth)
        .map(|(price, quantity)| Level { price, quantity })
        .collect();

    Ok(BookSnapshot { bids, asks })
}
