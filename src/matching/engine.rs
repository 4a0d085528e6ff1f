use std::sync::Arc;

use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::EngineError;
use crate::instrument::{InstrumentGate, CASH};
use crate::ledger::Ledger;
use crate::models::{Order, OrderStatus, OrderType, Side, Trade};
use crate::order_store::OrderStore;
use crate::trade_store::TradeStore;

/// Composes the Ledger, Order store, and Trade store into the admission
/// and cancellation pipelines. Holds no authoritative state of its own —
/// every decision is made against rows locked inside the transaction for
/// the current call.
#[derive(Clone)]
pub struct MatchingEngine {
    pool: PgPool,
    gate: Arc<dyn InstrumentGate>,
}

impl MatchingEngine {
    pub fn new(pool: PgPool, gate: Arc<dyn InstrumentGate>) -> Self {
        Self { pool, gate }
    }

    async fn require_active_instrument(&self, ticker: &str) -> Result<(), EngineError> {
        if !self.gate.active_instrument(ticker).await? {
            return Err(EngineError::UnknownInstrument(ticker.to_string()));
        }
        Ok(())
    }

    pub async fn submit_limit(
        &self,
        user_id: Uuid,
        ticker: &str,
        side: Side,
        quantity: i64,
        price: i64,
    ) -> Result<Uuid, EngineError> {
        if quantity <= 0 {
            return Err(EngineError::BadRequest("quantity must be positive".into()));
        }
        if price <= 0 {
            return Err(EngineError::BadRequest("price must be positive".into()));
        }
        self.require_active_instrument(ticker).await?;

        let notional = quantity
            .checked_mul(price)
            .ok_or_else(|| EngineError::BadRequest("quantity * price overflows i64".into()))?;

        let mut tx = self.pool.begin().await?;
        let order_id = Uuid::new_v4();

        let reserved = match side {
            Side::Buy => Ledger::reserve(&mut tx, user_id, CASH, notional, Some(order_id)).await?,
            Side::Sell => Ledger::reserve(&mut tx, user_id, ticker, quantity, Some(order_id)).await?,
        };
        if !reserved {
            return Err(EngineError::InsufficientFunds);
        }

        let mut order = OrderStore::insert(
            &mut tx,
            order_id,
            user_id,
            ticker,
            side,
            OrderType::Limit,
            Some(price),
            quantity,
        )
        .await?;

        run_match_loop(&mut tx, &mut order).await?;
        tx.commit().await?;

        tracing::info!(order_id = %order.id, ticker, ?side, quantity, price, "limit order admitted");
        Ok(order.id)
    }

    pub async fn submit_market(
        &self,
        user_id: Uuid,
        ticker: &str,
        side: Side,
        quantity: i64,
    ) -> Result<Uuid, EngineError> {
        if quantity <= 0 {
            return Err(EngineError::BadRequest("quantity must be positive".into()));
        }
        self.require_active_instrument(ticker).await?;

        let mut tx = self.pool.begin().await?;
        let order_id = Uuid::new_v4();

        let opposite_side = opposite(side);
        let mut candidates = OrderStore::list_active_by_ticker(&mut tx, ticker).await?;
        candidates.retain(|c| c.side == opposite_side);
        sort_candidates(side, &mut candidates);

        let mut walked = 0i64;
        let mut cost: i128 = 0;
        for candidate in &candidates {
            if walked >= quantity {
                break;
            }
            let take = (quantity - walked).min(candidate.remaining());
            cost += take as i128 * candidate.price.expect("resting order is always limit") as i128;
            walked += take;
        }
        let fully_fillable = walked >= quantity;

        let (reserve_ticker, reserve_amount): (&str, i64) = match side {
            Side::Buy => {
                if cost > i64::MAX as i128 {
                    return Err(EngineError::BadRequest(
                        "market order notional overflows i64".into(),
                    ));
                }
                (CASH, cost as i64)
            }
            Side::Sell => (ticker, quantity),
        };

        if reserve_amount > 0 {
            let reserved =
                Ledger::reserve(&mut tx, user_id, reserve_ticker, reserve_amount, Some(order_id))
                    .await?;
            if !reserved {
                return Err(EngineError::InsufficientFunds);
            }
        }

        if !fully_fillable {
            if reserve_amount > 0 {
                Ledger::release(&mut tx, user_id, reserve_ticker, reserve_amount, Some(order_id))
                    .await?;
            }
            return Err(EngineError::NoLiquidity);
        }

        let mut order = OrderStore::insert(
            &mut tx,
            order_id,
            user_id,
            ticker,
            side,
            OrderType::Market,
            None,
            quantity,
        )
        .await?;

        run_match_loop(&mut tx, &mut order).await?;
        tx.commit().await?;

        tracing::info!(order_id = %order.id, ticker, ?side, quantity, "market order admitted");
        Ok(order.id)
    }

    pub async fn cancel(&self, user_id: Uuid, order_id: Uuid) -> Result<(), EngineError> {
        let mut tx = self.pool.begin().await?;
        let order = OrderStore::get_for_update(&mut tx, order_id).await?;

        if order.user_id != user_id {
            return Err(EngineError::Forbidden);
        }
        if !order.status.is_resting() {
            return Err(EngineError::Conflict(
                "order is already in a terminal state".into(),
            ));
        }

        let remainder = order.remaining();
        match (order.side, order.order_type) {
            (Side::Buy, OrderType::Limit) => {
                let price = order.price.expect("limit order has a price");
                let amount = remainder * price;
                Ledger::release(&mut tx, user_id, CASH, amount, Some(order.id)).await?;
            }
            (Side::Sell, OrderType::Limit) => {
                Ledger::release(&mut tx, user_id, &order.ticker, remainder, Some(order.id)).await?;
            }
            (_, OrderType::Market) => {
                // Market orders never rest; a market order never reaches cancel.
            }
        }

        OrderStore::update_fill(&mut tx, order.id, order.filled, OrderStatus::Cancelled).await?;
        tx.commit().await?;

        tracing::info!(order_id = %order.id, "order cancelled");
        Ok(())
    }

    pub async fn get_order(&self, order_id: Uuid) -> Result<Order, EngineError> {
        OrderStore::get(&self.pool, order_id).await
    }

    pub async fn list_orders(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Order>, EngineError> {
        OrderStore::list_by_user(&self.pool, user_id, limit, offset).await
    }

    pub async fn get_book(
        &self,
        ticker: &str,
        depth: u32,
    ) -> Result<super::book::BookSnapshot, EngineError> {
        super::book::get_book(&self.pool, ticker, depth).await
    }

    pub async fn get_tape(&self, ticker: &str, limit: u32) -> Result<Vec<Trade>, EngineError> {
        let limit = limit.clamp(1, 100) as i64;
        TradeStore::list_by_ticker(&self.pool, ticker, limit).await
    }

    pub async fn deposit(&self, user_id: Uuid, ticker: &str, amount: i64) -> Result<(), EngineError> {
        let mut tx = self.pool.begin().await?;
        Ledger::credit(&mut tx, user_id, ticker, amount).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn withdraw(&self, user_id: Uuid, ticker: &str, amount: i64) -> Result<(), EngineError> {
        let mut tx = self.pool.begin().await?;
        Ledger::debit(&mut tx, user_id, ticker, amount).await?;
        tx.commit().await?;
        Ok(())
    }
}

fn opposite(side: Side) -> Side {
    match side {
        Side::Buy => Side::Sell,
        Side::Sell => Side::Buy,
    }
}

fn sort_candidates(taker_side: Side, candidates: &mut [Order]) {
    candidates.sort_by(|a, b| {
        let pa = a.price.expect("resting order is always limit");
        let pb = b.price.expect("resting order is always limit");
        let price_cmp = match taker_side {
            Side::Buy => pa.cmp(&pb),
            Side::Sell => pb.cmp(&pa),
        };
        price_cmp
            .then(a.created_at.cmp(&b.created_at))
            .then(a.id.cmp(&b.id))
    });
}

/// Walks resting candidates opposite `taker` in price-time priority,
/// settling crosses until either the taker is filled or no compatible
/// candidate remains. Mutates `taker` in place and persists every fill;
/// the caller is responsible for the surrounding transaction.
async fn run_match_loop(
    tx: &mut Transaction<'_, Postgres>,
    taker: &mut Order,
) -> Result<Vec<Trade>, EngineError> {
    let mut remaining = taker.remaining();
    if remaining == 0 {
        return Ok(Vec::new());
    }

    let opposite_side = opposite(taker.side);
    let mut candidates = OrderStore::list_active_by_ticker(tx, &taker.ticker).await?;
    candidates.retain(|c| c.side == opposite_side && c.id != taker.id);
    candidates.retain(|c| match taker.order_type {
        OrderType::Market => true,
        OrderType::Limit => {
            let taker_price = taker.price.expect("limit taker has a price");
            let candidate_price = c.price.expect("resting order is always limit");
            match taker.side {
                Side::Buy => candidate_price <= taker_price,
                Side::Sell => candidate_price >= taker_price,
            }
        }
    });
    sort_candidates(taker.side, &mut candidates);

    let mut trades = Vec::new();

    for mut maker in candidates {
        if remaining == 0 {
            break;
        }
        let maker_remaining = maker.remaining();
        if maker_remaining <= 0 {
            continue;
        }

        let exec_qty = remaining.min(maker_remaining);
        let exec_price = maker.price.expect("resting order is always limit");

        let notional = exec_qty as i128 * exec_price as i128;
        if notional > i64::MAX as i128 {
            return Err(EngineError::BadRequest(
                "execution notional overflows i64".into(),
            ));
        }
        let cash_amount = notional as i64;

        let (buyer_id, seller_id) = match taker.side {
            Side::Buy => (taker.user_id, maker.user_id),
            Side::Sell => (maker.user_id, taker.user_id),
        };
        let (buyer_order_id, seller_order_id) = match taker.side {
            Side::Buy => (taker.id, maker.id),
            Side::Sell => (maker.id, taker.id),
        };

        let trade_id = Uuid::new_v4();
        Ledger::settle_cross(tx, seller_id, buyer_id, &taker.ticker, exec_qty, cash_amount, trade_id)
            .await?;

        let maker_filled = maker.filled + exec_qty;
        let maker_status = Order::status_for_fill(maker.quantity, maker_filled);
        OrderStore::update_fill(tx, maker.id, maker_filled, maker_status).await?;
        maker.filled = maker_filled;
        maker.status = maker_status;

        let taker_filled = taker.filled + exec_qty;
        let taker_status = Order::status_for_fill(taker.quantity, taker_filled);
        OrderStore::update_fill(tx, taker.id, taker_filled, taker_status).await?;
        taker.filled = taker_filled;
        taker.status = taker_status;

        let trade = TradeStore::append(
            tx,
            trade_id,
            &taker.ticker,
            buyer_order_id,
            seller_order_id,
            exec_price,
            exec_qty,
        )
        .await?;
        trades.push(trade);

        remaining -= exec_qty;
    }

    if remaining > 0 {
        match taker.order_type {
            OrderType::Limit => {
                let status = Order::status_for_fill(taker.quantity, taker.filled);
                taker.status = status;
                OrderStore::update_fill(tx, taker.id, taker.filled, status).await?;
            }
            OrderType::Market => {
                return Err(EngineError::NoLiquidity);
            }
        }
    }

    Ok(trades)
}
