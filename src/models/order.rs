use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
pub enum OrderType {
    Limit,
    Market,
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderType::Limit => write!(f, "limit"),
            OrderType::Market => write!(f, "market"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
pub enum OrderStatus {
    New,
    PartiallyExecuted,
    Executed,
    Cancelled,
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::New => write!(f, "new"),
            OrderStatus::PartiallyExecuted => write!(f, "partially_executed"),
            OrderStatus::Executed => write!(f, "executed"),
            OrderStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl OrderStatus {
    pub fn is_resting(&self) -> bool {
        matches!(self, OrderStatus::New | OrderStatus::PartiallyExecuted)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Executed | OrderStatus::Cancelled)
    }
}

/// A single order, LIMIT or MARKET, represented as one tagged row rather
/// than two distinct types: `price` is `Some` iff `order_type == Limit`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub ticker: String,
    pub side: Side,
    pub order_type: OrderType,
    pub price: Option<i64>,
    pub quantity: i64,
    pub filled: i64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn remaining(&self) -> i64 {
        self.quantity - self.filled
    }

    pub fn status_for_fill(quantity: i64, filled: i64) -> OrderStatus {
        if filled == quantity {
            OrderStatus::Executed
        } else if filled > 0 {
            OrderStatus::PartiallyExecuted
        } else {
            OrderStatus::New
        }
    }
}
