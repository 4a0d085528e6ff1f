use uuid::Uuid;

/// A user's per-ticker balance row. `total` is everything the user owns;
/// `reserved` is the slice of it earmarked against open orders.
/// `available` (`total - reserved`) is never persisted, only derived.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Balance {
    pub user_id: Uuid,
    pub ticker: String,
    pub total: i64,
    pub reserved: i64,
}

impl Balance {
    pub fn available(&self) -> i64 {
        self.total - self.reserved
    }
}
