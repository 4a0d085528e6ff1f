use async_trait::async_trait;
use sqlx::PgPool;

/// Settlement-currency ticker. Always active, never itself a row in
/// `instruments`, never a matching counterparty.
pub const CASH: &str = "CASH";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Instrument {
    pub ticker: String,
    pub display_name: String,
    pub active: bool,
}

/// The engine's only view into the instrument catalog: a predicate.
/// Injected as a trait object rather than reached for as a singleton, so
/// tests and callers can supply a fake without standing up a catalog
/// service.
#[async_trait]
pub trait InstrumentGate: Send + Sync {
    async fn active_instrument(&self, ticker: &str) -> Result<bool, sqlx::Error>;
}

pub struct PgInstrumentGate {
    pool: PgPool,
}

impl PgInstrumentGate {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InstrumentGate for PgInstrumentGate {
    async fn active_instrument(&self, ticker: &str) -> Result<bool, sqlx::Error> {
        if ticker == CASH {
            return Ok(true);
        }
        let active: Option<bool> =
            sqlx::query_scalar("SELECT active FROM instruments WHERE ticker = $1")
                .bind(ticker)
                .fetch_optional(&self.pool)
                .await?;
        Ok(active.unwrap_or(false))
    }
}
