use thiserror::Error;

/// Unified error taxonomy for the exchange core.
///
/// Every public operation on the ledger, stores, and matching engine
/// returns `Result<_, EngineError>`. Callers (an HTTP layer, a CLI, a
/// test) map these onto their own status codes; the core itself never
/// knows about transport.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unknown instrument: {0}")]
    UnknownInstrument(String),

    #[error("insufficient funds")]
    InsufficientFunds,

    #[error("no liquidity available")]
    NoLiquidity,

    #[error("not found")]
    NotFound,

    #[error("forbidden")]
    Forbidden,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Postgres SQLSTATEs for serialization failure, deadlock abort, and lock
/// timeout: transient contention a caller may retry, not an internal fault.
const RETRYABLE_SQLSTATES: [&str; 3] = ["40001", "40P01", "55P03"];

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => EngineError::NotFound,
            sqlx::Error::Database(db_err) => match db_err.code() {
                Some(code) if RETRYABLE_SQLSTATES.contains(&code.as_ref()) => {
                    EngineError::Conflict(db_err.to_string())
                }
                _ => EngineError::Internal(err.to_string()),
            },
            _ => EngineError::Internal(err.to_string()),
        }
    }
}
