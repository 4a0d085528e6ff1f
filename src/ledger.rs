use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::error::EngineError;
use crate::models::Balance;

/// Append-only audit trail of every ledger mutation, kept alongside the
/// authoritative `balances` row for observability. Never consulted to
/// decide reservation outcomes — the `balances` row is the only
/// authoritative state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
pub enum EntryKind {
    Credit,
    Debit,
    Reserve,
    Release,
    SettleOut,
    CreditIn,
}

/// Per-(user, ticker) balance ledger. Every mutating primitive here locks
/// the targeted row (creating it lazily if absent) inside the caller's
/// transaction, so callers compose several of these into one atomic
/// admission or cancellation.
pub struct Ledger;

impl Ledger {
    /// Lock (and lazily create) the balance row for `(user_id, ticker)`.
    async fn lock_row(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        ticker: &str,
    ) -> Result<Balance, EngineError> {
        sqlx::query(
            "INSERT INTO balances (user_id, ticker, total, reserved)
             VALUES ($1, $2, 0, 0)
             ON CONFLICT (user_id, ticker) DO NOTHING",
        )
        .bind(user_id)
        .bind(ticker)
        .execute(&mut **tx)
        .await?;

        let balance = sqlx::query_as::<_, Balance>(
            "SELECT user_id, ticker, total, reserved FROM balances
             WHERE user_id = $1 AND ticker = $2 FOR UPDATE",
        )
        .bind(user_id)
        .bind(ticker)
        .fetch_one(&mut **tx)
        .await?;

        Ok(balance)
    }

    async fn record(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        ticker: &str,
        kind: EntryKind,
        amount: i64,
        reference_id: Option<Uuid>,
    ) -> Result<(), EngineError> {
        sqlx::query(
            "INSERT INTO ledger_history (user_id, ticker, kind, amount, reference_id)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(user_id)
        .bind(ticker)
        .bind(kind)
        .bind(amount)
        .bind(reference_id)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Acquire an arbitrary set of balance rows in the fixed global order
    /// `(user_id, ticker)` so that any two transactions contending for an
    /// overlapping set of rows, regardless of which directions they
    /// approach them from, lock in the same order and cannot deadlock.
    async fn lock_all(
        tx: &mut Transaction<'_, Postgres>,
        mut keys: Vec<(Uuid, &str)>,
    ) -> Result<(), EngineError> {
        keys.sort();
        keys.dedup();
        for (user_id, ticker) in keys {
            Self::lock_row(tx, user_id, ticker).await?;
        }
        Ok(())
    }

    fn check_amount(amount: i64) -> Result<(), EngineError> {
        if amount <= 0 {
            return Err(EngineError::BadRequest("amount must be positive".into()));
        }
        Ok(())
    }

    /// Administrative deposit. `total += amount`.
    pub async fn credit(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        ticker: &str,
        amount: i64,
    ) -> Result<Balance, EngineError> {
        Self::check_amount(amount)?;
        let row = Self::lock_row(tx, user_id, ticker).await?;
        let new_total = row
            .total
            .checked_add(amount)
            .ok_or_else(|| EngineError::BadRequest("amount overflows balance".into()))?;

        let updated = sqlx::query_as::<_, Balance>(
            "UPDATE balances SET total = $3 WHERE user_id = $1 AND ticker = $2
             RETURNING user_id, ticker, total, reserved",
        )
        .bind(user_id)
        .bind(ticker)
        .bind(new_total)
        .fetch_one(&mut **tx)
        .await?;

        Self::record(tx, user_id, ticker, EntryKind::Credit, amount, None).await?;
        Ok(updated)
    }

    /// Administrative withdrawal. Requires `total - amount >= reserved`
    /// (withdrawals may never dip into reserved funds).
    pub async fn debit(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        ticker: &str,
        amount: i64,
    ) -> Result<Balance, EngineError> {
        Self::check_amount(amount)?;
        let row = Self::lock_row(tx, user_id, ticker).await?;
        if row.total - amount < row.reserved {
            return Err(EngineError::InsufficientFunds);
        }

        let updated = sqlx::query_as::<_, Balance>(
            "UPDATE balances SET total = total - $3 WHERE user_id = $1 AND ticker = $2
             RETURNING user_id, ticker, total, reserved",
        )
        .bind(user_id)
        .bind(ticker)
        .bind(amount)
        .fetch_one(&mut **tx)
        .await?;

        Self::record(tx, user_id, ticker, EntryKind::Debit, -amount, None).await?;
        Ok(updated)
    }

    /// Earmark `amount` of an existing balance against an open order.
    /// Returns `false` (row left unchanged) if available funds are
    /// insufficient, rather than erroring, so callers can reject the
    /// order cleanly without a rolled-back side effect to worry about.
    pub async fn reserve(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        ticker: &str,
        amount: i64,
        reference_id: Option<Uuid>,
    ) -> Result<bool, EngineError> {
        Self::check_amount(amount)?;
        let row = Self::lock_row(tx, user_id, ticker).await?;
        if row.available() < amount {
            return Ok(false);
        }

        sqlx::query("UPDATE balances SET reserved = reserved + $3 WHERE user_id = $1 AND ticker = $2")
            .bind(user_id)
            .bind(ticker)
            .bind(amount)
            .execute(&mut **tx)
            .await?;

        Self::record(tx, user_id, ticker, EntryKind::Reserve, amount, reference_id).await?;
        Ok(true)
    }

    /// Move `amount` back from reserved to available without touching
    /// `total`. Used on cancellation of the unfilled remainder.
    pub async fn release(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        ticker: &str,
        amount: i64,
        reference_id: Option<Uuid>,
    ) -> Result<Balance, EngineError> {
        Self::check_amount(amount)?;
        let row = Self::lock_row(tx, user_id, ticker).await?;
        if row.reserved < amount {
            return Err(EngineError::Internal(format!(
                "release {amount} exceeds reserved {} for {user_id}/{ticker}",
                row.reserved
            )));
        }

        let updated = sqlx::query_as::<_, Balance>(
            "UPDATE balances SET reserved = reserved - $3 WHERE user_id = $1 AND ticker = $2
             RETURNING user_id, ticker, total, reserved",
        )
        .bind(user_id)
        .bind(ticker)
        .bind(amount)
        .fetch_one(&mut **tx)
        .await?;

        Self::record(tx, user_id, ticker, EntryKind::Release, amount, reference_id).await?;
        Ok(updated)
    }

    /// An asset leaves the user's account as the paying/selling leg of a
    /// fill: both `reserved` and `total` shrink by `amount`.
    pub async fn settle_out(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        ticker: &str,
        amount: i64,
        reference_id: Option<Uuid>,
    ) -> Result<Balance, EngineError> {
        Self::check_amount(amount)?;
        let row = Self::lock_row(tx, user_id, ticker).await?;
        if row.reserved < amount || row.total < amount {
            return Err(EngineError::Internal(format!(
                "settle_out {amount} exceeds total/reserved for {user_id}/{ticker}"
            )));
        }

        let updated = sqlx::query_as::<_, Balance>(
            "UPDATE balances SET reserved = reserved - $3, total = total - $3
             WHERE user_id = $1 AND ticker = $2
             RETURNING user_id, ticker, total, reserved",
        )
        .bind(user_id)
        .bind(ticker)
        .bind(amount)
        .fetch_one(&mut **tx)
        .await?;

        Self::record(tx, user_id, ticker, EntryKind::SettleOut, -amount, reference_id).await?;
        Ok(updated)
    }

    /// The counterparty asset of a fill arrives. No reservation involved
    /// on the receiving side.
    pub async fn credit_in(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        ticker: &str,
        amount: i64,
        reference_id: Option<Uuid>,
    ) -> Result<Balance, EngineError> {
        Self::check_amount(amount)?;
        let row = Self::lock_row(tx, user_id, ticker).await?;
        let new_total = row
            .total
            .checked_add(amount)
            .ok_or_else(|| EngineError::Internal("balance overflow on credit_in".into()))?;

        let updated = sqlx::query_as::<_, Balance>(
            "UPDATE balances SET total = $3 WHERE user_id = $1 AND ticker = $2
             RETURNING user_id, ticker, total, reserved",
        )
        .bind(user_id)
        .bind(ticker)
        .bind(new_total)
        .fetch_one(&mut **tx)
        .await?;

        Self::record(tx, user_id, ticker, EntryKind::CreditIn, amount, reference_id).await?;
        Ok(updated)
    }

    /// Both legs of a fill, locked in the fixed global order so that two
    /// concurrent crosses touching the same two (user, ticker) pairs from
    /// opposite directions cannot deadlock.
    #[allow(clippy::too_many_arguments)]
    pub async fn settle_cross(
        tx: &mut Transaction<'_, Postgres>,
        seller: Uuid,
        buyer: Uuid,
        ticker: &str,
        exec_qty: i64,
        cash_amount: i64,
        trade_id: Uuid,
    ) -> Result<(), EngineError> {
        let cash = crate::instrument::CASH;
        Self::lock_all(
            tx,
            vec![(seller, ticker), (buyer, ticker), (buyer, cash), (seller, cash)],
        )
        .await?;

        Self::settle_out(tx, seller, ticker, exec_qty, Some(trade_id)).await?;
        Self::credit_in(tx, buyer, ticker, exec_qty, Some(trade_id)).await?;
        Self::settle_out(tx, buyer, crate::instrument::CASH, cash_amount, Some(trade_id)).await?;
        Self::credit_in(tx, seller, crate::instrument::CASH, cash_amount, Some(trade_id)).await?;
        Ok(())
    }

    pub async fn read(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        ticker: &str,
    ) -> Result<(i64, i64), EngineError> {
        let balance = sqlx::query_as::<_, Balance>(
            "SELECT user_id, ticker, total, reserved FROM balances WHERE user_id = $1 AND ticker = $2",
        )
        .bind(user_id)
        .bind(ticker)
        .fetch_optional(&mut **tx)
        .await?
        .unwrap_or(Balance {
            user_id,
            ticker: ticker.to_string(),
            total: 0,
            reserved: 0,
        });
        Ok((balance.total, balance.reserved))
    }
}
