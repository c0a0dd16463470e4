use crate::database::error::DatabaseError;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

/// Per-user wallet row. Amounts are whole KES.
///
/// Wallets are created at user registration by the accounts service; this
/// repository only reads and mutates existing rows.
#[derive(Debug, Clone, FromRow)]
pub struct Wallet {
    pub user_id: Uuid,
    pub balance: i64,
    pub total_earnings: i64,
    pub bonus_balance: i64,
    pub spin_points: i64,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

pub struct WalletRepository {
    pool: PgPool,
}

impl WalletRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_user(&self, user_id: Uuid) -> Result<Option<Wallet>, DatabaseError> {
        sqlx::query_as::<_, Wallet>(
            "SELECT user_id, balance, total_earnings, bonus_balance, spin_points, updated_at
             FROM wallets
             WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Credit `amount` to both balance and lifetime earnings as a single
    /// atomic increment. Runs on a caller-provided connection so it can join
    /// a transaction with the ledger append.
    pub async fn credit(
        conn: &mut PgConnection,
        user_id: Uuid,
        amount: i64,
    ) -> Result<Option<Wallet>, DatabaseError> {
        sqlx::query_as::<_, Wallet>(
            "UPDATE wallets
             SET balance = balance + $2,
                 total_earnings = total_earnings + $2,
                 updated_at = NOW()
             WHERE user_id = $1
             RETURNING user_id, balance, total_earnings, bonus_balance, spin_points, updated_at",
        )
        .bind(user_id)
        .bind(amount)
        .fetch_optional(conn)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Conditional debit: the balance check and the decrement are one
    /// statement, so concurrent debits can never overdraw. Returns `None`
    /// when the wallet is missing or the balance does not cover `amount`.
    pub async fn debit_if_sufficient(
        conn: &mut PgConnection,
        user_id: Uuid,
        amount: i64,
    ) -> Result<Option<Wallet>, DatabaseError> {
        sqlx::query_as::<_, Wallet>(
            "UPDATE wallets
             SET balance = balance - $2,
                 updated_at = NOW()
             WHERE user_id = $1 AND balance >= $2
             RETURNING user_id, balance, total_earnings, bonus_balance, spin_points, updated_at",
        )
        .bind(user_id)
        .bind(amount)
        .fetch_optional(conn)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}
