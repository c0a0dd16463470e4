use crate::database::error::DatabaseError;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

pub const WITHDRAWAL_PENDING: &str = "pending";
pub const WITHDRAWAL_APPROVED: &str = "approved";
pub const WITHDRAWAL_REJECTED: &str = "rejected";

/// Withdrawal request row. Status moves pending -> approved | rejected
/// exactly once; the transitions are conditional updates so a second admin
/// action on the same request affects zero rows.
#[derive(Debug, Clone, FromRow)]
pub struct Withdrawal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: i64,
    pub phone_number: String,
    pub payment_method: String,
    pub status: String,
    pub rejection_reason: Option<String>,
    pub processed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub processed_by: Option<Uuid>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

pub struct WithdrawalRepository {
    pool: PgPool,
}

impl WithdrawalRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        user_id: Uuid,
        amount: i64,
        phone_number: &str,
        payment_method: &str,
    ) -> Result<Withdrawal, DatabaseError> {
        sqlx::query_as::<_, Withdrawal>(
            "INSERT INTO withdrawals (user_id, amount, phone_number, payment_method, status)
             VALUES ($1, $2, $3, $4, 'pending')
             RETURNING id, user_id, amount, phone_number, payment_method, status,
                       rejection_reason, processed_at, processed_by, created_at",
        )
        .bind(user_id)
        .bind(amount)
        .bind(phone_number)
        .bind(payment_method)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Withdrawal>, DatabaseError> {
        sqlx::query_as::<_, Withdrawal>(
            "SELECT id, user_id, amount, phone_number, payment_method, status,
                    rejection_reason, processed_at, processed_by, created_at
             FROM withdrawals
             WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn list_by_status(
        &self,
        status: Option<&str>,
    ) -> Result<Vec<Withdrawal>, DatabaseError> {
        match status {
            Some(status) => sqlx::query_as::<_, Withdrawal>(
                "SELECT id, user_id, amount, phone_number, payment_method, status,
                        rejection_reason, processed_at, processed_by, created_at
                 FROM withdrawals
                 WHERE status = $1
                 ORDER BY created_at DESC",
            )
            .bind(status)
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx),
            None => sqlx::query_as::<_, Withdrawal>(
                "SELECT id, user_id, amount, phone_number, payment_method, status,
                        rejection_reason, processed_at, processed_by, created_at
                 FROM withdrawals
                 ORDER BY created_at DESC",
            )
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx),
        }
    }

    /// Flip pending -> approved. Returns `None` when the request is missing
    /// or already processed. Runs on the approval transaction's connection
    /// so the flip rolls back if the debit fails.
    pub async fn approve_if_pending(
        conn: &mut PgConnection,
        id: Uuid,
        processed_by: Uuid,
    ) -> Result<Option<Withdrawal>, DatabaseError> {
        sqlx::query_as::<_, Withdrawal>(
            "UPDATE withdrawals
             SET status = 'approved', processed_at = NOW(), processed_by = $2
             WHERE id = $1 AND status = 'pending'
             RETURNING id, user_id, amount, phone_number, payment_method, status,
                       rejection_reason, processed_at, processed_by, created_at",
        )
        .bind(id)
        .bind(processed_by)
        .fetch_optional(conn)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn reject_if_pending(
        &self,
        id: Uuid,
        processed_by: Uuid,
        reason: &str,
    ) -> Result<Option<Withdrawal>, DatabaseError> {
        sqlx::query_as::<_, Withdrawal>(
            "UPDATE withdrawals
             SET status = 'rejected', processed_at = NOW(), processed_by = $2,
                 rejection_reason = $3
             WHERE id = $1 AND status = 'pending'
             RETURNING id, user_id, amount, phone_number, payment_method, status,
                       rejection_reason, processed_at, processed_by, created_at",
        )
        .bind(id)
        .bind(processed_by)
        .bind(reason)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}
