use crate::database::error::DatabaseError;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

/// Persisted mapping from the gateway's `CheckoutRequestID` to the
/// originating user and amount, created at STK initiation. This is the only
/// linkage between an asynchronous callback and the request that caused it;
/// the account-reference string sent to the gateway is treated as opaque.
///
/// The pending -> credited transition doubles as the idempotency gate:
/// redelivered callbacks find the intent already credited and skip the
/// wallet mutation.
#[derive(Debug, Clone, FromRow)]
pub struct PaymentIntent {
    pub checkout_request_id: String,
    pub merchant_request_id: String,
    pub user_id: Uuid,
    pub amount: i64,
    pub purpose: String,
    pub status: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

pub const INTENT_PENDING: &str = "pending";
pub const INTENT_CREDITED: &str = "credited";
pub const INTENT_FAILED: &str = "failed";

pub struct PaymentIntentRepository {
    pool: PgPool,
}

impl PaymentIntentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        checkout_request_id: &str,
        merchant_request_id: &str,
        user_id: Uuid,
        amount: i64,
        purpose: &str,
    ) -> Result<PaymentIntent, DatabaseError> {
        sqlx::query_as::<_, PaymentIntent>(
            "INSERT INTO payment_intents
             (checkout_request_id, merchant_request_id, user_id, amount, purpose, status)
             VALUES ($1, $2, $3, $4, $5, 'pending')
             RETURNING checkout_request_id, merchant_request_id, user_id, amount, purpose,
                       status, created_at, updated_at",
        )
        .bind(checkout_request_id)
        .bind(merchant_request_id)
        .bind(user_id)
        .bind(amount)
        .bind(purpose)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn find(
        &self,
        checkout_request_id: &str,
    ) -> Result<Option<PaymentIntent>, DatabaseError> {
        sqlx::query_as::<_, PaymentIntent>(
            "SELECT checkout_request_id, merchant_request_id, user_id, amount, purpose,
                    status, created_at, updated_at
             FROM payment_intents
             WHERE checkout_request_id = $1",
        )
        .bind(checkout_request_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Claim the intent for crediting. Returns `None` if the intent does not
    /// exist or is no longer pending, in which case the caller must not
    /// credit. Runs on the crediting transaction's connection so the claim
    /// rolls back if the credit fails.
    pub async fn claim_pending(
        conn: &mut PgConnection,
        checkout_request_id: &str,
    ) -> Result<Option<PaymentIntent>, DatabaseError> {
        sqlx::query_as::<_, PaymentIntent>(
            "UPDATE payment_intents
             SET status = 'credited', updated_at = NOW()
             WHERE checkout_request_id = $1 AND status = 'pending'
             RETURNING checkout_request_id, merchant_request_id, user_id, amount, purpose,
                       status, created_at, updated_at",
        )
        .bind(checkout_request_id)
        .fetch_optional(conn)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Mark a pending intent failed (push declined, cancelled or timed out).
    pub async fn mark_failed(
        &self,
        checkout_request_id: &str,
    ) -> Result<Option<PaymentIntent>, DatabaseError> {
        sqlx::query_as::<_, PaymentIntent>(
            "UPDATE payment_intents
             SET status = 'failed', updated_at = NOW()
             WHERE checkout_request_id = $1 AND status = 'pending'
             RETURNING checkout_request_id, merchant_request_id, user_id, amount, purpose,
                       status, created_at, updated_at",
        )
        .bind(checkout_request_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}
