use crate::database::error::DatabaseError;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

/// Balance-affecting event categories. Stored as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    SpinReward,
    QuizReward,
    GameReward,
    ReferralCommission,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "deposit",
            TransactionType::Withdrawal => "withdrawal",
            TransactionType::SpinReward => "spin_reward",
            TransactionType::QuizReward => "quiz_reward",
            TransactionType::GameReward => "game_reward",
            TransactionType::ReferralCommission => "referral_commission",
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Append-only audit record of a wallet mutation. `amount` is signed:
/// negative for withdrawals. Rows are never updated or deleted.
#[derive(Debug, Clone, FromRow)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub r#type: String,
    pub amount: i64,
    pub description: String,
    pub status: String,
    pub metadata: serde_json::Value,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

pub struct TransactionRepository {
    pool: PgPool,
}

impl TransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append a ledger row on a caller-provided connection, so it commits or
    /// rolls back together with the wallet mutation it records.
    pub async fn append(
        conn: &mut PgConnection,
        user_id: Uuid,
        tx_type: TransactionType,
        amount: i64,
        description: &str,
        metadata: serde_json::Value,
    ) -> Result<Transaction, DatabaseError> {
        sqlx::query_as::<_, Transaction>(
            "INSERT INTO transactions (user_id, type, amount, description, status, metadata)
             VALUES ($1, $2, $3, $4, 'completed', $5)
             RETURNING id, user_id, type, amount, description, status, metadata, created_at",
        )
        .bind(user_id)
        .bind(tx_type.as_str())
        .bind(amount)
        .bind(description)
        .bind(metadata)
        .fetch_one(conn)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn find_for_user(&self, user_id: Uuid) -> Result<Vec<Transaction>, DatabaseError> {
        sqlx::query_as::<_, Transaction>(
            "SELECT id, user_id, type, amount, description, status, metadata, created_at
             FROM transactions
             WHERE user_id = $1
             ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_types_serialize_to_snake_case() {
        assert_eq!(TransactionType::Deposit.as_str(), "deposit");
        assert_eq!(TransactionType::SpinReward.as_str(), "spin_reward");
        assert_eq!(
            TransactionType::ReferralCommission.as_str(),
            "referral_commission"
        );
    }
}
