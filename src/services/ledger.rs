use sqlx::{PgConnection, PgPool};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::database::error::DatabaseError;
use crate::database::transaction_repository::{Transaction, TransactionRepository, TransactionType};
use crate::database::wallet_repository::{Wallet, WalletRepository};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("amount must be positive, got {amount}")]
    InvalidAmount { amount: i64 },

    #[error("no wallet for user {user_id}")]
    WalletNotFound { user_id: Uuid },

    #[error("insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds { requested: i64, available: i64 },

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// The read-modify-write balance mutation shared by every earning and
/// spending pathway. Each operation is one database transaction: the wallet
/// increment and the ledger append commit or roll back together, and the
/// increment itself is a single atomic statement, so concurrent operations
/// against the same wallet cannot lose updates.
pub struct LedgerService {
    pool: PgPool,
}

impl LedgerService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Credit `amount` to balance and lifetime earnings, recording a ledger
    /// row of type `tx_type`.
    pub async fn credit(
        &self,
        user_id: Uuid,
        amount: i64,
        tx_type: TransactionType,
        description: &str,
        metadata: serde_json::Value,
    ) -> Result<(Wallet, Transaction), LedgerError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;
        let result =
            Self::credit_on(&mut tx, user_id, amount, tx_type, description, metadata).await?;
        tx.commit().await.map_err(DatabaseError::from_sqlx)?;
        Ok(result)
    }

    /// Credit on an existing transaction's connection. Used directly by the
    /// callback reconciler so the idempotency claim joins the same unit.
    pub async fn credit_on(
        conn: &mut PgConnection,
        user_id: Uuid,
        amount: i64,
        tx_type: TransactionType,
        description: &str,
        metadata: serde_json::Value,
    ) -> Result<(Wallet, Transaction), LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount { amount });
        }

        let wallet = WalletRepository::credit(conn, user_id, amount)
            .await?
            .ok_or(LedgerError::WalletNotFound { user_id })?;
        let record =
            TransactionRepository::append(conn, user_id, tx_type, amount, description, metadata)
                .await?;

        info!(
            user_id = %user_id,
            amount,
            tx_type = %tx_type,
            balance = wallet.balance,
            "wallet credited"
        );
        Ok((wallet, record))
    }

    /// Debit `amount` from the balance. The balance check and the decrement
    /// are one conditional statement; a losing concurrent debit fails with
    /// `InsufficientFunds` and changes nothing.
    pub async fn debit(
        &self,
        user_id: Uuid,
        amount: i64,
        tx_type: TransactionType,
        description: &str,
        metadata: serde_json::Value,
    ) -> Result<(Wallet, Transaction), LedgerError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;
        let result =
            Self::debit_on(&mut tx, user_id, amount, tx_type, description, metadata).await?;
        tx.commit().await.map_err(DatabaseError::from_sqlx)?;
        Ok(result)
    }

    /// Debit on an existing transaction's connection. Used by withdrawal
    /// approval so the status flip and the debit are one atomic unit.
    pub async fn debit_on(
        conn: &mut PgConnection,
        user_id: Uuid,
        amount: i64,
        tx_type: TransactionType,
        description: &str,
        metadata: serde_json::Value,
    ) -> Result<(Wallet, Transaction), LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount { amount });
        }

        let wallet = match WalletRepository::debit_if_sufficient(conn, user_id, amount).await? {
            Some(wallet) => wallet,
            None => {
                // Zero rows: either no wallet or balance < amount. Re-read
                // for the error detail; the authoritative check already
                // happened in the conditional update.
                let available: Option<i64> =
                    sqlx::query_scalar("SELECT balance FROM wallets WHERE user_id = $1")
                        .bind(user_id)
                        .fetch_optional(&mut *conn)
                        .await
                        .map_err(DatabaseError::from_sqlx)?;
                return match available {
                    Some(available) => Err(LedgerError::InsufficientFunds {
                        requested: amount,
                        available,
                    }),
                    None => Err(LedgerError::WalletNotFound { user_id }),
                };
            }
        };

        let record =
            TransactionRepository::append(conn, user_id, tx_type, -amount, description, metadata)
                .await?;

        info!(
            user_id = %user_id,
            amount,
            tx_type = %tx_type,
            balance = wallet.balance,
            "wallet debited"
        );
        Ok((wallet, record))
    }
}
