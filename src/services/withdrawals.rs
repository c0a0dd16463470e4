use sqlx::PgPool;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

use crate::database::error::DatabaseError;
use crate::database::transaction_repository::TransactionType;
use crate::database::wallet_repository::WalletRepository;
use crate::database::withdrawal_repository::{Withdrawal, WithdrawalRepository};
use crate::payments::validate::{validate_amount, validate_phone};
use crate::payments::{MpesaClient, PaymentError};
use crate::services::ledger::{LedgerError, LedgerService};

#[derive(Debug, Error)]
pub enum WithdrawalError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("no wallet for user {user_id}")]
    WalletNotFound { user_id: Uuid },

    #[error("insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds { requested: i64, available: i64 },

    #[error("withdrawal {id} not found")]
    NotFound { id: Uuid },

    #[error("withdrawal {id} is {status}, not pending")]
    NotPending { id: Uuid, status: String },

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Gateway(#[from] PaymentError),
}

impl From<LedgerError> for WithdrawalError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientFunds {
                requested,
                available,
            } => WithdrawalError::InsufficientFunds {
                requested,
                available,
            },
            LedgerError::WalletNotFound { user_id } => WithdrawalError::WalletNotFound { user_id },
            LedgerError::InvalidAmount { amount } => WithdrawalError::Validation {
                message: format!("invalid withdrawal amount: {}", amount),
            },
            LedgerError::Database(e) => WithdrawalError::Database(e),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WithdrawalLimits {
    pub min_amount: i64,
    pub max_amount: i64,
}

/// Withdrawal lifecycle: user request -> admin approval/rejection. Approval
/// debits the wallet and flips the status in one database transaction, then
/// hands the payout to the gateway.
pub struct WithdrawalService {
    pool: PgPool,
    withdrawals: WithdrawalRepository,
    wallets: WalletRepository,
    mpesa: Arc<MpesaClient>,
    limits: WithdrawalLimits,
}

impl WithdrawalService {
    pub fn new(pool: PgPool, mpesa: Arc<MpesaClient>, limits: WithdrawalLimits) -> Self {
        Self {
            withdrawals: WithdrawalRepository::new(pool.clone()),
            wallets: WalletRepository::new(pool.clone()),
            pool,
            mpesa,
            limits,
        }
    }

    /// Create a pending withdrawal request. The balance is checked here for
    /// early feedback, but the authoritative check is the conditional debit
    /// at approval time.
    pub async fn request(
        &self,
        user_id: Uuid,
        phone_number: &str,
        amount: f64,
    ) -> Result<Withdrawal, WithdrawalError> {
        let phone = validate_phone(phone_number).map_err(|e| WithdrawalError::Validation {
            message: e.user_message(),
        })?;
        let amount = validate_amount(amount, self.limits.min_amount, self.limits.max_amount)
            .map_err(|e| WithdrawalError::Validation {
                message: e.user_message(),
            })?;

        let wallet = self
            .wallets
            .find_by_user(user_id)
            .await?
            .ok_or(WithdrawalError::WalletNotFound { user_id })?;
        if wallet.balance < amount {
            return Err(WithdrawalError::InsufficientFunds {
                requested: amount,
                available: wallet.balance,
            });
        }

        let withdrawal = self
            .withdrawals
            .create(user_id, amount, &phone, "mpesa")
            .await?;
        info!(
            withdrawal_id = %withdrawal.id,
            user_id = %user_id,
            amount,
            "withdrawal requested"
        );
        Ok(withdrawal)
    }

    /// Approve a pending withdrawal. The status flip, the wallet debit and
    /// the ledger append commit together; a failure in any of them leaves
    /// the request pending and the wallet untouched. A second approval of
    /// the same request fails with `NotPending`.
    pub async fn approve(
        &self,
        withdrawal_id: Uuid,
        processed_by: Uuid,
    ) -> Result<Withdrawal, WithdrawalError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;

        let withdrawal =
            match WithdrawalRepository::approve_if_pending(&mut tx, withdrawal_id, processed_by)
                .await?
            {
                Some(withdrawal) => withdrawal,
                None => {
                    tx.rollback().await.map_err(DatabaseError::from_sqlx)?;
                    return match self.withdrawals.find_by_id(withdrawal_id).await? {
                        Some(existing) => Err(WithdrawalError::NotPending {
                            id: withdrawal_id,
                            status: existing.status,
                        }),
                        None => Err(WithdrawalError::NotFound { id: withdrawal_id }),
                    };
                }
            };

        let metadata = serde_json::json!({
            "withdrawal_id": withdrawal.id,
            "phone_number": withdrawal.phone_number,
            "payment_method": withdrawal.payment_method,
        });
        LedgerService::debit_on(
            &mut tx,
            withdrawal.user_id,
            withdrawal.amount,
            TransactionType::Withdrawal,
            "Withdrawal approved",
            metadata,
        )
        .await?;

        tx.commit().await.map_err(DatabaseError::from_sqlx)?;
        info!(
            withdrawal_id = %withdrawal.id,
            user_id = %withdrawal.user_id,
            amount = withdrawal.amount,
            "withdrawal approved and debited"
        );

        // Payout happens after the commit: the wallet state is settled
        // either way, and the B2C result callback is the reconciliation
        // point for the transfer itself.
        if let Err(e) = self
            .mpesa
            .b2c_payment(
                &withdrawal.phone_number,
                withdrawal.amount,
                &format!("Withdrawal {}", withdrawal.id),
            )
            .await
        {
            error!(
                withdrawal_id = %withdrawal.id,
                error = %e,
                "B2C payout initiation failed after approval; requires operator action"
            );
        }

        Ok(withdrawal)
    }

    pub async fn reject(
        &self,
        withdrawal_id: Uuid,
        processed_by: Uuid,
        reason: &str,
    ) -> Result<Withdrawal, WithdrawalError> {
        let rejected = self
            .withdrawals
            .reject_if_pending(withdrawal_id, processed_by, reason)
            .await?;
        match rejected {
            Some(withdrawal) => {
                info!(withdrawal_id = %withdrawal.id, reason, "withdrawal rejected");
                Ok(withdrawal)
            }
            None => match self.withdrawals.find_by_id(withdrawal_id).await? {
                Some(existing) => Err(WithdrawalError::NotPending {
                    id: withdrawal_id,
                    status: existing.status,
                }),
                None => Err(WithdrawalError::NotFound { id: withdrawal_id }),
            },
        }
    }

    pub async fn list(&self, status: Option<&str>) -> Result<Vec<Withdrawal>, WithdrawalError> {
        Ok(self.withdrawals.list_by_status(status).await?)
    }
}
