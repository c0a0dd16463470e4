use serde_json::Value as JsonValue;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::database::callback_repository::{CallbackKind, CallbackRepository};
use crate::database::error::DatabaseError;
use crate::database::intent_repository::PaymentIntentRepository;
use crate::database::transaction_repository::TransactionType;
use crate::services::ledger::{LedgerError, LedgerService};

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("malformed callback payload: {0}")]
    MalformedPayload(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// What a single callback delivery amounted to. Only used for logging and
/// tests; the gateway always receives the same success acknowledgment.
#[derive(Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Wallet credited and ledger row written.
    Credited { user_id: Uuid, amount: i64 },
    /// The intent was already credited or failed; redelivery is a no-op.
    AlreadyProcessed,
    /// Gateway reported a non-zero result code (cancelled, timed out...).
    PaymentFailed { result_code: i64 },
    /// No payment intent matches the checkout request id.
    UnknownIntent,
}

/// Applies asynchronous gateway notifications to wallets.
///
/// Transport receipt and business success are deliberately separate concerns:
/// the webhook handler acknowledges every delivery, and any failure in here
/// is logged for operators rather than returned to the gateway, which would
/// only trigger redelivery storms.
pub struct CallbackReconciler {
    pool: PgPool,
    intents: PaymentIntentRepository,
    callbacks: CallbackRepository,
}

impl CallbackReconciler {
    pub fn new(pool: PgPool) -> Self {
        Self {
            intents: PaymentIntentRepository::new(pool.clone()),
            callbacks: CallbackRepository::new(pool.clone()),
            pool,
        }
    }

    /// Handle an STK push result notification.
    ///
    /// The raw payload is audit-logged whatever happens; the credit itself is
    /// one database transaction in which claiming the pending intent is the
    /// idempotency gate.
    pub async fn process_stk_callback(
        &self,
        payload: &JsonValue,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let envelope: crate::payments::types::StkCallbackEnvelope =
            serde_json::from_value(payload.clone()).map_err(|e| {
                // Unparseable payloads still get an audit row.
                ReconcileError::MalformedPayload(e.to_string())
            })?;
        let callback = envelope.body.stk_callback;

        let outcome = if callback.is_success() {
            self.credit_from_callback(&callback).await
        } else {
            info!(
                checkout_request_id = %callback.checkout_request_id,
                result_code = callback.result_code,
                result_desc = %callback.result_desc,
                "STK push did not complete"
            );
            self.intents
                .mark_failed(&callback.checkout_request_id)
                .await?;
            Ok(ReconcileOutcome::PaymentFailed {
                result_code: callback.result_code,
            })
        };

        self.callbacks
            .record(
                CallbackKind::StkResult,
                Some(&callback.merchant_request_id),
                Some(&callback.checkout_request_id),
                Some(callback.result_code),
                Some(&callback.result_desc),
                payload,
                outcome.is_ok(),
            )
            .await?;

        outcome
    }

    async fn credit_from_callback(
        &self,
        callback: &crate::payments::types::StkCallback,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let details = callback
            .callback_metadata
            .as_ref()
            .map(|m| m.pivot())
            .unwrap_or_default();

        let mut tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;

        let intent = match PaymentIntentRepository::claim_pending(
            &mut tx,
            &callback.checkout_request_id,
        )
        .await?
        {
            Some(intent) => intent,
            None => {
                tx.rollback().await.map_err(DatabaseError::from_sqlx)?;
                return match self.intents.find(&callback.checkout_request_id).await? {
                    Some(_) => {
                        info!(
                            checkout_request_id = %callback.checkout_request_id,
                            "callback redelivered for settled intent, skipping credit"
                        );
                        Ok(ReconcileOutcome::AlreadyProcessed)
                    }
                    None => {
                        warn!(
                            checkout_request_id = %callback.checkout_request_id,
                            "success callback with no matching payment intent"
                        );
                        Ok(ReconcileOutcome::UnknownIntent)
                    }
                };
            }
        };

        // The gateway's reported amount is authoritative for the credit; the
        // intent amount is what we asked for.
        let amount = details.amount.unwrap_or(intent.amount);
        if amount != intent.amount {
            warn!(
                checkout_request_id = %callback.checkout_request_id,
                requested = intent.amount,
                confirmed = amount,
                "callback amount differs from initiated amount"
            );
        }

        let metadata = serde_json::json!({
            "mpesa_receipt": details.mpesa_receipt,
            "phone_number": details.phone_number,
            "transaction_date": details.transaction_date,
            "merchant_request_id": callback.merchant_request_id,
            "checkout_request_id": callback.checkout_request_id,
        });

        let (wallet, _record) = LedgerService::credit_on(
            &mut tx,
            intent.user_id,
            amount,
            TransactionType::Deposit,
            "M-Pesa deposit",
            metadata,
        )
        .await?;

        tx.commit().await.map_err(DatabaseError::from_sqlx)?;

        info!(
            user_id = %intent.user_id,
            amount,
            balance = wallet.balance,
            receipt = details.mpesa_receipt.as_deref().unwrap_or("-"),
            "deposit reconciled"
        );
        Ok(ReconcileOutcome::Credited {
            user_id: intent.user_id,
            amount,
        })
    }

    /// B2C result notifications are audit-logged but not yet wired to a
    /// withdrawal state transition.
    pub async fn process_b2c_result(&self, payload: &JsonValue) -> Result<(), ReconcileError> {
        let result = payload.get("Result");
        let conversation_id = result
            .and_then(|r| r.get("ConversationID"))
            .and_then(|v| v.as_str());
        let result_code = result.and_then(|r| r.get("ResultCode")).and_then(|v| v.as_i64());
        let result_desc = result
            .and_then(|r| r.get("ResultDesc"))
            .and_then(|v| v.as_str());

        info!(
            conversation_id = conversation_id.unwrap_or("-"),
            result_code = result_code.unwrap_or(-1),
            "B2C result received"
        );
        // ConversationID is the B2C correlation id; it fills the audit row's
        // merchant_request_id slot for this callback kind.
        self.callbacks
            .record(
                CallbackKind::B2cResult,
                conversation_id,
                None,
                result_code,
                result_desc,
                payload,
                true,
            )
            .await?;
        Ok(())
    }

    pub async fn process_b2c_timeout(&self, payload: &JsonValue) -> Result<(), ReconcileError> {
        warn!("B2C request timed out in the gateway queue");
        self.callbacks
            .record(CallbackKind::B2cTimeout, None, None, None, None, payload, true)
            .await?;
        Ok(())
    }

    /// Audit trail for payloads that did not even parse; called by the
    /// webhook handler before acknowledging.
    pub async fn record_malformed(&self, kind: CallbackKind, payload: &JsonValue) {
        if let Err(e) = self
            .callbacks
            .record(kind, None, None, None, None, payload, false)
            .await
        {
            error!(error = %e, "failed to audit-log malformed callback");
        }
    }
}
