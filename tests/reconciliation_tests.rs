//! Database-backed scenario tests. These run against a local Postgres with
//! the migrations applied and are ignored by default:
//!
//!     DATABASE_URL=postgres://... cargo test -- --ignored

#[cfg(test)]
mod reconciliation_tests {
    use serde_json::json;
    use sqlx::PgPool;
    use std::sync::Arc;
    use uuid::Uuid;

    use spincash_backend::database::intent_repository::PaymentIntentRepository;
    use spincash_backend::database::transaction_repository::{
        TransactionRepository, TransactionType,
    };
    use spincash_backend::database::wallet_repository::WalletRepository;
    use spincash_backend::database::withdrawal_repository::WithdrawalRepository;
    use spincash_backend::payments::{MpesaClient, MpesaConfig, MpesaEnvironment};
    use spincash_backend::services::ledger::{LedgerError, LedgerService};
    use spincash_backend::services::reconciler::{CallbackReconciler, ReconcileOutcome};
    use spincash_backend::services::withdrawals::{
        WithdrawalError, WithdrawalLimits, WithdrawalService,
    };

    async fn pool() -> PgPool {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        PgPool::connect(&url).await.expect("database reachable")
    }

    async fn seed_wallet(pool: &PgPool, balance: i64) -> Uuid {
        let user_id = Uuid::new_v4();
        sqlx::query("INSERT INTO wallets (user_id, balance) VALUES ($1, $2)")
            .bind(user_id)
            .bind(balance)
            .execute(pool)
            .await
            .expect("wallet seeded");
        user_id
    }

    fn sandbox_client() -> Arc<MpesaClient> {
        let config = MpesaConfig {
            consumer_key: "test".to_string(),
            consumer_secret: "test".to_string(),
            passkey: "test".to_string(),
            shortcode: "174379".to_string(),
            environment: MpesaEnvironment::Sandbox,
            callback_url: "https://example.com/api/mpesa/callback".to_string(),
            initiator_name: "SpinCash".to_string(),
            security_credential: "test".to_string(),
            timeout_secs: 2,
            max_retries: 0,
        };
        Arc::new(MpesaClient::new(config).expect("client init"))
    }

    fn stk_success(checkout_request_id: &str, amount: i64) -> serde_json::Value {
        json!({
            "Body": {
                "stkCallback": {
                    "MerchantRequestID": "29115-34620561-1",
                    "CheckoutRequestID": checkout_request_id,
                    "ResultCode": 0,
                    "ResultDesc": "Processed",
                    "CallbackMetadata": {
                        "Item": [
                            {"Name": "Amount", "Value": amount},
                            {"Name": "MpesaReceiptNumber", "Value": "NLJ7RT61SV"},
                            {"Name": "PhoneNumber", "Value": 254712345678u64}
                        ]
                    }
                }
            }
        })
    }

    #[tokio::test]
    #[ignore] // Requires database running
    async fn redelivered_callback_credits_exactly_once() {
        let pool = pool().await;
        let user_id = seed_wallet(&pool, 0).await;
        let checkout_id = format!("ws_CO_{}", Uuid::new_v4());

        let intents = PaymentIntentRepository::new(pool.clone());
        intents
            .create(&checkout_id, "merchant-1", user_id, 500, "deposit")
            .await
            .expect("intent created");

        let reconciler = CallbackReconciler::new(pool.clone());
        let payload = stk_success(&checkout_id, 500);

        let first = reconciler
            .process_stk_callback(&payload)
            .await
            .expect("first delivery processed");
        assert_eq!(first, ReconcileOutcome::Credited { user_id, amount: 500 });

        let second = reconciler
            .process_stk_callback(&payload)
            .await
            .expect("redelivery processed");
        assert_eq!(second, ReconcileOutcome::AlreadyProcessed);

        let wallet = WalletRepository::new(pool.clone())
            .find_by_user(user_id)
            .await
            .expect("wallet read")
            .expect("wallet exists");
        assert_eq!(wallet.balance, 500);
        assert_eq!(wallet.total_earnings, 500);

        // Exactly one ledger row for the two deliveries, carrying the
        // gateway receipt in its metadata.
        let deposits = TransactionRepository::new(pool.clone())
            .find_for_user(user_id)
            .await
            .expect("ledger read");
        assert_eq!(deposits.len(), 1);
        assert_eq!(deposits[0].r#type, "deposit");
        assert_eq!(deposits[0].amount, 500);
        assert_eq!(
            deposits[0].metadata.get("mpesa_receipt").and_then(|v| v.as_str()),
            Some("NLJ7RT61SV")
        );
    }

    #[tokio::test]
    #[ignore] // Requires database running
    async fn callback_for_unknown_checkout_id_credits_nothing() {
        let pool = pool().await;
        let reconciler = CallbackReconciler::new(pool.clone());
        let payload = stk_success(&format!("ws_CO_{}", Uuid::new_v4()), 500);

        let outcome = reconciler
            .process_stk_callback(&payload)
            .await
            .expect("processed");
        assert_eq!(outcome, ReconcileOutcome::UnknownIntent);
    }

    #[tokio::test]
    #[ignore] // Requires database running
    async fn concurrent_credits_lose_no_updates() {
        let pool = pool().await;
        let user_id = seed_wallet(&pool, 0).await;
        let ledger = Arc::new(LedgerService::new(pool.clone()));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger
                    .credit(user_id, 10, TransactionType::SpinReward, "Spin win", json!({}))
                    .await
            }));
        }
        for handle in handles {
            handle.await.expect("task joined").expect("credit succeeded");
        }

        let wallet = WalletRepository::new(pool.clone())
            .find_by_user(user_id)
            .await
            .expect("wallet read")
            .expect("wallet exists");
        assert_eq!(wallet.balance, 100);
    }

    #[tokio::test]
    #[ignore] // Requires database running
    async fn debit_never_overdraws() {
        let pool = pool().await;
        let user_id = seed_wallet(&pool, 300).await;
        let ledger = LedgerService::new(pool.clone());

        let err = ledger
            .debit(user_id, 400, TransactionType::Withdrawal, "Payout", json!({}))
            .await
            .expect_err("overdraw must fail");
        match err {
            LedgerError::InsufficientFunds {
                requested,
                available,
            } => {
                assert_eq!(requested, 400);
                assert_eq!(available, 300);
            }
            other => panic!("unexpected error: {other}"),
        }

        let wallet = WalletRepository::new(pool.clone())
            .find_by_user(user_id)
            .await
            .expect("wallet read")
            .expect("wallet exists");
        assert_eq!(wallet.balance, 300);
    }

    #[tokio::test]
    #[ignore] // Requires database running
    async fn concurrent_debits_cannot_overdraw() {
        let pool = pool().await;
        let user_id = seed_wallet(&pool, 500).await;
        let ledger = Arc::new(LedgerService::new(pool.clone()));

        // Five racing debits of 200 against a balance of 500: exactly two
        // can win, the rest must fail without touching the wallet.
        let mut handles = Vec::new();
        for _ in 0..5 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger
                    .debit(user_id, 200, TransactionType::Withdrawal, "Payout", json!({}))
                    .await
            }));
        }

        let mut succeeded = 0;
        for handle in handles {
            match handle.await.expect("task joined") {
                Ok(_) => succeeded += 1,
                Err(LedgerError::InsufficientFunds { .. }) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(succeeded, 2);

        let wallet = WalletRepository::new(pool.clone())
            .find_by_user(user_id)
            .await
            .expect("wallet read")
            .expect("wallet exists");
        assert_eq!(wallet.balance, 100);
        assert!(wallet.balance >= 0);
    }

    #[tokio::test]
    #[ignore] // Requires database running
    async fn approval_debits_once_and_rejects_replays() {
        let pool = pool().await;
        let user_id = seed_wallet(&pool, 1000).await;
        let admin_id = Uuid::new_v4();

        let service = WithdrawalService::new(
            pool.clone(),
            sandbox_client(),
            WithdrawalLimits {
                min_amount: 100,
                max_amount: 50_000,
            },
        );

        let request = WithdrawalRepository::new(pool.clone())
            .create(user_id, 400, "254712345678", "mpesa")
            .await
            .expect("request created");

        let approved = service
            .approve(request.id, admin_id)
            .await
            .expect("approval succeeds");
        assert_eq!(approved.status, "approved");

        let replay = service.approve(request.id, admin_id).await;
        assert!(matches!(
            replay,
            Err(WithdrawalError::NotPending { .. })
        ));

        let wallet = WalletRepository::new(pool.clone())
            .find_by_user(user_id)
            .await
            .expect("wallet read")
            .expect("wallet exists");
        assert_eq!(wallet.balance, 600);

        // One withdrawal ledger row, negative by the approved amount.
        let rows = TransactionRepository::new(pool.clone())
            .find_for_user(user_id)
            .await
            .expect("ledger read");
        let withdrawals: Vec<_> = rows.iter().filter(|t| t.r#type == "withdrawal").collect();
        assert_eq!(withdrawals.len(), 1);
        assert_eq!(withdrawals[0].amount, -400);
    }
}
