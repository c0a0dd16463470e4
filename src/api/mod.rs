pub mod mpesa;
pub mod wallet;
pub mod withdrawals;

use axum::{
    routing::{get, post, put},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::config::LimitsConfig;
use crate::database::intent_repository::PaymentIntentRepository;
use crate::database::transaction_repository::TransactionRepository;
use crate::database::wallet_repository::WalletRepository;
use crate::payments::MpesaClient;
use crate::services::reconciler::CallbackReconciler;
use crate::services::withdrawals::WithdrawalService;

/// Shared handler state. Everything is constructed once at startup and
/// injected; nothing reads configuration from the environment at request
/// time.
pub struct AppState {
    pub pool: PgPool,
    pub mpesa: Arc<MpesaClient>,
    pub reconciler: CallbackReconciler,
    pub withdrawals: WithdrawalService,
    pub intents: PaymentIntentRepository,
    pub wallets: WalletRepository,
    pub transactions: TransactionRepository,
    pub limits: LimitsConfig,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/mpesa/deposit", post(mpesa::deposit))
        .route(
            "/api/mpesa/query/{checkout_request_id}",
            get(mpesa::query_status),
        )
        .route("/api/mpesa/callback", post(mpesa::stk_callback))
        .route("/api/mpesa/callback/result", post(mpesa::b2c_result_callback))
        .route(
            "/api/mpesa/callback/timeout",
            post(mpesa::b2c_timeout_callback),
        )
        .route(
            "/api/withdrawals",
            get(withdrawals::list).post(withdrawals::request),
        )
        .route("/api/withdrawals/{id}/approve", put(withdrawals::approve))
        .route("/api/withdrawals/{id}/reject", put(withdrawals::reject))
        .route("/api/wallet/{user_id}", get(wallet::get_wallet))
        .route(
            "/api/wallet/{user_id}/transactions",
            get(wallet::get_transactions),
        )
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
}

async fn health(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
) -> Result<&'static str, crate::error::ApiError> {
    crate::database::health_check(&state.pool).await?;
    Ok("OK")
}
