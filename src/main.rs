use std::net::SocketAddr;
use std::sync::Arc;

use tokio::signal;
use tracing::{error, info};

use spincash_backend::api::{self, AppState};
use spincash_backend::config::AppConfig;
use spincash_backend::database::{
    health_check, init_pool_from_config,
    intent_repository::PaymentIntentRepository,
    transaction_repository::TransactionRepository,
    wallet_repository::WalletRepository,
};
use spincash_backend::logging::init_tracing;
use spincash_backend::payments::MpesaClient;
use spincash_backend::services::reconciler::CallbackReconciler;
use spincash_backend::services::withdrawals::{WithdrawalLimits, WithdrawalService};

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().map_err(|e| anyhow::anyhow!("configuration error: {e}"))?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("configuration error: {e}"))?;

    init_tracing(&config.logging);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = ?config.mpesa.environment,
        "Starting SpinCash backend service"
    );

    let pool = init_pool_from_config(&config.database).await.map_err(|e| {
        error!("Failed to initialize database pool: {}", e);
        anyhow::anyhow!(e)
    })?;
    health_check(&pool).await?;
    info!("Database connection pool initialized");

    let mpesa = Arc::new(MpesaClient::new(config.mpesa.clone()).map_err(|e| {
        error!("Failed to initialize M-Pesa client: {}", e);
        anyhow::anyhow!(e)
    })?);

    let state = Arc::new(AppState {
        reconciler: CallbackReconciler::new(pool.clone()),
        withdrawals: WithdrawalService::new(
            pool.clone(),
            mpesa.clone(),
            WithdrawalLimits {
                min_amount: config.limits.min_withdrawal,
                max_amount: config.limits.max_withdrawal,
            },
        ),
        intents: PaymentIntentRepository::new(pool.clone()),
        wallets: WalletRepository::new(pool.clone()),
        transactions: TransactionRepository::new(pool.clone()),
        limits: config.limits.clone(),
        mpesa,
        pool,
    });

    let app = api::router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!("Failed to bind to address {}: {}", addr, e);
        e
    })?;

    info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
