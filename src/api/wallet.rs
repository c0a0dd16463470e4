use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::AppState;
use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct WalletView {
    pub user_id: Uuid,
    pub balance: i64,
    pub total_earnings: i64,
    pub bonus_balance: i64,
    pub spin_points: i64,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
pub struct TransactionView {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub tx_type: String,
    pub amount: i64,
    pub description: String,
    pub status: String,
    pub metadata: serde_json::Value,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// GET /api/wallet/{user_id}
pub async fn get_wallet(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<WalletView>, ApiError> {
    let wallet = state
        .wallets
        .find_by_user(user_id)
        .await?
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "WALLET_NOT_FOUND", "Wallet not found"))?;

    Ok(Json(WalletView {
        user_id: wallet.user_id,
        balance: wallet.balance,
        total_earnings: wallet.total_earnings,
        bonus_balance: wallet.bonus_balance,
        spin_points: wallet.spin_points,
        updated_at: wallet.updated_at,
    }))
}

/// GET /api/wallet/{user_id}/transactions
pub async fn get_transactions(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<TransactionView>>, ApiError> {
    let transactions = state.transactions.find_for_user(user_id).await?;
    Ok(Json(
        transactions
            .into_iter()
            .map(|t| TransactionView {
                id: t.id,
                tx_type: t.r#type,
                amount: t.amount,
                description: t.description,
                status: t.status,
                metadata: t.metadata,
                created_at: t.created_at,
            })
            .collect(),
    ))
}
