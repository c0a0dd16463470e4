use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::AppState;
use crate::database::withdrawal_repository::Withdrawal;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct CreateWithdrawalRequest {
    pub user_id: Uuid,
    pub phone_number: String,
    pub amount: f64,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApproveRequest {
    pub processed_by: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub processed_by: Uuid,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct WithdrawalView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: i64,
    pub phone_number: String,
    pub payment_method: String,
    pub status: String,
    pub rejection_reason: Option<String>,
    pub processed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<Withdrawal> for WithdrawalView {
    fn from(w: Withdrawal) -> Self {
        Self {
            id: w.id,
            user_id: w.user_id,
            amount: w.amount,
            phone_number: w.phone_number,
            payment_method: w.payment_method,
            status: w.status,
            rejection_reason: w.rejection_reason,
            processed_at: w.processed_at,
            created_at: w.created_at,
        }
    }
}

/// POST /api/withdrawals
pub async fn request(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateWithdrawalRequest>,
) -> Result<Json<WithdrawalView>, ApiError> {
    let withdrawal = state
        .withdrawals
        .request(request.user_id, &request.phone_number, request.amount)
        .await?;
    Ok(Json(withdrawal.into()))
}

/// GET /api/withdrawals?status=pending
pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<WithdrawalView>>, ApiError> {
    let withdrawals = state.withdrawals.list(params.status.as_deref()).await?;
    Ok(Json(withdrawals.into_iter().map(Into::into).collect()))
}

/// PUT /api/withdrawals/{id}/approve
pub async fn approve(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<ApproveRequest>,
) -> Result<Json<WithdrawalView>, ApiError> {
    let withdrawal = state.withdrawals.approve(id, request.processed_by).await?;
    Ok(Json(withdrawal.into()))
}

/// PUT /api/withdrawals/{id}/reject
pub async fn reject(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<RejectRequest>,
) -> Result<Json<WithdrawalView>, ApiError> {
    let withdrawal = state
        .withdrawals
        .reject(id, request.processed_by, &request.reason)
        .await?;
    Ok(Json(withdrawal.into()))
}
