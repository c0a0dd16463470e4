use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::api::AppState;
use crate::database::callback_repository::CallbackKind;
use crate::error::ApiError;
use crate::payments::types::{CallbackAck, StkPushResponse, StkQueryResponse};
use crate::payments::validate::{validate_amount, validate_phone};
use crate::services::reconciler::ReconcileError;

#[derive(Debug, Deserialize)]
pub struct DepositRequest {
    pub phone_number: String,
    pub amount: f64,
    pub user_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct DepositResponse {
    pub success: bool,
    pub message: &'static str,
    pub data: StkPushResponse,
}

/// POST /api/mpesa/deposit
///
/// Initiates an STK push and records the payment intent that the callback
/// reconciler will later resolve. A 200 here means the prompt was queued,
/// not that money moved.
pub async fn deposit(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DepositRequest>,
) -> Result<Json<DepositResponse>, ApiError> {
    let phone = validate_phone(&request.phone_number)?;
    let amount = validate_amount(
        request.amount,
        state.limits.min_deposit,
        state.limits.max_deposit,
    )?;

    let reference = format!(
        "DEPOSIT_{}_{}",
        request.user_id,
        chrono::Utc::now().timestamp_millis()
    );
    let ack = state.mpesa.stk_push(&phone, amount, &reference).await?;

    // The persisted intent, not the account reference, is what links the
    // asynchronous callback back to this user.
    state
        .intents
        .create(
            &ack.checkout_request_id,
            &ack.merchant_request_id,
            request.user_id,
            amount,
            "deposit",
        )
        .await?;

    info!(
        user_id = %request.user_id,
        checkout_request_id = %ack.checkout_request_id,
        amount,
        "deposit initiated"
    );
    Ok(Json(DepositResponse {
        success: true,
        message: "STK push sent. Complete the payment on your phone",
        data: ack,
    }))
}

/// GET /api/mpesa/query/{checkout_request_id}
pub async fn query_status(
    State(state): State<Arc<AppState>>,
    Path(checkout_request_id): Path<String>,
) -> Result<Json<StkQueryResponse>, ApiError> {
    let status = state.mpesa.query_stk_status(&checkout_request_id).await?;
    Ok(Json(status))
}

/// POST /api/mpesa/callback
///
/// The gateway's delivery contract: any non-zero acknowledgment triggers
/// redelivery, so this handler always acknowledges receipt. Reconciliation
/// failures are logged and audit-trailed for operators instead.
pub async fn stk_callback(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<JsonValue>,
) -> Json<CallbackAck> {
    match state.reconciler.process_stk_callback(&payload).await {
        Ok(outcome) => {
            info!(?outcome, "STK callback processed");
        }
        Err(ReconcileError::MalformedPayload(reason)) => {
            error!(reason = %reason, "unparseable STK callback");
            state
                .reconciler
                .record_malformed(CallbackKind::StkResult, &payload)
                .await;
        }
        Err(e) => {
            error!(error = %e, "STK callback reconciliation failed");
        }
    }
    Json(CallbackAck::received())
}

/// POST /api/mpesa/callback/result
pub async fn b2c_result_callback(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<JsonValue>,
) -> Json<CallbackAck> {
    if let Err(e) = state.reconciler.process_b2c_result(&payload).await {
        error!(error = %e, "failed to record B2C result callback");
    }
    Json(CallbackAck::received())
}

/// POST /api/mpesa/callback/timeout
pub async fn b2c_timeout_callback(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<JsonValue>,
) -> Json<CallbackAck> {
    if let Err(e) = state.reconciler.process_b2c_timeout(&payload).await {
        error!(error = %e, "failed to record B2C timeout callback");
    }
    Json(CallbackAck::received())
}
