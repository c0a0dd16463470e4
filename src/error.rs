//! Error responses at the API boundary.
//!
//! Internal errors are mapped to a consistent JSON shape with an HTTP status
//! and a machine-readable code. Raw gateway or database detail never reaches
//! clients; it stays in the logs.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Serialize;

use crate::database::error::DatabaseError;
use crate::payments::PaymentError;
use crate::services::ledger::LedgerError;
use crate::services::withdrawals::WithdrawalError;

/// Standardized error response structure
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Machine-readable error code
    pub error: &'static str,

    /// Human-readable error message
    pub message: String,

    /// ISO 8601 timestamp of the error
    pub timestamp: String,

    /// Whether the client should retry the request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub retryable: Option<bool>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            retryable: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
    }

    pub fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            "An internal server error occurred. Please try again later.",
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.code,
            message: self.message,
            timestamp: Utc::now().to_rfc3339(),
            retryable: self.retryable,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        let status = StatusCode::from_u16(err.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let code = match &err {
            PaymentError::ValidationError { .. } => "VALIDATION_ERROR",
            PaymentError::AuthError { .. } => "PAYMENT_PROVIDER_ERROR",
            PaymentError::GatewayRequestError { .. } => "PAYMENT_PROVIDER_ERROR",
            PaymentError::NetworkError { .. } => "PAYMENT_PROVIDER_ERROR",
            PaymentError::RateLimitError { .. } => "RATE_LIMIT_ERROR",
        };
        Self {
            status,
            code,
            message: err.user_message(),
            retryable: Some(err.is_retryable()),
        }
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        tracing::error!(error = %err, "database error at API boundary");
        Self::internal()
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientFunds {
                requested,
                available,
            } => Self::new(
                StatusCode::BAD_REQUEST,
                "INSUFFICIENT_FUNDS",
                format!(
                    "Insufficient funds: requested {} KES, available {} KES",
                    requested, available
                ),
            ),
            LedgerError::WalletNotFound { .. } => {
                Self::new(StatusCode::NOT_FOUND, "WALLET_NOT_FOUND", "Wallet not found")
            }
            LedgerError::InvalidAmount { .. } => Self::validation("Amount must be positive"),
            LedgerError::Database(e) => e.into(),
        }
    }
}

impl From<WithdrawalError> for ApiError {
    fn from(err: WithdrawalError) -> Self {
        match err {
            WithdrawalError::Validation { message } => Self::validation(message),
            WithdrawalError::WalletNotFound { .. } => {
                Self::new(StatusCode::NOT_FOUND, "WALLET_NOT_FOUND", "Wallet not found")
            }
            WithdrawalError::InsufficientFunds {
                requested,
                available,
            } => Self::new(
                StatusCode::BAD_REQUEST,
                "INSUFFICIENT_FUNDS",
                format!(
                    "You cannot withdraw more than your available balance ({} KES requested, {} KES available)",
                    requested, available
                ),
            ),
            WithdrawalError::NotFound { .. } => Self::new(
                StatusCode::NOT_FOUND,
                "WITHDRAWAL_NOT_FOUND",
                "Withdrawal request not found",
            ),
            WithdrawalError::NotPending { status, .. } => Self::new(
                StatusCode::CONFLICT,
                "WITHDRAWAL_ALREADY_PROCESSED",
                format!("Withdrawal has already been processed (status: {})", status),
            ),
            WithdrawalError::Database(e) => e.into(),
            WithdrawalError::Gateway(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_errors_map_to_gateway_statuses() {
        let err: ApiError = PaymentError::AuthError {
            message: "rejected".to_string(),
        }
        .into();
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
        assert_eq!(err.code, "PAYMENT_PROVIDER_ERROR");
    }

    #[test]
    fn insufficient_funds_is_a_client_error() {
        let err: ApiError = WithdrawalError::InsufficientFunds {
            requested: 600,
            available: 400,
        }
        .into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.code, "INSUFFICIENT_FUNDS");
    }

    #[test]
    fn repeated_approval_maps_to_conflict() {
        let err: ApiError = WithdrawalError::NotPending {
            id: uuid::Uuid::new_v4(),
            status: "approved".to_string(),
        }
        .into();
        assert_eq!(err.status, StatusCode::CONFLICT);
    }

    #[test]
    fn database_errors_are_masked() {
        let err: ApiError = DatabaseError::Query {
            message: "relation wallets does not exist".to_string(),
        }
        .into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.message.contains("wallets"));
    }
}
