use crate::database::error::DatabaseError;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Which webhook endpoint received the notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackKind {
    StkResult,
    B2cResult,
    B2cTimeout,
}

impl CallbackKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallbackKind::StkResult => "stk_result",
            CallbackKind::B2cResult => "b2c_result",
            CallbackKind::B2cTimeout => "b2c_timeout",
        }
    }
}

/// Raw-payload audit row for every inbound gateway notification. Write-only;
/// kept for debugging and manual replay, never read by business logic.
#[derive(Debug, Clone, FromRow)]
pub struct GatewayCallback {
    pub id: Uuid,
    pub kind: String,
    pub merchant_request_id: Option<String>,
    pub checkout_request_id: Option<String>,
    pub result_code: Option<i64>,
    pub result_desc: Option<String>,
    pub payload: serde_json::Value,
    pub processed: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

pub struct CallbackRepository {
    pool: PgPool,
}

impl CallbackRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn record(
        &self,
        kind: CallbackKind,
        merchant_request_id: Option<&str>,
        checkout_request_id: Option<&str>,
        result_code: Option<i64>,
        result_desc: Option<&str>,
        payload: &serde_json::Value,
        processed: bool,
    ) -> Result<GatewayCallback, DatabaseError> {
        sqlx::query_as::<_, GatewayCallback>(
            "INSERT INTO mpesa_callbacks
             (kind, merchant_request_id, checkout_request_id, result_code, result_desc,
              payload, processed)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING id, kind, merchant_request_id, checkout_request_id, result_code,
                       result_desc, payload, processed, created_at",
        )
        .bind(kind.as_str())
        .bind(merchant_request_id)
        .bind(checkout_request_id)
        .bind(result_code)
        .bind(result_desc)
        .bind(payload)
        .bind(processed)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}
