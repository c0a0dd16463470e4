use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::http::{GatewayAuth, GatewayHttpClient};
use crate::payments::types::{
    AccessTokenResponse, B2cRequest, B2cResponse, StkPushRequest, StkPushResponse,
    StkQueryRequest, StkQueryResponse,
};
use crate::payments::validate::normalize_phone;
use base64::Engine;
use std::time::Duration;
use tracing::info;

const SANDBOX_BASE_URL: &str = "https://sandbox.safaricom.co.ke";
const PRODUCTION_BASE_URL: &str = "https://api.safaricom.co.ke";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpesaEnvironment {
    Sandbox,
    Production,
}

impl MpesaEnvironment {
    pub fn base_url(&self) -> &'static str {
        match self {
            MpesaEnvironment::Sandbox => SANDBOX_BASE_URL,
            MpesaEnvironment::Production => PRODUCTION_BASE_URL,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MpesaConfig {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub passkey: String,
    pub shortcode: String,
    pub environment: MpesaEnvironment,
    pub callback_url: String,
    pub initiator_name: String,
    /// Initiator password pre-encrypted with the gateway certificate. This
    /// service does not perform the encryption itself.
    pub security_credential: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl MpesaConfig {
    pub fn from_env() -> PaymentResult<Self> {
        let required = |name: &str| -> PaymentResult<String> {
            std::env::var(name)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| PaymentError::ValidationError {
                    message: format!("{} environment variable is required", name),
                    field: Some(name.to_string()),
                })
        };

        let environment = match std::env::var("MPESA_ENVIRONMENT")
            .unwrap_or_else(|_| "sandbox".to_string())
            .to_lowercase()
            .as_str()
        {
            "sandbox" => MpesaEnvironment::Sandbox,
            "production" => MpesaEnvironment::Production,
            other => {
                return Err(PaymentError::ValidationError {
                    message: format!("unknown MPESA_ENVIRONMENT: {}", other),
                    field: Some("MPESA_ENVIRONMENT".to_string()),
                })
            }
        };

        Ok(Self {
            consumer_key: required("MPESA_CONSUMER_KEY")?,
            consumer_secret: required("MPESA_CONSUMER_SECRET")?,
            passkey: required("MPESA_PASSKEY")?,
            shortcode: required("MPESA_SHORTCODE")?,
            environment,
            callback_url: required("MPESA_CALLBACK_URL")?,
            initiator_name: required("MPESA_INITIATOR_NAME")?,
            security_credential: required("MPESA_SECURITY_CREDENTIAL")?,
            timeout_secs: std::env::var("MPESA_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30),
            max_retries: std::env::var("MPESA_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(3),
        })
    }
}

/// Client for all outbound Daraja calls. Holds no mutable state; the access
/// token is fetched per operation since the gateway's tokens are short-lived
/// and the call volume here is low.
pub struct MpesaClient {
    config: MpesaConfig,
    http: GatewayHttpClient,
}

impl MpesaClient {
    pub fn new(config: MpesaConfig) -> PaymentResult<Self> {
        let http = GatewayHttpClient::new(Duration::from_secs(config.timeout_secs))?;
        Ok(Self { config, http })
    }

    pub fn from_env() -> PaymentResult<Self> {
        Self::new(MpesaConfig::from_env()?)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.environment.base_url(), path)
    }

    pub async fn get_access_token(&self) -> PaymentResult<String> {
        let response: AccessTokenResponse = self
            .http
            .request_json(
                reqwest::Method::GET,
                &self.endpoint("/oauth/v1/generate?grant_type=client_credentials"),
                GatewayAuth::Basic {
                    username: &self.config.consumer_key,
                    password: &self.config.consumer_secret,
                },
                None,
                self.config.max_retries,
            )
            .await
            .map_err(|e| match e {
                // Credential rejection is an auth failure, not a generic
                // gateway error; callers must not retry it blindly.
                PaymentError::GatewayRequestError {
                    message,
                    status_code: Some(code),
                    ..
                } if code == 400 || code == 401 || code == 403 => {
                    PaymentError::AuthError { message }
                }
                other => other,
            })?;

        Ok(response.access_token)
    }

    /// Initiate an STK push (Lipa Na M-PESA Online). The returned ack only
    /// confirms the prompt was queued; the result arrives on the callback.
    pub async fn stk_push(
        &self,
        phone_number: &str,
        amount: i64,
        account_reference: &str,
    ) -> PaymentResult<StkPushResponse> {
        let token = self.get_access_token().await?;
        let timestamp = self.timestamp();
        let password = self.password(&timestamp);
        let phone = normalize_phone(phone_number);

        let request = StkPushRequest {
            business_short_code: self.config.shortcode.clone(),
            password,
            timestamp,
            transaction_type: "CustomerPayBillOnline".to_string(),
            amount,
            party_a: phone.clone(),
            party_b: self.config.shortcode.clone(),
            phone_number: phone.clone(),
            callback_url: self.config.callback_url.clone(),
            account_reference: account_reference.to_string(),
            transaction_desc: "SpinCash Deposit".to_string(),
        };

        let payload = serde_json::to_value(&request).map_err(|e| {
            PaymentError::GatewayRequestError {
                message: format!("failed to encode STK push request: {}", e),
                status_code: None,
                retryable: false,
            }
        })?;

        // No retries: replaying an initiation after an ambiguous failure
        // could prompt the customer twice.
        let response: StkPushResponse = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint("/mpesa/stkpush/v1/processrequest"),
                GatewayAuth::Bearer(&token),
                Some(&payload),
                0,
            )
            .await?;

        info!(
            checkout_request_id = %response.checkout_request_id,
            phone = %phone,
            amount,
            "STK push initiated"
        );
        Ok(response)
    }

    /// Initiate a B2C disbursement to the customer's phone.
    pub async fn b2c_payment(
        &self,
        phone_number: &str,
        amount: i64,
        remarks: &str,
    ) -> PaymentResult<B2cResponse> {
        let token = self.get_access_token().await?;
        let phone = normalize_phone(phone_number);

        let request = B2cRequest {
            initiator_name: self.config.initiator_name.clone(),
            security_credential: self.config.security_credential.clone(),
            command_id: "BusinessPayment".to_string(),
            amount,
            party_a: self.config.shortcode.clone(),
            party_b: phone.clone(),
            remarks: remarks.to_string(),
            queue_timeout_url: format!("{}/timeout", self.config.callback_url),
            result_url: format!("{}/result", self.config.callback_url),
            occasion: "Withdrawal".to_string(),
        };

        let payload = serde_json::to_value(&request).map_err(|e| {
            PaymentError::GatewayRequestError {
                message: format!("failed to encode B2C request: {}", e),
                status_code: None,
                retryable: false,
            }
        })?;

        let response: B2cResponse = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint("/mpesa/b2c/v1/paymentrequest"),
                GatewayAuth::Bearer(&token),
                Some(&payload),
                0,
            )
            .await?;

        info!(
            conversation_id = response.conversation_id.as_deref().unwrap_or("-"),
            phone = %phone,
            amount,
            "B2C payment initiated"
        );
        Ok(response)
    }

    /// Poll the final state of a previously initiated STK push. Used when a
    /// callback has not arrived within the expected window.
    pub async fn query_stk_status(
        &self,
        checkout_request_id: &str,
    ) -> PaymentResult<StkQueryResponse> {
        let token = self.get_access_token().await?;
        let timestamp = self.timestamp();
        let password = self.password(&timestamp);

        let request = StkQueryRequest {
            business_short_code: self.config.shortcode.clone(),
            password,
            timestamp,
            checkout_request_id: checkout_request_id.to_string(),
        };

        let payload = serde_json::to_value(&request).map_err(|e| {
            PaymentError::GatewayRequestError {
                message: format!("failed to encode STK query request: {}", e),
                status_code: None,
                retryable: false,
            }
        })?;

        self.http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint("/mpesa/stkpushquery/v1/query"),
                GatewayAuth::Bearer(&token),
                Some(&payload),
                self.config.max_retries,
            )
            .await
    }

    fn timestamp(&self) -> String {
        chrono::Local::now().format("%Y%m%d%H%M%S").to_string()
    }

    fn password(&self, timestamp: &str) -> String {
        let data = format!("{}{}{}", self.config.shortcode, self.config.passkey, timestamp);
        base64::engine::general_purpose::STANDARD.encode(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MpesaConfig {
        MpesaConfig {
            consumer_key: "key".to_string(),
            consumer_secret: "secret".to_string(),
            passkey: "bfb279f9aa9bdbcf158e97dd71a467cd2e0c893059b10f78e6b72ada1ed2c919"
                .to_string(),
            shortcode: "174379".to_string(),
            environment: MpesaEnvironment::Sandbox,
            callback_url: "https://example.com/api/mpesa/callback".to_string(),
            initiator_name: "SpinCash".to_string(),
            security_credential: "ENCRYPTED".to_string(),
            timeout_secs: 5,
            max_retries: 1,
        }
    }

    #[test]
    fn environment_selects_base_url() {
        assert_eq!(
            MpesaEnvironment::Sandbox.base_url(),
            "https://sandbox.safaricom.co.ke"
        );
        assert_eq!(
            MpesaEnvironment::Production.base_url(),
            "https://api.safaricom.co.ke"
        );
    }

    #[test]
    fn password_is_base64_of_shortcode_passkey_timestamp() {
        let client = MpesaClient::new(config()).expect("client init should succeed");
        let password = client.password("20250820154707");
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(password)
            .expect("password should be valid base64");
        let decoded = String::from_utf8(decoded).expect("password should be utf8");
        assert!(decoded.starts_with("174379"));
        assert!(decoded.ends_with("20250820154707"));
    }

    #[test]
    fn timestamp_has_gateway_format() {
        let client = MpesaClient::new(config()).expect("client init should succeed");
        let ts = client.timestamp();
        assert_eq!(ts.len(), 14);
        assert!(ts.chars().all(|c| c.is_ascii_digit()));
    }
}
