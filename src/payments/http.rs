use crate::payments::error::{PaymentError, PaymentResult};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::warn;

/// Authentication scheme for an outbound gateway call.
pub enum GatewayAuth<'a> {
    Basic { username: &'a str, password: &'a str },
    Bearer(&'a str),
}

#[derive(Clone)]
pub struct GatewayHttpClient {
    client: Client,
    timeout: Duration,
}

impl GatewayHttpClient {
    pub fn new(timeout: Duration) -> PaymentResult<Self> {
        let client =
            Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| PaymentError::NetworkError {
                    message: format!("failed to initialize HTTP client: {}", e),
                })?;

        Ok(Self { client, timeout })
    }

    /// Issue a JSON request with bounded retries on 5xx/429.
    ///
    /// `max_retries` is per call: initiation requests (STK push, B2C) are not
    /// safe to replay after an ambiguous server error, so their callers pass
    /// zero; token fetches and status queries retry.
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        url: &str,
        auth: GatewayAuth<'_>,
        body: Option<&JsonValue>,
        max_retries: u32,
    ) -> PaymentResult<T> {
        let mut last_error = None;
        for attempt in 0..=max_retries {
            let mut request = self.client.request(method.clone(), url);
            request = request.timeout(self.timeout);

            request = match &auth {
                GatewayAuth::Basic { username, password } => {
                    request.basic_auth(username, Some(password))
                }
                GatewayAuth::Bearer(token) => request.bearer_auth(token),
            };
            if let Some(payload) = body {
                request = request.json(payload);
            }

            let response = request
                .send()
                .await
                .map_err(|e| PaymentError::NetworkError {
                    message: format!("gateway request failed: {}", e),
                });

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    let text = resp.text().await.unwrap_or_default();
                    if status.is_success() {
                        return serde_json::from_str::<T>(&text).map_err(|e| {
                            PaymentError::GatewayRequestError {
                                message: format!("invalid gateway JSON response: {}", e),
                                status_code: Some(status.as_u16()),
                                retryable: false,
                            }
                        });
                    }

                    if status.as_u16() == 429 {
                        if attempt < max_retries {
                            tokio::time::sleep(backoff_delay(attempt)).await;
                            continue;
                        }
                        return Err(PaymentError::RateLimitError {
                            message: "gateway rate limit exceeded".to_string(),
                            retry_after_seconds: None,
                        });
                    }

                    if status.is_server_error() && attempt < max_retries {
                        warn!(
                            status = %status,
                            attempt = attempt + 1,
                            "gateway server error, retrying"
                        );
                        tokio::time::sleep(backoff_delay(attempt)).await;
                        continue;
                    }

                    return Err(PaymentError::GatewayRequestError {
                        message: format!("HTTP {}: {}", status, text),
                        status_code: Some(status.as_u16()),
                        retryable: status.is_server_error(),
                    });
                }
                Err(e) => {
                    last_error = Some(e);
                    if attempt < max_retries {
                        tokio::time::sleep(backoff_delay(attempt)).await;
                        continue;
                    }
                }
            }
        }

        Err(last_error.unwrap_or(PaymentError::NetworkError {
            message: "gateway request failed".to_string(),
        }))
    }
}

/// Exponential backoff capped at 64 seconds. The exponent is clamped so a
/// misconfigured retry count cannot overflow the shift.
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << attempt.min(6))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        assert_eq!(backoff_delay(0), Duration::from_secs(1));
        assert_eq!(backoff_delay(1), Duration::from_secs(2));
        assert_eq!(backoff_delay(3), Duration::from_secs(8));
    }

    #[test]
    fn backoff_is_capped_for_large_retry_counts() {
        assert_eq!(backoff_delay(6), Duration::from_secs(64));
        assert_eq!(backoff_delay(63), Duration::from_secs(64));
        assert_eq!(backoff_delay(u32::MAX), Duration::from_secs(64));
    }
}
