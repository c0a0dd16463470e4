use thiserror::Error;

pub type PaymentResult<T> = Result<T, PaymentError>;

#[derive(Debug, Clone, Error)]
pub enum PaymentError {
    #[error("Validation error: {message}")]
    ValidationError {
        message: String,
        field: Option<String>,
    },

    #[error("Gateway authentication failed: {message}")]
    AuthError { message: String },

    #[error("Gateway request failed: {message}")]
    GatewayRequestError {
        message: String,
        status_code: Option<u16>,
        retryable: bool,
    },

    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Rate limit exceeded: {message}")]
    RateLimitError {
        message: String,
        retry_after_seconds: Option<u64>,
    },
}

impl PaymentError {
    pub fn is_retryable(&self) -> bool {
        match self {
            PaymentError::ValidationError { .. } => false,
            PaymentError::AuthError { .. } => false,
            PaymentError::GatewayRequestError { retryable, .. } => *retryable,
            PaymentError::NetworkError { .. } => true,
            PaymentError::RateLimitError { .. } => true,
        }
    }

    pub fn http_status_code(&self) -> u16 {
        match self {
            PaymentError::ValidationError { .. } => 400,
            PaymentError::AuthError { .. } => 502,
            PaymentError::GatewayRequestError { .. } => 502,
            PaymentError::NetworkError { .. } => 503,
            PaymentError::RateLimitError { .. } => 429,
        }
    }

    /// Message safe to return to end users. Raw gateway bodies stay internal.
    pub fn user_message(&self) -> String {
        match self {
            PaymentError::ValidationError { message, .. } => message.clone(),
            PaymentError::AuthError { .. } => "Payment provider is unavailable".to_string(),
            PaymentError::GatewayRequestError { .. } => {
                "Payment request could not be completed. Please try again".to_string()
            }
            PaymentError::NetworkError { .. } => {
                "Payment provider is temporarily unreachable".to_string()
            }
            PaymentError::RateLimitError { .. } => {
                "Too many payment requests. Please retry shortly".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_http_status_mapping_is_correct() {
        assert_eq!(
            PaymentError::ValidationError {
                message: "bad".to_string(),
                field: None
            }
            .http_status_code(),
            400
        );
        assert_eq!(
            PaymentError::AuthError {
                message: "rejected".to_string()
            }
            .http_status_code(),
            502
        );
        assert_eq!(
            PaymentError::GatewayRequestError {
                message: "HTTP 500".to_string(),
                status_code: Some(500),
                retryable: true
            }
            .http_status_code(),
            502
        );
    }

    #[test]
    fn retryable_flags_are_set() {
        assert!(PaymentError::NetworkError {
            message: "timeout".to_string()
        }
        .is_retryable());
        assert!(!PaymentError::AuthError {
            message: "invalid credentials".to_string()
        }
        .is_retryable());
    }

    #[test]
    fn gateway_errors_do_not_leak_raw_bodies() {
        let err = PaymentError::GatewayRequestError {
            message: "HTTP 500: {\"errorMessage\":\"internal diagnostic\"}".to_string(),
            status_code: Some(500),
            retryable: true,
        };
        assert!(!err.user_message().contains("diagnostic"));
    }
}
