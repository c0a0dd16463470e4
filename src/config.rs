//! Application configuration module
//! Handles environment variable loading, configuration validation, and application settings

use std::env;

use crate::payments::MpesaConfig;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub mpesa: MpesaConfig,
    pub limits: LimitsConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout: u64,   // seconds
    pub idle_timeout: Option<u64>, // seconds
}

/// Deposit and withdrawal bounds, whole KES
#[derive(Debug, Clone)]
pub struct LimitsConfig {
    pub min_deposit: i64,
    pub max_deposit: i64,
    pub min_withdrawal: i64,
    pub max_withdrawal: i64,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log format options
#[derive(Debug, Clone)]
pub enum LogFormat {
    Json,
    Plain,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenv::dotenv().ok();

        Ok(AppConfig {
            server: ServerConfig::from_env()?,
            database: DatabaseConfig::from_env()?,
            mpesa: MpesaConfig::from_env()
                .map_err(|e| ConfigError::ValidationFailed(e.to_string()))?,
            limits: LimitsConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
        })
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.database.validate()?;
        self.limits.validate()?;
        self.logging.validate()?;

        Ok(())
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(ServerConfig {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".to_string()))?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidValue(
                "SERVER_PORT cannot be 0".to_string(),
            ));
        }

        if self.host.is_empty() {
            return Err(ConfigError::InvalidValue(
                "SERVER_HOST cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(DatabaseConfig {
            url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::MissingVariable("DATABASE_URL".to_string()))?,
            max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()))?,
            min_connections: env::var("DB_MIN_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_MIN_CONNECTIONS".to_string()))?,
            connection_timeout: env::var("DB_CONNECTION_TIMEOUT")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_CONNECTION_TIMEOUT".to_string()))?,
            idle_timeout: env::var("DB_IDLE_TIMEOUT")
                .ok()
                .and_then(|val| val.parse().ok()),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::InvalidValue("DATABASE_URL".to_string()));
        }

        if self.max_connections == 0 {
            return Err(ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()));
        }

        if self.min_connections > self.max_connections {
            return Err(ConfigError::InvalidValue(
                "DB_MIN_CONNECTIONS must be <= DB_MAX_CONNECTIONS".to_string(),
            ));
        }

        Ok(())
    }
}

impl LimitsConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let parse = |name: &str, default: &str| -> Result<i64, ConfigError> {
            env::var(name)
                .unwrap_or_else(|_| default.to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue(name.to_string()))
        };

        Ok(LimitsConfig {
            min_deposit: parse("MIN_DEPOSIT_AMOUNT", "10")?,
            max_deposit: parse("MAX_DEPOSIT_AMOUNT", "150000")?,
            min_withdrawal: parse("MIN_WITHDRAWAL_AMOUNT", "100")?,
            max_withdrawal: parse("MAX_WITHDRAWAL_AMOUNT", "50000")?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_deposit <= 0 || self.min_withdrawal <= 0 {
            return Err(ConfigError::InvalidValue(
                "minimum amounts must be positive".to_string(),
            ));
        }
        if self.min_deposit > self.max_deposit {
            return Err(ConfigError::InvalidValue(
                "MIN_DEPOSIT_AMOUNT must be <= MAX_DEPOSIT_AMOUNT".to_string(),
            ));
        }
        if self.min_withdrawal > self.max_withdrawal {
            return Err(ConfigError::InvalidValue(
                "MIN_WITHDRAWAL_AMOUNT must be <= MAX_WITHDRAWAL_AMOUNT".to_string(),
            ));
        }

        Ok(())
    }
}

impl LoggingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "INFO".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "plain".to_string())
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Plain,
            },
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["TRACE", "DEBUG", "INFO", "WARN", "ERROR"];
        if !valid_levels.contains(&self.level.to_uppercase().as_str()) {
            return Err(ConfigError::InvalidValue("LOG_LEVEL".to_string()));
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),

    #[error("Invalid value for configuration: {0}")]
    InvalidValue(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_config_validation_accepts_defaults() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8000,
        };

        assert!(config.validate().is_ok());
    }

    #[test]
    fn invalid_port_fails_validation() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn inverted_limit_bounds_fail_validation() {
        let config = LimitsConfig {
            min_deposit: 200_000,
            max_deposit: 150_000,
            min_withdrawal: 100,
            max_withdrawal: 50_000,
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn default_limits_are_valid() {
        let config = LimitsConfig {
            min_deposit: 10,
            max_deposit: 150_000,
            min_withdrawal: 100,
            max_withdrawal: 50_000,
        };

        assert!(config.validate().is_ok());
    }
}
