use crate::constants::*;
use std::env;
use time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: String,
    pub data_path: String,
    pub session_secret: String,
    pub cors_origin: String,
    pub reset_token_ttl: Duration,
    /// Echo freshly issued reset tokens in the API response. Development only,
    /// since no mailer is wired in.
    pub expose_reset_tokens: bool,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("SESSION_SECRET environment variable is required")]
    MissingSessionSecret,

    #[error("Invalid session secret: {0}")]
    InvalidSessionSecret(String),

    #[error("Invalid port number: {0}")]
    InvalidPort(String),

    #[error("Invalid reset token lifetime: {0}")]
    InvalidResetTokenTtl(String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env::var("SERVER_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
        let port = env::var("SERVER_PORT").unwrap_or_else(|_| DEFAULT_PORT.to_string());
        let data_path = env::var("DATABASE_PATH").unwrap_or_else(|_| DEFAULT_DATA_PATH.to_string());
        let cors_origin =
            env::var("CORS_ORIGIN").unwrap_or_else(|_| DEFAULT_CORS_ORIGIN.to_string());

        // Validate port is a valid number
        if port.parse::<u16>().is_err() {
            return Err(ConfigError::InvalidPort(port));
        }

        let session_secret =
            env::var("SESSION_SECRET").map_err(|_| ConfigError::MissingSessionSecret)?;
        validate_session_secret(&session_secret)?;

        let reset_token_ttl = match env::var("RESET_TOKEN_TTL_MINUTES") {
            Ok(raw) => parse_ttl_minutes(&raw)?,
            Err(_) => Duration::minutes(DEFAULT_RESET_TOKEN_TTL_MINUTES),
        };

        let expose_reset_tokens = env::var("EXPOSE_RESET_TOKENS")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Config {
            host,
            port,
            data_path,
            session_secret,
            cors_origin,
            reset_token_ttl,
            expose_reset_tokens,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

pub fn validate_session_secret(secret: &str) -> Result<(), ConfigError> {
    if secret.as_bytes().len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InvalidSessionSecret(format!(
            "must be at least {} bytes long",
            MIN_SESSION_SECRET_LENGTH
        )));
    }
    Ok(())
}

pub fn parse_ttl_minutes(raw: &str) -> Result<Duration, ConfigError> {
    match raw.trim().parse::<i64>() {
        Ok(minutes) if minutes > 0 => Ok(Duration::minutes(minutes)),
        _ => Err(ConfigError::InvalidResetTokenTtl(raw.to_string())),
    }
}
