//! Session configuration parsed from environment variables.

use std::time::Duration;

use crate::error::ErrorCode;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:4000";
pub const DEFAULT_API_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_API_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?}")]
    InvalidValue { var: String, value: String },
    #[error("invalid API base URL {0:?} (expected http:// or https://)")]
    InvalidBaseUrl(String),
}

impl ErrorCode for ConfigError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidValue { .. } => "E_CONFIG_VALUE",
            Self::InvalidBaseUrl(_) => "E_CONFIG_BASE_URL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiTimeouts {
    pub request: Duration,
    pub connect: Duration,
}

impl Default for ApiTimeouts {
    fn default() -> Self {
        Self {
            request: Duration::from_secs(DEFAULT_API_REQUEST_TIMEOUT_SECS),
            connect: Duration::from_secs(DEFAULT_API_CONNECT_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub api_base_url: String,
    pub timeouts: ApiTimeouts,
}

impl SessionConfig {
    /// Build typed session config from environment variables.
    ///
    /// Optional:
    /// - `QUICKHIRE_API_BASE_URL`: default `http://localhost:4000`
    /// - `QUICKHIRE_API_REQUEST_TIMEOUT_SECS`: default 30
    /// - `QUICKHIRE_API_CONNECT_TIMEOUT_SECS`: default 10
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a value is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw_url = std::env::var("QUICKHIRE_API_BASE_URL").unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string());
        let api_base_url = normalize_base_url(&raw_url)?;
        let timeouts = ApiTimeouts {
            request: Duration::from_secs(env_secs("QUICKHIRE_API_REQUEST_TIMEOUT_SECS", DEFAULT_API_REQUEST_TIMEOUT_SECS)?),
            connect: Duration::from_secs(env_secs("QUICKHIRE_API_CONNECT_TIMEOUT_SECS", DEFAULT_API_CONNECT_TIMEOUT_SECS)?),
        };
        Ok(Self { api_base_url, timeouts })
    }

    /// Same as [`SessionConfig::from_env`] but with an explicit base URL
    /// taking precedence (used by the CLI's `--base-url`).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the URL or a timeout is invalid.
    pub fn with_base_url(mut self, raw_url: &str) -> Result<Self, ConfigError> {
        self.api_base_url = normalize_base_url(raw_url)?;
        Ok(self)
    }
}

/// Trim surrounding whitespace and trailing slashes, and require an HTTP scheme.
pub fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(ConfigError::InvalidBaseUrl(raw.to_string()));
    }
    Ok(trimmed.to_string())
}

fn env_secs(key: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidValue { var: key.to_string(), value: raw }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
