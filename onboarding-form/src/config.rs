//! Environment configuration for the Vault API client

use std::env;
use std::time::Duration;

use thiserror::Error;

/// Production Vault API
pub const DEFAULT_API_URL: &str = "https://fe-hometask-api.dev.vault.tryvault.com";

/// HTTP request timeout unless overridden
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("VAULT_API_URL must not be empty")]
    EmptyApiUrl,
    #[error("VAULT_API_TIMEOUT_SECS must be a whole number of seconds, got {0:?}")]
    InvalidTimeout(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Base URL without a trailing slash
    pub api_url: String,
    /// `None` means requests never time out
    pub timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            timeout: Some(DEFAULT_TIMEOUT),
        }
    }
}

impl Config {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Read `VAULT_API_URL` and `VAULT_API_TIMEOUT_SECS` from the environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_url = match lookup("VAULT_API_URL") {
            Some(url) if url.trim().is_empty() => return Err(ConfigError::EmptyApiUrl),
            Some(url) => url.trim().trim_end_matches('/').to_string(),
            None => DEFAULT_API_URL.to_string(),
        };

        let timeout = match lookup("VAULT_API_TIMEOUT_SECS") {
            None => Some(DEFAULT_TIMEOUT),
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(0) => None,
                Ok(secs) => Some(Duration::from_secs(secs)),
                Err(_) => return Err(ConfigError::InvalidTimeout(raw)),
            },
        };

        Ok(Self { api_url, timeout })
    }
}
