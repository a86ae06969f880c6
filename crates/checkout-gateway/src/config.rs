//! Gateway Configuration

use std::time::Duration;

use crate::error::{GatewayError, Result};

/// Sandbox endpoint of the tokenization service
pub const DEFAULT_TOKENIZER_URL: &str = "https://api-sandbox.co.uat.wompi.dev/v1";

fn timeout_from_env() -> u64 {
    std::env::var("CHECKOUT_HTTP_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(30)
}

/// Payment backend configuration
#[derive(Clone, Debug)]
pub struct BackendConfig {
    /// Backend base URL
    pub api_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:3000".into(),
            timeout_secs: 30,
        }
    }
}

impl BackendConfig {
    pub fn from_env() -> Self {
        let api_url = std::env::var("CHECKOUT_API_URL")
            .unwrap_or_else(|_| "http://localhost:3000".into());

        Self {
            api_url,
            timeout_secs: timeout_from_env(),
        }
    }

    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Card tokenization service configuration
#[derive(Clone, Debug)]
pub struct TokenizerConfig {
    /// Tokenization API base URL
    pub api_url: String,

    /// Public (client-side) key sent as bearer credential
    pub public_key: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl TokenizerConfig {
    pub fn new(public_key: impl Into<String>) -> Self {
        Self {
            api_url: DEFAULT_TOKENIZER_URL.into(),
            public_key: public_key.into(),
            timeout_secs: 30,
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let public_key = std::env::var("WOMPI_PUBLIC_KEY")
            .map_err(|_| GatewayError::Config("WOMPI_PUBLIC_KEY not set".into()))?;
        let api_url = std::env::var("WOMPI_API_URL")
            .unwrap_or_else(|_| DEFAULT_TOKENIZER_URL.into());

        Ok(Self {
            api_url,
            public_key,
            timeout_secs: timeout_from_env(),
        })
    }

    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
