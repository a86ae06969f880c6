//! Gateway Error Types

use checkout_core::CheckoutError;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Remote-call errors
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Backend answered with a non-success status; carries its message
    #[error("{0}")]
    Remote(String),

    /// Tokenization service rejected the card; carries the normalized message
    #[error("{0}")]
    Tokenization(String),

    /// Transport or decoding failure
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl GatewayError {
    /// Check if this error is retryable
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

impl From<GatewayError> for CheckoutError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Remote(msg) => Self::Remote(msg),
            GatewayError::Tokenization(msg) => Self::Tokenization(msg),
            GatewayError::Network(e) => Self::Remote(format!("Network error: {e}")),
            GatewayError::Config(msg) => Self::Config(msg),
        }
    }
}
