//! Error Types

use thiserror::Error;

use crate::state::CheckoutStep;

/// Shown when polling gives up while the bank may still settle the payment
pub const STILL_PENDING_MESSAGE: &str =
    "Your payment is still being processed. You will receive an email with the result.";

/// Result type alias for checkout operations
pub type Result<T> = std::result::Result<T, CheckoutError>;

/// Checkout error taxonomy
#[derive(Error, Debug)]
pub enum CheckoutError {
    /// Client-side validation failed; never reaches the network
    #[error("Validation error: {0}")]
    Validation(String),

    /// Card tokenization service rejected the card or was unreachable
    #[error("Tokenization error: {0}")]
    Tokenization(String),

    /// Backend call returned a non-success response or failed in transit
    #[error("Remote error: {0}")]
    Remote(String),

    /// Payment submission failed with a decline
    #[error("Payment declined: {0}")]
    Declined(String),

    /// Status polling ran through every phase without a terminal status
    #[error("Payment still pending after polling timed out")]
    TimeoutExhausted,

    /// Step change outside the checkout state machine
    #[error("Invalid step transition: {from} -> {to}")]
    InvalidTransition { from: CheckoutStep, to: CheckoutStep },

    /// Persisted session is past its expiry
    #[error("Checkout session expired")]
    Expired,

    /// Persistence backend failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CheckoutError {
    /// Check if error is retryable
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Remote(_) | Self::Tokenization(_) | Self::Storage(_) | Self::Io(_)
        )
    }

    /// Whether the user stays on the current step after this error
    pub const fn keeps_step(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::Tokenization(_) | Self::InvalidTransition { .. }
        )
    }

    /// Convert to a short user-facing message
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(msg) | Self::Tokenization(msg) | Self::Remote(msg) | Self::Declined(msg) => {
                msg.clone()
            }
            Self::TimeoutExhausted => STILL_PENDING_MESSAGE.into(),
            Self::InvalidTransition { .. } => "That action is not available right now.".into(),
            Self::Expired => "Your checkout session expired. Please start again.".into(),
            Self::Config(_) => "Service configuration error.".into(),
            _ => "An unexpected error occurred.".into(),
        }
    }
}
