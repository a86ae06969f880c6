//! # checkout-gateway
//!
//! Remote collaborators of the checkout:
//!
//! - **Payment backend** - customers, transactions, acceptance tokens,
//!   payment submission and status checks ([`PaymentBackend`])
//! - **Card tokenizer** - exchanges raw card data for an opaque token
//!   ([`CardTokenizer`])
//!
//! ## Usage
//!
//! ```rust,ignore
//! use checkout_gateway::{HttpPaymentBackend, WompiTokenizer};
//!
//! let backend = HttpPaymentBackend::from_env()?;
//! let tokenizer = WompiTokenizer::from_env()?;
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod mock;
pub mod tokenizer;

pub use backend::{
    AcceptanceToken, CreateTransactionRequest, CustomerRecord, HttpPaymentBackend, PaymentBackend,
    PaymentResponse, ProcessPaymentRequest, TransactionItem, TransactionRecord, extract_api_error,
};
pub use config::{BackendConfig, TokenizerConfig};
pub use error::{GatewayError, Result};
pub use mock::{MockPaymentBackend, MockTokenizer, StatusReply};
pub use tokenizer::{CardToken, CardTokenizer, WompiTokenizer, check_card_details, extract_tokenization_error};
