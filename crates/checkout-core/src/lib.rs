//! # checkout-core
//!
//! Domain core of the storefront checkout: the persisted order aggregate,
//! its step state machine, the railway [`Outcome`] type and the pure card
//! and contact validators.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      checkout-core                            │
//! │  ┌────────────┐  ┌──────────────┐  ┌──────────────────────┐  │
//! │  │ validation │  │ CheckoutState│  │   CheckoutStore      │  │
//! │  │  + form    │──│  (reducers)  │──│ (memory / JSON file) │  │
//! │  └────────────┘  └──────────────┘  └──────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing in this crate touches the network; remote calls live in
//! `checkout-gateway` and the step sequencing in `checkout-flow`.

pub mod cart;
pub mod error;
pub mod form;
pub mod outcome;
pub mod state;
pub mod store;
pub mod text;
pub mod validation;

pub use cart::{Cart, CartItem, CheckoutItem, Product};
pub use error::{CheckoutError, Result, STILL_PENDING_MESSAGE};
pub use form::{CardDetails, CheckoutForm, CustomerInfo, DeliveryInfo};
pub use outcome::Outcome;
pub use state::{CheckoutState, CheckoutStep, FeeSchedule, PaymentStatus};
pub use store::{CheckoutStore, FileCheckoutStore, MemoryCheckoutStore, SessionSnapshot, STORAGE_KEY};
pub use validation::CardType;
