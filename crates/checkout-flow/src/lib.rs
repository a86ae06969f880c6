//! # checkout-flow
//!
//! Sequences a purchase across the checkout steps and resolves payments the
//! bank confirms asynchronously.
//!
//! - [`CheckoutFlow`] - step state machine, payment railway and recovery
//! - [`AdaptivePoller`] - escalating status checks for a pending payment
//!
//! ## Usage
//!
//! ```rust,ignore
//! let mut flow = CheckoutFlow::new(backend.clone(), tokenizer, store);
//! flow.start_checkout(items)?;
//! flow.submit_card_and_delivery(&form).await?;
//!
//! if flow.process_payment().await? == PaymentStatus::Pending {
//!     let mut poller = AdaptivePoller::new(backend);
//!     flow.await_settlement(&mut poller).await?;
//! }
//! ```

pub mod orchestrator;
pub mod poller;

pub use orchestrator::{CheckoutFlow, DECLINED_BY_BANK, Recovery};
pub use poller::{AdaptivePoller, POLL_PHASES, PollOutcome, PollPhase, PollProgress};
