//! Checkout State
//!
//! The single serializable aggregate holding an in-progress order. Every
//! mutation goes through one of the reducer methods below; each stamps
//! `last_updated` so the persisted copy tells how fresh it is.
//!
//! ```text
//!  Idle(1) ──▶ CardAndDelivery(2) ◀──▶ Summary(3) ──▶ Processing(3.5) ──▶ Result(4)
//!                                          │                                ▲
//!                                          └────────────────────────────────┘
//!  any ──reset──▶ Idle(1)
//! ```

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::cart::CheckoutItem;
use crate::error::{CheckoutError, Result};
use crate::validation::CardType;

/// How long an untouched checkout may be resumed
pub const SESSION_TTL_HOURS: i64 = 24;

/// Checkout step; serialized as its numeric value (`3.5` included)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub enum CheckoutStep {
    /// Browsing the catalog
    #[default]
    Idle,
    /// Card and delivery form
    CardAndDelivery,
    /// Order summary
    Summary,
    /// Payment submitted, waiting for the bank
    Processing,
    /// Terminal result
    Result,
    /// Reserved for a future step; never entered
    Reserved,
}

impl CheckoutStep {
    pub const fn as_f64(self) -> f64 {
        match self {
            Self::Idle => 1.0,
            Self::CardAndDelivery => 2.0,
            Self::Summary => 3.0,
            Self::Processing => 3.5,
            Self::Result => 4.0,
            Self::Reserved => 5.0,
        }
    }

    /// Whether the state machine allows moving from `self` to `next`
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::CardAndDelivery)
                | (Self::CardAndDelivery, Self::Summary)
                | (Self::Summary, Self::CardAndDelivery | Self::Processing | Self::Result)
                | (Self::Processing, Self::Result)
        )
    }
}

impl From<CheckoutStep> for f64 {
    fn from(step: CheckoutStep) -> Self {
        step.as_f64()
    }
}

impl TryFrom<f64> for CheckoutStep {
    type Error = String;

    fn try_from(value: f64) -> std::result::Result<Self, Self::Error> {
        [
            Self::Idle,
            Self::CardAndDelivery,
            Self::Summary,
            Self::Processing,
            Self::Result,
            Self::Reserved,
        ]
        .into_iter()
        .find(|step| step.as_f64() == value)
        .ok_or_else(|| format!("unknown checkout step {value}"))
    }
}

impl std::fmt::Display for CheckoutStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_f64())
    }
}

/// Payment status reported by the backend
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    Pending,
    Approved,
    Declined,
    Error,
}

/// Case-insensitive fragments that mark a failure message as a bank decline
const DECLINE_KEYWORDS: [&str; 4] = ["declined", "insufficient", "fondos", "rechazada"];

impl PaymentStatus {
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Classify a payment-submission failure message as a decline or an error
    pub fn classify_failure(message: &str) -> Self {
        let lower = message.to_lowercase();
        if DECLINE_KEYWORDS.iter().any(|k| lower.contains(k)) {
            Self::Declined
        } else {
            Self::Error
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Declined => "DECLINED",
            Self::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flat fees charged on top of the products
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub base_fee: Decimal,
    pub delivery_fee: Decimal,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            base_fee: dec!(5000),
            delivery_fee: dec!(10000),
        }
    }
}

impl FeeSchedule {
    /// Read `CHECKOUT_BASE_FEE` / `CHECKOUT_DELIVERY_FEE`, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let read = |key: &str, fallback: Decimal| {
            std::env::var(key)
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(fallback)
        };

        Self {
            base_fee: read("CHECKOUT_BASE_FEE", defaults.base_fee),
            delivery_fee: read("CHECKOUT_DELIVERY_FEE", defaults.delivery_fee),
        }
    }
}

/// The in-progress order
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutState {
    pub current_step: CheckoutStep,

    pub items: Vec<CheckoutItem>,
    pub base_fee: Decimal,
    pub delivery_fee: Decimal,
    pub product_amount: Decimal,
    pub total_amount: Decimal,

    pub card_token: Option<String>,
    pub card_type: Option<CardType>,
    pub card_last_four: Option<String>,

    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,

    pub delivery_address: String,
    pub delivery_city: String,
    pub delivery_postal_code: String,

    pub transaction_id: Option<String>,
    pub payment_status: Option<PaymentStatus>,
    pub payment_message: Option<String>,
    pub payment_reference: Option<String>,

    pub is_processing: bool,
    pub error: Option<String>,

    pub last_updated: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Default for CheckoutState {
    fn default() -> Self {
        Self::new()
    }
}

impl CheckoutState {
    /// Initial aggregate with default fees
    pub fn new() -> Self {
        Self::with_fees(FeeSchedule::default())
    }

    /// Initial aggregate with the given fees
    pub fn with_fees(fees: FeeSchedule) -> Self {
        let now = Utc::now();
        Self {
            current_step: CheckoutStep::Idle,
            items: Vec::new(),
            base_fee: fees.base_fee,
            delivery_fee: fees.delivery_fee,
            product_amount: Decimal::ZERO,
            total_amount: Decimal::ZERO,
            card_token: None,
            card_type: None,
            card_last_four: None,
            customer_name: String::new(),
            customer_email: String::new(),
            customer_phone: String::new(),
            delivery_address: String::new(),
            delivery_city: String::new(),
            delivery_postal_code: String::new(),
            transaction_id: None,
            payment_status: None,
            payment_message: None,
            payment_reference: None,
            is_processing: false,
            error: None,
            last_updated: now,
            expires_at: now + Duration::hours(SESSION_TTL_HOURS),
        }
    }

    pub fn fees(&self) -> FeeSchedule {
        FeeSchedule {
            base_fee: self.base_fee,
            delivery_fee: self.delivery_fee,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    fn touch(&mut self) {
        self.last_updated = Utc::now();
    }

    fn recompute_totals(&mut self) {
        self.product_amount = self.items.iter().map(CheckoutItem::line_total).sum();
        self.total_amount = self.product_amount + self.base_fee + self.delivery_fee;
    }

    /// Back to the initial aggregate, keeping the fee schedule
    pub fn reset(&mut self) {
        *self = Self::with_fees(self.fees());
    }

    /// Move to `next` if the state machine allows it
    pub fn go_to_step(&mut self, next: CheckoutStep) -> Result<()> {
        if !self.current_step.can_transition_to(next) {
            return Err(CheckoutError::InvalidTransition {
                from: self.current_step,
                to: next,
            });
        }
        self.current_step = next;
        self.touch();
        Ok(())
    }

    /// Place a restored session on `step` without the transition check.
    /// Only recovery uses this; every live step change goes through
    /// [`CheckoutState::go_to_step`].
    pub fn resume_at(&mut self, step: CheckoutStep) {
        self.current_step = step;
        self.is_processing = false;
        self.touch();
    }

    /// Replace the order lines; frozen from the summary step on
    pub fn set_items(&mut self, items: Vec<CheckoutItem>) -> Result<()> {
        if !matches!(self.current_step, CheckoutStep::Idle | CheckoutStep::CardAndDelivery) {
            return Err(CheckoutError::Validation(
                "Order items can no longer be changed".into(),
            ));
        }
        self.items = items;
        self.recompute_totals();
        self.touch();
        Ok(())
    }

    /// Update the flat fees; totals follow
    pub fn set_fees(&mut self, fees: FeeSchedule) {
        self.base_fee = fees.base_fee;
        self.delivery_fee = fees.delivery_fee;
        self.recompute_totals();
        self.touch();
    }

    pub fn set_card(&mut self, token: String, card_type: Option<CardType>, last_four: String) {
        self.card_token = Some(token);
        self.card_type = card_type;
        self.card_last_four = Some(last_four);
        self.touch();
    }

    pub fn set_customer(&mut self, name: String, email: String, phone: String) {
        self.customer_name = name;
        self.customer_email = email;
        self.customer_phone = phone;
        self.touch();
    }

    pub fn set_delivery(&mut self, address: String, city: String, postal_code: String) {
        self.delivery_address = address;
        self.delivery_city = city;
        self.delivery_postal_code = postal_code;
        self.touch();
    }

    pub fn set_transaction_id(&mut self, transaction_id: String) {
        self.transaction_id = Some(transaction_id);
        self.touch();
    }

    pub fn set_payment_result(
        &mut self,
        status: Option<PaymentStatus>,
        message: Option<String>,
        reference: Option<String>,
    ) {
        self.payment_status = status;
        self.payment_message = message;
        self.payment_reference = reference;
        self.touch();
    }

    /// Raising the flag clears any previous error
    pub fn set_processing(&mut self, processing: bool) {
        self.is_processing = processing;
        if processing {
            self.error = None;
        }
        self.touch();
    }

    /// Recording an error ends processing
    pub fn set_error(&mut self, error: Option<String>) {
        if error.is_some() {
            self.is_processing = false;
        }
        self.error = error;
        self.touch();
    }

    pub fn clear_error(&mut self) {
        self.set_error(None);
    }
}
