//! Mock Payment Backend and Tokenizer
//!
//! For testing and demo purposes. The backend approves every payment unless
//! scripted otherwise, and records every call it receives.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use checkout_core::{CardDetails, CustomerInfo, FeeSchedule, PaymentStatus};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::backend::{
    AcceptanceToken, CreateTransactionRequest, CustomerRecord, PaymentBackend, PaymentResponse,
    ProcessPaymentRequest, TransactionRecord,
};
use crate::error::{GatewayError, Result};
use crate::tokenizer::{CardToken, CardTokenizer};

/// Scripted reply to one status check
#[derive(Clone, Debug)]
pub enum StatusReply {
    Status(PaymentStatus),
    /// Status reported under the provider's own transaction id
    Relabeled(PaymentStatus, String),
    NetworkFailure,
}

/// Scripted result of payment submission
#[derive(Clone, Debug)]
enum PaymentScript {
    Status(PaymentStatus, Option<String>),
    Fail(String),
}

#[derive(Default)]
struct Recorded {
    calls: Vec<&'static str>,
    status_replies: VecDeque<StatusReply>,
}

/// In-memory payment backend
pub struct MockPaymentBackend {
    fail_customer: Option<String>,
    fail_transaction: Option<String>,
    fail_acceptance: Option<String>,
    payment: PaymentScript,
    fees: FeeSchedule,
    prices: HashMap<String, Decimal>,
    transaction_id: Option<String>,
    status_delay: Option<Duration>,
    status_calls: AtomicUsize,
    recorded: Mutex<Recorded>,
}

impl Default for MockPaymentBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPaymentBackend {
    pub fn new() -> Self {
        Self {
            fail_customer: None,
            fail_transaction: None,
            fail_acceptance: None,
            payment: PaymentScript::Status(PaymentStatus::Approved, None),
            fees: FeeSchedule::default(),
            prices: HashMap::new(),
            transaction_id: None,
            status_delay: None,
            status_calls: AtomicUsize::new(0),
            recorded: Mutex::new(Recorded::default()),
        }
    }

    pub fn fail_customer(mut self, message: impl Into<String>) -> Self {
        self.fail_customer = Some(message.into());
        self
    }

    pub fn fail_transaction(mut self, message: impl Into<String>) -> Self {
        self.fail_transaction = Some(message.into());
        self
    }

    pub fn fail_acceptance(mut self, message: impl Into<String>) -> Self {
        self.fail_acceptance = Some(message.into());
        self
    }

    /// Status returned by payment submission
    pub fn with_payment_status(mut self, status: PaymentStatus, message: Option<&str>) -> Self {
        self.payment = PaymentScript::Status(status, message.map(str::to_string));
        self
    }

    /// Make payment submission fail with `message`
    pub fn fail_payment(mut self, message: impl Into<String>) -> Self {
        self.payment = PaymentScript::Fail(message.into());
        self
    }

    /// Fees reported on transaction creation
    pub fn with_fees(mut self, fees: FeeSchedule) -> Self {
        self.fees = fees;
        self
    }

    /// Unit price used to compute the transaction total
    pub fn with_price(mut self, product_id: impl Into<String>, price: Decimal) -> Self {
        self.prices.insert(product_id.into(), price);
        self
    }

    /// Fixed transaction id instead of a random one
    pub fn with_transaction_id(mut self, id: impl Into<String>) -> Self {
        self.transaction_id = Some(id.into());
        self
    }

    /// Delay every status check by `delay`
    pub fn with_status_delay(mut self, delay: Duration) -> Self {
        self.status_delay = Some(delay);
        self
    }

    /// Queue replies for status checks; an empty queue answers `PENDING`
    pub fn push_status(&self, reply: StatusReply) {
        self.recorded().status_replies.push_back(reply);
    }

    /// Names of the backend calls made so far, in order
    pub fn calls(&self) -> Vec<&'static str> {
        self.recorded().calls.clone()
    }

    pub fn call_count(&self, name: &str) -> usize {
        self.recorded().calls.iter().filter(|c| **c == name).count()
    }

    /// Status checks started so far
    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    fn recorded(&self) -> MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: &'static str) {
        self.recorded().calls.push(call);
    }
}

#[async_trait]
impl PaymentBackend for MockPaymentBackend {
    async fn create_customer(&self, customer: &CustomerInfo) -> Result<CustomerRecord> {
        self.record("create_customer");
        if let Some(message) = &self.fail_customer {
            return Err(GatewayError::Remote(message.clone()));
        }
        Ok(CustomerRecord {
            customer_id: format!("cus_{}", Uuid::new_v4().simple()),
            email: customer.email.clone(),
        })
    }

    async fn create_transaction(&self, request: &CreateTransactionRequest) -> Result<TransactionRecord> {
        self.record("create_transaction");
        if let Some(message) = &self.fail_transaction {
            return Err(GatewayError::Remote(message.clone()));
        }

        let products: Decimal = request
            .items
            .iter()
            .map(|item| {
                self.prices.get(&item.product_id).copied().unwrap_or_default() * Decimal::from(item.quantity)
            })
            .sum();
        let transaction_id = self
            .transaction_id
            .clone()
            .unwrap_or_else(|| format!("tx_{}", Uuid::new_v4().simple()));

        Ok(TransactionRecord {
            transaction_id,
            total_amount: products + self.fees.base_fee + self.fees.delivery_fee,
            base_fee: self.fees.base_fee,
            delivery_fee: self.fees.delivery_fee,
            status: PaymentStatus::Pending.to_string(),
        })
    }

    async fn acceptance_token(&self) -> Result<AcceptanceToken> {
        self.record("acceptance_token");
        if let Some(message) = &self.fail_acceptance {
            return Err(GatewayError::Remote(message.clone()));
        }
        Ok(AcceptanceToken {
            acceptance_token: "acc_mock".into(),
            permalink: String::new(),
        })
    }

    async fn process_payment(
        &self,
        transaction_id: &str,
        _request: &ProcessPaymentRequest,
    ) -> Result<PaymentResponse> {
        self.record("process_payment");
        match &self.payment {
            PaymentScript::Fail(message) => Err(GatewayError::Remote(message.clone())),
            PaymentScript::Status(status, message) => Ok(PaymentResponse {
                status: *status,
                transaction_id: transaction_id.to_string(),
                message: message.clone(),
                reference: Some(format!("ref_{transaction_id}")),
            }),
        }
    }

    async fn transaction_status(&self, transaction_id: &str) -> Result<PaymentResponse> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let reply = {
            let mut recorded = self.recorded();
            recorded.calls.push("transaction_status");
            recorded.status_replies.pop_front()
        };

        if let Some(delay) = self.status_delay {
            tokio::time::sleep(delay).await;
        }

        match reply.unwrap_or(StatusReply::Status(PaymentStatus::Pending)) {
            StatusReply::NetworkFailure => {
                Err(GatewayError::Remote("Network error: connection reset".into()))
            }
            StatusReply::Status(status) => Ok(PaymentResponse {
                status,
                transaction_id: transaction_id.to_string(),
                message: None,
                reference: Some(format!("ref_{transaction_id}")),
            }),
            StatusReply::Relabeled(status, provider_id) => Ok(PaymentResponse {
                status,
                reference: Some(format!("ref_{provider_id}")),
                transaction_id: provider_id,
                message: None,
            }),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// In-memory tokenizer
pub struct MockTokenizer {
    result: std::result::Result<String, String>,
    calls: AtomicUsize,
}

impl Default for MockTokenizer {
    fn default() -> Self {
        Self::succeeding("tok_test_mock")
    }
}

impl MockTokenizer {
    pub fn succeeding(token_id: impl Into<String>) -> Self {
        Self {
            result: Ok(token_id.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            result: Err(message.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CardTokenizer for MockTokenizer {
    async fn tokenize(&self, _card: &CardDetails) -> Result<CardToken> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.result {
            Ok(id) => Ok(CardToken {
                id: id.clone(),
                status: "CREATED".into(),
                created_at: String::new(),
            }),
            Err(message) => Err(GatewayError::Tokenization(message.clone())),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}
