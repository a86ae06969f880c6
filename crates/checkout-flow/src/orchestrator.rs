//! Checkout Orchestrator
//!
//! Drives one purchase through the step state machine. Every mutation goes
//! through a [`CheckoutState`] reducer and is followed by a save, so a
//! restarted process can pick the purchase up through
//! [`CheckoutFlow::recover_payment_state`].
//!
//! `process_payment` is a railway of four dependent remote calls:
//!
//! ```text
//!  create customer ─▶ create transaction ─▶ acceptance token ─▶ submit payment
//!        │                  │  step → 3.5          │                  │
//!        └──────────────────┴──────────────────────┴──────────────────┴─▶ step 4 (ERROR / DECLINED)
//! ```
//!
//! Any failure short-circuits the rest and lands on the result step; the
//! processing flag is cleared on every path.

use std::sync::Arc;

use checkout_core::validation::{detect_card_type, last_four_digits};
use checkout_core::{
    Cart, CheckoutError, CheckoutForm, CheckoutItem, CheckoutState, CheckoutStep, CheckoutStore,
    CustomerInfo, FeeSchedule, PaymentStatus, Result, SessionSnapshot,
};
use checkout_gateway::{
    CardTokenizer, CreateTransactionRequest, PaymentBackend, PaymentResponse, ProcessPaymentRequest,
    TransactionItem, TransactionRecord,
};

use crate::poller::{AdaptivePoller, PollOutcome};

/// Message recorded when the bank declines a payment during polling
pub const DECLINED_BY_BANK: &str = "Transaction declined by the bank";

/// What recovery did with the persisted session
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Recovery {
    /// Nothing was stored
    Fresh,
    /// The stored session was past its expiry and has been discarded
    Expired,
    /// A payment is in flight; poll this transaction
    ResumePolling { transaction_id: String },
    /// The restart hit before a transaction existed; back on the summary
    ReturnToSummary,
    /// The purchase had already settled
    ShowResult(PaymentStatus),
    /// Continue at the stored step
    Resume(CheckoutStep),
}

/// Checkout orchestrator
pub struct CheckoutFlow {
    backend: Arc<dyn PaymentBackend>,
    tokenizer: Arc<dyn CardTokenizer>,
    store: Arc<dyn CheckoutStore>,
    fees: FeeSchedule,
    state: CheckoutState,
    cart: Cart,
}

impl CheckoutFlow {
    pub fn new(
        backend: Arc<dyn PaymentBackend>,
        tokenizer: Arc<dyn CardTokenizer>,
        store: Arc<dyn CheckoutStore>,
    ) -> Self {
        Self::with_fees(backend, tokenizer, store, FeeSchedule::default())
    }

    /// Orchestrator seeding every new checkout with `fees`
    pub fn with_fees(
        backend: Arc<dyn PaymentBackend>,
        tokenizer: Arc<dyn CardTokenizer>,
        store: Arc<dyn CheckoutStore>,
        fees: FeeSchedule,
    ) -> Self {
        Self {
            backend,
            tokenizer,
            store,
            fees,
            state: CheckoutState::with_fees(fees),
            cart: Cart::new(),
        }
    }

    pub fn state(&self) -> &CheckoutState {
        &self.state
    }

    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    pub fn is_processing(&self) -> bool {
        self.state.is_processing
    }

    /// Edit the cart and save it
    pub fn update_cart(&mut self, edit: impl FnOnce(&mut Cart)) {
        edit(&mut self.cart);
        self.persist();
    }

    fn persist(&self) {
        let snapshot = SessionSnapshot {
            checkout: self.state.clone(),
            cart: self.cart.clone(),
        };
        if let Err(e) = self.store.save(&snapshot) {
            tracing::warn!(error = %e, "Failed to save checkout session");
        }
    }

    /// Begin a checkout for `items`, discarding any previous one
    pub fn start_checkout(&mut self, items: Vec<CheckoutItem>) -> Result<()> {
        if items.is_empty() {
            return Err(CheckoutError::Validation("Your cart is empty".into()));
        }

        self.state = CheckoutState::with_fees(self.fees);
        self.state.set_items(items)?;
        self.state.go_to_step(CheckoutStep::CardAndDelivery)?;
        self.persist();

        tracing::info!(
            items = self.state.items.len(),
            total = %self.state.total_amount,
            "Checkout started"
        );
        Ok(())
    }

    /// Begin a checkout for the current cart contents
    pub fn start_checkout_from_cart(&mut self) -> Result<()> {
        self.start_checkout(self.cart.checkout_items())
    }

    /// Validate the form, tokenize the card and move to the summary.
    ///
    /// Validation and tokenization failures are recorded in `error` and keep
    /// the flow on the card/delivery step.
    pub async fn submit_card_and_delivery(&mut self, form: &CheckoutForm) -> Result<()> {
        if self.state.current_step != CheckoutStep::CardAndDelivery {
            return Err(CheckoutError::InvalidTransition {
                from: self.state.current_step,
                to: CheckoutStep::Summary,
            });
        }

        self.state.set_processing(true);
        self.persist();

        let result = self.tokenize_and_store(form).await;

        self.state.set_processing(false);
        if let Err(e) = &result {
            tracing::warn!(error = %e, "Card and delivery step rejected");
            self.state.set_error(Some(e.user_message()));
        }
        self.persist();
        result
    }

    async fn tokenize_and_store(&mut self, form: &CheckoutForm) -> Result<()> {
        form.validate().into_result().map_err(CheckoutError::Validation)?;

        let token = self.tokenizer.tokenize(&form.card_details()).await?;
        let card_type = detect_card_type(&form.card_number);

        self.state
            .set_card(token.id, card_type, last_four_digits(&form.card_number));
        let customer = form.customer();
        self.state.set_customer(customer.name, customer.email, customer.phone);
        let delivery = form.delivery();
        self.state
            .set_delivery(delivery.address, delivery.city, delivery.postal_code);
        self.state.go_to_step(CheckoutStep::Summary)?;

        tracing::info!(
            tokenizer = self.tokenizer.name(),
            card_type = card_type.map_or("unknown", |t| t.as_str()),
            "Card tokenized, showing summary"
        );
        Ok(())
    }

    /// Run the payment railway from the summary step.
    ///
    /// Remote failures never escape: they are recorded as an `ERROR` or
    /// `DECLINED` result. `Err` is returned only when the flow is not in a
    /// state that can pay. A returned `PENDING` means the payment is waiting
    /// on the bank and should be polled.
    pub async fn process_payment(&mut self) -> Result<PaymentStatus> {
        if self.state.current_step != CheckoutStep::Summary {
            return Err(CheckoutError::InvalidTransition {
                from: self.state.current_step,
                to: CheckoutStep::Processing,
            });
        }
        if self.state.card_token.is_none() {
            return Err(CheckoutError::Validation("Card details are missing".into()));
        }

        self.state.set_processing(true);
        self.state.set_payment_result(Some(PaymentStatus::Pending), None, None);
        self.persist();

        let settled = match self.run_payment().await {
            Ok(response) if response.status == PaymentStatus::Pending => {
                let reference = response.reference.or_else(|| self.state.payment_reference.clone());
                self.state.set_payment_result(Some(PaymentStatus::Pending), None, reference);
                tracing::info!(transaction_id = %response.transaction_id, "Payment pending bank confirmation");
                Ok(PaymentStatus::Pending)
            }
            Ok(response) => {
                self.state
                    .set_payment_result(Some(response.status), response.message, response.reference);
                tracing::info!(
                    transaction_id = %response.transaction_id,
                    status = %response.status,
                    "Payment settled"
                );
                self.state.go_to_step(CheckoutStep::Result).map(|()| response.status)
            }
            Err(e) => {
                let status = if matches!(e, CheckoutError::Declined(_)) {
                    PaymentStatus::Declined
                } else {
                    PaymentStatus::Error
                };
                tracing::warn!(status = %status, error = %e, "Payment failed");
                self.state.set_payment_result(Some(status), Some(e.user_message()), None);
                self.state.go_to_step(CheckoutStep::Result).map(|()| status)
            }
        };

        self.state.set_processing(false);
        self.persist();
        settled
    }

    async fn run_payment(&mut self) -> Result<PaymentResponse> {
        let customer = self.backend.create_customer(&self.state_customer()).await?;

        let request = CreateTransactionRequest {
            items: self.state.items.iter().map(TransactionItem::from).collect(),
            customer_id: customer.customer_id,
        };
        let transaction = self.backend.create_transaction(&request).await?;
        self.adopt_transaction(&transaction)?;

        let acceptance = self.backend.acceptance_token().await?;

        let request = ProcessPaymentRequest {
            card_token: self.state.card_token.clone().unwrap_or_default(),
            acceptance_token: acceptance.acceptance_token,
            customer_email: self.state.customer_email.clone(),
            delivery_address: self.state.delivery_address.clone(),
            delivery_city: self.state.delivery_city.clone(),
            delivery_postal_code: Some(self.state.delivery_postal_code.clone())
                .filter(|code| !code.is_empty()),
        };

        self.backend
            .process_payment(&transaction.transaction_id, &request)
            .await
            .map_err(|e| {
                let message = e.to_string();
                match PaymentStatus::classify_failure(&message) {
                    PaymentStatus::Declined => CheckoutError::Declined(message),
                    _ => CheckoutError::Remote(message),
                }
            })
    }

    fn state_customer(&self) -> CustomerInfo {
        CustomerInfo {
            name: self.state.customer_name.clone(),
            email: self.state.customer_email.clone(),
            phone: self.state.customer_phone.clone(),
        }
    }

    /// Record the new transaction and enter the processing step, so a
    /// restart from here on still knows which transaction to poll.
    fn adopt_transaction(&mut self, transaction: &TransactionRecord) -> Result<()> {
        self.state.set_fees(FeeSchedule {
            base_fee: transaction.base_fee,
            delivery_fee: transaction.delivery_fee,
        });
        if transaction.total_amount != self.state.total_amount {
            tracing::warn!(
                backend_total = %transaction.total_amount,
                local_total = %self.state.total_amount,
                "Transaction total differs from the local order total"
            );
        }

        self.state.set_transaction_id(transaction.transaction_id.clone());
        self.state.go_to_step(CheckoutStep::Processing)?;
        self.persist();

        tracing::info!(transaction_id = %transaction.transaction_id, "Transaction created");
        Ok(())
    }

    /// Apply a status reported for the current payment.
    ///
    /// `PENDING` is ignored, as is any status arriving when the flow is no
    /// longer processing. Returns whether the state changed.
    pub fn handle_status_change(&mut self, status: PaymentStatus) -> bool {
        let message = (status == PaymentStatus::Declined).then(|| DECLINED_BY_BANK.to_string());
        let reference = self.state.payment_reference.clone();
        self.settle(status, message, reference)
    }

    /// Apply a full status response, ignoring responses for another
    /// transaction
    pub fn apply_status_update(&mut self, update: &PaymentResponse) -> bool {
        if self.state.transaction_id.as_deref() != Some(update.transaction_id.as_str()) {
            tracing::debug!(
                transaction_id = %update.transaction_id,
                "Ignoring status for another transaction"
            );
            return false;
        }

        let message = update.message.clone().or_else(|| {
            (update.status == PaymentStatus::Declined).then(|| DECLINED_BY_BANK.to_string())
        });
        let reference = update.reference.clone().or_else(|| self.state.payment_reference.clone());
        self.settle(update.status, message, reference)
    }

    fn settle(&mut self, status: PaymentStatus, message: Option<String>, reference: Option<String>) -> bool {
        if !status.is_terminal() || self.state.current_step != CheckoutStep::Processing {
            return false;
        }

        self.state.set_payment_result(Some(status), message, reference);
        if let Err(e) = self.state.go_to_step(CheckoutStep::Result) {
            tracing::warn!(error = %e, "Could not show the payment result");
            return false;
        }
        self.persist();

        tracing::info!(status = %status, "Payment status resolved");
        true
    }

    /// Poll the pending payment until it settles.
    ///
    /// Returns [`CheckoutError::TimeoutExhausted`] when the ladder runs out;
    /// the flow then stays on the processing step with a `PENDING` status.
    pub async fn await_settlement(&mut self, poller: &mut AdaptivePoller) -> Result<PaymentStatus> {
        let transaction_id = match (&self.state.transaction_id, self.state.current_step) {
            (Some(id), CheckoutStep::Processing) => id.clone(),
            _ => {
                return Err(CheckoutError::InvalidTransition {
                    from: self.state.current_step,
                    to: CheckoutStep::Result,
                });
            }
        };

        let Some(outcome) = poller.start(&transaction_id) else {
            return Err(CheckoutError::Validation("Payment status is already being checked".into()));
        };

        match outcome.await.unwrap_or(PollOutcome::Exhausted) {
            // Polled by the stored id, so the reply belongs to this payment
            // even when the provider reports it under its own id.
            PollOutcome::Terminal(response) => {
                let message = response.message.or_else(|| {
                    (response.status == PaymentStatus::Declined).then(|| DECLINED_BY_BANK.to_string())
                });
                let reference = response.reference.or_else(|| self.state.payment_reference.clone());
                if self.settle(response.status, message, reference) {
                    Ok(response.status)
                } else {
                    Err(CheckoutError::InvalidTransition {
                        from: self.state.current_step,
                        to: CheckoutStep::Result,
                    })
                }
            }
            PollOutcome::Exhausted => Err(CheckoutError::TimeoutExhausted),
        }
    }

    /// Leave the checkout and start over from the catalog. A completed
    /// purchase also empties the cart.
    pub fn return_to_products(&mut self) {
        if self.state.payment_status == Some(PaymentStatus::Approved) {
            self.cart.clear();
        }
        self.state = CheckoutState::with_fees(self.fees);
        self.persist();
        tracing::info!("Returned to products");
    }

    /// Summary back to the card/delivery form
    pub fn go_back(&mut self) -> Result<()> {
        if self.state.is_processing {
            return Err(CheckoutError::Validation("A payment is being processed".into()));
        }
        self.state.go_to_step(CheckoutStep::CardAndDelivery)?;
        self.persist();
        Ok(())
    }

    /// Load the persisted session and decide where to resume it.
    ///
    /// Expired sessions are discarded. A pending payment with a transaction
    /// resumes polling; one without a transaction goes back to the summary.
    pub fn recover_payment_state(&mut self) -> Result<Recovery> {
        let Some(snapshot) = self.store.load()? else {
            return Ok(Recovery::Fresh);
        };

        if snapshot.checkout.is_expired() {
            self.store.clear()?;
            self.state = CheckoutState::with_fees(self.fees);
            self.cart = snapshot.cart;
            self.persist();
            tracing::info!("Discarded expired checkout session");
            return Ok(Recovery::Expired);
        }

        self.state = snapshot.checkout;
        self.cart = snapshot.cart;

        let step = self.state.current_step;
        let pending = self.state.payment_status == Some(PaymentStatus::Pending);
        let recovery = match (self.state.payment_status, self.state.transaction_id.clone()) {
            // a transaction at 3.5 without a status is still awaiting the bank
            (Some(PaymentStatus::Pending) | None, Some(transaction_id))
                if pending || step == CheckoutStep::Processing =>
            {
                let reference = self.state.payment_reference.clone();
                self.state.resume_at(CheckoutStep::Processing);
                self.state.set_payment_result(Some(PaymentStatus::Pending), None, reference);
                Recovery::ResumePolling { transaction_id }
            }
            (Some(PaymentStatus::Pending), None) => {
                self.state.resume_at(CheckoutStep::Summary);
                self.state.set_payment_result(None, None, None);
                Recovery::ReturnToSummary
            }
            (Some(status), _) if matches!(step, CheckoutStep::Processing | CheckoutStep::Result) => {
                self.state.resume_at(CheckoutStep::Result);
                Recovery::ShowResult(status)
            }
            _ => {
                self.state.resume_at(step);
                Recovery::Resume(step)
            }
        };
        self.persist();

        tracing::info!(step = %self.state.current_step, recovery = ?recovery, "Recovered checkout session");
        Ok(recovery)
    }
}
