//! Adaptive Status Poller
//!
//! Checks a pending transaction on an escalating ladder of phases. Each phase
//! ticks at its own interval for its own duration; entry into the next phase
//! is driven by the phase deadline, not by the number of ticks.
//!
//! ```text
//!  phase 0: every 1s for 10s   "Processing your payment..."
//!  phase 1: every 2s for 20s   "Your bank is validating the transaction..."
//!  phase 2: every 5s for 30s   "This is taking longer than usual..."
//!  then:    stop               STILL_PENDING_MESSAGE
//! ```
//!
//! The ladder runs on its own tokio task. The first non-`PENDING` status is
//! delivered once through a oneshot channel; progress is published through a
//! watch channel. Status checks are spawned into a `JoinSet`, so a slow check
//! may overlap the next tick.

use std::sync::Arc;
use std::time::Duration;

use checkout_core::STILL_PENDING_MESSAGE;
use checkout_gateway::{PaymentBackend, PaymentResponse};
use tokio::sync::{oneshot, watch};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};

/// One rung of the polling ladder
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollPhase {
    pub interval: Duration,
    pub duration: Duration,
    pub message: &'static str,
}

impl PollPhase {
    pub const fn new(interval: Duration, duration: Duration, message: &'static str) -> Self {
        Self { interval, duration, message }
    }
}

/// Default ladder
pub const POLL_PHASES: [PollPhase; 3] = [
    PollPhase::new(Duration::from_secs(1), Duration::from_secs(10), "Processing your payment..."),
    PollPhase::new(
        Duration::from_secs(2),
        Duration::from_secs(20),
        "Your bank is validating the transaction...",
    ),
    PollPhase::new(Duration::from_secs(5), Duration::from_secs(30), "This is taking longer than usual..."),
];

/// Snapshot published on every phase change
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollProgress {
    pub phase: usize,
    pub message: &'static str,
    pub is_polling: bool,
}

impl PollProgress {
    fn idle(phases: &[PollPhase]) -> Self {
        Self {
            phase: 0,
            message: phases.first().map_or(STILL_PENDING_MESSAGE, |p| p.message),
            is_polling: false,
        }
    }

    const fn exhausted() -> Self {
        Self {
            phase: 0,
            message: STILL_PENDING_MESSAGE,
            is_polling: false,
        }
    }
}

/// How a polling run ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    /// First non-pending status
    Terminal(PaymentResponse),
    /// Every phase elapsed while the payment stayed pending
    Exhausted,
}

/// Payment status poller
pub struct AdaptivePoller {
    backend: Arc<dyn PaymentBackend>,
    phases: Arc<[PollPhase]>,
    progress: Arc<watch::Sender<PollProgress>>,
    task: Option<JoinHandle<()>>,
}

impl AdaptivePoller {
    pub fn new(backend: Arc<dyn PaymentBackend>) -> Self {
        Self::with_phases(backend, POLL_PHASES.to_vec())
    }

    /// Poller with a custom ladder
    pub fn with_phases(backend: Arc<dyn PaymentBackend>, phases: Vec<PollPhase>) -> Self {
        let (progress, _) = watch::channel(PollProgress::idle(&phases));
        Self {
            backend,
            phases: phases.into(),
            progress: Arc::new(progress),
            task: None,
        }
    }

    /// Start polling `transaction_id`.
    ///
    /// Returns `None` without doing anything when the id is empty or a run is
    /// already in progress.
    pub fn start(&mut self, transaction_id: &str) -> Option<oneshot::Receiver<PollOutcome>> {
        if transaction_id.is_empty() {
            tracing::warn!("Refusing to poll without a transaction id");
            return None;
        }
        if self.is_polling() {
            tracing::debug!(transaction_id, "Polling already running");
            return None;
        }

        if let Some(first) = self.phases.first() {
            self.progress.send_replace(PollProgress {
                phase: 0,
                message: first.message,
                is_polling: true,
            });
        }

        let (done, outcome) = oneshot::channel();
        let ladder = Ladder {
            backend: Arc::clone(&self.backend),
            phases: Arc::clone(&self.phases),
            progress: Arc::clone(&self.progress),
            transaction_id: transaction_id.to_string(),
        };
        self.task = Some(tokio::spawn(ladder.run(done)));

        tracing::info!(transaction_id, backend = self.backend.name(), "Polling started");
        Some(outcome)
    }

    /// Cancel every pending tick and phase timer. Idempotent.
    pub fn stop(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        if !task.is_finished() {
            task.abort();
            self.progress.send_replace(PollProgress::idle(&self.phases));
            tracing::info!("Polling stopped");
        }
    }

    pub fn is_polling(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub fn progress(&self) -> PollProgress {
        self.progress.borrow().clone()
    }

    /// Receiver for progress updates
    pub fn subscribe(&self) -> watch::Receiver<PollProgress> {
        self.progress.subscribe()
    }
}

impl Drop for AdaptivePoller {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

type CheckResult = checkout_gateway::Result<PaymentResponse>;

/// State moved into the polling task
struct Ladder {
    backend: Arc<dyn PaymentBackend>,
    phases: Arc<[PollPhase]>,
    progress: Arc<watch::Sender<PollProgress>>,
    transaction_id: String,
}

impl Ladder {
    async fn run(self, done: oneshot::Sender<PollOutcome>) {
        let mut checks: JoinSet<CheckResult> = JoinSet::new();
        let mut phase_start = Instant::now();

        for (index, phase) in self.phases.iter().enumerate() {
            self.progress.send_replace(PollProgress {
                phase: index,
                message: phase.message,
                is_polling: true,
            });
            tracing::debug!(phase = index, interval = ?phase.interval, "Entering polling phase");

            let phase_end = phase_start + phase.duration;
            let deadline = tokio::time::sleep_until(phase_end);
            tokio::pin!(deadline);

            let mut ticks = tokio::time::interval_at(phase_start + phase.interval, phase.interval);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;

                    Some(joined) = checks.join_next() => {
                        if let Some(response) = self.settled(joined) {
                            self.progress.send_replace(PollProgress::idle(&self.phases));
                            tracing::info!(
                                transaction_id = %self.transaction_id,
                                status = %response.status,
                                "Payment settled"
                            );
                            let _ = done.send(PollOutcome::Terminal(response));
                            return;
                        }
                    }
                    () = &mut deadline => break,
                    _ = ticks.tick() => {
                        let backend = Arc::clone(&self.backend);
                        let id = self.transaction_id.clone();
                        checks.spawn(async move { backend.transaction_status(&id).await });
                    }
                }
            }

            phase_start = phase_end;
        }

        // checks still in flight are aborted when the set drops
        self.progress.send_replace(PollProgress::exhausted());
        tracing::info!(transaction_id = %self.transaction_id, "Polling exhausted, payment still pending");
        let _ = done.send(PollOutcome::Exhausted);
    }

    fn settled(&self, joined: Result<CheckResult, JoinError>) -> Option<PaymentResponse> {
        match joined {
            Ok(Ok(response)) if response.status.is_terminal() => Some(response),
            Ok(Ok(_)) => {
                tracing::debug!(transaction_id = %self.transaction_id, "Payment still pending");
                None
            }
            Ok(Err(e)) => {
                tracing::warn!(transaction_id = %self.transaction_id, error = %e, "Status check failed");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "Status check task failed");
                None
            }
        }
    }
}
