//! Background settlement reconciliation.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};

use crate::config::ReconciliationConfig;
use crate::payments::error::PaymentError;
use crate::payments::pending::PendingSettlement;
use crate::payments::processor::PaymentProcessor;
use crate::payments::types::ReconcileOutcome;
use crate::resilience::Backoff;

/// Periodically settles in-flight payments the request path gave up on.
pub struct Reconciler {
    processor: Arc<PaymentProcessor>,
    config: ReconciliationConfig,
    backoff: Backoff,
}

impl Reconciler {
    pub fn new(processor: Arc<PaymentProcessor>, config: ReconciliationConfig) -> Self {
        let backoff = Backoff::from_config(&config);
        Self {
            processor,
            config,
            backoff,
        }
    }

    /// Run until `shutdown` fires.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Reconciler disabled");
            return;
        }

        tracing::info!(interval_secs = self.config.interval_secs, "Starting reconciler");

        let mut ticker = interval(Duration::from_secs(self.config.interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_once().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!(
                        pending = self.processor.pending().len(),
                        "Reconciler stopping"
                    );
                    break;
                }
            }
        }
    }

    /// Process every due entry once. Returns how many were settled.
    pub async fn run_once(&self) -> usize {
        let due = self.processor.pending().due(Instant::now());
        let mut settled = 0;

        for entry in due {
            match self.processor.reconcile(&entry.wallet, Some(entry.tx_hash)).await {
                Ok(ReconcileOutcome::StillPending { .. }) => self.reschedule(&entry),
                Ok(outcome) => {
                    settled += 1;
                    tracing::info!(
                        wallet = %entry.wallet,
                        tx_hash = %entry.tx_hash,
                        outcome = ?outcome,
                        "Settlement resolved"
                    );
                }
                Err(PaymentError::NothingToReconcile(_)) => {}
                Err(e) => {
                    tracing::warn!(
                        wallet = %entry.wallet,
                        tx_hash = %entry.tx_hash,
                        attempts = entry.attempts,
                        error = %e,
                        "Reconciliation attempt failed"
                    );
                    self.reschedule(&entry);
                }
            }
        }

        settled
    }

    fn reschedule(&self, entry: &PendingSettlement) {
        let delay = self.backoff.delay(entry.attempts.saturating_add(1));
        tracing::debug!(
            wallet = %entry.wallet,
            delay_ms = delay.as_millis() as u64,
            "Rescheduling settlement"
        );
        self.processor.pending().reschedule(&entry.wallet, delay);
    }
}
