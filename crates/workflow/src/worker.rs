//! The task that owns one cart process.

use std::sync::Arc;

use activities::{Notifier, PaymentGateway, charge_with_retry};
use cart::{CartEvent, CartId, CartProcess, CartRules, CartSignal, ChargeOutcome};
use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use crate::handle::{Envelope, ProcessSnapshot, SignalAck};
use crate::runtime::Registry;
use crate::{History, ProcessOptions, Result, WorkflowError};

/// Owns a [`CartProcess`] and serializes everything that happens to it.
///
/// The loop waits on the inbox and the abandonment timer at once. When both
/// are ready the inbox wins, and whichever branch runs is journalled before
/// the next wait, so replay always sees the same order.
pub(crate) struct CartWorker {
    pub cart_id: CartId,
    pub process: CartProcess,
    pub history: History,
    pub rules: CartRules,
    pub options: ProcessOptions,
    pub payments: Arc<dyn PaymentGateway>,
    pub notifier: Arc<dyn Notifier>,
    pub inbox: mpsc::Receiver<Envelope>,
    pub snapshot: watch::Sender<ProcessSnapshot>,
    pub timer: Option<Instant>,
    pub registry: Registry,
}

impl CartWorker {
    /// Converts the journalled wall-clock deadline into a timer instant.
    pub fn timer_from_deadline(process: &CartProcess) -> Option<Instant> {
        process.abandonment_deadline().map(|deadline| {
            let remaining = (deadline - Utc::now()).to_std().unwrap_or_default();
            Instant::now() + remaining
        })
    }

    pub async fn run(mut self) {
        tracing::debug!(status = %self.process.status(), "cart worker started");

        if let Err(e) = self.resume_checkout().await {
            tracing::error!(error = %e, "cart worker stopped");
            return;
        }

        while !self.process.is_closed() {
            let timer = self.timer;

            tokio::select! {
                biased;

                message = self.inbox.recv() => {
                    let Some(Envelope { signal, reply }) = message else {
                        tracing::debug!("inbox closed, cart worker exiting");
                        return;
                    };

                    let result = self.on_signal(&signal).await;
                    let charge_due = result.is_ok() && self.process.in_flight_attempt().is_some();
                    let fatal = result.is_err();
                    let _ = reply.send(result);

                    if fatal {
                        tracing::error!("cart worker stopped after journal failure");
                        return;
                    }
                    if charge_due {
                        if let Err(e) = self.checkout().await {
                            tracing::error!(error = %e, "cart worker stopped");
                            return;
                        }
                    }
                }

                _ = tokio::time::sleep_until(timer.unwrap_or_else(Instant::now)), if timer.is_some() => {
                    if let Err(e) = self.on_timer().await {
                        tracing::error!(error = %e, "cart worker stopped");
                        return;
                    }
                }
            }
        }

        self.drain_closed().await;
        self.registry.write().await.remove(&self.cart_id);
        tracing::debug!("cart worker finished");
    }

    /// Answers signals that were queued behind the final charge.
    async fn drain_closed(&mut self) {
        self.inbox.close();
        while let Some(Envelope { reply, .. }) = self.inbox.recv().await {
            let _ = reply.send(Err(WorkflowError::ProcessClosed(self.cart_id.clone())));
        }
    }

    async fn on_signal(&mut self, signal: &CartSignal) -> Result<SignalAck> {
        metrics::counter!("cart_signals_total", "kind" => signal.kind()).increment(1);

        match self.process.handle_signal(signal, &self.rules, Utc::now()) {
            Ok(events) => {
                let sequence = self.record(events).await?;
                tracing::debug!(kind = signal.kind(), %sequence, "signal applied");
                Ok(SignalAck::applied(sequence))
            }
            Err(e) => {
                let reason = if e.is_invalid_payload() {
                    "invalid_payload"
                } else {
                    "invalid_transition"
                };
                metrics::counter!("cart_signals_ignored_total", "reason" => reason).increment(1);
                tracing::warn!(kind = signal.kind(), reason, error = %e, "signal ignored");
                Ok(SignalAck::ignored(
                    cart::Aggregate::sequence(&self.process),
                    e.to_string(),
                ))
            }
        }
    }

    async fn on_timer(&mut self) -> Result<()> {
        self.timer = None;

        let events = self.process.handle_timer(Utc::now())?;
        let notice_to = events.iter().find_map(|event| match event {
            CartEvent::AbandonmentNoticeDue(data) => Some(data.email.clone()),
            _ => None,
        });
        self.record(events).await?;

        let Some(email) = notice_to else {
            tracing::debug!("abandonment timer lapsed on empty cart");
            return Ok(());
        };

        metrics::counter!("abandonment_notices_total").increment(1);
        tracing::info!(email = %email, "cart abandoned, sending notice");

        if let Err(e) = self.notifier.send_abandonment_notice(&email).await {
            tracing::warn!(error = %e, "abandonment notice failed");
            let events = self.process.handle_notice_failure(e.to_string());
            self.record(events).await?;
        }

        Ok(())
    }

    /// Re-runs a charge that was in flight when the previous worker died.
    async fn resume_checkout(&mut self) -> Result<()> {
        if let Some(attempt) = self.process.in_flight_attempt() {
            tracing::info!(attempt, "resuming in-flight checkout");
            self.checkout().await?;
        }
        Ok(())
    }

    /// Charges the in-flight attempt and records the outcome.
    async fn checkout(&mut self) -> Result<()> {
        let Some(attempt) = self.process.in_flight_attempt() else {
            return Ok(());
        };

        metrics::counter!("checkout_attempts_total").increment(1);
        let started = std::time::Instant::now();

        let outcome = match self.process.charge_request(&self.rules.catalog) {
            Ok(request) => {
                tracing::info!(
                    attempt,
                    amount_cents = request.amount.cents(),
                    idempotency_key = %request.idempotency_key,
                    "charging cart"
                );
                match charge_with_retry(&*self.payments, &request, &self.options.charge_retry).await
                {
                    Ok(receipt) => ChargeOutcome::Succeeded {
                        receipt_id: receipt.receipt_id,
                        amount: receipt.amount,
                    },
                    Err(e) => ChargeOutcome::Failed {
                        reason: e.to_string(),
                    },
                }
            }
            Err(e) => ChargeOutcome::Failed {
                reason: e.to_string(),
            },
        };

        metrics::histogram!("charge_duration_seconds").record(started.elapsed().as_secs_f64());

        if let ChargeOutcome::Failed { reason } = &outcome {
            metrics::counter!("checkout_failures_total").increment(1);
            tracing::warn!(attempt, reason = %reason, "checkout failed, cart reopened");
        }

        let events = self.process.handle_charge_outcome(outcome)?;
        self.record(events).await?;

        if self.process.is_closed() {
            metrics::counter!("carts_closed_total").increment(1);
            tracing::info!(
                attempt,
                receipt_id = self.process.receipt_id().unwrap_or_default(),
                "cart checked out"
            );
        }

        Ok(())
    }

    /// Journals events, applies them, and publishes the new snapshot.
    async fn record(&mut self, events: Vec<CartEvent>) -> Result<journal::Sequence> {
        let armed = events
            .iter()
            .any(|event| matches!(event, CartEvent::AbandonmentTimerArmed(_)));

        let sequence = self
            .history
            .record(&self.cart_id, &mut self.process, events)
            .await?;

        if armed {
            self.timer = Some(Instant::now() + self.options.abandonment_timeout);
        }
        if self.process.abandonment_deadline().is_none() {
            self.timer = None;
        }

        self.snapshot
            .send_replace(ProcessSnapshot::of(&self.cart_id, &self.process));

        Ok(sequence)
    }
}
