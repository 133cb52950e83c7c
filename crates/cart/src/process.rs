//! Cart process state machine.
//!
//! A [`CartProcess`] never performs side effects. Every `handle_*` method
//! inspects the current state and returns the events that describe what
//! happens next; [`Aggregate::apply`] folds those events back in. Replaying a
//! journalled history through `apply` rebuilds an identical process.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use common::CartId;
use journal::Sequence;
use serde::{Deserialize, Serialize};

use crate::{
    Aggregate, CartError, CartEvent, CartSignal, CartState, Catalog, ChargeRequest, Money,
    ProcessStatus, ProductId,
};

/// How add-item signals for products missing from the catalog are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductPolicy {
    /// Accept the item; it is priced at zero at checkout.
    #[default]
    Permissive,

    /// Reject the signal with `InvalidProduct`.
    Strict,
}

impl FromStr for ProductPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "permissive" => Ok(ProductPolicy::Permissive),
            "strict" => Ok(ProductPolicy::Strict),
            other => Err(format!("unknown product policy: {other}")),
        }
    }
}

/// Inputs a process needs to make decisions, shared by every cart.
#[derive(Debug, Clone)]
pub struct CartRules {
    pub catalog: Arc<Catalog>,
    pub product_policy: ProductPolicy,
    /// Time from the first item landing in an empty cart to the notice.
    pub abandonment_timeout: Duration,
}

impl CartRules {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            product_policy: ProductPolicy::default(),
            abandonment_timeout: Duration::from_secs(10 * 60),
        }
    }

    pub fn with_product_policy(mut self, policy: ProductPolicy) -> Self {
        self.product_policy = policy;
        self
    }

    pub fn with_abandonment_timeout(mut self, timeout: Duration) -> Self {
        self.abandonment_timeout = timeout;
        self
    }

    fn deadline_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        TimeDelta::from_std(self.abandonment_timeout)
            .ok()
            .and_then(|delta| now.checked_add_signed(delta))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// Result of a charge attempt, as reported back to the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChargeOutcome {
    Succeeded { receipt_id: String, amount: Money },
    Failed { reason: String },
}

/// A single shopping-cart process.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CartProcess {
    id: Option<CartId>,
    sequence: Sequence,
    state: CartState,
    status: ProcessStatus,
    abandonment_deadline: Option<DateTime<Utc>>,
    notice_sent: bool,
    checkout_attempts: u32,
    receipt_id: Option<String>,
}

impl Aggregate for CartProcess {
    type Event = CartEvent;
    type Error = CartError;

    fn stream_kind() -> &'static str {
        "Cart"
    }

    fn id(&self) -> Option<&CartId> {
        self.id.as_ref()
    }

    fn sequence(&self) -> Sequence {
        self.sequence
    }

    fn set_sequence(&mut self, sequence: Sequence) {
        self.sequence = sequence;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            CartEvent::CartOpened(data) => {
                self.id = Some(data.cart_id);
                self.status = ProcessStatus::Open;
            }
            CartEvent::ItemAdded(data) => self.state.add_item(data.product_id, data.quantity),
            CartEvent::ItemRemoved(data) => self.state.remove_item(data.product_id, data.quantity),
            CartEvent::EmailUpdated(data) => self.state.email = data.email,
            CartEvent::AbandonmentTimerArmed(data) => {
                self.abandonment_deadline = Some(data.deadline);
            }
            CartEvent::AbandonmentTimerLapsed(_) => {
                self.abandonment_deadline = None;
            }
            CartEvent::AbandonmentNoticeDue(_) => {
                self.abandonment_deadline = None;
                self.notice_sent = true;
            }
            CartEvent::AbandonmentNoticeFailed(_) => {}
            CartEvent::CheckoutStarted(data) => {
                self.state.email = data.email;
                self.checkout_attempts = data.attempt;
                self.status = ProcessStatus::CheckingOut;
            }
            CartEvent::PaymentSucceeded(data) => {
                self.state.checked_out = true;
                self.receipt_id = Some(data.receipt_id);
                self.abandonment_deadline = None;
                self.status = ProcessStatus::Closed;
            }
            CartEvent::PaymentFailed(_) => {
                self.status = ProcessStatus::Open;
            }
        }
    }
}

// Query methods
impl CartProcess {
    pub fn state(&self) -> &CartState {
        &self.state
    }

    pub fn status(&self) -> ProcessStatus {
        self.status
    }

    pub fn is_closed(&self) -> bool {
        self.status.is_terminal()
    }

    /// Wall-clock deadline of the armed abandonment timer.
    pub fn abandonment_deadline(&self) -> Option<DateTime<Utc>> {
        self.abandonment_deadline
    }

    pub fn notice_sent(&self) -> bool {
        self.notice_sent
    }

    pub fn checkout_attempts(&self) -> u32 {
        self.checkout_attempts
    }

    pub fn receipt_id(&self) -> Option<&str> {
        self.receipt_id.as_deref()
    }

    /// Attempt number of a charge that was started but has no outcome yet.
    pub fn in_flight_attempt(&self) -> Option<u32> {
        (self.status == ProcessStatus::CheckingOut).then_some(self.checkout_attempts)
    }
}

// Decision methods (return events)
impl CartProcess {
    /// Starts the process.
    pub fn open(&self, cart_id: CartId, now: DateTime<Utc>) -> Result<Vec<CartEvent>, CartError> {
        if self.id.is_some() {
            return Err(CartError::AlreadyOpened);
        }

        Ok(vec![CartEvent::cart_opened(cart_id, now)])
    }

    /// Decides the events for one mutation signal.
    ///
    /// Only an open process accepts signals. An empty vector means the signal
    /// was valid but changes nothing.
    pub fn handle_signal(
        &self,
        signal: &CartSignal,
        rules: &CartRules,
        now: DateTime<Utc>,
    ) -> Result<Vec<CartEvent>, CartError> {
        if !self.status.accepts_signals() {
            return Err(CartError::InvalidTransition {
                status: self.status,
                action: signal.kind(),
            });
        }

        match signal {
            CartSignal::AddItem(item) => {
                self.add_item(item.product_id, item.quantity, rules, now)
            }
            CartSignal::RemoveItem(item) => self.remove_item(item.product_id, item.quantity),
            CartSignal::UpdateEmail(payload) => {
                Ok(vec![CartEvent::email_updated(payload.email.clone())])
            }
            CartSignal::Checkout(payload) => Ok(vec![CartEvent::checkout_started(
                payload.email.clone(),
                self.checkout_attempts.saturating_add(1),
            )]),
        }
    }

    fn add_item(
        &self,
        product_id: ProductId,
        quantity: i64,
        rules: &CartRules,
        now: DateTime<Utc>,
    ) -> Result<Vec<CartEvent>, CartError> {
        if quantity <= 0 {
            return Err(CartError::InvalidQuantity(quantity));
        }

        if rules.product_policy == ProductPolicy::Strict && !rules.catalog.contains(product_id) {
            return Err(CartError::InvalidProduct(product_id));
        }

        let mut events = vec![CartEvent::item_added(product_id, quantity)];
        if self.state.is_empty() && !self.notice_sent {
            events.push(CartEvent::timer_armed(rules.deadline_from(now)));
        }

        Ok(events)
    }

    fn remove_item(
        &self,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<Vec<CartEvent>, CartError> {
        if quantity <= 0 {
            return Err(CartError::InvalidQuantity(quantity));
        }

        if self.state.item(product_id).is_none() {
            return Ok(vec![]);
        }

        Ok(vec![CartEvent::item_removed(product_id, quantity)])
    }

    /// Decides what happens when the abandonment timer fires.
    ///
    /// A non-empty cart owes a notice; an empty one lets the timer lapse so a
    /// later first item can arm it again.
    pub fn handle_timer(&self, now: DateTime<Utc>) -> Result<Vec<CartEvent>, CartError> {
        if !self.status.accepts_signals() {
            return Err(CartError::InvalidTransition {
                status: self.status,
                action: "fire abandonment timer",
            });
        }

        if self.abandonment_deadline.is_none() {
            return Ok(vec![]);
        }

        if self.state.is_empty() || self.notice_sent {
            return Ok(vec![CartEvent::timer_lapsed(now)]);
        }

        Ok(vec![CartEvent::notice_due(self.state.email.clone())])
    }

    /// Records the outcome of the in-flight charge.
    pub fn handle_charge_outcome(
        &self,
        outcome: ChargeOutcome,
    ) -> Result<Vec<CartEvent>, CartError> {
        let Some(attempt) = self.in_flight_attempt() else {
            return Err(CartError::InvalidTransition {
                status: self.status,
                action: "record charge outcome",
            });
        };

        Ok(match outcome {
            ChargeOutcome::Succeeded { receipt_id, amount } => {
                vec![CartEvent::payment_succeeded(attempt, receipt_id, amount)]
            }
            ChargeOutcome::Failed { reason } => vec![CartEvent::payment_failed(attempt, reason)],
        })
    }

    /// Records that the abandonment notice could not be delivered.
    pub fn handle_notice_failure(&self, reason: impl Into<String>) -> Vec<CartEvent> {
        vec![CartEvent::notice_failed(reason)]
    }

    /// Builds the charge for the in-flight checkout attempt.
    pub fn charge_request(&self, catalog: &Catalog) -> Result<ChargeRequest, CartError> {
        let (Some(cart_id), Some(attempt)) = (self.id.as_ref(), self.in_flight_attempt()) else {
            return Err(CartError::InvalidTransition {
                status: self.status,
                action: "charge",
            });
        };

        ChargeRequest::for_checkout(cart_id, &self.state, catalog, attempt)
    }
}
