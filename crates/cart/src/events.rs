//! Cart process history events.

use chrono::{DateTime, Utc};
use common::CartId;
use serde::{Deserialize, Serialize};

use crate::{Money, ProductId, aggregate::DomainEvent};

/// Events recorded in a cart process history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CartEvent {
    /// Process was started.
    CartOpened(CartOpenedData),

    /// Quantity was added to the cart.
    ItemAdded(ItemChangedData),

    /// Quantity was removed from the cart.
    ItemRemoved(ItemChangedData),

    /// Contact email was replaced.
    EmailUpdated(EmailUpdatedData),

    /// Abandonment timer was armed with a deadline.
    AbandonmentTimerArmed(TimerArmedData),

    /// Timer fired while the cart was empty; nothing was sent.
    AbandonmentTimerLapsed(TimerLapsedData),

    /// Timer fired on a non-empty cart and a notice is owed.
    AbandonmentNoticeDue(NoticeDueData),

    /// The notice could not be delivered.
    AbandonmentNoticeFailed(FailureData),

    /// Checkout was accepted and a charge attempt started.
    CheckoutStarted(CheckoutStartedData),

    /// The charge went through; the process is closed.
    PaymentSucceeded(PaymentSucceededData),

    /// The charge failed; the cart is open again.
    PaymentFailed(PaymentFailedData),
}

impl DomainEvent for CartEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CartEvent::CartOpened(_) => "CartOpened",
            CartEvent::ItemAdded(_) => "ItemAdded",
            CartEvent::ItemRemoved(_) => "ItemRemoved",
            CartEvent::EmailUpdated(_) => "EmailUpdated",
            CartEvent::AbandonmentTimerArmed(_) => "AbandonmentTimerArmed",
            CartEvent::AbandonmentTimerLapsed(_) => "AbandonmentTimerLapsed",
            CartEvent::AbandonmentNoticeDue(_) => "AbandonmentNoticeDue",
            CartEvent::AbandonmentNoticeFailed(_) => "AbandonmentNoticeFailed",
            CartEvent::CheckoutStarted(_) => "CheckoutStarted",
            CartEvent::PaymentSucceeded(_) => "PaymentSucceeded",
            CartEvent::PaymentFailed(_) => "PaymentFailed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartOpenedData {
    pub cart_id: CartId,
    pub opened_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemChangedData {
    pub product_id: ProductId,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailUpdatedData {
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerArmedData {
    /// Wall-clock time at which the timer fires.
    pub deadline: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerLapsedData {
    pub lapsed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoticeDueData {
    /// Address the notice goes to. May be empty.
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureData {
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutStartedData {
    pub email: String,

    /// Attempt number, starting at 1. Part of the charge idempotency key.
    pub attempt: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentSucceededData {
    pub attempt: u32,
    pub receipt_id: String,
    pub amount: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentFailedData {
    pub attempt: u32,
    pub reason: String,
}

// Convenience constructors for events
impl CartEvent {
    pub fn cart_opened(cart_id: CartId, opened_at: DateTime<Utc>) -> Self {
        CartEvent::CartOpened(CartOpenedData { cart_id, opened_at })
    }

    pub fn item_added(product_id: ProductId, quantity: i64) -> Self {
        CartEvent::ItemAdded(ItemChangedData {
            product_id,
            quantity,
        })
    }

    pub fn item_removed(product_id: ProductId, quantity: i64) -> Self {
        CartEvent::ItemRemoved(ItemChangedData {
            product_id,
            quantity,
        })
    }

    pub fn email_updated(email: impl Into<String>) -> Self {
        CartEvent::EmailUpdated(EmailUpdatedData {
            email: email.into(),
        })
    }

    pub fn timer_armed(deadline: DateTime<Utc>) -> Self {
        CartEvent::AbandonmentTimerArmed(TimerArmedData { deadline })
    }

    pub fn timer_lapsed(lapsed_at: DateTime<Utc>) -> Self {
        CartEvent::AbandonmentTimerLapsed(TimerLapsedData { lapsed_at })
    }

    pub fn notice_due(email: impl Into<String>) -> Self {
        CartEvent::AbandonmentNoticeDue(NoticeDueData {
            email: email.into(),
        })
    }

    pub fn notice_failed(reason: impl Into<String>) -> Self {
        CartEvent::AbandonmentNoticeFailed(FailureData {
            reason: reason.into(),
        })
    }

    pub fn checkout_started(email: impl Into<String>, attempt: u32) -> Self {
        CartEvent::CheckoutStarted(CheckoutStartedData {
            email: email.into(),
            attempt,
        })
    }

    pub fn payment_succeeded(attempt: u32, receipt_id: impl Into<String>, amount: Money) -> Self {
        CartEvent::PaymentSucceeded(PaymentSucceededData {
            attempt,
            receipt_id: receipt_id.into(),
            amount,
        })
    }

    pub fn payment_failed(attempt: u32, reason: impl Into<String>) -> Self {
        CartEvent::PaymentFailed(PaymentFailedData {
            attempt,
            reason: reason.into(),
        })
    }
}
