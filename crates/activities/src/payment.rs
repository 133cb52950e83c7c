//! Payment gateway trait and in-memory implementation.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cart::{ChargeRequest, Money};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::{PaymentError, RetryError, RetryPolicy};

/// Proof of a successful charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// ID assigned by the gateway.
    pub receipt_id: String,
    pub amount: Money,
    pub idempotency_key: String,
}

/// Trait for charging checkouts.
///
/// Implementations must treat `request.idempotency_key` as a deduplication
/// key: charging the same key twice returns the first receipt and moves no
/// money.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(&self, request: &ChargeRequest) -> Result<Receipt, PaymentError>;
}

/// Charges through `gateway`, retrying transient failures under `policy`.
///
/// The caller sees only the final outcome.
pub async fn charge_with_retry(
    gateway: &dyn PaymentGateway,
    request: &ChargeRequest,
    policy: &RetryPolicy,
) -> Result<Receipt, PaymentError> {
    let result = policy
        .execute(|attempt| {
            tracing::debug!(
                cart_id = %request.cart_id,
                idempotency_key = %request.idempotency_key,
                attempt,
                "charging"
            );
            gateway.charge(request)
        })
        .await;

    match result {
        Ok(receipt) => Ok(receipt),
        Err(RetryError::Failed { error, .. }) => Err(error),
        Err(RetryError::TimedOut(budget)) => Err(PaymentError::TimedOut(budget)),
    }
}

#[derive(Debug, Default)]
struct InMemoryPaymentState {
    receipts: HashMap<String, Receipt>,
    charges: Vec<ChargeRequest>,
    calls: usize,
    next_id: u32,
    scripted_failures: VecDeque<PaymentError>,
    decline_all: bool,
    latency: Option<Duration>,
}

/// In-memory payment gateway for tests and local runs.
///
/// Failures can be scripted ahead of time. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<Mutex<InMemoryPaymentState>>,
}

impl InMemoryPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declines every charge while set.
    pub async fn set_decline_all(&self, decline: bool) {
        self.state.lock().await.decline_all = decline;
    }

    /// Queues an error to be returned by the next call that is not a replay
    /// of an already-paid key.
    pub async fn push_failure(&self, error: PaymentError) {
        self.state.lock().await.scripted_failures.push_back(error);
    }

    /// Makes the next `count` calls fail with a transient error.
    pub async fn fail_transiently(&self, count: usize) {
        let mut state = self.state.lock().await;
        for _ in 0..count {
            state
                .scripted_failures
                .push_back(PaymentError::Unavailable("gateway busy".to_string()));
        }
    }

    /// Adds a delay before every charge is processed.
    pub async fn set_latency(&self, latency: Option<Duration>) {
        self.state.lock().await.latency = latency;
    }

    /// Number of distinct successful charges.
    pub async fn charge_count(&self) -> usize {
        self.state.lock().await.charges.len()
    }

    /// Number of times `charge` was called, including failures and replays.
    pub async fn call_count(&self) -> usize {
        self.state.lock().await.calls
    }

    /// Requests that were actually charged, in order.
    pub async fn charges(&self) -> Vec<ChargeRequest> {
        self.state.lock().await.charges.clone()
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn charge(&self, request: &ChargeRequest) -> Result<Receipt, PaymentError> {
        let latency = {
            let mut state = self.state.lock().await;
            state.calls += 1;
            state.latency
        };

        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state.lock().await;

        if let Some(receipt) = state.receipts.get(&request.idempotency_key) {
            return Ok(receipt.clone());
        }

        if let Some(error) = state.scripted_failures.pop_front() {
            return Err(error);
        }

        if state.decline_all {
            return Err(PaymentError::Declined("card declined".to_string()));
        }

        state.next_id += 1;
        let receipt = Receipt {
            receipt_id: format!("ch_{:04}", state.next_id),
            amount: request.amount,
            idempotency_key: request.idempotency_key.clone(),
        };
        state
            .receipts
            .insert(request.idempotency_key.clone(), receipt.clone());
        state.charges.push(request.clone());

        Ok(receipt)
    }
}
