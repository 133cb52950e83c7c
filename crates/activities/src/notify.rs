//! Abandonment notices.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::NotifyError;

/// Message sent to a customer who left items in their cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbandonmentNotice {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl AbandonmentNotice {
    pub const SUBJECT: &'static str = "You've abandoned your shopping cart!";
    pub const BODY: &'static str = "Go to http://localhost:8080 to finish checking out!";

    pub fn to(email: impl Into<String>) -> Self {
        Self {
            to: email.into(),
            subject: Self::SUBJECT.to_string(),
            body: Self::BODY.to_string(),
        }
    }
}

/// Trait for delivering abandonment notices.
///
/// Delivery is best-effort. The caller logs failures and moves on.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_abandonment_notice(&self, email: &str) -> Result<(), NotifyError>;
}

#[derive(Debug, Default)]
struct InMemoryNotifierState {
    sent: Vec<AbandonmentNotice>,
    attempts: usize,
    failing: Option<NotifyError>,
}

/// In-memory notifier that records every delivered notice.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotifier {
    state: Arc<Mutex<InMemoryNotifierState>>,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every send fail with `error` until cleared with `None`.
    pub async fn set_failure(&self, error: Option<NotifyError>) {
        self.state.lock().await.failing = error;
    }

    /// Notices delivered so far, in order.
    pub async fn sent(&self) -> Vec<AbandonmentNotice> {
        self.state.lock().await.sent.clone()
    }

    /// Number of send attempts, including failed ones.
    pub async fn attempts(&self) -> usize {
        self.state.lock().await.attempts
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn send_abandonment_notice(&self, email: &str) -> Result<(), NotifyError> {
        let mut state = self.state.lock().await;
        state.attempts += 1;

        if let Some(error) = &state.failing {
            return Err(error.clone());
        }

        state.sent.push(AbandonmentNotice::to(email));
        tracing::info!(email, "abandonment notice sent");
        Ok(())
    }
}
