//! Handles to running (or finished) cart processes.

use cart::{CartId, CartProcess, CartSignal, CartState, ProcessStatus};
use journal::Sequence;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::AbortHandle;

use crate::{Result, WorkflowError};

/// Read-only view of a process, published after every journalled batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessSnapshot {
    pub cart_id: CartId,
    pub state: CartState,
    pub status: ProcessStatus,
    /// Journal sequence of the last event reflected in this snapshot.
    pub sequence: Sequence,
    pub notice_sent: bool,
    pub checkout_attempts: u32,
    pub receipt_id: Option<String>,
}

impl ProcessSnapshot {
    pub fn of(cart_id: &CartId, process: &CartProcess) -> Self {
        Self {
            cart_id: cart_id.clone(),
            state: process.state().clone(),
            status: process.status(),
            sequence: cart::Aggregate::sequence(process),
            notice_sent: process.notice_sent(),
            checkout_attempts: process.checkout_attempts(),
            receipt_id: process.receipt_id().map(str::to_string),
        }
    }
}

/// What a process did with a signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "outcome")]
pub enum SignalOutcome {
    /// The signal's events were journalled and applied.
    Applied,

    /// The signal was invalid for the cart and was dropped.
    Ignored { reason: String },
}

/// Acknowledgement returned once a signal has been handled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignalAck {
    /// Journal sequence after the signal was handled.
    pub sequence: Sequence,
    #[serde(flatten)]
    pub outcome: SignalOutcome,
}

impl SignalAck {
    pub fn applied(sequence: Sequence) -> Self {
        Self {
            sequence,
            outcome: SignalOutcome::Applied,
        }
    }

    pub fn ignored(sequence: Sequence, reason: impl Into<String>) -> Self {
        Self {
            sequence,
            outcome: SignalOutcome::Ignored {
                reason: reason.into(),
            },
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self.outcome, SignalOutcome::Applied)
    }
}

/// A signal in a process inbox, with the channel its ack goes back on.
pub(crate) struct Envelope {
    pub signal: CartSignal,
    pub reply: oneshot::Sender<Result<SignalAck>>,
}

impl std::fmt::Debug for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Envelope")
            .field("signal", &self.signal)
            .finish_non_exhaustive()
    }
}

/// Cloneable handle to one cart process.
///
/// The handle outlives the worker: once a process closes (or its worker
/// stops) the last snapshot stays readable.
#[derive(Debug, Clone)]
pub struct CartHandle {
    cart_id: CartId,
    inbox: mpsc::Sender<Envelope>,
    snapshot: watch::Receiver<ProcessSnapshot>,
    task: Option<AbortHandle>,
}

impl CartHandle {
    pub(crate) fn new(
        cart_id: CartId,
        inbox: mpsc::Sender<Envelope>,
        snapshot: watch::Receiver<ProcessSnapshot>,
        task: AbortHandle,
    ) -> Self {
        Self {
            cart_id,
            inbox,
            snapshot,
            task: Some(task),
        }
    }

    /// Creates a handle for a process that will never run again.
    pub(crate) fn finished(snapshot: ProcessSnapshot) -> Self {
        let (inbox, _) = mpsc::channel(1);
        let (_, receiver) = watch::channel(snapshot.clone());
        Self {
            cart_id: snapshot.cart_id,
            inbox,
            snapshot: receiver,
            task: None,
        }
    }

    pub fn cart_id(&self) -> &CartId {
        &self.cart_id
    }

    /// Returns the latest published snapshot.
    pub fn snapshot(&self) -> ProcessSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn state(&self) -> CartState {
        self.snapshot.borrow().state.clone()
    }

    pub fn status(&self) -> ProcessStatus {
        self.snapshot.borrow().status
    }

    /// Returns true while the worker task is accepting signals.
    pub fn is_running(&self) -> bool {
        !self.inbox.is_closed()
    }

    /// Sends a signal and waits for its acknowledgement.
    pub async fn signal(&self, signal: CartSignal) -> Result<SignalAck> {
        if self.status().is_terminal() {
            return Err(WorkflowError::ProcessClosed(self.cart_id.clone()));
        }

        let (reply, ack) = oneshot::channel();
        if self.inbox.send(Envelope { signal, reply }).await.is_err() {
            return Err(self.gone());
        }

        match ack.await {
            Ok(result) => result,
            Err(_) => Err(self.gone()),
        }
    }

    /// Waits until a snapshot satisfies `predicate`.
    ///
    /// Fails with `Stopped` if the worker exits first.
    pub async fn wait_for(
        &self,
        predicate: impl FnMut(&ProcessSnapshot) -> bool,
    ) -> Result<ProcessSnapshot> {
        let mut receiver = self.snapshot.clone();
        match receiver.wait_for(predicate).await {
            Ok(snapshot) => Ok(snapshot.clone()),
            Err(_) => Err(WorkflowError::Stopped(self.cart_id.clone())),
        }
    }

    /// Stops the worker task without recording anything.
    pub(crate) fn abort(&self) {
        if let Some(task) = &self.task {
            task.abort();
        }
    }

    fn gone(&self) -> WorkflowError {
        if self.status().is_terminal() {
            WorkflowError::ProcessClosed(self.cart_id.clone())
        } else {
            WorkflowError::Stopped(self.cart_id.clone())
        }
    }
}
