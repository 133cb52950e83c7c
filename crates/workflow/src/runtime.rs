//! Runtime that starts, addresses and recovers cart processes.

use std::collections::HashMap;
use std::sync::Arc;

use activities::{Notifier, PaymentGateway};
use cart::{CartId, CartProcess, CartRules, CartSignal, CartState, Catalog};
use chrono::Utc;
use journal::{Journal, JournalError};
use tokio::sync::{RwLock, mpsc, watch};
use tracing::Instrument;

use crate::handle::{CartHandle, ProcessSnapshot, SignalAck};
use crate::worker::CartWorker;
use crate::{History, ProcessOptions, Result, WorkflowError};

/// What [`CartRuntime::recover`] found in the journal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Open processes whose workers were restarted.
    pub resumed: Vec<CartId>,
    /// Processes that had already checked out.
    pub closed: Vec<CartId>,
}

/// Live process handles by cart. Workers remove themselves once closed.
pub(crate) type Registry = Arc<RwLock<HashMap<CartId, CartHandle>>>;

/// Hosts every cart process of one deployment.
///
/// Clones share the same registry, so the runtime can be handed to request
/// handlers directly. The registry lock is never held across journal I/O.
/// Closed processes leave the registry and are answered from the journal.
#[derive(Clone)]
pub struct CartRuntime {
    history: History,
    rules: CartRules,
    options: ProcessOptions,
    payments: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn Notifier>,
    handles: Registry,
}

impl std::fmt::Debug for CartRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartRuntime")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl CartRuntime {
    pub fn new(
        journal: Arc<dyn Journal>,
        catalog: Arc<Catalog>,
        payments: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn Notifier>,
        options: ProcessOptions,
    ) -> Self {
        let rules = CartRules::new(catalog)
            .with_product_policy(options.product_policy)
            .with_abandonment_timeout(options.abandonment_timeout);

        Self {
            history: History::new(journal),
            rules,
            options,
            payments,
            notifier,
            handles: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.rules.catalog
    }

    pub fn options(&self) -> &ProcessOptions {
        &self.options
    }

    /// Starts a new process for `cart_id` with an empty cart.
    #[tracing::instrument(skip_all, fields(cart_id = %cart_id))]
    pub async fn start(&self, cart_id: CartId) -> Result<CartHandle> {
        let mut process = CartProcess::default();
        let events = process.open(cart_id.clone(), Utc::now())?;

        // The first append expects an empty stream, so the journal decides
        // which of two concurrent starts wins.
        match self.history.record(&cart_id, &mut process, events).await {
            Ok(_) => {}
            Err(WorkflowError::Journal(JournalError::SequenceConflict { .. })) => {
                return Err(WorkflowError::AlreadyStarted(cart_id));
            }
            Err(e) => return Err(e),
        }

        let handle = self.spawn(cart_id.clone(), process);
        self.handles.write().await.insert(cart_id, handle.clone());

        metrics::counter!("carts_started_total").increment(1);
        tracing::info!("cart process started");
        Ok(handle)
    }

    /// Returns the handle for a known process.
    ///
    /// Closed processes are rebuilt from the journal into a finished handle.
    /// Open processes this runtime does not host are not found.
    pub async fn handle(&self, cart_id: &CartId) -> Result<CartHandle> {
        if let Some(handle) = self.handles.read().await.get(cart_id) {
            return Ok(handle.clone());
        }

        match self.history.load(cart_id).await? {
            Some(process) if process.is_closed() => Ok(CartHandle::finished(
                ProcessSnapshot::of(cart_id, &process),
            )),
            _ => Err(WorkflowError::NotFound(cart_id.clone())),
        }
    }

    /// Delivers a signal and waits until its events are journalled.
    #[tracing::instrument(skip_all, fields(cart_id = %cart_id, kind = signal.kind()))]
    pub async fn signal(&self, cart_id: &CartId, signal: CartSignal) -> Result<SignalAck> {
        self.handle(cart_id).await?.signal(signal).await
    }

    /// Decodes an untyped signal body and delivers it.
    pub async fn signal_raw(
        &self,
        cart_id: &CartId,
        body: serde_json::Value,
    ) -> Result<SignalAck> {
        let signal = CartSignal::from_json(body).map_err(WorkflowError::InvalidSignal)?;
        self.signal(cart_id, signal).await
    }

    /// Returns the cart contents as of the last acknowledged signal.
    pub async fn query(&self, cart_id: &CartId) -> Result<CartState> {
        Ok(self.handle(cart_id).await?.state())
    }

    /// Returns the full process snapshot, including its status.
    pub async fn status(&self, cart_id: &CartId) -> Result<ProcessSnapshot> {
        Ok(self.handle(cart_id).await?.snapshot())
    }

    /// Rebuilds every process found in the journal.
    ///
    /// Open processes get a fresh worker that re-arms the abandonment timer
    /// with whatever time was left and finishes any charge that was in
    /// flight. Processes already running in this runtime are left alone.
    /// Closed processes are only reported.
    #[tracing::instrument(skip(self))]
    pub async fn recover(&self) -> Result<RecoveryReport> {
        let mut report = RecoveryReport::default();
        let mut open = Vec::new();

        for cart_id in self.history.cart_ids().await? {
            if self.is_running(&cart_id).await {
                continue;
            }

            let Some(process) = self.history.load(&cart_id).await? else {
                continue;
            };

            if process.is_closed() {
                report.closed.push(cart_id);
            } else {
                open.push((cart_id, process));
            }
        }

        let mut handles = self.handles.write().await;
        for (cart_id, process) in open {
            if handles.get(&cart_id).is_some_and(CartHandle::is_running) {
                continue;
            }
            report.resumed.push(cart_id.clone());
            let handle = self.spawn(cart_id.clone(), process);
            handles.insert(cart_id, handle);
        }
        drop(handles);

        tracing::info!(
            resumed = report.resumed.len(),
            closed = report.closed.len(),
            "recovered cart processes"
        );
        Ok(report)
    }

    /// Aborts every worker and forgets all handles.
    ///
    /// Nothing is journalled, so a later [`recover`](Self::recover) picks up
    /// exactly where the workers stopped.
    pub async fn shutdown(&self) {
        let mut handles = self.handles.write().await;
        for handle in handles.values() {
            handle.abort();
        }
        tracing::info!(count = handles.len(), "cart runtime shut down");
        handles.clear();
    }

    /// Number of processes hosted by the runtime.
    pub async fn len(&self) -> usize {
        self.handles.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.handles.read().await.is_empty()
    }

    async fn is_running(&self, cart_id: &CartId) -> bool {
        self.handles
            .read()
            .await
            .get(cart_id)
            .is_some_and(CartHandle::is_running)
    }

    fn spawn(&self, cart_id: CartId, process: CartProcess) -> CartHandle {
        let (inbox_tx, inbox_rx) = mpsc::channel(self.options.inbox_capacity.max(1));
        let (snapshot_tx, snapshot_rx) = watch::channel(ProcessSnapshot::of(&cart_id, &process));

        let worker = CartWorker {
            cart_id: cart_id.clone(),
            timer: CartWorker::timer_from_deadline(&process),
            process,
            history: self.history.clone(),
            rules: self.rules.clone(),
            options: self.options.clone(),
            payments: Arc::clone(&self.payments),
            notifier: Arc::clone(&self.notifier),
            inbox: inbox_rx,
            snapshot: snapshot_tx,
            registry: Arc::clone(&self.handles),
        };

        let span = tracing::info_span!("cart", cart_id = %cart_id);
        let task = tokio::spawn(worker.run().instrument(span));

        CartHandle::new(cart_id, inbox_tx, snapshot_rx, task.abort_handle())
    }
}
