//! Integration tests for the cart runtime.
//!
//! Time is paused in every test, so abandonment deadlines elapse as soon as
//! the runtime is otherwise idle.

use std::sync::Arc;
use std::time::Duration;

use activities::{InMemoryNotifier, InMemoryPaymentGateway, NotifyError, PaymentGateway};
use cart::{
    CartEvent, CartId, CartItem, CartProcess, CartRules, CartSignal, Catalog, ProcessStatus,
    ProductPolicy,
};
use async_trait::async_trait;
use chrono::Utc;
use journal::{AppendOptions, InMemoryJournal, Journal, JournalEntry, Sequence};
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};
use tokio::task::JoinHandle;
use workflow::{
    CartHandle, CartRuntime, History, ProcessOptions, SignalAck, SignalOutcome, WorkflowError,
};

const TIMEOUT: Duration = Duration::from_secs(600);

/// Journal whose calls wait while a test holds the gate shut.
struct GatedJournal {
    inner: InMemoryJournal,
    gate: Arc<RwLock<()>>,
}

#[async_trait]
impl Journal for GatedJournal {
    async fn append(
        &self,
        entries: Vec<JournalEntry>,
        options: AppendOptions,
    ) -> journal::Result<Sequence> {
        let _open = self.gate.read().await;
        self.inner.append(entries, options).await
    }

    async fn read_stream(&self, stream_id: &CartId) -> journal::Result<Vec<JournalEntry>> {
        let _open = self.gate.read().await;
        self.inner.read_stream(stream_id).await
    }

    async fn list_streams(&self, stream_kind: &str) -> journal::Result<Vec<CartId>> {
        let _open = self.gate.read().await;
        self.inner.list_streams(stream_kind).await
    }
}

struct Harness {
    runtime: CartRuntime,
    journal: InMemoryJournal,
    gate: Arc<RwLock<()>>,
    payments: InMemoryPaymentGateway,
    notifier: InMemoryNotifier,
}

impl Harness {
    fn new() -> Self {
        Self::with(InMemoryJournal::new(), ProcessOptions::default())
    }

    fn with(journal: InMemoryJournal, options: ProcessOptions) -> Self {
        let payments = InMemoryPaymentGateway::new();
        let notifier = InMemoryNotifier::new();
        let gate = Arc::new(RwLock::new(()));
        let gated = GatedJournal {
            inner: journal.clone(),
            gate: Arc::clone(&gate),
        };
        let runtime = CartRuntime::new(
            Arc::new(gated),
            Arc::new(Catalog::default()),
            Arc::new(payments.clone()),
            Arc::new(notifier.clone()),
            options,
        );
        Self {
            runtime,
            journal,
            gate,
            payments,
            notifier,
        }
    }

    /// A second runtime over the same journal, as after a process restart.
    fn restarted(&self) -> Self {
        Self::with(self.journal.clone(), ProcessOptions::default())
    }

    /// Blocks every journal call made by the runtime until the guard drops.
    async fn close_gate(&self) -> OwnedRwLockWriteGuard<()> {
        Arc::clone(&self.gate).write_owned().await
    }

    async fn event_types(&self, cart_id: &CartId) -> Vec<String> {
        self.journal
            .read_stream(cart_id)
            .await
            .unwrap()
            .into_iter()
            .map(|entry| entry.event_type)
            .collect()
    }
}

/// Waits until everything the worker started before this call has finished.
///
/// Removing an absent product is a valid no-op, and the worker only reads it
/// after its current step completes.
async fn settle(handle: &CartHandle) {
    handle
        .signal(CartSignal::remove_item(999, 1))
        .await
        .unwrap();
}

/// Lets every runnable task go idle. Time is paused, so nothing else moves.
async fn idle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

fn spawn_signal(
    runtime: &CartRuntime,
    cart_id: &CartId,
    signal: CartSignal,
) -> JoinHandle<workflow::Result<SignalAck>> {
    let runtime = runtime.clone();
    let cart_id = cart_id.clone();
    tokio::spawn(async move { runtime.signal(&cart_id, signal).await })
}

async fn add(runtime: &CartRuntime, cart_id: &CartId, product: i64, quantity: i64) {
    let ack = runtime
        .signal(cart_id, CartSignal::add_item(product, quantity))
        .await
        .unwrap();
    assert!(ack.is_applied());
}

mod scenarios {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn add_one_item() {
        let h = Harness::new();
        let cart_id = CartId::new("CART-A");
        h.runtime.start(cart_id.clone()).await.unwrap();

        add(&h.runtime, &cart_id, 1, 1).await;

        let state = h.runtime.query(&cart_id).await.unwrap();
        assert_eq!(state.items, vec![CartItem::new(1, 1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn add_two_remove_one() {
        let h = Harness::new();
        let cart_id = CartId::new("CART-B");
        h.runtime.start(cart_id.clone()).await.unwrap();

        add(&h.runtime, &cart_id, 1, 2).await;
        h.runtime
            .signal(&cart_id, CartSignal::remove_item(1, 1))
            .await
            .unwrap();

        let state = h.runtime.query(&cart_id).await.unwrap();
        assert_eq!(state.items, vec![CartItem::new(1, 1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn add_then_remove_empties_cart() {
        let h = Harness::new();
        let cart_id = CartId::new("CART-C");
        h.runtime.start(cart_id.clone()).await.unwrap();

        add(&h.runtime, &cart_id, 1, 1).await;
        h.runtime
            .signal(&cart_id, CartSignal::remove_item(1, 1))
            .await
            .unwrap();

        assert!(h.runtime.query(&cart_id).await.unwrap().items.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn checkout_closes_process() {
        let h = Harness::new();
        let cart_id = CartId::new("CART-D");
        let handle = h.runtime.start(cart_id.clone()).await.unwrap();

        add(&h.runtime, &cart_id, 1, 1).await;
        h.runtime
            .signal(&cart_id, CartSignal::checkout("a@b.com"))
            .await
            .unwrap();

        let snapshot = handle
            .wait_for(|s| s.status == ProcessStatus::Closed)
            .await
            .unwrap();

        assert_eq!(snapshot.state.email, "a@b.com");
        assert_eq!(snapshot.receipt_id.as_deref(), Some("ch_0001"));
        assert_eq!(h.payments.charge_count().await, 1);

        let charged = &h.payments.charges().await[0];
        assert_eq!(charged.amount.cents(), 69_900);
        assert_eq!(charged.idempotency_key, "CART-D:checkout:1");
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_cart_gets_one_notice() {
        let h = Harness::new();
        let cart_id = CartId::new("CART-E");
        let handle = h.runtime.start(cart_id.clone()).await.unwrap();

        add(&h.runtime, &cart_id, 1, 1).await;
        h.runtime
            .signal(&cart_id, CartSignal::update_email("x@y.com"))
            .await
            .unwrap();

        tokio::time::sleep(TIMEOUT + Duration::from_secs(1)).await;
        settle(&handle).await;

        let sent = h.notifier.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "x@y.com");
        assert!(handle.snapshot().notice_sent);
    }
}

mod abandonment {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn queued_signal_beats_an_expired_deadline() {
        let h = Harness::new();
        let cart_id = CartId::new("CART-AB0");
        h.runtime.start(cart_id.clone()).await.unwrap();
        add(&h.runtime, &cart_id, 1, 1).await;

        // Park the worker inside a journal write, queue a removal that
        // empties the cart, then let the deadline pass.
        let gate = h.close_gate().await;
        let email = spawn_signal(&h.runtime, &cart_id, CartSignal::update_email("a@b.com"));
        idle().await;
        let removal = spawn_signal(&h.runtime, &cart_id, CartSignal::remove_item(1, 1));
        idle().await;
        tokio::time::advance(TIMEOUT + Duration::from_secs(1)).await;
        drop(gate);

        assert!(email.await.unwrap().unwrap().is_applied());
        assert!(removal.await.unwrap().unwrap().is_applied());
        idle().await;

        assert_eq!(
            h.event_types(&cart_id).await,
            vec![
                "CartOpened",
                "ItemAdded",
                "AbandonmentTimerArmed",
                "EmailUpdated",
                "ItemRemoved",
                "AbandonmentTimerLapsed",
            ]
        );
        assert!(h.notifier.sent().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn later_signals_do_not_send_more_notices() {
        let h = Harness::new();
        let cart_id = CartId::new("CART-AB1");
        let handle = h.runtime.start(cart_id.clone()).await.unwrap();

        add(&h.runtime, &cart_id, 0, 1).await;
        add(&h.runtime, &cart_id, 2, 1).await;

        tokio::time::sleep(TIMEOUT * 2).await;
        settle(&handle).await;

        h.runtime
            .signal(&cart_id, CartSignal::remove_item(0, 1))
            .await
            .unwrap();
        h.runtime
            .signal(&cart_id, CartSignal::remove_item(2, 1))
            .await
            .unwrap();
        add(&h.runtime, &cart_id, 3, 1).await;

        tokio::time::sleep(TIMEOUT * 2).await;
        settle(&handle).await;

        assert_eq!(h.notifier.attempts().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timer_lapses_on_empty_cart_and_rearms() {
        let h = Harness::new();
        let cart_id = CartId::new("CART-AB2");
        let handle = h.runtime.start(cart_id.clone()).await.unwrap();

        add(&h.runtime, &cart_id, 1, 1).await;
        h.runtime
            .signal(&cart_id, CartSignal::remove_item(1, 1))
            .await
            .unwrap();

        tokio::time::sleep(TIMEOUT + Duration::from_secs(1)).await;
        settle(&handle).await;
        assert_eq!(h.notifier.attempts().await, 0);

        add(&h.runtime, &cart_id, 1, 1).await;
        tokio::time::sleep(TIMEOUT + Duration::from_secs(1)).await;
        settle(&handle).await;

        assert_eq!(h.notifier.attempts().await, 1);
        assert!(
            h.event_types(&cart_id)
                .await
                .contains(&"AbandonmentTimerLapsed".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_fires_before_deadline() {
        let h = Harness::new();
        let cart_id = CartId::new("CART-AB3");
        let handle = h.runtime.start(cart_id.clone()).await.unwrap();

        add(&h.runtime, &cart_id, 1, 1).await;
        tokio::time::sleep(TIMEOUT - Duration::from_secs(1)).await;
        settle(&handle).await;

        assert_eq!(h.notifier.attempts().await, 0);
        assert!(!handle.snapshot().notice_sent);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_notice_is_recorded_and_not_retried() {
        let h = Harness::new();
        h.notifier
            .set_failure(Some(NotifyError::Unavailable("smtp down".into())))
            .await;
        let cart_id = CartId::new("CART-AB4");
        let handle = h.runtime.start(cart_id.clone()).await.unwrap();

        add(&h.runtime, &cart_id, 1, 1).await;
        tokio::time::sleep(TIMEOUT * 3).await;
        settle(&handle).await;

        assert_eq!(h.notifier.attempts().await, 1);
        assert!(handle.snapshot().notice_sent);
        assert!(
            h.event_types(&cart_id)
                .await
                .contains(&"AbandonmentNoticeFailed".to_string())
        );

        // Signals keep working after the failure.
        add(&h.runtime, &cart_id, 2, 1).await;
        assert_eq!(handle.state().items.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn checkout_before_deadline_sends_nothing() {
        let h = Harness::new();
        let cart_id = CartId::new("CART-AB5");
        let handle = h.runtime.start(cart_id.clone()).await.unwrap();

        add(&h.runtime, &cart_id, 1, 1).await;
        h.runtime
            .signal(&cart_id, CartSignal::checkout("a@b.com"))
            .await
            .unwrap();
        handle
            .wait_for(|s| s.status == ProcessStatus::Closed)
            .await
            .unwrap();

        tokio::time::sleep(TIMEOUT * 2).await;
        tokio::task::yield_now().await;

        assert_eq!(h.notifier.attempts().await, 0);
    }
}

mod checkout {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn closed_process_leaves_runtime_but_stays_readable() {
        let h = Harness::new();
        let cart_id = CartId::new("CART-CK0");
        let handle = h.runtime.start(cart_id.clone()).await.unwrap();

        add(&h.runtime, &cart_id, 3, 2).await;
        h.runtime
            .signal(&cart_id, CartSignal::checkout("a@b.com"))
            .await
            .unwrap();
        handle
            .wait_for(|s| s.status == ProcessStatus::Closed)
            .await
            .unwrap();

        tokio::time::timeout(Duration::from_secs(1), async {
            while !h.runtime.is_empty().await {
                idle().await;
            }
        })
        .await
        .expect("closed cart still hosted");

        let snapshot = h.runtime.status(&cart_id).await.unwrap();
        assert_eq!(snapshot.status, ProcessStatus::Closed);
        assert_eq!(snapshot.state.items, vec![CartItem::new(3, 2)]);
        assert!(snapshot.receipt_id.is_some());

        let result = h
            .runtime
            .signal(&cart_id, CartSignal::add_item(0, 1))
            .await;
        assert!(matches!(result, Err(WorkflowError::ProcessClosed(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn closed_process_rejects_signals() {
        let h = Harness::new();
        let cart_id = CartId::new("CART-CK1");
        let handle = h.runtime.start(cart_id.clone()).await.unwrap();

        add(&h.runtime, &cart_id, 1, 1).await;
        h.runtime
            .signal(&cart_id, CartSignal::checkout("a@b.com"))
            .await
            .unwrap();
        handle
            .wait_for(|s| s.status == ProcessStatus::Closed)
            .await
            .unwrap();

        let result = h
            .runtime
            .signal(&cart_id, CartSignal::add_item(2, 1))
            .await;
        assert!(matches!(result, Err(WorkflowError::ProcessClosed(_))));
        assert_eq!(
            h.runtime.query(&cart_id).await.unwrap().items,
            vec![CartItem::new(1, 1)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn signals_queued_during_charge_see_closed_process() {
        let h = Harness::new();
        h.payments.set_latency(Some(Duration::from_secs(5))).await;
        let cart_id = CartId::new("CART-CK2");
        h.runtime.start(cart_id.clone()).await.unwrap();

        add(&h.runtime, &cart_id, 1, 1).await;
        let ack = h
            .runtime
            .signal(&cart_id, CartSignal::checkout("a@b.com"))
            .await
            .unwrap();
        assert!(ack.is_applied());

        let status = h.runtime.status(&cart_id).await.unwrap();
        assert_eq!(status.status, ProcessStatus::CheckingOut);

        let result = h
            .runtime
            .signal(&cart_id, CartSignal::add_item(2, 1))
            .await;
        assert!(matches!(result, Err(WorkflowError::ProcessClosed(_))));
        assert_eq!(
            h.runtime.status(&cart_id).await.unwrap().status,
            ProcessStatus::Closed
        );
    }

    #[tokio::test(start_paused = true)]
    async fn declined_charge_reopens_cart() {
        let h = Harness::new();
        h.payments.set_decline_all(true).await;
        let cart_id = CartId::new("CART-CK3");
        let handle = h.runtime.start(cart_id.clone()).await.unwrap();

        add(&h.runtime, &cart_id, 1, 1).await;
        h.runtime
            .signal(&cart_id, CartSignal::checkout("a@b.com"))
            .await
            .unwrap();

        let snapshot = handle
            .wait_for(|s| s.status == ProcessStatus::Open && s.checkout_attempts == 1)
            .await
            .unwrap();
        assert!(snapshot.receipt_id.is_none());

        // A second attempt with a working card goes through under a new key.
        h.payments.set_decline_all(false).await;
        add(&h.runtime, &cart_id, 2, 1).await;
        h.runtime
            .signal(&cart_id, CartSignal::checkout("a@b.com"))
            .await
            .unwrap();
        handle
            .wait_for(|s| s.status == ProcessStatus::Closed)
            .await
            .unwrap();

        let charges = h.payments.charges().await;
        assert_eq!(charges.len(), 1);
        assert_eq!(charges[0].idempotency_key, "CART-CK3:checkout:2");
        assert_eq!(charges[0].amount.cents(), 69_900 + 39_900);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_gateway_times_out_as_failure() {
        let options = ProcessOptions::default().with_charge_timeout(Duration::from_secs(2));
        let h = Harness::with(InMemoryJournal::new(), options);
        h.payments.set_latency(Some(Duration::from_secs(30))).await;
        let cart_id = CartId::new("CART-CK4");
        let handle = h.runtime.start(cart_id.clone()).await.unwrap();

        add(&h.runtime, &cart_id, 1, 1).await;
        h.runtime
            .signal(&cart_id, CartSignal::checkout("a@b.com"))
            .await
            .unwrap();

        handle
            .wait_for(|s| s.status == ProcessStatus::Open && s.checkout_attempts == 1)
            .await
            .unwrap();
        assert!(
            h.event_types(&cart_id)
                .await
                .contains(&"PaymentFailed".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn transient_gateway_errors_are_retried() {
        let h = Harness::new();
        h.payments.fail_transiently(2).await;
        let cart_id = CartId::new("CART-CK5");
        let handle = h.runtime.start(cart_id.clone()).await.unwrap();

        add(&h.runtime, &cart_id, 1, 1).await;
        h.runtime
            .signal(&cart_id, CartSignal::checkout("a@b.com"))
            .await
            .unwrap();
        handle
            .wait_for(|s| s.status == ProcessStatus::Closed)
            .await
            .unwrap();

        assert_eq!(h.payments.call_count().await, 3);
        assert_eq!(h.payments.charge_count().await, 1);
    }
}

mod signals {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn invalid_quantity_is_ignored() {
        let h = Harness::new();
        let cart_id = CartId::new("CART-S1");
        h.runtime.start(cart_id.clone()).await.unwrap();

        let ack = h
            .runtime
            .signal(&cart_id, CartSignal::add_item(1, 0))
            .await
            .unwrap();

        assert!(matches!(ack.outcome, SignalOutcome::Ignored { .. }));
        assert!(h.runtime.query(&cart_id).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn undecodable_body_is_rejected() {
        let h = Harness::new();
        let cart_id = CartId::new("CART-S2");
        h.runtime.start(cart_id.clone()).await.unwrap();

        let result = h
            .runtime
            .signal_raw(&cart_id, serde_json::json!({"route": "ADD_TO_CART"}))
            .await;
        assert!(matches!(result, Err(WorkflowError::InvalidSignal(_))));

        let ack = h
            .runtime
            .signal_raw(
                &cart_id,
                serde_json::json!({"route": "ADD_TO_CART", "productId": 2, "quantity": 3}),
            )
            .await
            .unwrap();
        assert!(ack.is_applied());
    }

    #[tokio::test(start_paused = true)]
    async fn strict_policy_ignores_unknown_products() {
        let options = ProcessOptions::default().with_product_policy(ProductPolicy::Strict);
        let h = Harness::with(InMemoryJournal::new(), options);
        let cart_id = CartId::new("CART-S3");
        h.runtime.start(cart_id.clone()).await.unwrap();

        let ack = h
            .runtime
            .signal(&cart_id, CartSignal::add_item(42, 1))
            .await
            .unwrap();

        assert!(!ack.is_applied());
        assert!(h.runtime.query(&cart_id).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn every_ack_is_visible_to_the_next_query() {
        let h = Harness::new();
        let cart_id = CartId::new("CART-S4");
        h.runtime.start(cart_id.clone()).await.unwrap();

        for quantity in 1..=20 {
            let ack = h
                .runtime
                .signal(&cart_id, CartSignal::add_item(0, 1))
                .await
                .unwrap();
            let snapshot = h.runtime.status(&cart_id).await.unwrap();

            assert_eq!(snapshot.sequence, ack.sequence);
            assert_eq!(snapshot.state.items[0].quantity, quantity);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_cart_is_not_found() {
        let h = Harness::new();
        let result = h.runtime.query(&CartId::new("CART-NOPE")).await;
        assert!(matches!(result, Err(WorkflowError::NotFound(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn start_twice_fails() {
        let h = Harness::new();
        let cart_id = CartId::new("CART-S5");
        h.runtime.start(cart_id.clone()).await.unwrap();

        let result = h.runtime.start(cart_id.clone()).await;
        assert!(matches!(result, Err(WorkflowError::AlreadyStarted(_))));

        // The journal remembers the cart even after the runtime forgets it.
        h.runtime.shutdown().await;
        let result = h.runtime.start(cart_id).await;
        assert!(matches!(result, Err(WorkflowError::AlreadyStarted(_))));
    }
}

mod registry {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn queries_are_served_while_another_cart_starts() {
        let h = Harness::new();
        let ready = CartId::new("CART-G1");
        h.runtime.start(ready.clone()).await.unwrap();
        add(&h.runtime, &ready, 1, 1).await;

        let gate = h.close_gate().await;
        let starting = tokio::spawn({
            let runtime = h.runtime.clone();
            async move { runtime.start(CartId::new("CART-G2")).await }
        });
        idle().await;

        let state = tokio::time::timeout(Duration::from_secs(1), h.runtime.query(&ready))
            .await
            .expect("query waited on another cart's journal write")
            .unwrap();
        assert_eq!(state.items, vec![CartItem::new(1, 1)]);

        drop(gate);
        assert!(starting.await.unwrap().is_ok());
        assert_eq!(h.runtime.len().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn queries_are_served_while_recovery_replays() {
        let h = Harness::new();
        let cart_id = CartId::new("CART-G3");
        h.runtime.start(cart_id.clone()).await.unwrap();
        add(&h.runtime, &cart_id, 2, 1).await;

        let gate = h.close_gate().await;
        let recovering = tokio::spawn({
            let runtime = h.runtime.clone();
            async move { runtime.recover().await }
        });
        idle().await;

        let snapshot = tokio::time::timeout(Duration::from_secs(1), h.runtime.status(&cart_id))
            .await
            .expect("status waited on recovery")
            .unwrap();
        assert_eq!(snapshot.state.items, vec![CartItem::new(2, 1)]);

        drop(gate);
        let report = recovering.await.unwrap().unwrap();
        assert!(report.resumed.is_empty());
        assert!(report.closed.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_starts_have_one_winner() {
        let h = Harness::new();
        let cart_id = CartId::new("CART-G4");

        let (first, second) = tokio::join!(
            h.runtime.start(cart_id.clone()),
            h.runtime.start(cart_id.clone())
        );

        let (winner, loser) = if first.is_ok() {
            (first, second)
        } else {
            (second, first)
        };
        assert!(winner.is_ok());
        assert!(matches!(loser, Err(WorkflowError::AlreadyStarted(_))));
        assert_eq!(h.event_types(&cart_id).await, vec!["CartOpened"]);
        assert_eq!(h.runtime.len().await, 1);
    }
}

mod recovery {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn open_cart_resumes_with_its_state() {
        let h = Harness::new();
        let cart_id = CartId::new("CART-R1");
        h.runtime.start(cart_id.clone()).await.unwrap();
        add(&h.runtime, &cart_id, 1, 2).await;
        h.runtime.shutdown().await;

        let restarted = h.restarted();
        let report = restarted.runtime.recover().await.unwrap();

        assert_eq!(report.resumed, vec![cart_id.clone()]);
        assert!(report.closed.is_empty());
        assert_eq!(
            restarted.runtime.query(&cart_id).await.unwrap().items,
            vec![CartItem::new(1, 2)]
        );

        add(&restarted.runtime, &cart_id, 1, 1).await;
        assert_eq!(
            restarted.runtime.query(&cart_id).await.unwrap().items,
            vec![CartItem::new(1, 3)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn armed_timer_survives_restart() {
        let h = Harness::new();
        let cart_id = CartId::new("CART-R2");
        h.runtime.start(cart_id.clone()).await.unwrap();
        add(&h.runtime, &cart_id, 1, 1).await;
        h.runtime
            .signal(&cart_id, CartSignal::update_email("x@y.com"))
            .await
            .unwrap();
        h.runtime.shutdown().await;

        let restarted = h.restarted();
        restarted.runtime.recover().await.unwrap();
        let handle = restarted.runtime.handle(&cart_id).await.unwrap();

        tokio::time::sleep(TIMEOUT + Duration::from_secs(1)).await;
        settle(&handle).await;

        assert_eq!(h.notifier.attempts().await, 0);
        let sent = restarted.notifier.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "x@y.com");
    }

    #[tokio::test(start_paused = true)]
    async fn sent_notice_is_not_repeated() {
        let h = Harness::new();
        let cart_id = CartId::new("CART-R3");
        let handle = h.runtime.start(cart_id.clone()).await.unwrap();
        add(&h.runtime, &cart_id, 1, 1).await;
        tokio::time::sleep(TIMEOUT + Duration::from_secs(1)).await;
        settle(&handle).await;
        assert_eq!(h.notifier.attempts().await, 1);
        h.runtime.shutdown().await;

        let restarted = h.restarted();
        restarted.runtime.recover().await.unwrap();
        let handle = restarted.runtime.handle(&cart_id).await.unwrap();
        assert!(handle.snapshot().notice_sent);

        tokio::time::sleep(TIMEOUT * 3).await;
        settle(&handle).await;

        assert_eq!(restarted.notifier.attempts().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_charge_completes_without_double_charge() {
        let journal = InMemoryJournal::new();
        let history = History::new(Arc::new(journal.clone()));
        let catalog = Catalog::default();
        let rules = CartRules::new(Arc::new(catalog.clone()));
        let cart_id = CartId::new("CART-R4");

        // The previous run got as far as charging but crashed before the
        // outcome was journalled.
        let mut process = CartProcess::default();
        let events = process.open(cart_id.clone(), Utc::now()).unwrap();
        history.record(&cart_id, &mut process, events).await.unwrap();
        for signal in [CartSignal::add_item(1, 1), CartSignal::checkout("a@b.com")] {
            let events = process.handle_signal(&signal, &rules, Utc::now()).unwrap();
            history.record(&cart_id, &mut process, events).await.unwrap();
        }
        assert_eq!(process.status(), ProcessStatus::CheckingOut);

        let h = Harness::with(journal, ProcessOptions::default());
        let request = process.charge_request(&catalog).unwrap();
        let first = h.payments.charge(&request).await.unwrap();

        let report = h.runtime.recover().await.unwrap();
        assert_eq!(report.resumed, vec![cart_id.clone()]);

        let handle = h.runtime.handle(&cart_id).await.unwrap();
        let snapshot = handle
            .wait_for(|s| s.status == ProcessStatus::Closed)
            .await
            .unwrap();

        assert_eq!(snapshot.receipt_id, Some(first.receipt_id));
        assert_eq!(h.payments.charge_count().await, 1);
        assert_eq!(h.payments.call_count().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn closed_cart_stays_closed() {
        let h = Harness::new();
        let cart_id = CartId::new("CART-R5");
        let handle = h.runtime.start(cart_id.clone()).await.unwrap();
        add(&h.runtime, &cart_id, 1, 1).await;
        h.runtime
            .signal(&cart_id, CartSignal::checkout("a@b.com"))
            .await
            .unwrap();
        handle
            .wait_for(|s| s.status == ProcessStatus::Closed)
            .await
            .unwrap();
        h.runtime.shutdown().await;

        let restarted = h.restarted();
        let report = restarted.runtime.recover().await.unwrap();
        assert_eq!(report.closed, vec![cart_id.clone()]);

        let snapshot = restarted.runtime.status(&cart_id).await.unwrap();
        assert_eq!(snapshot.status, ProcessStatus::Closed);
        assert_eq!(snapshot.state.email, "a@b.com");

        let result = restarted
            .runtime
            .signal(&cart_id, CartSignal::update_email("z@z.z"))
            .await;
        assert!(matches!(result, Err(WorkflowError::ProcessClosed(_))));
        assert_eq!(restarted.payments.call_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn replayed_journal_matches_live_process() {
        let h = Harness::new();
        let cart_id = CartId::new("CART-R6");
        let handle = h.runtime.start(cart_id.clone()).await.unwrap();
        add(&h.runtime, &cart_id, 0, 2).await;
        add(&h.runtime, &cart_id, 3, 1).await;
        h.runtime
            .signal(&cart_id, CartSignal::remove_item(0, 1))
            .await
            .unwrap();

        let history = History::new(Arc::new(h.journal.clone()));
        let replayed = history.load(&cart_id).await.unwrap().unwrap();
        let live = handle.snapshot();

        assert_eq!(replayed.state(), &live.state);
        assert_eq!(replayed.status(), live.status);
        assert!(matches!(
            h.journal.read_stream(&cart_id).await.unwrap()[0]
                .decode::<CartEvent>()
                .unwrap(),
            CartEvent::CartOpened(_)
        ));
    }
}
