// End-to-end lifecycle scenarios against the in-memory store

mod fixtures;

use async_trait::async_trait;
use chrono::Duration;
use delivery_lifecycle::lifecycle::DeliveryStatus::*;
use delivery_lifecycle::lifecycle::{ErrorKind, LedgerViolation};
use delivery_lifecycle::{
    Actor, AnnotateMetadata, AssignmentEdit, Delivery, InMemoryStore, LifecycleError, ManualClock,
    PersistenceStore, StateGraph, StatusUpdate, TransitionExecutor, TransitionMetadata,
};
use fixtures::{ops, owner, t0, Harness, HAPPY_PATH};
use std::sync::Arc;
use tokio::sync::Barrier;

#[tokio::test]
async fn pending_delivery_is_promoted_when_assignment_completes() {
    let h = Harness::new();
    h.pending("TRK-100").await;

    let outcome = h
        .executor
        .apply_assignment_edit(
            "TRK-100",
            &ops(),
            AssignmentEdit::default().assign_driver("drv-1").assign_vehicle("VAN-1"),
        )
        .await
        .unwrap();

    assert_eq!(outcome.delivery.status, Assigned);
    let entries = h.executor.ledger().history("TRK-100").collect_all().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!((entries[0].from, entries[0].to), (Pending, Assigned));
    assert_eq!(entries[0].actor, ops());
}

#[tokio::test]
async fn owner_driver_starts_the_run() {
    let h = Harness::new();
    h.assigned("TRK-101").await;
    h.clock.advance(Duration::minutes(5));

    let outcome = h
        .executor
        .request_transition("TRK-101", InProgress, &owner(), TransitionMetadata::default())
        .await
        .unwrap();

    assert_eq!(outcome.delivery.status, InProgress);
    assert_eq!(outcome.delivery.milestones.started_at, Some(t0() + Duration::minutes(5)));
    assert_eq!((outcome.status_update.from, outcome.status_update.to), (Assigned, InProgress));
    assert_eq!(outcome.status_update.actor, owner());
}

#[tokio::test]
async fn delivered_delivery_cannot_be_cancelled() {
    let h = Harness::new();
    h.assigned("TRK-102").await;
    h.walk("TRK-102", &HAPPY_PATH).await;
    let before = h.store.ledger_len("TRK-102").await;

    let err = h
        .executor
        .request_transition("TRK-102", Cancelled, &ops(), TransitionMetadata::default())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidTransition);
    assert_eq!(h.store.ledger_len("TRK-102").await, before);
    assert_eq!(h.store.load("TRK-102").await.unwrap().status, Delivered);
}

#[tokio::test]
async fn annotation_in_transit_records_location_only() {
    let h = Harness::new();
    h.assigned("TRK-103").await;
    h.walk("TRK-103", &[InProgress, PickedUp, InTransit]).await;

    let entry = h
        .executor
        .request_annotate("TRK-103", &owner(), AnnotateMetadata::location("A7 exit 12"))
        .await
        .unwrap();

    assert_eq!((entry.from, entry.to), (InTransit, InTransit));
    assert_eq!(entry.location.as_deref(), Some("A7 exit 12"));
    let delivery = h.store.load("TRK-103").await.unwrap();
    assert_eq!(delivery.status, InTransit);
    assert_eq!(delivery.current_location.as_deref(), Some("A7 exit 12"));
}

#[tokio::test]
async fn delay_without_issue_report_writes_nothing() {
    let h = Harness::new();
    h.assigned("TRK-104").await;
    h.walk("TRK-104", &[InProgress, PickedUp, InTransit]).await;
    let snapshot = h.store.snapshot().await;

    let err = h
        .executor
        .request_transition(
            "TRK-104",
            Delayed,
            &owner(),
            TransitionMetadata::default().with_notes("stuck"),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, LifecycleError::Validation { field: "issue_type", .. }));
    assert!(err.is_retryable());
    assert_eq!(h.store.snapshot().await, snapshot);
}

#[tokio::test]
async fn failed_delivery_can_be_retried_and_delivered() {
    let h = Harness::new();
    h.assigned("TRK-105").await;
    h.walk("TRK-105", &[InProgress, PickedUp, InTransit, OutForDelivery]).await;

    let failed = h
        .executor
        .request_transition(
            "TRK-105",
            FailedDelivery,
            &owner(),
            TransitionMetadata::default().with_issue("WRONG_ADDRESS", "house number does not exist"),
        )
        .await
        .unwrap();
    assert_eq!(failed.status_update.issue.unwrap().description, "house number does not exist");

    // Retrying is an administrative decision
    let err = h
        .executor
        .request_transition("TRK-105", OutForDelivery, &owner(), TransitionMetadata::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);

    let delivery = h.walk("TRK-105", &[OutForDelivery]).await;
    let first_out = delivery.milestones.out_for_delivery_at;
    let delivered = h
        .executor
        .request_transition("TRK-105", Delivered, &owner(), TransitionMetadata::default())
        .await
        .unwrap();
    assert_eq!(delivered.delivery.milestones.out_for_delivery_at, first_out);
    assert!(delivered.delivery.milestones.delivered_at.is_some());
    assert!(delivered.delivery.is_terminal());
}

#[tokio::test]
async fn returned_delivery_can_be_reassigned() {
    let h = Harness::new();
    h.assigned("TRK-106").await;
    let delivery = h
        .walk("TRK-106", &[InProgress, FailedDelivery, Returned, Assigned, InProgress])
        .await;
    assert_eq!(delivery.status, InProgress);
    let audit = h.executor.ledger().verify(&delivery).await.unwrap();
    assert!(audit.is_consistent(), "{:?}", audit.violations);
    assert_eq!(audit.entries, 6);
}

/// Lets every racing request load the delivery before any of them writes
struct GatedStore {
    inner: Arc<InMemoryStore>,
    gate: Barrier,
}

#[async_trait]
impl PersistenceStore for GatedStore {
    async fn create(&self, delivery: &Delivery) -> Result<(), LifecycleError> {
        self.inner.create(delivery).await
    }

    async fn load(&self, tracking_code: &str) -> Result<Delivery, LifecycleError> {
        let delivery = self.inner.load(tracking_code).await?;
        self.gate.wait().await;
        Ok(delivery)
    }

    async fn save(&self, delivery: &Delivery) -> Result<Delivery, LifecycleError> {
        self.inner.save(delivery).await
    }

    async fn save_with_ledger_entry(
        &self,
        delivery: &Delivery,
        entry: &StatusUpdate,
    ) -> Result<Delivery, LifecycleError> {
        self.inner.save_with_ledger_entry(delivery, entry).await
    }

    async fn ledger_page(
        &self,
        tracking_code: &str,
        after_sequence: u64,
        limit: usize,
    ) -> Result<Vec<StatusUpdate>, LifecycleError> {
        self.inner.ledger_page(tracking_code, after_sequence, limit).await
    }
}

#[tokio::test]
async fn concurrent_start_and_cancel_commit_exactly_once() {
    let h = Harness::new();
    h.assigned("TRK-107").await;

    let gated = Arc::new(GatedStore {
        inner: Arc::clone(&h.store),
        gate: Barrier::new(2),
    });
    let racing = Arc::new(TransitionExecutor::new(gated, Arc::clone(&h.clock)));

    let start = {
        let racing = Arc::clone(&racing);
        tokio::spawn(async move {
            racing
                .request_transition("TRK-107", InProgress, &owner(), TransitionMetadata::default())
                .await
        })
    };
    let cancel = {
        let racing = Arc::clone(&racing);
        tokio::spawn(async move {
            racing
                .request_transition("TRK-107", Cancelled, &ops(), TransitionMetadata::default())
                .await
        })
    };

    let results = [start.await.unwrap(), cancel.await.unwrap()];
    let committed = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(committed, 1, "{results:?}");
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert!(
            matches!(
                err.kind(),
                ErrorKind::ConcurrencyConflict | ErrorKind::InvalidTransition
            ),
            "{err:?}"
        );
    }

    assert_eq!(h.store.ledger_len("TRK-107").await, 2);
    let delivery = h.store.load("TRK-107").await.unwrap();
    let audit = h.executor.ledger().verify(&delivery).await.unwrap();
    assert!(audit.is_consistent());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn deliveries_progress_independently() {
    let store = Arc::new(InMemoryStore::new());
    let executor = Arc::new(TransitionExecutor::new(Arc::clone(&store), Arc::new(ManualClock::new(t0()))));
    for n in 0..8 {
        let code = format!("TRK-2{n:02}");
        executor.create_delivery(&code, Default::default(), &ops()).await.unwrap();
        executor
            .apply_assignment_edit(
                &code,
                &ops(),
                AssignmentEdit::default().assign_driver(format!("drv-{n}")).assign_vehicle("VAN-1"),
            )
            .await
            .unwrap();
    }

    let mut handles = Vec::new();
    for n in 0..8 {
        let executor = Arc::clone(&executor);
        handles.push(tokio::spawn(async move {
            let code = format!("TRK-2{n:02}");
            let driver = Actor::driver(format!("drv-{n}"));
            for to in [InProgress, PickedUp, InTransit] {
                executor
                    .request_transition(&code, to, &driver, TransitionMetadata::default())
                    .await?;
            }
            Ok::<_, LifecycleError>(())
        }));
    }
    for result in futures::future::join_all(handles).await {
        result.unwrap().unwrap();
    }

    for code in store.tracking_codes().await {
        let delivery = store.load(&code).await.unwrap();
        assert_eq!(delivery.status, InTransit);
        assert_eq!(delivery.ledger_head, 4);
    }
}

#[tokio::test]
async fn available_actions_match_enforcement() {
    let h = Harness::new();
    h.assigned("TRK-108").await;
    h.walk("TRK-108", &[InProgress, PickedUp]).await;
    let graph = StateGraph::canonical();

    for actor in [ops(), owner(), Actor::driver("drv-2"), Actor::other("auditor")] {
        let delivery = h.store.load("TRK-108").await.unwrap();
        let listed: Vec<_> = h
            .executor
            .list_available_actions("TRK-108", &actor)
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.target_status)
            .collect();
        for to in graph.legal_next(delivery.status) {
            let allowed = h.executor.authorizer().can_perform(&actor, &delivery, to);
            assert_eq!(listed.contains(&to), allowed, "{actor:?} -> {to}");
        }
    }
}

#[tokio::test]
async fn tampered_ledger_is_reported() {
    let h = Harness::new();
    h.assigned("TRK-109").await;
    h.walk("TRK-109", &[InProgress, PickedUp]).await;

    let mut snapshot = h.store.snapshot().await;
    let ledger = snapshot.ledgers.get_mut("TRK-109").unwrap();
    ledger.remove(1);
    let tampered = InMemoryStore::from_snapshot(snapshot);

    let delivery = tampered.load("TRK-109").await.unwrap();
    let entries = tampered.ledger_page("TRK-109", 0, 100).await.unwrap();
    let audit = delivery_lifecycle::lifecycle::audit(&delivery, &entries, &StateGraph::canonical());
    assert!(!audit.is_consistent());
    assert!(audit
        .violations
        .iter()
        .any(|v| matches!(v, LedgerViolation::SequenceGap { expected: 2, found: 3 })));
}
