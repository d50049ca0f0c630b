// Test doubles and fixtures for the lifecycle core

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::clock::ManualClock;
use super::error::Result;
use super::executor::TransitionExecutor;
use super::traits::PersistenceStore;
use super::types::*;
use crate::persistence::InMemoryStore;

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
}

pub type TestExecutor<S> = TransitionExecutor<S, Arc<ManualClock>>;

/// Executor over a fresh in-memory store and a manual clock at [`t0`]
pub fn executor() -> (TestExecutor<InMemoryStore>, Arc<InMemoryStore>, Arc<ManualClock>) {
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(ManualClock::new(t0()));
    let executor = TransitionExecutor::new(Arc::clone(&store), Arc::clone(&clock));
    (executor, store, clock)
}

pub fn ops() -> Actor {
    Actor::admin("ops-1")
}

/// Create `code` and assign it to `driver_id` with vehicle `VAN-1`
pub async fn seed_assigned<S: PersistenceStore + ?Sized>(
    executor: &TestExecutor<S>,
    code: &str,
    driver_id: &str,
) -> Delivery {
    executor
        .create_delivery(code, Priority::Normal, &ops())
        .await
        .unwrap();
    executor
        .apply_assignment_edit(
            code,
            &ops(),
            AssignmentEdit::default()
                .assign_driver(driver_id)
                .assign_vehicle("VAN-1"),
        )
        .await
        .unwrap()
        .delivery
}

/// Walk `code` through `path` as an administrator
pub async fn advance_to<S: PersistenceStore + ?Sized>(
    executor: &TestExecutor<S>,
    code: &str,
    path: &[DeliveryStatus],
) -> Delivery {
    let mut last = None;
    for &to in path {
        let metadata = if to.requires_issue_report() {
            TransitionMetadata::default().with_issue("WEATHER_DELAY", "storm over the depot")
        } else {
            TransitionMetadata::default()
        };
        last = Some(
            executor
                .request_transition(code, to, &ops(), metadata)
                .await
                .unwrap()
                .delivery,
        );
    }
    match last {
        Some(delivery) => delivery,
        None => executor.store().load(code).await.unwrap(),
    }
}

/// In-memory store where another writer gets in between the executor's
/// load and its write, a configurable number of times
#[derive(Debug, Default)]
pub struct InterleavingStore {
    pub inner: InMemoryStore,
    competing_writes: AtomicUsize,
    pub writes_attempted: Mutex<Vec<String>>,
}

impl InterleavingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interleave(&self, times: usize) {
        self.competing_writes.store(times, Ordering::SeqCst);
    }

    pub fn attempted(&self) -> Vec<String> {
        self.writes_attempted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    async fn maybe_compete(&self, tracking_code: &str) -> Result<()> {
        let pending = self.competing_writes.load(Ordering::SeqCst);
        if pending == 0 {
            return Ok(());
        }
        self.competing_writes.store(pending - 1, Ordering::SeqCst);
        let mut current = self.inner.load(tracking_code).await?;
        current.notes = Some("edited by another request".to_string());
        self.inner.save(&current).await?;
        Ok(())
    }

    fn record(&self, call: &str) {
        self.writes_attempted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call.to_string());
    }
}

#[async_trait]
impl PersistenceStore for InterleavingStore {
    async fn create(&self, delivery: &Delivery) -> Result<()> {
        self.inner.create(delivery).await
    }

    async fn load(&self, tracking_code: &str) -> Result<Delivery> {
        self.inner.load(tracking_code).await
    }

    async fn save(&self, delivery: &Delivery) -> Result<Delivery> {
        self.record("save");
        self.maybe_compete(&delivery.tracking_code).await?;
        self.inner.save(delivery).await
    }

    async fn save_with_ledger_entry(&self, delivery: &Delivery, entry: &StatusUpdate) -> Result<Delivery> {
        self.record("save_with_ledger_entry");
        self.maybe_compete(&delivery.tracking_code).await?;
        self.inner.save_with_ledger_entry(delivery, entry).await
    }

    async fn ledger_page(
        &self,
        tracking_code: &str,
        after_sequence: u64,
        limit: usize,
    ) -> Result<Vec<StatusUpdate>> {
        self.inner.ledger_page(tracking_code, after_sequence, limit).await
    }
}
