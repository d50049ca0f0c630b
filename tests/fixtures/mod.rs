//! Shared fixtures for the lifecycle integration tests
#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use delivery_lifecycle::lifecycle::DeliveryStatus::*;
use delivery_lifecycle::{
    Actor, AssignmentEdit, Delivery, DeliveryStatus, InMemoryStore, ManualClock, PersistenceStore,
    Priority, TransitionExecutor, TransitionMetadata,
};
use std::sync::Arc;

/// Sequence from assignment to handover
pub const HAPPY_PATH: [DeliveryStatus; 5] = [InProgress, PickedUp, InTransit, OutForDelivery, Delivered];

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 3, 7, 30, 0).unwrap()
}

pub fn ops() -> Actor {
    Actor::admin("ops-1")
}

pub fn owner() -> Actor {
    Actor::driver("drv-1")
}

pub struct Harness {
    pub executor: TransitionExecutor<InMemoryStore, Arc<ManualClock>>,
    pub store: Arc<InMemoryStore>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(ManualClock::new(t0()));
        Self {
            executor: TransitionExecutor::new(Arc::clone(&store), Arc::clone(&clock)),
            store,
            clock,
        }
    }

    /// PENDING delivery with no driver or vehicle
    pub async fn pending(&self, code: &str) -> Delivery {
        self.executor
            .create_delivery(code, Priority::Normal, &ops())
            .await
            .expect("create delivery")
    }

    /// ASSIGNED delivery owned by [`owner`]
    pub async fn assigned(&self, code: &str) -> Delivery {
        self.pending(code).await;
        self.executor
            .apply_assignment_edit(
                code,
                &ops(),
                AssignmentEdit::default().assign_driver(owner().id).assign_vehicle("VAN-7"),
            )
            .await
            .expect("assign delivery")
            .delivery
    }

    /// Walk `code` through `path` as an administrator, filing issue reports where needed
    pub async fn walk(&self, code: &str, path: &[DeliveryStatus]) -> Delivery {
        for &to in path {
            let metadata = if to.requires_issue_report() {
                TransitionMetadata::default().with_issue("TRAFFIC_DELAY", "jam on the ring road")
            } else {
                TransitionMetadata::default()
            };
            self.executor
                .request_transition(code, to, &ops(), metadata)
                .await
                .unwrap_or_else(|e| panic!("{code} -> {to}: {e}"));
        }
        self.store.load(code).await.expect("load delivery")
    }
}
