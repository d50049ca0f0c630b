use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::debug;

use crate::lifecycle::error::{LifecycleError, Result};
use crate::lifecycle::traits::PersistenceStore;
use crate::lifecycle::types::{Delivery, StatusUpdate};

/// Serializable image of a store: every delivery and its ledger
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub deliveries: BTreeMap<String, Delivery>,
    #[serde(default)]
    pub ledgers: BTreeMap<String, Vec<StatusUpdate>>,
}

/// Process-local store. One write lock covers the delivery row and its
/// ledger, so a commit is all-or-nothing and writes are serialized.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<StoreSnapshot>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        Self {
            inner: RwLock::new(snapshot),
        }
    }

    pub async fn snapshot(&self) -> StoreSnapshot {
        self.inner.read().await.clone()
    }

    pub async fn tracking_codes(&self) -> Vec<String> {
        self.inner.read().await.deliveries.keys().cloned().collect()
    }

    pub async fn ledger_len(&self, tracking_code: &str) -> usize {
        self.inner
            .read()
            .await
            .ledgers
            .get(tracking_code)
            .map_or(0, Vec::len)
    }
}

fn check_version(stored: &Delivery, incoming: &Delivery) -> Result<()> {
    if stored.version != incoming.version {
        return Err(LifecycleError::ConcurrencyConflict {
            tracking_code: incoming.tracking_code.clone(),
            expected: incoming.version,
            found: stored.version,
        });
    }
    Ok(())
}

#[async_trait]
impl PersistenceStore for InMemoryStore {
    async fn create(&self, delivery: &Delivery) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.deliveries.contains_key(&delivery.tracking_code) {
            return Err(LifecycleError::AlreadyExists {
                tracking_code: delivery.tracking_code.clone(),
            });
        }
        inner
            .deliveries
            .insert(delivery.tracking_code.clone(), delivery.clone());
        inner
            .ledgers
            .insert(delivery.tracking_code.clone(), Vec::new());
        Ok(())
    }

    async fn load(&self, tracking_code: &str) -> Result<Delivery> {
        self.inner
            .read()
            .await
            .deliveries
            .get(tracking_code)
            .cloned()
            .ok_or_else(|| LifecycleError::not_found(tracking_code))
    }

    async fn save(&self, delivery: &Delivery) -> Result<Delivery> {
        let mut inner = self.inner.write().await;
        let stored = inner
            .deliveries
            .get(&delivery.tracking_code)
            .ok_or_else(|| LifecycleError::not_found(&delivery.tracking_code))?;
        check_version(stored, delivery)?;
        if stored.ledger_head != delivery.ledger_head || stored.status != delivery.status {
            return Err(LifecycleError::Storage(format!(
                "plain save of {} may not change its status or ledger",
                delivery.tracking_code
            )));
        }

        let mut committed = delivery.clone();
        committed.version += 1;
        inner
            .deliveries
            .insert(committed.tracking_code.clone(), committed.clone());
        debug!(tracking_code = %committed.tracking_code, version = committed.version, "Delivery saved");
        Ok(committed)
    }

    async fn save_with_ledger_entry(&self, delivery: &Delivery, entry: &StatusUpdate) -> Result<Delivery> {
        let mut inner = self.inner.write().await;
        let stored = inner
            .deliveries
            .get(&delivery.tracking_code)
            .ok_or_else(|| LifecycleError::not_found(&delivery.tracking_code))?;
        check_version(stored, delivery)?;
        if entry.tracking_code != delivery.tracking_code
            || entry.sequence != stored.ledger_head + 1
            || delivery.ledger_head != entry.sequence
        {
            return Err(LifecycleError::Storage(format!(
                "ledger entry {} does not continue the ledger of {} at {}",
                entry.sequence, delivery.tracking_code, stored.ledger_head
            )));
        }

        let mut committed = delivery.clone();
        committed.version += 1;
        inner
            .deliveries
            .insert(committed.tracking_code.clone(), committed.clone());
        inner
            .ledgers
            .entry(committed.tracking_code.clone())
            .or_default()
            .push(entry.clone());
        debug!(
            tracking_code = %committed.tracking_code,
            version = committed.version,
            sequence = entry.sequence,
            "Delivery saved with ledger entry"
        );
        Ok(committed)
    }

    async fn ledger_page(
        &self,
        tracking_code: &str,
        after_sequence: u64,
        limit: usize,
    ) -> Result<Vec<StatusUpdate>> {
        let inner = self.inner.read().await;
        if !inner.deliveries.contains_key(tracking_code) {
            return Err(LifecycleError::not_found(tracking_code));
        }
        Ok(inner
            .ledgers
            .get(tracking_code)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|entry| entry.sequence > after_sequence)
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
