// Traits for dependency injection - the collaborators the lifecycle core relies on

use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[cfg(any(test, feature = "testing"))]
use mockall::automock;

use super::error::Result;
use super::types::{Actor, Delivery, StatusUpdate};

/// Storage for deliveries and their ledgers.
///
/// Writes are version-checked: `delivery.version` must be the version
/// that was loaded, otherwise the write fails with
/// `LifecycleError::ConcurrencyConflict` and nothing is stored. A
/// successful write stores the delivery with `version + 1`.
#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait PersistenceStore: Send + Sync {
    /// Register a freshly created delivery
    async fn create(&self, delivery: &Delivery) -> Result<()>;

    /// Load the current state of a delivery
    async fn load(&self, tracking_code: &str) -> Result<Delivery>;

    /// Persist a field edit that does not touch the ledger
    async fn save(&self, delivery: &Delivery) -> Result<Delivery>;

    /// Persist the delivery and append one ledger entry as a single atomic unit
    async fn save_with_ledger_entry(&self, delivery: &Delivery, entry: &StatusUpdate) -> Result<Delivery>;

    /// Ledger entries with `sequence > after_sequence`, oldest first, at most `limit`
    async fn ledger_page(
        &self,
        tracking_code: &str,
        after_sequence: u64,
        limit: usize,
    ) -> Result<Vec<StatusUpdate>>;
}

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Supplies the calling actor
pub trait IdentityResolver {
    fn resolve(&self) -> Result<Actor>;
}
