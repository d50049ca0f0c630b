// Store implementations behind the PersistenceStore trait

pub mod memory;
pub mod snapshot;

pub use memory::{InMemoryStore, StoreSnapshot};
pub use snapshot::SnapshotFile;
