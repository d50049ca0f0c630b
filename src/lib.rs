// Delivery Lifecycle Library - governed delivery state machine with an audit ledger
// This exposes the core components for the CLI, testing and integration

pub mod config;
pub mod lifecycle;
pub mod persistence;
pub mod telemetry;

#[cfg(feature = "database")]
pub mod database;

// Re-export key types for easy access
pub use crate::config::{config, LifecycleConfig};
pub use lifecycle::{
    Actor, AnnotateMetadata, AssignmentEdit, AuditLedger, AvailableAction, Clock, Delivery,
    DeliveryStatus, IdentityResolver, IssueReportValidator, IssueType, LifecycleError,
    ManualClock, PersistenceStore, Priority, Role, StateGraph, StaticIdentity, StatusUpdate,
    SystemClock, TransitionAuthorizer, TransitionExecutor, TransitionMetadata,
};
pub use persistence::{InMemoryStore, SnapshotFile, StoreSnapshot};
pub use telemetry::{create_transition_span, generate_correlation_id, init_telemetry, shutdown_telemetry};

#[cfg(feature = "database")]
pub use database::SqliteStore;
