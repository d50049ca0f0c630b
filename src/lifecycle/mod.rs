// Delivery lifecycle - governed state machine with an append-only audit ledger
//
// Every status change goes through the TransitionExecutor, which consults
// the StateGraph, the TransitionAuthorizer and the IssueReportValidator
// before committing the delivery and its ledger entry in one store write.

pub mod authorizer;
pub mod clock;
pub mod error;
pub mod executor;
pub mod issue_report;
pub mod ledger;
pub mod state_graph;
pub mod traits;
pub mod types;

#[cfg(test)]
pub mod mocks;


pub use authorizer::TransitionAuthorizer;
pub use clock::{ManualClock, StaticIdentity, SystemClock};
pub use error::{ErrorKind, LifecycleError, Result};
pub use executor::TransitionExecutor;
pub use issue_report::IssueReportValidator;
pub use ledger::{audit, replay, AuditLedger, LedgerAudit, LedgerHistory, LedgerViolation};
pub use state_graph::{StateGraph, TransitionRule};
pub use traits::{Clock, IdentityResolver, PersistenceStore};
pub use types::{
    Actor, AnnotateMetadata, AssignmentEdit, AssignmentOutcome, AvailableAction, Delivery,
    DeliveryStatus, IssueReport, IssueType, Milestone, Milestones, Priority, Role, StatusUpdate,
    TransitionMetadata, TransitionOutcome,
};
