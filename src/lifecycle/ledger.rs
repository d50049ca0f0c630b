// Append-only history of status changes.
// The delivery's status is a cached projection of its ledger: every write
// goes through `append`, which persists both under one atomic store call.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

use super::error::{LifecycleError, Result};
use super::state_graph::StateGraph;
use super::traits::PersistenceStore;
use super::types::{Actor, Delivery, DeliveryStatus, IssueReport, StatusUpdate};

pub const DEFAULT_PAGE_SIZE: usize = 100;

pub struct AuditLedger<S: PersistenceStore + ?Sized> {
    store: Arc<S>,
    page_size: usize,
}

impl<S: PersistenceStore + ?Sized> Clone for AuditLedger<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            page_size: self.page_size,
        }
    }
}

/// Fields of an entry that the caller decides
#[derive(Debug, Clone, Default)]
pub struct EntryDetails {
    pub location: Option<String>,
    pub notes: Option<String>,
    pub issue: Option<IssueReport>,
}

impl<S: PersistenceStore + ?Sized> AuditLedger<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Build the entry that follows the ledger of `before`
    pub fn next_entry(
        &self,
        before: &Delivery,
        to: DeliveryStatus,
        actor: &Actor,
        details: EntryDetails,
        at: DateTime<Utc>,
    ) -> StatusUpdate {
        StatusUpdate {
            tracking_code: before.tracking_code.clone(),
            sequence: before.ledger_head + 1,
            from: before.status,
            to,
            actor: actor.clone(),
            location: details.location,
            notes: details.notes,
            issue: details.issue,
            created_at: at,
        }
    }

    /// Persist `delivery` together with `entry`.
    ///
    /// `delivery` still carries the ledger head it was loaded with; the
    /// entry must continue that ledger and land on the delivery's status.
    pub async fn append(&self, mut delivery: Delivery, entry: StatusUpdate) -> Result<(Delivery, StatusUpdate)> {
        if entry.tracking_code != delivery.tracking_code {
            return Err(LifecycleError::Storage(format!(
                "ledger entry for {} appended to {}",
                entry.tracking_code, delivery.tracking_code
            )));
        }
        if entry.sequence != delivery.ledger_head + 1 {
            return Err(LifecycleError::Storage(format!(
                "ledger entry {} does not follow head {} of {}",
                entry.sequence, delivery.ledger_head, delivery.tracking_code
            )));
        }
        if entry.to != delivery.status {
            return Err(LifecycleError::Storage(format!(
                "ledger entry ends in {} but delivery {} is {}",
                entry.to, delivery.tracking_code, delivery.status
            )));
        }

        delivery.ledger_head = entry.sequence;
        let committed = self.store.save_with_ledger_entry(&delivery, &entry).await?;
        debug!(
            tracking_code = %entry.tracking_code,
            sequence = entry.sequence,
            from = %entry.from,
            to = %entry.to,
            "Ledger entry appended"
        );
        Ok((committed, entry))
    }

    /// Lazy, restartable walk over the ledger of one delivery
    pub fn history(&self, tracking_code: &str) -> LedgerHistory<S> {
        LedgerHistory {
            store: Arc::clone(&self.store),
            tracking_code: tracking_code.to_string(),
            page_size: self.page_size,
            cursor: 0,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    /// Replay the full ledger of `delivery` and check it against the delivery
    pub async fn verify(&self, delivery: &Delivery) -> Result<LedgerAudit> {
        let entries = self.history(&delivery.tracking_code).collect_all().await?;
        Ok(audit(delivery, &entries, &StateGraph::canonical()))
    }
}

/// Cursor over a delivery's ledger, fetched page by page from the store
pub struct LedgerHistory<S: PersistenceStore + ?Sized> {
    store: Arc<S>,
    tracking_code: String,
    page_size: usize,
    cursor: u64,
    buffer: VecDeque<StatusUpdate>,
    exhausted: bool,
}

impl<S: PersistenceStore + ?Sized> LedgerHistory<S> {
    pub fn tracking_code(&self) -> &str {
        &self.tracking_code
    }

    /// Next entry in sequence order, `None` once the ledger is exhausted
    pub async fn next(&mut self) -> Result<Option<StatusUpdate>> {
        if self.buffer.is_empty() && !self.exhausted {
            let page = self
                .store
                .ledger_page(&self.tracking_code, self.cursor, self.page_size)
                .await?;
            if page.len() < self.page_size {
                self.exhausted = true;
            }
            if let Some(last) = page.last() {
                self.cursor = last.sequence;
            }
            self.buffer.extend(page);
        }
        Ok(self.buffer.pop_front())
    }

    /// Start again from the first entry
    pub fn restart(&mut self) {
        self.cursor = 0;
        self.buffer.clear();
        self.exhausted = false;
    }

    pub async fn collect_all(mut self) -> Result<Vec<StatusUpdate>> {
        let mut entries = Vec::new();
        while let Some(entry) = self.next().await? {
            entries.push(entry);
        }
        Ok(entries)
    }
}

/// Status implied by a ledger: the `to` of its last entry
pub fn replay(entries: &[StatusUpdate]) -> DeliveryStatus {
    entries
        .last()
        .map_or(DeliveryStatus::INITIAL, |entry| entry.to)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerViolation {
    ForeignEntry { sequence: u64, tracking_code: String },
    SequenceGap { expected: u64, found: u64 },
    BrokenChain { sequence: u64, expected_from: DeliveryStatus, found_from: DeliveryStatus },
    IllegalEdge { sequence: u64, from: DeliveryStatus, to: DeliveryStatus },
    TimeWentBackwards { sequence: u64 },
    HeadMismatch { ledger_head: u64, last_sequence: u64 },
    StatusMismatch { projected: DeliveryStatus, current: DeliveryStatus },
}

/// Outcome of replaying a ledger against its delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerAudit {
    pub tracking_code: String,
    pub entries: usize,
    pub projected_status: DeliveryStatus,
    pub violations: Vec<LedgerViolation>,
}

impl LedgerAudit {
    pub fn is_consistent(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Check that `entries` form a contiguous chain of legal edges (or
/// annotations) starting at PENDING whose projection is the delivery's status.
pub fn audit(delivery: &Delivery, entries: &[StatusUpdate], graph: &StateGraph) -> LedgerAudit {
    let mut violations = Vec::new();
    let mut expected_from = DeliveryStatus::INITIAL;
    let mut previous_at: Option<DateTime<Utc>> = None;

    for (index, entry) in entries.iter().enumerate() {
        let expected_sequence = index as u64 + 1;
        if entry.tracking_code != delivery.tracking_code {
            violations.push(LedgerViolation::ForeignEntry {
                sequence: entry.sequence,
                tracking_code: entry.tracking_code.clone(),
            });
        }
        if entry.sequence != expected_sequence {
            violations.push(LedgerViolation::SequenceGap {
                expected: expected_sequence,
                found: entry.sequence,
            });
        }
        if entry.from != expected_from {
            violations.push(LedgerViolation::BrokenChain {
                sequence: entry.sequence,
                expected_from,
                found_from: entry.from,
            });
        }
        if !entry.is_annotation() && !graph.is_legal(entry.from, entry.to) {
            violations.push(LedgerViolation::IllegalEdge {
                sequence: entry.sequence,
                from: entry.from,
                to: entry.to,
            });
        }
        if previous_at.is_some_and(|at| entry.created_at < at) {
            violations.push(LedgerViolation::TimeWentBackwards {
                sequence: entry.sequence,
            });
        }
        expected_from = entry.to;
        previous_at = Some(entry.created_at);
    }

    let last_sequence = entries.last().map_or(0, |entry| entry.sequence);
    if delivery.ledger_head != last_sequence {
        violations.push(LedgerViolation::HeadMismatch {
            ledger_head: delivery.ledger_head,
            last_sequence,
        });
    }

    let projected_status = replay(entries);
    if projected_status != delivery.status {
        violations.push(LedgerViolation::StatusMismatch {
            projected: projected_status,
            current: delivery.status,
        });
    }

    LedgerAudit {
        tracking_code: delivery.tracking_code.clone(),
        entries: entries.len(),
        projected_status,
        violations,
    }
}
