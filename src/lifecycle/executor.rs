// Transition executor - the only path through which deliveries change

use std::sync::Arc;
use tracing::{info, warn, Instrument};

use super::authorizer::TransitionAuthorizer;
use super::error::{LifecycleError, Result};
use super::issue_report::IssueReportValidator;
use super::ledger::{AuditLedger, EntryDetails};
use super::state_graph::StateGraph;
use super::traits::{Clock, PersistenceStore};
use super::types::{
    non_blank, Actor, AnnotateMetadata, AssignmentEdit, AssignmentOutcome, AvailableAction,
    Delivery, DeliveryStatus, Milestone, Priority, StatusUpdate, TransitionMetadata,
    TransitionOutcome,
};
use crate::telemetry::{create_transition_span, generate_correlation_id};

/// Orchestrates graph checks, authorization, issue validation, milestone
/// capture, auto-assignment and the atomic delivery + ledger write.
///
/// The executor holds no per-delivery state; concurrent requests are
/// serialized by the store's version check.
pub struct TransitionExecutor<S: PersistenceStore + ?Sized, C: Clock> {
    store: Arc<S>,
    clock: C,
    graph: StateGraph,
    authorizer: TransitionAuthorizer,
    validator: IssueReportValidator,
    ledger: AuditLedger<S>,
}

impl<S: PersistenceStore + ?Sized, C: Clock> TransitionExecutor<S, C> {
    pub fn new(store: Arc<S>, clock: C) -> Self {
        let graph = StateGraph::canonical();
        Self {
            ledger: AuditLedger::new(Arc::clone(&store)),
            store,
            clock,
            graph,
            authorizer: TransitionAuthorizer::new(graph),
            validator: IssueReportValidator::new(),
        }
    }

    pub fn with_history_page_size(mut self, page_size: usize) -> Self {
        self.ledger = self.ledger.with_page_size(page_size);
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn ledger(&self) -> &AuditLedger<S> {
        &self.ledger
    }

    pub fn graph(&self) -> &StateGraph {
        &self.graph
    }

    pub fn authorizer(&self) -> &TransitionAuthorizer {
        &self.authorizer
    }

    /// Register a new PENDING delivery without driver or vehicle
    pub async fn create_delivery(
        &self,
        tracking_code: &str,
        priority: Priority,
        actor: &Actor,
    ) -> Result<Delivery> {
        let Some(tracking_code) = non_blank(Some(tracking_code)) else {
            return Err(LifecycleError::validation("tracking_code", "a tracking code is required"));
        };
        if !actor.is_administrative() {
            return Err(LifecycleError::unauthorized(
                &actor.id,
                actor.role,
                format!("create delivery {tracking_code}"),
            ));
        }

        let delivery = Delivery::new(tracking_code, priority, self.clock.now());
        self.store.create(&delivery).await?;
        info!(
            tracking_code = %delivery.tracking_code,
            priority = %delivery.priority,
            actor.id = %actor.id,
            "Delivery created"
        );
        Ok(delivery)
    }

    /// Move a delivery to `to` on behalf of `actor`.
    ///
    /// Fails with `InvalidTransition` when the graph has no such edge
    /// (including requests for the current status), `Unauthorized` when the
    /// actor may not take it, `Validation` when an issue report is required
    /// but missing, and `ConcurrencyConflict` when the delivery changed
    /// since it was loaded. Nothing is written on failure.
    pub async fn request_transition(
        &self,
        tracking_code: &str,
        to: DeliveryStatus,
        actor: &Actor,
        metadata: TransitionMetadata,
    ) -> Result<TransitionOutcome> {
        let correlation_id = generate_correlation_id();
        let span = create_transition_span("transition", tracking_code, &actor.id, &correlation_id);

        async {
            let before = self.store.load(tracking_code).await?;
            let Some(rule) = self.graph.rule(before.status, to) else {
                return Err(LifecycleError::InvalidTransition {
                    from: before.status,
                    to,
                });
            };
            self.authorizer.authorize(actor, &before, to)?;
            let issue = self.validator.validate(rule, &metadata)?;

            let now = self.clock.now();
            let location = non_blank(metadata.location.as_deref());
            let mut after = before.clone();
            after.status = to;
            after.updated_at = now;
            if let Some(milestone) = Milestone::triggered_by(to) {
                after.milestones.record(milestone, now);
            }
            if let Some(location) = &location {
                after.current_location = Some(location.clone());
            }

            let details = EntryDetails {
                location,
                notes: non_blank(metadata.notes.as_deref()),
                issue,
            };
            let entry = self.ledger.next_entry(&before, to, actor, details, now);
            let (delivery, status_update) = self.ledger.append(after, entry).await?;

            info!(
                tracking_code = %delivery.tracking_code,
                from = %status_update.from,
                to = %status_update.to,
                actor.id = %actor.id,
                actor.role = %actor.role,
                sequence = status_update.sequence,
                "Delivery transitioned"
            );
            Ok(TransitionOutcome {
                delivery,
                status_update,
            })
        }
        .instrument(span)
        .await
        .inspect_err(|e| {
            warn!(
                tracking_code = %tracking_code,
                to = %to,
                actor.id = %actor.id,
                error.kind = %e.kind(),
                "Transition rejected: {}", e
            )
        })
    }

    /// Record location and/or notes without changing the status.
    ///
    /// The ledger gains an entry with `from == to`. Only identity and
    /// ownership are checked, so terminal deliveries can still be annotated.
    pub async fn request_annotate(
        &self,
        tracking_code: &str,
        actor: &Actor,
        metadata: AnnotateMetadata,
    ) -> Result<StatusUpdate> {
        let correlation_id = generate_correlation_id();
        let span = create_transition_span("annotate", tracking_code, &actor.id, &correlation_id);

        async {
            let before = self.store.load(tracking_code).await?;
            self.authorizer.authorize_annotation(actor, &before)?;

            let location = non_blank(metadata.location.as_deref());
            let notes = non_blank(metadata.notes.as_deref());
            if location.is_none() && notes.is_none() {
                return Err(LifecycleError::validation(
                    "notes",
                    "an annotation needs a location or notes",
                ));
            }

            let now = self.clock.now();
            let mut after = before.clone();
            after.updated_at = now;
            if let Some(location) = &location {
                after.current_location = Some(location.clone());
            }

            let details = EntryDetails {
                location,
                notes,
                issue: None,
            };
            let entry = self.ledger.next_entry(&before, before.status, actor, details, now);
            let (_, status_update) = self.ledger.append(after, entry).await?;

            info!(
                tracking_code = %status_update.tracking_code,
                status = %status_update.to,
                actor.id = %actor.id,
                sequence = status_update.sequence,
                "Delivery annotated"
            );
            Ok(status_update)
        }
        .instrument(span)
        .await
        .inspect_err(|e| {
            warn!(
                tracking_code = %tracking_code,
                actor.id = %actor.id,
                error.kind = %e.kind(),
                "Annotation rejected: {}", e
            )
        })
    }

    /// Next steps `actor` may take, in graph order
    pub async fn list_available_actions(
        &self,
        tracking_code: &str,
        actor: &Actor,
    ) -> Result<Vec<AvailableAction>> {
        let delivery = self.store.load(tracking_code).await?;
        Ok(self.available_actions(&delivery, actor))
    }

    /// `legal_next(status)` filtered by what the authorizer allows
    pub fn available_actions(&self, delivery: &Delivery, actor: &Actor) -> Vec<AvailableAction> {
        self.graph
            .rules_from(delivery.status)
            .filter(|rule| self.authorizer.can_perform(actor, delivery, rule.to))
            .map(|rule| AvailableAction {
                target_status: rule.to,
                requires_issue: rule.requires_issue,
            })
            .collect()
    }

    /// Edit the driver/vehicle references of a delivery.
    ///
    /// A PENDING delivery that lacked a driver or a vehicle and has both
    /// after the edit is promoted to ASSIGNED in the same write, with one
    /// `PENDING -> ASSIGNED` ledger entry attributed to `actor`.
    pub async fn apply_assignment_edit(
        &self,
        tracking_code: &str,
        actor: &Actor,
        edit: AssignmentEdit,
    ) -> Result<AssignmentOutcome> {
        let correlation_id = generate_correlation_id();
        let span = create_transition_span("assignment_edit", tracking_code, &actor.id, &correlation_id);

        async {
            let before = self.store.load(tracking_code).await?;
            self.authorizer.authorize_assignment_edit(actor, &before)?;
            if edit.is_empty() {
                return Err(LifecycleError::validation("assignment", "nothing to edit"));
            }
            check_reference("driver_id", &edit.driver_id)?;
            check_reference("vehicle_id", &edit.vehicle_id)?;

            let now = self.clock.now();
            let mut after = before.clone();
            edit.apply_to(&mut after);
            after.updated_at = now;

            let promote = before.status == DeliveryStatus::Pending
                && !before.has_driver_and_vehicle()
                && after.has_driver_and_vehicle();
            if !promote {
                let delivery = self.store.save(&after).await?;
                info!(
                    tracking_code = %delivery.tracking_code,
                    driver_id = ?delivery.driver_id,
                    vehicle_id = ?delivery.vehicle_id,
                    actor.id = %actor.id,
                    "Assignment edited"
                );
                return Ok(AssignmentOutcome {
                    delivery,
                    status_update: None,
                });
            }

            after.status = DeliveryStatus::Assigned;
            let entry = self.ledger.next_entry(
                &before,
                DeliveryStatus::Assigned,
                actor,
                EntryDetails::default(),
                now,
            );
            let (delivery, status_update) = self.ledger.append(after, entry).await?;
            info!(
                tracking_code = %delivery.tracking_code,
                driver_id = ?delivery.driver_id,
                vehicle_id = ?delivery.vehicle_id,
                actor.id = %actor.id,
                "Delivery auto-assigned"
            );
            Ok(AssignmentOutcome {
                delivery,
                status_update: Some(status_update),
            })
        }
        .instrument(span)
        .await
        .inspect_err(|e| {
            warn!(
                tracking_code = %tracking_code,
                actor.id = %actor.id,
                error.kind = %e.kind(),
                "Assignment edit rejected: {}", e
            )
        })
    }
}

fn check_reference(field: &'static str, value: &Option<Option<String>>) -> Result<()> {
    match value {
        Some(Some(id)) if id.trim().is_empty() => Err(LifecycleError::validation(
            field,
            "use an explicit clear instead of a blank reference",
        )),
        _ => Ok(()),
    }
}
