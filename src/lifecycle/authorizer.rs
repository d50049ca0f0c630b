use tracing::debug;

use super::error::{LifecycleError, Result};
use super::state_graph::StateGraph;
use super::types::{Actor, Delivery, DeliveryStatus, Role};

/// Role- and ownership-based permission checks over the state graph
#[derive(Debug, Clone, Copy, Default)]
pub struct TransitionAuthorizer {
    graph: StateGraph,
}

impl TransitionAuthorizer {
    pub fn new(graph: StateGraph) -> Self {
        Self { graph }
    }

    /// Whether `actor` may move `delivery` to `to`.
    ///
    /// Administrative actors may take any legal edge. Drivers may take
    /// driver-performable edges of deliveries assigned to them. Everyone
    /// else is denied.
    pub fn can_perform(&self, actor: &Actor, delivery: &Delivery, to: DeliveryStatus) -> bool {
        let Some(rule) = self.graph.rule(delivery.status, to) else {
            return false;
        };
        match actor.role {
            Role::Administrative => true,
            Role::Driver => rule.driver_performable && delivery.is_assigned_to(&actor.id),
            Role::Other => false,
        }
    }

    /// Like [`can_perform`](Self::can_perform) but reports why the actor was refused.
    /// Callers check legality first; an illegal edge is reported as unauthorized here.
    pub fn authorize(&self, actor: &Actor, delivery: &Delivery, to: DeliveryStatus) -> Result<()> {
        if self.can_perform(actor, delivery, to) {
            return Ok(());
        }
        let action = match actor.role {
            Role::Driver if !delivery.is_assigned_to(&actor.id) => {
                format!("act on delivery {} assigned to another driver", delivery.tracking_code)
            }
            _ => format!("move delivery {} from {} to {}", delivery.tracking_code, delivery.status, to),
        };
        debug!(
            actor.id = %actor.id,
            actor.role = %actor.role,
            tracking_code = %delivery.tracking_code,
            to = %to,
            "Transition refused by authorizer"
        );
        Err(LifecycleError::unauthorized(&actor.id, actor.role, action))
    }

    /// Annotations skip the graph: only identity and ownership matter
    pub fn can_annotate(&self, actor: &Actor, delivery: &Delivery) -> bool {
        match actor.role {
            Role::Administrative => true,
            Role::Driver => delivery.is_assigned_to(&actor.id),
            Role::Other => false,
        }
    }

    pub fn authorize_annotation(&self, actor: &Actor, delivery: &Delivery) -> Result<()> {
        if self.can_annotate(actor, delivery) {
            return Ok(());
        }
        Err(LifecycleError::unauthorized(
            &actor.id,
            actor.role,
            format!("annotate delivery {}", delivery.tracking_code),
        ))
    }

    /// Driver and vehicle references are edited by administrative actors only
    pub fn authorize_assignment_edit(&self, actor: &Actor, delivery: &Delivery) -> Result<()> {
        if actor.is_administrative() {
            return Ok(());
        }
        Err(LifecycleError::unauthorized(
            &actor.id,
            actor.role,
            format!("edit the assignment of delivery {}", delivery.tracking_code),
        ))
    }
}
