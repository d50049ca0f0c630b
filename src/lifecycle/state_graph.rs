// Declarative table of legal delivery status transitions.
// Enforcement and available-action listings both read from here.

use serde::Serialize;

use super::types::DeliveryStatus::{self, *};

/// One legal edge of the lifecycle graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransitionRule {
    pub from: DeliveryStatus,
    pub to: DeliveryStatus,
    /// The assigned driver may invoke this edge on their own delivery
    pub driver_performable: bool,
    /// An issue report must accompany this edge
    pub requires_issue: bool,
}

const fn admin(from: DeliveryStatus, to: DeliveryStatus) -> TransitionRule {
    edge(from, to, false)
}

const fn driver(from: DeliveryStatus, to: DeliveryStatus) -> TransitionRule {
    edge(from, to, true)
}

/// Entering FAILED_DELIVERY or DELAYED is always an issue report, which
/// drivers may file themselves.
const fn edge(from: DeliveryStatus, to: DeliveryStatus, driver_performable: bool) -> TransitionRule {
    let requires_issue = matches!(to, FailedDelivery | Delayed);
    TransitionRule {
        from,
        to,
        driver_performable: driver_performable || requires_issue,
        requires_issue,
    }
}

static CANONICAL_RULES: &[TransitionRule] = &[
    admin(Pending, Assigned),
    admin(Pending, Cancelled),
    driver(Assigned, InProgress),
    admin(Assigned, Cancelled),
    driver(InProgress, PickedUp),
    driver(InProgress, FailedDelivery),
    admin(InProgress, Cancelled),
    driver(PickedUp, InTransit),
    driver(PickedUp, FailedDelivery),
    driver(InTransit, OutForDelivery),
    driver(InTransit, FailedDelivery),
    driver(InTransit, Delayed),
    driver(OutForDelivery, Delivered),
    driver(OutForDelivery, FailedDelivery),
    admin(FailedDelivery, InTransit),
    admin(FailedDelivery, OutForDelivery),
    admin(FailedDelivery, Returned),
    admin(Delayed, InTransit),
    admin(Delayed, OutForDelivery),
    driver(Delayed, FailedDelivery),
    admin(Returned, Assigned),
    admin(Returned, Cancelled),
];

/// Static lifecycle graph. Queries are pure functions of their arguments.
#[derive(Debug, Clone, Copy)]
pub struct StateGraph {
    rules: &'static [TransitionRule],
}

impl Default for StateGraph {
    fn default() -> Self {
        Self::canonical()
    }
}

impl StateGraph {
    pub const fn canonical() -> Self {
        Self {
            rules: CANONICAL_RULES,
        }
    }

    pub fn rules(&self) -> &'static [TransitionRule] {
        self.rules
    }

    pub fn rule(&self, from: DeliveryStatus, to: DeliveryStatus) -> Option<&'static TransitionRule> {
        self.rules.iter().find(|rule| rule.from == from && rule.to == to)
    }

    pub fn is_legal(&self, from: DeliveryStatus, to: DeliveryStatus) -> bool {
        self.rule(from, to).is_some()
    }

    /// Outgoing rules of `from`, in table order
    pub fn rules_from(&self, from: DeliveryStatus) -> impl Iterator<Item = &'static TransitionRule> {
        self.rules.iter().filter(move |rule| rule.from == from)
    }

    pub fn legal_next(&self, from: DeliveryStatus) -> Vec<DeliveryStatus> {
        self.rules_from(from).map(|rule| rule.to).collect()
    }

    pub fn is_terminal(&self, status: DeliveryStatus) -> bool {
        self.rules_from(status).next().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_table() {
        let graph = StateGraph::canonical();
        assert_eq!(graph.legal_next(Pending), vec![Assigned, Cancelled]);
        assert_eq!(graph.legal_next(Assigned), vec![InProgress, Cancelled]);
        assert_eq!(graph.legal_next(InProgress), vec![PickedUp, FailedDelivery, Cancelled]);
        assert_eq!(graph.legal_next(PickedUp), vec![InTransit, FailedDelivery]);
        assert_eq!(graph.legal_next(InTransit), vec![OutForDelivery, FailedDelivery, Delayed]);
        assert_eq!(graph.legal_next(OutForDelivery), vec![Delivered, FailedDelivery]);
        assert_eq!(graph.legal_next(FailedDelivery), vec![InTransit, OutForDelivery, Returned]);
        assert_eq!(graph.legal_next(Delayed), vec![InTransit, OutForDelivery, FailedDelivery]);
        assert_eq!(graph.legal_next(Returned), vec![Assigned, Cancelled]);
        assert!(graph.legal_next(Delivered).is_empty());
        assert!(graph.legal_next(Cancelled).is_empty());
    }

    #[test]
    fn test_terminal_states_match_status_enum() {
        let graph = StateGraph::canonical();
        for status in DeliveryStatus::ALL {
            assert_eq!(graph.is_terminal(status), status.is_terminal(), "{status}");
        }
    }

    #[test]
    fn test_no_self_loops() {
        let graph = StateGraph::canonical();
        for status in DeliveryStatus::ALL {
            assert!(!graph.is_legal(status, status), "{status} must not loop");
        }
    }

    #[test]
    fn test_driver_performable_subset() {
        let graph = StateGraph::canonical();
        let driver_edges: Vec<(DeliveryStatus, DeliveryStatus)> = graph
            .rules()
            .iter()
            .filter(|rule| rule.driver_performable)
            .map(|rule| (rule.from, rule.to))
            .collect();

        for progression in [
            (Assigned, InProgress),
            (InProgress, PickedUp),
            (PickedUp, InTransit),
            (InTransit, OutForDelivery),
            (OutForDelivery, Delivered),
        ] {
            assert!(driver_edges.contains(&progression), "{progression:?}");
        }

        for rule in graph.rules() {
            if rule.to == FailedDelivery || rule.to == Delayed {
                assert!(rule.driver_performable && rule.requires_issue, "{rule:?}");
            } else {
                assert!(!rule.requires_issue, "{rule:?}");
            }
            if rule.to == Cancelled {
                assert!(!rule.driver_performable, "{rule:?}");
            }
        }

        assert!(!graph.rule(Returned, Assigned).unwrap().driver_performable);
        assert!(!graph.rule(FailedDelivery, Returned).unwrap().driver_performable);
        assert_eq!(driver_edges.len(), 11);
    }

    #[test]
    fn test_is_legal_is_stable_across_calls() {
        let graph = StateGraph::canonical();
        for from in DeliveryStatus::ALL {
            for to in DeliveryStatus::ALL {
                let first = graph.is_legal(from, to);
                assert_eq!(first, graph.is_legal(from, to));
                assert_eq!(first, StateGraph::default().is_legal(from, to));
            }
        }
    }
}
