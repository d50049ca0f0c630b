// Core types for the delivery lifecycle engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Delivery states in the lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    /// Created, waiting for a driver and a vehicle
    Pending,
    /// Driver and vehicle are set
    Assigned,
    /// Driver has started the run
    InProgress,
    /// Cargo collected from the sender
    PickedUp,
    InTransit,
    /// On the last leg to the recipient
    OutForDelivery,
    /// Handed over. Terminal.
    Delivered,
    /// Handover failed, issue report attached
    FailedDelivery,
    /// Held up in transit, issue report attached
    Delayed,
    /// Sent back after a failed handover
    Returned,
    /// Terminal.
    Cancelled,
}

impl DeliveryStatus {
    pub const INITIAL: DeliveryStatus = DeliveryStatus::Pending;

    pub const ALL: [DeliveryStatus; 11] = [
        DeliveryStatus::Pending,
        DeliveryStatus::Assigned,
        DeliveryStatus::InProgress,
        DeliveryStatus::PickedUp,
        DeliveryStatus::InTransit,
        DeliveryStatus::OutForDelivery,
        DeliveryStatus::Delivered,
        DeliveryStatus::FailedDelivery,
        DeliveryStatus::Delayed,
        DeliveryStatus::Returned,
        DeliveryStatus::Cancelled,
    ];

    /// Symbolic name used on the wire and in logs
    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "PENDING",
            DeliveryStatus::Assigned => "ASSIGNED",
            DeliveryStatus::InProgress => "IN_PROGRESS",
            DeliveryStatus::PickedUp => "PICKED_UP",
            DeliveryStatus::InTransit => "IN_TRANSIT",
            DeliveryStatus::OutForDelivery => "OUT_FOR_DELIVERY",
            DeliveryStatus::Delivered => "DELIVERED",
            DeliveryStatus::FailedDelivery => "FAILED_DELIVERY",
            DeliveryStatus::Delayed => "DELAYED",
            DeliveryStatus::Returned => "RETURNED",
            DeliveryStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, DeliveryStatus::Delivered | DeliveryStatus::Cancelled)
    }

    /// Entering one of these states requires an issue report
    pub fn requires_issue_report(self) -> bool {
        matches!(self, DeliveryStatus::FailedDelivery | DeliveryStatus::Delayed)
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a symbolic name does not match any variant
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Normalize "in-progress", "In Progress" and "IN_PROGRESS" to the same key
fn symbolic_key(value: &str) -> String {
    value
        .trim()
        .chars()
        .map(|c| match c {
            '-' | ' ' => '_',
            other => other.to_ascii_uppercase(),
        })
        .collect()
}

impl FromStr for DeliveryStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = symbolic_key(s);
        DeliveryStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == key)
            .ok_or_else(|| ParseEnumError {
                kind: "delivery status",
                value: s.to_string(),
            })
    }
}

/// Write-once timestamps captured on first entry into a state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Milestone {
    Started,
    PickedUp,
    OutForDelivery,
    Delivered,
}

impl Milestone {
    pub const ALL: [Milestone; 4] = [
        Milestone::Started,
        Milestone::PickedUp,
        Milestone::OutForDelivery,
        Milestone::Delivered,
    ];

    /// The milestone recorded when a delivery enters `status`, if any
    pub fn triggered_by(status: DeliveryStatus) -> Option<Milestone> {
        match status {
            DeliveryStatus::InProgress => Some(Milestone::Started),
            DeliveryStatus::PickedUp => Some(Milestone::PickedUp),
            DeliveryStatus::OutForDelivery => Some(Milestone::OutForDelivery),
            DeliveryStatus::Delivered => Some(Milestone::Delivered),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestones {
    pub started_at: Option<DateTime<Utc>>,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub out_for_delivery_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl Milestones {
    pub fn get(&self, milestone: Milestone) -> Option<DateTime<Utc>> {
        match milestone {
            Milestone::Started => self.started_at,
            Milestone::PickedUp => self.picked_up_at,
            Milestone::OutForDelivery => self.out_for_delivery_at,
            Milestone::Delivered => self.delivered_at,
        }
    }

    /// Record `at` for `milestone` unless it is already set.
    /// Returns true when the timestamp was written.
    pub fn record(&mut self, milestone: Milestone, at: DateTime<Utc>) -> bool {
        let slot = match milestone {
            Milestone::Started => &mut self.started_at,
            Milestone::PickedUp => &mut self.picked_up_at,
            Milestone::OutForDelivery => &mut self.out_for_delivery_at,
            Milestone::Delivered => &mut self.delivered_at,
        };
        if slot.is_some() {
            return false;
        }
        *slot = Some(at);
        true
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Priority::Low => "LOW",
            Priority::Normal => "NORMAL",
            Priority::High => "HIGH",
            Priority::Urgent => "URGENT",
        };
        f.write_str(label)
    }
}

impl FromStr for Priority {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match symbolic_key(s).as_str() {
            "LOW" => Ok(Priority::Low),
            "NORMAL" => Ok(Priority::Normal),
            "HIGH" => Ok(Priority::High),
            "URGENT" => Ok(Priority::Urgent),
            _ => Err(ParseEnumError {
                kind: "priority",
                value: s.to_string(),
            }),
        }
    }
}

/// Closed classification of reported delivery issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueType {
    VehicleBreakdown,
    TrafficDelay,
    WeatherDelay,
    CustomerUnavailable,
    WrongAddress,
    DamagedCargo,
    Accident,
    FuelShortage,
    SecurityIssue,
    Other,
}

impl IssueType {
    pub const ALL: [IssueType; 10] = [
        IssueType::VehicleBreakdown,
        IssueType::TrafficDelay,
        IssueType::WeatherDelay,
        IssueType::CustomerUnavailable,
        IssueType::WrongAddress,
        IssueType::DamagedCargo,
        IssueType::Accident,
        IssueType::FuelShortage,
        IssueType::SecurityIssue,
        IssueType::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            IssueType::VehicleBreakdown => "VEHICLE_BREAKDOWN",
            IssueType::TrafficDelay => "TRAFFIC_DELAY",
            IssueType::WeatherDelay => "WEATHER_DELAY",
            IssueType::CustomerUnavailable => "CUSTOMER_UNAVAILABLE",
            IssueType::WrongAddress => "WRONG_ADDRESS",
            IssueType::DamagedCargo => "DAMAGED_CARGO",
            IssueType::Accident => "ACCIDENT",
            IssueType::FuelShortage => "FUEL_SHORTAGE",
            IssueType::SecurityIssue => "SECURITY_ISSUE",
            IssueType::Other => "OTHER",
        }
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IssueType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = symbolic_key(s);
        IssueType::ALL
            .into_iter()
            .find(|issue| issue.as_str() == key)
            .ok_or_else(|| ParseEnumError {
                kind: "issue type",
                value: s.to_string(),
            })
    }
}

/// Validated issue report attached to a ledger entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueReport {
    pub issue_type: IssueType,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Admins and managers
    Administrative,
    Driver,
    Other,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Role::Administrative => "ADMINISTRATIVE",
            Role::Driver => "DRIVER",
            Role::Other => "OTHER",
        };
        f.write_str(label)
    }
}

impl FromStr for Role {
    type Err = std::convert::Infallible;

    /// Unrecognised role names resolve to `Role::Other`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match symbolic_key(s).as_str() {
            "ADMIN" | "ADMINISTRATIVE" | "ADMINISTRATOR" | "MANAGER" => Role::Administrative,
            "DRIVER" => Role::Driver,
            _ => Role::Other,
        })
    }
}

/// Identity performing an operation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    pub fn admin(id: impl Into<String>) -> Self {
        Self::new(id, Role::Administrative)
    }

    pub fn driver(id: impl Into<String>) -> Self {
        Self::new(id, Role::Driver)
    }

    pub fn other(id: impl Into<String>) -> Self {
        Self::new(id, Role::Other)
    }

    pub fn is_administrative(&self) -> bool {
        self.role == Role::Administrative
    }
}

/// A shipment tracked through the lifecycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    pub tracking_code: String,
    pub status: DeliveryStatus,
    pub priority: Priority,
    pub driver_id: Option<String>,
    pub vehicle_id: Option<String>,
    #[serde(default)]
    pub milestones: Milestones,
    pub current_location: Option<String>,
    /// Cargo and pricing attributes, opaque to the lifecycle
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Bumped by every committed write
    #[serde(default)]
    pub version: u64,
    /// Sequence of the latest ledger entry, 0 when the ledger is empty
    #[serde(default)]
    pub ledger_head: u64,
}

impl Delivery {
    /// A freshly created delivery: PENDING, no driver, no vehicle
    pub fn new(tracking_code: impl Into<String>, priority: Priority, now: DateTime<Utc>) -> Self {
        Self {
            tracking_code: tracking_code.into(),
            status: DeliveryStatus::INITIAL,
            priority,
            driver_id: None,
            vehicle_id: None,
            milestones: Milestones::default(),
            current_location: None,
            attributes: BTreeMap::new(),
            notes: None,
            created_at: now,
            updated_at: now,
            version: 0,
            ledger_head: 0,
        }
    }

    pub fn is_assigned_to(&self, actor_id: &str) -> bool {
        self.driver_id.as_deref() == Some(actor_id)
    }

    pub fn has_driver_and_vehicle(&self) -> bool {
        self.driver_id.is_some() && self.vehicle_id.is_some()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Trim a free-text field, treating blank input as absent
pub(crate) fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Optional data supplied with a transition request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionMetadata {
    pub location: Option<String>,
    pub notes: Option<String>,
    /// Raw classification, parsed by the issue report validator
    pub issue_type: Option<String>,
    pub issue_description: Option<String>,
}

impl TransitionMetadata {
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_issue(mut self, issue_type: impl Into<String>, description: impl Into<String>) -> Self {
        self.issue_type = Some(issue_type.into());
        self.issue_description = Some(description.into());
        self
    }
}

/// Location and notes recorded without a status change
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotateMetadata {
    pub location: Option<String>,
    pub notes: Option<String>,
}

impl AnnotateMetadata {
    pub fn location(location: impl Into<String>) -> Self {
        Self {
            location: Some(location.into()),
            notes: None,
        }
    }

    pub fn notes(notes: impl Into<String>) -> Self {
        Self {
            location: None,
            notes: Some(notes.into()),
        }
    }
}

/// Immutable ledger entry describing one change to a delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub tracking_code: String,
    /// 1-based, contiguous per delivery
    pub sequence: u64,
    pub from: DeliveryStatus,
    pub to: DeliveryStatus,
    pub actor: Actor,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub issue: Option<IssueReport>,
    pub created_at: DateTime<Utc>,
}

impl StatusUpdate {
    /// Annotations record information without moving the status
    pub fn is_annotation(&self) -> bool {
        self.from == self.to
    }
}

/// One next step an actor may take on a delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableAction {
    pub target_status: DeliveryStatus,
    pub requires_issue: bool,
}

/// Edit of the driver/vehicle references.
/// `None` leaves a field untouched, `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentEdit {
    pub driver_id: Option<Option<String>>,
    pub vehicle_id: Option<Option<String>>,
}

impl AssignmentEdit {
    pub fn assign_driver(mut self, driver_id: impl Into<String>) -> Self {
        self.driver_id = Some(Some(driver_id.into()));
        self
    }

    pub fn assign_vehicle(mut self, vehicle_id: impl Into<String>) -> Self {
        self.vehicle_id = Some(Some(vehicle_id.into()));
        self
    }

    pub fn clear_driver(mut self) -> Self {
        self.driver_id = Some(None);
        self
    }

    pub fn clear_vehicle(mut self) -> Self {
        self.vehicle_id = Some(None);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.driver_id.is_none() && self.vehicle_id.is_none()
    }

    pub fn apply_to(&self, delivery: &mut Delivery) {
        if let Some(driver_id) = &self.driver_id {
            delivery.driver_id = driver_id.clone();
        }
        if let Some(vehicle_id) = &self.vehicle_id {
            delivery.vehicle_id = vehicle_id.clone();
        }
    }
}

/// Result of a committed status transition
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionOutcome {
    pub delivery: Delivery,
    pub status_update: StatusUpdate,
}

/// Result of an assignment edit; carries a ledger entry only when the
/// edit promoted the delivery to ASSIGNED
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentOutcome {
    pub delivery: Delivery,
    pub status_update: Option<StatusUpdate>,
}
