use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::types::{DeliveryStatus, Role};

/// Errors produced by lifecycle operations.
///
/// Every variant leaves the delivery and its ledger untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("Delivery {tracking_code} not found")]
    NotFound { tracking_code: String },

    #[error("Delivery {tracking_code} already exists")]
    AlreadyExists { tracking_code: String },

    #[error("Invalid transition {from} -> {to}")]
    InvalidTransition {
        from: DeliveryStatus,
        to: DeliveryStatus,
    },

    #[error("Actor {actor_id} ({role}) is not allowed to {action}")]
    Unauthorized {
        actor_id: String,
        role: Role,
        action: String,
    },

    #[error("Validation failed for {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("Delivery {tracking_code} changed concurrently: expected version {expected}, found {found}")]
    ConcurrencyConflict {
        tracking_code: String,
        expected: u64,
        found: u64,
    },

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Symbolic error classification for callers and the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    InvalidTransition,
    Unauthorized,
    ValidationError,
    ConcurrencyConflict,
    Storage,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::AlreadyExists => "ALREADY_EXISTS",
            ErrorKind::InvalidTransition => "INVALID_TRANSITION",
            ErrorKind::Unauthorized => "UNAUTHORIZED",
            ErrorKind::ValidationError => "VALIDATION_ERROR",
            ErrorKind::ConcurrencyConflict => "CONCURRENCY_CONFLICT",
            ErrorKind::Storage => "STORAGE",
        };
        f.write_str(label)
    }
}

impl LifecycleError {
    pub fn not_found(tracking_code: impl Into<String>) -> Self {
        Self::NotFound {
            tracking_code: tracking_code.into(),
        }
    }

    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    pub fn unauthorized(actor_id: &str, role: Role, action: impl Into<String>) -> Self {
        Self::Unauthorized {
            actor_id: actor_id.to_string(),
            role,
            action: action.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            LifecycleError::NotFound { .. } => ErrorKind::NotFound,
            LifecycleError::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            LifecycleError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            LifecycleError::Unauthorized { .. } => ErrorKind::Unauthorized,
            LifecycleError::Validation { .. } => ErrorKind::ValidationError,
            LifecycleError::ConcurrencyConflict { .. } => ErrorKind::ConcurrencyConflict,
            LifecycleError::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Whether the same request may succeed after the caller fixes its
    /// input or reloads the delivery
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LifecycleError::Validation { .. } | LifecycleError::ConcurrencyConflict { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, LifecycleError>;
