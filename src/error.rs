//! Error types for the Stackweaver change orchestration core.
//!
//! This module provides a comprehensive error hierarchy for all operations
//! in the change lifecycle: planning, approval, state access, remote
//! provisioning, and configuration.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// The main error type for Stackweaver operations.
#[derive(Debug, Error)]
pub enum StackweaverError {
    /// Remote provisioning backend errors.
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Change plan errors.
    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),

    /// Approval workflow errors.
    #[error("Approval error: {0}")]
    Approval(#[from] ApprovalError),

    /// State store errors.
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// Configuration errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors from the resilient remote client.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The provisioning backend could not be reached, returned a protocol
    /// error, or the circuit breaker refused the call.
    #[error("Connection to provisioning backend failed: {message}")]
    ConnectionFailed {
        /// Description of the failure.
        message: String,
    },

    /// A resource that was required to exist was not found.
    #[error("Resource not found: {resource_id}")]
    ResourceNotFound {
        /// ID of the missing resource.
        resource_id: String,
    },
}

/// Change plan errors.
#[derive(Debug, Error)]
pub enum PlanError {
    /// Plan generation, analysis, or estimation failed.
    #[error("Plan validation failed: {message}")]
    ValidationFailed {
        /// Description of the validation failure.
        message: String,
    },

    /// The plan is not in the status required for the operation.
    #[error("Plan {plan_id} is not approved for execution (status: {status})")]
    NotApproved {
        /// ID of the plan.
        plan_id: String,
        /// Current plan status.
        status: String,
    },
}

/// Approval workflow errors.
#[derive(Debug, Error)]
pub enum ApprovalError {
    /// No pending approval request exists for the plan.
    #[error("No pending approval found for change plan {plan_id}")]
    NotFound {
        /// ID of the change plan.
        plan_id: String,
    },

    /// The approval request has already left the pending state.
    #[error("Approval request {approval_id} has already been processed (status: {status})")]
    AlreadyProcessed {
        /// ID of the approval request.
        approval_id: String,
        /// Status the request already holds.
        status: String,
    },

    /// The approval request expired before a decision was made.
    #[error("Approval request {approval_id} has expired")]
    Timeout {
        /// ID of the approval request.
        approval_id: String,
    },

    /// Rejection requires a non-empty reason.
    #[error("Rejection of plan {plan_id} requires a reason")]
    ReasonRequired {
        /// ID of the change plan.
        plan_id: String,
    },
}

/// State store errors.
#[derive(Debug, Error)]
pub enum StateError {
    /// The state backend failed.
    #[error("State backend error: {message}")]
    Backend {
        /// Description of the backend failure.
        message: String,
    },

    /// State could not be serialized or deserialized.
    #[error("State serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: String,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
    },
}

/// A serializable, user-visible rendering of an error.
///
/// Every failure surfaced to callers carries a stable code, a human
/// message, the time the report was built, and optional structured details.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    /// Stable error code.
    pub code: &'static str,
    /// Human-readable message.
    pub message: String,
    /// When the report was produced.
    pub timestamp: DateTime<Utc>,
    /// Optional structured details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Result type alias for Stackweaver operations.
pub type Result<T> = std::result::Result<T, StackweaverError>;

impl StackweaverError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns the stable error code for this error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Remote(RemoteError::ConnectionFailed { .. }) => "REMOTE_001",
            Self::Remote(RemoteError::ResourceNotFound { .. }) => "RESOURCE_001",
            Self::Plan(_) => "VALIDATION_001",
            Self::Approval(ApprovalError::Timeout { .. }) => "APPROVAL_001",
            Self::Approval(ApprovalError::NotFound { .. }) => "APPROVAL_002",
            Self::Approval(ApprovalError::AlreadyProcessed { .. }) => "APPROVAL_003",
            Self::Approval(ApprovalError::ReasonRequired { .. }) => "APPROVAL_004",
            Self::State(_) => "STATE_001",
            Self::Config(_) => "CONFIG_001",
            Self::Io(_) | Self::Internal(_) => "INTERNAL_001",
        }
    }

    /// Builds the user-visible report for this error.
    #[must_use]
    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            code: self.code(),
            message: self.to_string(),
            timestamp: Utc::now(),
            details: self.details(),
        }
    }

    /// Structured details for the report, where the variant carries any.
    fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::Remote(RemoteError::ResourceNotFound { resource_id }) => {
                Some(serde_json::json!({ "resource_id": resource_id }))
            }
            Self::Plan(PlanError::NotApproved { plan_id, status }) => {
                Some(serde_json::json!({ "plan_id": plan_id, "status": status }))
            }
            Self::Approval(
                ApprovalError::NotFound { plan_id } | ApprovalError::ReasonRequired { plan_id },
            ) => Some(serde_json::json!({ "plan_id": plan_id })),
            Self::Approval(ApprovalError::AlreadyProcessed {
                approval_id,
                status,
            }) => Some(serde_json::json!({ "approval_id": approval_id, "status": status })),
            Self::Approval(ApprovalError::Timeout { approval_id }) => {
                Some(serde_json::json!({ "approval_id": approval_id }))
            }
            _ => None,
        }
    }
}

impl RemoteError {
    /// Creates a connection-failed error with the given message.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            message: message.into(),
        }
    }

    /// Creates a resource-not-found error.
    #[must_use]
    pub fn not_found(resource_id: impl Into<String>) -> Self {
        Self::ResourceNotFound {
            resource_id: resource_id.into(),
        }
    }
}

impl PlanError {
    /// Creates a validation-failed error with the given message.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            message: message.into(),
        }
    }
}

impl StateError {
    /// Creates a backend error with the given message.
    #[must_use]
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Creates a serialization error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        let err = StackweaverError::from(RemoteError::connection("boom"));
        assert_eq!(err.code(), "REMOTE_001");

        let err = StackweaverError::from(ApprovalError::Timeout {
            approval_id: String::from("a-1"),
        });
        assert_eq!(err.code(), "APPROVAL_001");

        let err = StackweaverError::from(PlanError::validation("bad"));
        assert_eq!(err.code(), "VALIDATION_001");
    }

    #[test]
    fn test_report_carries_details() {
        let err = StackweaverError::from(ApprovalError::AlreadyProcessed {
            approval_id: String::from("a-2"),
            status: String::from("approved"),
        });
        let report = err.report();

        assert_eq!(report.code, "APPROVAL_003");
        let details = report.details.expect("details");
        assert_eq!(details["approval_id"], "a-2");
        assert_eq!(details["status"], "approved");
    }
}
