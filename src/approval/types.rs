//! Approval workflow types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::planner::RiskLevel;

/// Lifecycle status of an approval request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    /// Awaiting a decision.
    Pending,
    /// Approved by a user or the system.
    Approved,
    /// Rejected with a reason.
    Rejected,
    /// Timed out before a decision was made.
    Expired,
    /// Cancelled by the requester.
    Cancelled,
}

/// A request for approval of a change plan.
///
/// Requests are terminal once they leave [`ApprovalStatus::Pending`]; no
/// transition ever leaves a non-pending status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    /// Unique request id.
    pub id: String,
    /// The change plan awaiting approval.
    pub change_plan_id: String,
    /// Owning project.
    pub project_id: String,
    /// Who requested approval.
    pub requester_id: String,
    /// Who decided, once decided.
    #[serde(default)]
    pub approver_id: Option<String>,
    /// Current status.
    pub status: ApprovalStatus,
    /// When the request was created.
    pub created_at: DateTime<Utc>,
    /// When the request expires if undecided.
    pub expires_at: DateTime<Utc>,
    /// When the request was approved.
    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,
    /// When the request was rejected.
    #[serde(default)]
    pub rejected_at: Option<DateTime<Utc>>,
    /// Why the request was rejected.
    #[serde(default)]
    pub rejection_reason: Option<String>,
    /// Timeout window in minutes.
    pub timeout_minutes: u64,
}

impl ApprovalRequest {
    /// True when the request is pending and past its expiry time.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.status == ApprovalStatus::Pending && now > self.expires_at
    }
}

/// Rule for automatic approval of low-stakes plans.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRule {
    /// Highest risk level the rule tolerates, inclusive.
    pub max_risk_level: RiskLevel,
    /// Resource types the rule covers. Empty means any type.
    #[serde(default)]
    pub resource_types: Vec<String>,
}

impl ApprovalRule {
    /// True when every change in the plan satisfies the rule: risk at or
    /// below the maximum, and (when the allow-list is non-empty) every
    /// resource type on the list.
    #[must_use]
    pub fn matches(&self, changes: &[crate::planner::Change]) -> bool {
        if changes.iter().any(|c| c.risk_level > self.max_risk_level) {
            return false;
        }

        if !self.resource_types.is_empty()
            && changes
                .iter()
                .any(|c| !self.resource_types.contains(&c.resource_type))
        {
            return false;
        }

        true
    }
}

/// Configuration for the approval workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalWorkflowConfig {
    /// Timeout window applied to new requests, in minutes.
    pub default_timeout_minutes: u64,
    /// Master switch for the auto-approval path.
    pub auto_approval_enabled: bool,
    /// Rules evaluated when auto-approval is enabled.
    #[serde(default)]
    pub approval_rules: Vec<ApprovalRule>,
}

impl Default for ApprovalWorkflowConfig {
    fn default() -> Self {
        Self {
            default_timeout_minutes: 60,
            auto_approval_enabled: false,
            approval_rules: Vec::new(),
        }
    }
}

impl std::fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}
