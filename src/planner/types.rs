//! Change plan types.
//!
//! This module defines the structure of change plans: individual deltas,
//! the ordered plan, risk levels, cost estimates, and validation results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::state::ResourceConfig;

/// Action a change performs on a resource.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    /// Create a new resource.
    Create,
    /// Update an existing resource.
    Update,
    /// Delete an existing resource.
    Delete,
}

/// Risk level of a change, ordered `Low < Medium < High`.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    /// Routine change.
    Low = 1,
    /// Change that warrants review.
    Medium = 2,
    /// Change that can disrupt service or lose data.
    High = 3,
}

/// One delta unit in a change plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Change {
    /// The action to perform.
    pub action: ChangeAction,
    /// Namespaced resource type.
    pub resource_type: String,
    /// Target resource id.
    pub resource_id: String,
    /// Configuration before the change (updates and deletes).
    #[serde(default)]
    pub current_config: Option<ResourceConfig>,
    /// Configuration after the change (creates and updates).
    #[serde(default)]
    pub desired_config: Option<ResourceConfig>,
    /// Resource ids that must be applied before this change.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Assessed risk level.
    pub risk_level: RiskLevel,
}

/// Summary counts for a change plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeSummary {
    /// Total number of changes.
    pub total_changes: usize,
    /// Number of creates.
    pub creates: usize,
    /// Number of updates.
    pub updates: usize,
    /// Number of deletes.
    pub deletes: usize,
    /// Estimated monthly cost delta, if computed.
    #[serde(default)]
    pub estimated_cost: Option<f64>,
    /// Estimated execution duration in minutes, if computed.
    #[serde(default)]
    pub estimated_duration: Option<u32>,
}

/// Lifecycle status of a change plan.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangePlanStatus {
    /// Awaiting approval.
    Pending,
    /// Approved for execution.
    Approved,
    /// Rejected (or expired).
    Rejected,
    /// Executed by the orchestrator.
    Executed,
}

/// An ordered, risk-scored plan of changes for a project.
///
/// A plan is immutable once created except for its status and approval
/// fields, which the approval workflow drives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangePlan {
    /// Unique plan id.
    pub id: String,
    /// Owning project.
    pub project_id: String,
    /// Summary counts.
    pub summary: ChangeSummary,
    /// Changes in execution order (dependency-sorted).
    pub changes: Vec<Change>,
    /// When the plan was created.
    pub created_at: DateTime<Utc>,
    /// Current status.
    pub status: ChangePlanStatus,
    /// Who requested the plan.
    #[serde(default)]
    pub created_by: Option<String>,
    /// Who approved the plan.
    #[serde(default)]
    pub approved_by: Option<String>,
    /// When the plan was approved.
    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,
}

/// A derived, disposable view of change dependencies.
///
/// Edges are ordered pairs `(depends_on, dependent)`.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Resource ids participating in the plan.
    pub nodes: Vec<String>,
    /// Directed `(depends_on, dependent)` edges.
    pub edges: Vec<(String, String)>,
}

/// Cost estimate for a change plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostEstimate {
    /// Total estimated monthly cost.
    pub total_monthly_cost: f64,
    /// Per-resource contributions, keyed by `type:resource_id`.
    pub cost_breakdown: HashMap<String, f64>,
    /// Currency code.
    pub currency: String,
}

/// Result of validating a change plan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationResult {
    /// True iff there are no errors. Warnings never block validity.
    pub is_valid: bool,
    /// Blocking problems.
    pub errors: Vec<String>,
    /// Non-blocking observations.
    pub warnings: Vec<String>,
}

impl Change {
    /// Creates a new change with risk defaulted to [`RiskLevel::Low`].
    #[must_use]
    pub fn new(action: ChangeAction, resource_type: &str, resource_id: &str) -> Self {
        Self {
            action,
            resource_type: resource_type.to_string(),
            resource_id: resource_id.to_string(),
            current_config: None,
            desired_config: None,
            dependencies: Vec::new(),
            risk_level: RiskLevel::Low,
        }
    }

    /// Sets the desired configuration.
    #[must_use]
    pub fn with_desired(mut self, config: ResourceConfig) -> Self {
        self.desired_config = Some(config);
        self
    }

    /// Sets the current configuration.
    #[must_use]
    pub fn with_current(mut self, config: ResourceConfig) -> Self {
        self.current_config = Some(config);
        self
    }
}

impl ChangeSummary {
    /// Builds a summary from a list of changes.
    #[must_use]
    pub fn from_changes(changes: &[Change]) -> Self {
        Self {
            total_changes: changes.len(),
            creates: changes
                .iter()
                .filter(|c| c.action == ChangeAction::Create)
                .count(),
            updates: changes
                .iter()
                .filter(|c| c.action == ChangeAction::Update)
                .count(),
            deletes: changes
                .iter()
                .filter(|c| c.action == ChangeAction::Delete)
                .count(),
            estimated_cost: None,
            estimated_duration: None,
        }
    }
}

impl ChangePlan {
    /// Returns true if the plan contains no changes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Returns the highest risk level present in the plan, if any.
    #[must_use]
    pub fn max_risk(&self) -> Option<RiskLevel> {
        self.changes.iter().map(|c| c.risk_level).max()
    }
}

impl DependencyGraph {
    /// Creates an empty graph.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }
}

impl ValidationResult {
    /// Builds a result from collected errors and warnings.
    #[must_use]
    pub fn from_parts(errors: Vec<String>, warnings: Vec<String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
            warnings,
        }
    }
}

impl std::fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for ChangePlanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Executed => "executed",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for Change {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} ({}) [{}]",
            self.action, self.resource_id, self.resource_type, self.risk_level
        )
    }
}

impl std::fmt::Display for ChangePlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.changes.is_empty() {
            return write!(f, "No changes required");
        }

        writeln!(
            f,
            "Change plan {} ({} creates, {} updates, {} deletes):",
            self.id, self.summary.creates, self.summary.updates, self.summary.deletes
        )?;
        for (i, change) in self.changes.iter().enumerate() {
            writeln!(f, "  {i}. {change}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_ordering() {
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
        assert_eq!(
            [RiskLevel::Medium, RiskLevel::High, RiskLevel::Low]
                .into_iter()
                .max(),
            Some(RiskLevel::High)
        );
    }

    #[test]
    fn test_summary_counts_partition_changes() {
        let changes = vec![
            Change::new(ChangeAction::Create, "VPC::VPC", "vpc-1"),
            Change::new(ChangeAction::Update, "EC2::Instance", "i-1"),
            Change::new(ChangeAction::Delete, "S3::Bucket", "b-1"),
            Change::new(ChangeAction::Create, "VPC::Subnet", "subnet-1"),
        ];
        let summary = ChangeSummary::from_changes(&changes);

        assert_eq!(summary.total_changes, 4);
        assert_eq!(summary.creates, 2);
        assert_eq!(summary.updates, 1);
        assert_eq!(summary.deletes, 1);
        assert_eq!(
            summary.creates + summary.updates + summary.deletes,
            summary.total_changes
        );
    }
}
