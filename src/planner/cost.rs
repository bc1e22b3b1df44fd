//! Static monthly cost estimation.
//!
//! Uses a fixed price table rather than a live pricing API; figures are
//! monthly USD. Deletes contribute nothing.

use std::collections::HashMap;
use tracing::info;

use super::types::{Change, ChangeAction, ChangePlan, CostEstimate};

/// Per-size monthly prices for EC2 instances.
const EC2_INSTANCE_COSTS: &[(&str, f64)] = &[
    ("t3.micro", 8.76),
    ("t3.small", 17.52),
    ("t3.medium", 35.04),
    ("t3.large", 70.08),
    ("t3.xlarge", 140.16),
];

/// Per-class monthly prices for RDS instances.
const RDS_INSTANCE_COSTS: &[(&str, f64)] = &[
    ("db.t3.micro", 17.52),
    ("db.t3.small", 35.04),
    ("db.t3.medium", 70.08),
    ("db.t3.large", 140.16),
    ("db.t3.xlarge", 280.32),
];

/// Flat monthly prices for types that do not vary by size.
const FLAT_COSTS: &[(&str, f64)] = &[
    ("Lambda::Function", 0.20),
    ("S3::Bucket", 0.023),
    ("ALB::LoadBalancer", 22.27),
];

/// Estimator producing a [`CostEstimate`] from the static price table.
#[derive(Debug)]
pub struct CostEstimator {
    ec2_costs: HashMap<&'static str, f64>,
    rds_costs: HashMap<&'static str, f64>,
    flat_costs: HashMap<&'static str, f64>,
}

impl Default for CostEstimator {
    fn default() -> Self {
        Self {
            ec2_costs: EC2_INSTANCE_COSTS.iter().copied().collect(),
            rds_costs: RDS_INSTANCE_COSTS.iter().copied().collect(),
            flat_costs: FLAT_COSTS.iter().copied().collect(),
        }
    }
}

impl CostEstimator {
    /// Creates an estimator with the built-in price table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sums per-change costs into a plan-level estimate.
    ///
    /// Zero-cost changes are left out of the breakdown.
    #[must_use]
    pub fn estimate_plan(&self, plan: &ChangePlan) -> CostEstimate {
        let mut total = 0.0;
        let mut breakdown = HashMap::new();

        for change in &plan.changes {
            let cost = self.estimate_change(change);
            total += cost;
            if cost > 0.0 {
                breakdown.insert(
                    format!("{}:{}", change.resource_type, change.resource_id),
                    cost,
                );
            }
        }

        info!("Estimated monthly cost for plan {}: ${:.2}", plan.id, total);

        CostEstimate {
            total_monthly_cost: total,
            cost_breakdown: breakdown,
            currency: String::from("USD"),
        }
    }

    /// Monthly cost contribution of a single change.
    #[must_use]
    pub fn estimate_change(&self, change: &Change) -> f64 {
        if change.action == ChangeAction::Delete {
            return 0.0;
        }

        let Some(config) = &change.desired_config else {
            return 0.0;
        };

        match change.resource_type.as_str() {
            "EC2::Instance" => Self::sized_cost(&self.ec2_costs, config, "instanceType"),
            "RDS::DBInstance" => Self::sized_cost(&self.rds_costs, config, "dbInstanceClass"),
            other => self.flat_costs.get(other).copied().unwrap_or(0.0),
        }
    }

    /// Looks up a size-dependent cost; unknown sizes cost nothing.
    fn sized_cost(
        table: &HashMap<&'static str, f64>,
        config: &crate::state::ResourceConfig,
        size_property: &str,
    ) -> f64 {
        config
            .properties
            .get(size_property)
            .and_then(serde_json::Value::as_str)
            .and_then(|size| table.get(size))
            .copied()
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::types::{ChangePlanStatus, ChangeSummary};
    use crate::state::ResourceConfig;
    use chrono::Utc;
    use std::collections::HashMap;

    fn instance_change(action: ChangeAction, id: &str, instance_type: &str) -> Change {
        let mut properties = HashMap::new();
        properties.insert(
            String::from("instanceType"),
            serde_json::json!(instance_type),
        );
        Change::new(action, "EC2::Instance", id).with_desired(ResourceConfig {
            resource_type: String::from("EC2::Instance"),
            name: id.to_string(),
            properties,
            tags: HashMap::new(),
        })
    }

    fn plan_with(changes: Vec<Change>) -> ChangePlan {
        ChangePlan {
            id: String::from("plan-1"),
            project_id: String::from("p-1"),
            summary: ChangeSummary::from_changes(&changes),
            changes,
            created_at: Utc::now(),
            status: ChangePlanStatus::Pending,
            created_by: None,
            approved_by: None,
            approved_at: None,
        }
    }

    #[test]
    fn test_sized_and_flat_costs() {
        let estimator = CostEstimator::new();
        let alb = Change::new(ChangeAction::Create, "ALB::LoadBalancer", "alb-1")
            .with_desired(ResourceConfig {
                resource_type: String::from("ALB::LoadBalancer"),
                name: String::from("edge"),
                properties: HashMap::new(),
                tags: HashMap::new(),
            });

        let plan = plan_with(vec![
            instance_change(ChangeAction::Create, "i-1", "t3.medium"),
            alb,
        ]);
        let estimate = estimator.estimate_plan(&plan);

        assert!((estimate.total_monthly_cost - (35.04 + 22.27)).abs() < f64::EPSILON);
        assert_eq!(
            estimate.cost_breakdown.get("EC2::Instance:i-1"),
            Some(&35.04)
        );
        assert_eq!(estimate.currency, "USD");
    }

    #[test]
    fn test_deletes_cost_nothing() {
        let estimator = CostEstimator::new();
        let plan = plan_with(vec![instance_change(ChangeAction::Delete, "i-1", "t3.xlarge")]);
        let estimate = estimator.estimate_plan(&plan);

        assert!(estimate.total_monthly_cost.abs() < f64::EPSILON);
        assert!(estimate.cost_breakdown.is_empty());
    }

    #[test]
    fn test_unknown_size_costs_nothing() {
        let estimator = CostEstimator::new();
        let change = instance_change(ChangeAction::Create, "i-1", "m7i.48xlarge");
        assert!(estimator.estimate_change(&change).abs() < f64::EPSILON);
    }
}
