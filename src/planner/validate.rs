//! Change plan validation.
//!
//! Validation never fails as an operation: problems are collected into a
//! [`ValidationResult`] where errors block validity and warnings inform.

use std::collections::HashSet;
use tracing::info;

use crate::state::ResourceConfig;

use super::types::{Change, ChangeAction, ChangePlan, RiskLevel, ValidationResult};

/// Resource types whose deletion can destroy data.
const STATEFUL_TYPES: &[&str] = &["RDS::DBInstance", "S3::Bucket"];

/// Validator for change plans.
#[derive(Debug, Default)]
pub struct PlanValidator;

impl PlanValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a plan: structure per change, dependency closure, and
    /// plan-wide warnings.
    #[must_use]
    pub fn validate(&self, plan: &ChangePlan) -> ValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if plan.changes.is_empty() {
            warnings.push(String::from("Change plan contains no changes"));
        }

        for change in &plan.changes {
            Self::validate_change(change, &mut errors, &mut warnings);
        }

        Self::validate_dependencies(&plan.changes, &mut errors);

        let high_risk = plan
            .changes
            .iter()
            .filter(|c| c.risk_level == RiskLevel::High)
            .count();
        if high_risk > 0 {
            warnings.push(format!("Plan contains {high_risk} high-risk changes"));
        }

        let data_loss = plan
            .changes
            .iter()
            .filter(|c| {
                c.action == ChangeAction::Delete
                    && STATEFUL_TYPES.contains(&c.resource_type.as_str())
            })
            .count();
        if data_loss > 0 {
            warnings.push(format!(
                "Plan may cause data loss: {data_loss} resources with data will be deleted"
            ));
        }

        info!(
            "Validated plan {}: {} errors, {} warnings",
            plan.id,
            errors.len(),
            warnings.len()
        );

        ValidationResult::from_parts(errors, warnings)
    }

    /// Structural checks on a single change.
    fn validate_change(change: &Change, errors: &mut Vec<String>, warnings: &mut Vec<String>) {
        if change.resource_id.is_empty() {
            errors.push(String::from("Change missing resource ID"));
        }
        if change.resource_type.is_empty() {
            errors.push(String::from("Change missing resource type"));
        }

        match change.action {
            ChangeAction::Create => {
                if change.desired_config.is_none() {
                    errors.push(format!(
                        "CREATE change for {} missing desired configuration",
                        change.resource_id
                    ));
                }
            }
            ChangeAction::Update => {
                if change.current_config.is_none() || change.desired_config.is_none() {
                    errors.push(format!(
                        "UPDATE change for {} missing current or desired configuration",
                        change.resource_id
                    ));
                }
            }
            ChangeAction::Delete => {
                if change.current_config.is_none() {
                    errors.push(format!(
                        "DELETE change for {} missing current configuration",
                        change.resource_id
                    ));
                }
            }
        }

        if let Some(config) = &change.desired_config {
            let (config_errors, config_warnings) = Self::validate_resource_config(config);
            errors.extend(
                config_errors
                    .into_iter()
                    .map(|e| format!("{}: {e}", change.resource_id)),
            );
            warnings.extend(
                config_warnings
                    .into_iter()
                    .map(|w| format!("{}: {w}", change.resource_id)),
            );
        }
    }

    /// Type-specific configuration requirements.
    fn validate_resource_config(config: &ResourceConfig) -> (Vec<String>, Vec<String>) {
        let mut errors = Vec::new();
        let warnings = Vec::new();

        if config.name.is_empty() {
            errors.push(String::from("Resource name is required"));
        }
        if config.properties.is_empty() {
            errors.push(String::from("Resource properties are required"));
        }

        match config.resource_type.as_str() {
            "EC2::Instance" => {
                if !config.properties.contains_key("instanceType") {
                    errors.push(String::from("EC2 instance requires instanceType"));
                }
                if !config.properties.contains_key("imageId") {
                    errors.push(String::from("EC2 instance requires imageId"));
                }
            }
            "RDS::DBInstance" => {
                if !config.properties.contains_key("dbInstanceClass") {
                    errors.push(String::from("RDS instance requires dbInstanceClass"));
                }
                if !config.properties.contains_key("engine") {
                    errors.push(String::from("RDS instance requires engine"));
                }
            }
            _ => {}
        }

        (errors, warnings)
    }

    /// Every declared dependency must refer to another change in the plan.
    fn validate_dependencies(changes: &[Change], errors: &mut Vec<String>) {
        let ids: HashSet<&str> = changes.iter().map(|c| c.resource_id.as_str()).collect();

        for change in changes {
            for dep in &change.dependencies {
                if !ids.contains(dep.as_str()) {
                    errors.push(format!(
                        "Change {} depends on {dep} which is not in the plan",
                        change.resource_id
                    ));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::types::{ChangePlanStatus, ChangeSummary};
    use chrono::Utc;
    use std::collections::HashMap;

    fn config(resource_type: &str, name: &str, props: &[(&str, serde_json::Value)]) -> ResourceConfig {
        ResourceConfig {
            resource_type: resource_type.to_string(),
            name: name.to_string(),
            properties: props
                .iter()
                .map(|(k, v)| ((*k).to_string(), v.clone()))
                .collect(),
            tags: HashMap::new(),
        }
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
    fn test_empty_plan_is_valid_with_warning() {
        let result = PlanValidator::new().validate(&plan_with(Vec::new()));
        assert!(result.is_valid);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("no changes")));
    }

    #[test]
    fn test_ec2_create_requires_instance_type_and_image() {
        let change = Change::new(ChangeAction::Create, "EC2::Instance", "i-1").with_desired(
            config("EC2::Instance", "web", &[("imageId", serde_json::json!("ami-1"))]),
        );
        let result = PlanValidator::new().validate(&plan_with(vec![change]));

        assert!(!result.is_valid);
        assert!(result
            .errors
            .iter()
            .any(|e| e.contains("requires instanceType")));
        assert!(!result.errors.iter().any(|e| e.contains("requires imageId")));
    }

    #[test]
    fn test_dependency_outside_plan_is_an_error() {
        let mut change = Change::new(ChangeAction::Create, "VPC::Subnet", "subnet-1")
            .with_desired(config(
                "VPC::Subnet",
                "private-a",
                &[("cidrBlock", serde_json::json!("10.0.1.0/24"))],
            ));
        change.dependencies = vec![String::from("vpc-missing")];
        let result = PlanValidator::new().validate(&plan_with(vec![change]));

        assert!(!result.is_valid);
        assert!(result
            .errors
            .iter()
            .any(|e| e.contains("vpc-missing")));
    }

    #[test]
    fn test_stateful_delete_warns_but_passes() {
        let mut change = Change::new(ChangeAction::Delete, "RDS::DBInstance", "db-1")
            .with_current(config(
                "RDS::DBInstance",
                "primary",
                &[("dbInstanceClass", serde_json::json!("db.t3.small"))],
            ));
        change.risk_level = RiskLevel::High;
        let result = PlanValidator::new().validate(&plan_with(vec![change]));

        assert!(result.is_valid);
        assert!(result.warnings.iter().any(|w| w.contains("data loss")));
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("high-risk")));
    }
}
