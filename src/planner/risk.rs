//! Risk assessment for changes.

use std::collections::HashSet;

use super::types::{Change, ChangeAction, RiskLevel};

/// Resource types where changes warrant elevated risk.
const HIGH_RISK_TYPES: &[&str] = &[
    "RDS::DBInstance",
    "EC2::Instance",
    "Lambda::Function",
    "ECS::Service",
    "S3::Bucket",
    "IAM::Role",
    "VPC::VPC",
];

/// Properties whose modification can disrupt or replace a resource.
const HIGH_RISK_PROPERTIES: &[&str] = &[
    "instanceType",
    "dbInstanceClass",
    "engine",
    "engineVersion",
    "allocatedStorage",
    "multiAZ",
    "publiclyAccessible",
    "vpcSecurityGroupIds",
    "subnetIds",
    "availabilityZone",
];

/// Assessor that scores each change by action, type, and property deltas.
#[derive(Debug)]
pub struct RiskAssessor {
    high_risk_types: HashSet<&'static str>,
    high_risk_properties: Vec<&'static str>,
}

impl Default for RiskAssessor {
    fn default() -> Self {
        Self {
            high_risk_types: HIGH_RISK_TYPES.iter().copied().collect(),
            high_risk_properties: HIGH_RISK_PROPERTIES.to_vec(),
        }
    }
}

impl RiskAssessor {
    /// Creates an assessor with the built-in type and property lists.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scores a single change.
    ///
    /// Deletes are always high risk. For high-risk resource types, updates
    /// touching a high-risk property are high, other updates medium, and
    /// creates medium. Everything else is low.
    #[must_use]
    pub fn assess(&self, change: &Change) -> RiskLevel {
        if change.action == ChangeAction::Delete {
            return RiskLevel::High;
        }

        if self.high_risk_types.contains(change.resource_type.as_str()) {
            if change.action == ChangeAction::Update {
                if self.has_high_risk_property_changes(change) {
                    return RiskLevel::High;
                }
                return RiskLevel::Medium;
            }
            return RiskLevel::Medium;
        }

        RiskLevel::Low
    }

    /// True when an update modifies a high-risk property present in both
    /// configurations.
    fn has_high_risk_property_changes(&self, change: &Change) -> bool {
        let (Some(current), Some(desired)) = (&change.current_config, &change.desired_config)
        else {
            return false;
        };

        self.high_risk_properties.iter().any(|prop| {
            match (current.properties.get(*prop), desired.properties.get(*prop)) {
                (Some(before), Some(after)) => before != after,
                _ => false,
            }
        })
    }
}
