//! Diff engine for comparing current vs desired state.
//!
//! This module computes the set of changes needed to transform the current
//! infrastructure snapshot into the desired one. Resources are matched by
//! id; two resources are "the same" only when their ids match.

use std::collections::HashMap;
use tracing::debug;

use crate::state::{InfrastructureState, Resource};

use super::types::{Change, ChangeAction, RiskLevel};

/// Engine for computing diffs between state snapshots.
#[derive(Debug, Default)]
pub struct StateDiffer;

impl StateDiffer {
    /// Creates a new differ.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Produces creates for every resource in the desired state.
    ///
    /// Used when a project has no recorded state yet.
    #[must_use]
    pub fn create_all(&self, desired: &InfrastructureState) -> Vec<Change> {
        desired
            .resources
            .iter()
            .map(|resource| {
                Change::new(ChangeAction::Create, &resource.resource_type, &resource.id)
                    .with_desired(resource.to_config())
            })
            .collect()
    }

    /// Compares two snapshots and returns the changes needed to converge.
    ///
    /// The result partitions exactly into creates (only in desired),
    /// deletes (only in current), and updates (in both, differing in
    /// name, properties, or tags).
    #[must_use]
    pub fn compare_states(
        &self,
        current: &InfrastructureState,
        desired: &InfrastructureState,
    ) -> Vec<Change> {
        let mut changes = Vec::new();

        let current_by_id: HashMap<&str, &Resource> = current
            .resources
            .iter()
            .map(|r| (r.id.as_str(), r))
            .collect();
        let desired_by_id: HashMap<&str, &Resource> = desired
            .resources
            .iter()
            .map(|r| (r.id.as_str(), r))
            .collect();

        // Resources only in desired become creates.
        for resource in &desired.resources {
            if !current_by_id.contains_key(resource.id.as_str()) {
                debug!("Resource {} needs to be created", resource.id);
                changes.push(
                    Change::new(ChangeAction::Create, &resource.resource_type, &resource.id)
                        .with_desired(resource.to_config()),
                );
            }
        }

        // Resources in both become updates when they differ; resources
        // only in current become deletes.
        for resource in &current.resources {
            match desired_by_id.get(resource.id.as_str()) {
                Some(desired_resource) => {
                    if Self::resources_differ(resource, desired_resource) {
                        debug!("Resource {} needs to be updated", resource.id);
                        let mut change = Change::new(
                            ChangeAction::Update,
                            &resource.resource_type,
                            &resource.id,
                        )
                        .with_current(resource.to_config())
                        .with_desired(desired_resource.to_config());
                        change.risk_level = RiskLevel::Medium;
                        changes.push(change);
                    }
                }
                None => {
                    debug!("Resource {} needs to be deleted", resource.id);
                    let mut change = Change::new(
                        ChangeAction::Delete,
                        &resource.resource_type,
                        &resource.id,
                    )
                    .with_current(resource.to_config());
                    change.risk_level = RiskLevel::High;
                    changes.push(change);
                }
            }
        }

        changes
    }

    /// Structural equality check on exactly name, properties, and tags.
    #[must_use]
    pub fn resources_differ(current: &Resource, desired: &Resource) -> bool {
        current.properties != desired.properties
            || current.tags != desired.tags
            || current.name != desired.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{ResourceStatus, StateMetadata};
    use chrono::Utc;
    use std::collections::HashMap;

    fn make_resource(id: &str, resource_type: &str, name: &str) -> Resource {
        let now = Utc::now();
        Resource {
            id: id.to_string(),
            project_id: String::from("p-1"),
            resource_type: resource_type.to_string(),
            name: name.to_string(),
            region: String::from("us-east-1"),
            properties: HashMap::new(),
            tags: HashMap::new(),
            status: ResourceStatus::Active,
            created_at: now,
            updated_at: now,
            arn: None,
        }
    }

    fn make_state(resources: Vec<Resource>) -> InfrastructureState {
        InfrastructureState::new(
            "p-1",
            resources,
            StateMetadata {
                last_modified_by: String::from("tester"),
                change_description: String::from("test"),
                change_plan_id: None,
            },
        )
    }

    #[test]
    fn test_create_all_from_empty() {
        let differ = StateDiffer::new();
        let desired = make_state(vec![
            make_resource("i-1", "EC2::Instance", "web"),
            make_resource("vpc-1", "VPC::VPC", "main"),
        ]);

        let changes = differ.create_all(&desired);
        assert_eq!(changes.len(), 2);
        assert!(changes.iter().all(|c| c.action == ChangeAction::Create));
        assert!(changes.iter().all(|c| c.desired_config.is_some()));
    }

    #[test]
    fn test_diff_partitions_by_id() {
        let differ = StateDiffer::new();

        let kept = make_resource("vpc-1", "VPC::VPC", "main");
        let mut updated_current = make_resource("i-1", "EC2::Instance", "web");
        updated_current
            .properties
            .insert(String::from("instanceType"), serde_json::json!("t3.micro"));
        let mut updated_desired = updated_current.clone();
        updated_desired
            .properties
            .insert(String::from("instanceType"), serde_json::json!("t3.large"));

        let current = make_state(vec![
            kept.clone(),
            updated_current,
            make_resource("sg-1", "EC2::SecurityGroup", "old"),
        ]);
        let desired = make_state(vec![
            kept,
            updated_desired,
            make_resource("subnet-1", "VPC::Subnet", "new"),
        ]);

        let changes = differ.compare_states(&current, &desired);

        let creates: Vec<_> = changes
            .iter()
            .filter(|c| c.action == ChangeAction::Create)
            .collect();
        let updates: Vec<_> = changes
            .iter()
            .filter(|c| c.action == ChangeAction::Update)
            .collect();
        let deletes: Vec<_> = changes
            .iter()
            .filter(|c| c.action == ChangeAction::Delete)
            .collect();

        assert_eq!(creates.len(), 1);
        assert_eq!(creates[0].resource_id, "subnet-1");
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].resource_id, "i-1");
        assert!(updates[0].current_config.is_some());
        assert!(updates[0].desired_config.is_some());
        assert_eq!(deletes.len(), 1);
        assert_eq!(deletes[0].resource_id, "sg-1");
        // Unchanged resource produces no change.
        assert_eq!(changes.len(), 3);
    }

    #[test]
    fn test_name_change_is_an_update() {
        let differ = StateDiffer::new();
        let current = make_state(vec![make_resource("i-1", "EC2::Instance", "old-name")]);
        let desired = make_state(vec![make_resource("i-1", "EC2::Instance", "new-name")]);

        let changes = differ.compare_states(&current, &desired);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].action, ChangeAction::Update);
    }

    #[test]
    fn test_identical_states_produce_no_changes() {
        let differ = StateDiffer::new();
        let state = make_state(vec![make_resource("i-1", "EC2::Instance", "web")]);

        let changes = differ.compare_states(&state, &state);
        assert!(changes.is_empty());
    }
}
