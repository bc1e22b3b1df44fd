//! The change plan engine.
//!
//! Orchestrates the planning pipeline: load current state, diff against
//! desired, resolve and order dependencies, assess risk, and package the
//! result as an immutable [`ChangePlan`].

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{PlanError, Result};
use crate::state::{InfrastructureState, StateStore};

use super::cost::CostEstimator;
use super::deps::DependencyResolver;
use super::diff::StateDiffer;
use super::graph;
use super::risk::RiskAssessor;
use super::types::{
    Change, ChangePlan, ChangePlanStatus, ChangeSummary, CostEstimate, DependencyGraph,
    ValidationResult,
};
use super::validate::PlanValidator;

/// Engine that turns a desired state into an ordered, risk-scored plan.
pub struct ChangePlanEngine<S> {
    store: S,
    differ: StateDiffer,
    resolver: DependencyResolver,
    assessor: RiskAssessor,
    estimator: CostEstimator,
    validator: PlanValidator,
}

impl<S: StateStore> ChangePlanEngine<S> {
    /// Creates an engine backed by the given state store.
    #[must_use]
    pub fn new(store: S) -> Self {
        Self {
            store,
            differ: StateDiffer::new(),
            resolver: DependencyResolver::new(),
            assessor: RiskAssessor::new(),
            estimator: CostEstimator::new(),
            validator: PlanValidator::new(),
        }
    }

    /// Generates a change plan converging the project onto the desired state.
    ///
    /// A project with no recorded state produces creates for everything.
    /// The returned plan's changes are in dependency order with risk levels
    /// assessed, and its status is [`ChangePlanStatus::Pending`].
    pub async fn generate_plan(
        &self,
        project_id: &str,
        desired_state: &InfrastructureState,
    ) -> Result<ChangePlan> {
        info!("Generating change plan for project {project_id}");

        let current_state = self
            .store
            .get_current_state(project_id)
            .await
            .map_err(|e| PlanError::validation(format!("Failed to generate change plan: {e}")))?;

        let mut changes = match &current_state {
            None => self.differ.create_all(desired_state),
            Some(current) => self.differ.compare_states(current, desired_state),
        };

        let dependency_graph = self.analyze_dependencies(&mut changes);
        let mut sorted_changes = graph::sort_changes(changes, &dependency_graph);

        for change in &mut sorted_changes {
            change.risk_level = self.assessor.assess(change);
        }

        let plan = ChangePlan {
            id: Uuid::new_v4().to_string(),
            project_id: project_id.to_string(),
            summary: ChangeSummary::from_changes(&sorted_changes),
            changes: sorted_changes,
            created_at: Utc::now(),
            status: ChangePlanStatus::Pending,
            created_by: None,
            approved_by: None,
            approved_at: None,
        };

        info!(
            "Generated change plan {} with {} changes",
            plan.id, plan.summary.total_changes
        );
        Ok(plan)
    }

    /// Resolves each change's dependencies and builds the graph over them.
    ///
    /// Changes that arrive with dependencies already set keep them; only
    /// empty lists are resolved. Circular dependencies are logged, never
    /// fatal.
    pub fn analyze_dependencies(&self, changes: &mut [Change]) -> DependencyGraph {
        for i in 0..changes.len() {
            if changes[i].dependencies.is_empty() {
                let resolved = self.resolver.resolve(&changes[i], changes);
                changes[i].dependencies = resolved;
            }
        }

        let dependency_graph = graph::build_graph(changes);

        let cycles = graph::detect_cycles(&dependency_graph.nodes, &dependency_graph.edges);
        if !cycles.is_empty() {
            warn!("Circular dependencies detected: {cycles:?}");
        }

        info!(
            "Analyzed dependencies: {} nodes, {} edges",
            dependency_graph.nodes.len(),
            dependency_graph.edges.len()
        );
        dependency_graph
    }

    /// Estimates the monthly cost of executing the plan.
    #[must_use]
    pub fn estimate_cost(&self, plan: &ChangePlan) -> CostEstimate {
        self.estimator.estimate_plan(plan)
    }

    /// Validates the plan; problems are reported in the result rather than
    /// as an error.
    #[must_use]
    pub fn validate_plan(&self, plan: &ChangePlan) -> ValidationResult {
        self.validator.validate(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{StackweaverError, StateError};
    use crate::planner::types::{ChangeAction, RiskLevel};
    use crate::state::{MockStateStore, Resource, ResourceStatus, StateMetadata};
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

    #[tokio::test]
    async fn test_generate_plan_without_current_state_creates_everything() {
        let mut store = MockStateStore::new();
        store
            .expect_get_current_state()
            .returning(|_| Ok(None));

        let engine = ChangePlanEngine::new(store);
        let desired = make_state(vec![
            make_resource("vpc-1", "VPC::VPC", "main"),
            make_resource("subnet-1", "VPC::Subnet", "private-a"),
        ]);

        let plan = engine
            .generate_plan("p-1", &desired)
            .await
            .expect("plan generated");

        assert_eq!(plan.status, ChangePlanStatus::Pending);
        assert_eq!(plan.summary.creates, 2);
        assert!(plan.changes.iter().all(|c| c.action == ChangeAction::Create));

        // The subnet type-depends on the VPC, so the VPC sorts first.
        assert_eq!(plan.changes[0].resource_id, "vpc-1");
        assert_eq!(plan.changes[1].resource_id, "subnet-1");
        assert_eq!(plan.changes[1].dependencies, vec![String::from("vpc-1")]);
    }

    #[tokio::test]
    async fn test_generate_plan_diffs_against_current_state() {
        let current = make_state(vec![make_resource("sg-1", "EC2::SecurityGroup", "old")]);
        let mut store = MockStateStore::new();
        store
            .expect_get_current_state()
            .returning(move |_| Ok(Some(current.clone())));

        let engine = ChangePlanEngine::new(store);
        let desired = make_state(vec![make_resource("subnet-1", "VPC::Subnet", "new")]);

        let plan = engine
            .generate_plan("p-1", &desired)
            .await
            .expect("plan generated");

        assert_eq!(plan.summary.creates, 1);
        assert_eq!(plan.summary.deletes, 1);
        let delete = plan
            .changes
            .iter()
            .find(|c| c.action == ChangeAction::Delete)
            .expect("delete present");
        assert_eq!(delete.risk_level, RiskLevel::High);
    }

    #[tokio::test]
    async fn test_state_fetch_failure_surfaces_as_plan_error() {
        let mut store = MockStateStore::new();
        store
            .expect_get_current_state()
            .returning(|_| Err(StateError::backend("backend down").into()));

        let engine = ChangePlanEngine::new(store);
        let desired = make_state(Vec::new());

        let err = engine
            .generate_plan("p-1", &desired)
            .await
            .expect_err("plan generation fails");

        assert!(matches!(
            err,
            StackweaverError::Plan(PlanError::ValidationFailed { .. })
        ));
        assert!(err.to_string().contains("backend down"));
    }

    #[tokio::test]
    async fn test_presupplied_dependencies_are_kept() {
        let mut store = MockStateStore::new();
        store.expect_get_current_state().returning(|_| Ok(None));

        let engine = ChangePlanEngine::new(store);
        let mut changes = vec![
            Change::new(ChangeAction::Create, "EC2::Instance", "i-1"),
            Change::new(ChangeAction::Create, "VPC::Subnet", "subnet-1"),
        ];
        changes[0].dependencies = vec![String::from("subnet-1")];

        let dependency_graph = engine.analyze_dependencies(&mut changes);

        assert_eq!(changes[0].dependencies, vec![String::from("subnet-1")]);
        assert!(dependency_graph
            .edges
            .contains(&(String::from("subnet-1"), String::from("i-1"))));
    }
}
