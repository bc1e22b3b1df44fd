//! The orchestrator ties the planner, approval workflow, remote client,
//! and state store together behind one project-scoped surface.
//!
//! Resource mutations pass through to the backend with project tags
//! attached, then update the saved state snapshot best-effort; a state
//! write failure never fails an already-applied mutation.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::approval::ApprovalWorkflow;
use crate::error::{PlanError, RemoteError, Result};
use crate::planner::{
    Change, ChangeAction, ChangePlan, ChangePlanEngine, ChangePlanStatus, CostEstimate,
    ValidationResult,
};
use crate::remote::ProvisioningClient;
use crate::state::{
    InfrastructureState, Resource, ResourceConfig, ResourceFilter, ResourceUpdate, StateMetadata,
    StateStore,
};

/// Tag naming the owning project on every managed resource.
const PROJECT_TAG: &str = "Project";

/// Tag marking resources as managed by this tool.
const MANAGED_BY_TAG: &str = "ManagedBy";

/// Value of the managed-by tag.
const MANAGED_BY_VALUE: &str = "stackweaver";

/// Outcome of applying one change during plan execution.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeOutcome {
    /// Target resource.
    pub resource_id: String,
    /// Action attempted.
    pub action: ChangeAction,
    /// Whether the change applied.
    pub success: bool,
    /// Error message when it did not.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of executing a change plan.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    /// The executed plan.
    pub plan_id: String,
    /// Per-change outcomes in execution order.
    pub outcomes: Vec<ChangeOutcome>,
    /// Count of applied changes.
    pub succeeded: usize,
    /// Count of failed changes.
    pub failed: usize,
}

impl ExecutionReport {
    /// True when every change applied.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.failed == 0
    }
}

/// Project-scoped orchestration facade.
pub struct Orchestrator {
    project_id: String,
    client: ProvisioningClient,
    store: Arc<dyn StateStore>,
    engine: ChangePlanEngine<Arc<dyn StateStore>>,
    workflow: ApprovalWorkflow,
}

impl Orchestrator {
    /// Creates an orchestrator for a project.
    #[must_use]
    pub fn new(
        project_id: &str,
        client: ProvisioningClient,
        store: Arc<dyn StateStore>,
        workflow: ApprovalWorkflow,
    ) -> Self {
        Self {
            project_id: project_id.to_string(),
            client,
            engine: ChangePlanEngine::new(store.clone()),
            store,
            workflow,
        }
    }

    /// The project this orchestrator operates on.
    #[must_use]
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Creates a resource with project tags attached and records it in
    /// the state snapshot.
    pub async fn create_resource(&self, config: ResourceConfig) -> Result<Resource> {
        info!(
            "Creating resource {} for project {}",
            config.name, self.project_id
        );

        let enhanced = self.enhance_config(config);
        let resource = self.client.create_resource(&self.project_id, &enhanced).await?;

        self.record_created(&resource).await;

        info!(
            "Successfully created resource {} for project {}",
            resource.id, self.project_id
        );
        Ok(resource)
    }

    /// Lists the project's resources, enforcing project isolation on both
    /// the filter and the response.
    pub async fn get_resources(&self, filter: Option<ResourceFilter>) -> Result<Vec<Resource>> {
        let enhanced = self.enhance_filter(filter);
        let resources = self
            .client
            .list_resources(&self.project_id, Some(&enhanced))
            .await?;

        Ok(resources
            .into_iter()
            .filter(|r| {
                let owned = r.project_id == self.project_id
                    || r.tags.get(PROJECT_TAG) == Some(&self.project_id);
                if !owned {
                    warn!(
                        "Resource {} does not belong to project {}, filtering out",
                        r.id, self.project_id
                    );
                }
                owned
            })
            .collect())
    }

    /// Updates a resource after checking it belongs to this project.
    pub async fn update_resource(
        &self,
        resource_id: &str,
        updates: ResourceUpdate,
    ) -> Result<Resource> {
        self.check_ownership(resource_id).await?;

        let resource = self
            .client
            .update_resource(&self.project_id, resource_id, &updates)
            .await?;

        self.record_updated(&resource).await;
        Ok(resource)
    }

    /// Deletes a resource after checking it belongs to this project.
    /// Returns whether the backend reported success.
    pub async fn delete_resource(&self, resource_id: &str) -> Result<bool> {
        let resource = self.check_ownership(resource_id).await?;

        let deleted = self
            .client
            .delete_resource(&self.project_id, resource_id)
            .await?;

        if deleted {
            self.record_deleted(&resource).await;
        }
        Ok(deleted)
    }

    /// Generates a change plan converging the project onto the desired
    /// state, stamped with its author.
    pub async fn generate_plan(
        &self,
        desired_state: &InfrastructureState,
        author: &str,
    ) -> Result<ChangePlan> {
        let mut plan = self.engine.generate_plan(&self.project_id, desired_state).await?;
        plan.created_by = Some(author.to_string());
        Ok(plan)
    }

    /// Validates a plan.
    #[must_use]
    pub fn validate_plan(&self, plan: &ChangePlan) -> ValidationResult {
        self.engine.validate_plan(plan)
    }

    /// Estimates the monthly cost of a plan.
    #[must_use]
    pub fn estimate_cost(&self, plan: &ChangePlan) -> CostEstimate {
        self.engine.estimate_cost(plan)
    }

    /// Submits a plan for approval. Returns the approval request id.
    pub async fn submit_for_approval(&self, plan: ChangePlan) -> Result<String> {
        self.workflow.submit_for_approval(plan).await
    }

    /// Approves a pending plan.
    pub async fn approve_plan(&self, plan_id: &str, approver_id: &str) -> Result<ChangePlan> {
        self.workflow.approve_plan(plan_id, approver_id).await
    }

    /// Rejects a pending plan.
    pub async fn reject_plan(
        &self,
        plan_id: &str,
        approver_id: &str,
        reason: &str,
    ) -> Result<ChangePlan> {
        self.workflow.reject_plan(plan_id, approver_id, reason).await
    }

    /// Lists plans the given user may approve.
    pub async fn pending_approvals(&self, user_id: &str) -> Result<Vec<ChangePlan>> {
        self.workflow.get_pending_approvals(user_id).await
    }

    /// Probes backend health.
    pub async fn backend_healthy(&self) -> bool {
        self.client.health_check().await
    }

    /// Executes an approved plan, walking its changes in order.
    ///
    /// With `continue_on_error` set, a failed change is recorded and
    /// execution moves on; otherwise execution stops at the first failure.
    /// A fresh state snapshot is saved afterwards naming the plan.
    pub async fn execute_plan(
        &self,
        plan: &ChangePlan,
        continue_on_error: bool,
    ) -> Result<ExecutionReport> {
        if plan.status != ChangePlanStatus::Approved {
            return Err(PlanError::NotApproved {
                plan_id: plan.id.clone(),
                status: plan.status.to_string(),
            }
            .into());
        }

        info!(
            "Executing change plan {} ({} changes)",
            plan.id, plan.summary.total_changes
        );

        let mut outcomes = Vec::with_capacity(plan.changes.len());
        for change in &plan.changes {
            let result = self.apply_change(change).await;
            let outcome = match result {
                Ok(()) => ChangeOutcome {
                    resource_id: change.resource_id.clone(),
                    action: change.action,
                    success: true,
                    error: None,
                },
                Err(e) => {
                    warn!(
                        "Change {} {} failed: {e}",
                        change.action, change.resource_id
                    );
                    ChangeOutcome {
                        resource_id: change.resource_id.clone(),
                        action: change.action,
                        success: false,
                        error: Some(e.to_string()),
                    }
                }
            };

            let failed = !outcome.success;
            outcomes.push(outcome);
            if failed && !continue_on_error {
                break;
            }
        }

        let succeeded = outcomes.iter().filter(|o| o.success).count();
        let failed = outcomes.len() - succeeded;

        self.snapshot_after_execution(plan).await;

        info!(
            "Executed change plan {}: {succeeded} applied, {failed} failed",
            plan.id
        );
        Ok(ExecutionReport {
            plan_id: plan.id.clone(),
            outcomes,
            succeeded,
            failed,
        })
    }

    /// Applies a single change via the backend.
    async fn apply_change(&self, change: &Change) -> Result<()> {
        match change.action {
            ChangeAction::Create => {
                let config = change.desired_config.clone().ok_or_else(|| {
                    PlanError::validation(format!(
                        "CREATE change for {} missing desired configuration",
                        change.resource_id
                    ))
                })?;
                let enhanced = self.enhance_config(config);
                self.client
                    .create_resource(&self.project_id, &enhanced)
                    .await?;
                Ok(())
            }
            ChangeAction::Update => {
                let config = change.desired_config.clone().ok_or_else(|| {
                    PlanError::validation(format!(
                        "UPDATE change for {} missing desired configuration",
                        change.resource_id
                    ))
                })?;
                let updates = ResourceUpdate {
                    properties: Some(config.properties),
                    tags: Some(config.tags),
                };
                self.client
                    .update_resource(&self.project_id, &change.resource_id, &updates)
                    .await?;
                Ok(())
            }
            ChangeAction::Delete => {
                let deleted = self
                    .client
                    .delete_resource(&self.project_id, &change.resource_id)
                    .await?;
                if deleted {
                    Ok(())
                } else {
                    Err(RemoteError::connection(format!(
                        "Backend refused to delete resource {}",
                        change.resource_id
                    ))
                    .into())
                }
            }
        }
    }

    /// Attaches the project tags to a configuration.
    fn enhance_config(&self, mut config: ResourceConfig) -> ResourceConfig {
        config
            .tags
            .insert(String::from(PROJECT_TAG), self.project_id.clone());
        config
            .tags
            .insert(String::from(MANAGED_BY_TAG), String::from(MANAGED_BY_VALUE));
        config
    }

    /// Scopes a filter to this project's tag.
    fn enhance_filter(&self, filter: Option<ResourceFilter>) -> ResourceFilter {
        let mut filter = filter.unwrap_or_default();
        let mut tags = filter.tags.take().unwrap_or_default();
        tags.insert(String::from(PROJECT_TAG), self.project_id.clone());
        filter.tags = Some(tags);
        filter
    }

    /// Confirms the resource exists and belongs to this project.
    async fn check_ownership(&self, resource_id: &str) -> Result<Resource> {
        let resource = self
            .client
            .get_resource(&self.project_id, resource_id)
            .await?
            .ok_or_else(|| RemoteError::not_found(resource_id))?;

        if resource.project_id != self.project_id {
            return Err(RemoteError::not_found(resource_id).into());
        }
        Ok(resource)
    }

    /// Adds a created resource to the state snapshot. Best effort.
    async fn record_created(&self, resource: &Resource) {
        let result = async {
            let mut state = match self.store.get_current_state(&self.project_id).await? {
                Some(state) => state,
                None => InfrastructureState::new(
                    &self.project_id,
                    Vec::new(),
                    StateMetadata {
                        last_modified_by: String::from("system"),
                        change_description: String::from("Initial state creation"),
                        change_plan_id: None,
                    },
                ),
            };

            state.resources.push(resource.clone());
            state.timestamp = Utc::now();
            state.metadata.change_description = format!("Created resource {}", resource.name);
            state.metadata.last_modified_by = String::from("system");
            self.store.save_state(&state).await
        }
        .await;

        if let Err(e) = result {
            warn!("Failed to update state after resource creation: {e}");
        }
    }

    /// Replaces (or adds) an updated resource in the state snapshot. Best
    /// effort.
    async fn record_updated(&self, resource: &Resource) {
        let result = async {
            let Some(mut state) = self.store.get_current_state(&self.project_id).await? else {
                return Ok(());
            };

            match state.resources.iter_mut().find(|r| r.id == resource.id) {
                Some(existing) => *existing = resource.clone(),
                None => state.resources.push(resource.clone()),
            }
            state.timestamp = Utc::now();
            state.metadata.change_description = format!("Updated resource {}", resource.name);
            state.metadata.last_modified_by = String::from("system");
            self.store.save_state(&state).await
        }
        .await;

        if let Err(e) = result {
            warn!("Failed to update state after resource update: {e}");
        }
    }

    /// Removes a deleted resource from the state snapshot. Best effort.
    async fn record_deleted(&self, resource: &Resource) {
        let result = async {
            let Some(mut state) = self.store.get_current_state(&self.project_id).await? else {
                return Ok(());
            };

            state.resources.retain(|r| r.id != resource.id);
            state.timestamp = Utc::now();
            state.metadata.change_description = format!("Deleted resource {}", resource.name);
            state.metadata.last_modified_by = String::from("system");
            self.store.save_state(&state).await
        }
        .await;

        if let Err(e) = result {
            warn!("Failed to update state after resource deletion: {e}");
        }
    }

    /// Saves a fresh snapshot from the backend after plan execution. Best
    /// effort.
    async fn snapshot_after_execution(&self, plan: &ChangePlan) {
        let result = async {
            let resources = self.client.list_resources(&self.project_id, None).await?;
            let state = InfrastructureState::new(
                &self.project_id,
                resources,
                StateMetadata {
                    last_modified_by: String::from("system"),
                    change_description: format!("Executed change plan {}", plan.id),
                    change_plan_id: Some(plan.id.clone()),
                },
            );
            self.store.save_state(&state).await
        }
        .await;

        if let Err(e) = result {
            warn!("Failed to snapshot state after executing plan {}: {e}", plan.id);
        }
    }
}
