//! The approval workflow.
//!
//! Drives approval requests through their lifecycle: submission with
//! optional auto-approval, human approve/reject decisions, and timeout
//! expiry via cancellable background timers. All state transitions go
//! through the store's atomic resolution seam.

use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{ApprovalError, Result, StackweaverError, StateError};
use crate::planner::{ChangePlan, ChangePlanStatus};

use super::store::{ApprovalStore, Resolution, ResolveOutcome};
use super::types::{ApprovalRequest, ApprovalStatus, ApprovalWorkflowConfig};

/// Approval workflow over an injected store.
///
/// Cheaply cloneable; clones share the store and timer registry.
#[derive(Clone)]
pub struct ApprovalWorkflow {
    inner: Arc<WorkflowInner>,
}

struct WorkflowInner {
    config: ApprovalWorkflowConfig,
    store: Arc<dyn ApprovalStore>,
    /// Running expiry timers keyed by approval id.
    timers: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl ApprovalWorkflow {
    /// Creates a workflow over the given store.
    #[must_use]
    pub fn new(config: ApprovalWorkflowConfig, store: Arc<dyn ApprovalStore>) -> Self {
        Self {
            inner: Arc::new(WorkflowInner {
                config,
                store,
                timers: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Submits a plan for approval.
    ///
    /// Plans matching an auto-approval rule are approved immediately by
    /// the system and get an `auto-approved-{plan_id}` id. Otherwise a
    /// pending request is created with an expiry timer.
    pub async fn submit_for_approval(&self, mut plan: ChangePlan) -> Result<String> {
        info!("Submitting change plan {} for approval", plan.id);

        if self.should_auto_approve(&plan) {
            info!("Auto-approving change plan {}", plan.id);
            let plan_id = plan.id.clone();
            plan.status = ChangePlanStatus::Approved;
            plan.approved_at = Some(Utc::now());
            plan.approved_by = Some(String::from("system"));
            self.inner.store.put_plan(plan).await?;
            return Ok(format!("auto-approved-{plan_id}"));
        }

        let approval_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let timeout_minutes = self.inner.config.default_timeout_minutes;
        let expires_at = now
            + Duration::minutes(
                i64::try_from(timeout_minutes)
                    .map_err(|_| StackweaverError::internal("approval timeout out of range"))?,
            );

        let request = ApprovalRequest {
            id: approval_id.clone(),
            change_plan_id: plan.id.clone(),
            project_id: plan.project_id.clone(),
            requester_id: plan
                .created_by
                .clone()
                .unwrap_or_else(|| String::from("unknown")),
            approver_id: None,
            status: ApprovalStatus::Pending,
            created_at: now,
            expires_at,
            approved_at: None,
            rejected_at: None,
            rejection_reason: None,
            timeout_minutes,
        };

        let plan_id = plan.id.clone();
        plan.status = ChangePlanStatus::Pending;
        self.inner.store.put_request(request.clone()).await?;
        self.inner.store.put_plan(plan).await?;

        self.start_timer(request).await?;

        info!("Created approval request {approval_id} for change plan {plan_id}");
        Ok(approval_id)
    }

    /// Approves a pending plan on behalf of a user.
    pub async fn approve_plan(&self, plan_id: &str, approver_id: &str) -> Result<ChangePlan> {
        info!("Approving change plan {plan_id} by user {approver_id}");

        let outcome = self
            .inner
            .store
            .resolve_pending(
                plan_id,
                Resolution::Approve {
                    approver_id: approver_id.to_string(),
                },
            )
            .await?;

        match outcome {
            ResolveOutcome::NotFound => Err(ApprovalError::NotFound {
                plan_id: plan_id.to_string(),
            }
            .into()),
            ResolveOutcome::AlreadyProcessed {
                approval_id,
                status,
            } => Err(ApprovalError::AlreadyProcessed {
                approval_id,
                status: status.to_string(),
            }
            .into()),
            ResolveOutcome::Expired { approval_id } => {
                self.cancel_timer(&approval_id);
                Err(ApprovalError::Timeout { approval_id }.into())
            }
            ResolveOutcome::Resolved { request, plan } => {
                self.cancel_timer(&request.id);
                info!("Successfully approved change plan {plan_id}");
                plan.ok_or_else(|| {
                    StateError::backend(format!("plan {plan_id} missing from approval store"))
                        .into()
                })
            }
        }
    }

    /// Rejects a pending plan on behalf of a user. A non-empty reason is
    /// required.
    pub async fn reject_plan(
        &self,
        plan_id: &str,
        approver_id: &str,
        reason: &str,
    ) -> Result<ChangePlan> {
        if reason.trim().is_empty() {
            return Err(ApprovalError::ReasonRequired {
                plan_id: plan_id.to_string(),
            }
            .into());
        }

        info!("Rejecting change plan {plan_id} by user {approver_id}");

        let outcome = self
            .inner
            .store
            .resolve_pending(
                plan_id,
                Resolution::Reject {
                    approver_id: approver_id.to_string(),
                    reason: reason.to_string(),
                },
            )
            .await?;

        match outcome {
            ResolveOutcome::NotFound => Err(ApprovalError::NotFound {
                plan_id: plan_id.to_string(),
            }
            .into()),
            ResolveOutcome::AlreadyProcessed {
                approval_id,
                status,
            } => Err(ApprovalError::AlreadyProcessed {
                approval_id,
                status: status.to_string(),
            }
            .into()),
            ResolveOutcome::Expired { approval_id } => {
                self.cancel_timer(&approval_id);
                Err(ApprovalError::Timeout { approval_id }.into())
            }
            ResolveOutcome::Resolved { request, plan } => {
                self.cancel_timer(&request.id);
                info!("Successfully rejected change plan {plan_id}");
                plan.ok_or_else(|| {
                    StateError::backend(format!("plan {plan_id} missing from approval store"))
                        .into()
                })
            }
        }
    }

    /// Lists plans awaiting approval that the given user may decide on.
    ///
    /// A plan's author never sees their own plan here; expired requests
    /// are skipped.
    pub async fn get_pending_approvals(&self, user_id: &str) -> Result<Vec<ChangePlan>> {
        let now = Utc::now();
        let mut pending = Vec::new();

        for request in self.inner.store.pending_requests().await? {
            if request.is_expired_at(now) {
                continue;
            }

            let Some(plan) = self.inner.store.plan(&request.change_plan_id).await? else {
                continue;
            };
            if plan.created_by.as_deref() == Some(user_id) {
                continue;
            }
            pending.push(plan);
        }

        info!(
            "Found {} pending approvals for user {user_id}",
            pending.len()
        );
        Ok(pending)
    }

    /// Checks whether a plan's approval window has lapsed, expiring the
    /// request as a side effect when it has. Idempotent; resolved or
    /// unknown plans report `false`.
    pub async fn check_approval_timeout(&self, plan_id: &str) -> Result<bool> {
        let Some(request) = self.inner.store.request_for_plan(plan_id).await? else {
            return Ok(false);
        };

        if !request.is_expired_at(Utc::now()) {
            return Ok(false);
        }

        info!("Change plan {plan_id} has timed out");
        self.expire(plan_id, &request.id).await;
        Ok(true)
    }

    /// True when auto-approval is enabled and at least one rule covers
    /// every change in the plan.
    fn should_auto_approve(&self, plan: &ChangePlan) -> bool {
        self.inner.config.auto_approval_enabled
            && self
                .inner
                .config
                .approval_rules
                .iter()
                .any(|rule| rule.matches(&plan.changes))
    }

    /// Spawns the expiry timer for a pending request. A request already
    /// past its window is expired on the spot.
    async fn start_timer(&self, request: ApprovalRequest) -> Result<()> {
        let remaining = request.expires_at - Utc::now();
        let Ok(sleep_for) = remaining.to_std() else {
            // Window already lapsed.
            self.expire(&request.change_plan_id, &request.id).await;
            return Ok(());
        };

        let workflow = self.clone();
        let plan_id = request.change_plan_id.clone();
        let approval_id = request.id.clone();

        // Holding the lock across the spawn orders the insert before the
        // fired timer's own registry removal.
        let mut timers = self
            .inner
            .timers
            .lock()
            .map_err(|e| StackweaverError::internal(format!("timer registry poisoned: {e}")))?;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(sleep_for).await;
            workflow.expire(&plan_id, &approval_id).await;
        });
        timers.insert(request.id, handle);
        Ok(())
    }

    /// Aborts and forgets the timer for an approval id, if one is running.
    fn cancel_timer(&self, approval_id: &str) {
        if let Ok(mut timers) = self.inner.timers.lock() {
            if let Some(handle) = timers.remove(approval_id) {
                handle.abort();
            }
        }
    }

    /// Best-effort expiry: the atomic resolution ignores requests that
    /// have already been decided.
    async fn expire(&self, plan_id: &str, approval_id: &str) {
        match self
            .inner
            .store
            .resolve_pending(plan_id, Resolution::Expire)
            .await
        {
            Ok(ResolveOutcome::Resolved { .. }) => {
                info!("Expiring approval request {approval_id} due to timeout");
            }
            Ok(_) => {}
            Err(e) => {
                error!("Failed to expire approval request {approval_id}: {e}");
            }
        }

        if let Ok(mut timers) = self.inner.timers.lock() {
            timers.remove(approval_id);
        } else {
            warn!("Timer registry poisoned while expiring {approval_id}");
        }
    }
}
