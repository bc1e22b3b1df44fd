//! Approval request and plan storage.
//!
//! The store owns the only mutable approval state. Decisions go through
//! [`ApprovalStore::resolve_pending`], which checks the pending status,
//! applies the transition, and updates the linked plan in one atomic step,
//! so two concurrent decisions can never both win.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{Result, StateError};
use crate::planner::{ChangePlan, ChangePlanStatus};

use super::types::{ApprovalRequest, ApprovalStatus};

/// A decision to apply to a pending approval request.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// Approve on behalf of the given user.
    Approve {
        /// Who approved.
        approver_id: String,
    },
    /// Reject on behalf of the given user, with a reason.
    Reject {
        /// Who rejected.
        approver_id: String,
        /// Why.
        reason: String,
    },
    /// Expire due to timeout.
    Expire,
}

/// Outcome of attempting to resolve a pending request.
#[derive(Debug, Clone)]
pub enum ResolveOutcome {
    /// No approval request exists for the plan.
    NotFound,
    /// The request already left the pending state.
    AlreadyProcessed {
        /// Id of the request.
        approval_id: String,
        /// Status it already holds.
        status: ApprovalStatus,
    },
    /// An approve or reject arrived after the expiry time; the request
    /// was expired as a side effect.
    Expired {
        /// Id of the request.
        approval_id: String,
    },
    /// The decision was applied.
    Resolved {
        /// The request after the transition.
        request: ApprovalRequest,
        /// The linked plan after the transition, when the store holds it.
        plan: Option<ChangePlan>,
    },
}

/// Trait for approval storage backends.
#[async_trait]
pub trait ApprovalStore: Send + Sync {
    /// Stores a new approval request.
    async fn put_request(&self, request: ApprovalRequest) -> Result<()>;

    /// Stores or replaces a change plan.
    async fn put_plan(&self, plan: ChangePlan) -> Result<()>;

    /// Finds the approval request for a plan, if one exists.
    async fn request_for_plan(&self, plan_id: &str) -> Result<Option<ApprovalRequest>>;

    /// Loads a stored plan.
    async fn plan(&self, plan_id: &str) -> Result<Option<ChangePlan>>;

    /// Lists all requests currently in the pending state.
    async fn pending_requests(&self) -> Result<Vec<ApprovalRequest>>;

    /// Atomically applies a decision to the plan's pending request.
    ///
    /// Status check, request transition, and linked plan update happen
    /// under one critical section.
    async fn resolve_pending(&self, plan_id: &str, resolution: Resolution)
        -> Result<ResolveOutcome>;
}

#[async_trait]
impl ApprovalStore for Box<dyn ApprovalStore> {
    async fn put_request(&self, request: ApprovalRequest) -> Result<()> {
        (**self).put_request(request).await
    }

    async fn put_plan(&self, plan: ChangePlan) -> Result<()> {
        (**self).put_plan(plan).await
    }

    async fn request_for_plan(&self, plan_id: &str) -> Result<Option<ApprovalRequest>> {
        (**self).request_for_plan(plan_id).await
    }

    async fn plan(&self, plan_id: &str) -> Result<Option<ChangePlan>> {
        (**self).plan(plan_id).await
    }

    async fn pending_requests(&self) -> Result<Vec<ApprovalRequest>> {
        (**self).pending_requests().await
    }

    async fn resolve_pending(
        &self,
        plan_id: &str,
        resolution: Resolution,
    ) -> Result<ResolveOutcome> {
        (**self).resolve_pending(plan_id, resolution).await
    }
}

/// In-memory approval store.
#[derive(Debug, Default)]
pub struct MemoryApprovalStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    /// Requests keyed by approval id.
    requests: HashMap<String, ApprovalRequest>,
    /// Plans keyed by plan id.
    plans: HashMap<String, ChangePlan>,
}

impl MemoryApprovalStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn locked(&self) -> Result<std::sync::MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|e| StateError::backend(format!("approval store poisoned: {e}")).into())
    }
}

#[async_trait]
impl ApprovalStore for MemoryApprovalStore {
    async fn put_request(&self, request: ApprovalRequest) -> Result<()> {
        let mut inner = self.locked()?;
        inner.requests.insert(request.id.clone(), request);
        Ok(())
    }

    async fn put_plan(&self, plan: ChangePlan) -> Result<()> {
        let mut inner = self.locked()?;
        inner.plans.insert(plan.id.clone(), plan);
        Ok(())
    }

    async fn request_for_plan(&self, plan_id: &str) -> Result<Option<ApprovalRequest>> {
        let inner = self.locked()?;
        Ok(inner
            .requests
            .values()
            .find(|r| r.change_plan_id == plan_id)
            .cloned())
    }

    async fn plan(&self, plan_id: &str) -> Result<Option<ChangePlan>> {
        let inner = self.locked()?;
        Ok(inner.plans.get(plan_id).cloned())
    }

    async fn pending_requests(&self) -> Result<Vec<ApprovalRequest>> {
        let inner = self.locked()?;
        Ok(inner
            .requests
            .values()
            .filter(|r| r.status == ApprovalStatus::Pending)
            .cloned()
            .collect())
    }

    async fn resolve_pending(
        &self,
        plan_id: &str,
        resolution: Resolution,
    ) -> Result<ResolveOutcome> {
        let mut inner = self.locked()?;
        let now = Utc::now();

        let Some(approval_id) = inner
            .requests
            .values()
            .find(|r| r.change_plan_id == plan_id)
            .map(|r| r.id.clone())
        else {
            return Ok(ResolveOutcome::NotFound);
        };

        let request = inner
            .requests
            .get_mut(&approval_id)
            .ok_or_else(|| StateError::backend("approval request vanished"))?;

        if request.status != ApprovalStatus::Pending {
            return Ok(ResolveOutcome::AlreadyProcessed {
                approval_id,
                status: request.status,
            });
        }

        // A user decision against an expired request expires it instead.
        if !matches!(resolution, Resolution::Expire) && now > request.expires_at {
            request.status = ApprovalStatus::Expired;
            if let Some(plan) = inner.plans.get_mut(plan_id) {
                plan.status = ChangePlanStatus::Rejected;
            }
            return Ok(ResolveOutcome::Expired { approval_id });
        }

        match resolution {
            Resolution::Approve { approver_id } => {
                request.status = ApprovalStatus::Approved;
                request.approver_id = Some(approver_id.clone());
                request.approved_at = Some(now);
                let request = request.clone();

                let plan = inner.plans.get_mut(plan_id).map(|plan| {
                    plan.status = ChangePlanStatus::Approved;
                    plan.approved_by = Some(approver_id);
                    plan.approved_at = Some(now);
                    plan.clone()
                });

                Ok(ResolveOutcome::Resolved { request, plan })
            }
            Resolution::Reject {
                approver_id,
                reason,
            } => {
                request.status = ApprovalStatus::Rejected;
                request.approver_id = Some(approver_id);
                request.rejected_at = Some(now);
                request.rejection_reason = Some(reason);
                let request = request.clone();

                let plan = inner.plans.get_mut(plan_id).map(|plan| {
                    plan.status = ChangePlanStatus::Rejected;
                    plan.clone()
                });

                Ok(ResolveOutcome::Resolved { request, plan })
            }
            Resolution::Expire => {
                request.status = ApprovalStatus::Expired;
                let request = request.clone();

                let plan = inner.plans.get_mut(plan_id).map(|plan| {
                    plan.status = ChangePlanStatus::Rejected;
                    plan.clone()
                });

                Ok(ResolveOutcome::Resolved { request, plan })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::ChangeSummary;
    use chrono::Duration;

    fn make_plan(id: &str) -> ChangePlan {
        ChangePlan {
            id: id.to_string(),
            project_id: String::from("p-1"),
            summary: ChangeSummary::from_changes(&[]),
            changes: Vec::new(),
            created_at: Utc::now(),
            status: ChangePlanStatus::Pending,
            created_by: Some(String::from("alice")),
            approved_by: None,
            approved_at: None,
        }
    }

    fn make_request(plan_id: &str, expires_in_minutes: i64) -> ApprovalRequest {
        let now = Utc::now();
        ApprovalRequest {
            id: format!("req-{plan_id}"),
            change_plan_id: plan_id.to_string(),
            project_id: String::from("p-1"),
            requester_id: String::from("alice"),
            approver_id: None,
            status: ApprovalStatus::Pending,
            created_at: now,
            expires_at: now + Duration::minutes(expires_in_minutes),
            approved_at: None,
            rejected_at: None,
            rejection_reason: None,
            timeout_minutes: 60,
        }
    }

    #[tokio::test]
    async fn test_only_one_decision_wins() {
        let store = MemoryApprovalStore::new();
        store.put_plan(make_plan("plan-1")).await.unwrap();
        store.put_request(make_request("plan-1", 60)).await.unwrap();

        let first = store
            .resolve_pending(
                "plan-1",
                Resolution::Approve {
                    approver_id: String::from("bob"),
                },
            )
            .await
            .unwrap();
        assert!(matches!(first, ResolveOutcome::Resolved { .. }));

        let second = store
            .resolve_pending(
                "plan-1",
                Resolution::Reject {
                    approver_id: String::from("carol"),
                    reason: String::from("too risky"),
                },
            )
            .await
            .unwrap();
        assert!(matches!(
            second,
            ResolveOutcome::AlreadyProcessed {
                status: ApprovalStatus::Approved,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_approve_updates_linked_plan() {
        let store = MemoryApprovalStore::new();
        store.put_plan(make_plan("plan-1")).await.unwrap();
        store.put_request(make_request("plan-1", 60)).await.unwrap();

        let outcome = store
            .resolve_pending(
                "plan-1",
                Resolution::Approve {
                    approver_id: String::from("bob"),
                },
            )
            .await
            .unwrap();

        let ResolveOutcome::Resolved { request, plan } = outcome else {
            panic!("expected resolution");
        };
        assert_eq!(request.status, ApprovalStatus::Approved);
        assert_eq!(request.approver_id.as_deref(), Some("bob"));

        let plan = plan.expect("plan stored");
        assert_eq!(plan.status, ChangePlanStatus::Approved);
        assert_eq!(plan.approved_by.as_deref(), Some("bob"));
        assert!(plan.approved_at.is_some());
    }

    #[tokio::test]
    async fn test_approve_after_expiry_expires_the_request() {
        let store = MemoryApprovalStore::new();
        store.put_plan(make_plan("plan-1")).await.unwrap();
        store.put_request(make_request("plan-1", -5)).await.unwrap();

        let outcome = store
            .resolve_pending(
                "plan-1",
                Resolution::Approve {
                    approver_id: String::from("bob"),
                },
            )
            .await
            .unwrap();
        assert!(matches!(outcome, ResolveOutcome::Expired { .. }));

        let request = store.request_for_plan("plan-1").await.unwrap().unwrap();
        assert_eq!(request.status, ApprovalStatus::Expired);
        let plan = store.plan("plan-1").await.unwrap().unwrap();
        assert_eq!(plan.status, ChangePlanStatus::Rejected);
    }

    #[tokio::test]
    async fn test_reject_after_expiry_expires_the_request() {
        let store = MemoryApprovalStore::new();
        store.put_plan(make_plan("plan-1")).await.unwrap();
        store
            .put_request(make_request("plan-1", -30))
            .await
            .unwrap();

        let outcome = store
            .resolve_pending(
                "plan-1",
                Resolution::Reject {
                    approver_id: String::from("bob"),
                    reason: String::from("stale"),
                },
            )
            .await
            .unwrap();
        assert!(matches!(outcome, ResolveOutcome::Expired { .. }));

        let request = store.request_for_plan("plan-1").await.unwrap().unwrap();
        assert_eq!(request.status, ApprovalStatus::Expired);
        let plan = store.plan("plan-1").await.unwrap().unwrap();
        assert_eq!(plan.status, ChangePlanStatus::Rejected);
    }

    #[tokio::test]
    async fn test_resolve_unknown_plan_is_not_found() {
        let store = MemoryApprovalStore::new();
        let outcome = store
            .resolve_pending("missing", Resolution::Expire)
            .await
            .unwrap();
        assert!(matches!(outcome, ResolveOutcome::NotFound));
    }
}
