//! Change plan approval.
//!
//! Approval requests, the storage seam they live behind, and the workflow
//! that drives submissions, decisions, and timeouts.

mod store;
mod types;
mod workflow;

pub use store::{ApprovalStore, MemoryApprovalStore, Resolution, ResolveOutcome};
pub use types::{ApprovalRequest, ApprovalRule, ApprovalStatus, ApprovalWorkflowConfig};
pub use workflow::ApprovalWorkflow;
