// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Stackweaver
//!
//! A change-plan orchestrator for declarative cloud infrastructure.
//!
//! ## Overview
//!
//! Stackweaver converges a project's infrastructure onto a desired state
//! described in YAML, with an approval gate between planning and execution:
//!
//! - Diff the desired state against the recorded state to produce a change
//!   plan with per-change risk levels, dependency ordering, and a monthly
//!   cost estimate
//! - Route plans through an approval workflow with timeouts and optional
//!   rule-based auto-approval
//! - Execute approved plans against the provisioning backend through a
//!   resilient JSON-RPC client (retries with exponential backoff plus a
//!   circuit breaker)
//!
//! ## Architecture
//!
//! Planning and execution are separated by the approval gate:
//!
//! 1. **Plan**: desired state vs. recorded state produces ordered changes
//! 2. **Approve**: a human (or an auto-approval rule) signs off on the plan
//! 3. **Execute**: approved changes are applied and a fresh state snapshot
//!    is recorded
//!
//! ## Modules
//!
//! - [`config`]: Settings and desired-state document loading
//! - [`state`]: State snapshots and storage backends
//! - [`remote`]: Resilient provisioning backend client
//! - [`planner`]: Diffing, dependencies, risk, cost, and validation
//! - [`approval`]: Approval workflow with timeouts and auto-approval
//! - [`orchestrator`]: Project-scoped facade tying the pieces together
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! project_id: payments
//! resources:
//!   - id: vpc-1
//!     type: VPC::VPC
//!     name: main
//!     properties:
//!       cidrBlock: "10.0.0.0/16"
//!   - id: web-1
//!     type: EC2::Instance
//!     name: web
//!     properties:
//!       instanceType: t3.small
//!       imageId: ami-12345678
//!       vpcId: vpc-1
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod approval;
pub mod cli;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod planner;
pub mod remote;
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use approval::{ApprovalRule, ApprovalWorkflow, ApprovalWorkflowConfig, MemoryApprovalStore};
pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{load_desired_state, DesiredStateDoc, Settings};
pub use error::{Result, StackweaverError};
pub use orchestrator::{ExecutionReport, Orchestrator};
pub use planner::{
    Change, ChangeAction, ChangePlan, ChangePlanEngine, ChangePlanStatus, CostEstimate, RiskLevel,
    ValidationResult,
};
pub use remote::{CircuitBreaker, CircuitBreakerConfig, ProvisioningClient, RetryConfig};
pub use state::{InfrastructureState, MemoryStateStore, Resource, StateStore};
