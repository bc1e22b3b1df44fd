//! Change planning.
//!
//! This module turns a desired infrastructure state into an ordered,
//! risk-scored, cost-estimated change plan: diffing against current state,
//! resolving dependencies, sorting, and validating.

mod cost;
mod deps;
mod diff;
mod engine;
mod graph;
mod risk;
mod types;
mod validate;

pub use cost::CostEstimator;
pub use deps::{DependencyResolver, ReferenceMatcher};
pub use diff::StateDiffer;
pub use engine::ChangePlanEngine;
pub use graph::{build_graph, detect_cycles, sort_changes, topological_sort};
pub use risk::RiskAssessor;
pub use types::{
    Change, ChangeAction, ChangePlan, ChangePlanStatus, ChangeSummary, CostEstimate,
    DependencyGraph, RiskLevel, ValidationResult,
};
pub use validate::PlanValidator;
