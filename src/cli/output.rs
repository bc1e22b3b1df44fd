//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying plans,
//! validation results, and execution reports to the user.

use colored::Colorize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::orchestrator::ExecutionReport;
use crate::planner::{ChangeAction, ChangePlan, CostEstimate, RiskLevel, ValidationResult};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Change row for table display.
#[derive(Tabled)]
struct ChangeRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Type")]
    resource_type: String,
    #[tabled(rename = "Resource")]
    resource_id: String,
    #[tabled(rename = "Risk")]
    risk: String,
}

/// Execution outcome row for table display.
#[derive(Tabled)]
struct OutcomeRow {
    #[tabled(rename = "Resource")]
    resource_id: String,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Result")]
    result: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a change plan for display.
    #[must_use]
    pub fn format_plan(&self, plan: &ChangePlan, cost: Option<&CostEstimate>) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(plan).unwrap_or_default(),
            OutputFormat::Text => Self::format_plan_text(plan, cost),
        }
    }

    fn format_plan_text(plan: &ChangePlan, cost: Option<&CostEstimate>) -> String {
        if plan.is_empty() {
            return format!(
                "{} No changes required - infrastructure matches the desired state.\n",
                "✓".green()
            );
        }

        let mut output = String::new();
        let _ = writeln!(output, "\nChange plan {} for project {}", plan.id, plan.project_id);

        let rows: Vec<ChangeRow> = plan
            .changes
            .iter()
            .enumerate()
            .map(|(i, c)| ChangeRow {
                index: i + 1,
                action: Self::format_action(c.action),
                resource_type: c.resource_type.clone(),
                resource_id: c.resource_id.clone(),
                risk: Self::format_risk(c.risk_level),
            })
            .collect();
        output.push_str(&Table::new(rows).to_string());
        output.push('\n');

        let _ = writeln!(
            output,
            "\nPlan: {} to create, {} to update, {} to delete",
            plan.summary.creates.to_string().green(),
            plan.summary.updates.to_string().yellow(),
            plan.summary.deletes.to_string().red()
        );

        if let Some(cost) = cost {
            let _ = writeln!(
                output,
                "Estimated monthly cost: {}",
                format!("${:.2} {}", cost.total_monthly_cost, cost.currency).bold()
            );
            for (key, value) in &cost.cost_breakdown {
                let _ = writeln!(output, "  {key}: ${value:.2}");
            }
        }

        output
    }

    /// Formats a validation result for display.
    #[must_use]
    pub fn format_validation(&self, result: &ValidationResult) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(result).unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = String::new();

                if result.is_valid {
                    let _ = writeln!(output, "{} Plan is valid.", "✓".green());
                } else {
                    let _ = writeln!(output, "{} Plan is invalid.", "✗".red());
                }
                for error in &result.errors {
                    let _ = writeln!(output, "  {} {error}", "error:".red());
                }
                for warning in &result.warnings {
                    let _ = writeln!(output, "  {} {warning}", "warning:".yellow());
                }

                output
            }
        }
    }

    /// Formats an execution report for display.
    #[must_use]
    pub fn format_execution(&self, report: &ExecutionReport) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(report).unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = String::new();

                let rows: Vec<OutcomeRow> = report
                    .outcomes
                    .iter()
                    .map(|o| OutcomeRow {
                        resource_id: o.resource_id.clone(),
                        action: o.action.to_string(),
                        result: if o.success {
                            "applied".green().to_string()
                        } else {
                            format!(
                                "{}: {}",
                                "failed".red(),
                                o.error.as_deref().unwrap_or("unknown")
                            )
                        },
                    })
                    .collect();
                output.push_str(&Table::new(rows).to_string());
                output.push('\n');

                if report.is_complete() {
                    let _ = writeln!(
                        output,
                        "\n{} Plan {} executed: {} changes applied.",
                        "✓".green(),
                        report.plan_id,
                        report.succeeded
                    );
                } else {
                    let _ = writeln!(
                        output,
                        "\n{} Plan {} partially executed: {} applied, {} failed.",
                        "✗".red(),
                        report.plan_id,
                        report.succeeded,
                        report.failed
                    );
                }

                output
            }
        }
    }

    /// Formats the pending-approvals listing.
    #[must_use]
    pub fn format_pending(&self, plans: &[ChangePlan]) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(plans).unwrap_or_default(),
            OutputFormat::Text => {
                if plans.is_empty() {
                    return String::from("No plans awaiting your approval.\n");
                }

                let mut output = String::new();
                for plan in plans {
                    let _ = writeln!(
                        output,
                        "{}  project {}  {} changes  max risk {}",
                        plan.id.bold(),
                        plan.project_id,
                        plan.summary.total_changes,
                        plan.max_risk()
                            .map_or_else(|| String::from("-"), |r| Self::format_risk(r)),
                    );
                }
                output
            }
        }
    }

    fn format_action(action: ChangeAction) -> String {
        match action {
            ChangeAction::Create => "create".green().to_string(),
            ChangeAction::Update => "update".yellow().to_string(),
            ChangeAction::Delete => "delete".red().to_string(),
        }
    }

    fn format_risk(risk: RiskLevel) -> String {
        match risk {
            RiskLevel::Low => "low".green().to_string(),
            RiskLevel::Medium => "medium".yellow().to_string(),
            RiskLevel::High => "high".red().to_string(),
        }
    }
}
