//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Stackweaver - infrastructure change plan orchestrator.
#[derive(Parser, Debug)]
#[command(name = "stackweaver")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the settings file.
    #[arg(short, long, global = true, env = "STACKWEAVER_CONFIG")]
    pub config: Option<PathBuf>,

    /// User acting on plans and approvals.
    #[arg(short, long, global = true, env = "STACKWEAVER_USER")]
    pub user: Option<String>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate a desired-state document against the current state.
    Validate {
        /// Desired-state YAML file.
        file: PathBuf,
    },

    /// Generate and display the change plan for a desired-state document.
    Plan {
        /// Desired-state YAML file.
        file: PathBuf,

        /// Include the cost estimate breakdown.
        #[arg(long)]
        costs: bool,
    },

    /// Generate a plan, submit it for approval, and execute it once
    /// approved.
    Apply {
        /// Desired-state YAML file.
        file: PathBuf,

        /// Continue executing after a failed change.
        #[arg(long)]
        continue_on_error: bool,
    },

    /// Approve a pending change plan.
    Approve {
        /// Plan id to approve.
        plan_id: String,
    },

    /// Reject a pending change plan.
    Reject {
        /// Plan id to reject.
        plan_id: String,

        /// Reason for the rejection.
        #[arg(short, long)]
        reason: String,
    },

    /// List plans awaiting your approval.
    Approvals,

    /// Check provisioning backend health.
    Health,
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}
