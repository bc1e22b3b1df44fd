//! Stackweaver CLI entrypoint.
//!
//! This is the main entrypoint for the stackweaver command-line tool.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use stackweaver::approval::{ApprovalWorkflow, MemoryApprovalStore};
use stackweaver::cli::{Cli, Commands, OutputFormatter};
use stackweaver::config::{load_desired_state, Settings};
use stackweaver::error::Result;
use stackweaver::orchestrator::Orchestrator;
use stackweaver::planner::ChangePlanStatus;
use stackweaver::remote::ProvisioningClient;
use stackweaver::state::{MemoryStateStore, StateStore};

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Settings file looked up when none is given.
const DEFAULT_SETTINGS_FILE: &str = "stackweaver.yaml";

/// Prefix on approval ids issued by the auto-approval path.
const AUTO_APPROVED_PREFIX: &str = "auto-approved-";

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    // Load .env if present
    dotenvy::dotenv().ok();

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);

    let settings = load_settings(cli.config.as_ref())?;
    let user = cli
        .user
        .or_else(|| settings.project.default_user.clone())
        .unwrap_or_else(|| String::from("operator"));
    let orchestrator = build_orchestrator(&settings)?;

    match cli.command {
        Commands::Validate { file } => cmd_validate(&orchestrator, &file, &user, &formatter).await,
        Commands::Plan { file, costs } => {
            cmd_plan(&orchestrator, &file, &user, costs, &formatter).await
        }
        Commands::Apply {
            file,
            continue_on_error,
        } => cmd_apply(&orchestrator, &file, &user, continue_on_error, &formatter).await,
        Commands::Approve { plan_id } => {
            let plan = orchestrator.approve_plan(&plan_id, &user).await?;
            eprintln!("Plan {} approved by {user}.", plan.id);
            Ok(())
        }
        Commands::Reject { plan_id, reason } => {
            let plan = orchestrator.reject_plan(&plan_id, &user, &reason).await?;
            eprintln!("Plan {} rejected by {user}: {reason}", plan.id);
            Ok(())
        }
        Commands::Approvals => {
            let plans = orchestrator.pending_approvals(&user).await?;
            eprintln!("{}", formatter.format_pending(&plans));
            Ok(())
        }
        Commands::Health => cmd_health(&orchestrator).await,
    }
}

/// Validate a desired-state document against the current state.
async fn cmd_validate(
    orchestrator: &Orchestrator,
    file: &Path,
    user: &str,
    formatter: &OutputFormatter,
) -> Result<()> {
    let desired = load_desired_state(file, user)?;
    let plan = orchestrator.generate_plan(&desired, user).await?;
    let result = orchestrator.validate_plan(&plan);

    eprintln!("{}", formatter.format_validation(&result));
    Ok(())
}

/// Show the change plan for a desired-state document.
async fn cmd_plan(
    orchestrator: &Orchestrator,
    file: &Path,
    user: &str,
    costs: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let desired = load_desired_state(file, user)?;
    let plan = orchestrator.generate_plan(&desired, user).await?;
    let cost = costs.then(|| orchestrator.estimate_cost(&plan));

    eprintln!("{}", formatter.format_plan(&plan, cost.as_ref()));
    Ok(())
}

/// Generate a plan, submit it for approval, and execute it when
/// auto-approved.
async fn cmd_apply(
    orchestrator: &Orchestrator,
    file: &Path,
    user: &str,
    continue_on_error: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let desired = load_desired_state(file, user)?;
    let mut plan = orchestrator.generate_plan(&desired, user).await?;

    if plan.is_empty() {
        eprintln!("No changes to apply.");
        return Ok(());
    }

    let validation = orchestrator.validate_plan(&plan);
    if !validation.is_valid {
        eprintln!("{}", formatter.format_validation(&validation));
        return Err(stackweaver::error::PlanError::validation(
            "change plan failed validation",
        )
        .into());
    }

    eprintln!("{}", formatter.format_plan(&plan, None));

    let approval_id = orchestrator.submit_for_approval(plan.clone()).await?;
    if approval_id.starts_with(AUTO_APPROVED_PREFIX) {
        info!("Plan {} auto-approved, executing", plan.id);
        plan.status = ChangePlanStatus::Approved;

        let report = orchestrator.execute_plan(&plan, continue_on_error).await?;
        eprintln!("{}", formatter.format_execution(&report));
    } else {
        eprintln!(
            "Plan {} submitted for approval (request {approval_id}).",
            plan.id
        );
        eprintln!("An approver can run 'stackweaver approve {}'.", plan.id);
    }

    Ok(())
}

/// Check backend health.
async fn cmd_health(orchestrator: &Orchestrator) -> Result<()> {
    if orchestrator.backend_healthy().await {
        eprintln!("Backend is healthy.");
        Ok(())
    } else {
        Err(stackweaver::error::RemoteError::connection(
            "Backend health check failed",
        )
        .into())
    }
}

/// Loads settings from the given path or the default location.
fn load_settings(config_path: Option<&PathBuf>) -> Result<Settings> {
    let path = config_path.map_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE), Clone::clone);
    Settings::load(path)
}

/// Builds the project orchestrator from settings.
fn build_orchestrator(settings: &Settings) -> Result<Orchestrator> {
    let client = ProvisioningClient::with_config(
        &settings.remote.endpoint,
        settings.remote.timeout_secs,
        settings.remote.breaker_config(),
        settings.remote.retry_config(),
    )?;

    let store: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
    let workflow = ApprovalWorkflow::new(
        settings.approval.workflow_config(),
        Arc::new(MemoryApprovalStore::new()),
    );

    Ok(Orchestrator::new(
        &settings.project.id,
        client,
        store,
        workflow,
    ))
}
