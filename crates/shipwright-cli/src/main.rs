//! Shipwright - deployment lifecycle through GitHub Actions
//!
//! The `shipwright` command drives a plan -> pull request -> merge -> deploy
//! pipeline from the terminal.
//!
//! ## Commands
//!
//! - `plan-create`: write plan manifests for one or more applications
//! - `pr-create`: run the plan workflow, which opens a deployment PR
//! - `pr-merge`: merge a deployment PR and watch the deploy it triggers

mod console;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use shipwright_core::{
    discover_applications, init_tracing, write_plans, CancelHandle, DeploymentIdentity,
    DriverConfig, LocatePolicy, LogFormat, MergeMethod, MergeOptions, PipelineDriver,
    PipelineSpan, RecipeKind, ShipwrightError,
};
use shipwright_gh::GhBackend;
use tracing::{info, warn, Level};

use crate::console::{ConsoleReporter, StdinConfirmer};

#[derive(Parser, Debug)]
#[command(name = "shipwright")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Plan, merge and deploy infrastructure through GitHub Actions", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Repository as owner/name (default: the current directory's)
    #[arg(long, global = true, env = "SHIPWRIGHT_REPO")]
    repo: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write plan manifests, one per application
    PlanCreate {
        /// Application to plan (repeatable)
        #[arg(short, long = "app", required = true)]
        applications: Vec<String>,

        /// Target environment
        #[arg(short, long = "env")]
        environment: String,

        /// Root directory for plans
        #[arg(long, env = "SHIPWRIGHT_PLAN_DIR", default_value = "plans")]
        plan_dir: PathBuf,

        /// Artifact flavour for each step
        #[arg(long, value_enum, default_value_t = RecipeArg::Terraform)]
        recipe: RecipeArg,
    },

    /// Trigger the plan workflow and wait for it to open a deployment PR
    PrCreate {
        /// Application to deploy (default: the only one under --plan-dir)
        #[arg(short, long = "app")]
        application: Option<String>,

        /// Target environment
        #[arg(short, long = "env")]
        environment: String,

        /// Root directory searched when --app is omitted
        #[arg(long, env = "SHIPWRIGHT_PLAN_DIR", default_value = "plans")]
        plan_dir: PathBuf,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },

    /// Merge a deployment PR and watch the deployment
    PrMerge {
        /// PR number (default: the newest open deployment PR)
        number: Option<u64>,

        /// Only consider deployment PRs for this application
        #[arg(short, long = "app", requires = "environment")]
        application: Option<String>,

        /// Environment of --app
        #[arg(short, long = "env", requires = "application")]
        environment: Option<String>,

        /// Merge without asking
        #[arg(short, long)]
        yes: bool,

        /// How to merge the PR
        #[arg(long, value_enum, default_value_t = MethodArg::Squash)]
        method: MethodArg,

        /// Keep the deployment branch after merging
        #[arg(long)]
        keep_branch: bool,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },
}

/// Workflow and polling settings shared by the remote commands.
#[derive(Args, Debug)]
struct PipelineArgs {
    /// Workflow that builds the plan and opens the PR
    #[arg(long, env = "SHIPWRIGHT_PLAN_WORKFLOW", default_value = "plan.yml")]
    plan_workflow: String,

    /// Workflow the merge sets off
    #[arg(long, env = "SHIPWRIGHT_DEPLOY_WORKFLOW", default_value = "deploy.yml")]
    deploy_workflow: String,

    /// Git ref the plan workflow runs on
    #[arg(long = "ref", env = "SHIPWRIGHT_REF", default_value = "main")]
    git_ref: String,

    /// Listing queries before giving up on finding a run
    #[arg(long, default_value_t = 10)]
    locate_attempts: u32,

    /// Seconds between listing queries
    #[arg(long, default_value_t = 3)]
    locate_interval: u64,

    /// Seconds between status polls while watching a run
    #[arg(long, default_value_t = 5)]
    poll_interval: u64,

    /// Give up watching a single run after this many seconds
    #[arg(long)]
    watch_timeout: Option<u64>,

    /// Abort the whole command after this many seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Seconds a listed run may predate the trigger and still count as ours
    #[arg(long, default_value_t = 10)]
    trigger_skew: u64,
}

impl PipelineArgs {
    fn driver_config(&self) -> DriverConfig {
        DriverConfig {
            plan_workflow: self.plan_workflow.clone(),
            deploy_workflow: self.deploy_workflow.clone(),
            git_ref: self.git_ref.clone(),
            locate: LocatePolicy::new(
                self.locate_attempts,
                Duration::from_secs(self.locate_interval),
            ),
            poll_interval: Duration::from_secs(self.poll_interval),
            watch_deadline: self.watch_timeout.map(Duration::from_secs),
            trigger_skew: Duration::from_secs(self.trigger_skew),
            ..DriverConfig::default()
        }
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_secs)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum RecipeArg {
    Terraform,
    Bicep,
}

impl From<RecipeArg> for RecipeKind {
    fn from(arg: RecipeArg) -> Self {
        match arg {
            RecipeArg::Terraform => RecipeKind::Terraform,
            RecipeArg::Bicep => RecipeKind::Bicep,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum MethodArg {
    Squash,
    Merge,
    Rebase,
}

impl From<MethodArg> for MergeMethod {
    fn from(arg: MethodArg) -> Self {
        match arg {
            MethodArg::Squash => MergeMethod::Squash,
            MethodArg::Merge => MergeMethod::Merge,
            MethodArg::Rebase => MergeMethod::Rebase,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    let format = if cli.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Text
    };
    init_tracing(format, level);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;
    let result = runtime.block_on(run(cli));
    // A confirmation prompt may still be blocked reading stdin; do not wait on it.
    runtime.shutdown_background();
    result
}

async fn run(cli: Cli) -> Result<()> {
    let animate = !cli.json_logs && std::io::stdout().is_terminal();

    match cli.command {
        Commands::PlanCreate {
            applications,
            environment,
            plan_dir,
            recipe,
        } => cmd_plan_create(&applications, &environment, &plan_dir, recipe.into()),
        Commands::PrCreate {
            application,
            environment,
            plan_dir,
            pipeline,
        } => {
            let _span = PipelineSpan::enter("pr-create");
            let cancel = CancelHandle::new();
            listen_for_interrupts(cancel.clone());
            let driver = build_driver(cli.repo, pipeline.driver_config(), animate, &cancel);
            with_timeout(
                pipeline.timeout(),
                &cancel,
                cmd_pr_create(driver, application.as_deref(), &environment, &plan_dir),
            )
            .await
        }
        Commands::PrMerge {
            number,
            application,
            environment,
            yes,
            method,
            keep_branch,
            pipeline,
        } => {
            let _span = PipelineSpan::enter("pr-merge");
            let identity = match (application, environment) {
                (Some(app), Some(env)) => Some(DeploymentIdentity::new(app, env)?),
                _ => None,
            };
            let config = DriverConfig {
                auto_approve: yes || !std::io::stdin().is_terminal(),
                merge: MergeOptions {
                    method: method.into(),
                    delete_branch: !keep_branch,
                },
                ..pipeline.driver_config()
            };
            let cancel = CancelHandle::new();
            listen_for_interrupts(cancel.clone());
            let driver = build_driver(cli.repo, config, animate, &cancel);
            with_timeout(
                pipeline.timeout(),
                &cancel,
                cmd_pr_merge(driver, number, identity.as_ref()),
            )
            .await
        }
    }
}

/// First Ctrl-C cancels the pipeline; a second one exits immediately.
fn listen_for_interrupts(cancel: CancelHandle) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("interrupted, stopping");
        cancel.cancel();
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted again, exiting");
            std::process::exit(130);
        }
    });
}

fn build_driver(
    repo: Option<String>,
    config: DriverConfig,
    animate: bool,
    cancel: &CancelHandle,
) -> PipelineDriver {
    PipelineDriver::new(
        Arc::new(GhBackend::for_repo(repo)),
        Arc::new(ConsoleReporter::new(animate)),
        Arc::new(StdinConfirmer),
        config,
    )
    .with_cancel(cancel.signal())
}

/// Run `command` under an overall deadline. Expiry trips `cancel` so the
/// driver's waits and any pending prompt stop along with the command.
async fn with_timeout<F>(limit: Option<Duration>, cancel: &CancelHandle, command: F) -> Result<()>
where
    F: std::future::Future<Output = Result<()>>,
{
    let Some(limit) = limit else {
        return command.await;
    };
    tokio::select! {
        result = command => result,
        _ = tokio::time::sleep(limit) => {
            warn!(timeout_secs = limit.as_secs(), "deadline reached, stopping");
            cancel.cancel();
            Err(ShipwrightError::Timeout(limit).into())
        }
    }
}

fn cmd_plan_create(
    applications: &[String],
    environment: &str,
    plan_dir: &std::path::Path,
    recipe: RecipeKind,
) -> Result<()> {
    let written = write_plans(plan_dir, applications, environment, recipe)
        .with_context(|| format!("Failed to write plans under {}", plan_dir.display()))?;

    for (identity, manifest) in &written {
        println!(
            "Wrote plan for {} ({} step{})",
            identity,
            manifest.steps.len(),
            if manifest.steps.len() == 1 { "" } else { "s" }
        );
        for step in &manifest.steps {
            println!(
                "  {:02}. {} [{}] -> {}",
                step.order, step.resource_name, step.resource_type, step.artifact_directory
            );
        }
    }
    info!(event = "plan.create_done", plans = written.len());
    Ok(())
}

async fn cmd_pr_create(
    driver: PipelineDriver,
    application: Option<&str>,
    environment: &str,
    plan_dir: &std::path::Path,
) -> Result<()> {
    let available = if application.is_some() {
        Vec::new()
    } else {
        discover_applications(plan_dir)
            .with_context(|| format!("Failed to read {}", plan_dir.display()))?
    };
    let identity = driver.select_identity(application, &available, environment)?;

    let report = driver
        .plan(&identity)
        .await
        .with_context(|| format!("Plan for {identity} did not succeed"))?;
    info!(event = "pipeline.done", outcome = ?report.outcome, stages = report.stages.len());
    Ok(())
}

async fn cmd_pr_merge(
    driver: PipelineDriver,
    number: Option<u64>,
    identity: Option<&DeploymentIdentity>,
) -> Result<()> {
    let report = driver.merge(number, identity).await.with_context(|| match number {
        Some(n) => format!("Merging pull request #{n} did not complete"),
        None => "Merging the latest deployment pull request did not complete".to_string(),
    })?;
    info!(event = "pipeline.done", outcome = ?report.outcome, stages = report.stages.len());
    Ok(())
}
