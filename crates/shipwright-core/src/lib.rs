//! Shipwright Core
//!
//! Orchestrates an infrastructure deployment lifecycle through a remote CI
//! system: trigger a plan workflow, wait for it, merge the pull request it
//! opened, and watch the deployment the merge sets off.
//!
//! The remote is reached only through [`CiBackend`]; see the
//! `shipwright-gh` crate for the GitHub CLI implementation and [`fakes`] for
//! the in-memory one used in tests.

pub mod backend;
pub mod cancel;
pub mod config;
pub mod domain;
pub mod driver;
pub mod fakes;
pub mod locator;
pub mod obs;
pub mod plan;
pub mod pr;
pub mod report;
pub mod telemetry;
pub mod watcher;

pub use backend::CiBackend;
pub use cancel::{sleep_or_cancel, CancelHandle, CancelSignal};
pub use config::{DriverConfig, LocatePolicy};
pub use domain::{
    DeploymentIdentity, MergeMethod, MergeOptions, Outcome, PipelineStage, PrListState, PrState,
    PullRequest, Result, RunConclusion, RunStatus, ShipwrightError, WorkflowRun,
    DEPLOY_BRANCH_PREFIX,
};
pub use driver::{DeployOutcome, PipelineDriver, PipelineOutcome, PipelineReport};
pub use locator::RunLocator;
pub use obs::PipelineSpan;
pub use plan::{
    discover_applications, read_manifest, write_plan, write_plans, PlanManifest, PlanStep,
    RecipeKind,
};
pub use pr::{Confirmer, PrLifecycleManager};
pub use report::{pulls_url_for_run, tail_chars, FailureReport, Reporter, LOG_TAIL_CHARS};
pub use telemetry::{init_tracing, LogFormat};
pub use watcher::WorkflowWatcher;

/// Shipwright version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
