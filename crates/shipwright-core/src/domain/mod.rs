//! Domain model for Shipwright.

pub mod error;
pub mod identity;
pub mod pull_request;
pub mod run;
pub mod stage;

pub use error::{Result, ShipwrightError};
pub use identity::{DeploymentIdentity, DEPLOY_BRANCH_PREFIX};
pub use pull_request::{MergeMethod, MergeOptions, PrListState, PrState, PullRequest};
pub use run::{RunConclusion, RunStatus, WorkflowRun};
pub use stage::{Outcome, PipelineStage};
