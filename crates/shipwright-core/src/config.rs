//! Driver configuration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::MergeOptions;

/// Attempt budget for finding a just-triggered run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatePolicy {
    /// Hard ceiling on listing queries. Zero is treated as one.
    pub max_attempts: u32,

    /// Fixed wait between attempts. No backoff, no jitter.
    pub interval: Duration,

    /// Runs created before this instant belong to earlier triggers and are
    /// treated as absent.
    pub not_before: Option<DateTime<Utc>>,
}

impl LocatePolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
            not_before: None,
        }
    }

    pub fn with_not_before(mut self, not_before: DateTime<Utc>) -> Self {
        self.not_before = Some(not_before);
        self
    }

    pub(crate) fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

impl Default for LocatePolicy {
    fn default() -> Self {
        Self::new(10, Duration::from_secs(3))
    }
}

/// Everything the pipeline driver needs besides its collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Workflow file or name that generates a plan and opens a PR.
    pub plan_workflow: String,

    /// Workflow that applies a deployment after the PR merges.
    pub deploy_workflow: String,

    /// Git ref the plan workflow is dispatched on.
    pub git_ref: String,

    pub locate: LocatePolicy,

    /// Fixed interval between watch polls.
    pub poll_interval: Duration,

    /// Upper bound on a single watch. `None` waits until terminal.
    pub watch_deadline: Option<Duration>,

    /// Allowance for clock skew between this host and the remote when
    /// deciding whether a listed run predates the trigger.
    pub trigger_skew: Duration,

    /// Skip the merge confirmation prompt.
    pub auto_approve: bool,

    pub merge: MergeOptions,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            plan_workflow: "plan.yml".to_string(),
            deploy_workflow: "deploy.yml".to_string(),
            git_ref: "main".to_string(),
            locate: LocatePolicy::default(),
            poll_interval: Duration::from_secs(5),
            watch_deadline: None,
            trigger_skew: Duration::from_secs(10),
            auto_approve: false,
            merge: MergeOptions::default(),
        }
    }
}
