//! Remote CI backend trait.
//!
//! Defines the `CiBackend` async trait through which the orchestration core
//! reaches the remote CI system. Everything in this crate talks to the
//! remote only through this seam.

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::domain::{MergeOptions, PrListState, PullRequest, Result, WorkflowRun};

/// Trait for remote CI backends (GitHub CLI, in-memory fakes, etc.).
#[async_trait]
pub trait CiBackend: Send + Sync {
    /// Start a workflow on `git_ref` with the given dispatch inputs.
    async fn trigger(
        &self,
        workflow: &str,
        git_ref: &str,
        inputs: &BTreeMap<String, String>,
    ) -> Result<()>;

    /// Most recent runs of `workflow`, newest first.
    async fn list_runs(&self, workflow: &str, limit: usize) -> Result<Vec<WorkflowRun>>;

    /// Current record of a single run.
    async fn get_run(&self, run_id: u64) -> Result<WorkflowRun>;

    /// Run logs. With `failed_only`, implementations fall back to full logs
    /// when failed-only retrieval errors.
    async fn get_logs(&self, run_id: u64, failed_only: bool) -> Result<String>;

    /// Pull requests in `state`, optionally restricted to one head branch.
    async fn list_prs(&self, state: PrListState, head: Option<&str>) -> Result<Vec<PullRequest>>;

    async fn get_pr(&self, number: u64) -> Result<PullRequest>;

    async fn merge_pr(&self, number: u64, options: MergeOptions) -> Result<()>;
}
