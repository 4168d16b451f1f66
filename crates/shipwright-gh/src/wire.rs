//! JSON shapes emitted by `gh ... --json` and their mapping onto the domain.
//!
//! Status, conclusion, and PR state strings arrive in whatever case `gh`
//! chooses (`completed`, `OPEN`); the domain conversions normalise them.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use shipwright_core::{PrState, PullRequest, RunConclusion, RunStatus, WorkflowRun};

use crate::error::Result;

/// Fields requested for workflow runs.
pub const RUN_FIELDS: &str = "databaseId,status,conclusion,url,headBranch,event,createdAt";

/// Fields requested for pull requests.
pub const PR_FIELDS: &str = "number,url,title,state,headRefName,baseRefName,createdAt";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GhRun {
    pub database_id: u64,
    pub status: String,
    /// Empty while the run is still going.
    #[serde(default)]
    pub conclusion: Option<String>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub head_branch: String,
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl From<GhRun> for WorkflowRun {
    fn from(run: GhRun) -> Self {
        WorkflowRun {
            id: run.database_id,
            status: RunStatus::from(run.status),
            conclusion: run
                .conclusion
                .as_deref()
                .and_then(RunConclusion::parse_optional),
            url: run.url,
            head_branch: run.head_branch,
            event: run.event,
            created_at: run.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GhPullRequest {
    pub number: u64,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
    pub state: String,
    #[serde(default)]
    pub head_ref_name: String,
    #[serde(default)]
    pub base_ref_name: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl From<GhPullRequest> for PullRequest {
    fn from(pr: GhPullRequest) -> Self {
        PullRequest {
            number: pr.number,
            url: pr.url,
            title: pr.title,
            state: PrState::from(pr.state),
            head_ref_name: pr.head_ref_name,
            base_ref_name: pr.base_ref_name,
            created_at: pr.created_at,
        }
    }
}

pub fn decode_runs(json: &str) -> Result<Vec<WorkflowRun>> {
    let runs: Vec<GhRun> = serde_json::from_str(json)?;
    Ok(runs.into_iter().map(WorkflowRun::from).collect())
}

pub fn decode_run(json: &str) -> Result<WorkflowRun> {
    let run: GhRun = serde_json::from_str(json)?;
    Ok(run.into())
}

pub fn decode_pull_requests(json: &str) -> Result<Vec<PullRequest>> {
    let prs: Vec<GhPullRequest> = serde_json::from_str(json)?;
    Ok(prs.into_iter().map(PullRequest::from).collect())
}

pub fn decode_pull_request(json: &str) -> Result<PullRequest> {
    let pr: GhPullRequest = serde_json::from_str(json)?;
    Ok(pr.into())
}
