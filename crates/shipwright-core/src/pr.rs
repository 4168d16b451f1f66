//! Deployment pull request discovery, confirmation and merge.

use std::cmp::Ordering;

use async_trait::async_trait;

use crate::backend::CiBackend;
use crate::domain::{
    DeploymentIdentity, MergeOptions, PrListState, PullRequest, Result, ShipwrightError,
    DEPLOY_BRANCH_PREFIX,
};
use crate::obs;

/// Interactive merge confirmation.
#[async_trait]
pub trait Confirmer: Send + Sync {
    /// `Ok(true)` to proceed with merging `pr`.
    async fn confirm(&self, pr: &PullRequest) -> Result<bool>;
}

pub struct PrLifecycleManager<'a> {
    backend: &'a dyn CiBackend,
}

impl<'a> PrLifecycleManager<'a> {
    pub fn new(backend: &'a dyn CiBackend) -> Self {
        Self { backend }
    }

    /// Newest open pull request whose head is a deployment branch.
    ///
    /// With an identity, only that identity's branches qualify. Candidates
    /// are ordered by creation time, newest first; records without a
    /// timestamp keep the remote's order after the dated ones.
    pub async fn find_latest_deployment_pr(
        &self,
        identity: Option<&DeploymentIdentity>,
    ) -> Result<Option<PullRequest>> {
        let prefix = identity
            .map(DeploymentIdentity::branch_prefix)
            .unwrap_or_else(|| DEPLOY_BRANCH_PREFIX.to_string());

        let mut candidates: Vec<PullRequest> = self
            .backend
            .list_prs(PrListState::Open, None)
            .await?
            .into_iter()
            .filter(|pr| pr.head_ref_name.starts_with(&prefix))
            .collect();

        candidates.sort_by(newest_first);

        let count = candidates.len();
        let latest = candidates.into_iter().next();
        if let Some(pr) = &latest {
            obs::emit_pr_selected(pr.number, &pr.head_ref_name, count);
        }
        Ok(latest)
    }

    /// Fetch `number` and merge it if it is still open.
    pub async fn merge(&self, number: u64, options: MergeOptions) -> Result<PullRequest> {
        let pr = self.backend.get_pr(number).await?;
        self.merge_checked(&pr, options).await?;
        Ok(pr)
    }

    /// Merge an already fetched record, refusing anything not open. No merge
    /// call reaches the backend for a closed or merged PR.
    pub async fn merge_checked(&self, pr: &PullRequest, options: MergeOptions) -> Result<()> {
        ensure_open(pr)?;
        self.backend.merge_pr(pr.number, options).await?;
        obs::emit_pr_merged(pr.number, options.method.as_str(), options.delete_branch);
        Ok(())
    }

    /// Ask before merging unless `auto_approve` is set.
    pub async fn confirm(
        &self,
        pr: &PullRequest,
        auto_approve: bool,
        confirmer: &dyn Confirmer,
    ) -> Result<bool> {
        if auto_approve {
            return Ok(true);
        }
        confirmer.confirm(pr).await
    }
}

pub(crate) fn ensure_open(pr: &PullRequest) -> Result<()> {
    if pr.state.is_open() {
        Ok(())
    } else {
        Err(ShipwrightError::PrNotOpen {
            number: pr.number,
            state: pr.state.clone(),
        })
    }
}

fn newest_first(a: &PullRequest, b: &PullRequest) -> Ordering {
    match (a.created_at, b.created_at) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
