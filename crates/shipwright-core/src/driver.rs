//! Pipeline orchestration: plan -> pull request -> merge -> deploy.
//!
//! `PipelineDriver` sequences the remote jobs of one invocation:
//!
//! - plan path: trigger the plan workflow, locate its run, watch it, and
//!   point the operator at the pull request the workflow opened
//! - merge path: resolve and merge the deployment pull request, then locate
//!   and watch the deploy workflow the merge set off
//!
//! Run discovery that comes up empty is a soft failure on both paths: the
//! remote job may still be in flight. Everything else that goes wrong is
//! returned as an error.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::backend::CiBackend;
use crate::cancel::CancelSignal;
use crate::config::DriverConfig;
use crate::domain::{
    DeploymentIdentity, Outcome, PipelineStage, PullRequest, Result, ShipwrightError,
    WorkflowRun,
};
use crate::locator::RunLocator;
use crate::obs;
use crate::pr::{ensure_open, Confirmer, PrLifecycleManager};
use crate::report::{pulls_url_for_run, FailureReport, Reporter};
use crate::watcher::WorkflowWatcher;

/// What a deploy run did after a merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployOutcome {
    Succeeded(WorkflowRun),
    /// The deploy run never showed up in listings within the locate budget.
    NotObserved,
}

/// Non-error result of a pipeline invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    PlanSucceeded {
        run: WorkflowRun,
        pulls_url: String,
    },
    /// Soft failure: the triggered run could not be found.
    RunNotFound {
        workflow: String,
    },
    Merged {
        pr: PullRequest,
        deploy: DeployOutcome,
    },
    MergeDeclined {
        pr: PullRequest,
    },
}

/// Outcome plus every stage the invocation passed through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    pub outcome: PipelineOutcome,
    pub stages: Vec<PipelineStage>,
}

/// Orchestrates one invocation. Create a fresh driver per command.
pub struct PipelineDriver {
    backend: Arc<dyn CiBackend>,
    reporter: Arc<dyn Reporter>,
    confirmer: Arc<dyn Confirmer>,
    config: DriverConfig,
    cancel: CancelSignal,
    stages: Mutex<Vec<PipelineStage>>,
}

impl PipelineDriver {
    pub fn new(
        backend: Arc<dyn CiBackend>,
        reporter: Arc<dyn Reporter>,
        confirmer: Arc<dyn Confirmer>,
        config: DriverConfig,
    ) -> Self {
        Self {
            backend,
            reporter,
            confirmer,
            config,
            cancel: CancelSignal::never(),
            stages: Mutex::new(Vec::new()),
        }
    }

    /// Abort poll loops when `cancel` fires.
    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    /// Stages entered so far, in order.
    pub fn stages(&self) -> Vec<PipelineStage> {
        self.stages
            .lock()
            .map(|stages| stages.clone())
            .unwrap_or_default()
    }

    /// Pick the application to act on.
    ///
    /// An explicit request wins. Otherwise exactly one available application
    /// must exist; several is an `Ambiguous` abort.
    pub fn select_identity(
        &self,
        requested: Option<&str>,
        available: &[String],
        environment: &str,
    ) -> Result<DeploymentIdentity> {
        let application = match (requested, available) {
            (Some(app), _) => app.to_string(),
            (None, [only]) => only.clone(),
            (None, []) => return Err(ShipwrightError::NoApplication),
            (None, many) => {
                self.enter(PipelineStage::Ambiguous);
                return Err(ShipwrightError::AmbiguousApplication(many.to_vec()));
            }
        };
        DeploymentIdentity::new(application, environment)
    }

    /// Plan path: trigger the plan workflow for `identity` and see it through.
    pub async fn plan(&self, identity: &DeploymentIdentity) -> Result<PipelineReport> {
        let result = self.run_plan(identity).await;
        self.settle(result)
    }

    /// Merge path: merge a deployment PR and watch the deploy it triggers.
    ///
    /// Without `pr_number` the newest open deployment PR is used, scoped to
    /// `identity` when one is given. Cancellation also ends a pending merge
    /// confirmation.
    pub async fn merge(
        &self,
        pr_number: Option<u64>,
        identity: Option<&DeploymentIdentity>,
    ) -> Result<PipelineReport> {
        let result = self.run_merge(pr_number, identity).await;
        self.settle(result)
    }

    async fn run_plan(&self, identity: &DeploymentIdentity) -> Result<PipelineReport> {
        let workflow = self.config.plan_workflow.clone();
        let triggered_at = Utc::now();

        self.backend
            .trigger(&workflow, &self.config.git_ref, &identity.workflow_inputs())
            .await?;
        obs::emit_workflow_triggered(&workflow, &self.config.git_ref);
        self.enter(PipelineStage::Triggered);
        self.reporter
            .info(&format!("Triggered {workflow} for {identity}"));

        self.enter(PipelineStage::RunPending);
        let Some(run) = self.locate(&workflow, triggered_at).await? else {
            self.enter(PipelineStage::NotFound);
            self.reporter.warn(&format!(
                "Could not find the {workflow} run yet. Check GitHub Actions; the pull request \
                 will appear once the workflow finishes."
            ));
            return Ok(self.finish(PipelineOutcome::RunNotFound { workflow }));
        };

        self.enter(PipelineStage::RunObserved);
        self.reporter
            .info(&format!("Watching run {} ({})", run.id, run.url));
        let run = self.watch(&run).await?;

        if run.succeeded() {
            self.enter(PipelineStage::Completed(Outcome::Success));
            let pulls_url = pulls_url_for_run(&run.url);
            self.reporter
                .success(&format!("Plan for {identity} completed (run {})", run.id));
            self.reporter
                .info(&format!("Review the pull request at {pulls_url}"));
            Ok(self.finish(PipelineOutcome::PlanSucceeded { run, pulls_url }))
        } else {
            self.enter(PipelineStage::Completed(Outcome::Failure));
            Err(self.report_failure("plan workflow", &run).await)
        }
    }

    async fn run_merge(
        &self,
        pr_number: Option<u64>,
        identity: Option<&DeploymentIdentity>,
    ) -> Result<PipelineReport> {
        let manager = PrLifecycleManager::new(self.backend.as_ref());

        let pr = match pr_number {
            Some(number) => self.backend.get_pr(number).await?,
            None => manager
                .find_latest_deployment_pr(identity)
                .await?
                .ok_or(ShipwrightError::NoDeploymentPr)?,
        };
        self.enter(PipelineStage::PrDiscovered);
        self.reporter.info(&format!(
            "Pull request #{}: {} ({})",
            pr.number, pr.title, pr.url
        ));

        ensure_open(&pr)?;

        // A prompt waiting on the operator must not outlive an interrupt.
        let approved = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(ShipwrightError::Cancelled),
            approved = manager.confirm(
                &pr,
                self.config.auto_approve,
                self.confirmer.as_ref(),
            ) => approved?,
        };
        if !approved {
            self.enter(PipelineStage::Declined);
            self.reporter.warn("Merge cancelled");
            return Ok(self.finish(PipelineOutcome::MergeDeclined { pr }));
        }

        let merged_at = Utc::now();
        manager.merge_checked(&pr, self.config.merge).await?;
        self.enter(PipelineStage::Merged);
        self.reporter
            .success(&format!("Merged pull request #{}", pr.number));

        // The merge itself dispatches the deploy workflow on the remote.
        self.enter(PipelineStage::DeployTriggered);
        let workflow = self.config.deploy_workflow.clone();

        self.enter(PipelineStage::DeployRunPending);
        let Some(run) = self.locate(&workflow, merged_at).await? else {
            self.enter(PipelineStage::NotFound);
            self.reporter.warn(&format!(
                "The merge succeeded but no {workflow} run was found yet. Check GitHub Actions \
                 for the deployment."
            ));
            return Ok(self.finish(PipelineOutcome::Merged {
                pr,
                deploy: DeployOutcome::NotObserved,
            }));
        };

        self.enter(PipelineStage::DeployRunObserved);
        self.reporter
            .info(&format!("Watching deployment run {} ({})", run.id, run.url));
        let run = self.watch(&run).await?;

        if run.succeeded() {
            self.enter(PipelineStage::DeployCompleted(Outcome::Success));
            self.reporter
                .success(&format!("Deployment completed (run {})", run.id));
            Ok(self.finish(PipelineOutcome::Merged {
                pr,
                deploy: DeployOutcome::Succeeded(run),
            }))
        } else {
            self.enter(PipelineStage::DeployCompleted(Outcome::Failure));
            Err(self.report_failure("deploy workflow", &run).await)
        }
    }

    async fn locate(
        &self,
        workflow: &str,
        triggered_at: DateTime<Utc>,
    ) -> Result<Option<WorkflowRun>> {
        let skew = chrono::Duration::from_std(self.config.trigger_skew)
            .unwrap_or_else(|_| chrono::Duration::zero());
        let policy = self
            .config
            .locate
            .clone()
            .with_not_before(triggered_at - skew);
        RunLocator::new(self.backend.as_ref())
            .locate(workflow, &policy, &self.cancel)
            .await
    }

    async fn watch(&self, run: &WorkflowRun) -> Result<WorkflowRun> {
        let _scope = WatchScope::open(self.reporter.as_ref(), run);
        let reporter = self.reporter.as_ref();
        WorkflowWatcher::new(self.backend.as_ref(), self.config.poll_interval)
            .with_deadline(self.config.watch_deadline)
            .watch(run.id, &self.cancel, |polled| {
                reporter.progress(polled.id, &polled.status)
            })
            .await
    }

    /// Report a failed terminal run with its log tail and build the error.
    async fn report_failure(&self, action: &str, run: &WorkflowRun) -> ShipwrightError {
        let logs = match self.backend.get_logs(run.id, true).await {
            Ok(logs) => logs,
            Err(err) => return err,
        };
        self.reporter
            .failure(&FailureReport::new(action, run, &logs));
        ShipwrightError::RunFailed {
            run_id: run.id,
            conclusion: run.final_conclusion(),
            url: run.url.clone(),
        }
    }

    fn enter(&self, next: PipelineStage) {
        if let Ok(mut stages) = self.stages.lock() {
            if let Some(last) = stages.last() {
                if !last.can_advance_to(next) {
                    warn!(from = %last, to = %next, "unexpected pipeline transition");
                }
            }
            stages.push(next);
        }
        obs::emit_stage_entered(next);
    }

    /// Close the stage trace with `Aborted` when an error left it open.
    fn settle(&self, result: Result<PipelineReport>) -> Result<PipelineReport> {
        if result.is_err() {
            let open = self.stages().last().map_or(true, |stage| !stage.is_terminal());
            if open {
                self.enter(PipelineStage::Aborted);
            }
        }
        result
    }

    fn finish(&self, outcome: PipelineOutcome) -> PipelineReport {
        PipelineReport {
            outcome,
            stages: self.stages(),
        }
    }
}

/// Brackets a blocking watch so the reporter's progress display is torn
/// down on every exit path, including errors and a dropped future.
struct WatchScope<'a> {
    reporter: &'a dyn Reporter,
    run_id: u64,
}

impl<'a> WatchScope<'a> {
    fn open(reporter: &'a dyn Reporter, run: &WorkflowRun) -> Self {
        reporter.watch_started(run.id, &run.url);
        Self {
            reporter,
            run_id: run.id,
        }
    }
}

impl Drop for WatchScope<'_> {
    fn drop(&mut self) {
        self.reporter.watch_finished(self.run_id);
    }
}
