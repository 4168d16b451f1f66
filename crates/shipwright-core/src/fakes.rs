//! In-memory fakes for the driver's collaborators (testing only)
//!
//! `ScriptedBackend` replays scripted run listings and run snapshots, keeps a
//! mutable set of pull requests, and records every call it receives so tests
//! can assert on exactly what the orchestration core asked the remote to do.
//! `FixedConfirmer` and `RecordingReporter` stand in for the terminal.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::backend::CiBackend;
use crate::domain::{
    MergeOptions, PrListState, PrState, PullRequest, Result, RunConclusion, RunStatus,
    ShipwrightError, WorkflowRun,
};
use crate::pr::Confirmer;
use crate::report::{FailureReport, Reporter};

/// One call received by a [`ScriptedBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Trigger {
        workflow: String,
        git_ref: String,
        inputs: BTreeMap<String, String>,
    },
    ListRuns {
        workflow: String,
        limit: usize,
    },
    GetRun {
        run_id: u64,
    },
    GetLogs {
        run_id: u64,
        failed_only: bool,
    },
    ListPrs {
        state: PrListState,
        head: Option<String>,
    },
    GetPr {
        number: u64,
    },
    MergePr {
        number: u64,
        options: MergeOptions,
    },
}

#[derive(Debug, Default)]
struct Script {
    calls: Vec<BackendCall>,
    /// Listings for any workflow, consumed in order.
    listings: VecDeque<Vec<WorkflowRun>>,
    /// Listings for one workflow, consumed before the shared queue.
    listings_by_workflow: HashMap<String, VecDeque<Vec<WorkflowRun>>>,
    /// Successive snapshots per run; the last one repeats.
    run_states: HashMap<u64, VecDeque<WorkflowRun>>,
    logs: HashMap<u64, String>,
    prs: Vec<PullRequest>,
    fail_trigger: Option<String>,
    fail_list_runs: Option<String>,
    fail_get_run: Option<String>,
    fail_get_logs: Option<String>,
    fail_merge: Option<String>,
}

/// Scripted in-memory backend.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    script: Mutex<Script>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the result of one `list_runs` call for any workflow.
    pub fn push_run_listing(&self, runs: Vec<WorkflowRun>) {
        self.script.lock().unwrap().listings.push_back(runs);
    }

    /// Queue the result of one `list_runs` call for `workflow` only.
    pub fn push_run_listing_for(&self, workflow: &str, runs: Vec<WorkflowRun>) {
        self.script
            .lock()
            .unwrap()
            .listings_by_workflow
            .entry(workflow.to_string())
            .or_default()
            .push_back(runs);
    }

    /// Script the snapshots `get_run` returns for one run, in poll order.
    pub fn push_run_states(&self, run_id: u64, states: Vec<WorkflowRun>) {
        self.script
            .lock()
            .unwrap()
            .run_states
            .entry(run_id)
            .or_default()
            .extend(states);
    }

    pub fn set_logs(&self, run_id: u64, logs: impl Into<String>) {
        self.script.lock().unwrap().logs.insert(run_id, logs.into());
    }

    pub fn add_pr(&self, pr: PullRequest) {
        self.script.lock().unwrap().prs.push(pr);
    }

    pub fn fail_trigger(&self, message: &str) {
        self.script.lock().unwrap().fail_trigger = Some(message.to_string());
    }

    pub fn fail_next_list_runs(&self, message: &str) {
        self.script.lock().unwrap().fail_list_runs = Some(message.to_string());
    }

    pub fn fail_next_get_run(&self, message: &str) {
        self.script.lock().unwrap().fail_get_run = Some(message.to_string());
    }

    pub fn fail_next_get_logs(&self, message: &str) {
        self.script.lock().unwrap().fail_get_logs = Some(message.to_string());
    }

    pub fn fail_merge(&self, message: &str) {
        self.script.lock().unwrap().fail_merge = Some(message.to_string());
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.script.lock().unwrap().calls.clone()
    }

    pub fn count_calls(&self, predicate: impl Fn(&BackendCall) -> bool) -> usize {
        self.script
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| predicate(c))
            .count()
    }

    pub fn pr(&self, number: u64) -> Option<PullRequest> {
        self.script
            .lock()
            .unwrap()
            .prs
            .iter()
            .find(|pr| pr.number == number)
            .cloned()
    }

    fn record(&self, call: BackendCall) {
        self.script.lock().unwrap().calls.push(call);
    }
}

#[async_trait]
impl CiBackend for ScriptedBackend {
    async fn trigger(
        &self,
        workflow: &str,
        git_ref: &str,
        inputs: &BTreeMap<String, String>,
    ) -> Result<()> {
        self.record(BackendCall::Trigger {
            workflow: workflow.to_string(),
            git_ref: git_ref.to_string(),
            inputs: inputs.clone(),
        });
        match self.script.lock().unwrap().fail_trigger.take() {
            Some(message) => Err(ShipwrightError::Backend(message)),
            None => Ok(()),
        }
    }

    async fn list_runs(&self, workflow: &str, limit: usize) -> Result<Vec<WorkflowRun>> {
        self.record(BackendCall::ListRuns {
            workflow: workflow.to_string(),
            limit,
        });
        let mut script = self.script.lock().unwrap();
        if let Some(message) = script.fail_list_runs.take() {
            return Err(ShipwrightError::Backend(message));
        }
        let scoped = script
            .listings_by_workflow
            .get_mut(workflow)
            .and_then(VecDeque::pop_front);
        let runs = match scoped {
            Some(runs) => runs,
            None => script.listings.pop_front().unwrap_or_default(),
        };
        Ok(runs.into_iter().take(limit).collect())
    }

    async fn get_run(&self, run_id: u64) -> Result<WorkflowRun> {
        self.record(BackendCall::GetRun { run_id });
        let mut script = self.script.lock().unwrap();
        if let Some(message) = script.fail_get_run.take() {
            return Err(ShipwrightError::Backend(message));
        }
        let states = script
            .run_states
            .get_mut(&run_id)
            .ok_or_else(|| ShipwrightError::Backend(format!("run {run_id} not found")))?;
        let next = if states.len() > 1 {
            states.pop_front()
        } else {
            states.front().cloned()
        };
        next.ok_or_else(|| ShipwrightError::Backend(format!("run {run_id} has no state")))
    }

    async fn get_logs(&self, run_id: u64, failed_only: bool) -> Result<String> {
        self.record(BackendCall::GetLogs {
            run_id,
            failed_only,
        });
        let mut script = self.script.lock().unwrap();
        if let Some(message) = script.fail_get_logs.take() {
            return Err(ShipwrightError::Backend(message));
        }
        Ok(script.logs.get(&run_id).cloned().unwrap_or_default())
    }

    async fn list_prs(&self, state: PrListState, head: Option<&str>) -> Result<Vec<PullRequest>> {
        self.record(BackendCall::ListPrs {
            state,
            head: head.map(str::to_string),
        });
        let script = self.script.lock().unwrap();
        Ok(script
            .prs
            .iter()
            .filter(|pr| match state {
                PrListState::Open => pr.state == PrState::Open,
                PrListState::Closed => pr.state == PrState::Closed,
                PrListState::Merged => pr.state == PrState::Merged,
                PrListState::All => true,
            })
            .filter(|pr| head.map(|h| pr.head_ref_name == h).unwrap_or(true))
            .cloned()
            .collect())
    }

    async fn get_pr(&self, number: u64) -> Result<PullRequest> {
        self.record(BackendCall::GetPr { number });
        self.pr(number)
            .ok_or_else(|| ShipwrightError::Backend(format!("pull request #{number} not found")))
    }

    async fn merge_pr(&self, number: u64, options: MergeOptions) -> Result<()> {
        self.record(BackendCall::MergePr { number, options });
        let mut script = self.script.lock().unwrap();
        if let Some(message) = script.fail_merge.take() {
            return Err(ShipwrightError::Backend(message));
        }
        let pr = script
            .prs
            .iter_mut()
            .find(|pr| pr.number == number)
            .ok_or_else(|| ShipwrightError::Backend(format!("pull request #{number} not found")))?;
        pr.state = PrState::Merged;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FixedConfirmer
// ---------------------------------------------------------------------------

/// Confirmer that always gives the same answer and counts prompts.
#[derive(Debug)]
pub struct FixedConfirmer {
    answer: bool,
    prompts: AtomicUsize,
}

impl FixedConfirmer {
    pub fn new(answer: bool) -> Self {
        Self {
            answer,
            prompts: AtomicUsize::new(0),
        }
    }

    pub fn prompts(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Confirmer for FixedConfirmer {
    async fn confirm(&self, _pr: &PullRequest) -> Result<bool> {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        Ok(self.answer)
    }
}

// ---------------------------------------------------------------------------
// RecordingReporter
// ---------------------------------------------------------------------------

/// One line received by a [`RecordingReporter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reported {
    Info(String),
    Success(String),
    Warn(String),
    Failure(FailureReport),
    Progress { run_id: u64, status: RunStatus },
    WatchStarted(u64),
    WatchFinished(u64),
}

#[derive(Debug, Default)]
pub struct RecordingReporter {
    lines: Mutex<Vec<Reported>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<Reported> {
        self.lines.lock().unwrap().clone()
    }

    pub fn failures(&self) -> Vec<FailureReport> {
        self.lines()
            .into_iter()
            .filter_map(|line| match line {
                Reported::Failure(report) => Some(report),
                _ => None,
            })
            .collect()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter_map(|line| match line {
                Reported::Warn(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    fn push(&self, line: Reported) {
        self.lines.lock().unwrap().push(line);
    }
}

impl Reporter for RecordingReporter {
    fn info(&self, message: &str) {
        self.push(Reported::Info(message.to_string()));
    }

    fn success(&self, message: &str) {
        self.push(Reported::Success(message.to_string()));
    }

    fn warn(&self, message: &str) {
        self.push(Reported::Warn(message.to_string()));
    }

    fn failure(&self, report: &FailureReport) {
        self.push(Reported::Failure(report.clone()));
    }

    fn progress(&self, run_id: u64, status: &RunStatus) {
        self.push(Reported::Progress {
            run_id,
            status: status.clone(),
        });
    }

    fn watch_started(&self, run_id: u64, _url: &str) {
        self.push(Reported::WatchStarted(run_id));
    }

    fn watch_finished(&self, run_id: u64) {
        self.push(Reported::WatchFinished(run_id));
    }
}

/// A run record with a GitHub-shaped URL.
pub fn sample_run(id: u64, status: &str, conclusion: Option<&str>) -> WorkflowRun {
    WorkflowRun {
        id,
        status: RunStatus::from(status),
        conclusion: conclusion.map(RunConclusion::from),
        url: format!("https://github.com/acme/infra/actions/runs/{id}"),
        head_branch: "main".to_string(),
        event: "workflow_dispatch".to_string(),
        created_at: None,
    }
}

/// An open-or-otherwise pull request on `head`.
pub fn sample_pr(number: u64, head: &str, state: &str) -> PullRequest {
    PullRequest {
        number,
        url: format!("https://github.com/acme/infra/pull/{number}"),
        title: format!("Deploy {head}"),
        state: PrState::from(state),
        head_ref_name: head.to_string(),
        base_ref_name: "main".to_string(),
        created_at: None,
    }
}
