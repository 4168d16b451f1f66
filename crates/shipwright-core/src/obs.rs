//! Structured observability hooks for pipeline lifecycle events.
//!
//! This module provides:
//! - Invocation-scoped tracing spans via the `PipelineSpan` RAII guard
//! - Emission functions for key lifecycle events: stage transitions, run
//!   discovery, polling, merges
//!
//! Events are emitted with an `event` field so JSON log consumers can filter
//! on it. Verbosity follows `RUST_LOG`.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::{PipelineStage, RunStatus};

/// RAII guard that enters a span for one pipeline invocation.
///
/// # Example
///
/// ```ignore
/// let span = PipelineSpan::enter("pr-merge");
/// // every event below carries invocation_id and command
/// ```
pub struct PipelineSpan {
    invocation_id: Uuid,
    _span: tracing::span::EnteredSpan,
}

impl PipelineSpan {
    pub fn enter(command: &str) -> Self {
        let invocation_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "shipwright.pipeline",
            invocation_id = %invocation_id,
            command = %command,
        );
        Self {
            invocation_id,
            _span: span.entered(),
        }
    }

    pub fn invocation_id(&self) -> Uuid {
        self.invocation_id
    }
}

pub fn emit_stage_entered(stage: PipelineStage) {
    info!(event = "pipeline.stage", stage = %stage);
}

pub fn emit_workflow_triggered(workflow: &str, git_ref: &str) {
    info!(event = "workflow.triggered", workflow = %workflow, git_ref = %git_ref);
}

pub fn emit_locate_attempt(workflow: &str, attempt: u32, max_attempts: u32) {
    debug!(
        event = "run.locate_attempt",
        workflow = %workflow,
        attempt = attempt,
        max_attempts = max_attempts,
    );
}

pub fn emit_run_located(workflow: &str, run_id: u64, attempt: u32) {
    info!(event = "run.located", workflow = %workflow, run_id = run_id, attempt = attempt);
}

pub fn emit_run_skipped_stale(
    workflow: &str,
    run_id: u64,
    created_at: DateTime<Utc>,
    not_before: DateTime<Utc>,
) {
    debug!(
        event = "run.skipped_stale",
        workflow = %workflow,
        run_id = run_id,
        created_at = %created_at.to_rfc3339(),
        not_before = %not_before.to_rfc3339(),
    );
}

pub fn emit_run_not_found(workflow: &str, attempts: u32) {
    warn!(event = "run.not_found", workflow = %workflow, attempts = attempts);
}

pub fn emit_run_polled(run_id: u64, poll: u32, status: &RunStatus) {
    debug!(event = "run.polled", run_id = run_id, poll = poll, status = %status);
}

pub fn emit_run_finished(run_id: u64, conclusion: &str, polls: u32) {
    info!(
        event = "run.finished",
        run_id = run_id,
        conclusion = %conclusion,
        polls = polls,
    );
}

pub fn emit_pr_selected(number: u64, head: &str, candidates: usize) {
    if candidates > 1 {
        warn!(
            event = "pr.ambiguous",
            number = number,
            head = %head,
            candidates = candidates,
            "several open deployment pull requests; picked the newest"
        );
    } else {
        info!(event = "pr.selected", number = number, head = %head);
    }
}

pub fn emit_pr_merged(number: u64, method: &str, delete_branch: bool) {
    info!(
        event = "pr.merged",
        number = number,
        method = %method,
        delete_branch = delete_branch,
    );
}
