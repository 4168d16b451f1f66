//! Discovery of the run a just-issued trigger produced.
//!
//! The run-listing endpoint lags behind the dispatch endpoint: a trigger can
//! be accepted several seconds before its run shows up in listings. The
//! locator polls a fixed number of times and reports absence as `Ok(None)`,
//! leaving the caller to decide how soft that failure is.

use crate::backend::CiBackend;
use crate::cancel::{sleep_or_cancel, CancelSignal};
use crate::config::LocatePolicy;
use crate::domain::{Result, WorkflowRun};
use crate::obs;

pub struct RunLocator<'a> {
    backend: &'a dyn CiBackend,
}

impl<'a> RunLocator<'a> {
    pub fn new(backend: &'a dyn CiBackend) -> Self {
        Self { backend }
    }

    /// Find the most recent run of `workflow` within the policy's budget.
    ///
    /// Issues at most `policy.max_attempts` listing queries and never sleeps
    /// after the last one. A freshly queued run is returned as-is.
    pub async fn locate(
        &self,
        workflow: &str,
        policy: &LocatePolicy,
        cancel: &CancelSignal,
    ) -> Result<Option<WorkflowRun>> {
        let attempts = policy.attempts();

        for attempt in 1..=attempts {
            obs::emit_locate_attempt(workflow, attempt, attempts);

            let runs = self.backend.list_runs(workflow, 1).await?;
            if let Some(run) = runs.into_iter().next() {
                if is_fresh(&run, policy) {
                    obs::emit_run_located(workflow, run.id, attempt);
                    return Ok(Some(run));
                }
                if let (Some(created_at), Some(not_before)) = (run.created_at, policy.not_before) {
                    obs::emit_run_skipped_stale(workflow, run.id, created_at, not_before);
                }
            }

            if attempt < attempts {
                sleep_or_cancel(policy.interval, cancel).await?;
            }
        }

        obs::emit_run_not_found(workflow, attempts);
        Ok(None)
    }
}

fn is_fresh(run: &WorkflowRun, policy: &LocatePolicy) -> bool {
    match (policy.not_before, run.created_at) {
        (Some(not_before), Some(created_at)) => created_at >= not_before,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ShipwrightError;
    use crate::fakes::{sample_run, BackendCall, ScriptedBackend};
    use chrono::{Duration as ChronoDuration, Utc};
    use std::time::Duration;

    fn policy(max_attempts: u32) -> LocatePolicy {
        LocatePolicy::new(max_attempts, Duration::from_secs(2))
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_immediately_when_run_listed() {
        let backend = ScriptedBackend::new();
        backend.push_run_listing(vec![sample_run(11, "queued", None)]);

        let found = RunLocator::new(&backend)
            .locate("plan.yml", &policy(5), &CancelSignal::never())
            .await
            .expect("locate");

        assert_eq!(found.map(|r| r.id), Some(11));
        assert_eq!(backend.count_calls(|c| matches!(c, BackendCall::ListRuns { .. })), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_through_propagation_delay() {
        let backend = ScriptedBackend::new();
        backend.push_run_listing(vec![]);
        backend.push_run_listing(vec![]);
        backend.push_run_listing(vec![sample_run(12, "in_progress", None)]);

        let started = tokio::time::Instant::now();
        let found = RunLocator::new(&backend)
            .locate("plan.yml", &policy(5), &CancelSignal::never())
            .await
            .expect("locate");

        assert_eq!(found.map(|r| r.id), Some(12));
        assert_eq!(backend.count_calls(|c| matches!(c, BackendCall::ListRuns { .. })), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_is_not_found_not_error() {
        for n in 1..=4 {
            let backend = ScriptedBackend::new();
            let started = tokio::time::Instant::now();
            let found = RunLocator::new(&backend)
                .locate("plan.yml", &policy(n), &CancelSignal::never())
                .await
                .expect("exhaustion must not be an error");

            assert!(found.is_none());
            assert_eq!(
                backend.count_calls(|c| matches!(c, BackendCall::ListRuns { .. })),
                n as usize
            );
            assert_eq!(started.elapsed(), Duration::from_secs(2 * (n as u64 - 1)));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ignores_runs_older_than_trigger() {
        let backend = ScriptedBackend::new();
        let trigger_at = Utc::now();

        let mut stale = sample_run(1, "completed", Some("success"));
        stale.created_at = Some(trigger_at - ChronoDuration::minutes(30));
        let mut fresh = sample_run(2, "queued", None);
        fresh.created_at = Some(trigger_at + ChronoDuration::seconds(1));

        backend.push_run_listing(vec![stale]);
        backend.push_run_listing(vec![fresh]);

        let found = RunLocator::new(&backend)
            .locate(
                "plan.yml",
                &policy(3).with_not_before(trigger_at),
                &CancelSignal::never(),
            )
            .await
            .expect("locate");

        assert_eq!(found.map(|r| r.id), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_propagates() {
        let backend = ScriptedBackend::new();
        backend.fail_next_list_runs("gh: connection reset");

        let err = RunLocator::new(&backend)
            .locate("plan.yml", &policy(3), &CancelSignal::never())
            .await
            .unwrap_err();

        assert!(matches!(err, ShipwrightError::Backend(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_aborts_between_attempts() {
        let backend = ScriptedBackend::new();
        let handle = crate::cancel::CancelHandle::new();
        handle.cancel();

        let err = RunLocator::new(&backend)
            .locate("plan.yml", &policy(5), &handle.signal())
            .await
            .unwrap_err();

        assert!(matches!(err, ShipwrightError::Cancelled));
        assert_eq!(backend.count_calls(|c| matches!(c, BackendCall::ListRuns { .. })), 1);
    }
}
