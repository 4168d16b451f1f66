//! Polling a workflow run until it reaches a terminal status.

use std::time::Duration;

use crate::backend::CiBackend;
use crate::cancel::{sleep_or_cancel, CancelSignal};
use crate::domain::{Result, ShipwrightError, WorkflowRun};
use crate::obs;

/// Watches one run at a fixed poll interval.
///
/// Unlike the run locator, a failed fetch is not retried: transport and parse
/// errors abort the watch.
pub struct WorkflowWatcher<'a> {
    backend: &'a dyn CiBackend,
    poll_interval: Duration,
    deadline: Option<Duration>,
}

impl<'a> WorkflowWatcher<'a> {
    pub fn new(backend: &'a dyn CiBackend, poll_interval: Duration) -> Self {
        Self {
            backend,
            poll_interval,
            deadline: None,
        }
    }

    /// Bound the whole watch. Exceeding it yields `ShipwrightError::Timeout`.
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Block until `run_id` is terminal and return its final record.
    ///
    /// `on_progress` sees every polled record in arrival order, the first
    /// and the terminal one included. A run already terminal on the first
    /// poll returns without sleeping.
    pub async fn watch<F>(
        &self,
        run_id: u64,
        cancel: &CancelSignal,
        mut on_progress: F,
    ) -> Result<WorkflowRun>
    where
        F: FnMut(&WorkflowRun),
    {
        let poll_loop = self.poll_until_terminal(run_id, cancel, &mut on_progress);
        match self.deadline {
            Some(limit) => tokio::time::timeout(limit, poll_loop)
                .await
                .map_err(|_| ShipwrightError::Timeout(limit))?,
            None => poll_loop.await,
        }
    }

    async fn poll_until_terminal<F>(
        &self,
        run_id: u64,
        cancel: &CancelSignal,
        on_progress: &mut F,
    ) -> Result<WorkflowRun>
    where
        F: FnMut(&WorkflowRun),
    {
        let mut current = self.backend.get_run(run_id).await?;
        let mut polls = 1u32;

        loop {
            obs::emit_run_polled(run_id, polls, &current.status);
            on_progress(&current);

            if current.is_terminal() {
                obs::emit_run_finished(run_id, current.final_conclusion().as_str(), polls);
                return Ok(current);
            }

            sleep_or_cancel(self.poll_interval, cancel).await?;
            let next = self.backend.get_run(run_id).await?;
            current.advance(next)?;
            polls += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelHandle;
    use crate::domain::RunStatus;
    use crate::fakes::{sample_run, BackendCall, ScriptedBackend};

    const POLL: Duration = Duration::from_secs(5);

    #[tokio::test(start_paused = true)]
    async fn test_terminal_on_first_poll_does_not_sleep() {
        let backend = ScriptedBackend::new();
        backend.push_run_states(3, vec![sample_run(3, "completed", Some("success"))]);

        let started = tokio::time::Instant::now();
        let run = WorkflowWatcher::new(&backend, POLL)
            .watch(3, &CancelSignal::never(), |_| {})
            .await
            .expect("watch");

        assert!(run.succeeded());
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert_eq!(backend.count_calls(|c| matches!(c, BackendCall::GetRun { .. })), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_callback_sees_every_poll_in_order() {
        let backend = ScriptedBackend::new();
        backend.push_run_states(
            4,
            vec![
                sample_run(4, "queued", None),
                sample_run(4, "in_progress", None),
                sample_run(4, "in_progress", None),
                sample_run(4, "completed", Some("failure")),
            ],
        );

        let mut seen = Vec::new();
        let run = WorkflowWatcher::new(&backend, POLL)
            .watch(4, &CancelSignal::never(), |r| seen.push(r.status.clone()))
            .await
            .expect("watch");

        assert!(!run.succeeded());
        assert_eq!(
            seen,
            vec![
                RunStatus::Queued,
                RunStatus::InProgress,
                RunStatus::InProgress,
                RunStatus::Completed,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleeps_fixed_interval_between_polls() {
        let backend = ScriptedBackend::new();
        backend.push_run_states(
            5,
            vec![
                sample_run(5, "queued", None),
                sample_run(5, "completed", Some("success")),
            ],
        );

        let started = tokio::time::Instant::now();
        WorkflowWatcher::new(&backend, POLL)
            .watch(5, &CancelSignal::never(), |_| {})
            .await
            .expect("watch");

        assert_eq!(started.elapsed(), POLL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_failure_aborts_watch() {
        let backend = ScriptedBackend::new();
        backend.fail_next_get_run("HTTP 502");

        let mut polls = 0;
        let err = WorkflowWatcher::new(&backend, POLL)
            .watch(6, &CancelSignal::never(), |_| polls += 1)
            .await
            .unwrap_err();

        assert!(matches!(err, ShipwrightError::Backend(_)));
        assert_eq!(polls, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_polling() {
        let backend = ScriptedBackend::new();
        backend.push_run_states(7, vec![sample_run(7, "in_progress", None)]);
        let handle = CancelHandle::new();
        let canceller = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(12)).await;
            canceller.cancel();
        });

        let err = WorkflowWatcher::new(&backend, POLL)
            .watch(7, &handle.signal(), |_| {})
            .await
            .unwrap_err();

        assert!(matches!(err, ShipwrightError::Cancelled));
        assert_eq!(backend.count_calls(|c| matches!(c, BackendCall::GetRun { .. })), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_times_out() {
        let backend = ScriptedBackend::new();
        backend.push_run_states(8, vec![sample_run(8, "in_progress", None)]);

        let err = WorkflowWatcher::new(&backend, POLL)
            .with_deadline(Some(Duration::from_secs(30)))
            .watch(8, &CancelSignal::never(), |_| {})
            .await
            .unwrap_err();

        assert!(matches!(err, ShipwrightError::Timeout(d) if d == Duration::from_secs(30)));
    }
}
