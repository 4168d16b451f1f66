//! Workflow run records as observed on the remote CI system.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::{Result, ShipwrightError};

/// Lifecycle status of a workflow run.
///
/// Parsing is case-insensitive; values the remote system adds later are kept
/// verbatim in `Other` and treated as non-terminal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RunStatus {
    Queued,
    InProgress,
    Waiting,
    Requested,
    Pending,
    Completed,
    Other(String),
}

impl RunStatus {
    pub fn as_str(&self) -> &str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::InProgress => "in_progress",
            RunStatus::Waiting => "waiting",
            RunStatus::Requested => "requested",
            RunStatus::Pending => "pending",
            RunStatus::Completed => "completed",
            RunStatus::Other(s) => s,
        }
    }

    /// Only `completed` is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed)
    }
}

impl From<&str> for RunStatus {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "queued" => RunStatus::Queued,
            "in_progress" => RunStatus::InProgress,
            "waiting" => RunStatus::Waiting,
            "requested" => RunStatus::Requested,
            "pending" => RunStatus::Pending,
            "completed" => RunStatus::Completed,
            other => RunStatus::Other(other.to_string()),
        }
    }
}

impl From<String> for RunStatus {
    fn from(value: String) -> Self {
        RunStatus::from(value.as_str())
    }
}

impl From<RunStatus> for String {
    fn from(value: RunStatus) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final outcome of a terminal workflow run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RunConclusion {
    Success,
    Failure,
    Cancelled,
    TimedOut,
    ActionRequired,
    Neutral,
    Skipped,
    Stale,
    StartupFailure,
    Other(String),
}

impl RunConclusion {
    pub fn as_str(&self) -> &str {
        match self {
            RunConclusion::Success => "success",
            RunConclusion::Failure => "failure",
            RunConclusion::Cancelled => "cancelled",
            RunConclusion::TimedOut => "timed_out",
            RunConclusion::ActionRequired => "action_required",
            RunConclusion::Neutral => "neutral",
            RunConclusion::Skipped => "skipped",
            RunConclusion::Stale => "stale",
            RunConclusion::StartupFailure => "startup_failure",
            RunConclusion::Other(s) => s,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RunConclusion::Success)
    }

    /// Parse a conclusion, mapping the empty string the remote reports for
    /// unfinished runs to `None`.
    pub fn parse_optional(value: &str) -> Option<Self> {
        if value.trim().is_empty() {
            None
        } else {
            Some(RunConclusion::from(value))
        }
    }
}

impl From<&str> for RunConclusion {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "success" => RunConclusion::Success,
            "failure" => RunConclusion::Failure,
            "cancelled" => RunConclusion::Cancelled,
            "timed_out" => RunConclusion::TimedOut,
            "action_required" => RunConclusion::ActionRequired,
            "neutral" => RunConclusion::Neutral,
            "skipped" => RunConclusion::Skipped,
            "stale" => RunConclusion::Stale,
            "startup_failure" => RunConclusion::StartupFailure,
            other => RunConclusion::Other(other.to_string()),
        }
    }
}

impl From<String> for RunConclusion {
    fn from(value: String) -> Self {
        RunConclusion::from(value.as_str())
    }
}

impl From<RunConclusion> for String {
    fn from(value: RunConclusion) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for RunConclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One execution instance of a remote workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: u64,
    pub status: RunStatus,
    /// Meaningful only once `status` is terminal.
    pub conclusion: Option<RunConclusion>,
    pub url: String,
    pub head_branch: String,
    pub event: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl WorkflowRun {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Terminal with a `success` conclusion. Anything else is a failure.
    pub fn succeeded(&self) -> bool {
        self.is_terminal()
            && self
                .conclusion
                .as_ref()
                .map(RunConclusion::is_success)
                .unwrap_or(false)
    }

    /// Conclusion to report for a terminal run, `other` when the remote
    /// omitted it.
    pub fn final_conclusion(&self) -> RunConclusion {
        self.conclusion
            .clone()
            .unwrap_or_else(|| RunConclusion::Other("unknown".to_string()))
    }

    /// Apply a freshly fetched record of the same run.
    ///
    /// Only `status` and `conclusion` may change, and status may only move
    /// forward from non-terminal to terminal.
    pub fn advance(&mut self, next: WorkflowRun) -> Result<()> {
        if next.id != self.id {
            return Err(ShipwrightError::Backend(format!(
                "run {} fetched as run {}",
                self.id, next.id
            )));
        }
        if self.is_terminal() && !next.is_terminal() {
            return Err(ShipwrightError::RegressedRun {
                run_id: self.id,
                from: self.status.to_string(),
                to: next.status.to_string(),
            });
        }
        if self.is_terminal() {
            return Ok(());
        }
        self.status = next.status;
        self.conclusion = next.conclusion;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(id: u64, status: &str, conclusion: Option<&str>) -> WorkflowRun {
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

    #[test]
    fn test_status_parsing_is_case_insensitive() {
        assert_eq!(RunStatus::from("COMPLETED"), RunStatus::Completed);
        assert_eq!(RunStatus::from("In_Progress"), RunStatus::InProgress);
        assert_eq!(
            RunStatus::from("brand_new"),
            RunStatus::Other("brand_new".to_string())
        );
    }

    #[test]
    fn test_only_completed_is_terminal() {
        assert!(RunStatus::Completed.is_terminal());
        assert!(!RunStatus::Queued.is_terminal());
        assert!(!RunStatus::InProgress.is_terminal());
        assert!(!RunStatus::Other("mystery".into()).is_terminal());
    }

    #[test]
    fn test_conclusion_empty_is_none() {
        assert_eq!(RunConclusion::parse_optional(""), None);
        assert_eq!(
            RunConclusion::parse_optional("Failure"),
            Some(RunConclusion::Failure)
        );
    }

    #[test]
    fn test_succeeded_requires_terminal_success() {
        assert!(run(1, "completed", Some("success")).succeeded());
        assert!(!run(1, "completed", Some("failure")).succeeded());
        assert!(!run(1, "completed", None).succeeded());
        assert!(!run(1, "in_progress", Some("success")).succeeded());
    }

    #[test]
    fn test_advance_moves_forward() {
        let mut current = run(5, "queued", None);
        current
            .advance(run(5, "completed", Some("success")))
            .expect("forward transition");
        assert!(current.succeeded());
    }

    #[test]
    fn test_advance_rejects_regression() {
        let mut current = run(5, "completed", Some("success"));
        let err = current.advance(run(5, "in_progress", None)).unwrap_err();
        assert!(matches!(err, ShipwrightError::RegressedRun { run_id: 5, .. }));
        assert!(current.succeeded());
    }

    #[test]
    fn test_advance_rejects_other_run() {
        let mut current = run(5, "queued", None);
        assert!(current.advance(run(6, "queued", None)).is_err());
    }

    #[test]
    fn test_status_serde_uses_wire_strings() {
        let json = serde_json::to_string(&RunStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
        let parsed: RunStatus = serde_json::from_str("\"QUEUED\"").unwrap();
        assert_eq!(parsed, RunStatus::Queued);
    }
}
