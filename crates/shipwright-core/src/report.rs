//! User-facing reporting surface of the pipeline driver.
//!
//! The driver never prints. It hands lines to a [`Reporter`]; the CLI
//! implementation writes them to the terminal, tests record them.

use std::sync::OnceLock;

use regex::Regex;

use crate::domain::{RunStatus, WorkflowRun};

/// Log tails shown on failure are bounded to this many characters.
pub const LOG_TAIL_CHARS: usize = 2000;

/// Details of a failed workflow run, ready to display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureReport {
    /// Human name of the failed action, e.g. "plan workflow".
    pub action: String,
    pub run_id: u64,
    pub conclusion: String,
    /// Link to the full run record.
    pub url: String,
    /// Last [`LOG_TAIL_CHARS`] characters of the run's logs.
    pub log_tail: String,
    pub truncated: bool,
}

impl FailureReport {
    pub fn new(action: &str, run: &WorkflowRun, logs: &str) -> Self {
        let (log_tail, truncated) = tail_chars(logs, LOG_TAIL_CHARS);
        Self {
            action: action.to_string(),
            run_id: run.id,
            conclusion: run.final_conclusion().to_string(),
            url: run.url.clone(),
            log_tail: log_tail.to_string(),
            truncated,
        }
    }
}

/// Sink for progress and outcome lines.
pub trait Reporter: Send + Sync {
    fn info(&self, message: &str);

    fn success(&self, message: &str);

    /// Soft failures: the operation may still succeed remotely.
    fn warn(&self, message: &str);

    fn failure(&self, report: &FailureReport);

    /// Called on every watch poll with the run's current status.
    fn progress(&self, _run_id: u64, _status: &RunStatus) {}

    /// A blocking watch of `run_id` is about to start.
    fn watch_started(&self, _run_id: u64, _url: &str) {}

    /// The watch of `run_id` ended, successfully or not.
    fn watch_finished(&self, _run_id: u64) {}
}

/// Last `max` characters of `text`, and whether anything was cut.
///
/// Counts characters, not bytes, so a multi-byte boundary is never split.
pub fn tail_chars(text: &str, max: usize) -> (&str, bool) {
    let total = text.chars().count();
    if total <= max {
        return (text, false);
    }
    let skip = total - max;
    let start = text
        .char_indices()
        .nth(skip)
        .map(|(idx, _)| idx)
        .unwrap_or(text.len());
    (&text[start..], true)
}

/// Pull-request listing URL for the repository that owns `run_url`.
///
/// `https://github.com/o/r/actions/runs/123/job/9` becomes
/// `https://github.com/o/r/pulls`. URLs without a run segment are returned
/// unchanged.
pub fn pulls_url_for_run(run_url: &str) -> String {
    static RUN_SEGMENT: OnceLock<Regex> = OnceLock::new();
    let re = RUN_SEGMENT.get_or_init(|| {
        Regex::new(r"/actions/runs/\d+(?:/.*)?$").expect("static regex is valid")
    });
    re.replace(run_url, "/pulls").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::sample_run;

    #[test]
    fn test_long_log_keeps_last_2000_chars() {
        let logs: String = (0..5000).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let (tail, truncated) = tail_chars(&logs, LOG_TAIL_CHARS);
        assert!(truncated);
        assert_eq!(tail.chars().count(), 2000);
        assert_eq!(tail, &logs[3000..]);
    }

    #[test]
    fn test_short_log_unmodified() {
        let logs = "x".repeat(500);
        let (tail, truncated) = tail_chars(&logs, LOG_TAIL_CHARS);
        assert!(!truncated);
        assert_eq!(tail, logs);
    }

    #[test]
    fn test_tail_respects_char_boundaries() {
        let logs = "é".repeat(10);
        let (tail, truncated) = tail_chars(&logs, 3);
        assert!(truncated);
        assert_eq!(tail, "ééé");
    }

    #[test]
    fn test_failure_report_bounds_logs() {
        let run = sample_run(9, "completed", Some("failure"));
        let report = FailureReport::new("plan workflow", &run, &"L".repeat(5000));
        assert_eq!(report.log_tail.len(), LOG_TAIL_CHARS);
        assert!(report.truncated);
        assert_eq!(report.conclusion, "failure");
        assert!(report.url.ends_with("/actions/runs/9"));
    }

    #[test]
    fn test_pulls_url_for_run() {
        assert_eq!(
            pulls_url_for_run("https://github.com/acme/infra/actions/runs/123"),
            "https://github.com/acme/infra/pulls"
        );
        assert_eq!(
            pulls_url_for_run("https://github.com/acme/infra/actions/runs/123/job/456"),
            "https://github.com/acme/infra/pulls"
        );
        assert_eq!(
            pulls_url_for_run("https://example.com/not-a-run"),
            "https://example.com/not-a-run"
        );
    }
}
