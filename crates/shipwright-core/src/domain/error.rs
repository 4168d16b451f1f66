//! Domain-level error taxonomy for Shipwright.

use std::time::Duration;

use super::pull_request::PrState;
use super::run::RunConclusion;

/// Shipwright domain errors.
///
/// `Backend` covers transport and parse failures from the remote system;
/// those are never retried at this layer. The remaining variants are
/// business-rule violations that abort the current command.
#[derive(Debug, thiserror::Error)]
pub enum ShipwrightError {
    #[error("backend error: {0}")]
    Backend(String),

    #[error("workflow run {run_id} finished with conclusion '{conclusion}' ({url})")]
    RunFailed {
        run_id: u64,
        conclusion: RunConclusion,
        url: String,
    },

    #[error("no open deployment pull request found; run the plan step first")]
    NoDeploymentPr,

    #[error("pull request #{number} is {state}, not open")]
    PrNotOpen { number: u64, state: PrState },

    #[error("multiple applications found ({}); pass --application", .0.join(", "))]
    AmbiguousApplication(Vec<String>),

    #[error("no application found in plan directory")]
    NoApplication,

    #[error("invalid deployment identity: {0}")]
    InvalidIdentity(String),

    #[error("workflow run {run_id} regressed from '{from}' to '{to}'")]
    RegressedRun { run_id: u64, from: String, to: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ShipwrightError {
    /// Wrap any displayable transport or decode failure as a backend error.
    pub fn backend(err: impl std::fmt::Display) -> Self {
        ShipwrightError::Backend(err.to_string())
    }
}

/// Result type for Shipwright operations.
pub type Result<T> = std::result::Result<T, ShipwrightError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pr_not_open_names_state() {
        let err = ShipwrightError::PrNotOpen {
            number: 42,
            state: PrState::Merged,
        };
        let msg = err.to_string();
        assert!(msg.contains("#42"));
        assert!(msg.contains("merged"));
    }

    #[test]
    fn test_run_failed_includes_link() {
        let err = ShipwrightError::RunFailed {
            run_id: 7,
            conclusion: RunConclusion::Failure,
            url: "https://github.com/acme/infra/actions/runs/7".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("failure"));
        assert!(msg.contains("actions/runs/7"));
    }

    #[test]
    fn test_ambiguous_application_lists_candidates() {
        let err = ShipwrightError::AmbiguousApplication(vec!["api".into(), "web".into()]);
        assert!(err.to_string().contains("api, web"));
    }
}
