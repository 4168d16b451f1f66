//! Errors raised while driving the `gh` binary.

use shipwright_core::ShipwrightError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GhError {
    #[error("failed to run gh: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("gh {} failed: {stderr}", .args.join(" "))]
    CommandFailed { args: Vec<String>, stderr: String },

    #[error("unexpected gh output: {0}")]
    Decode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GhError>;

impl From<GhError> for ShipwrightError {
    fn from(err: GhError) -> Self {
        ShipwrightError::backend(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_failed_message() {
        let err = GhError::CommandFailed {
            args: vec!["run".into(), "view".into(), "42".into()],
            stderr: "HTTP 404".into(),
        };
        assert_eq!(err.to_string(), "gh run view 42 failed: HTTP 404");
    }

    #[test]
    fn test_converts_to_backend_error() {
        let err: ShipwrightError = GhError::CommandFailed {
            args: vec!["pr".into(), "merge".into()],
            stderr: "not mergeable".into(),
        }
        .into();
        assert!(matches!(err, ShipwrightError::Backend(ref msg) if msg.contains("not mergeable")));
    }
}
