use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{GhError, Result};

const GH_PROGRAM: &str = "gh";

/// Runs `gh` subcommands, optionally pinned to one repository.
#[derive(Debug, Clone)]
pub struct GhRunner {
    program: String,
    repo: Option<String>,
}

impl GhRunner {
    /// Without `repo`, `gh` resolves the repository from the working directory.
    pub fn new(repo: Option<String>) -> Self {
        Self {
            program: GH_PROGRAM.to_string(),
            repo,
        }
    }

    /// Use a different executable in place of `gh`.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Full argument list for one invocation, `--repo` included.
    pub fn command_args(&self, args: &[String]) -> Vec<String> {
        let mut full = args.to_vec();
        if let Some(repo) = &self.repo {
            full.push("--repo".to_string());
            full.push(repo.clone());
        }
        full
    }

    /// Run a command and return its stdout. A non-zero exit is an error
    /// carrying stderr.
    pub async fn run(&self, args: &[String]) -> Result<String> {
        let full = self.command_args(args);
        debug!(program = %self.program, args = ?full, "Running gh command");

        let output = Command::new(&self.program)
            .args(&full)
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(args = ?full, stderr = %stderr, "gh command failed");
            return Err(GhError::CommandFailed { args: full, stderr });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
