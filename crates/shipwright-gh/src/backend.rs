//! `CiBackend` over the GitHub CLI.

use std::collections::BTreeMap;

use async_trait::async_trait;
use shipwright_core::{CiBackend, MergeOptions, PrListState, PullRequest, Result, WorkflowRun};
use tracing::{debug, warn};

use crate::error::GhError;
use crate::runner::GhRunner;
use crate::wire::{self, PR_FIELDS, RUN_FIELDS};

/// Open pull requests fetched per listing. `gh` defaults to 30.
const PR_LIST_LIMIT: usize = 100;

#[derive(Debug, Clone)]
pub struct GhBackend {
    runner: GhRunner,
}

impl GhBackend {
    pub fn new(runner: GhRunner) -> Self {
        Self { runner }
    }

    /// Backend for `repo` (`owner/name`), or for the current directory's
    /// repository when `None`.
    pub fn for_repo(repo: Option<String>) -> Self {
        Self::new(GhRunner::new(repo))
    }
}

fn owned(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

fn trigger_args(workflow: &str, git_ref: &str, inputs: &BTreeMap<String, String>) -> Vec<String> {
    let mut args = owned(&["workflow", "run", workflow, "--ref", git_ref]);
    for (key, value) in inputs {
        args.push("-f".to_string());
        args.push(format!("{key}={value}"));
    }
    args
}

fn list_runs_args(workflow: &str, limit: usize) -> Vec<String> {
    owned(&[
        "run",
        "list",
        "--workflow",
        workflow,
        "--limit",
        &limit.to_string(),
        "--json",
        RUN_FIELDS,
    ])
}

fn view_run_args(run_id: u64) -> Vec<String> {
    owned(&["run", "view", &run_id.to_string(), "--json", RUN_FIELDS])
}

fn logs_args(run_id: u64, failed_only: bool) -> Vec<String> {
    let flag = if failed_only { "--log-failed" } else { "--log" };
    owned(&["run", "view", &run_id.to_string(), flag])
}

fn list_prs_args(state: PrListState, head: Option<&str>) -> Vec<String> {
    let mut args = owned(&[
        "pr",
        "list",
        "--state",
        state.as_str(),
        "--limit",
        &PR_LIST_LIMIT.to_string(),
        "--json",
        PR_FIELDS,
    ]);
    if let Some(head) = head {
        args.push("--head".to_string());
        args.push(head.to_string());
    }
    args
}

fn view_pr_args(number: u64) -> Vec<String> {
    owned(&["pr", "view", &number.to_string(), "--json", PR_FIELDS])
}

fn merge_args(number: u64, options: MergeOptions) -> Vec<String> {
    let method = format!("--{}", options.method.as_str());
    let mut args = owned(&["pr", "merge", &number.to_string(), &method]);
    if options.delete_branch {
        args.push("--delete-branch".to_string());
    }
    args
}

#[async_trait]
impl CiBackend for GhBackend {
    async fn trigger(
        &self,
        workflow: &str,
        git_ref: &str,
        inputs: &BTreeMap<String, String>,
    ) -> Result<()> {
        self.runner
            .run(&trigger_args(workflow, git_ref, inputs))
            .await?;
        Ok(())
    }

    async fn list_runs(&self, workflow: &str, limit: usize) -> Result<Vec<WorkflowRun>> {
        let stdout = self.runner.run(&list_runs_args(workflow, limit)).await?;
        Ok(wire::decode_runs(&stdout)?)
    }

    async fn get_run(&self, run_id: u64) -> Result<WorkflowRun> {
        let stdout = self.runner.run(&view_run_args(run_id)).await?;
        Ok(wire::decode_run(&stdout)?)
    }

    async fn get_logs(&self, run_id: u64, failed_only: bool) -> Result<String> {
        if failed_only {
            match self.runner.run(&logs_args(run_id, true)).await {
                Ok(logs) if !logs.trim().is_empty() => return Ok(logs),
                Ok(_) => debug!(run_id, "no failed-step logs, fetching full log"),
                Err(GhError::CommandFailed { stderr, .. }) => {
                    warn!(run_id, stderr = %stderr, "failed-step logs unavailable, fetching full log")
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(self.runner.run(&logs_args(run_id, false)).await?)
    }

    async fn list_prs(&self, state: PrListState, head: Option<&str>) -> Result<Vec<PullRequest>> {
        let stdout = self.runner.run(&list_prs_args(state, head)).await?;
        Ok(wire::decode_pull_requests(&stdout)?)
    }

    async fn get_pr(&self, number: u64) -> Result<PullRequest> {
        let stdout = self.runner.run(&view_pr_args(number)).await?;
        Ok(wire::decode_pull_request(&stdout)?)
    }

    async fn merge_pr(&self, number: u64, options: MergeOptions) -> Result<()> {
        self.runner.run(&merge_args(number, options)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shipwright_core::MergeMethod;

    #[test]
    fn test_trigger_passes_inputs_as_fields() {
        let inputs = BTreeMap::from([
            ("application".to_string(), "api".to_string()),
            ("environment".to_string(), "prod".to_string()),
        ]);
        assert_eq!(
            trigger_args("plan.yml", "main", &inputs),
            owned(&[
                "workflow",
                "run",
                "plan.yml",
                "--ref",
                "main",
                "-f",
                "application=api",
                "-f",
                "environment=prod",
            ])
        );
    }

    #[test]
    fn test_list_runs_requests_json_fields() {
        let args = list_runs_args("deploy.yml", 1);
        assert_eq!(
            args[..6].to_vec(),
            owned(&["run", "list", "--workflow", "deploy.yml", "--limit", "1"])
        );
        assert_eq!(args.last().map(String::as_str), Some(RUN_FIELDS));
    }

    #[test]
    fn test_logs_flags() {
        assert_eq!(logs_args(5, true), owned(&["run", "view", "5", "--log-failed"]));
        assert_eq!(logs_args(5, false), owned(&["run", "view", "5", "--log"]));
    }

    #[test]
    fn test_list_prs_head_filter() {
        let args = list_prs_args(PrListState::Open, Some("deploy/api/prod-1"));
        assert!(args.windows(2).any(|w| w[0] == "--state" && w[1] == "open"));
        assert!(args.ends_with(&owned(&["--head", "deploy/api/prod-1"])));
        assert!(!list_prs_args(PrListState::All, None).contains(&"--head".to_string()));
    }

    #[test]
    fn test_merge_args() {
        assert_eq!(
            merge_args(7, MergeOptions::default()),
            owned(&["pr", "merge", "7", "--squash", "--delete-branch"])
        );
        let keep = MergeOptions {
            method: MergeMethod::Rebase,
            delete_branch: false,
        };
        assert_eq!(merge_args(7, keep), owned(&["pr", "merge", "7", "--rebase"]));
    }

    /// Stand-in `gh` that answers the two log flags from a shell `case`.
    #[cfg(unix)]
    fn fake_gh(dir: &std::path::Path, failed_branch: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("gh");
        let script = format!(
            "#!/bin/sh\n\
             for arg in \"$@\"; do\n\
             case \"$arg\" in\n\
             --log-failed) {failed_branch};;\n\
             --log) echo \"full log line\"; exit 0;;\n\
             esac\n\
             done\n\
             exit 2\n"
        );
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_log_error_falls_back_to_full_log() {
        let dir = tempfile::tempdir().unwrap();
        let program = fake_gh(
            dir.path(),
            "echo \"log not found: run has no failed steps\" >&2; exit 1",
        );
        let backend = GhBackend::new(GhRunner::new(None).with_program(program));

        let logs = backend.get_logs(9, true).await.unwrap();

        assert_eq!(logs, "full log line\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_log_used_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let program = fake_gh(dir.path(), "echo \"step 3 failed\"; exit 0");
        let backend = GhBackend::new(GhRunner::new(None).with_program(program));

        assert_eq!(backend.get_logs(9, true).await.unwrap(), "step 3 failed\n");
        assert_eq!(backend.get_logs(9, false).await.unwrap(), "full log line\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_empty_failed_log_falls_back_to_full_log() {
        let dir = tempfile::tempdir().unwrap();
        let program = fake_gh(dir.path(), "exit 0");
        let backend = GhBackend::new(GhRunner::new(None).with_program(program));

        assert_eq!(backend.get_logs(9, true).await.unwrap(), "full log line\n");
    }

    #[tokio::test]
    async fn test_missing_gh_maps_to_backend_error() {
        let runner = GhRunner::new(None).with_program("shipwright-no-such-gh-binary");
        let backend = GhBackend::new(runner);
        let err = backend.get_run(1).await.unwrap_err();
        assert!(matches!(err, shipwright_core::ShipwrightError::Backend(_)));
    }
}
