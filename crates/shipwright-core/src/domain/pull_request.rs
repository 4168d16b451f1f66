//! Pull requests produced by the remote plan workflow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pull request state, normalised to lower case at the boundary.
///
/// Different remote endpoints report `OPEN` and `open` for the same state;
/// deserialisation folds case once so no comparison downstream has to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PrState {
    Open,
    Merged,
    Closed,
    Other(String),
}

impl PrState {
    pub fn as_str(&self) -> &str {
        match self {
            PrState::Open => "open",
            PrState::Merged => "merged",
            PrState::Closed => "closed",
            PrState::Other(s) => s,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, PrState::Open)
    }
}

impl From<&str> for PrState {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "open" => PrState::Open,
            "merged" => PrState::Merged,
            "closed" => PrState::Closed,
            other => PrState::Other(other.to_string()),
        }
    }
}

impl From<String> for PrState {
    fn from(value: String) -> Self {
        PrState::from(value.as_str())
    }
}

impl From<PrState> for String {
    fn from(value: PrState) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for PrState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filter for listing pull requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrListState {
    Open,
    Closed,
    Merged,
    All,
}

impl PrListState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrListState::Open => "open",
            PrListState::Closed => "closed",
            PrListState::Merged => "merged",
            PrListState::All => "all",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub url: String,
    pub title: String,
    pub state: PrState,
    pub head_ref_name: String,
    pub base_ref_name: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// How the remote system should combine the PR into its base branch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeMethod {
    #[default]
    Squash,
    Merge,
    Rebase,
}

impl MergeMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeMethod::Squash => "squash",
            MergeMethod::Merge => "merge",
            MergeMethod::Rebase => "rebase",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeOptions {
    pub method: MergeMethod,
    pub delete_branch: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            method: MergeMethod::Squash,
            delete_branch: true,
        }
    }
}
