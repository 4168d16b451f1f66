//! Pipeline state machine values.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal outcome carried by the `Completed` variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
}

/// Position of one pipeline invocation in the plan/merge/deploy sequence.
///
/// Every invocation starts at `Triggered` (plan path) or `PrDiscovered`
/// (merge path, where the PR stands in for the plan trigger).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "stage", content = "outcome")]
pub enum PipelineStage {
    Triggered,
    RunPending,
    RunObserved,
    Completed(Outcome),
    PrDiscovered,
    Merged,
    DeployTriggered,
    DeployRunPending,
    DeployRunObserved,
    DeployCompleted(Outcome),
    NotFound,
    Ambiguous,
    Declined,
    /// The invocation stopped on an error before reaching any other
    /// terminal stage.
    Aborted,
}

impl PipelineStage {
    pub fn name(&self) -> &'static str {
        match self {
            PipelineStage::Triggered => "triggered",
            PipelineStage::RunPending => "run_pending",
            PipelineStage::RunObserved => "run_observed",
            PipelineStage::Completed(Outcome::Success) => "completed_success",
            PipelineStage::Completed(Outcome::Failure) => "completed_failure",
            PipelineStage::PrDiscovered => "pr_discovered",
            PipelineStage::Merged => "merged",
            PipelineStage::DeployTriggered => "deploy_triggered",
            PipelineStage::DeployRunPending => "deploy_run_pending",
            PipelineStage::DeployRunObserved => "deploy_run_observed",
            PipelineStage::DeployCompleted(Outcome::Success) => "deploy_completed_success",
            PipelineStage::DeployCompleted(Outcome::Failure) => "deploy_completed_failure",
            PipelineStage::NotFound => "not_found",
            PipelineStage::Ambiguous => "ambiguous",
            PipelineStage::Declined => "declined",
            PipelineStage::Aborted => "aborted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineStage::Completed(_)
                | PipelineStage::DeployCompleted(_)
                | PipelineStage::NotFound
                | PipelineStage::Ambiguous
                | PipelineStage::Declined
                | PipelineStage::Aborted
        )
    }

    /// Whether `next` is a legal successor of `self`.
    ///
    /// Any non-terminal stage may abort.
    pub fn can_advance_to(&self, next: PipelineStage) -> bool {
        use PipelineStage::*;
        if next == Aborted {
            return !self.is_terminal();
        }
        matches!(
            (self, next),
            (Triggered, RunPending)
                | (RunPending, RunObserved)
                | (RunPending, NotFound)
                | (RunObserved, Completed(_))
                | (PrDiscovered, Merged)
                | (PrDiscovered, Declined)
                | (Merged, DeployTriggered)
                | (DeployTriggered, DeployRunPending)
                | (DeployRunPending, DeployRunObserved)
                | (DeployRunPending, NotFound)
                | (DeployRunObserved, DeployCompleted(_))
        )
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
