//! Shared deterministic types for loop core logic.
//!
//! These types define stable contracts between components. Iteration failures
//! are represented as data so retry and ordering semantics stay testable
//! without inspecting error chains.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Completion signal from one agent invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvokeOutcome {
    /// The agent exited cleanly.
    Success,
    /// The agent did not complete; the story stays open for the next pass.
    Failure(InvokeFailure),
}

/// Why an invocation did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum InvokeFailure {
    /// The agent process exited with a non-zero status.
    NonZeroExit { code: Option<i32> },
    /// The agent ran past the configured timeout and was killed.
    TimedOut { timeout_secs: u64 },
    /// The agent process could not be started or driven.
    Transport { detail: String },
}

impl fmt::Display for InvokeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonZeroExit { code: Some(code) } => write!(f, "exited with status {code}"),
            Self::NonZeroExit { code: None } => write!(f, "exited abnormally (no status)"),
            Self::TimedOut { timeout_secs } => write!(f, "timed out after {timeout_secs}s"),
            Self::Transport { detail } => write!(f, "transport error: {detail}"),
        }
    }
}

/// Result of inspecting and committing the working tree after an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "result")]
pub enum CommitOutcome {
    /// Modifications were staged and committed; `pushed` records whether the
    /// publish attempt reached the remote.
    Committed { pushed: bool },
    /// The working tree had no modifications; valid completion, no commit.
    NoChanges,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_display_is_stable() {
        let failure = InvokeFailure::NonZeroExit { code: Some(2) };
        assert_eq!(failure.to_string(), "exited with status 2");
        let failure = InvokeFailure::TimedOut { timeout_secs: 30 };
        assert_eq!(failure.to_string(), "timed out after 30s");
    }

    #[test]
    fn outcomes_serialize_with_tags() {
        let json = serde_json::to_value(InvokeOutcome::Failure(InvokeFailure::TimedOut {
            timeout_secs: 5,
        }))
        .expect("serialize");
        assert_eq!(json["failure"]["kind"], "timed_out");

        let json = serde_json::to_value(CommitOutcome::Committed { pushed: false }).expect("serialize");
        assert_eq!(json["result"], "committed");
    }
}
