use std::fmt;

use serde::{Deserialize, Serialize};

/// Why a submission failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Every attempt in the retry budget failed.
    Exhausted,
    /// Cancelled while waiting to retry.
    Cancelled,
    /// Invalid configuration or unencodable payload; nothing was sent.
    Precondition,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Success { raw: serde_json::Value },
    DryRun,
    Failed { kind: FailureKind, error: String },
}

/// The single result of one ledger submission.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LedgerWriteResult {
    #[serde(flatten)]
    pub outcome: Outcome,
    pub attempts: u32,
}

impl LedgerWriteResult {
    pub fn success(raw: serde_json::Value, attempts: u32) -> Self {
        Self {
            outcome: Outcome::Success { raw },
            attempts,
        }
    }

    pub fn dry_run() -> Self {
        Self {
            outcome: Outcome::DryRun,
            attempts: 0,
        }
    }

    pub fn failed(kind: FailureKind, error: impl fmt::Display, attempts: u32) -> Self {
        Self {
            outcome: Outcome::Failed {
                kind,
                error: error.to_string(),
            },
            attempts,
        }
    }

    pub fn precondition(error: impl fmt::Display) -> Self {
        Self::failed(FailureKind::Precondition, error, 0)
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Success { .. })
    }

    pub fn is_dry_run(&self) -> bool {
        matches!(self.outcome, Outcome::DryRun)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, Outcome::Failed { .. })
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match &self.outcome {
            Outcome::Failed { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Terminal state of the submission that produced this result.
    pub fn state(&self) -> SubmissionState {
        match &self.outcome {
            Outcome::Success { .. } => SubmissionState::Success,
            Outcome::DryRun => SubmissionState::DryRun,
            Outcome::Failed {
                kind: FailureKind::Exhausted,
                ..
            } => SubmissionState::Exhausted,
            Outcome::Failed { .. } => SubmissionState::Aborted,
        }
    }
}

impl fmt::Display for LedgerWriteResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            Outcome::Success { .. } => write!(f, "success after {} attempt(s)", self.attempts),
            Outcome::DryRun => write!(f, "dry run (ledger not configured)"),
            Outcome::Failed { kind, error } => write!(
                f,
                "failed ({kind:?}) after {} attempt(s): {error}",
                self.attempts
            ),
        }
    }
}

/// Lifecycle of one submission.
///
/// `Idle -> Attempting(1) -> Attempting(2) -> ...` then one terminal state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmissionState {
    Idle,
    Attempting(u32),
    Success,
    DryRun,
    Exhausted,
    Aborted,
}

impl SubmissionState {
    /// Advance to the next attempt.
    pub fn next_attempt(self) -> Self {
        match self {
            Self::Idle => Self::Attempting(1),
            Self::Attempting(k) => Self::Attempting(k.saturating_add(1)),
            terminal => terminal,
        }
    }

    pub fn attempts(self) -> u32 {
        match self {
            Self::Attempting(k) => k,
            _ => 0,
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Idle | Self::Attempting(_))
    }
}

impl fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Attempting(k) => write!(f, "attempting({k})"),
            Self::Success => write!(f, "success"),
            Self::DryRun => write!(f, "dry_run"),
            Self::Exhausted => write!(f, "exhausted"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}
