//! Stage status, task state and completion mode enums.

use crate::errors::UnknownStatusError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a stage becomes completable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CompletionMode {
    /// Completed by filling in the required fields.
    #[default]
    Manual,
    /// Additionally requires a background task to succeed.
    Async,
}

/// The lifecycle status of a stage.
///
/// Moves `NotStarted -> InProgress -> Completed`. `Blocked` is entered from
/// `InProgress` when an async step is cancelled or fails, and left again on
/// retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Stage has not been reached yet.
    #[default]
    NotStarted,
    /// Stage is being worked on.
    InProgress,
    /// Stage has been passed.
    Completed,
    /// Stage is waiting on a retry of its async step.
    Blocked,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not_started"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::Blocked => write!(f, "blocked"),
        }
    }
}

impl FromStr for StageStatus {
    type Err = UnknownStatusError;

    /// Parses both the canonical names and the dashboard spellings
    /// (`"pending"`, `"in-progress"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "not_started" | "not-started" | "pending" => Ok(Self::NotStarted),
            "in_progress" | "in-progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "blocked" => Ok(Self::Blocked),
            _ => Err(UnknownStatusError::new(s)),
        }
    }
}

impl StageStatus {
    /// Returns true if the lifecycle permits moving to `next`.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        match (self, next) {
            (Self::NotStarted, Self::InProgress)
            | (Self::InProgress, Self::Completed | Self::Blocked)
            | (Self::Blocked, Self::InProgress) => true,
            (Self::NotStarted, _)
            | (Self::InProgress, _)
            | (Self::Completed, _)
            | (Self::Blocked, _) => false,
        }
    }

    /// Returns true once the stage has been passed.
    #[must_use]
    pub fn is_completed(self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// State of a background task driving an async stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// No task has been started.
    #[default]
    Idle,
    /// The task is running.
    Running,
    /// The task reported success.
    Succeeded,
    /// The task reported failure.
    Failed,
    /// The task was cancelled before it reported.
    Cancelled,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl TaskState {
    /// Terminal states accept no further transitions.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}
