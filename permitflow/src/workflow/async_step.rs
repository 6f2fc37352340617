//! Background-task driven stages.
//!
//! A task moves `Idle -> Running -> {Succeeded, Failed, Cancelled}`. Once a
//! task is terminal it accepts nothing else, so a success that arrives after
//! a cancel is discarded.

use super::WorkflowInstance;
use crate::cancellation::CancellationToken;
use crate::core::{StageStatus, TaskState};
use crate::errors::AsyncStepError;
use crate::stages::AnalysisOutcome;
use crate::utils::{now_utc, Timestamp};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Handle to a started async step.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    task_id: Uuid,
    stage_id: String,
    token: Arc<CancellationToken>,
}

impl TaskHandle {
    /// Returns the task id.
    #[must_use]
    pub fn task_id(&self) -> Uuid {
        self.task_id
    }

    /// Returns the stage the task drives.
    #[must_use]
    pub fn stage_id(&self) -> &str {
        &self.stage_id
    }

    /// Returns the token the background work should observe.
    #[must_use]
    pub fn token(&self) -> Arc<CancellationToken> {
        Arc::clone(&self.token)
    }

    /// Returns true once the task has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[derive(Debug)]
pub(super) struct AsyncTaskRecord {
    stage_index: usize,
    state: TaskState,
    token: Arc<CancellationToken>,
    started_at: Timestamp,
}

/// Completion signal sent by a background task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCompletion {
    /// The task that finished.
    pub task_id: Uuid,
    /// What it reported.
    pub outcome: AnalysisOutcome,
}

impl TaskCompletion {
    /// Creates a success signal.
    #[must_use]
    pub fn succeeded(task_id: Uuid, summary: impl Into<String>) -> Self {
        Self {
            task_id,
            outcome: AnalysisOutcome::succeeded(summary),
        }
    }

    /// Creates a failure signal.
    #[must_use]
    pub fn failed(task_id: Uuid, summary: impl Into<String>) -> Self {
        Self {
            task_id,
            outcome: AnalysisOutcome::failed(summary),
        }
    }
}

/// Why a completion signal was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// No record of the task: it was never started here, or a newer task
    /// on the same stage superseded it.
    UnknownTask,
    /// The task had already reached this terminal state.
    AlreadyTerminal(TaskState),
}

/// What happened to a completion signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionDisposition {
    /// The signal changed the task and stage state.
    Applied {
        /// The task id.
        task_id: Uuid,
        /// The stage the task drives.
        stage_id: String,
        /// The new task state.
        state: TaskState,
        /// New current index if the stage auto-advanced.
        advanced_to: Option<usize>,
    },
    /// The signal was ignored.
    Discarded {
        /// The task id.
        task_id: Uuid,
        /// Why it was ignored.
        reason: DiscardReason,
    },
}

impl CompletionDisposition {
    /// Returns the task id.
    #[must_use]
    pub fn task_id(&self) -> Uuid {
        match self {
            Self::Applied { task_id, .. } | Self::Discarded { task_id, .. } => *task_id,
        }
    }

    /// Returns true if the signal was applied.
    #[must_use]
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

impl WorkflowInstance {
    /// Starts the async step of the current stage.
    ///
    /// A `Blocked` stage returns to `InProgress`, which is how a failed or
    /// cancelled step is retried. The caller runs the background work and
    /// reports back through [`apply_completion`](Self::apply_completion).
    pub fn start_async_step(&mut self, stage_id: &str) -> Result<TaskHandle, AsyncStepError> {
        let index = self
            .stage_index(stage_id)
            .ok_or_else(|| AsyncStepError::UnknownStage {
                stage_id: stage_id.to_string(),
            })?;
        if !self.stages[index].is_async() {
            return Err(AsyncStepError::NotAsync {
                stage_id: stage_id.to_string(),
            });
        }
        if index != self.current {
            return Err(AsyncStepError::InactiveStage {
                stage_id: stage_id.to_string(),
                active_stage_id: self.stages[self.current].id.clone(),
            });
        }
        if self.runtime_at(index).task_state == TaskState::Running {
            return Err(AsyncStepError::AlreadyRunning {
                stage_id: stage_id.to_string(),
            });
        }

        // The previous task of this stage is terminal; only its stage's latest
        // task is kept.
        if let Some(previous) = self.runtime_at(index).active_task {
            self.tasks.remove(&previous);
        }

        let task_id = crate::utils::generate_uuid_v7();
        let token = Arc::new(CancellationToken::new());

        let state = self.runtime_at_mut(index);
        if state.status == StageStatus::Blocked {
            state.transition(StageStatus::InProgress);
        }
        state.task_state = TaskState::Running;
        state.active_task = Some(task_id);
        state.last_summary = None;
        if !state.status.is_completed() {
            state.progress_percent = 0;
        }
        state.touch();

        self.tasks.insert(
            task_id,
            AsyncTaskRecord {
                stage_index: index,
                state: TaskState::Running,
                token: Arc::clone(&token),
                started_at: now_utc(),
            },
        );

        info!(workflow = %self.name(), stage_id, %task_id, "Async step started");

        Ok(TaskHandle {
            task_id,
            stage_id: stage_id.to_string(),
            token,
        })
    }

    /// Cancels a running async step.
    ///
    /// Returns true if the task moved to `Cancelled`; false if it was already
    /// terminal or unknown.
    pub fn cancel_async_step(&mut self, handle: &TaskHandle) -> bool {
        self.cancel_task(handle.task_id, "cancelled by caller")
    }

    /// Cancels a running task by id.
    pub fn cancel_task(&mut self, task_id: Uuid, reason: &str) -> bool {
        let Some(record) = self.tasks.get_mut(&task_id) else {
            return false;
        };
        if record.state.is_terminal() {
            return false;
        }

        record.state = TaskState::Cancelled;
        record.token.cancel(reason);
        let index = record.stage_index;
        self.settle_stage(index, task_id, TaskState::Cancelled, None);

        info!(workflow = %self.name(), %task_id, reason, "Async step cancelled");
        true
    }

    /// Cancels every running task. Returns how many were cancelled.
    pub fn cancel_all_tasks(&mut self, reason: &str) -> usize {
        let running: Vec<Uuid> = self
            .tasks
            .iter()
            .filter(|(_, r)| r.state == TaskState::Running)
            .map(|(id, _)| *id)
            .collect();
        running
            .into_iter()
            .filter(|id| self.cancel_task(*id, reason))
            .count()
    }

    /// Applies a completion signal from a background task.
    ///
    /// This is the only path by which task results reach stage state.
    pub fn apply_completion(&mut self, completion: TaskCompletion) -> CompletionDisposition {
        let task_id = completion.task_id;
        let Some(record) = self.tasks.get_mut(&task_id) else {
            warn!(workflow = %self.name(), %task_id, "Completion for unknown task");
            return CompletionDisposition::Discarded {
                task_id,
                reason: DiscardReason::UnknownTask,
            };
        };
        if record.state.is_terminal() {
            let state = record.state;
            debug!(workflow = %self.name(), %task_id, %state, "Late completion discarded");
            return CompletionDisposition::Discarded {
                task_id,
                reason: DiscardReason::AlreadyTerminal(state),
            };
        }

        let new_state = if completion.outcome.success {
            TaskState::Succeeded
        } else {
            TaskState::Failed
        };
        record.state = new_state;
        let index = record.stage_index;
        let elapsed_ms = (now_utc() - record.started_at).num_milliseconds();
        self.settle_stage(index, task_id, new_state, Some(completion.outcome.summary));

        let stage_id = self.stages[index].id.clone();
        info!(
            workflow = %self.name(),
            %stage_id,
            %task_id,
            state = %new_state,
            elapsed_ms,
            "Async step finished"
        );

        let advanced_to = if new_state == TaskState::Succeeded
            && self.stages[index].auto_advance
            && self.current == index
        {
            self.advance().ok()
        } else {
            None
        };

        CompletionDisposition::Applied {
            task_id,
            stage_id,
            state: new_state,
            advanced_to,
        }
    }

    /// Returns the state of a task.
    #[must_use]
    pub fn task_state(&self, task_id: Uuid) -> Option<TaskState> {
        self.tasks.get(&task_id).map(|r| r.state)
    }

    /// Returns the id of the stage a task drives.
    #[must_use]
    pub fn task_stage_id(&self, task_id: Uuid) -> Option<&str> {
        self.tasks
            .get(&task_id)
            .map(|r| self.stages[r.stage_index].id.as_str())
    }

    /// Mirrors a terminal task state onto its stage, if it is the stage's latest task.
    fn settle_stage(
        &mut self,
        index: usize,
        task_id: Uuid,
        task_state: TaskState,
        summary: Option<String>,
    ) {
        let state = self.runtime_at_mut(index);
        if state.active_task != Some(task_id) {
            return;
        }
        state.task_state = task_state;
        if summary.is_some() {
            state.last_summary = summary;
        }
        match task_state {
            TaskState::Succeeded => state.progress_percent = 100,
            TaskState::Failed | TaskState::Cancelled => {
                state.transition(StageStatus::Blocked);
            }
            TaskState::Idle | TaskState::Running => {}
        }
        state.touch();
    }
}
