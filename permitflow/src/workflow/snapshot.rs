//! Serializable view of an instance for the presentation layer.

use super::{StageRuntimeState, WorkflowInstance};
use crate::core::{ArtifactRef, CompletionMode, StageStatus, TaskState};
use crate::utils::format_timestamp;
use serde::{Deserialize, Serialize};

/// One stage as rendered by a progress indicator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSnapshot {
    /// Stage id.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Optional longer description.
    pub description: Option<String>,
    /// Position in the workflow.
    pub index: usize,
    /// Lifecycle status.
    pub status: StageStatus,
    /// Manual or async completion.
    pub completion: CompletionMode,
    /// Sub-progress in percent.
    pub progress_percent: u8,
    /// True for the current stage.
    pub is_current: bool,
    /// True if the completion predicate holds.
    pub is_complete: bool,
    /// True if a jump to this stage would be accepted.
    pub can_jump: bool,
    /// Required fields still empty.
    pub missing_fields: Vec<String>,
    /// State of the latest async task.
    pub task_state: TaskState,
    /// Summary of the latest async task.
    pub last_summary: Option<String>,
    /// Attached artifacts.
    pub artifacts: Vec<ArtifactRef>,
}

/// Point-in-time copy of a workflow instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSnapshot {
    /// Instance id.
    pub id: String,
    /// Workflow name.
    pub name: String,
    /// Index of the current stage.
    pub current_stage_index: usize,
    /// Id of the current stage.
    pub current_stage_id: String,
    /// Overall progress in percent.
    pub overall_progress: f64,
    /// True once the last stage was finished.
    pub finished: bool,
    /// Creation time (RFC 3339).
    pub created_at: String,
    /// Every stage, in order.
    pub stages: Vec<StageSnapshot>,
}

impl WorkflowSnapshot {
    /// Returns the snapshot of a stage by id.
    #[must_use]
    pub fn stage(&self, stage_id: &str) -> Option<&StageSnapshot> {
        self.stages.iter().find(|s| s.id == stage_id)
    }

    /// Renders the snapshot as JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl WorkflowInstance {
    /// Captures the current state.
    #[must_use]
    pub fn snapshot(&self) -> WorkflowSnapshot {
        let stages = self
            .stages
            .iter()
            .zip(&self.runtime)
            .map(|(stage, state)| self.stage_snapshot(stage.index, state))
            .collect();

        WorkflowSnapshot {
            id: self.id().to_string(),
            name: self.name().to_string(),
            current_stage_index: self.current,
            current_stage_id: self.current_stage().id.clone(),
            overall_progress: self.overall_progress(),
            finished: self.finished,
            created_at: format_timestamp(&self.created_at()),
            stages,
        }
    }

    fn stage_snapshot(&self, index: usize, state: &StageRuntimeState) -> StageSnapshot {
        let stage = &self.stages[index];
        StageSnapshot {
            id: stage.id.clone(),
            title: stage.title.clone(),
            description: stage.description.clone(),
            index,
            status: state.status,
            completion: stage.completion,
            progress_percent: state.progress_percent,
            is_current: index == self.current,
            is_complete: self.completion_gap(index).is_none(),
            can_jump: self.can_jump_to(index),
            missing_fields: self.missing_fields_at(index),
            task_state: state.task_state,
            last_summary: state.last_summary.clone(),
            artifacts: state.artifacts.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::stages::presets;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_snapshot_of_fresh_wizard() {
        let wf = presets::permit_wizard().build().unwrap();
        let snap = wf.snapshot();

        assert_eq!(snap.current_stage_id, "project-info");
        assert_eq!(snap.stages.len(), 4);
        assert!(snap.stages[0].is_current);
        assert!(snap.stages[0].can_jump);
        assert!(!snap.stages[2].can_jump);
        assert_eq!(
            snap.stage("project-info").unwrap().missing_fields,
            vec!["focus_area".to_string(), "project_name".to_string()]
        );
    }

    #[test]
    fn test_snapshot_tracks_fields() {
        let mut wf = presets::permit_wizard().build().unwrap();
        wf.set_field("project-info", presets::PROJECT_NAME, json!("Harbor Bridge"))
            .unwrap();
        wf.set_field("project-info", presets::FOCUS_AREA, json!("structural"))
            .unwrap();

        let snap = wf.snapshot();
        assert!(snap.stages[0].is_complete);
        assert!(snap.stages[0].missing_fields.is_empty());
    }

    #[test]
    fn test_snapshot_json_uses_snake_case_status() {
        let wf = presets::analysis_wizard().build().unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&wf.snapshot().to_json().unwrap()).unwrap();

        assert_eq!(value["stages"][0]["status"], json!("in_progress"));
        assert_eq!(value["stages"][1]["status"], json!("not_started"));
        assert_eq!(value["stages"][2]["completion"], json!("async"));
    }
}
