//! User intents sent from the presentation layer.

use crate::core::ArtifactRef;
use crate::workflow::{FieldValue, TaskHandle};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A request to change workflow state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum WorkflowIntent {
    /// Set a field on the current stage.
    SetField {
        stage_id: String,
        key: String,
        value: FieldValue,
    },
    /// Remove a field from the current stage.
    ClearField {
        stage_id: String,
        key: String,
    },
    /// Report sub-progress for a stage.
    SetProgress {
        stage_id: String,
        percent: f64,
    },
    /// Attach an already stored artifact to the current stage.
    AttachArtifact {
        stage_id: String,
        artifact: ArtifactRef,
    },
    /// Complete the current stage and move on.
    Advance,
    /// Go back one stage.
    Retreat,
    /// Jump to a stage by index.
    JumpTo {
        target: usize,
    },
    /// Complete the last stage.
    Finish,
    /// Start the async step of the current stage.
    StartAsync {
        stage_id: String,
    },
    /// Cancel a running async step.
    CancelAsync {
        task_id: Uuid,
    },
}

impl WorkflowIntent {
    /// Creates a set-field intent.
    #[must_use]
    pub fn set_field(
        stage_id: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<FieldValue>,
    ) -> Self {
        Self::SetField {
            stage_id: stage_id.into(),
            key: key.into(),
            value: value.into(),
        }
    }

    /// Creates a start-async intent.
    #[must_use]
    pub fn start_async(stage_id: impl Into<String>) -> Self {
        Self::StartAsync {
            stage_id: stage_id.into(),
        }
    }

    /// Returns the snake_case name of the intent.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SetField { .. } => "set_field",
            Self::ClearField { .. } => "clear_field",
            Self::SetProgress { .. } => "set_progress",
            Self::AttachArtifact { .. } => "attach_artifact",
            Self::Advance => "advance",
            Self::Retreat => "retreat",
            Self::JumpTo { .. } => "jump_to",
            Self::Finish => "finish",
            Self::StartAsync { .. } => "start_async",
            Self::CancelAsync { .. } => "cancel_async",
        }
    }
}

/// What an accepted intent did.
#[derive(Debug, Clone)]
pub enum IntentOutcome {
    /// A field or artifact of a stage changed.
    StageUpdated { stage_id: String },
    /// Sub-progress was recorded, after clamping.
    ProgressRecorded { stage_id: String, percent: u8 },
    /// The current stage changed (or stayed, for a jump to itself).
    Navigated { from: usize, to: usize },
    /// The workflow was finished.
    Finished,
    /// A background task was spawned.
    TaskStarted(TaskHandle),
    /// A cancel was requested; `cancelled` is false if the task was already terminal.
    TaskCancelled { task_id: Uuid, cancelled: bool },
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_deserialize_tagged_intents() {
        let jump: WorkflowIntent = serde_json::from_value(json!({"intent": "jump_to", "target": 2})).unwrap();
        assert_eq!(jump, WorkflowIntent::JumpTo { target: 2 });

        let advance: WorkflowIntent = serde_json::from_value(json!({"intent": "advance"})).unwrap();
        assert_eq!(advance, WorkflowIntent::Advance);

        let field: WorkflowIntent = serde_json::from_value(json!({
            "intent": "set_field",
            "stage_id": "project-info",
            "key": "project_name",
            "value": "Harbor Bridge"
        }))
        .unwrap();
        assert_eq!(field, WorkflowIntent::set_field("project-info", "project_name", "Harbor Bridge"));
    }

    #[test]
    fn test_unknown_intent_rejected() {
        let result: Result<WorkflowIntent, _> = serde_json::from_value(json!({"intent": "skip"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_kind() {
        assert_eq!(WorkflowIntent::Advance.kind(), "advance");
        assert_eq!(WorkflowIntent::start_async("analysis").kind(), "start_async");
    }
}
