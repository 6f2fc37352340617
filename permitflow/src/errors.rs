//! Error types for the permitflow engine.
//!
//! Every error is scoped to a single call on a single workflow instance. A
//! rejected call never leaves a partially mutated instance behind.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// The main error type for permitflow operations.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Stage definitions were malformed.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// A stage lookup or edit was rejected.
    #[error("{0}")]
    StageAccess(#[from] StageAccessError),

    /// A navigation request was rejected.
    #[error("{0}")]
    Transition(#[from] TransitionError),

    /// An async step request was rejected.
    #[error("{0}")]
    AsyncStep(#[from] AsyncStepError),

    /// A status string could not be parsed.
    #[error("{0}")]
    UnknownStatus(#[from] UnknownStatusError),

    /// No workflow is registered under the given id.
    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),

    /// The artifact store rejected an upload.
    #[error("Upload failed: {0}")]
    Upload(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Diagnostic metadata attached to configuration errors.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ErrorInfo {
    /// Error code (e.g., "CONFIG-002-DUPLICATE").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ErrorInfo {
    /// Creates new error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Fills the fix hint from [`ErrorSuggestions`] for this code, if one exists.
    #[must_use]
    pub fn with_suggested_fix(mut self) -> Self {
        if let Some(hint) = ErrorSuggestions::get(&self.code) {
            self.fix_hint = Some(hint.to_string());
        }
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("code".to_string(), serde_json::json!(self.code));
        map.insert("summary".to_string(), serde_json::json!(self.summary));
        if let Some(ref hint) = self.fix_hint {
            map.insert("fix_hint".to_string(), serde_json::json!(hint));
        }
        if !self.context.is_empty() {
            map.insert("context".to_string(), serde_json::json!(self.context));
        }
        map
    }
}

/// Raised when a stage list cannot be turned into a workflow.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ConfigError {
    /// The error message.
    pub message: String,
    /// The stage ids involved in the error.
    pub stages: Vec<String>,
    /// Optional diagnostic info.
    pub error_info: Option<ErrorInfo>,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stages: Vec::new(),
            error_info: None,
        }
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }

    /// Sets the diagnostic info.
    #[must_use]
    pub fn with_error_info(mut self, info: ErrorInfo) -> Self {
        self.error_info = Some(info);
        self
    }

    /// Error for an empty stage list.
    #[must_use]
    pub fn empty() -> Self {
        Self::new("Workflow has no stages").with_error_info(
            ErrorInfo::new("CONFIG-001-EMPTY", "Cannot define a workflow without stages")
                .with_suggested_fix(),
        )
    }

    /// Error for a stage id that appears more than once.
    #[must_use]
    pub fn duplicate(stage_id: &str) -> Self {
        Self::new(format!("Duplicate stage id '{stage_id}'"))
            .with_stages(vec![stage_id.to_string()])
            .with_error_info(
                ErrorInfo::new(
                    "CONFIG-002-DUPLICATE",
                    format!("Stage id '{stage_id}' is defined more than once"),
                )
                .with_suggested_fix(),
            )
    }

    /// Error for an artifact filter that does not compile.
    #[must_use]
    pub fn invalid_pattern(stage_id: &str, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::new(format!("Stage '{stage_id}' has an invalid artifact pattern: {reason}"))
            .with_stages(vec![stage_id.to_string()])
            .with_error_info(
                ErrorInfo::new("CONFIG-003-PATTERN", "Artifact pattern is not a valid regex")
                    .with_suggested_fix()
                    .with_context_entry("reason", reason),
            )
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("message".to_string(), serde_json::json!(self.message));
        map.insert("stages".to_string(), serde_json::json!(self.stages));
        if let Some(ref info) = self.error_info {
            let info_map: serde_json::Map<String, serde_json::Value> =
                info.to_dict().into_iter().collect();
            map.insert("error_info".to_string(), serde_json::Value::Object(info_map));
        }
        map
    }
}

/// Caller misuse when reading or editing stage state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageAccessError {
    /// The stage id is not part of the workflow.
    #[error("Unknown stage: {stage_id}")]
    UnknownStage {
        /// The requested stage id.
        stage_id: String,
    },

    /// Only the current stage accepts edits.
    #[error("Stage '{stage_id}' is not active (current stage is '{active_stage_id}')")]
    InactiveStage {
        /// The requested stage id.
        stage_id: String,
        /// The stage that currently accepts edits.
        active_stage_id: String,
    },

    /// The artifact name does not match the stage's accepted pattern.
    #[error("Artifact '{artifact}' is not accepted by stage '{stage_id}'")]
    ArtifactRejected {
        /// The stage id.
        stage_id: String,
        /// The rejected artifact name.
        artifact: String,
    },
}

impl StageAccessError {
    /// Creates an unknown stage error.
    #[must_use]
    pub fn unknown(stage_id: impl Into<String>) -> Self {
        Self::UnknownStage {
            stage_id: stage_id.into(),
        }
    }

    /// Creates an inactive stage error.
    #[must_use]
    pub fn inactive(stage_id: impl Into<String>, active_stage_id: impl Into<String>) -> Self {
        Self::InactiveStage {
            stage_id: stage_id.into(),
            active_stage_id: active_stage_id.into(),
        }
    }
}

/// Expected, user-facing reasons a navigation request is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// The current stage's completion predicate does not hold.
    #[error("Stage '{stage_id}' is incomplete")]
    StageIncomplete {
        /// The current stage id.
        stage_id: String,
        /// Required fields that are still empty.
        missing_fields: Vec<String>,
        /// Whether an async step still has to succeed.
        awaiting_async: bool,
    },

    /// There is no stage after the current one.
    #[error("Already at the last stage '{stage_id}'")]
    AtLastStage {
        /// The final stage id.
        stage_id: String,
    },

    /// There is no stage before the current one.
    #[error("Already at the first stage")]
    AtFirstStage,

    /// A forward jump skips an incomplete stage.
    #[error("Stage {target} is locked until stage {first_incomplete} is completed")]
    LockedStage {
        /// The requested index.
        target: usize,
        /// The first stage that is not completed.
        first_incomplete: usize,
    },

    /// Only the final stage can finish the workflow.
    #[error("Cannot finish from stage '{stage_id}': it is not the last stage")]
    NotAtLastStage {
        /// The current stage id.
        stage_id: String,
    },

    /// The index does not exist.
    #[error("Stage index {target} is out of range (workflow has {len} stages)")]
    OutOfRange {
        /// The requested index.
        target: usize,
        /// Number of stages.
        len: usize,
    },
}

impl TransitionError {
    /// Returns a short machine-readable kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StageIncomplete { .. } => "StageIncomplete",
            Self::AtLastStage { .. } => "AtLastStage",
            Self::AtFirstStage => "AtFirstStage",
            Self::NotAtLastStage { .. } => "NotAtLastStage",
            Self::LockedStage { .. } => "LockedStage",
            Self::OutOfRange { .. } => "OutOfRange",
        }
    }

    /// Converts to a dictionary representation for UI guidance.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("type".to_string(), serde_json::json!(self.kind()));

        match self {
            Self::StageIncomplete {
                stage_id,
                missing_fields,
                awaiting_async,
            } => {
                map.insert("stage_id".to_string(), serde_json::json!(stage_id));
                map.insert("missing_fields".to_string(), serde_json::json!(missing_fields));
                map.insert("awaiting_async".to_string(), serde_json::json!(awaiting_async));
            }
            Self::AtLastStage { stage_id } | Self::NotAtLastStage { stage_id } => {
                map.insert("stage_id".to_string(), serde_json::json!(stage_id));
            }
            Self::AtFirstStage => {}
            Self::LockedStage {
                target,
                first_incomplete,
            } => {
                map.insert("target".to_string(), serde_json::json!(target));
                map.insert("first_incomplete".to_string(), serde_json::json!(first_incomplete));
            }
            Self::OutOfRange { target, len } => {
                map.insert("target".to_string(), serde_json::json!(target));
                map.insert("len".to_string(), serde_json::json!(len));
            }
        }

        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        map
    }
}

/// Rejections from the async step controller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AsyncStepError {
    /// A task for the stage is already running.
    #[error("Async step for stage '{stage_id}' is already running")]
    AlreadyRunning {
        /// The stage id.
        stage_id: String,
    },

    /// The stage is completed by user input, not by a background task.
    #[error("Stage '{stage_id}' does not have an async step")]
    NotAsync {
        /// The stage id.
        stage_id: String,
    },

    /// Async steps can only be started on the current stage.
    #[error("Stage '{stage_id}' is not active (current stage is '{active_stage_id}')")]
    InactiveStage {
        /// The requested stage id.
        stage_id: String,
        /// The current stage id.
        active_stage_id: String,
    },

    /// The stage id is not part of the workflow.
    #[error("Unknown stage: {stage_id}")]
    UnknownStage {
        /// The stage id.
        stage_id: String,
    },
}

/// Raised when a status string has no matching variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown status value '{value}'")]
pub struct UnknownStatusError {
    /// The unrecognised input.
    pub value: String,
}

impl UnknownStatusError {
    /// Creates a new unknown status error.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self { value: value.into() }
    }
}

/// Fix suggestions for configuration error codes.
pub struct ErrorSuggestions;

impl ErrorSuggestions {
    /// Gets a suggestion for a given error code.
    #[must_use]
    pub fn get(code: &str) -> Option<&'static str> {
        match code {
            "CONFIG-001-EMPTY" => Some(
                "A workflow needs at least one stage. Use one of the presets \
                 if you do not need a custom sequence.",
            ),
            "CONFIG-002-DUPLICATE" => Some(
                "Stage ids address runtime state and must be unique. \
                 Check for copy-pasted stage definitions.",
            ),
            "CONFIG-003-PATTERN" => Some(
                "Artifact patterns are regular expressions matched against the file name, \
                 e.g. (?i)\\.(las|laz)$.",
            ),
            _ => None,
        }
    }
}
