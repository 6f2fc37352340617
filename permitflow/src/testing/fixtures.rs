//! Workflow fixtures.

use crate::stages::{define_stages, StageDef};
use crate::workflow::{ProgressMode, WorkflowInstance};

/// Field required by every stage of a [`TestWorkflow::linear`] workflow.
pub const LINEAR_FIELD: &str = "value";

/// A test workflow builder.
#[derive(Debug, Clone)]
pub struct TestWorkflow {
    /// Workflow name.
    pub name: String,
    /// Stage definitions in order.
    pub stages: Vec<StageDef>,
    /// Progress mode.
    pub progress_mode: ProgressMode,
}

impl TestWorkflow {
    /// Creates an empty test workflow.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
            progress_mode: ProgressMode::Discrete,
        }
    }

    /// Creates a workflow of `count` manual stages named `stage_{i}`, each
    /// requiring [`LINEAR_FIELD`].
    #[must_use]
    pub fn linear(count: usize) -> Self {
        let mut workflow = Self::new("linear");
        for i in 0..count {
            workflow.stages.push(
                StageDef::new(format!("stage_{i}"), format!("Stage {i}")).require([LINEAR_FIELD]),
            );
        }
        workflow
    }

    /// Adds a stage.
    #[must_use]
    pub fn with_stage(mut self, stage: StageDef) -> Self {
        self.stages.push(stage);
        self
    }

    /// Sets the progress mode.
    #[must_use]
    pub fn with_progress_mode(mut self, mode: ProgressMode) -> Self {
        self.progress_mode = mode;
        self
    }

    /// Builds the instance.
    ///
    /// # Panics
    ///
    /// Panics if the stage list is invalid.
    #[must_use]
    pub fn build(self) -> WorkflowInstance {
        let name = self.name.clone();
        define_stages(self.stages)
            .and_then(|stages| WorkflowInstance::initialize(self.name, stages, self.progress_mode))
            .unwrap_or_else(|e| panic!("invalid test workflow '{name}': {e}"))
    }
}

/// Fills [`LINEAR_FIELD`] and advances `count` times from the current stage.
///
/// # Panics
///
/// Panics if an advance is rejected.
pub fn complete_stages(workflow: &mut WorkflowInstance, count: usize) {
    for _ in 0..count {
        let stage_id = workflow.current_stage().id.clone();
        workflow
            .set_field(&stage_id, LINEAR_FIELD, "done")
            .unwrap_or_else(|e| panic!("set_field on '{stage_id}' failed: {e}"));
        workflow
            .advance()
            .unwrap_or_else(|e| panic!("advance from '{stage_id}' failed: {e}"));
    }
}
