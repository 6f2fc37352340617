//! Test assertions for workflow instances.

use crate::core::StageStatus;
use crate::workflow::WorkflowInstance;

/// Asserts the structural invariants that hold after every operation.
pub fn assert_invariants(workflow: &WorkflowInstance) {
    let current = workflow.current_stage_index();
    assert!(
        current < workflow.len(),
        "current index {current} out of range for {} stages",
        workflow.len()
    );

    for &index in workflow.completed_stage_indices() {
        assert!(index < workflow.len(), "completed index {index} out of range");
        let stage = &workflow.stages()[index];
        let status = workflow.runtime_state(&stage.id).map(|s| s.status);
        assert_eq!(
            status,
            Ok(StageStatus::Completed),
            "stage '{}' is recorded complete but has status {status:?}",
            stage.id
        );
    }

    let current_id = &workflow.current_stage().id;
    assert_ne!(
        workflow.runtime_state(current_id).map(|s| s.status),
        Ok(StageStatus::NotStarted),
        "current stage '{current_id}' was never started"
    );

    if workflow.is_finished() {
        assert_eq!(
            workflow.completed_stage_indices().len(),
            workflow.len(),
            "finished workflow has incomplete stages"
        );
    }
}

/// Asserts the id of the current stage.
pub fn assert_current_stage(workflow: &WorkflowInstance, expected: &str) {
    assert_eq!(
        workflow.current_stage().id,
        expected,
        "Expected current stage '{expected}', got '{}'",
        workflow.current_stage().id
    );
}

/// Asserts the status of a stage.
pub fn assert_stage_status(workflow: &WorkflowInstance, stage_id: &str, expected: StageStatus) {
    let actual = workflow.runtime_state(stage_id).map(|s| s.status);
    assert_eq!(
        actual,
        Ok(expected),
        "Expected stage '{stage_id}' to be {expected}, got {actual:?}"
    );
}

/// Asserts overall progress to within rounding precision.
pub fn assert_progress(workflow: &WorkflowInstance, expected: f64) {
    let actual = workflow.overall_progress();
    assert!(
        (actual - expected).abs() < 1e-9,
        "Expected progress {expected}, got {actual}"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{complete_stages, TestWorkflow};

    #[test]
    fn test_assertions_on_fresh_workflow() {
        let wf = TestWorkflow::linear(3).build();

        assert_invariants(&wf);
        assert_current_stage(&wf, "stage_0");
        assert_stage_status(&wf, "stage_0", StageStatus::InProgress);
        assert_stage_status(&wf, "stage_1", StageStatus::NotStarted);
        assert_progress(&wf, 0.0);
    }

    #[test]
    fn test_assertions_after_advances() {
        let mut wf = TestWorkflow::linear(3).build();
        complete_stages(&mut wf, 2);

        assert_invariants(&wf);
        assert_current_stage(&wf, "stage_2");
        assert_progress(&wf, 100.0);
    }

    #[test]
    #[should_panic(expected = "Expected current stage")]
    fn test_assert_current_stage_fails() {
        let wf = TestWorkflow::linear(2).build();
        assert_current_stage(&wf, "stage_1");
    }
}
