//! Forward, backward and jump navigation.
//!
//! Each operation checks all of its preconditions before touching state.

use super::WorkflowInstance;
use crate::core::StageStatus;
use crate::errors::TransitionError;
use tracing::{debug, info};

impl WorkflowInstance {
    /// Completes the current stage and moves to the next one.
    ///
    /// Returns the new current index.
    ///
    /// # Errors
    ///
    /// [`TransitionError::AtLastStage`] on the final stage,
    /// [`TransitionError::StageIncomplete`] if the current stage's predicate
    /// does not hold.
    pub fn advance(&mut self) -> Result<usize, TransitionError> {
        let from = self.current;
        if from + 1 >= self.stages.len() {
            return Err(TransitionError::AtLastStage {
                stage_id: self.stages[from].id.clone(),
            });
        }
        if let Some(gap) = self.completion_gap(from) {
            debug!(workflow = %self.name(), stage_id = %self.stages[from].id, "Advance rejected");
            return Err(gap);
        }

        self.mark_completed(from);

        let to = from + 1;
        let next = self.runtime_at_mut(to);
        if next.status == StageStatus::NotStarted {
            next.transition(StageStatus::InProgress);
        }
        self.current = to;

        info!(workflow = %self.name(), from, to, "Workflow advanced");
        Ok(to)
    }

    /// Moves back one stage without reverting any completion.
    ///
    /// # Errors
    ///
    /// [`TransitionError::AtFirstStage`] on stage 0.
    pub fn retreat(&mut self) -> Result<usize, TransitionError> {
        if self.current == 0 {
            return Err(TransitionError::AtFirstStage);
        }
        self.current -= 1;

        debug!(workflow = %self.name(), to = self.current, "Workflow retreated");
        Ok(self.current)
    }

    /// Returns true if [`jump_to`](Self::jump_to) would accept `target`.
    #[must_use]
    pub fn can_jump_to(&self, target: usize) -> bool {
        self.check_jump(target).is_ok()
    }

    fn check_jump(&self, target: usize) -> Result<(), TransitionError> {
        let len = self.stages.len();
        if target >= len {
            return Err(TransitionError::OutOfRange { target, len });
        }
        if target <= self.current {
            return Ok(());
        }
        match (0..target).find(|i| !self.completed.contains(i)) {
            Some(first_incomplete) => Err(TransitionError::LockedStage {
                target,
                first_incomplete,
            }),
            None => Ok(()),
        }
    }

    /// Jumps to any earlier stage, or forward across completed stages only.
    ///
    /// # Errors
    ///
    /// [`TransitionError::LockedStage`] if a stage before `target` is not
    /// completed, [`TransitionError::OutOfRange`] for a bad index.
    pub fn jump_to(&mut self, target: usize) -> Result<usize, TransitionError> {
        self.check_jump(target)?;

        let from = self.current;
        let state = self.runtime_at_mut(target);
        if state.status == StageStatus::NotStarted {
            state.transition(StageStatus::InProgress);
        }
        self.current = target;

        debug!(workflow = %self.name(), from, to = target, "Workflow jumped");
        Ok(target)
    }

    /// Completes the final stage.
    ///
    /// Calling it again after success is a no-op.
    ///
    /// # Errors
    ///
    /// [`TransitionError::NotAtLastStage`] before the final stage,
    /// [`TransitionError::StageIncomplete`] if its predicate does not hold.
    pub fn finish(&mut self) -> Result<(), TransitionError> {
        let last = self.stages.len() - 1;
        if self.current != last {
            return Err(TransitionError::NotAtLastStage {
                stage_id: self.stages[self.current].id.clone(),
            });
        }
        if self.finished {
            return Ok(());
        }
        if let Some(gap) = self.completion_gap(last) {
            return Err(gap);
        }

        self.mark_completed(last);
        self.finished = true;

        info!(workflow = %self.name(), "Workflow finished");
        Ok(())
    }

    fn mark_completed(&mut self, index: usize) {
        let state = self.runtime_at_mut(index);
        state.transition(StageStatus::Completed);
        state.progress_percent = 100;
        self.completed.insert(index);
    }
}

#[cfg(test)]
mod tests {
    use crate::core::StageStatus;
    use crate::errors::TransitionError;
    use crate::testing::TestWorkflow;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_advance_marks_completed_and_starts_next() {
        let mut wf = TestWorkflow::linear(3).build();
        wf.set_field("stage_0", "value", "x").unwrap();

        assert_eq!(wf.advance(), Ok(1));
        assert_eq!(wf.runtime_state("stage_0").unwrap().status, StageStatus::Completed);
        assert_eq!(wf.runtime_state("stage_0").unwrap().progress_percent, 100);
        assert_eq!(wf.runtime_state("stage_1").unwrap().status, StageStatus::InProgress);
        assert!(wf.completed_stage_indices().contains(&0));
    }

    #[test]
    fn test_advance_at_last_stage() {
        let mut wf = TestWorkflow::linear(1).build();
        wf.set_field("stage_0", "value", "x").unwrap();

        assert_eq!(
            wf.advance(),
            Err(TransitionError::AtLastStage {
                stage_id: "stage_0".to_string()
            })
        );
    }

    #[test]
    fn test_retreat_keeps_completion() {
        let mut wf = TestWorkflow::linear(3).build();
        wf.set_field("stage_0", "value", "x").unwrap();
        wf.advance().unwrap();

        assert_eq!(wf.retreat(), Ok(0));
        assert_eq!(wf.runtime_state("stage_0").unwrap().status, StageStatus::Completed);
        assert_eq!(wf.retreat(), Err(TransitionError::AtFirstStage));
    }

    #[test]
    fn test_edit_revisited_stage_blocks_readvance() {
        let mut wf = TestWorkflow::linear(3).build();
        wf.set_field("stage_0", "value", "x").unwrap();
        wf.advance().unwrap();
        wf.retreat().unwrap();

        wf.set_field("stage_0", "value", "").unwrap();
        assert!(matches!(wf.advance(), Err(TransitionError::StageIncomplete { .. })));
        assert_eq!(wf.current_stage_index(), 0);
        assert_eq!(wf.runtime_state("stage_0").unwrap().status, StageStatus::Completed);
    }

    #[test]
    fn test_jump_out_of_range() {
        let mut wf = TestWorkflow::linear(2).build();
        assert_eq!(wf.jump_to(5), Err(TransitionError::OutOfRange { target: 5, len: 2 }));
    }

    #[test]
    fn test_jump_forward_across_completed() {
        let mut wf = TestWorkflow::linear(4).build();
        for i in 0..2 {
            wf.set_field(&format!("stage_{i}"), "value", "x").unwrap();
            wf.advance().unwrap();
        }
        wf.jump_to(0).unwrap();

        assert!(wf.can_jump_to(2));
        assert!(!wf.can_jump_to(3));
        assert_eq!(wf.jump_to(2), Ok(2));
        assert_eq!(
            wf.jump_to(3),
            Err(TransitionError::LockedStage {
                target: 3,
                first_incomplete: 2
            })
        );
    }

    #[test]
    fn test_finish() {
        let mut wf = TestWorkflow::linear(2).build();
        assert!(matches!(wf.finish(), Err(TransitionError::NotAtLastStage { .. })));

        wf.set_field("stage_0", "value", "x").unwrap();
        wf.advance().unwrap();
        assert!(matches!(wf.finish(), Err(TransitionError::StageIncomplete { .. })));

        wf.set_field("stage_1", "value", "x").unwrap();
        assert_eq!(wf.finish(), Ok(()));
        assert!(wf.is_finished());
        assert_eq!(wf.completed_stage_indices().len(), 2);
        assert_eq!(wf.finish(), Ok(()));
    }
}
