//! Overall progress derivation.

use super::WorkflowInstance;
use crate::utils::round_to;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Decimal places kept by [`WorkflowInstance::overall_progress`].
pub const PROGRESS_DECIMALS: u32 = 2;

/// How overall progress is derived from stage state.
///
/// Chosen when the instance is created and never changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProgressMode {
    /// `100 * current_index / (stages - 1)`, as shown by step wizards.
    #[default]
    Discrete,
    /// Mean of every stage's `progress_percent`.
    Continuous,
    /// Completed stages over total stages.
    CompletedRatio,
}

impl fmt::Display for ProgressMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Discrete => write!(f, "discrete"),
            Self::Continuous => write!(f, "continuous"),
            Self::CompletedRatio => write!(f, "completed_ratio"),
        }
    }
}

impl WorkflowInstance {
    /// Returns overall progress in `[0, 100]`, rounded half away from zero
    /// to two decimals.
    ///
    /// A single-stage workflow in discrete mode reports 0 until finished.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn overall_progress(&self) -> f64 {
        let len = self.stages.len();
        let raw = match self.progress_mode() {
            ProgressMode::Discrete => {
                if len == 1 {
                    if self.finished { 100.0 } else { 0.0 }
                } else {
                    100.0 * self.current as f64 / (len - 1) as f64
                }
            }
            ProgressMode::Continuous => {
                let sum: f64 = self
                    .runtime
                    .iter()
                    .map(|s| f64::from(s.progress_percent))
                    .sum();
                sum / len as f64
            }
            ProgressMode::CompletedRatio => 100.0 * self.completed.len() as f64 / len as f64,
        };
        round_to(raw.clamp(0.0, 100.0), PROGRESS_DECIMALS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestWorkflow;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_discrete_progress() {
        let mut wf = TestWorkflow::linear(4).build();
        assert_close(wf.overall_progress(), 0.0);

        wf.set_field("stage_0", "value", "x").unwrap();
        wf.advance().unwrap();
        assert_close(wf.overall_progress(), 33.33);

        wf.set_field("stage_1", "value", "x").unwrap();
        wf.advance().unwrap();
        assert_close(wf.overall_progress(), 66.67);

        wf.retreat().unwrap();
        assert_close(wf.overall_progress(), 33.33);
    }

    #[test]
    fn test_discrete_single_stage() {
        let mut wf = TestWorkflow::linear(1).build();
        assert_close(wf.overall_progress(), 0.0);

        wf.set_field("stage_0", "value", "x").unwrap();
        wf.finish().unwrap();
        assert_close(wf.overall_progress(), 100.0);
    }

    #[test]
    fn test_continuous_progress_is_mean() {
        let mut wf = TestWorkflow::linear(3)
            .with_progress_mode(ProgressMode::Continuous)
            .build();
        wf.set_progress("stage_0", 100.0).unwrap();
        wf.set_progress("stage_1", 50.0).unwrap();

        assert_close(wf.overall_progress(), 50.0);

        wf.set_progress("stage_2", 1.0).unwrap();
        assert_close(wf.overall_progress(), 50.33);
    }

    #[test]
    fn test_completed_ratio_progress() {
        let mut wf = TestWorkflow::linear(5)
            .with_progress_mode(ProgressMode::CompletedRatio)
            .build();
        for i in 0..3 {
            wf.set_field(&format!("stage_{i}"), "value", "x").unwrap();
            wf.advance().unwrap();
        }

        assert_close(wf.overall_progress(), 60.0);
    }

    #[test]
    fn test_progress_mode_serialize() {
        let json = serde_json::to_string(&ProgressMode::CompletedRatio).unwrap();
        assert_eq!(json, r#""completed_ratio""#);
        assert_eq!(ProgressMode::Continuous.to_string(), "continuous");
    }
}
