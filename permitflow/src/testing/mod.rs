//! Testing utilities for permitflow workflows.
//!
//! This module provides:
//! - Workflow fixtures
//! - Scripted collaborators with deterministic completion
//! - Invariant and state assertions

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{
    assert_current_stage, assert_invariants, assert_progress, assert_stage_status,
};
pub use fixtures::{complete_stages, TestWorkflow, LINEAR_FIELD};
pub use mocks::{FailingArtifactStore, ScriptedAnalysisProvider};
