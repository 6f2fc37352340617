//! Core domain model types for permitflow.
//!
//! This module contains the fundamental types used throughout the engine:
//! - Stage status, task state and completion mode enums
//! - Artifact references
//! - Workflow events

mod artifact;
mod event;
mod status;

pub use artifact::{guess_mime_type, ArtifactRef, ArtifactUpload};
pub use event::WorkflowEvent;
pub use status::{CompletionMode, StageStatus, TaskState};
