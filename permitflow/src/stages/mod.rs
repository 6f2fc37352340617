//! Stage definitions, presets and collaborator ports.
//!
//! Stages are the ordered steps of a workflow. They are validated once with
//! [`define_stages`] and never change afterwards.

mod descriptor;
pub mod ports;
pub mod presets;

pub use descriptor::{define_stages, StageDef, StageDescriptor};
pub use ports::{AnalysisOutcome, AnalysisProvider, AnalysisRequest, ArtifactStore};
