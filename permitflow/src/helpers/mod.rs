//! Ready-made collaborators for running workflows without a backend.

pub mod memory;
pub mod providers;

pub use memory::{content_digest, InMemoryArtifactStore};
pub use providers::SimulatedAnalysisProvider;
