//! Narrow interfaces to the collaborators around the engine.
//!
//! The engine stores artifact references and task outcomes; it never looks at
//! file contents or analysis internals.

use crate::core::{ArtifactRef, ArtifactUpload};
use crate::errors::WorkflowError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Stores uploaded files and hands back their metadata.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Stores the upload and returns its reference.
    async fn upload(&self, upload: ArtifactUpload) -> Result<ArtifactRef, WorkflowError>;
}

/// What an analysis collaborator sees of a stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// Workflow name.
    pub workflow: String,
    /// Stage id.
    pub stage_id: String,
    /// Stage title.
    pub title: String,
    /// Field values of the stage.
    pub fields: BTreeMap<String, serde_json::Value>,
    /// Artifacts attached to the stage.
    pub artifacts: Vec<ArtifactRef>,
}

/// Result reported by an analysis collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    /// Whether the analysis passed.
    pub success: bool,
    /// Human-readable summary.
    pub summary: String,
}

impl AnalysisOutcome {
    /// Creates a successful outcome.
    #[must_use]
    pub fn succeeded(summary: impl Into<String>) -> Self {
        Self {
            success: true,
            summary: summary.into(),
        }
    }

    /// Creates a failed outcome.
    #[must_use]
    pub fn failed(summary: impl Into<String>) -> Self {
        Self {
            success: false,
            summary: summary.into(),
        }
    }
}

/// Runs the background work behind an async stage.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    /// Runs the analysis for a stage.
    async fn run_analysis(&self, request: AnalysisRequest) -> AnalysisOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_analysis_provider() {
        let mut provider = MockAnalysisProvider::new();
        provider
            .expect_run_analysis()
            .withf(|req| req.stage_id == "ai-analysis")
            .times(1)
            .returning(|_| AnalysisOutcome::succeeded("no violations"));

        let outcome = provider
            .run_analysis(AnalysisRequest {
                workflow: "permit-wizard".to_string(),
                stage_id: "ai-analysis".to_string(),
                title: "AI Analysis".to_string(),
                fields: BTreeMap::new(),
                artifacts: Vec::new(),
            })
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.summary, "no violations");
    }

    #[tokio::test]
    async fn test_mock_artifact_store() {
        let mut store = MockArtifactStore::new();
        store
            .expect_upload()
            .returning(|upload| Ok(ArtifactRef::new(upload.name, upload.bytes.len() as u64)));

        let artifact = store
            .upload(ArtifactUpload::new("plan.pdf", vec![1, 2, 3]))
            .await
            .unwrap();

        assert_eq!(artifact.size_bytes, 3);
    }
}
