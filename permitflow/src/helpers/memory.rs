//! In-memory artifact store.

use crate::core::{ArtifactRef, ArtifactUpload};
use crate::errors::WorkflowError;
use crate::stages::ArtifactStore;
use async_trait::async_trait;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use tracing::debug;

/// Keeps uploaded bytes in memory, keyed by file name.
///
/// Re-uploading a name replaces the earlier content.
#[derive(Debug, Default)]
pub struct InMemoryArtifactStore {
    files: DashMap<String, Vec<u8>>,
}

impl InMemoryArtifactStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stored bytes for a name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.files.get(name).map(|entry| entry.value().clone())
    }

    /// Returns the number of stored files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns true if nothing was uploaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Hex SHA-256 of the content.
#[must_use]
pub fn content_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn upload(&self, upload: ArtifactUpload) -> Result<ArtifactRef, WorkflowError> {
        if upload.name.trim().is_empty() {
            return Err(WorkflowError::Upload("artifact name is empty".to_string()));
        }

        let size = u64::try_from(upload.bytes.len())
            .map_err(|_| WorkflowError::Upload(format!("'{}' is too large", upload.name)))?;
        let mut artifact =
            ArtifactRef::new(upload.name.clone(), size).with_digest(content_digest(&upload.bytes));
        if let Some(mime) = upload.mime_type {
            artifact = artifact.with_mime_type(mime);
        }

        debug!(artifact = %upload.name, size, "Artifact stored");
        self.files.insert(upload.name, upload.bytes);
        Ok(artifact)
    }
}
