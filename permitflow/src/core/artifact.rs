//! Artifact references tracked by a workflow.

use crate::utils::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Metadata for an uploaded file.
///
/// The engine stores these references but never reads the file contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    /// The file name as uploaded.
    pub name: String,

    /// Content type guessed from the name or supplied by the uploader.
    pub mime_type_hint: Option<String>,

    /// Size of the upload in bytes.
    pub size_bytes: u64,

    /// When the upload was accepted.
    pub uploaded_at: Timestamp,

    /// Hex-encoded SHA-256 digest, when the store computed one.
    #[serde(default)]
    pub digest: Option<String>,
}

impl ArtifactRef {
    /// Creates a new reference stamped with the current time.
    #[must_use]
    pub fn new(name: impl Into<String>, size_bytes: u64) -> Self {
        let name = name.into();
        Self {
            mime_type_hint: guess_mime_type(&name).map(str::to_string),
            name,
            size_bytes,
            uploaded_at: crate::utils::now_utc(),
            digest: None,
        }
    }

    /// Overrides the content type hint.
    #[must_use]
    pub fn with_mime_type(mut self, mime: impl Into<String>) -> Self {
        self.mime_type_hint = Some(mime.into());
        self
    }

    /// Sets the content digest.
    #[must_use]
    pub fn with_digest(mut self, digest: impl Into<String>) -> Self {
        self.digest = Some(digest.into());
        self
    }

    /// Returns the lower-cased file extension, if any.
    #[must_use]
    pub fn extension(&self) -> Option<String> {
        self.name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
    }

    /// Converts the reference to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("name".to_string(), serde_json::json!(self.name));
        map.insert("size_bytes".to_string(), serde_json::json!(self.size_bytes));
        map.insert(
            "uploaded_at".to_string(),
            serde_json::json!(crate::utils::format_timestamp(&self.uploaded_at)),
        );
        if let Some(ref mime) = self.mime_type_hint {
            map.insert("mime_type_hint".to_string(), serde_json::json!(mime));
        }
        if let Some(ref digest) = self.digest {
            map.insert("digest".to_string(), serde_json::json!(digest));
        }
        map
    }
}

/// Raw file handed to an artifact store.
#[derive(Debug, Clone)]
pub struct ArtifactUpload {
    /// The file name.
    pub name: String,
    /// Optional content type supplied by the client.
    pub mime_type: Option<String>,
    /// The file bytes.
    pub bytes: Vec<u8>,
}

impl ArtifactUpload {
    /// Creates a new upload.
    #[must_use]
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: None,
            bytes,
        }
    }

    /// Sets the client-supplied content type.
    #[must_use]
    pub fn with_mime_type(mut self, mime: impl Into<String>) -> Self {
        self.mime_type = Some(mime.into());
        self
    }
}

/// Guesses a content type from the file extension.
#[must_use]
pub fn guess_mime_type(name: &str) -> Option<&'static str> {
    let ext = name.rsplit_once('.')?.1.to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => Some("application/pdf"),
        "las" => Some("application/vnd.las"),
        "laz" => Some("application/vnd.laszip"),
        "dwg" => Some("image/vnd.dwg"),
        "dxf" => Some("image/vnd.dxf"),
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "docx" => Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
        "xlsx" => Some("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
        _ => None,
    }
}
