//! Stage definitions and validation.

use crate::core::CompletionMode;
use crate::errors::ConfigError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// User-supplied definition of a single stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDef {
    /// Unique id of the stage.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Optional longer description.
    #[serde(default)]
    pub description: Option<String>,
    /// Field keys that must hold a non-empty value.
    #[serde(default)]
    pub required_fields: BTreeSet<String>,
    /// Whether a background task gates completion.
    #[serde(default)]
    pub completion: CompletionMode,
    /// Advance automatically when the background task succeeds.
    #[serde(default)]
    pub auto_advance: bool,
    /// Minimum number of attached artifacts.
    #[serde(default)]
    pub min_artifacts: usize,
    /// Regex matched against artifact file names.
    #[serde(default)]
    pub accepted_artifacts: Option<String>,
}

impl StageDef {
    /// Creates a new manual stage definition without requirements.
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            required_fields: BTreeSet::new(),
            completion: CompletionMode::Manual,
            auto_advance: false,
            min_artifacts: 0,
            accepted_artifacts: None,
        }
    }

    /// Adds required field keys.
    #[must_use]
    pub fn require(mut self, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.required_fields.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Marks the stage as completed by a background task.
    #[must_use]
    pub fn async_completion(mut self) -> Self {
        self.completion = CompletionMode::Async;
        self
    }

    /// Advances the workflow once the background task succeeds.
    #[must_use]
    pub fn auto_advance(mut self) -> Self {
        self.auto_advance = true;
        self
    }

    /// Requires at least `count` attached artifacts.
    #[must_use]
    pub fn min_artifacts(mut self, count: usize) -> Self {
        self.min_artifacts = count;
        self
    }

    /// Restricts artifact names to a regex.
    #[must_use]
    pub fn accept_artifacts(mut self, pattern: impl Into<String>) -> Self {
        self.accepted_artifacts = Some(pattern.into());
        self
    }
}

/// A validated, immutable stage within a workflow.
#[derive(Debug, Clone)]
pub struct StageDescriptor {
    /// Unique id of the stage.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Position in the workflow.
    pub index: usize,
    /// Optional longer description.
    pub description: Option<String>,
    /// Field keys that must hold a non-empty value.
    pub required_fields: BTreeSet<String>,
    /// Whether a background task gates completion.
    pub completion: CompletionMode,
    /// Advance automatically when the background task succeeds.
    pub auto_advance: bool,
    /// Minimum number of attached artifacts.
    pub min_artifacts: usize,
    accepted_artifacts: Option<Regex>,
}

impl StageDescriptor {
    /// Returns true if a background task gates completion.
    #[must_use]
    pub fn is_async(&self) -> bool {
        self.completion == CompletionMode::Async
    }

    /// Returns true if an artifact with this name may be attached.
    #[must_use]
    pub fn accepts_artifact(&self, name: &str) -> bool {
        self.accepted_artifacts
            .as_ref()
            .map_or(true, |pattern| pattern.is_match(name))
    }

    /// Returns the artifact pattern source, if any.
    #[must_use]
    pub fn artifact_pattern(&self) -> Option<&str> {
        self.accepted_artifacts.as_ref().map(Regex::as_str)
    }
}

/// Validates stage definitions and assigns their indices.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the list is empty, an id is blank or
/// repeated, or an artifact pattern does not compile.
pub fn define_stages(defs: Vec<StageDef>) -> Result<Vec<StageDescriptor>, ConfigError> {
    if defs.is_empty() {
        return Err(ConfigError::empty());
    }

    let mut seen = HashSet::new();
    let mut descriptors = Vec::with_capacity(defs.len());

    for (index, def) in defs.into_iter().enumerate() {
        if def.id.trim().is_empty() {
            return Err(ConfigError::new(format!(
                "Stage at index {index} has an empty id"
            )));
        }
        if !seen.insert(def.id.clone()) {
            return Err(ConfigError::duplicate(&def.id));
        }

        let accepted_artifacts = def
            .accepted_artifacts
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|e| ConfigError::invalid_pattern(&def.id, e.to_string()))?;

        descriptors.push(StageDescriptor {
            id: def.id,
            title: def.title,
            index,
            description: def.description,
            required_fields: def.required_fields,
            completion: def.completion,
            auto_advance: def.auto_advance,
            min_artifacts: def.min_artifacts,
            accepted_artifacts,
        });
    }

    Ok(descriptors)
}
