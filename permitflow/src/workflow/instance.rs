//! Workflow instance and per-stage runtime state.

use super::async_step::AsyncTaskRecord;
use super::ProgressMode;
use crate::core::{ArtifactRef, StageStatus, TaskState};
use crate::errors::{ConfigError, StageAccessError, TransitionError};
use crate::stages::StageDescriptor;
use crate::utils::{now_utc, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::debug;
use uuid::Uuid;

/// Value stored in a stage field.
pub type FieldValue = serde_json::Value;

/// Returns true if a field value counts as filled in.
///
/// Null, blank strings and empty collections are treated as missing.
#[must_use]
pub fn is_filled(value: &FieldValue) -> bool {
    match value {
        FieldValue::Null => false,
        FieldValue::String(s) => !s.trim().is_empty(),
        FieldValue::Array(items) => !items.is_empty(),
        FieldValue::Object(map) => !map.is_empty(),
        FieldValue::Bool(_) | FieldValue::Number(_) => true,
    }
}

/// Mutable state of one stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRuntimeState {
    /// The stage this state belongs to.
    pub stage_id: String,
    /// Lifecycle status.
    pub status: StageStatus,
    /// Sub-progress in percent (0..=100).
    pub progress_percent: u8,
    /// Form field values.
    pub fields: BTreeMap<String, FieldValue>,
    /// Uploaded artifacts, in attachment order.
    pub artifacts: Vec<ArtifactRef>,
    /// State of the most recent async task.
    pub task_state: TaskState,
    /// Id of the most recent async task.
    pub active_task: Option<Uuid>,
    /// Summary reported by the most recent async task.
    pub last_summary: Option<String>,
    /// Last modification time.
    pub updated_at: Timestamp,
}

impl StageRuntimeState {
    fn new(stage_id: impl Into<String>, status: StageStatus) -> Self {
        Self {
            stage_id: stage_id.into(),
            status,
            progress_percent: 0,
            fields: BTreeMap::new(),
            artifacts: Vec::new(),
            task_state: TaskState::Idle,
            active_task: None,
            last_summary: None,
            updated_at: now_utc(),
        }
    }

    /// Gets a field value.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    /// Moves to `next` if the lifecycle allows it.
    pub(super) fn transition(&mut self, next: StageStatus) -> bool {
        if self.status.can_transition_to(next) {
            self.status = next;
            self.touch();
            true
        } else {
            false
        }
    }

    pub(super) fn touch(&mut self) {
        self.updated_at = now_utc();
    }
}

/// One run of a defined stage sequence.
///
/// Owns every [`StageRuntimeState`] of the run. All mutation goes through
/// `&mut self` methods that validate before writing, so a rejected call
/// leaves the instance untouched.
///
/// Not `Clone`: running tasks hold cancellation tokens owned by this
/// instance. Use [`snapshot`](Self::snapshot) for a detached copy.
#[derive(Debug)]
pub struct WorkflowInstance {
    id: Uuid,
    name: String,
    pub(super) stages: Vec<StageDescriptor>,
    /// Aligned with `stages` by position.
    pub(super) runtime: Vec<StageRuntimeState>,
    pub(super) current: usize,
    pub(super) completed: BTreeSet<usize>,
    pub(super) finished: bool,
    progress_mode: ProgressMode,
    pub(super) tasks: HashMap<Uuid, AsyncTaskRecord>,
    created_at: Timestamp,
}

impl WorkflowInstance {
    /// Creates a fresh instance: stage 0 in progress, every other stage not started.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if `stages` is empty or was not produced by a
    /// single [`define_stages`](crate::stages::define_stages) call.
    pub fn initialize(
        name: impl Into<String>,
        stages: Vec<StageDescriptor>,
        progress_mode: ProgressMode,
    ) -> Result<Self, ConfigError> {
        if stages.is_empty() {
            return Err(ConfigError::empty());
        }

        let mut ids = HashSet::new();
        for (position, stage) in stages.iter().enumerate() {
            if !ids.insert(stage.id.as_str()) {
                return Err(ConfigError::duplicate(&stage.id));
            }
            if stage.index != position {
                return Err(ConfigError::new(format!(
                    "Stage '{}' has index {} but sits at position {position}",
                    stage.id, stage.index
                ))
                .with_stages(vec![stage.id.clone()]));
            }
        }

        let runtime = stages
            .iter()
            .map(|stage| {
                let status = if stage.index == 0 {
                    StageStatus::InProgress
                } else {
                    StageStatus::NotStarted
                };
                StageRuntimeState::new(&stage.id, status)
            })
            .collect();

        let instance = Self {
            id: crate::utils::generate_uuid_v7(),
            name: name.into(),
            stages,
            runtime,
            current: 0,
            completed: BTreeSet::new(),
            finished: false,
            progress_mode,
            tasks: HashMap::new(),
            created_at: now_utc(),
        };

        debug!(
            workflow = %instance.name,
            stages = instance.stages.len(),
            mode = ?instance.progress_mode,
            "Workflow initialized"
        );

        Ok(instance)
    }

    /// Returns the instance id.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the workflow name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the stage descriptors in order.
    #[must_use]
    pub fn stages(&self) -> &[StageDescriptor] {
        &self.stages
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Always false: an instance has at least one stage.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Returns the progress mode chosen at construction.
    #[must_use]
    pub fn progress_mode(&self) -> ProgressMode {
        self.progress_mode
    }

    /// Returns the index of the current stage.
    #[must_use]
    pub fn current_stage_index(&self) -> usize {
        self.current
    }

    /// Returns the current stage.
    #[must_use]
    pub fn current_stage(&self) -> &StageDescriptor {
        &self.stages[self.current]
    }

    /// Returns the indices of stages passed with `advance` or `finish`.
    #[must_use]
    pub fn completed_stage_indices(&self) -> &BTreeSet<usize> {
        &self.completed
    }

    /// Returns true once the final stage has been completed.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Returns the creation time.
    #[must_use]
    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Returns the index of a stage id.
    #[must_use]
    pub fn stage_index(&self, stage_id: &str) -> Option<usize> {
        self.stages.iter().position(|s| s.id == stage_id)
    }

    /// Looks up a stage descriptor.
    pub fn stage(&self, stage_id: &str) -> Result<&StageDescriptor, StageAccessError> {
        self.stage_index(stage_id)
            .map(|i| &self.stages[i])
            .ok_or_else(|| StageAccessError::unknown(stage_id))
    }

    /// Looks up the runtime state of a stage.
    pub fn runtime_state(&self, stage_id: &str) -> Result<&StageRuntimeState, StageAccessError> {
        self.stage_index(stage_id)
            .map(|i| &self.runtime[i])
            .ok_or_else(|| StageAccessError::unknown(stage_id))
    }

    /// Iterates runtime states in stage order.
    pub fn runtime_states(&self) -> impl Iterator<Item = &StageRuntimeState> {
        self.runtime.iter()
    }

    pub(super) fn runtime_at(&self, index: usize) -> &StageRuntimeState {
        &self.runtime[index]
    }

    pub(super) fn runtime_at_mut(&mut self, index: usize) -> &mut StageRuntimeState {
        &mut self.runtime[index]
    }

    /// Resolves `stage_id` and checks that it is the current stage.
    fn ensure_active(&self, stage_id: &str) -> Result<usize, StageAccessError> {
        let index = self
            .stage_index(stage_id)
            .ok_or_else(|| StageAccessError::unknown(stage_id))?;
        if index != self.current {
            return Err(StageAccessError::inactive(
                stage_id,
                &self.stages[self.current].id,
            ));
        }
        Ok(index)
    }

    /// Sets a field on the current stage.
    ///
    /// Editing a revisited stage keeps its `Completed` status; `advance`
    /// re-checks its predicate before moving past it again.
    pub fn set_field(
        &mut self,
        stage_id: &str,
        key: impl Into<String>,
        value: impl Into<FieldValue>,
    ) -> Result<(), StageAccessError> {
        let index = self.ensure_active(stage_id)?;
        let key = key.into();
        debug!(workflow = %self.name, stage_id, field = %key, "Field set");

        let state = self.runtime_at_mut(index);
        state.fields.insert(key, value.into());
        state.touch();
        Ok(())
    }

    /// Removes a field from the current stage, returning its old value.
    pub fn clear_field(
        &mut self,
        stage_id: &str,
        key: &str,
    ) -> Result<Option<FieldValue>, StageAccessError> {
        let index = self.ensure_active(stage_id)?;
        let state = self.runtime_at_mut(index);
        let previous = state.fields.remove(key);
        state.touch();
        Ok(previous)
    }

    /// Checks whether an artifact name could be attached to a stage right now.
    pub fn check_artifact(&self, stage_id: &str, name: &str) -> Result<(), StageAccessError> {
        let index = self.ensure_active(stage_id)?;
        if self.stages[index].accepts_artifact(name) {
            Ok(())
        } else {
            Err(StageAccessError::ArtifactRejected {
                stage_id: stage_id.to_string(),
                artifact: name.to_string(),
            })
        }
    }

    /// Attaches an artifact reference to the current stage.
    pub fn attach_artifact(
        &mut self,
        stage_id: &str,
        artifact: ArtifactRef,
    ) -> Result<(), StageAccessError> {
        self.check_artifact(stage_id, &artifact.name)?;
        let index = self.current;
        debug!(workflow = %self.name, stage_id, artifact = %artifact.name, "Artifact attached");

        let state = self.runtime_at_mut(index);
        state.artifacts.push(artifact);
        state.touch();
        Ok(())
    }

    /// Reports sub-progress for a stage, clamped to 0..=100.
    ///
    /// Progress feeds display only; it does not gate transitions.
    pub fn set_progress(&mut self, stage_id: &str, percent: f64) -> Result<u8, StageAccessError> {
        let index = self
            .stage_index(stage_id)
            .ok_or_else(|| StageAccessError::unknown(stage_id))?;
        let clamped = clamp_percent(percent);

        let state = self.runtime_at_mut(index);
        state.progress_percent = clamped;
        state.touch();
        Ok(clamped)
    }

    /// Returns required fields of a stage that are still empty.
    pub fn missing_fields(&self, stage_id: &str) -> Result<Vec<String>, StageAccessError> {
        let index = self
            .stage_index(stage_id)
            .ok_or_else(|| StageAccessError::unknown(stage_id))?;
        Ok(self.missing_fields_at(index))
    }

    pub(super) fn missing_fields_at(&self, index: usize) -> Vec<String> {
        let state = self.runtime_at(index);
        self.stages[index]
            .required_fields
            .iter()
            .filter(|key| !state.fields.get(*key).is_some_and(is_filled))
            .cloned()
            .collect()
    }

    /// Returns true if the stage's completion predicate holds.
    ///
    /// Every required field must be filled, the minimum artifact count met,
    /// and for async stages the latest task must have succeeded.
    pub fn is_stage_complete(&self, stage_id: &str) -> Result<bool, StageAccessError> {
        let index = self
            .stage_index(stage_id)
            .ok_or_else(|| StageAccessError::unknown(stage_id))?;
        Ok(self.completion_gap(index).is_none())
    }

    /// Returns the reason a stage is incomplete, or `None` if it is complete.
    pub(super) fn completion_gap(&self, index: usize) -> Option<TransitionError> {
        let stage = &self.stages[index];
        let state = self.runtime_at(index);

        let mut missing_fields = self.missing_fields_at(index);
        if state.artifacts.len() < stage.min_artifacts {
            missing_fields.push(format!("artifacts (min {})", stage.min_artifacts));
        }
        let awaiting_async = stage.is_async() && state.task_state != TaskState::Succeeded;

        if missing_fields.is_empty() && !awaiting_async {
            None
        } else {
            Some(TransitionError::StageIncomplete {
                stage_id: stage.id.clone(),
                missing_fields,
                awaiting_async,
            })
        }
    }

    /// Returns the first stage that has not been completed.
    #[must_use]
    pub fn first_incomplete_index(&self) -> Option<usize> {
        (0..self.stages.len()).find(|i| !self.completed.contains(i))
    }
}

fn clamp_percent(percent: f64) -> u8 {
    if percent.is_nan() {
        return 0;
    }
    // Lossless after clamping to 0..=100.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let value = percent.clamp(0.0, 100.0).round() as u8;
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::{define_stages, StageDef};
    use pretty_assertions::assert_eq;

    fn wizard() -> WorkflowInstance {
        let stages = define_stages(vec![
            StageDef::new("project-info", "Project Information").require(["project_name", "focus_area"]),
            StageDef::new("lidar-scan", "LIDAR Scan")
                .min_artifacts(1)
                .accept_artifacts(r"(?i)\.(las|laz)$"),
            StageDef::new("ai-analysis", "AI Analysis").async_completion(),
        ])
        .unwrap();
        WorkflowInstance::initialize("permit-wizard", stages, ProgressMode::Discrete).unwrap()
    }

    #[test]
    fn test_initialize_statuses() {
        let wf = wizard();

        assert_eq!(wf.current_stage_index(), 0);
        assert!(wf.completed_stage_indices().is_empty());
        let statuses: Vec<_> = wf.runtime_states().map(|s| s.status).collect();
        assert_eq!(
            statuses,
            vec![StageStatus::InProgress, StageStatus::NotStarted, StageStatus::NotStarted]
        );
    }

    #[test]
    fn test_initialize_rejects_empty() {
        assert!(WorkflowInstance::initialize("x", Vec::new(), ProgressMode::Discrete).is_err());
    }

    #[test]
    fn test_initialize_rejects_spliced_stage_lists() {
        let mut stages = define_stages(vec![StageDef::new("a", "A")]).unwrap();
        stages.extend(define_stages(vec![StageDef::new("b", "B")]).unwrap());

        let err = WorkflowInstance::initialize("x", stages, ProgressMode::Discrete).unwrap_err();
        assert_eq!(err.stages, vec!["b".to_string()]);
    }

    #[test]
    fn test_set_field_unknown_stage() {
        let mut wf = wizard();
        let err = wf.set_field("nope", "k", "v").unwrap_err();
        assert_eq!(err, StageAccessError::unknown("nope"));
    }

    #[test]
    fn test_set_field_inactive_stage() {
        let mut wf = wizard();
        let err = wf.set_field("lidar-scan", "k", "v").unwrap_err();

        assert_eq!(err, StageAccessError::inactive("lidar-scan", "project-info"));
        assert!(wf.runtime_state("lidar-scan").unwrap().fields.is_empty());
    }

    #[test]
    fn test_is_stage_complete_requires_non_empty_values() {
        let mut wf = wizard();
        assert!(!wf.is_stage_complete("project-info").unwrap());

        wf.set_field("project-info", "project_name", "City Center Renovation").unwrap();
        wf.set_field("project-info", "focus_area", "   ").unwrap();
        assert!(!wf.is_stage_complete("project-info").unwrap());
        assert_eq!(wf.missing_fields("project-info").unwrap(), vec!["focus_area".to_string()]);

        wf.set_field("project-info", "focus_area", "structural").unwrap();
        assert!(wf.is_stage_complete("project-info").unwrap());
    }

    #[test]
    fn test_clear_field() {
        let mut wf = wizard();
        wf.set_field("project-info", "project_name", "A").unwrap();

        let old = wf.clear_field("project-info", "project_name").unwrap();
        assert_eq!(old, Some(serde_json::json!("A")));
        assert!(wf.runtime_state("project-info").unwrap().field("project_name").is_none());
    }

    #[test]
    fn test_is_filled() {
        assert!(!is_filled(&serde_json::json!(null)));
        assert!(!is_filled(&serde_json::json!("")));
        assert!(!is_filled(&serde_json::json!([])));
        assert!(!is_filled(&serde_json::json!({})));
        assert!(is_filled(&serde_json::json!(false)));
        assert!(is_filled(&serde_json::json!(0)));
        assert!(is_filled(&serde_json::json!(["a"])));
    }

    #[test]
    fn test_set_progress_clamps() {
        let mut wf = wizard();
        assert_eq!(wf.set_progress("lidar-scan", 140.0).unwrap(), 100);
        assert_eq!(wf.set_progress("lidar-scan", -3.0).unwrap(), 0);
        assert_eq!(wf.set_progress("lidar-scan", 42.4).unwrap(), 42);
        assert_eq!(wf.set_progress("lidar-scan", f64::NAN).unwrap(), 0);
        assert!(wf.set_progress("nope", 10.0).is_err());
    }

    #[test]
    fn test_first_incomplete_index() {
        let wf = wizard();
        assert_eq!(wf.first_incomplete_index(), Some(0));
    }
}
