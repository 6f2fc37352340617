//! Workflow event type for lifecycle notifications.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An event emitted while a workflow is driven.
///
/// Events are consumed by event sinks for logging, monitoring, or
/// refreshing the presentation layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowEvent {
    /// The event type (e.g., "workflow.advanced", "async.cancelled").
    #[serde(rename = "type")]
    pub event_type: String,

    /// When the event occurred (ISO 8601).
    pub timestamp: String,

    /// The event payload data.
    #[serde(default)]
    pub data: HashMap<String, serde_json::Value>,
}

impl WorkflowEvent {
    /// Creates a new event.
    #[must_use]
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            timestamp: crate::utils::iso_timestamp(),
            data: HashMap::new(),
        }
    }

    /// Adds a data field to the event.
    #[must_use]
    pub fn add_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Returns the payload as a JSON object.
    #[must_use]
    pub fn data_value(&self) -> serde_json::Value {
        let data_map: serde_json::Map<String, serde_json::Value> =
            self.data.clone().into_iter().collect();
        serde_json::Value::Object(data_map)
    }

    /// Creates a "workflow.advanced" event.
    #[must_use]
    pub fn advanced(workflow: &str, from: usize, to: usize) -> Self {
        Self::new("workflow.advanced")
            .add_data("workflow", serde_json::json!(workflow))
            .add_data("from", serde_json::json!(from))
            .add_data("to", serde_json::json!(to))
    }

    /// Creates a "workflow.navigated" event for retreats and jumps.
    #[must_use]
    pub fn navigated(workflow: &str, from: usize, to: usize) -> Self {
        Self::new("workflow.navigated")
            .add_data("workflow", serde_json::json!(workflow))
            .add_data("from", serde_json::json!(from))
            .add_data("to", serde_json::json!(to))
    }

    /// Creates a "stage.updated" event.
    #[must_use]
    pub fn stage_updated(stage_id: &str, change: &str) -> Self {
        Self::new("stage.updated")
            .add_data("stage_id", serde_json::json!(stage_id))
            .add_data("change", serde_json::json!(change))
    }

    /// Creates an "async.started" event.
    #[must_use]
    pub fn async_started(stage_id: &str, task_id: &str) -> Self {
        Self::new("async.started")
            .add_data("stage_id", serde_json::json!(stage_id))
            .add_data("task_id", serde_json::json!(task_id))
    }

    /// Creates an "async.<state>" event for a terminal task state.
    #[must_use]
    pub fn async_finished(stage_id: &str, task_id: &str, state: &str, summary: Option<&str>) -> Self {
        let event = Self::new(format!("async.{state}"))
            .add_data("stage_id", serde_json::json!(stage_id))
            .add_data("task_id", serde_json::json!(task_id));
        match summary {
            Some(summary) => event.add_data("summary", serde_json::json!(summary)),
            None => event,
        }
    }

    /// Creates an "async.discarded" event for a late completion.
    #[must_use]
    pub fn async_discarded(task_id: &str, reason: &str) -> Self {
        Self::new("async.discarded")
            .add_data("task_id", serde_json::json!(task_id))
            .add_data("reason", serde_json::json!(reason))
    }
}
