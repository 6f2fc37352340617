//! Event sinks for workflow lifecycle notifications.
//!
//! The driver emits a [`WorkflowEvent`](crate::core::WorkflowEvent) for every
//! applied intent and every settled async step. Sinks decide where they go.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
