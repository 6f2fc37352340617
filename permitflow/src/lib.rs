//! # Permitflow
//!
//! A linear, stage-gated workflow engine for permit application wizards,
//! analysis wizards and process trackers.
//!
//! Permitflow provides:
//!
//! - **Declared stage sequences**: validated once, immutable afterwards
//! - **Gated navigation**: advance only when the current stage is complete,
//!   go back freely, jump forward only across completed stages
//! - **Async steps**: cancellable background work whose late results are discarded
//! - **Progress modes**: discrete, continuous and completed-ratio
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use permitflow::prelude::*;
//!
//! let mut driver = WorkflowDriver::from_config(&presets::permit_wizard())?;
//! driver
//!     .dispatch(WorkflowIntent::set_field("project-info", "project_name", "Harbor Bridge"))
//!     .await?;
//! driver
//!     .dispatch(WorkflowIntent::set_field("project-info", "focus_area", "structural"))
//!     .await?;
//! driver.dispatch(WorkflowIntent::Advance).await?;
//!
//! println!("{}", driver.snapshot().overall_progress);
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::cast_precision_loss
)]

pub mod cancellation;
pub mod config;
pub mod core;
pub mod driver;
pub mod errors;
pub mod events;
pub mod helpers;
pub mod observability;
pub mod stages;
pub mod testing;
pub mod utils;
pub mod workflow;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::{LoggingConfig, SimulationConfig, WorkflowConfig};
    pub use crate::core::{ArtifactRef, ArtifactUpload, CompletionMode, StageStatus, TaskState, WorkflowEvent};
    pub use crate::driver::{IntentOutcome, WorkflowDriver, WorkflowIntent};
    pub use crate::errors::{
        AsyncStepError, ConfigError, StageAccessError, TransitionError, UnknownStatusError,
        WorkflowError,
    };
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::observability::init_logging;
    pub use crate::stages::{
        define_stages, presets, AnalysisOutcome, AnalysisProvider, ArtifactStore, StageDef,
        StageDescriptor,
    };
    pub use crate::workflow::{
        CompletionDisposition, ProgressMode, TaskCompletion, TaskHandle, WorkflowInstance,
        WorkflowRegistry, WorkflowSnapshot,
    };
}
