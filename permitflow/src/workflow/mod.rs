//! The workflow engine: instances, navigation, progress and async steps.
//!
//! A [`WorkflowInstance`] owns all mutable state of one run. Every change goes
//! through a `&mut self` method, so there is exactly one writer; background
//! work reports back through [`WorkflowInstance::apply_completion`].

mod async_step;
mod instance;
mod progress;
mod registry;
mod snapshot;
mod transitions;


pub use async_step::{CompletionDisposition, DiscardReason, TaskCompletion, TaskHandle};
pub use instance::{is_filled, FieldValue, StageRuntimeState, WorkflowInstance};
pub use progress::{ProgressMode, PROGRESS_DECIMALS};
pub use registry::WorkflowRegistry;
pub use snapshot::{StageSnapshot, WorkflowSnapshot};
