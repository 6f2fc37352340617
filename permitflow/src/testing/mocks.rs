//! Scripted collaborators for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::core::{ArtifactRef, ArtifactUpload};
use crate::errors::WorkflowError;
use crate::stages::{AnalysisOutcome, AnalysisProvider, AnalysisRequest, ArtifactStore};

/// An analysis provider that returns scripted outcomes.
///
/// Outcomes are handed out in order; once the script runs dry the fallback
/// is returned. A gated provider holds every run until [`release`] is called,
/// so tests decide exactly when a task finishes.
///
/// [`release`]: ScriptedAnalysisProvider::release
#[derive(Debug)]
pub struct ScriptedAnalysisProvider {
    script: Mutex<VecDeque<AnalysisOutcome>>,
    fallback: AnalysisOutcome,
    delay: Option<Duration>,
    gate: Option<Arc<Semaphore>>,
    requests: Mutex<Vec<AnalysisRequest>>,
}

impl ScriptedAnalysisProvider {
    /// Creates a provider that always succeeds with `summary`.
    #[must_use]
    pub fn succeeding(summary: impl Into<String>) -> Self {
        Self::with_fallback(AnalysisOutcome::succeeded(summary))
    }

    /// Creates a provider that always fails with `summary`.
    #[must_use]
    pub fn failing(summary: impl Into<String>) -> Self {
        Self::with_fallback(AnalysisOutcome::failed(summary))
    }

    fn with_fallback(fallback: AnalysisOutcome) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback,
            delay: None,
            gate: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queues outcomes returned before the fallback.
    #[must_use]
    pub fn then(self, outcome: AnalysisOutcome) -> Self {
        self.script.lock().push_back(outcome);
        self
    }

    /// Sleeps before answering.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Holds every run until released.
    #[must_use]
    pub fn gated(mut self) -> Self {
        self.gate = Some(Arc::new(Semaphore::new(0)));
        self
    }

    /// Lets `count` held runs finish.
    pub fn release(&self, count: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(count);
        }
    }

    /// Returns the number of runs started.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Returns every request received.
    #[must_use]
    pub fn requests(&self) -> Vec<AnalysisRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl AnalysisProvider for ScriptedAnalysisProvider {
    async fn run_analysis(&self, request: AnalysisRequest) -> AnalysisOutcome {
        self.requests.lock().push(request);

        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

/// An artifact store that rejects every upload.
#[derive(Debug, Clone)]
pub struct FailingArtifactStore {
    message: String,
}

impl FailingArtifactStore {
    /// Creates a store that fails with `message`.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl ArtifactStore for FailingArtifactStore {
    async fn upload(&self, _upload: ArtifactUpload) -> Result<ArtifactRef, WorkflowError> {
        Err(WorkflowError::Upload(self.message.clone()))
    }
}
