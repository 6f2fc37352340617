//! Async driver that owns a workflow instance and runs its background steps.
//!
//! User intents and task completions both enter through `&mut self` methods
//! on [`WorkflowDriver`], so the instance has a single writer. Spawned tasks
//! only ever send a [`TaskCompletion`] back over a channel.

mod intents;

pub use intents::{IntentOutcome, WorkflowIntent};

use crate::config::WorkflowConfig;
use crate::core::{ArtifactRef, ArtifactUpload, WorkflowEvent};
use crate::errors::{ConfigError, WorkflowError};
use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
use crate::helpers::{InMemoryArtifactStore, SimulatedAnalysisProvider};
use crate::observability::SpanTimer;
use crate::stages::{AnalysisOutcome, AnalysisProvider, AnalysisRequest, ArtifactStore};
use crate::workflow::{
    CompletionDisposition, DiscardReason, TaskCompletion, TaskHandle, WorkflowInstance,
    WorkflowSnapshot,
};
use futures::future::join_all;
use futures::FutureExt;
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Drives one [`WorkflowInstance`].
pub struct WorkflowDriver {
    instance: WorkflowInstance,
    provider: Arc<dyn AnalysisProvider>,
    store: Option<Arc<dyn ArtifactStore>>,
    sink: Arc<dyn EventSink>,
    completions_tx: mpsc::UnboundedSender<TaskCompletion>,
    completions_rx: mpsc::UnboundedReceiver<TaskCompletion>,
    in_flight: HashMap<Uuid, JoinHandle<()>>,
}

impl std::fmt::Debug for WorkflowDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowDriver")
            .field("workflow", &self.instance.name())
            .field("current", &self.instance.current_stage_index())
            .field("in_flight", &self.in_flight.len())
            .finish_non_exhaustive()
    }
}

impl WorkflowDriver {
    /// Creates a driver with no artifact store and a no-op event sink.
    #[must_use]
    pub fn new(instance: WorkflowInstance, provider: Arc<dyn AnalysisProvider>) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            instance,
            provider,
            store: None,
            sink: Arc::new(NoOpEventSink),
            completions_tx,
            completions_rx,
            in_flight: HashMap::new(),
        }
    }

    /// Builds an instance from `config` and wires the simulated collaborators.
    pub fn from_config(config: &WorkflowConfig) -> Result<Self, ConfigError> {
        let instance = config.build()?;
        let provider = Arc::new(SimulatedAnalysisProvider::new(config.simulation.clone()));
        Ok(Self::new(instance, provider)
            .with_artifact_store(Arc::new(InMemoryArtifactStore::new()))
            .with_event_sink(Arc::new(LoggingEventSink::default())))
    }

    /// Sets the artifact store used by [`upload_artifact`](Self::upload_artifact).
    #[must_use]
    pub fn with_artifact_store(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Returns the driven instance.
    #[must_use]
    pub fn instance(&self) -> &WorkflowInstance {
        &self.instance
    }

    /// Captures the current state for rendering.
    #[must_use]
    pub fn snapshot(&self) -> WorkflowSnapshot {
        self.instance.snapshot()
    }

    /// Returns a sender for injecting completion signals from outside.
    #[must_use]
    pub fn completion_sender(&self) -> mpsc::UnboundedSender<TaskCompletion> {
        self.completions_tx.clone()
    }

    /// Returns the number of spawned tasks whose completion has not been applied.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Applies a user intent.
    ///
    /// Rejected intents leave the instance unchanged and emit no event.
    pub async fn dispatch(&mut self, intent: WorkflowIntent) -> Result<IntentOutcome, WorkflowError> {
        let kind = intent.kind();
        let result = self.apply_intent(intent);
        match &result {
            Ok((_, Some(event))) => self.sink.emit(event).await,
            Ok((_, None)) => {}
            Err(e) => debug!(workflow = %self.instance.name(), intent = kind, error = %e, "Intent rejected"),
        }
        result.map(|(outcome, _)| outcome)
    }

    fn apply_intent(
        &mut self,
        intent: WorkflowIntent,
    ) -> Result<(IntentOutcome, Option<WorkflowEvent>), WorkflowError> {
        let name = self.instance.name().to_string();
        let from = self.instance.current_stage_index();

        match intent {
            WorkflowIntent::SetField {
                stage_id,
                key,
                value,
            } => {
                self.instance.set_field(&stage_id, key, value)?;
                let event = WorkflowEvent::stage_updated(&stage_id, "field");
                Ok((IntentOutcome::StageUpdated { stage_id }, Some(event)))
            }
            WorkflowIntent::ClearField { stage_id, key } => {
                self.instance.clear_field(&stage_id, &key)?;
                let event = WorkflowEvent::stage_updated(&stage_id, "field_cleared");
                Ok((IntentOutcome::StageUpdated { stage_id }, Some(event)))
            }
            WorkflowIntent::SetProgress { stage_id, percent } => {
                let percent = self.instance.set_progress(&stage_id, percent)?;
                let event = WorkflowEvent::stage_updated(&stage_id, "progress")
                    .add_data("percent", serde_json::json!(percent));
                Ok((IntentOutcome::ProgressRecorded { stage_id, percent }, Some(event)))
            }
            WorkflowIntent::AttachArtifact { stage_id, artifact } => {
                let artifact_name = artifact.name.clone();
                self.instance.attach_artifact(&stage_id, artifact)?;
                let event = WorkflowEvent::stage_updated(&stage_id, "artifact")
                    .add_data("artifact", serde_json::json!(artifact_name));
                Ok((IntentOutcome::StageUpdated { stage_id }, Some(event)))
            }
            WorkflowIntent::Advance => {
                let to = self.instance.advance()?;
                Ok((
                    IntentOutcome::Navigated { from, to },
                    Some(WorkflowEvent::advanced(&name, from, to)),
                ))
            }
            WorkflowIntent::Retreat => {
                let to = self.instance.retreat()?;
                Ok((
                    IntentOutcome::Navigated { from, to },
                    Some(WorkflowEvent::navigated(&name, from, to)),
                ))
            }
            WorkflowIntent::JumpTo { target } => {
                let to = self.instance.jump_to(target)?;
                Ok((
                    IntentOutcome::Navigated { from, to },
                    Some(WorkflowEvent::navigated(&name, from, to)),
                ))
            }
            WorkflowIntent::Finish => {
                self.instance.finish()?;
                let event = WorkflowEvent::new("workflow.finished")
                    .add_data("workflow", serde_json::json!(name));
                Ok((IntentOutcome::Finished, Some(event)))
            }
            WorkflowIntent::StartAsync { stage_id } => {
                let handle = self.instance.start_async_step(&stage_id)?;
                let request = self.analysis_request(&stage_id)?;
                self.spawn_analysis(&handle, request);
                let event = WorkflowEvent::async_started(&stage_id, &handle.task_id().to_string());
                Ok((IntentOutcome::TaskStarted(handle), Some(event)))
            }
            WorkflowIntent::CancelAsync { task_id } => {
                let cancelled = self.instance.cancel_task(task_id, "cancelled by user");
                let event = if cancelled {
                    self.in_flight.remove(&task_id);
                    self.instance.task_stage_id(task_id).map(|stage_id| {
                        WorkflowEvent::async_finished(stage_id, &task_id.to_string(), "cancelled", None)
                    })
                } else {
                    None
                };
                Ok((IntentOutcome::TaskCancelled { task_id, cancelled }, event))
            }
        }
    }

    /// Builds the provider input for an async stage.
    ///
    /// Fields and artifacts are collected from the first stage up to and
    /// including the async one, since uploads and form choices usually happen
    /// on earlier stages. A later stage's field wins over an earlier one with
    /// the same key.
    fn analysis_request(&self, stage_id: &str) -> Result<AnalysisRequest, WorkflowError> {
        let stage = self.instance.stage(stage_id)?;
        let mut fields = BTreeMap::new();
        let mut artifacts = Vec::new();
        for state in self.instance.runtime_states().take(stage.index + 1) {
            fields.extend(state.fields.iter().map(|(k, v)| (k.clone(), v.clone())));
            artifacts.extend(state.artifacts.iter().cloned());
        }
        Ok(AnalysisRequest {
            workflow: self.instance.name().to_string(),
            stage_id: stage.id.clone(),
            title: stage.title.clone(),
            fields,
            artifacts,
        })
    }

    fn spawn_analysis(&mut self, handle: &TaskHandle, request: AnalysisRequest) {
        let provider = Arc::clone(&self.provider);
        let tx = self.completions_tx.clone();
        let token = handle.token();
        let task_id = handle.task_id();

        let join = tokio::spawn(async move {
            let timer = SpanTimer::start(format!("analysis:{}", request.stage_id));
            let analysis = AssertUnwindSafe(provider.run_analysis(request)).catch_unwind();
            tokio::select! {
                () = token.cancelled() => {
                    debug!(%task_id, reason = ?token.reason(), "Analysis abandoned");
                }
                result = analysis => {
                    let outcome = result.unwrap_or_else(|panic| {
                        let message = panic_message(panic.as_ref());
                        error!(%task_id, panic = %message, "Analysis provider panicked");
                        AnalysisOutcome::failed(format!("analysis provider panicked: {message}"))
                    });
                    debug!(%task_id, duration_ms = timer.elapsed_ms(), success = outcome.success, "Analysis returned");
                    if tx.send(TaskCompletion { task_id, outcome }).is_err() {
                        warn!(%task_id, "Driver gone before analysis completed");
                    }
                }
            }
        });
        self.in_flight.insert(task_id, join);
    }

    /// Waits for the next completion signal and applies it.
    ///
    /// Waits indefinitely if nothing is in flight.
    pub async fn next_completion(&mut self) -> Option<CompletionDisposition> {
        let completion = self.completions_rx.recv().await?;
        Some(self.settle(completion).await)
    }

    /// Applies every completion signal already received.
    pub async fn drain_completions(&mut self) -> Vec<CompletionDisposition> {
        let mut applied = Vec::new();
        while let Ok(completion) = self.completions_rx.try_recv() {
            applied.push(self.settle(completion).await);
        }
        applied
    }

    /// Waits until the given task settles.
    ///
    /// Returns `None` if the task is not running, for example because it was
    /// already cancelled. Completions for other tasks received meanwhile are
    /// applied as well.
    pub async fn wait_for_task(&mut self, task_id: Uuid) -> Option<CompletionDisposition> {
        while self.instance.task_state(task_id).is_some_and(|s| !s.is_terminal()) {
            let disposition = self.next_completion().await?;
            if disposition.task_id() == task_id {
                return Some(disposition);
            }
        }
        None
    }

    async fn settle(&mut self, completion: TaskCompletion) -> CompletionDisposition {
        let task_id = completion.task_id;
        let summary = completion.outcome.summary.clone();
        let disposition = self.instance.apply_completion(completion);
        self.in_flight.remove(&task_id);

        match &disposition {
            CompletionDisposition::Applied {
                stage_id,
                state,
                advanced_to,
                ..
            } => {
                let event = WorkflowEvent::async_finished(
                    stage_id,
                    &task_id.to_string(),
                    &state.to_string(),
                    Some(&summary),
                );
                self.sink.emit(&event).await;
                if let Some(to) = advanced_to {
                    let event = WorkflowEvent::advanced(self.instance.name(), *to - 1, *to)
                        .add_data("auto", serde_json::json!(true));
                    self.sink.emit(&event).await;
                }
            }
            CompletionDisposition::Discarded { reason, .. } => {
                let reason = match reason {
                    DiscardReason::UnknownTask => "unknown_task".to_string(),
                    DiscardReason::AlreadyTerminal(state) => format!("already_{state}"),
                };
                self.sink
                    .emit(&WorkflowEvent::async_discarded(&task_id.to_string(), &reason))
                    .await;
            }
        }
        disposition
    }

    /// Uploads a file through the artifact store and attaches the reference.
    ///
    /// The name is checked against the stage before anything is uploaded.
    pub async fn upload_artifact(
        &mut self,
        stage_id: &str,
        upload: ArtifactUpload,
    ) -> Result<ArtifactRef, WorkflowError> {
        self.instance.check_artifact(stage_id, &upload.name)?;
        let store = self
            .store
            .clone()
            .ok_or_else(|| WorkflowError::Upload("no artifact store configured".to_string()))?;

        let artifact = store.upload(upload).await?;
        info!(
            workflow = %self.instance.name(),
            stage_id,
            artifact = %artifact.name,
            size_bytes = artifact.size_bytes,
            "Artifact uploaded"
        );
        self.dispatch(WorkflowIntent::AttachArtifact {
            stage_id: stage_id.to_string(),
            artifact: artifact.clone(),
        })
        .await?;
        Ok(artifact)
    }

    /// Cancels every running task and waits for the spawned work to stop.
    pub async fn shutdown(mut self) -> WorkflowInstance {
        let cancelled = self.instance.cancel_all_tasks("driver shutdown");
        let handles: Vec<_> = self.in_flight.drain().map(|(_, join)| join).collect();
        for result in join_all(handles).await {
            if let Err(e) = result {
                warn!(error = %e, "Analysis task ended abnormally");
            }
        }
        info!(workflow = %self.instance.name(), cancelled, "Driver shut down");
        self.instance
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{StageStatus, TaskState};
    use crate::events::CollectingEventSink;
    use crate::stages::ports::MockAnalysisProvider;
    use crate::stages::{presets, AnalysisOutcome};
    use crate::testing::{assert_current_stage, assert_invariants, FailingArtifactStore, ScriptedAnalysisProvider};
    use crate::config::SimulationConfig;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    async fn analysis_stage_driver(
        provider: Arc<dyn AnalysisProvider>,
        sink: Arc<CollectingEventSink>,
    ) -> WorkflowDriver {
        let mut driver = WorkflowDriver::new(presets::analysis_wizard().build().unwrap(), provider)
            .with_artifact_store(Arc::new(InMemoryArtifactStore::new()))
            .with_event_sink(sink);
        driver
            .dispatch(WorkflowIntent::set_field("select-type", presets::ANALYSIS_TYPE, "lidar"))
            .await
            .unwrap();
        driver.dispatch(WorkflowIntent::Advance).await.unwrap();
        driver
            .upload_artifact("upload", ArtifactUpload::new("site.las", vec![7; 16]))
            .await
            .unwrap();
        driver.dispatch(WorkflowIntent::Advance).await.unwrap();
        driver
    }

    fn started(outcome: IntentOutcome) -> TaskHandle {
        match outcome {
            IntentOutcome::TaskStarted(handle) => handle,
            other => panic!("expected TaskStarted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_async_step_success_flows_back() {
        let sink = Arc::new(CollectingEventSink::new());
        let provider = Arc::new(ScriptedAnalysisProvider::succeeding("no findings"));
        let mut driver = analysis_stage_driver(provider.clone(), sink.clone()).await;

        let handle = started(driver.dispatch(WorkflowIntent::start_async("analysis")).await.unwrap());
        let disposition = driver.wait_for_task(handle.task_id()).await.unwrap();

        assert!(disposition.is_applied());
        assert!(driver.instance().is_stage_complete("analysis").unwrap());
        assert_eq!(driver.in_flight(), 0);
        let requests = provider.requests();
        let request = &requests[0];
        assert_eq!(request.stage_id, "analysis");
        assert_eq!(request.artifacts[0].name, "site.las");
        assert_eq!(request.fields[presets::ANALYSIS_TYPE], serde_json::json!("lidar"));
        assert_eq!(
            sink.event_types(),
            vec![
                "stage.updated",
                "workflow.advanced",
                "stage.updated",
                "workflow.advanced",
                "async.started",
                "async.succeeded",
            ]
        );
    }

    struct FlakyProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AnalysisProvider for FlakyProvider {
        async fn run_analysis(&self, _request: AnalysisRequest) -> AnalysisOutcome {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("provider blew up");
            }
            AnalysisOutcome::succeeded("documents valid")
        }
    }

    #[tokio::test]
    async fn test_provider_panic_fails_task_and_allows_retry() {
        let sink = Arc::new(CollectingEventSink::new());
        let provider = Arc::new(FlakyProvider { calls: AtomicUsize::new(0) });
        let mut driver = WorkflowDriver::new(presets::document_approval().build().unwrap(), provider)
            .with_artifact_store(Arc::new(InMemoryArtifactStore::new()))
            .with_event_sink(sink.clone());
        driver
            .upload_artifact("upload", ArtifactUpload::new("plans.pdf", b"%PDF".to_vec()))
            .await
            .unwrap();
        driver.dispatch(WorkflowIntent::Advance).await.unwrap();

        let first = started(driver.dispatch(WorkflowIntent::start_async("auto-check")).await.unwrap());
        let disposition = tokio::time::timeout(Duration::from_secs(5), driver.wait_for_task(first.task_id()))
            .await
            .expect("panicking provider must still settle the task")
            .unwrap();

        assert!(matches!(
            disposition,
            CompletionDisposition::Applied { state: TaskState::Failed, advanced_to: None, .. }
        ));
        assert_eq!(driver.in_flight(), 0);
        let state = driver.instance().runtime_state("auto-check").unwrap();
        assert_eq!(state.status, StageStatus::Blocked);
        assert!(state.last_summary.as_deref().unwrap().contains("provider blew up"));
        assert_eq!(sink.events_of_type("async.failed").len(), 1);

        let second = started(driver.dispatch(WorkflowIntent::start_async("auto-check")).await.unwrap());
        driver.wait_for_task(second.task_id()).await.unwrap();
        assert_current_stage(driver.instance(), "approval");
    }

    #[tokio::test]
    async fn test_cancel_then_late_success_is_discarded() {
        let sink = Arc::new(CollectingEventSink::new());
        let provider = Arc::new(ScriptedAnalysisProvider::succeeding("ok").gated());
        let mut driver = analysis_stage_driver(provider.clone(), sink.clone()).await;

        let handle = started(driver.dispatch(WorkflowIntent::start_async("analysis")).await.unwrap());
        let outcome = driver
            .dispatch(WorkflowIntent::CancelAsync { task_id: handle.task_id() })
            .await
            .unwrap();
        assert!(matches!(outcome, IntentOutcome::TaskCancelled { cancelled: true, .. }));
        provider.release(1);

        // A success racing the cancel arrives afterwards.
        driver
            .completion_sender()
            .send(TaskCompletion::succeeded(handle.task_id(), "too late"))
            .unwrap();
        let disposition = driver.next_completion().await.unwrap();

        assert_eq!(
            disposition,
            CompletionDisposition::Discarded {
                task_id: handle.task_id(),
                reason: DiscardReason::AlreadyTerminal(TaskState::Cancelled),
            }
        );
        assert!(!driver.instance().is_stage_complete("analysis").unwrap());
        assert_eq!(
            driver.instance().runtime_state("analysis").unwrap().status,
            StageStatus::Blocked
        );
        assert!(driver.wait_for_task(handle.task_id()).await.is_none());
        assert_eq!(sink.events_of_type("async.cancelled").len(), 1);
        assert_eq!(sink.events_of_type("async.discarded").len(), 1);
    }

    #[tokio::test]
    async fn test_failed_analysis_then_retry() {
        let sink = Arc::new(CollectingEventSink::new());
        let provider = Arc::new(
            ScriptedAnalysisProvider::succeeding("clean").then(AnalysisOutcome::failed("corrupt scan")),
        );
        let mut driver = analysis_stage_driver(provider, sink).await;

        let first = started(driver.dispatch(WorkflowIntent::start_async("analysis")).await.unwrap());
        driver.wait_for_task(first.task_id()).await.unwrap();
        assert_eq!(
            driver.instance().runtime_state("analysis").unwrap().status,
            StageStatus::Blocked
        );

        let second = started(driver.dispatch(WorkflowIntent::start_async("analysis")).await.unwrap());
        driver.wait_for_task(second.task_id()).await.unwrap();
        driver.dispatch(WorkflowIntent::Finish).await.unwrap();

        assert!(driver.instance().is_finished());
        assert_invariants(driver.instance());
    }

    #[tokio::test]
    async fn test_auto_advance_emits_event() {
        let sink = Arc::new(CollectingEventSink::new());
        let mut provider = MockAnalysisProvider::new();
        provider
            .expect_run_analysis()
            .times(1)
            .returning(|_| AnalysisOutcome::succeeded("documents valid"));
        let mut driver = WorkflowDriver::new(
            presets::document_approval().build().unwrap(),
            Arc::new(provider),
        )
        .with_artifact_store(Arc::new(InMemoryArtifactStore::new()))
        .with_event_sink(sink.clone());

        driver
            .upload_artifact("upload", ArtifactUpload::new("plans.pdf", b"%PDF".to_vec()))
            .await
            .unwrap();
        driver.dispatch(WorkflowIntent::Advance).await.unwrap();
        let handle = started(driver.dispatch(WorkflowIntent::start_async("auto-check")).await.unwrap());
        driver.wait_for_task(handle.task_id()).await.unwrap();

        assert_current_stage(driver.instance(), "approval");
        let auto = sink
            .events_of_type("workflow.advanced")
            .into_iter()
            .find(|e| e.data.contains_key("auto"))
            .unwrap();
        assert_eq!(auto.data["to"], serde_json::json!(2));
    }

    #[tokio::test]
    async fn test_rejected_intent_emits_nothing() {
        let sink = Arc::new(CollectingEventSink::new());
        let mut driver = WorkflowDriver::new(
            presets::permit_wizard().build().unwrap(),
            Arc::new(ScriptedAnalysisProvider::succeeding("ok")),
        )
        .with_event_sink(sink.clone());

        let err = driver.dispatch(WorkflowIntent::Advance).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Transition(_)));
        let err = driver.dispatch(WorkflowIntent::start_async("ai-analysis")).await.unwrap_err();
        assert!(matches!(err, WorkflowError::AsyncStep(_)));
        assert!(sink.is_empty());
        assert_eq!(driver.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_upload_rejected_name_is_not_stored() {
        let store = Arc::new(InMemoryArtifactStore::new());
        let mut driver = WorkflowDriver::new(
            presets::analysis_wizard().build().unwrap(),
            Arc::new(ScriptedAnalysisProvider::succeeding("ok")),
        )
        .with_artifact_store(store.clone());
        driver
            .dispatch(WorkflowIntent::set_field("select-type", presets::ANALYSIS_TYPE, "2d"))
            .await
            .unwrap();
        driver.dispatch(WorkflowIntent::Advance).await.unwrap();

        let err = driver
            .upload_artifact("upload", ArtifactUpload::new("photo.png", vec![1]))
            .await
            .unwrap_err();

        assert!(matches!(err, WorkflowError::StageAccess(_)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_upload_without_store_or_failing_store() {
        let provider: Arc<dyn AnalysisProvider> = Arc::new(ScriptedAnalysisProvider::succeeding("ok"));

        let mut bare = WorkflowDriver::new(presets::document_approval().build().unwrap(), Arc::clone(&provider));
        let err = bare
            .upload_artifact("upload", ArtifactUpload::new("a.pdf", vec![1]))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Upload(_)));

        let mut failing = WorkflowDriver::new(presets::document_approval().build().unwrap(), provider)
            .with_artifact_store(Arc::new(FailingArtifactStore::new("quota exceeded")));
        let err = failing
            .upload_artifact("upload", ArtifactUpload::new("a.pdf", vec![1]))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Upload(msg) if msg == "quota exceeded"));
        assert!(failing.instance().runtime_state("upload").unwrap().artifacts.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_from_config_with_simulated_provider() {
        let config = presets::permit_process_tracker()
            .with_simulation(SimulationConfig::default().with_step_duration_ms(2000).with_jitter_ms(500));
        let mut driver = WorkflowDriver::from_config(&config).unwrap();
        for _ in 0..3 {
            driver.dispatch(WorkflowIntent::Advance).await.unwrap();
        }

        let handle = started(driver.dispatch(WorkflowIntent::start_async("ai-analysis")).await.unwrap());
        let disposition = driver.wait_for_task(handle.task_id()).await.unwrap();

        assert!(matches!(
            disposition,
            CompletionDisposition::Applied { advanced_to: Some(4), .. }
        ));
        let snapshot = driver.snapshot();
        assert_eq!(snapshot.current_stage_id, "final-approval");
        assert_eq!(
            snapshot.stage("ai-analysis").unwrap().last_summary.as_deref(),
            Some("3 potential issues detected. See full report for details.")
        );
    }

    #[tokio::test]
    async fn test_shutdown_cancels_running_tasks() {
        let provider = Arc::new(ScriptedAnalysisProvider::succeeding("never").gated());
        let mut driver = analysis_stage_driver(provider, Arc::new(CollectingEventSink::new())).await;
        let handle = started(driver.dispatch(WorkflowIntent::start_async("analysis")).await.unwrap());

        let instance = driver.shutdown().await;

        assert!(handle.is_cancelled());
        assert_eq!(instance.task_state(handle.task_id()), Some(TaskState::Cancelled));
    }
}
