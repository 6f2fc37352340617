//! Simulated analysis provider.

use crate::config::SimulationConfig;
use crate::stages::{AnalysisOutcome, AnalysisProvider, AnalysisRequest};
use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;
use tracing::debug;

/// Stands in for the LIDAR / AI analysis backend.
///
/// Sleeps for the configured step duration plus random jitter, then reports
/// the configured summary. Cancellation is handled by the caller dropping the
/// future.
#[derive(Debug, Clone, Default)]
pub struct SimulatedAnalysisProvider {
    config: SimulationConfig,
}

impl SimulatedAnalysisProvider {
    /// Creates a provider from simulation settings.
    #[must_use]
    pub fn new(config: SimulationConfig) -> Self {
        Self { config }
    }

    /// Returns the delay for the next run.
    #[must_use]
    pub fn next_delay(&self) -> Duration {
        let jitter = if self.config.jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=self.config.jitter_ms)
        };
        self.config.step_duration() + Duration::from_millis(jitter)
    }
}

#[async_trait]
impl AnalysisProvider for SimulatedAnalysisProvider {
    async fn run_analysis(&self, request: AnalysisRequest) -> AnalysisOutcome {
        let delay = self.next_delay();
        debug!(
            workflow = %request.workflow,
            stage_id = %request.stage_id,
            artifacts = request.artifacts.len(),
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "Simulated analysis running"
        );
        tokio::time::sleep(delay).await;
        AnalysisOutcome::succeeded(self.config.summary.clone())
    }
}
