//! Configuration for workflows, simulated collaborators and logging.

use crate::errors::{ConfigError, WorkflowError};
use crate::stages::{define_stages, StageDef};
use crate::workflow::{ProgressMode, WorkflowInstance};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable that overrides the configured log level.
pub const LOG_ENV_VAR: &str = "PERMITFLOW_LOG";

/// Definition of one workflow use site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Workflow name (e.g., "permit-wizard").
    pub name: String,
    /// How overall progress is derived. Fixed per instance.
    #[serde(default)]
    pub progress_mode: ProgressMode,
    /// Ordered stage definitions.
    #[serde(default)]
    pub stages: Vec<StageDef>,
    /// Settings for the simulated analysis provider.
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl WorkflowConfig {
    /// Creates an empty configuration with defaults.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            progress_mode: ProgressMode::default(),
            stages: Vec::new(),
            simulation: SimulationConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Sets the progress mode.
    #[must_use]
    pub fn with_progress_mode(mut self, mode: ProgressMode) -> Self {
        self.progress_mode = mode;
        self
    }

    /// Appends a stage definition.
    #[must_use]
    pub fn with_stage(mut self, stage: StageDef) -> Self {
        self.stages.push(stage);
        self
    }

    /// Sets the simulation settings.
    #[must_use]
    pub fn with_simulation(mut self, simulation: SimulationConfig) -> Self {
        self.simulation = simulation;
        self
    }

    /// Parses a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, WorkflowError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading workflow config {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("parsing workflow config {}", path.display()))
    }

    /// Validates the stage list and creates a fresh instance.
    pub fn build(&self) -> Result<WorkflowInstance, ConfigError> {
        let stages = define_stages(self.stages.clone())?;
        WorkflowInstance::initialize(self.name.clone(), stages, self.progress_mode)
    }
}

/// Settings for the simulated analysis provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Base duration of one simulated step in milliseconds.
    #[serde(default = "default_step_duration_ms")]
    pub step_duration_ms: u64,
    /// Upper bound of random extra delay in milliseconds.
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,
    /// Summary reported on success.
    #[serde(default = "default_summary")]
    pub summary: String,
}

fn default_step_duration_ms() -> u64 {
    2000
}

fn default_jitter_ms() -> u64 {
    500
}

fn default_summary() -> String {
    "3 potential issues detected. See full report for details.".to_string()
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            step_duration_ms: default_step_duration_ms(),
            jitter_ms: default_jitter_ms(),
            summary: default_summary(),
        }
    }
}

impl SimulationConfig {
    /// Sets the base step duration.
    #[must_use]
    pub fn with_step_duration_ms(mut self, ms: u64) -> Self {
        self.step_duration_ms = ms;
        self
    }

    /// Sets the jitter bound.
    #[must_use]
    pub fn with_jitter_ms(mut self, ms: u64) -> Self {
        self.jitter_ms = ms;
        self
    }

    /// Gets the base duration.
    #[must_use]
    pub fn step_duration(&self) -> Duration {
        Duration::from_millis(self.step_duration_ms)
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive (e.g., "info", "permitflow=debug").
    #[serde(default = "default_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

impl LoggingConfig {
    /// Returns the filter directive, preferring `PERMITFLOW_LOG` when set.
    #[must_use]
    pub fn effective_level(&self) -> String {
        std::env::var(LOG_ENV_VAR)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| self.level.clone())
    }
}
