//! Configuration types for the sky viewer

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ViewerError};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub viewer: ViewerConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

impl Config {
    /// Reject values the pipeline cannot work with
    pub fn validate(&self) -> Result<()> {
        self.viewer.validate()?;
        self.pipeline.validate()
    }
}

/// Caller-supplied viewer settings, read once at mount time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerConfig {
    #[serde(default = "default_survey")]
    pub survey: String,
    /// Field of view in degrees
    #[serde(default = "default_fov")]
    pub fov: f64,
    #[serde(default = "default_target")]
    pub target: String,
    #[serde(default)]
    pub show_reticle: bool,
    #[serde(default)]
    pub show_layers_control: bool,
    #[serde(default)]
    pub show_zoom_control: bool,
    #[serde(default)]
    pub show_fullscreen_control: bool,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            survey: default_survey(),
            fov: default_fov(),
            target: default_target(),
            show_reticle: false,
            show_layers_control: false,
            show_zoom_control: false,
            show_fullscreen_control: false,
        }
    }
}

impl ViewerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.survey.trim().is_empty() {
            return Err(ViewerError::Config("survey must not be empty".to_string()));
        }
        if !self.fov.is_finite() || self.fov <= 0.0 {
            return Err(ViewerError::Config(format!(
                "fov must be a positive number of degrees, got {}",
                self.fov
            )));
        }
        Ok(())
    }
}

/// Timing and retry tunables of the bootstrap pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_poll_interval")]
    pub readiness_poll_interval_ms: u64,
    #[serde(default = "default_readiness_timeout")]
    pub readiness_timeout_ms: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay")]
    pub retry_max_delay_ms: u64,
    /// Substrings (case-insensitive) that mark a creation error as transient
    #[serde(default = "default_transient_patterns")]
    pub transient_error_patterns: Vec<String>,
    /// Delay before resizing after a sidebar toggle
    #[serde(default = "default_layout_settle")]
    pub layout_settle_ms: u64,
    /// Delay before the sidebar service broadcasts a window resize
    #[serde(default = "default_sidebar_settle")]
    pub sidebar_settle_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            readiness_poll_interval_ms: default_poll_interval(),
            readiness_timeout_ms: default_readiness_timeout(),
            max_attempts: default_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay(),
            retry_max_delay_ms: default_retry_max_delay(),
            transient_error_patterns: default_transient_patterns(),
            layout_settle_ms: default_layout_settle(),
            sidebar_settle_ms: default_sidebar_settle(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.readiness_poll_interval_ms == 0 {
            return Err(ViewerError::Config(
                "readiness_poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(ViewerError::Config(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.retry_base_delay_ms > self.retry_max_delay_ms {
            return Err(ViewerError::Config(format!(
                "retry_base_delay_ms ({}) exceeds retry_max_delay_ms ({})",
                self.retry_base_delay_ms, self.retry_max_delay_ms
            )));
        }
        if self
            .transient_error_patterns
            .iter()
            .any(|p| p.trim().is_empty())
        {
            return Err(ViewerError::Config(
                "transient_error_patterns must not contain empty patterns".to_string(),
            ));
        }
        Ok(())
    }

    pub fn readiness_poll_interval(&self) -> Duration {
        Duration::from_millis(self.readiness_poll_interval_ms)
    }

    pub fn readiness_timeout(&self) -> Duration {
        Duration::from_millis(self.readiness_timeout_ms)
    }

    pub fn layout_settle(&self) -> Duration {
        Duration::from_millis(self.layout_settle_ms)
    }

    pub fn sidebar_settle(&self) -> Duration {
        Duration::from_millis(self.sidebar_settle_ms)
    }
}

/// Which export layout the simulated module presents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportShape {
    /// The module itself is the factory
    Direct,
    /// `{ aladin: factory }`
    #[default]
    Named,
    /// `{ default: factory }`
    Default,
    /// `{ default: { aladin: factory } }`
    DefaultNamed,
    /// No factory anywhere
    Empty,
}

/// Which control capability the simulated instance exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlApi {
    #[default]
    SetOptions,
    AddControl,
    Update,
    None,
}

/// Behaviour of the in-process simulated host and module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_load_latency")]
    pub load_latency_ms: u64,
    #[serde(default = "default_true")]
    pub has_init: bool,
    #[serde(default = "default_init_latency")]
    pub init_latency_ms: u64,
    /// Time after backend init until the readiness marker appears; `None` never
    #[serde(default = "default_backend_ready_after")]
    pub backend_ready_after_ms: Option<u64>,
    /// Number of leading factory calls that fail with `transient_message`
    #[serde(default)]
    pub transient_failures: u32,
    #[serde(default = "default_transient_message")]
    pub transient_message: String,
    #[serde(default)]
    pub export_shape: ExportShape,
    #[serde(default)]
    pub control_api: ControlApi,
    #[serde(default = "default_container_width")]
    pub container_width: f64,
    #[serde(default = "default_container_height")]
    pub container_height: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            load_latency_ms: default_load_latency(),
            has_init: true,
            init_latency_ms: default_init_latency(),
            backend_ready_after_ms: default_backend_ready_after(),
            transient_failures: 0,
            transient_message: default_transient_message(),
            export_shape: ExportShape::default(),
            control_api: ControlApi::default(),
            container_width: default_container_width(),
            container_height: default_container_height(),
        }
    }
}

fn default_survey() -> String {
    "https://healpix.ias.u-psud.fr/CDS_P_DSS2_color".to_string()
}

fn default_fov() -> f64 {
    60.0
}

fn default_target() -> String {
    "M42".to_string()
}

fn default_poll_interval() -> u64 {
    100
}

fn default_readiness_timeout() -> u64 {
    5000
}

fn default_max_attempts() -> u32 {
    5
}

fn default_retry_base_delay() -> u64 {
    100
}

fn default_retry_max_delay() -> u64 {
    1000
}

fn default_transient_patterns() -> Vec<String> {
    vec!["WebClient".to_string(), "setProjection".to_string()]
}

fn default_layout_settle() -> u64 {
    100
}

fn default_sidebar_settle() -> u64 {
    250
}

fn default_load_latency() -> u64 {
    20
}

fn default_true() -> bool {
    true
}

fn default_init_latency() -> u64 {
    50
}

fn default_backend_ready_after() -> Option<u64> {
    Some(150)
}

fn default_transient_message() -> String {
    "WebClient not ready: setProjection failed".to_string()
}

fn default_container_width() -> f64 {
    800.0
}

fn default_container_height() -> f64 {
    600.0
}

/// Load configuration from a JSON file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = serde_json::from_str(&content)?;
    Ok(config)
}
