//! Sky Viewer
//!
//! Bootstrap pipeline for an embeddable sky-survey viewer widget.
//!
//! Mounting a [`SkyViewer`] lazily loads the visualization module, waits
//! for its native backend, creates the widget with minimal options (retrying
//! transient failures), then enables the optional controls in idle time and
//! keeps the widget sized to its container. Unmounting releases everything
//! the mount acquired. The host page is reached only through the traits in
//! [`host`]; [`simulation`] provides an in-process stand-in.

pub mod config;
pub mod controls;
pub mod creator;
pub mod error;
pub mod host;
pub mod instance;
pub mod lifecycle;
pub mod module;
pub mod options;
pub mod passive;
pub mod readiness;
pub mod resize;
pub mod retry;
pub mod schedule;
pub mod sidebar;
pub mod simulation;
pub mod state;
pub mod timing;
pub mod viewer;

pub use config::{
    load_config, Config, ControlApi, ExportShape, PipelineConfig, SimulationConfig, ViewerConfig,
};
pub use error::{Result, ViewerError};
pub use host::{Container, Host, Size, WindowEvent};
pub use instance::{Capabilities, ViewerInstance};
pub use module::{resolve_factory, ModuleLoader, ViewerFactory, VisualizationModule};
pub use options::{Control, ControlOptions, ViewerOptions};
pub use retry::RetryAttempt;
pub use sidebar::SidebarService;
pub use simulation::SimulatedHost;
pub use state::InitializationState;
pub use viewer::{SkyViewer, SkyViewerBuilder, ViewerEvent, READY_ATTRIBUTE};
