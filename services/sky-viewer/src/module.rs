//! The visualization module: loading it and finding its factory

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{Result, ViewerError};
use crate::host::{Container, InjectedResource, Timeline};
use crate::instance::ViewerInstance;
use crate::options::ViewerOptions;
use crate::timing;

/// Constructs a viewer inside a container
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait ViewerFactory: Send + Sync {
    async fn create(
        &self,
        container: Arc<dyn Container>,
        options: ViewerOptions,
    ) -> Result<Arc<dyn ViewerInstance>>;
}

/// A loaded visualization module
///
/// The library has shipped several export layouts over time, so every
/// accessor is optional and defaults to "absent".
#[async_trait]
pub trait VisualizationModule: Send + Sync {
    /// The module object itself, when it is callable
    fn as_factory(&self) -> Option<Arc<dyn ViewerFactory>> {
        None
    }

    /// The `aladin` named export, when it is callable
    fn named_factory(&self) -> Option<Arc<dyn ViewerFactory>> {
        None
    }

    /// The `default` export
    fn default_export(&self) -> Option<Arc<dyn VisualizationModule>> {
        None
    }

    /// Whether the module has an `init()` entry point
    fn has_init(&self) -> bool {
        false
    }

    /// Start the module's native computation backend
    async fn init(&self) -> Result<()> {
        Ok(())
    }

    /// Whether the `wasmLibs.core` readiness marker is present
    fn backend_ready(&self) -> bool {
        false
    }
}

/// Plain export table, for modules assembled by the host binding
#[derive(Clone, Default)]
pub struct ModuleExports {
    pub callable: Option<Arc<dyn ViewerFactory>>,
    pub aladin: Option<Arc<dyn ViewerFactory>>,
    pub default: Option<Arc<dyn VisualizationModule>>,
}

impl ModuleExports {
    pub fn callable(factory: Arc<dyn ViewerFactory>) -> Self {
        Self {
            callable: Some(factory),
            ..Self::default()
        }
    }

    pub fn named(factory: Arc<dyn ViewerFactory>) -> Self {
        Self {
            aladin: Some(factory),
            ..Self::default()
        }
    }

    pub fn with_default(default: Arc<dyn VisualizationModule>) -> Self {
        Self {
            default: Some(default),
            ..Self::default()
        }
    }
}

impl VisualizationModule for ModuleExports {
    fn as_factory(&self) -> Option<Arc<dyn ViewerFactory>> {
        self.callable.clone()
    }

    fn named_factory(&self) -> Option<Arc<dyn ViewerFactory>> {
        self.aladin.clone()
    }

    fn default_export(&self) -> Option<Arc<dyn VisualizationModule>> {
        self.default.clone()
    }
}

/// Find the viewer factory in whatever export layout the module uses
///
/// Checks the module itself, its `aladin` export, then the same two under
/// the `default` export.
pub fn resolve_factory(module: &dyn VisualizationModule) -> Option<Arc<dyn ViewerFactory>> {
    module
        .as_factory()
        .or_else(|| module.named_factory())
        .or_else(|| {
            module
                .default_export()
                .and_then(|d| d.as_factory().or_else(|| d.named_factory()))
        })
}

/// Result of a module load
pub struct LoadedModule {
    pub module: Arc<dyn VisualizationModule>,
    /// Page resources the loader injected and that must go on teardown
    pub resources: Vec<Arc<dyn InjectedResource>>,
}

impl LoadedModule {
    pub fn new(module: Arc<dyn VisualizationModule>) -> Self {
        Self {
            module,
            resources: Vec::new(),
        }
    }
}

/// Lazily fetches the visualization module (`import('aladin-lite')`)
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait ModuleLoader: Send + Sync {
    async fn load(&self) -> Result<LoadedModule>;
}

/// Load the module once, bracketing the import with timeline marks
pub async fn load_module(loader: &dyn ModuleLoader, timeline: &dyn Timeline) -> Result<LoadedModule> {
    timeline.mark(timing::IMPORT_START);
    debug!("Loading visualization module");
    let loaded = loader.load().await.map_err(|e| match e {
        ViewerError::Load(_) => e,
        other => ViewerError::Load(other.to_string()),
    })?;
    timeline.mark(timing::IMPORT_END);
    debug!(
        "Visualization module loaded ({} injected resources)",
        loaded.resources.len()
    );
    Ok(loaded)
}
