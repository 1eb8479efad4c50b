//! The mounted sky viewer and its bootstrap pipeline

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{PipelineConfig, ViewerConfig};
use crate::controls::enable_controls;
use crate::creator::create_instance;
use crate::error::{Result, ViewerError};
use crate::host::{Container, Host, InjectedResource, WindowEvent};
use crate::instance::ViewerInstance;
use crate::lifecycle::LifecycleManager;
use crate::module::{load_module, resolve_factory, ModuleLoader};
use crate::options::{ControlOptions, ViewerOptions};
use crate::readiness::{initialize_backend, wait_for_backend};
use crate::resize::ResizeCoordinator;
use crate::retry::{RetryAttempt, RetryPolicy};
use crate::state::{InitializationState, StateTracker};
use crate::timing;

/// Attribute set on the container once the viewer is up
pub const READY_ATTRIBUTE: &str = "data-viewer-ready";

const EVENT_CAPACITY: usize = 16;

/// Outcome notifications of a mount; exactly one is sent unless torn down first
#[derive(Clone)]
pub enum ViewerEvent {
    Ready(Arc<dyn ViewerInstance>),
    Error(Arc<ViewerError>),
}

impl fmt::Debug for ViewerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewerEvent::Ready(instance) => f
                .debug_tuple("Ready")
                .field(&instance.capabilities())
                .finish(),
            ViewerEvent::Error(e) => f.debug_tuple("Error").field(e).finish(),
        }
    }
}

/// Builder for [`SkyViewer`]
pub struct SkyViewerBuilder {
    container: Arc<dyn Container>,
    loader: Arc<dyn ModuleLoader>,
    host: Host,
    config: ViewerConfig,
    pipeline: PipelineConfig,
    layout: Option<watch::Receiver<bool>>,
}

impl SkyViewerBuilder {
    pub fn config(mut self, config: ViewerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn pipeline(mut self, pipeline: PipelineConfig) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Resize after sidebar collapse changes
    pub fn layout_changes(mut self, layout: watch::Receiver<bool>) -> Self {
        self.layout = Some(layout);
        self
    }

    pub fn build(self) -> Result<SkyViewer> {
        self.config.validate()?;
        self.pipeline.validate()?;
        let policy = RetryPolicy::from_config(&self.pipeline)?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Ok(SkyViewer {
            inner: Arc::new(Inner {
                container: self.container,
                loader: self.loader,
                host: self.host,
                config: self.config,
                pipeline: self.pipeline,
                policy,
                layout: self.layout,
                lifecycle: LifecycleManager::new(),
                state: StateTracker::new(),
                attempts: Mutex::new(Vec::new()),
                events,
                emit_gate: tokio::sync::Mutex::new(()),
            }),
            mounted: AtomicBool::new(false),
        })
    }
}

struct Inner {
    container: Arc<dyn Container>,
    loader: Arc<dyn ModuleLoader>,
    host: Host,
    config: ViewerConfig,
    pipeline: PipelineConfig,
    policy: RetryPolicy,
    layout: Option<watch::Receiver<bool>>,
    lifecycle: LifecycleManager,
    state: StateTracker,
    attempts: Mutex<Vec<RetryAttempt>>,
    events: broadcast::Sender<ViewerEvent>,
    /// Held while checking the destroyed flag and emitting, so nothing is
    /// emitted once teardown has begun
    emit_gate: tokio::sync::Mutex<()>,
}

/// A sky viewer bound to one container
///
/// [`mount`](SkyViewer::mount) starts the bootstrap pipeline in the
/// background: load the module, wait for its backend, create the instance
/// with retries, then enable controls and keep it sized. The outcome arrives
/// as a [`ViewerEvent`]. [`unmount`](SkyViewer::unmount) tears everything
/// down and may be called at any point.
pub struct SkyViewer {
    inner: Arc<Inner>,
    mounted: AtomicBool,
}

impl SkyViewer {
    pub fn builder(
        container: Arc<dyn Container>,
        loader: Arc<dyn ModuleLoader>,
        host: Host,
    ) -> SkyViewerBuilder {
        SkyViewerBuilder {
            container,
            loader,
            host,
            config: ViewerConfig::default(),
            pipeline: PipelineConfig::default(),
            layout: None,
        }
    }

    /// Start the pipeline and subscribe to its outcome
    ///
    /// The pipeline runs once per viewer; later calls only subscribe.
    pub fn mount(&self) -> broadcast::Receiver<ViewerEvent> {
        let rx = self.inner.events.subscribe();
        if self.mounted.swap(true, Ordering::SeqCst) {
            debug!("Viewer already mounted");
            return rx;
        }
        if self.inner.lifecycle.is_destroyed() {
            debug!("Viewer unmounted before mount, not starting");
            return rx;
        }

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.run().await });
        rx
    }

    /// Tear the viewer down; safe to call more than once
    pub async fn unmount(&self) {
        self.inner.teardown().await;
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ViewerEvent> {
        self.inner.events.subscribe()
    }

    pub fn state(&self) -> InitializationState {
        self.inner.state.current()
    }

    pub fn watch_state(&self) -> watch::Receiver<InitializationState> {
        self.inner.state.subscribe()
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.lifecycle.is_destroyed()
    }

    /// Creation attempts that failed transiently and were retried
    pub fn attempts(&self) -> Vec<RetryAttempt> {
        self.inner
            .attempts
            .lock()
            .map(|attempts| attempts.clone())
            .unwrap_or_default()
    }

    /// The live instance, if creation succeeded and the viewer is mounted
    pub async fn instance(&self) -> Option<Arc<dyn ViewerInstance>> {
        self.inner.lifecycle.slot().get().await
    }

    /// Hand a page resource to the viewer to remove on unmount
    pub fn track_resource(&self, resource: Arc<dyn InjectedResource>) {
        self.inner.lifecycle.track_resource(resource);
    }
}

impl Drop for SkyViewer {
    fn drop(&mut self) {
        if self.inner.lifecycle.is_destroyed() {
            return;
        }
        self.inner.lifecycle.cancel_token().cancel();
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let inner = Arc::clone(&self.inner);
            runtime.spawn(async move { inner.teardown().await });
        } else {
            warn!("Viewer dropped outside a runtime without unmount");
        }
    }
}

impl Inner {
    async fn run(self: Arc<Self>) {
        let cancel = self.lifecycle.cancel_token();
        match self.bootstrap(&cancel).await {
            Ok(instance) => self.on_ready(instance, &cancel).await,
            Err(e) if cancel.is_cancelled() => {
                debug!("Viewer pipeline stopped by teardown: {}", e);
            }
            Err(e) => {
                let _gate = self.emit_gate.lock().await;
                if cancel.is_cancelled() {
                    debug!("Viewer pipeline failed after teardown: {}", e);
                    return;
                }
                error!("Viewer initialization failed: {}", e);
                self.state.advance(InitializationState::Failed);
                let _ = self.events.send(ViewerEvent::Error(Arc::new(e)));
            }
        }
    }

    async fn bootstrap(&self, cancel: &CancellationToken) -> Result<Arc<dyn ViewerInstance>> {
        self.state.advance(InitializationState::ModuleLoading);
        let loaded = load_module(self.loader.as_ref(), self.host.timeline.as_ref()).await?;
        for resource in loaded.resources {
            self.lifecycle.track_resource(resource);
        }
        if cancel.is_cancelled() {
            return Err(ViewerError::Cancelled);
        }

        self.state.advance(InitializationState::BackendPolling);
        let module = loaded.module;
        initialize_backend(module.as_ref(), &self.host, cancel).await?;
        wait_for_backend(
            module.as_ref(),
            self.host.window.as_ref(),
            self.pipeline.readiness_poll_interval(),
            self.pipeline.readiness_timeout(),
            cancel,
        )
        .await?;

        self.state.advance(InitializationState::InstanceCreating);
        let factory = resolve_factory(module.as_ref()).ok_or(ViewerError::FactoryNotFound)?;
        self.host.timeline.mark(timing::CREATE_START);
        let mut history = Vec::new();
        let created = create_instance(
            factory,
            Arc::clone(&self.container),
            &ViewerOptions::minimal(&self.config),
            &self.host,
            &self.policy,
            cancel,
            &mut history,
        )
        .await;
        if let Ok(mut attempts) = self.attempts.lock() {
            *attempts = history;
        }
        let instance = created?;

        if !self.lifecycle.adopt(Arc::clone(&instance)).await {
            return Err(ViewerError::Cancelled);
        }
        self.host.timeline.mark(timing::CREATE_END);
        self.host
            .timeline
            .measure(timing::CREATE, timing::CREATE_START, timing::CREATE_END);
        Ok(instance)
    }

    async fn on_ready(&self, instance: Arc<dyn ViewerInstance>, cancel: &CancellationToken) {
        {
            let _gate = self.emit_gate.lock().await;
            if cancel.is_cancelled() {
                debug!("Viewer torn down before ready could be announced");
                return;
            }
            self.state.advance(InitializationState::Ready);
            if let Err(e) = self.container.set_attribute(READY_ATTRIBUTE, "true") {
                warn!("Failed to mark container ready: {}", e);
            }
            if let Err(e) = self.host.window.dispatch(WindowEvent::ViewerReady) {
                warn!("Failed to dispatch viewer ready event: {}", e);
            }
            info!("Viewer ready (target {})", self.config.target);
            let _ = self.events.send(ViewerEvent::Ready(Arc::clone(&instance)));
        }

        let coordinator = ResizeCoordinator::new(
            Arc::clone(&self.container),
            self.lifecycle.slot(),
            Arc::clone(&self.host.window),
            self.pipeline.layout_settle(),
            cancel.clone(),
        );
        let handle = coordinator.spawn(self.container.observe_resize(), self.layout.clone());
        self.lifecycle.attach_coordinator(handle);

        enable_controls(
            instance,
            ControlOptions::from_config(&self.config),
            &self.host,
            cancel,
        )
        .await;
    }

    async fn teardown(&self) {
        self.lifecycle.cancel_token().cancel();
        drop(self.emit_gate.lock().await);
        if self.lifecycle.teardown().await {
            self.state.advance(InitializationState::TornDown);
        }
    }
}
