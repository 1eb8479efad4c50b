//! In-process simulated host and visualization module
//!
//! This module provides implementations of the host and module traits that
//! behave like a browser page running the widget, allowing the pipeline to
//! be exercised end to end without a browser. Everything records what was
//! done to it so tests can assert on it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::config::{ControlApi, ExportShape, SimulationConfig};
use crate::error::{Result, ViewerError};
use crate::host::{
    Container, Host, InjectedResource, ListenerOptions, ListenerRegistry, RegistrationHook,
    ResizeObserver, Size, Timeline, Window, WindowEvent,
};
use crate::instance::{Capabilities, ViewerInstance};
use crate::module::{LoadedModule, ModuleExports, ModuleLoader, ViewerFactory, VisualizationModule};
use crate::options::{Control, ControlOptions, ViewerOptions};
use crate::schedule::YieldingIdleScheduler;
use crate::timing::CheckpointLog;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// Container
// ============================================================================

/// Container element with a settable size
pub struct SimulatedContainer {
    size: Mutex<Size>,
    attributes: Mutex<HashMap<String, String>>,
    observers: Mutex<Vec<mpsc::UnboundedSender<Size>>>,
    observable: bool,
}

impl SimulatedContainer {
    pub fn new(size: Size) -> Self {
        Self {
            size: Mutex::new(size),
            attributes: Mutex::new(HashMap::new()),
            observers: Mutex::new(Vec::new()),
            observable: true,
        }
    }

    /// A container on a host without resize observation support
    pub fn unobservable(size: Size) -> Self {
        Self {
            observable: false,
            ..Self::new(size)
        }
    }

    /// Change the rendered size and notify active observers
    pub fn set_size(&self, size: Size) {
        *lock(&self.size) = size;
        lock(&self.observers).retain(|tx| tx.send(size).is_ok());
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        lock(&self.attributes).get(name).cloned()
    }

    /// Observations that have not been disconnected
    pub fn active_observers(&self) -> usize {
        let mut observers = lock(&self.observers);
        observers.retain(|tx| !tx.is_closed());
        observers.len()
    }
}

impl Container for SimulatedContainer {
    fn size(&self) -> Result<Size> {
        Ok(*lock(&self.size))
    }

    fn set_attribute(&self, name: &str, value: &str) -> Result<()> {
        lock(&self.attributes).insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn observe_resize(&self) -> Option<Box<dyn ResizeObserver>> {
        if !self.observable {
            return None;
        }
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.observers).push(tx);
        Some(Box::new(ChannelResizeObserver { rx: Some(rx) }))
    }
}

/// Resize observation fed by [`SimulatedContainer::set_size`]
pub struct ChannelResizeObserver {
    rx: Option<mpsc::UnboundedReceiver<Size>>,
}

#[async_trait]
impl ResizeObserver for ChannelResizeObserver {
    async fn changed(&mut self) -> bool {
        match self.rx.as_mut() {
            Some(rx) => rx.recv().await.is_some(),
            None => false,
        }
    }

    fn disconnect(&mut self) {
        if let Some(mut rx) = self.rx.take() {
            rx.close();
        }
    }
}

// ============================================================================
// Listener registry
// ============================================================================

/// A listener registration as the page saw it
#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    pub event_type: String,
    pub options: Option<ListenerOptions>,
}

/// Listener registry that records every registration
#[derive(Default)]
pub struct RecordingListenerRegistry {
    hook: Mutex<Option<RegistrationHook>>,
    registrations: Mutex<Vec<Registration>>,
}

impl RecordingListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener, applying the current hook to its options
    pub fn add_event_listener(&self, event_type: &str, options: Option<ListenerOptions>) {
        let hook = lock(&self.hook).clone();
        let options = match hook {
            Some(hook) => hook(event_type, options),
            None => options,
        };
        lock(&self.registrations).push(Registration {
            event_type: event_type.to_string(),
            options,
        });
    }

    pub fn registrations(&self) -> Vec<Registration> {
        lock(&self.registrations).clone()
    }
}

impl ListenerRegistry for RecordingListenerRegistry {
    fn hook(&self) -> Option<RegistrationHook> {
        lock(&self.hook).clone()
    }

    fn set_hook(&self, hook: Option<RegistrationHook>) -> Result<()> {
        *lock(&self.hook) = hook;
        Ok(())
    }
}

// ============================================================================
// Window
// ============================================================================

/// Window that records dispatched events
#[derive(Default)]
pub struct RecordingWindow {
    events: Mutex<Vec<WindowEvent>>,
    global: Mutex<Option<Arc<dyn VisualizationModule>>>,
}

impl RecordingWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<WindowEvent> {
        lock(&self.events).clone()
    }

    pub fn count(&self, event: WindowEvent) -> usize {
        lock(&self.events).iter().filter(|e| **e == event).count()
    }

    /// Expose a module copy on the global scope
    pub fn set_global_module(&self, module: Option<Arc<dyn VisualizationModule>>) {
        *lock(&self.global) = module;
    }
}

impl Window for RecordingWindow {
    fn dispatch(&self, event: WindowEvent) -> Result<()> {
        debug!("Window event: {:?}", event);
        lock(&self.events).push(event);
        Ok(())
    }

    fn global_module(&self) -> Option<Arc<dyn VisualizationModule>> {
        lock(&self.global).clone()
    }
}

// ============================================================================
// Viewer instance
// ============================================================================

/// A call made on a simulated instance
#[derive(Debug, Clone, PartialEq)]
pub enum InstanceCall {
    Resize { width: f64, height: f64 },
    Remove,
    Destroy,
    SetOptions(ControlOptions),
    AddControl(Control),
    Update(ControlOptions),
}

/// Viewer instance that records every call made on it
pub struct SimulatedInstance {
    options: ViewerOptions,
    capabilities: Capabilities,
    calls: Mutex<Vec<InstanceCall>>,
}

impl SimulatedInstance {
    pub fn new(options: ViewerOptions, capabilities: Capabilities) -> Self {
        Self {
            options,
            capabilities,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Capabilities of an instance whose controls go through `api`
    pub fn capabilities_for(api: ControlApi) -> Capabilities {
        let base = Capabilities {
            resize: true,
            remove: true,
            destroy: true,
            ..Capabilities::NONE
        };
        match api {
            ControlApi::SetOptions => Capabilities {
                set_options: true,
                ..base
            },
            ControlApi::AddControl => Capabilities {
                add_control: true,
                ..base
            },
            ControlApi::Update => Capabilities {
                update: true,
                ..base
            },
            ControlApi::None => base,
        }
    }

    /// Options the factory was called with
    pub fn options(&self) -> &ViewerOptions {
        &self.options
    }

    pub fn calls(&self) -> Vec<InstanceCall> {
        lock(&self.calls).clone()
    }

    pub fn resizes(&self) -> Vec<Size> {
        lock(&self.calls)
            .iter()
            .filter_map(|call| match call {
                InstanceCall::Resize { width, height } => Some(Size::new(*width, *height)),
                _ => None,
            })
            .collect()
    }

    /// Number of `remove()`/`destroy()` calls
    pub fn releases(&self) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|call| matches!(call, InstanceCall::Remove | InstanceCall::Destroy))
            .count()
    }

    fn record(&self, call: InstanceCall) {
        lock(&self.calls).push(call);
    }
}

impl ViewerInstance for SimulatedInstance {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn resize(&self, width: f64, height: f64) -> Result<()> {
        self.record(InstanceCall::Resize { width, height });
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        self.record(InstanceCall::Remove);
        Ok(())
    }

    fn destroy(&self) -> Result<()> {
        self.record(InstanceCall::Destroy);
        Ok(())
    }

    fn set_options(&self, options: &ControlOptions) -> Result<()> {
        self.record(InstanceCall::SetOptions(*options));
        Ok(())
    }

    fn add_control(&self, control: Control) -> Result<()> {
        self.record(InstanceCall::AddControl(control));
        Ok(())
    }

    fn update(&self, options: &ControlOptions) -> Result<()> {
        self.record(InstanceCall::Update(*options));
        Ok(())
    }
}

// ============================================================================
// Factory and module
// ============================================================================

/// Event types the widget registers while building its canvas
pub const WIDGET_LISTENERS: [&str; 3] = ["wheel", "touchstart", "mousedown"];

/// Widget factory that fails a configured number of times before succeeding
pub struct SimulatedFactory {
    listeners: Arc<RecordingListenerRegistry>,
    remaining_failures: AtomicU32,
    failure_message: String,
    control_api: ControlApi,
    calls: AtomicU32,
    created: Mutex<Vec<Arc<SimulatedInstance>>>,
}

impl SimulatedFactory {
    pub fn new(config: &SimulationConfig, listeners: Arc<RecordingListenerRegistry>) -> Self {
        Self {
            listeners,
            remaining_failures: AtomicU32::new(config.transient_failures),
            failure_message: config.transient_message.clone(),
            control_api: config.control_api,
            calls: AtomicU32::new(0),
            created: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Instances created so far, oldest first
    pub fn created(&self) -> Vec<Arc<SimulatedInstance>> {
        lock(&self.created).clone()
    }
}

#[async_trait]
impl ViewerFactory for SimulatedFactory {
    async fn create(
        &self,
        container: Arc<dyn Container>,
        options: ViewerOptions,
    ) -> Result<Arc<dyn ViewerInstance>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        for event_type in WIDGET_LISTENERS {
            self.listeners.add_event_listener(event_type, None);
        }

        let failing = self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            debug!("Simulated factory call {} failing", call);
            return Err(ViewerError::Creation(self.failure_message.clone()));
        }

        let size = container.size()?;
        debug!(
            "Simulated factory call {} created viewer at {}x{}",
            call, size.width, size.height
        );
        let instance = Arc::new(SimulatedInstance::new(
            options,
            SimulatedInstance::capabilities_for(self.control_api),
        ));
        lock(&self.created).push(Arc::clone(&instance));
        Ok(instance)
    }
}

/// Visualization module with a timed backend
pub struct SimulatedModule {
    factory: Arc<SimulatedFactory>,
    export_shape: ExportShape,
    has_init: bool,
    init_latency: Duration,
    ready_after: Option<Duration>,
    ready: Arc<AtomicBool>,
    init_calls: AtomicU32,
}

impl SimulatedModule {
    pub fn new(config: &SimulationConfig, factory: Arc<SimulatedFactory>) -> Self {
        Self {
            factory,
            export_shape: config.export_shape,
            has_init: config.has_init,
            init_latency: Duration::from_millis(config.init_latency_ms),
            ready_after: config.backend_ready_after_ms.map(Duration::from_millis),
            ready: Arc::new(AtomicBool::new(false)),
            init_calls: AtomicU32::new(0),
        }
    }

    pub fn factory(&self) -> Arc<SimulatedFactory> {
        Arc::clone(&self.factory)
    }

    pub fn init_calls(&self) -> u32 {
        self.init_calls.load(Ordering::SeqCst)
    }

    /// Start the timer after which the readiness marker appears
    fn start_backend(&self) {
        let Some(delay) = self.ready_after else {
            debug!("Simulated backend never becomes ready");
            return;
        };
        let ready = Arc::clone(&self.ready);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            ready.store(true, Ordering::SeqCst);
        });
    }

    fn as_dyn_factory(&self) -> Arc<dyn ViewerFactory> {
        self.factory.clone()
    }
}

#[async_trait]
impl VisualizationModule for SimulatedModule {
    fn as_factory(&self) -> Option<Arc<dyn ViewerFactory>> {
        (self.export_shape == ExportShape::Direct).then(|| self.as_dyn_factory())
    }

    fn named_factory(&self) -> Option<Arc<dyn ViewerFactory>> {
        (self.export_shape == ExportShape::Named).then(|| self.as_dyn_factory())
    }

    fn default_export(&self) -> Option<Arc<dyn VisualizationModule>> {
        match self.export_shape {
            ExportShape::Default => Some(Arc::new(ModuleExports::callable(self.as_dyn_factory()))),
            ExportShape::DefaultNamed => Some(Arc::new(ModuleExports::named(self.as_dyn_factory()))),
            _ => None,
        }
    }

    fn has_init(&self) -> bool {
        self.has_init
    }

    async fn init(&self) -> Result<()> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.init_latency).await;
        self.start_backend();
        Ok(())
    }

    fn backend_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

/// Script element the loader adds to the page
#[derive(Debug, Default)]
pub struct SimulatedScript {
    removed: AtomicBool,
}

impl SimulatedScript {
    pub fn is_removed(&self) -> bool {
        self.removed.load(Ordering::SeqCst)
    }
}

impl InjectedResource for SimulatedScript {
    fn name(&self) -> String {
        "script#aladin-lite".to_string()
    }

    fn remove(&self) -> Result<()> {
        self.removed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Module loader with a fixed latency
pub struct SimulatedModuleLoader {
    module: Arc<SimulatedModule>,
    script: Arc<SimulatedScript>,
    latency: Duration,
    failure: Option<String>,
    loads: AtomicU32,
}

impl SimulatedModuleLoader {
    pub fn new(config: &SimulationConfig, module: Arc<SimulatedModule>) -> Self {
        Self {
            module,
            script: Arc::new(SimulatedScript::default()),
            latency: Duration::from_millis(config.load_latency_ms),
            failure: None,
            loads: AtomicU32::new(0),
        }
    }

    /// Make every load fail with `message`
    pub fn failing(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    pub fn module(&self) -> Arc<SimulatedModule> {
        Arc::clone(&self.module)
    }

    pub fn script(&self) -> Arc<SimulatedScript> {
        Arc::clone(&self.script)
    }

    pub fn loads(&self) -> u32 {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModuleLoader for SimulatedModuleLoader {
    async fn load(&self) -> Result<LoadedModule> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        if let Some(message) = &self.failure {
            return Err(ViewerError::Load(message.clone()));
        }
        if !self.module.has_init {
            self.module.start_backend();
        }

        let module: Arc<dyn VisualizationModule> = self.module.clone();
        let script: Arc<dyn InjectedResource> = self.script.clone();
        Ok(LoadedModule {
            module,
            resources: vec![script],
        })
    }
}

// ============================================================================
// Host bundle
// ============================================================================

/// A complete simulated page: container, host services and module loader
#[derive(Clone)]
pub struct SimulatedHost {
    pub container: Arc<SimulatedContainer>,
    pub listeners: Arc<RecordingListenerRegistry>,
    pub window: Arc<RecordingWindow>,
    pub timeline: Arc<CheckpointLog>,
    pub loader: Arc<SimulatedModuleLoader>,
}

impl SimulatedHost {
    pub fn from_config(config: &SimulationConfig) -> Self {
        let listeners = Arc::new(RecordingListenerRegistry::new());
        let factory = Arc::new(SimulatedFactory::new(config, Arc::clone(&listeners)));
        let module = Arc::new(SimulatedModule::new(config, factory));
        Self {
            container: Arc::new(SimulatedContainer::new(Size::new(
                config.container_width,
                config.container_height,
            ))),
            listeners,
            window: Arc::new(RecordingWindow::new()),
            timeline: Arc::new(CheckpointLog::new()),
            loader: Arc::new(SimulatedModuleLoader::new(config, module)),
        }
    }

    /// Replace the loader with one whose loads always fail
    pub fn with_failing_loader(mut self, config: &SimulationConfig, message: &str) -> Self {
        self.loader = Arc::new(
            SimulatedModuleLoader::new(config, self.loader.module()).failing(message),
        );
        self
    }

    /// Host services for the pipeline
    pub fn host(&self) -> Host {
        let timeline: Arc<dyn Timeline> = self.timeline.clone();
        Host::new(
            Arc::new(YieldingIdleScheduler),
            self.listeners.clone(),
            self.window.clone(),
            timeline,
        )
    }

    pub fn factory(&self) -> Arc<SimulatedFactory> {
        self.loader.module().factory()
    }

    /// The most recently created instance
    pub fn instance(&self) -> Option<Arc<SimulatedInstance>> {
        self.factory().created().last().cloned()
    }
}
