//! Ownership of the viewer instance and teardown

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::host::InjectedResource;
use crate::instance::{release_instance, ViewerInstance};

enum Slot {
    Empty,
    Occupied(Arc<dyn ViewerInstance>),
    Released,
}

/// Holds the instance: assigned at most once, taken at most once
pub struct InstanceSlot {
    inner: RwLock<Slot>,
}

impl Default for InstanceSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl InstanceSlot {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Slot::Empty),
        }
    }

    /// Store the instance
    ///
    /// Returns `false` if an instance was already assigned or the slot has
    /// been released.
    pub async fn assign(&self, instance: Arc<dyn ViewerInstance>) -> bool {
        let mut slot = self.inner.write().await;
        match *slot {
            Slot::Empty => {
                *slot = Slot::Occupied(instance);
                true
            }
            _ => false,
        }
    }

    pub async fn get(&self) -> Option<Arc<dyn ViewerInstance>> {
        match &*self.inner.read().await {
            Slot::Occupied(instance) => Some(Arc::clone(instance)),
            _ => None,
        }
    }

    /// Take the instance out, closing the slot for good
    pub async fn take(&self) -> Option<Arc<dyn ViewerInstance>> {
        let mut slot = self.inner.write().await;
        match std::mem::replace(&mut *slot, Slot::Released) {
            Slot::Occupied(instance) => Some(instance),
            _ => None,
        }
    }
}

/// Tracks everything a mount owns and releases it exactly once
pub struct LifecycleManager {
    cancel: CancellationToken,
    slot: Arc<InstanceSlot>,
    coordinator: Mutex<Option<JoinHandle<()>>>,
    resources: Mutex<Vec<Arc<dyn InjectedResource>>>,
    torn_down: AtomicBool,
}

impl Default for LifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleManager {
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            slot: Arc::new(InstanceSlot::new()),
            coordinator: Mutex::new(None),
            resources: Mutex::new(Vec::new()),
            torn_down: AtomicBool::new(false),
        }
    }

    /// The destroyed flag every pipeline stage checks
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_destroyed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn slot(&self) -> Arc<InstanceSlot> {
        Arc::clone(&self.slot)
    }

    /// Take ownership of a page resource to remove on teardown
    ///
    /// After teardown the resource is removed right away.
    pub fn track_resource(&self, resource: Arc<dyn InjectedResource>) {
        if self.is_destroyed() {
            remove_resource(resource.as_ref());
            return;
        }
        if let Ok(mut resources) = self.resources.lock() {
            resources.push(resource);
        }
    }

    /// Take ownership of a freshly created instance
    ///
    /// Returns `false` when the mount was torn down in the meantime; the
    /// instance is then released immediately.
    pub async fn adopt(&self, instance: Arc<dyn ViewerInstance>) -> bool {
        if !self.is_destroyed() && self.slot.assign(Arc::clone(&instance)).await {
            return true;
        }
        debug!("Viewer instance created after teardown, releasing it");
        release(instance.as_ref());
        false
    }

    /// Hand over the resize coordinator task
    pub fn attach_coordinator(&self, handle: JoinHandle<()>) {
        if self.is_destroyed() {
            handle.abort();
            return;
        }
        if let Ok(mut coordinator) = self.coordinator.lock() {
            if let Some(previous) = coordinator.replace(handle) {
                previous.abort();
            }
        }
    }

    /// Release everything the mount owns
    ///
    /// Sets the destroyed flag first, then stops the resize coordinator
    /// (which disconnects its observer), releases the instance and removes
    /// injected resources. Every step's failure is logged and swallowed.
    /// Returns `false` if teardown already happened.
    pub async fn teardown(&self) -> bool {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            debug!("Viewer already torn down");
            return false;
        }
        self.cancel.cancel();

        let coordinator = self
            .coordinator
            .lock()
            .ok()
            .and_then(|mut coordinator| coordinator.take());
        if let Some(handle) = coordinator {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    warn!("Resize coordinator ended abnormally: {}", e);
                }
            }
        }

        if let Some(instance) = self.slot.take().await {
            release(instance.as_ref());
        }

        let resources = self
            .resources
            .lock()
            .map(|mut resources| std::mem::take(&mut *resources))
            .unwrap_or_default();
        for resource in resources {
            remove_resource(resource.as_ref());
        }

        info!("Viewer torn down");
        true
    }
}

fn release(instance: &dyn ViewerInstance) {
    match release_instance(instance) {
        Ok(Some(method)) => debug!("Viewer instance released via {}()", method),
        Ok(None) => debug!("Viewer instance has no remove() or destroy()"),
        Err(e) => warn!("Failed to release viewer instance: {}", e),
    }
}

fn remove_resource(resource: &dyn InjectedResource) {
    match resource.remove() {
        Ok(()) => debug!("Removed injected resource {}", resource.name()),
        Err(e) => warn!("Failed to remove injected resource {}: {}", resource.name(), e),
    }
}
