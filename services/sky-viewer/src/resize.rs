//! Keeping the viewer sized to its container

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::host::{Container, ResizeObserver, Size, Window, WindowEvent};
use crate::lifecycle::InstanceSlot;

/// Forwards container size changes to the instance
///
/// Container observations resize immediately. Layout changes (sidebar
/// toggles) first wait `settle` for the layout to finish moving, then resize
/// and broadcast a window `resize` for other layout-dependent code.
#[derive(Clone)]
pub struct ResizeCoordinator {
    container: Arc<dyn Container>,
    slot: Arc<InstanceSlot>,
    window: Arc<dyn Window>,
    settle: Duration,
    cancel: CancellationToken,
}

impl ResizeCoordinator {
    pub fn new(
        container: Arc<dyn Container>,
        slot: Arc<InstanceSlot>,
        window: Arc<dyn Window>,
        settle: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            container,
            slot,
            window,
            settle,
            cancel,
        }
    }

    /// Pass the container's current size to the instance
    ///
    /// Returns the forwarded size, or `None` when there was nothing to
    /// resize or resizing failed.
    pub async fn resize_to_container(&self) -> Option<Size> {
        if self.cancel.is_cancelled() {
            return None;
        }
        let instance = self.slot.get().await?;
        if !instance.capabilities().resize {
            return None;
        }

        let size = match self.container.size() {
            Ok(size) => size,
            Err(e) => {
                warn!("Failed to read container size: {}", e);
                return None;
            }
        };
        match instance.resize(size.width, size.height) {
            Ok(()) => {
                debug!("Viewer resized to {}x{}", size.width, size.height);
                Some(size)
            }
            Err(e) => {
                warn!("Failed to resize viewer: {}", e);
                None
            }
        }
    }

    /// React to a layout change once it has settled
    pub async fn on_layout_changed(&self) {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return,
            _ = tokio::time::sleep(self.settle) => {}
        }
        self.resize_to_container().await;
        if let Err(e) = self.window.dispatch(WindowEvent::Resize) {
            warn!("Failed to dispatch resize event: {}", e);
        }
    }

    /// Drive both sources until teardown
    ///
    /// The observer is disconnected when the task ends.
    pub fn spawn(
        self,
        observer: Option<Box<dyn ResizeObserver>>,
        layout: Option<watch::Receiver<bool>>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(observer, layout).await })
    }

    async fn run(
        &self,
        mut observer: Option<Box<dyn ResizeObserver>>,
        mut layout: Option<watch::Receiver<bool>>,
    ) {
        debug!(
            "Resize coordinator started (observer: {}, layout: {})",
            observer.is_some(),
            layout.is_some()
        );
        loop {
            if observer.is_none() && layout.is_none() {
                debug!("No resize sources left");
                break;
            }
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                changed = next_observation(&mut observer) => {
                    if changed {
                        self.resize_to_container().await;
                    } else {
                        debug!("Container observation ended");
                        observer = None;
                    }
                }
                collapsed = next_layout(&mut layout) => match collapsed {
                    Some(collapsed) => {
                        debug!("Layout changed (sidebar collapsed: {})", collapsed);
                        self.on_layout_changed().await;
                    }
                    None => layout = None,
                },
            }
        }

        if let Some(mut observer) = observer {
            observer.disconnect();
        }
        debug!("Resize coordinator stopped");
    }
}

async fn next_observation(observer: &mut Option<Box<dyn ResizeObserver>>) -> bool {
    match observer {
        Some(observer) => observer.changed().await,
        None => std::future::pending().await,
    }
}

async fn next_layout(layout: &mut Option<watch::Receiver<bool>>) -> Option<bool> {
    match layout {
        Some(rx) => match rx.changed().await {
            Ok(()) => Some(*rx.borrow_and_update()),
            Err(_) => None,
        },
        None => std::future::pending().await,
    }
}
