//! Sidebar collapse broadcast

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::host::{Window, WindowEvent};

/// Shares the sidebar's collapse state with layout-dependent components
///
/// Every [`set_collapsed`](SidebarService::set_collapsed) is published, even
/// when the value is unchanged. The window also gets `app:sidebar-toggled`
/// right away and a generic `resize` once the collapse transition settled.
pub struct SidebarService {
    tx: watch::Sender<bool>,
    window: Arc<dyn Window>,
    settle: Duration,
}

impl SidebarService {
    pub fn new(window: Arc<dyn Window>, settle: Duration) -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx, window, settle }
    }

    /// Collapse-state stream; the current value counts as unseen
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        let mut rx = self.tx.subscribe();
        rx.mark_changed();
        rx
    }

    pub fn is_collapsed(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn toggle(&self) {
        self.set_collapsed(!self.is_collapsed());
    }

    pub fn set_collapsed(&self, collapsed: bool) {
        self.tx.send_replace(collapsed);
        debug!("Sidebar collapsed: {}", collapsed);

        if let Err(e) = self.window.dispatch(WindowEvent::SidebarToggled(collapsed)) {
            warn!("Failed to dispatch sidebar toggle event: {}", e);
        }

        let window = Arc::clone(&self.window);
        let settle = self.settle;
        tokio::spawn(async move {
            tokio::time::sleep(settle).await;
            if let Err(e) = window.dispatch(WindowEvent::Resize) {
                warn!("Failed to dispatch resize event: {}", e);
            }
        });
    }
}
