//! Host environment traits
//!
//! The pipeline never touches the page directly. Everything it needs from
//! the embedding environment (the container element, idle scheduling,
//! listener registration, window-level events, performance marks) goes
//! through the traits in this module. This keeps the pipeline testable with
//! mockall and lets the simulated host in [`crate::simulation`] stand in for
//! a browser.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::module::VisualizationModule;

/// Rendered size of an element in CSS pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

// ============================================================================
// Container
// ============================================================================

/// The element the viewer is mounted into
#[cfg_attr(test, mockall::automock)]
pub trait Container: Send + Sync {
    /// Current rendered size
    fn size(&self) -> Result<Size>;

    /// Set a DOM attribute on the element
    fn set_attribute(&self, name: &str, value: &str) -> Result<()>;

    /// Start observing size changes
    ///
    /// Returns `None` when the host has no resize observation support.
    fn observe_resize(&self) -> Option<Box<dyn ResizeObserver>>;
}

/// An active size observation on a container
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait ResizeObserver: Send {
    /// Wait for the next size change
    ///
    /// Returns `false` once the observation has ended and no further
    /// changes will be reported.
    async fn changed(&mut self) -> bool;

    /// Stop observing
    fn disconnect(&mut self);
}

// ============================================================================
// Idle scheduling
// ============================================================================

/// Source of idle windows (`requestIdleCallback` in a browser)
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait IdleScheduler: Send + Sync {
    /// Resolve at the next idle window
    ///
    /// Returns an error when the host cannot schedule idle callbacks; the
    /// caller then falls back to a zero-delay timer.
    async fn idle(&self) -> Result<()>;
}

// ============================================================================
// Listener registration
// ============================================================================

/// Options of an event listener registration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerOptions {
    pub passive: bool,
    pub capture: bool,
    pub once: bool,
}

/// Rewrites the options of a listener registration
///
/// Receives the event type and the options the registering code passed.
pub type RegistrationHook =
    Arc<dyn Fn(&str, Option<ListenerOptions>) -> Option<ListenerOptions> + Send + Sync>;

/// Global event listener registration (`EventTarget.prototype.addEventListener`)
#[cfg_attr(test, mockall::automock)]
pub trait ListenerRegistry: Send + Sync {
    /// The hook currently applied to new registrations
    fn hook(&self) -> Option<RegistrationHook>;

    /// Replace the hook applied to new registrations
    fn set_hook(&self, hook: Option<RegistrationHook>) -> Result<()>;
}

// ============================================================================
// Window
// ============================================================================

/// Window-level notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowEvent {
    /// Generic `resize`, for layout-dependent code that does not own the viewer
    Resize,
    /// `app:sidebar-toggled`, carrying the new collapsed state
    SidebarToggled(bool),
    /// `aladin-ready`, dispatched once the viewer instance exists
    ViewerReady,
}

/// The global scope of the page
#[cfg_attr(test, mockall::automock)]
pub trait Window: Send + Sync {
    fn dispatch(&self, event: WindowEvent) -> Result<()>;

    /// Copy of the visualization module the library exposes on the global scope
    fn global_module(&self) -> Option<Arc<dyn VisualizationModule>>;
}

// ============================================================================
// Diagnostics
// ============================================================================

/// Performance timeline (`performance.mark` / `performance.measure`)
#[cfg_attr(test, mockall::automock)]
pub trait Timeline: Send + Sync {
    fn mark(&self, name: &str);

    fn measure(&self, name: &str, start_mark: &str, end_mark: &str);
}

/// Something added to the page on the viewer's behalf, e.g. a script element
#[cfg_attr(test, mockall::automock)]
pub trait InjectedResource: Send + Sync {
    fn name(&self) -> String;

    /// Detach the resource from the page
    fn remove(&self) -> Result<()>;
}

/// Bundle of host services shared by the pipeline stages
#[derive(Clone)]
pub struct Host {
    pub idle: Arc<dyn IdleScheduler>,
    pub listeners: Arc<dyn ListenerRegistry>,
    pub window: Arc<dyn Window>,
    pub timeline: Arc<dyn Timeline>,
}

impl Host {
    pub fn new(
        idle: Arc<dyn IdleScheduler>,
        listeners: Arc<dyn ListenerRegistry>,
        window: Arc<dyn Window>,
        timeline: Arc<dyn Timeline>,
    ) -> Self {
        Self {
            idle,
            listeners,
            window,
            timeline,
        }
    }
}
