//! The viewer instance handle and its optional capabilities
//!
//! The widget returns an opaque object whose methods vary between releases.
//! Callers probe [`ViewerInstance::capabilities`] before dispatching and
//! never assume a fixed shape.

use crate::error::{Result, ViewerError};
use crate::options::{Control, ControlOptions};

/// The set of optional methods an instance exposes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub resize: bool,
    pub remove: bool,
    pub destroy: bool,
    pub set_options: bool,
    pub add_control: bool,
    pub update: bool,
}

impl Capabilities {
    pub const NONE: Capabilities = Capabilities {
        resize: false,
        remove: false,
        destroy: false,
        set_options: false,
        add_control: false,
        update: false,
    };

    pub const ALL: Capabilities = Capabilities {
        resize: true,
        remove: true,
        destroy: true,
        set_options: true,
        add_control: true,
        update: true,
    };
}

/// Handle to a live viewer widget
///
/// Every capability method has a default that reports
/// [`ViewerError::Unsupported`]; implementations override the ones they
/// advertise in [`capabilities`](ViewerInstance::capabilities).
#[cfg_attr(test, mockall::automock)]
pub trait ViewerInstance: Send + Sync {
    /// Methods this instance actually exposes
    fn capabilities(&self) -> Capabilities;

    /// Tell the widget its container now has the given size in CSS pixels
    fn resize(&self, _width: f64, _height: f64) -> Result<()> {
        Err(ViewerError::Unsupported("resize"))
    }

    fn remove(&self) -> Result<()> {
        Err(ViewerError::Unsupported("remove"))
    }

    fn destroy(&self) -> Result<()> {
        Err(ViewerError::Unsupported("destroy"))
    }

    fn set_options(&self, _options: &ControlOptions) -> Result<()> {
        Err(ViewerError::Unsupported("setOptions"))
    }

    fn add_control(&self, _control: Control) -> Result<()> {
        Err(ViewerError::Unsupported("addControl"))
    }

    fn update(&self, _options: &ControlOptions) -> Result<()> {
        Err(ViewerError::Unsupported("update"))
    }
}

/// Release an instance through `remove()`, falling back to `destroy()`
///
/// Returns the name of the method that was called, or `None` when the
/// instance offers neither.
pub fn release_instance(instance: &dyn ViewerInstance) -> Result<Option<&'static str>> {
    let capabilities = instance.capabilities();
    if capabilities.remove {
        instance.remove()?;
        Ok(Some("remove"))
    } else if capabilities.destroy {
        instance.destroy()?;
        Ok(Some("destroy"))
    } else {
        Ok(None)
    }
}
