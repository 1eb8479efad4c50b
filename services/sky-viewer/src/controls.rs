//! Enabling the optional UI controls after first render

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::Result;
use crate::host::Host;
use crate::instance::ViewerInstance;
use crate::options::{Control, ControlOptions};
use crate::schedule::run_when_idle;
use crate::timing;

/// Which instance method the controls were applied through
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlsApplied {
    SetOptions,
    /// One `addControl` call per listed control
    AddControl(Vec<Control>),
    Update,
    /// The instance has no way to change controls
    Unsupported,
}

/// Apply the requested controls through the first capability available
///
/// Priority: `setOptions`, then `addControl` per requested control, then
/// `update`.
pub fn apply_controls(
    instance: &dyn ViewerInstance,
    controls: &ControlOptions,
) -> Result<ControlsApplied> {
    let capabilities = instance.capabilities();
    if capabilities.set_options {
        instance.set_options(controls)?;
        return Ok(ControlsApplied::SetOptions);
    }
    if capabilities.add_control {
        let requested = controls.requested();
        for control in &requested {
            instance.add_control(*control)?;
        }
        return Ok(ControlsApplied::AddControl(requested));
    }
    if capabilities.update {
        instance.update(controls)?;
        return Ok(ControlsApplied::Update);
    }
    Ok(ControlsApplied::Unsupported)
}

/// Apply controls in the next idle window, ignoring any failure
///
/// Returns `None` when cancelled or when applying failed.
pub async fn enable_controls(
    instance: Arc<dyn ViewerInstance>,
    controls: ControlOptions,
    host: &Host,
    cancel: &CancellationToken,
) -> Option<ControlsApplied> {
    host.timeline.mark(timing::CONTROLS_START);
    let outcome = run_when_idle(host.idle.as_ref(), cancel, async {
        apply_controls(instance.as_ref(), &controls)
    })
    .await;

    let applied = match outcome {
        None => {
            debug!("Viewer torn down before controls were enabled");
            None
        }
        Some(Ok(applied)) => {
            debug!("Controls enabled via {:?}", applied);
            Some(applied)
        }
        Some(Err(e)) => {
            debug!("Enabling controls failed, ignoring: {}", e);
            None
        }
    };

    host.timeline.mark(timing::CONTROLS_END);
    host.timeline
        .measure(timing::CONTROLS, timing::CONTROLS_START, timing::CONTROLS_END);
    applied
}
