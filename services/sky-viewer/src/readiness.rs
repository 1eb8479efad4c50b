//! Waiting for the module's native computation backend

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Result, ViewerError};
use crate::host::{Host, Window};
use crate::module::VisualizationModule;
use crate::schedule::run_when_idle;
use crate::timing;

/// How the wait for the backend ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    /// The marker never showed up; the pipeline carries on regardless
    TimedOut,
}

/// Whether the readiness marker is visible anywhere the library puts it
///
/// Checks the module, the copy the library exposes on the global scope, and
/// the module's `default` export.
pub fn backend_ready(module: &dyn VisualizationModule, window: &dyn Window) -> bool {
    module.backend_ready()
        || window
            .global_module()
            .is_some_and(|global| global.backend_ready())
        || module
            .default_export()
            .is_some_and(|default| default.backend_ready())
}

/// Run the module's `init()` entry point, if it has one, in an idle window
pub async fn initialize_backend(
    module: &dyn VisualizationModule,
    host: &Host,
    cancel: &CancellationToken,
) -> Result<()> {
    if !module.has_init() {
        debug!("Module has no init entry point");
        return Ok(());
    }

    host.timeline.mark(timing::INIT_START);
    debug!("Initializing visualization backend");
    run_when_idle(host.idle.as_ref(), cancel, module.init())
        .await
        .ok_or(ViewerError::Cancelled)?
        .map_err(|e| match e {
            ViewerError::BackendInit(_) => e,
            other => ViewerError::BackendInit(other.to_string()),
        })?;
    host.timeline.mark(timing::INIT_END);
    Ok(())
}

/// Poll for the readiness marker every `interval`, giving up after `timeout`
///
/// The first check happens immediately. Giving up is not an error.
pub async fn wait_for_backend(
    module: &dyn VisualizationModule,
    window: &dyn Window,
    interval: Duration,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<Readiness> {
    let poll = async {
        let mut ticker = tokio::time::interval(interval);
        let mut checks = 0u32;
        loop {
            ticker.tick().await;
            checks += 1;
            if backend_ready(module, window) {
                return checks;
            }
        }
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ViewerError::Cancelled),
        result = tokio::time::timeout(timeout, poll) => match result {
            Ok(checks) => {
                debug!("Visualization backend ready after {} checks", checks);
                Ok(Readiness::Ready)
            }
            Err(_) => {
                warn!(
                    "Visualization backend not ready after {:?}, continuing without it",
                    timeout
                );
                Ok(Readiness::TimedOut)
            }
        },
    }
}
