//! Idle-time scheduling

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::Result;
use crate::host::IdleScheduler;

/// Idle scheduler for hosts without a native idle callback
///
/// Yields to the runtime once, so work queued ahead of the caller runs first.
#[derive(Debug, Default, Clone)]
pub struct YieldingIdleScheduler;

#[async_trait]
impl IdleScheduler for YieldingIdleScheduler {
    async fn idle(&self) -> Result<()> {
        tokio::task::yield_now().await;
        Ok(())
    }
}

/// Wait for an idle window, or a zero-delay timer if the host has none
pub async fn wait_for_idle(idle: &dyn IdleScheduler) {
    if let Err(e) = idle.idle().await {
        debug!("Idle scheduling unavailable ({}), using timer fallback", e);
        tokio::time::sleep(Duration::ZERO).await;
    }
}

/// Run `task` once the host is idle
///
/// Returns `None` without polling `task` if `cancel` fires first.
pub async fn run_when_idle<F>(
    idle: &dyn IdleScheduler,
    cancel: &CancellationToken,
    task: F,
) -> Option<F::Output>
where
    F: Future,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => return None,
        _ = wait_for_idle(idle) => {}
    }
    if cancel.is_cancelled() {
        return None;
    }
    Some(task.await)
}
