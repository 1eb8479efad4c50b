//! Creating the viewer instance

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Result, ViewerError};
use crate::host::{Container, Host};
use crate::instance::ViewerInstance;
use crate::module::ViewerFactory;
use crate::options::ViewerOptions;
use crate::passive::with_passive_listeners;
use crate::retry::{retry_transient, RetryAttempt, RetryPolicy};
use crate::schedule::run_when_idle;

/// Invoke the factory with minimal options, retrying transient failures
///
/// Every attempt runs in its own idle window inside a passive-listener
/// scope. Retried failures are appended to `history`.
pub async fn create_instance(
    factory: Arc<dyn ViewerFactory>,
    container: Arc<dyn Container>,
    options: &ViewerOptions,
    host: &Host,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    history: &mut Vec<RetryAttempt>,
) -> Result<Arc<dyn ViewerInstance>> {
    retry_transient(policy, cancel, history, |attempt| {
        let factory = Arc::clone(&factory);
        let container = Arc::clone(&container);
        let options = options.clone();
        async move {
            debug!("Creating viewer instance (attempt {})", attempt + 1);
            let call = with_passive_listeners(host.listeners.as_ref(), || {
                factory.create(container, options)
            });
            match run_when_idle(host.idle.as_ref(), cancel, call).await {
                Some(Err(ViewerError::Cancelled)) => Err(ViewerError::Creation(
                    "factory reported cancellation".to_string(),
                )),
                Some(result) => result,
                None => Err(ViewerError::Cancelled),
            }
        }
    })
    .await
}
