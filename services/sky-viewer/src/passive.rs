//! Passive-listener scope for the widget factory call
//!
//! The widget registers touch and wheel listeners without options while it
//! builds its canvas. Non-passive listeners of these types block scrolling,
//! so for the duration of the factory call registrations of those types
//! that pass no options are made passive.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use tracing::{debug, warn};

use crate::error::Result;
use crate::host::{ListenerOptions, ListenerRegistry, RegistrationHook};

/// Event types forced to passive when registered without options
pub const PASSIVE_EVENT_TYPES: [&str; 3] = ["touchstart", "touchmove", "wheel"];

/// Options a registration ends up with inside the scope
pub fn passive_options(event_type: &str, options: Option<ListenerOptions>) -> Option<ListenerOptions> {
    match options {
        None if PASSIVE_EVENT_TYPES.contains(&event_type) => Some(ListenerOptions {
            passive: true,
            ..ListenerOptions::default()
        }),
        other => other,
    }
}

struct ActiveScope {
    depth: usize,
    previous: Option<RegistrationHook>,
}

/// Scopes currently open, keyed by registry address
///
/// A page has one registry shared by every viewer on it, so overlapping
/// factory calls share one installed hook. It goes in with the first scope
/// and the hook found at that point is restored when the last one closes.
fn active_scopes() -> MutexGuard<'static, HashMap<usize, ActiveScope>> {
    static ACTIVE: OnceLock<Mutex<HashMap<usize, ActiveScope>>> = OnceLock::new();
    ACTIVE
        .get_or_init(Mutex::default)
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

fn registry_key(registry: &dyn ListenerRegistry) -> usize {
    std::ptr::from_ref(registry).cast::<()>() as usize
}

/// Guard that keeps the passive hook installed until dropped
///
/// The hook that was active when the outermost scope opened is chained
/// behind the passive rewrite and restored when the last scope drops.
pub struct PassiveListenerScope<'a> {
    registry: &'a dyn ListenerRegistry,
    key: usize,
}

impl<'a> PassiveListenerScope<'a> {
    pub fn acquire(registry: &'a dyn ListenerRegistry) -> Result<Self> {
        let key = registry_key(registry);
        let mut active = active_scopes();
        if let Some(scope) = active.get_mut(&key) {
            scope.depth += 1;
            return Ok(Self { registry, key });
        }

        let previous = registry.hook();
        let chained = previous.clone();
        let hook: RegistrationHook = Arc::new(move |event_type: &str, options: Option<ListenerOptions>| {
            let options = passive_options(event_type, options);
            match &chained {
                Some(inner) => inner(event_type, options),
                None => options,
            }
        });
        registry.set_hook(Some(hook))?;
        active.insert(key, ActiveScope { depth: 1, previous });
        Ok(Self { registry, key })
    }
}

impl Drop for PassiveListenerScope<'_> {
    fn drop(&mut self) {
        let mut active = active_scopes();
        let Some(scope) = active.get_mut(&self.key) else {
            return;
        };
        scope.depth -= 1;
        if scope.depth > 0 {
            return;
        }
        if let Some(scope) = active.remove(&self.key) {
            if let Err(e) = self.registry.set_hook(scope.previous) {
                warn!("Failed to restore listener registration hook: {}", e);
            }
        }
    }
}

/// Run `task` with passive touch/wheel registration in effect
///
/// If the registry refuses the hook the task runs unwrapped.
///
/// `task` is only called once the scope is in place, so registrations made
/// synchronously while building the future are covered too.
pub async fn with_passive_listeners<F, Fut>(registry: &dyn ListenerRegistry, task: F) -> Fut::Output
where
    F: FnOnce() -> Fut,
    Fut: Future,
{
    let _scope = match PassiveListenerScope::acquire(registry) {
        Ok(scope) => Some(scope),
        Err(e) => {
            debug!("Listener interception unavailable: {}", e);
            None
        }
    };
    task().await
}
