//! Initialization state of a mounted viewer

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

/// Where the bootstrap pipeline currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitializationState {
    NotStarted,
    ModuleLoading,
    BackendPolling,
    InstanceCreating,
    Ready,
    Failed,
    TornDown,
}

impl InitializationState {
    /// Whether no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, InitializationState::Failed | InitializationState::TornDown)
    }

    pub fn can_transition_to(&self, next: InitializationState) -> bool {
        use InitializationState::*;
        match (self, next) {
            (from, _) if from.is_terminal() => false,
            (_, Failed) => *self != Ready,
            (_, TornDown) => true,
            (NotStarted, ModuleLoading)
            | (ModuleLoading, BackendPolling)
            | (BackendPolling, InstanceCreating)
            | (InstanceCreating, Ready) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for InitializationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InitializationState::NotStarted => write!(f, "NotStarted"),
            InitializationState::ModuleLoading => write!(f, "ModuleLoading"),
            InitializationState::BackendPolling => write!(f, "BackendPolling"),
            InitializationState::InstanceCreating => write!(f, "InstanceCreating"),
            InitializationState::Ready => write!(f, "Ready"),
            InitializationState::Failed => write!(f, "Failed"),
            InitializationState::TornDown => write!(f, "TornDown"),
        }
    }
}

/// Publishes state changes to any number of observers
#[derive(Debug)]
pub struct StateTracker {
    tx: watch::Sender<InitializationState>,
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StateTracker {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(InitializationState::NotStarted);
        Self { tx }
    }

    pub fn current(&self) -> InitializationState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<InitializationState> {
        self.tx.subscribe()
    }

    /// Move to `next` if the transition is legal
    ///
    /// Returns whether the state changed.
    pub fn advance(&self, next: InitializationState) -> bool {
        self.tx.send_if_modified(|state| {
            if state.can_transition_to(next) {
                debug!("Viewer state {} -> {}", state, next);
                *state = next;
                true
            } else {
                false
            }
        })
    }
}
