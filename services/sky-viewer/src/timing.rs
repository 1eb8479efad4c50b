//! Diagnostic checkpoints recorded on the host timeline

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use crate::host::Timeline;

pub const IMPORT_START: &str = "viewer:import-start";
pub const IMPORT_END: &str = "viewer:import-end";
pub const INIT_START: &str = "viewer:init-start";
pub const INIT_END: &str = "viewer:init-end";
pub const CREATE_START: &str = "viewer:create-start";
pub const CREATE_END: &str = "viewer:create-end";
pub const CREATE: &str = "viewer:create";
pub const CONTROLS_START: &str = "viewer:controls-enable-start";
pub const CONTROLS_END: &str = "viewer:controls-enable-end";
pub const CONTROLS: &str = "viewer:controls-enable";

/// A recorded mark
#[derive(Debug, Clone, PartialEq)]
pub struct Mark {
    pub name: String,
    pub at: Instant,
}

/// A recorded measure between two marks
#[derive(Debug, Clone, PartialEq)]
pub struct Measure {
    pub name: String,
    pub duration: Duration,
}

#[derive(Debug, Default)]
struct Entries {
    marks: Vec<Mark>,
    measures: Vec<Measure>,
}

/// In-memory timeline
///
/// A measure whose start or end mark was never recorded is dropped, the
/// same way `performance.measure` throws for unknown marks.
#[derive(Debug, Default)]
pub struct CheckpointLog {
    entries: Mutex<Entries>,
}

impl CheckpointLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn marks(&self) -> Vec<String> {
        self.lock().marks.iter().map(|m| m.name.clone()).collect()
    }

    pub fn measures(&self) -> Vec<Measure> {
        self.lock().measures.clone()
    }

    pub fn measure_named(&self, name: &str) -> Option<Duration> {
        self.lock()
            .measures
            .iter()
            .rev()
            .find(|m| m.name == name)
            .map(|m| m.duration)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Entries> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Timeline for CheckpointLog {
    fn mark(&self, name: &str) {
        tracing::trace!("mark {}", name);
        self.lock().marks.push(Mark {
            name: name.to_string(),
            at: Instant::now(),
        });
    }

    fn measure(&self, name: &str, start_mark: &str, end_mark: &str) {
        let mut entries = self.lock();
        let find = |mark: &str| {
            entries
                .marks
                .iter()
                .rev()
                .find(|m| m.name == mark)
                .map(|m| m.at)
        };
        let (Some(start), Some(end)) = (find(start_mark), find(end_mark)) else {
            tracing::debug!(
                "Skipping measure '{}': missing mark '{}' or '{}'",
                name,
                start_mark,
                end_mark
            );
            return;
        };
        let duration = end.saturating_duration_since(start);
        tracing::debug!("{} took {:?}", name, duration);
        entries.measures.push(Measure {
            name: name.to_string(),
            duration,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn measure_between_marks() {
        let log = CheckpointLog::new();
        log.mark(CREATE_START);
        tokio::time::advance(Duration::from_millis(250)).await;
        log.mark(CREATE_END);
        log.measure(CREATE, CREATE_START, CREATE_END);

        assert_eq!(log.marks(), vec![CREATE_START, CREATE_END]);
        assert_eq!(log.measure_named(CREATE), Some(Duration::from_millis(250)));
    }

    #[test]
    fn measure_with_missing_mark_is_skipped() {
        let log = CheckpointLog::new();
        log.mark(CONTROLS_START);
        log.measure(CONTROLS, CONTROLS_START, CONTROLS_END);

        assert!(log.measures().is_empty());
        assert_eq!(log.measure_named(CONTROLS), None);
    }
}
