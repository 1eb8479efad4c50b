//! Step definitions for creation_retry.feature

use crate::world::SkyViewerWorld;
use cucumber::{given, then};
use std::time::Duration;

#[given(expr = "the widget fails {int} time(s) with {string}")]
fn widget_fails(world: &mut SkyViewerWorld, failures: u32, message: String) {
    world.simulation.transient_failures = failures;
    world.simulation.transient_message = message;
}

#[given(expr = "at most {int} creation attempts")]
fn max_attempts(world: &mut SkyViewerWorld, attempts: u32) {
    world.pipeline.max_attempts = attempts;
}

#[then(expr = "the retried attempts waited {string} ms")]
async fn retried_delays(world: &mut SkyViewerWorld, delays: String) {
    world.await_outcome().await;
    let expected: Vec<Duration> = delays
        .split(',')
        .map(|d| Duration::from_millis(d.trim().parse().expect("delay must be a number")))
        .collect();
    let actual: Vec<Duration> = world.viewer().attempts().iter().map(|a| a.delay).collect();
    assert_eq!(actual, expected);
}

#[then("no attempt was retried")]
async fn no_retries(world: &mut SkyViewerWorld) {
    world.await_outcome().await;
    assert!(world.viewer().attempts().is_empty());
}
