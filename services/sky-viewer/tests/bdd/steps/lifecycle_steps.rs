//! Step definitions for resize_and_teardown.feature

use crate::world::SkyViewerWorld;
use cucumber::{then, when};
use sky_viewer::host::{Size, WindowEvent};
use sky_viewer::InitializationState;
use tokio::time::{sleep, Duration};

// ============================================================================
// When steps
// ============================================================================

#[when(expr = "the container is resized to {int}x{int}")]
async fn container_resized(world: &mut SkyViewerWorld, width: u32, height: u32) {
    world
        .sim()
        .container
        .set_size(Size::new(f64::from(width), f64::from(height)));
    sleep(Duration::from_millis(10)).await;
}

#[when("the sidebar is collapsed")]
fn sidebar_collapsed(world: &mut SkyViewerWorld) {
    world
        .sidebar
        .as_ref()
        .expect("viewer not mounted")
        .set_collapsed(true);
}

#[when(expr = "{int} ms pass")]
async fn time_passes(_world: &mut SkyViewerWorld, millis: u64) {
    sleep(Duration::from_millis(millis)).await;
}

#[when("the viewer is unmounted")]
async fn viewer_unmounted(world: &mut SkyViewerWorld) {
    world.viewer().unmount().await;
}

#[when("the viewer is unmounted again")]
async fn viewer_unmounted_again(world: &mut SkyViewerWorld) {
    world.viewer().unmount().await;
}

// ============================================================================
// Then steps
// ============================================================================

#[then(expr = "the instance was last resized to {int}x{int}")]
fn instance_resized_to(world: &mut SkyViewerWorld, width: u32, height: u32) {
    let instance = world.sim().instance().expect("no instance created");
    assert_eq!(
        instance.resizes().last().copied(),
        Some(Size::new(f64::from(width), f64::from(height)))
    );
}

#[then(expr = "the instance was resized {int} time(s)")]
fn instance_resize_count(world: &mut SkyViewerWorld, expected: usize) {
    let instance = world.sim().instance().expect("no instance created");
    assert_eq!(instance.resizes().len(), expected);
}

#[then(expr = "the window received {int} resize event(s)")]
fn window_resize_events(world: &mut SkyViewerWorld, expected: usize) {
    assert_eq!(world.sim().window.count(WindowEvent::Resize), expected);
}

#[then("the window was told the sidebar collapsed")]
fn window_sidebar_event(world: &mut SkyViewerWorld) {
    assert_eq!(
        world.sim().window.count(WindowEvent::SidebarToggled(true)),
        1
    );
}

#[then("the instance was released once")]
fn instance_released_once(world: &mut SkyViewerWorld) {
    let instance = world.sim().instance().expect("no instance created");
    assert_eq!(instance.releases(), 1);
}

#[then("the injected script was removed")]
fn script_removed(world: &mut SkyViewerWorld) {
    assert!(world.sim().loader.script().is_removed());
}

#[then("the container is no longer observed")]
fn container_unobserved(world: &mut SkyViewerWorld) {
    assert_eq!(world.sim().container.active_observers(), 0);
}

#[then("the viewer is torn down")]
fn viewer_torn_down(world: &mut SkyViewerWorld) {
    assert!(world.viewer().is_destroyed());
    assert_eq!(world.viewer().state(), InitializationState::TornDown);
}

#[then("no viewer event was emitted")]
fn no_event(world: &mut SkyViewerWorld) {
    let events = world.events.as_mut().expect("viewer not mounted");
    assert!(events.try_recv().is_err());
}
