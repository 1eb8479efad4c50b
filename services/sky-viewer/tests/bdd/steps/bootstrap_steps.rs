//! Step definitions for viewer_bootstrap.feature

use crate::world::SkyViewerWorld;
use cucumber::{given, then, when};
use sky_viewer::host::WindowEvent;
use sky_viewer::simulation::InstanceCall;
use sky_viewer::timing;
use sky_viewer::{
    Control, ControlApi, ControlOptions, ExportShape, InitializationState, ViewerEvent,
    READY_ATTRIBUTE,
};
use tokio::time::{sleep, Duration};

fn parse_controls(list: &str) -> Vec<Control> {
    list.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| {
            serde_json::from_value(serde_json::Value::String(name.to_string()))
                .unwrap_or_else(|_| panic!("unknown control {name}"))
        })
        .collect()
}

// ============================================================================
// Given steps
// ============================================================================

#[given("a simulated page")]
fn simulated_page(world: &mut SkyViewerWorld) {
    world.fast_page();
}

#[given(expr = "the module exports the factory as {string}")]
fn module_export_shape(world: &mut SkyViewerWorld, shape: String) {
    world.simulation.export_shape =
        serde_json::from_value(serde_json::Value::String(shape.clone()))
            .unwrap_or_else(|_| panic!("unknown export shape {shape}"));
}

#[given("the module exports no factory")]
fn module_without_factory(world: &mut SkyViewerWorld) {
    world.simulation.export_shape = ExportShape::Empty;
}

#[given(expr = "the viewer targets {string} with a field of view of {float} degrees")]
fn viewer_target(world: &mut SkyViewerWorld, target: String, fov: f64) {
    world.viewer_config.target = target;
    world.viewer_config.fov = fov;
}

#[given(expr = "the controls {string} are requested")]
fn controls_requested(world: &mut SkyViewerWorld, list: String) {
    for control in parse_controls(&list) {
        match control {
            Control::Layers => world.viewer_config.show_layers_control = true,
            Control::Zoom => world.viewer_config.show_zoom_control = true,
            Control::Fullscreen => world.viewer_config.show_fullscreen_control = true,
        }
    }
}

#[given("the instance only supports addControl")]
fn instance_add_control_only(world: &mut SkyViewerWorld) {
    world.simulation.control_api = ControlApi::AddControl;
}

#[given("the backend never reports ready")]
fn backend_never_ready(world: &mut SkyViewerWorld) {
    world.simulation.backend_ready_after_ms = None;
}

#[given(expr = "a readiness timeout of {int} ms")]
fn readiness_timeout(world: &mut SkyViewerWorld, timeout_ms: u64) {
    world.pipeline.readiness_timeout_ms = timeout_ms;
}

// ============================================================================
// When steps
// ============================================================================

#[when("the viewer is mounted")]
async fn viewer_mounted(world: &mut SkyViewerWorld) {
    world.mount();
}

#[when("the viewer has finished starting")]
async fn viewer_started(world: &mut SkyViewerWorld) {
    world.await_outcome().await;
    for _ in 0..200 {
        if world.sim().timeline.measure_named(timing::CONTROLS).is_some() {
            return;
        }
        sleep(Duration::from_millis(5)).await;
    }
}

// ============================================================================
// Then steps
// ============================================================================

#[then("the viewer reports ready")]
async fn viewer_reports_ready(world: &mut SkyViewerWorld) {
    let event = world.await_outcome().await;
    assert!(
        matches!(event, ViewerEvent::Ready(_)),
        "expected ready, got {event:?}"
    );
    assert_eq!(world.viewer().state(), InitializationState::Ready);
}

#[then(expr = "the viewer reports the error {string}")]
async fn viewer_reports_error(world: &mut SkyViewerWorld, expected: String) {
    let event = world.await_outcome().await;
    match event {
        ViewerEvent::Error(e) => assert!(
            e.to_string().contains(&expected),
            "error '{e}' does not contain '{expected}'"
        ),
        other => panic!("expected error, got {other:?}"),
    }
    assert_eq!(world.viewer().state(), InitializationState::Failed);
}

#[then("the container is marked ready")]
fn container_marked_ready(world: &mut SkyViewerWorld) {
    assert_eq!(
        world.sim().container.attribute(READY_ATTRIBUTE).as_deref(),
        Some("true")
    );
}

#[then("the container is not marked ready")]
fn container_not_marked_ready(world: &mut SkyViewerWorld) {
    assert!(world.sim().container.attribute(READY_ATTRIBUTE).is_none());
}

#[then("the window received the viewer ready event")]
fn window_got_ready_event(world: &mut SkyViewerWorld) {
    assert_eq!(world.sim().window.count(WindowEvent::ViewerReady), 1);
}

#[then(expr = "the factory was called {int} time(s)")]
fn factory_calls(world: &mut SkyViewerWorld, expected: u32) {
    assert_eq!(world.sim().factory().calls(), expected);
}

#[then(expr = "the factory received target {string} with all controls disabled")]
fn factory_options(world: &mut SkyViewerWorld, target: String) {
    let instance = world.sim().instance().expect("no instance created");
    assert_eq!(instance.options().target, target);
    assert_eq!(instance.options().controls, ControlOptions::default());
}

#[then(expr = "the controls {string} are enabled through setOptions")]
fn controls_via_set_options(world: &mut SkyViewerWorld, list: String) {
    let requested = parse_controls(&list);
    let instance = world.sim().instance().expect("no instance created");
    let expected = ControlOptions {
        show_layers_control: requested.contains(&Control::Layers),
        show_zoom_control: requested.contains(&Control::Zoom),
        show_full_screen_control: requested.contains(&Control::Fullscreen),
    };
    assert_eq!(instance.calls(), vec![InstanceCall::SetOptions(expected)]);
}

#[then(expr = "the controls {string} are added one by one")]
fn controls_via_add_control(world: &mut SkyViewerWorld, list: String) {
    let expected: Vec<InstanceCall> = parse_controls(&list)
        .into_iter()
        .map(InstanceCall::AddControl)
        .collect();
    let instance = world.sim().instance().expect("no instance created");
    assert_eq!(instance.calls(), expected);
}

#[then("widget wheel and touch listeners were registered as passive")]
fn widget_listeners_passive(world: &mut SkyViewerWorld) {
    let registrations = world.sim().listeners.registrations();
    assert!(!registrations.is_empty());
    for registration in registrations {
        let passive = registration.options.is_some_and(|o| o.passive);
        let expected = matches!(registration.event_type.as_str(), "wheel" | "touchstart");
        assert_eq!(passive, expected, "{}", registration.event_type);
    }
}
