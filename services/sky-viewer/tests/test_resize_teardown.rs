//! Resize coordination and teardown against the simulated host

use std::sync::Arc;
use std::time::Duration;

use sky_viewer::host::{InjectedResource, Size, WindowEvent};
use sky_viewer::simulation::{InstanceCall, SimulatedContainer, SimulatedHost, SimulatedScript};
use sky_viewer::{
    InitializationState, SidebarService, SimulationConfig, SkyViewer, ViewerEvent,
};

fn simulation() -> SimulationConfig {
    SimulationConfig {
        load_latency_ms: 0,
        init_latency_ms: 0,
        backend_ready_after_ms: Some(0),
        container_width: 800.0,
        container_height: 600.0,
        ..SimulationConfig::default()
    }
}

async fn ready_viewer(sim: &SimulatedHost, sidebar: Option<&SidebarService>) -> SkyViewer {
    let mut builder = SkyViewer::builder(sim.container.clone(), sim.loader.clone(), sim.host());
    if let Some(sidebar) = sidebar {
        builder = builder.layout_changes(sidebar.subscribe());
    }
    let viewer = builder.build().unwrap();
    let event = viewer.mount().recv().await.unwrap();
    assert!(matches!(event, ViewerEvent::Ready(_)));
    viewer
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

#[tokio::test(start_paused = true)]
async fn container_resize_reaches_instance_without_window_event() {
    let sim = SimulatedHost::from_config(&simulation());
    let viewer = ready_viewer(&sim, None).await;
    settle().await;

    sim.container.set_size(Size::new(1024.0, 768.0));
    settle().await;

    let instance = sim.instance().unwrap();
    assert_eq!(instance.resizes(), vec![Size::new(1024.0, 768.0)]);
    assert_eq!(sim.window.count(WindowEvent::Resize), 0);
    viewer.unmount().await;
}

#[tokio::test(start_paused = true)]
async fn sidebar_toggle_resizes_after_layout_settles() {
    let sim = SimulatedHost::from_config(&simulation());
    let sidebar = SidebarService::new(sim.window.clone(), Duration::from_millis(250));
    let viewer = ready_viewer(&sim, Some(&sidebar)).await;
    let instance = sim.instance().unwrap();

    // The current collapse state is replayed on attach
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(instance.resizes().len(), 1);
    assert_eq!(sim.window.count(WindowEvent::Resize), 1);

    sim.container.set_size(Size::new(1000.0, 600.0));
    sidebar.set_collapsed(true);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(instance.resizes().len(), 2);
    assert_eq!(sim.window.count(WindowEvent::SidebarToggled(true)), 1);

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(
        instance.resizes().last().copied(),
        Some(Size::new(1000.0, 600.0))
    );
    assert_eq!(instance.resizes().len(), 3);
    assert_eq!(sim.window.count(WindowEvent::Resize), 2);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(sim.window.count(WindowEvent::Resize), 3);

    viewer.unmount().await;
}

#[tokio::test(start_paused = true)]
async fn unobservable_container_follows_sidebar_only() {
    let mut sim = SimulatedHost::from_config(&simulation());
    sim.container = Arc::new(SimulatedContainer::unobservable(Size::new(800.0, 600.0)));
    let sidebar = SidebarService::new(sim.window.clone(), Duration::from_millis(250));
    let viewer = SkyViewer::builder(sim.container.clone(), sim.loader.clone(), sim.host())
        .layout_changes(sidebar.subscribe())
        .build()
        .unwrap();

    let mut state = viewer.watch_state();
    let _events = viewer.mount();
    state
        .wait_for(|s| *s == InitializationState::Ready)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    let instance = sim.instance().unwrap();
    assert_eq!(sim.container.active_observers(), 0);
    assert_eq!(instance.resizes(), vec![Size::new(800.0, 600.0)]);

    sim.container.set_size(Size::new(1000.0, 600.0));
    settle().await;
    assert_eq!(instance.resizes().len(), 1);

    sidebar.set_collapsed(true);
    tokio::time::sleep(Duration::from_millis(110)).await;
    assert_eq!(
        instance.resizes().last().copied(),
        Some(Size::new(1000.0, 600.0))
    );
    assert_eq!(instance.resizes().len(), 2);

    viewer.unmount().await;
    assert_eq!(*state.borrow_and_update(), InitializationState::TornDown);
}

#[tokio::test(start_paused = true)]
async fn unmount_releases_everything_once() {
    let sim = SimulatedHost::from_config(&simulation());
    let viewer = ready_viewer(&sim, None).await;
    let extra = Arc::new(SimulatedScript::default());
    viewer.track_resource(extra.clone());
    settle().await;
    assert_eq!(sim.container.active_observers(), 1);

    viewer.unmount().await;
    viewer.unmount().await;

    let instance = sim.instance().unwrap();
    assert_eq!(instance.releases(), 1);
    assert_eq!(instance.calls().last(), Some(&InstanceCall::Remove));
    assert!(sim.loader.script().is_removed());
    assert!(extra.is_removed());
    assert_eq!(sim.container.active_observers(), 0);
    assert_eq!(viewer.state(), InitializationState::TornDown);
    assert!(viewer.is_destroyed());
    assert!(viewer.instance().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn no_resize_after_unmount() {
    let sim = SimulatedHost::from_config(&simulation());
    let sidebar = SidebarService::new(sim.window.clone(), Duration::from_millis(250));
    let viewer = ready_viewer(&sim, Some(&sidebar)).await;
    tokio::time::sleep(Duration::from_millis(150)).await;
    let instance = sim.instance().unwrap();
    let before = instance.resizes().len();

    viewer.unmount().await;
    sim.container.set_size(Size::new(10.0, 10.0));
    sidebar.toggle();
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(instance.resizes().len(), before);
}

#[tokio::test(start_paused = true)]
async fn unmount_during_retry_backoff_stops_creation() {
    let sim = SimulatedHost::from_config(&SimulationConfig {
        transient_failures: 10,
        ..simulation()
    });
    let viewer = SkyViewer::builder(sim.container.clone(), sim.loader.clone(), sim.host())
        .build()
        .unwrap();
    let mut events = viewer.mount();

    while sim.factory().calls() == 0 {
        settle().await;
    }
    viewer.unmount().await;
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(sim.factory().calls(), 1);
    assert!(events.try_recv().is_err());
    assert_eq!(viewer.state(), InitializationState::TornDown);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_viewer_tears_it_down() {
    let sim = SimulatedHost::from_config(&simulation());
    let viewer = ready_viewer(&sim, None).await;
    let instance = sim.instance().unwrap();

    drop(viewer);
    settle().await;

    assert_eq!(instance.releases(), 1);
    assert!(sim.loader.script().is_removed());
}

#[tokio::test]
async fn resource_name_identifies_script() {
    let script = SimulatedScript::default();
    assert!(script.name().contains("script"));
}
