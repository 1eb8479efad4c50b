//! World struct for sky viewer BDD tests

use std::fmt;
use std::time::Duration;

use cucumber::World;
use sky_viewer::simulation::SimulatedHost;
use sky_viewer::{
    PipelineConfig, SidebarService, SimulationConfig, SkyViewer, ViewerConfig, ViewerEvent,
};
use tokio::sync::broadcast;

#[derive(Default, World)]
pub struct SkyViewerWorld {
    pub simulation: SimulationConfig,
    pub viewer_config: ViewerConfig,
    pub pipeline: PipelineConfig,
    pub sim: Option<SimulatedHost>,
    pub sidebar: Option<SidebarService>,
    pub viewer: Option<SkyViewer>,
    pub events: Option<broadcast::Receiver<ViewerEvent>>,
    pub outcome: Option<ViewerEvent>,
}

impl fmt::Debug for SkyViewerWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SkyViewerWorld")
            .field("simulation", &self.simulation)
            .field("viewer_config", &self.viewer_config)
            .field("state", &self.viewer.as_ref().map(|v| v.state()))
            .field("outcome", &self.outcome)
            .finish()
    }
}

impl SkyViewerWorld {
    /// A page whose module loads and initializes without delay
    pub fn fast_page(&mut self) {
        self.simulation = SimulationConfig {
            load_latency_ms: 0,
            init_latency_ms: 0,
            backend_ready_after_ms: Some(0),
            ..SimulationConfig::default()
        };
    }

    pub fn sim(&self) -> &SimulatedHost {
        self.sim.as_ref().expect("viewer not mounted")
    }

    pub fn viewer(&self) -> &SkyViewer {
        self.viewer.as_ref().expect("viewer not mounted")
    }

    /// Build the page and viewer and start the pipeline
    pub fn mount(&mut self) {
        let sim = SimulatedHost::from_config(&self.simulation);
        let sidebar = SidebarService::new(sim.window.clone(), self.pipeline.sidebar_settle());
        let viewer = SkyViewer::builder(sim.container.clone(), sim.loader.clone(), sim.host())
            .config(self.viewer_config.clone())
            .pipeline(self.pipeline.clone())
            .layout_changes(sidebar.subscribe())
            .build()
            .expect("invalid viewer configuration");

        self.events = Some(viewer.mount());
        self.sim = Some(sim);
        self.sidebar = Some(sidebar);
        self.viewer = Some(viewer);
    }

    /// Wait for the pipeline outcome
    pub async fn await_outcome(&mut self) -> &ViewerEvent {
        if self.outcome.is_none() {
            let events = self.events.as_mut().expect("viewer not mounted");
            let event = tokio::time::timeout(Duration::from_secs(15), events.recv())
                .await
                .expect("no viewer event within 15 s")
                .expect("event channel closed");
            self.outcome = Some(event);
        }
        self.outcome.as_ref().expect("outcome recorded")
    }
}
