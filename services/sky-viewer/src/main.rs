//! Sky Viewer CLI
//!
//! Mounts the viewer against the simulated host and reports the outcome.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use sky_viewer::{load_config, Config, SidebarService, SimulatedHost, SkyViewer, ViewerEvent};
use tracing::Level;

#[derive(Parser)]
#[command(name = "sky-viewer")]
#[command(about = "Bootstrap the sky viewer against a simulated page")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Initial target (overrides config file)
    #[arg(long)]
    target: Option<String>,

    /// Field of view in degrees (overrides config file)
    #[arg(long)]
    fov: Option<f64>,

    /// Survey URL or identifier (overrides config file)
    #[arg(long)]
    survey: Option<String>,

    /// Collapse the sidebar once the viewer is ready
    #[arg(long)]
    toggle_sidebar: bool,

    /// Keep the viewer mounted this long, in milliseconds (default: until Ctrl-C)
    #[arg(long)]
    hold_ms: Option<u64>,

    /// Log level
    #[arg(short, long, default_value = "info", value_parser = parse_log_level)]
    log_level: Level,
}

fn parse_log_level(s: &str) -> Result<Level, String> {
    s.parse().map_err(|_| {
        format!(
            "Invalid log level: {}. Use: trace, debug, info, warn, error",
            s
        )
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .init();

    tracing::debug!(
        "Parsed command line arguments: config={:?}, target={:?}, fov={:?}, survey={:?}, log_level={:?}",
        args.config,
        args.target,
        args.fov,
        args.survey,
        args.log_level
    );

    let mut config = if let Some(config_path) = &args.config {
        tracing::debug!("Loading configuration from {:?}", config_path);
        load_config(config_path)?
    } else {
        tracing::debug!("Using default configuration");
        Config::default()
    };

    if let Some(target) = args.target {
        config.viewer.target = target;
    }
    if let Some(fov) = args.fov {
        config.viewer.fov = fov;
    }
    if let Some(survey) = args.survey {
        config.viewer.survey = survey;
    }
    config.validate()?;

    tracing::info!("Starting sky viewer");
    tracing::info!("Target: {}, fov: {}", config.viewer.target, config.viewer.fov);
    tracing::info!("Survey: {}", config.viewer.survey);

    let sim = SimulatedHost::from_config(&config.simulation);
    let sidebar = SidebarService::new(sim.window.clone(), config.pipeline.sidebar_settle());
    let viewer = SkyViewer::builder(sim.container.clone(), sim.loader.clone(), sim.host())
        .config(config.viewer.clone())
        .pipeline(config.pipeline.clone())
        .layout_changes(sidebar.subscribe())
        .build()?;

    let mut events = viewer.mount();
    let outcome = tokio::select! {
        event = events.recv() => event,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted before the viewer was ready");
            viewer.unmount().await;
            return Ok(());
        }
    };

    match outcome {
        Ok(ViewerEvent::Ready(instance)) => {
            tracing::info!(
                "Viewer ready after {} retried attempts (capabilities: {:?})",
                viewer.attempts().len(),
                instance.capabilities()
            );
        }
        Ok(ViewerEvent::Error(e)) => {
            tracing::error!("Viewer failed: {}", e);
            viewer.unmount().await;
            return Err(e.to_string().into());
        }
        Err(e) => {
            viewer.unmount().await;
            return Err(e.into());
        }
    }

    if args.toggle_sidebar {
        sidebar.toggle();
    }

    match args.hold_ms {
        Some(hold_ms) => tokio::time::sleep(Duration::from_millis(hold_ms)).await,
        None => {
            tracing::info!("Viewer mounted, press Ctrl-C to unmount");
            tokio::signal::ctrl_c().await?;
        }
    }

    viewer.unmount().await;
    for measure in sim.timeline.measures() {
        tracing::info!("{}: {:?}", measure.name, measure.duration);
    }
    if let Some(instance) = sim.instance() {
        tracing::debug!("Instance calls: {:?}", instance.calls());
    }

    Ok(())
}
