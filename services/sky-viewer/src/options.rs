//! Option objects handed to the viewer widget

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::ViewerConfig;

/// An optional UI control of the viewer widget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Control {
    Layers,
    Zoom,
    Fullscreen,
}

impl Control {
    /// Name the widget's `addControl` expects
    pub fn name(&self) -> &'static str {
        match self {
            Control::Layers => "layers",
            Control::Zoom => "zoom",
            Control::Fullscreen => "fullscreen",
        }
    }
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Requested visibility of the optional controls
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlOptions {
    pub show_layers_control: bool,
    pub show_zoom_control: bool,
    pub show_full_screen_control: bool,
}

impl ControlOptions {
    pub fn from_config(config: &ViewerConfig) -> Self {
        Self {
            show_layers_control: config.show_layers_control,
            show_zoom_control: config.show_zoom_control,
            show_full_screen_control: config.show_fullscreen_control,
        }
    }

    /// Enabled controls, in layers/zoom/fullscreen order
    pub fn requested(&self) -> Vec<Control> {
        [
            (self.show_layers_control, Control::Layers),
            (self.show_zoom_control, Control::Zoom),
            (self.show_full_screen_control, Control::Fullscreen),
        ]
        .into_iter()
        .filter_map(|(enabled, control)| enabled.then_some(control))
        .collect()
    }
}

/// Construction options passed to the widget factory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerOptions {
    pub survey: String,
    pub fov: f64,
    pub target: String,
    pub show_reticle: bool,
    #[serde(flatten)]
    pub controls: ControlOptions,
}

impl ViewerOptions {
    /// Options for the first render: controls stay off until the viewer is up
    pub fn minimal(config: &ViewerConfig) -> Self {
        Self {
            survey: config.survey.clone(),
            fov: config.fov,
            target: config.target.clone(),
            show_reticle: config.show_reticle,
            controls: ControlOptions::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_options_disable_controls() {
        let config = ViewerConfig {
            show_reticle: true,
            show_layers_control: true,
            show_zoom_control: true,
            show_fullscreen_control: true,
            ..ViewerConfig::default()
        };

        let options = ViewerOptions::minimal(&config);
        assert_eq!(options.target, "M42");
        assert!(options.show_reticle);
        assert_eq!(options.controls, ControlOptions::default());
    }

    #[test]
    fn requested_controls_follow_flags() {
        let config = ViewerConfig {
            show_layers_control: true,
            show_fullscreen_control: true,
            ..ViewerConfig::default()
        };

        let controls = ControlOptions::from_config(&config);
        assert_eq!(
            controls.requested(),
            vec![Control::Layers, Control::Fullscreen]
        );
        assert!(ControlOptions::default().requested().is_empty());
    }

    #[test]
    fn options_serialize_with_widget_field_names() {
        let options = ViewerOptions::minimal(&ViewerConfig::default());
        let json = serde_json::to_value(&options).unwrap();

        assert_eq!(json["fov"], 60.0);
        assert_eq!(json["showReticle"], false);
        assert_eq!(json["showLayersControl"], false);
        assert_eq!(json["showFullScreenControl"], false);
    }
}
