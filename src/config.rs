//! Persistent settings (`freehand.json` in the config directory).

use std::path::Path;

use log::{info, warn};

use crate::entities::transform::normalize_degrees;
use crate::error::Result;

/// Settings file name inside the config directory
pub const SETTINGS_FILE: &str = "freehand.json";

/// Application settings
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct Settings {
    // Layer appearance
    pub default_transparency: i64, // 0..=100 (default 30)
    pub transparency_step: i64,    // +/- per increase/decrease (default 10)
    pub default_blend_mode: String,

    // Numeric controls
    pub rotation_min: f64, // displayed rotation range
    pub rotation_max: f64,
    pub rotation_step: f64,
    pub scale_min: f64,
    pub scale_max: f64,
    pub scale_step: f64,

    // Placement
    pub placement_dpi: f64,            // screen dpi for paper-scale placement
    pub placement_scale: Option<f64>, // 1:N paper scale, None = fit the view

    // Export
    pub export_rotation_in_world_file: bool,
    pub export_world_file_only: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_transparency: 30,
            transparency_step: 10,
            default_blend_mode: "SourceOver".to_string(),
            rotation_min: -180.0,
            rotation_max: 180.0,
            rotation_step: 0.1,
            scale_min: 0.001,
            scale_max: 100.0,
            scale_step: 0.01,
            placement_dpi: 96.0,
            placement_scale: None,
            export_rotation_in_world_file: true,
            export_world_file_only: false,
        }
    }
}

impl Settings {
    /// Load settings, falling back to defaults when the file is missing
    /// or unreadable.
    pub fn load(path: &Path) -> Self {
        let json = match std::fs::read_to_string(path) {
            Ok(json) => json,
            Err(_) => {
                info!("No settings at {}, using defaults", path.display());
                return Self::default();
            }
        };
        match serde_json::from_str(&json) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Invalid settings {}: {}, using defaults", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Wrap a rotation entered in a numeric control into (-180, 180], then
    /// clamp it to the displayed range.
    pub fn clamp_rotation(&self, degrees: f64) -> f64 {
        let d = normalize_degrees(degrees);
        let d = if d > 180.0 { d - 360.0 } else { d };
        d.clamp(self.rotation_min, self.rotation_max)
    }

    /// Clamp a scale entered in a numeric control.
    pub fn clamp_scale(&self, scale: f64) -> f64 {
        scale.clamp(self.scale_min, self.scale_max)
    }
}
