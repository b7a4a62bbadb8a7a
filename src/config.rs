//! Startup configuration.
//!
//! Values come from three layers, later ones winning: built-in defaults
//! (matching the reference 42x40 panel), an optional JSON file, and command
//! line flags applied by `main`. Everything is validated once, before the
//! loop starts; nothing is re-checked per frame.
//!
//! Runtime toggles never write back here.

use crate::camera::CameraOptions;
use crate::mapping::{Layout, WiringMode};
use crate::preview::DEFAULT_SCALE;
use crate::strip::LedOptions;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fs;
use std::path::Path;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// LEDs across.
    pub width: u32,
    /// LEDs down.
    pub height: u32,
    pub wiring: WiringMode,
    /// False when logical (0, 0) is the bottom-left LED.
    pub origin_top_left: bool,
    pub mirror: bool,
    pub show_grid: bool,
    pub show_fps: bool,
    /// Start on the test pattern instead of the camera.
    pub start_in_test: bool,
    /// Preview magnification.
    pub scale: u32,
    pub chaser_delay_ms: u64,
    /// Minimum time between preview snapshots.
    pub preview_interval_ms: u64,
    pub camera: CameraOptions,
    pub led: LedOptions,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            width: 42,
            height: 40,
            wiring: WiringMode::RowsSnake,
            origin_top_left: true,
            mirror: false,
            show_grid: true,
            show_fps: true,
            start_in_test: false,
            scale: DEFAULT_SCALE,
            chaser_delay_ms: 2,
            preview_interval_ms: 500,
            camera: CameraOptions::default(),
            led: LedOptions::default(),
        }
    }
}

impl Config {
    /// Read a JSON config file. Missing fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self, Box<dyn Error>> {
        let text = fs::read_to_string(path)
            .map_err(|e| format!("cannot read config {}: {e}", path.display()))?;
        let config = serde_json::from_str(&text)
            .map_err(|e| format!("invalid config {}: {e}", path.display()))?;
        Ok(config)
    }

    /// Check everything the loop relies on and build the initial layout.
    pub fn validate(&self) -> Result<Layout, Box<dyn Error>> {
        let layout = Layout::new(self.width, self.height, self.wiring, self.origin_top_left)?;

        if self.scale == 0 {
            return Err("preview scale must be at least 1".into());
        }
        // The preview is two magnified panels side by side.
        let preview_width = self.width.checked_mul(self.scale).and_then(|w| w.checked_mul(2));
        let preview_height = self.height.checked_mul(self.scale);
        if preview_width.is_none() || preview_height.is_none() {
            return Err(format!(
                "preview scale {} is too large for a {}x{} grid",
                self.scale, self.width, self.height
            )
            .into());
        }
        if self.led.channel > 1 {
            return Err(format!("LED channel must be 0 or 1, got {}", self.led.channel).into());
        }
        let camera = &self.camera;
        if camera.width == 0 || camera.height == 0 || camera.fps == 0 {
            return Err(format!(
                "camera mode {}x{} @ {} fps is invalid",
                camera.width, camera.height, camera.fps
            )
            .into());
        }

        Ok(layout)
    }

    /// Pretty JSON of the effective configuration.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strip::ColorOrder;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, body: &str) -> std::path::PathBuf {
        let path = dir.path().join("config.json");
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn default_is_reference_panel() {
        let config = Config::default();
        let layout = config.validate().unwrap();
        assert_eq!((layout.width(), layout.height()), (42, 40));
        assert_eq!(layout.wiring(), WiringMode::RowsSnake);
        assert!(layout.origin_top_left());
        assert_eq!(config.scale, DEFAULT_SCALE);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(
            &tmp,
            r#"{ "width": 16, "wiring": "cols_snake", "led": { "color_order": "grb" } }"#,
        );

        let config = Config::load(&path).unwrap();

        assert_eq!(config.width, 16);
        assert_eq!(config.height, 40);
        assert_eq!(config.wiring, WiringMode::ColsSnake);
        assert_eq!(config.led.color_order, ColorOrder::Grb);
        assert_eq!(config.led.pin, 18);
    }

    #[test]
    fn unknown_wiring_mode_is_rejected_at_load() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(&tmp, r#"{ "wiring": "spiral" }"#);
        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("spiral"), "{err}");
    }

    #[test]
    fn unknown_field_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(&tmp, r#"{ "widht": 10 }"#);
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        assert!(Config::load(&tmp.path().join("nope.json")).is_err());
    }

    #[test]
    fn zero_width_fails_validation() {
        let config = Config {
            width: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_scale_fails_validation() {
        let config = Config {
            scale: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn oversized_scale_fails_validation() {
        let config = Config {
            scale: u32::MAX / 40,
            ..Config::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("too large"), "{err}");
    }

    #[test]
    fn largest_fitting_scale_passes_validation() {
        let config = Config {
            width: 2,
            height: 1,
            scale: u32::MAX / 4,
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn bad_led_channel_fails_validation() {
        let mut config = Config::default();
        config.led.channel = 2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_camera_fps_fails_validation() {
        let mut config = Config::default();
        config.camera.fps = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn json_output_reloads_identically() {
        let tmp = TempDir::new().unwrap();
        let original = Config {
            mirror: true,
            start_in_test: true,
            ..Config::default()
        };
        let path = write_config(&tmp, &original.to_json().unwrap());
        assert_eq!(Config::load(&path).unwrap(), original);
    }
}
