use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};

use crate::error::ViewError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    Horizontal,
    Vertical,
}

impl Orientation {
    pub fn is_horizontal(self) -> bool {
        matches!(self, Orientation::Horizontal)
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub orientation: Orientation,
    pub gap: i32,
    pub fling_margin: i32,
    pub min_scale: f32,
    pub max_scale: f32,
    pub reflow_scale_factor: f32,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub slide_duration: Duration,
    pub fling_friction: f32,
    pub gestures: GestureConfig,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            orientation: Orientation::Horizontal,
            gap: 20,
            fling_margin: 100,
            min_scale: 1.0,
            max_scale: 5.0,
            reflow_scale_factor: 0.5,
            slide_duration: Duration::from_millis(400),
            fling_friction: 0.015,
            gestures: GestureConfig::default(),
        }
    }
}

impl ViewerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {:?}", path))?;
        Self::from_toml(&raw).with_context(|| format!("failed to parse config file {:?}", path))
    }

    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: ViewerConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Scale range for the given layout mode.
    pub fn scale_range(&self, reflow: bool) -> (f32, f32) {
        let factor = if reflow { self.reflow_scale_factor } else { 1.0 };
        (self.min_scale * factor, self.max_scale * factor)
    }

    pub fn validate(&self) -> Result<(), ViewError> {
        if !(self.min_scale.is_finite() && self.min_scale > 0.0) {
            return Err(ViewError::Config(format!(
                "min_scale must be positive, got {}",
                self.min_scale
            )));
        }
        if !self.max_scale.is_finite() || self.max_scale < self.min_scale {
            return Err(ViewError::Config(format!(
                "max_scale {} is below min_scale {}",
                self.max_scale, self.min_scale
            )));
        }
        if !(self.reflow_scale_factor.is_finite() && self.reflow_scale_factor > 0.0) {
            return Err(ViewError::Config(format!(
                "reflow_scale_factor must be positive, got {}",
                self.reflow_scale_factor
            )));
        }
        if self.gap < 0 || self.fling_margin < 0 {
            return Err(ViewError::Config(
                "gap and fling_margin must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    pub touch_slop: f32,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub double_tap_timeout: Duration,
    pub double_tap_slop: f32,
    pub min_fling_velocity: f32,
    pub max_fling_velocity: f32,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub velocity_window: Duration,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            touch_slop: 8.0,
            double_tap_timeout: Duration::from_millis(300),
            double_tap_slop: 100.0,
            min_fling_velocity: 50.0,
            max_fling_velocity: 8000.0,
            velocity_window: Duration::from_millis(100),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let config = ViewerConfig::from_toml("gap = 32\n[gestures]\ntouch_slop = 4.0\n").unwrap();
        assert_eq!(config.gap, 32);
        assert_eq!(config.fling_margin, 100);
        assert_eq!(config.slide_duration, Duration::from_millis(400));
        assert_eq!(config.gestures.touch_slop, 4.0);
        assert_eq!(
            config.gestures.double_tap_timeout,
            Duration::from_millis(300)
        );
    }

    #[test]
    fn durations_are_read_as_milliseconds() {
        let config = ViewerConfig::from_toml(
            "orientation = \"vertical\"\nslide_duration = 250\n",
        )
        .unwrap();
        assert_eq!(config.orientation, Orientation::Vertical);
        assert_eq!(config.slide_duration, Duration::from_millis(250));
    }

    #[test]
    fn inverted_scale_range_is_rejected() {
        let err = ViewerConfig::from_toml("min_scale = 2.0\nmax_scale = 1.0\n").unwrap_err();
        assert!(err.to_string().contains("max_scale"));
    }

    #[test]
    fn reflow_halves_the_scale_range() {
        let config = ViewerConfig::default();
        assert_eq!(config.scale_range(true), (0.5, 2.5));
        assert_eq!(config.scale_range(false), (1.0, 5.0));
    }

    #[test]
    fn load_or_default_tolerates_missing_file() {
        let dir = tempdir().unwrap();
        let config = ViewerConfig::load_or_default(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config.gap, 20);

        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "fling_margin = 64\n").unwrap();
        let config = ViewerConfig::load_or_default(&path).unwrap();
        assert_eq!(config.fling_margin, 64);
    }
}
