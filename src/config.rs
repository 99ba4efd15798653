//! Configuration system using Figment.
//!
//! Configuration is loaded from:
//! 1. a TOML file (`epix-live.toml` by default),
//! 2. environment variables prefixed with `EPIX_LIVE_`.
//!
//! Every field has a default, so the pipeline starts with no file at all.
//!
//! # Example
//! ```no_run
//! use epix_live::config::LiveConfig;
//!
//! let config = LiveConfig::load()?;
//! println!("sensor: {:?}", config.sensor.kind);
//! # Ok::<(), epix_live::error::PipelineError>(())
//! ```

use crate::error::Result;
use crate::sensor::Sensor;
use crate::stats::StatsConfig;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    /// Application settings.
    pub application: ApplicationConfig,
    /// Sensor selection and pixel masking.
    pub sensor: SensorConfig,
    /// Dark collection settings.
    pub dark: DarkConfig,
    /// Statistics buffer depths and cadence.
    pub stats: StatsConfig,
    /// Viewer update pacing.
    pub display: DisplayConfig,
    /// Scope channel polarity.
    pub scope: ScopeConfig,
    /// Telemetry history depth.
    pub telemetry: TelemetryConfig,
    /// Optional raw stream tee file.
    pub tee: Option<PathBuf>,
}

/// Application-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Application name used in logs.
    pub name: String,
    /// Logging level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "epix-live".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Sensor selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Camera head driving this pipeline.
    pub kind: Sensor,
    /// Pixel bit mask override; the sensor default applies when absent.
    pub bit_mask: Option<u16>,
    /// Monitoring-channel offset when a timing module occupies the lower
    /// virtual channels.
    pub timing_offset: u8,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            kind: Sensor::EpixHr10kT,
            bit_mask: None,
            timing_offset: 0,
        }
    }
}

impl SensorConfig {
    /// The effective bit mask.
    pub fn effective_bit_mask(&self) -> u16 {
        self.bit_mask.unwrap_or_else(|| self.kind.default_bit_mask())
    }
}

/// Dark collection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DarkConfig {
    /// Frames accumulated per collection unless the viewer overrides it.
    pub default_frames: u32,
}

impl Default for DarkConfig {
    fn default() -> Self {
        Self { default_frames: 10 }
    }
}

/// Viewer update pacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Minimum interval between snapshot pushes per channel kind.
    #[serde(with = "humantime_serde")]
    pub tick: Duration,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(16),
        }
    }
}

/// Scope channel polarity selection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    /// Invert channel A polarity.
    pub invert_a: bool,
    /// Invert channel B polarity.
    pub invert_b: bool,
}

/// Telemetry history depth.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Rolling history length.
    pub history_depth: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self { history_depth: 100 }
    }
}

impl LiveConfig {
    /// Load configuration from `epix-live.toml` and the environment.
    pub fn load() -> Result<Self> {
        Self::load_from("epix-live.toml")
    }

    /// Load configuration from a specific file path, environment overrides
    /// applied on top (`EPIX_LIVE_SENSOR_KIND=ePix100a` etc.).
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config: LiveConfig = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("EPIX_LIVE_").split("_"))
            .extract()?;
        Ok(config)
    }

    /// Validate configuration after loading.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            ));
        }

        if self.sensor.bit_mask == Some(0) {
            return Err("bit_mask must be non-zero".to_string());
        }

        if self.dark.default_frames == 0 {
            return Err("dark.default_frames must be at least 1".to_string());
        }

        if self.stats.recent_depth == 0
            || self.stats.noise_depth == 0
            || self.stats.pixel_series_depth == 0
            || self.stats.histogram_depth == 0
        {
            return Err("stats buffer depths must be at least 1".to_string());
        }

        if self.display.tick.is_zero() {
            return Err("display.tick must be non-zero".to_string());
        }

        if self.stats.noise_interval.is_zero() {
            return Err("stats.noise_interval must be non-zero".to_string());
        }

        if self.telemetry.history_depth == 0 {
            return Err("telemetry.history_depth must be at least 1".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_validate() {
        let config = LiveConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sensor.kind, Sensor::EpixHr10kT);
        assert_eq!(config.sensor.effective_bit_mask(), 0xFFFF);
        assert_eq!(config.display.tick, Duration::from_millis(16));
    }

    #[test]
    fn loads_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("epix-live.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[sensor]\nkind = \"ePix10ka\"\nbit_mask = 0x3FFF\n\n[display]\ntick = \"20ms\"\n"
        )
        .unwrap();

        let config = LiveConfig::load_from(&path).unwrap();
        assert_eq!(config.sensor.kind, Sensor::Epix10ka);
        assert_eq!(config.sensor.bit_mask, Some(0x3FFF));
        assert_eq!(config.display.tick, Duration::from_millis(20));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = LiveConfig::load_from("/nonexistent/epix-live.toml").unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn invalid_log_level_fails_validation() {
        let mut config = LiveConfig::default();
        config.application.log_level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_mask_fails_validation() {
        let mut config = LiveConfig::default();
        config.sensor.bit_mask = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_dark_frames_fails_validation() {
        let mut config = LiveConfig::default();
        config.dark.default_frames = 0;
        assert!(config.validate().is_err());
    }
}
