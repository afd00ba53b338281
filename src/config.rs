//! Configuration System using Figment
//!
//! Strongly-typed configuration for the interface finder. Values are layered,
//! lowest precedence first:
//! 1. Built-in defaults ([`FinderConfig::default`])
//! 2. A TOML file (default: `config/finder.toml`; a missing file is not an error)
//! 3. Environment variables prefixed with `FINDER_`, nested keys separated by `__`
//!
//! # Environment Variable Overrides
//!
//! ```text
//! FINDER_APPLICATION__LOG_LEVEL=debug
//! FINDER_SCAN__COARSE__STEP=25
//! FINDER_EXPOSURE__MIN_BRIGHTNESS=90
//! FINDER_SCAN__SETTLE=250ms
//! ```
//!
//! # Example
//!
//! ```no_run
//! use interface_finder::config::FinderConfig;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = FinderConfig::load()?;
//!     println!("Coarse range: {}", config.scan.coarse.range);
//!     println!("Settle: {:?}", config.scan.settle);
//!     Ok(())
//! }
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::warn;

use crate::error::{AppResult, FinderError};
use crate::exposure::{ExposurePolicy, ExposureState};
use crate::frame::{ColorChannel, Intensity};
use crate::plan::PassSpec;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "config/finder.toml";

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "FINDER_";

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FinderConfig {
    /// Application settings
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Sweep geometry and evaluation
    #[serde(default)]
    pub scan: ScanConfig,
    /// Exposure regulation
    #[serde(default)]
    pub exposure: ExposureConfig,
    /// Device wait limits
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
}

/// Sweep geometry and slice evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// First, wide pass
    pub coarse: PassSpec,
    /// Second, narrow pass centred on the coarse result
    pub fine: PassSpec,
    /// Fraction of the batch maximum used as the per-pixel cutoff
    pub thresh_factor: f64,
    /// Pixels dropped from each border before measuring
    pub edge_margin_px: u32,
    /// Fixed wait after every stage move
    #[serde(with = "humantime_serde")]
    pub settle: Duration,
    /// Colour plane the camera reads out
    pub channel: ColorChannel,
}

/// Exposure regulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureConfig {
    /// Exposure applied before the first sweep
    #[serde(with = "humantime_serde")]
    pub initial: Duration,
    /// Lowest acceptable batch maximum
    pub min_brightness: Intensity,
    /// Highest acceptable batch maximum
    pub max_brightness: Intensity,
    /// Exposure multiplier for a too-dim batch
    #[serde(default = "default_dim_gain")]
    pub dim_gain: f64,
    /// Exposure multiplier for a too-bright batch
    #[serde(default = "default_bright_gain")]
    pub bright_gain: f64,
    /// Rejected batches allowed per pass
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Shortest exposure the camera accepts
    #[serde(default, with = "humantime_serde")]
    pub floor: Option<Duration>,
    /// Longest exposure the camera accepts
    #[serde(default, with = "humantime_serde")]
    pub ceiling: Option<Duration>,
}

/// Bounded waits on the devices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Longest wait for a triggered frame to become ready
    #[serde(with = "humantime_serde")]
    pub frame: Duration,
    /// Delay between `frame_ready` polls
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
}

// ============================================================================
// Default values
// ============================================================================

fn default_dim_gain() -> f64 {
    1.5
}

fn default_bright_gain() -> f64 {
    0.5
}

fn default_max_attempts() -> u32 {
    20
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "interface-finder".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            coarse: PassSpec::new(2000.0, 50.0),
            fine: PassSpec::new(200.0, 10.0),
            thresh_factor: 0.5,
            edge_margin_px: 5,
            settle: Duration::from_millis(50),
            channel: ColorChannel::Green,
        }
    }
}

impl Default for ExposureConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(10),
            min_brightness: 80,
            max_brightness: 220,
            dim_gain: default_dim_gain(),
            bright_gain: default_bright_gain(),
            max_attempts: default_max_attempts(),
            floor: None,
            ceiling: None,
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            frame: Duration::from_secs(2),
            poll_interval: Duration::from_millis(1),
        }
    }
}

impl ExposureConfig {
    /// Starting exposure state for a find routine
    pub fn initial_state(&self) -> ExposureState {
        ExposureState {
            exposure: self.initial,
            min_brightness: self.min_brightness,
            max_brightness: self.max_brightness,
        }
    }

    /// Retry behaviour on rejected batches
    pub fn policy(&self) -> ExposurePolicy {
        ExposurePolicy {
            dim_gain: self.dim_gain,
            bright_gain: self.bright_gain,
            max_attempts: self.max_attempts,
            floor: self.floor,
            ceiling: self.ceiling,
        }
    }
}

// ============================================================================
// Configuration Loading and Validation
// ============================================================================

impl FinderConfig {
    /// Load configuration from `config/finder.toml` and environment variables
    ///
    /// After loading, configuration is validated.
    pub fn load() -> AppResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path
    ///
    /// # Errors
    ///
    /// Returns `FinderError::Config` if a source cannot be parsed, or
    /// `FinderError::Configuration` if the merged values fail validation.
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let config: Self = Self::figment(path.as_ref()).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// The layered provider stack, exposed for callers that add their own layers.
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(FinderConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    ///
    /// Checks:
    /// - Log level is valid (trace, debug, info, warn, error)
    /// - Both pass specs produce a plan
    /// - Threshold factor lies in (0, 1]
    /// - Brightness window is ordered, exposure and gains are usable
    /// - Poll interval is non-zero
    pub fn validate(&self) -> AppResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.as_str()) {
            return Err(FinderError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        for (name, spec) in [("coarse", &self.scan.coarse), ("fine", &self.scan.fine)] {
            spec.slice_count().map_err(|err| {
                FinderError::Configuration(format!("scan.{name}: {err}"))
            })?;
        }
        if self.scan.fine.step >= self.scan.coarse.step {
            warn!(
                coarse_step = self.scan.coarse.step,
                fine_step = self.scan.fine.step,
                "fine step is not finer than coarse step"
            );
        }

        let factor = self.scan.thresh_factor;
        if !(factor > 0.0 && factor <= 1.0) {
            return Err(FinderError::Configuration(format!(
                "Invalid thresh_factor {}. Must be in (0, 1]",
                factor
            )));
        }

        let exposure = &self.exposure;
        if exposure.min_brightness > exposure.max_brightness {
            return Err(FinderError::Configuration(format!(
                "min_brightness {} exceeds max_brightness {}",
                exposure.min_brightness, exposure.max_brightness
            )));
        }
        if exposure.initial.is_zero() {
            return Err(FinderError::Configuration(
                "initial exposure must be positive".to_string(),
            ));
        }
        if !(exposure.dim_gain > 1.0 && exposure.dim_gain.is_finite()) {
            return Err(FinderError::Configuration(format!(
                "dim_gain {} must be greater than 1",
                exposure.dim_gain
            )));
        }
        if !(exposure.bright_gain > 0.0 && exposure.bright_gain < 1.0) {
            return Err(FinderError::Configuration(format!(
                "bright_gain {} must be in (0, 1)",
                exposure.bright_gain
            )));
        }
        if exposure.max_attempts == 0 {
            return Err(FinderError::Configuration(
                "max_attempts must be > 0".to_string(),
            ));
        }
        if let (Some(floor), Some(ceiling)) = (exposure.floor, exposure.ceiling) {
            if floor > ceiling {
                return Err(FinderError::Configuration(format!(
                    "exposure floor {:?} exceeds ceiling {:?}",
                    floor, ceiling
                )));
            }
        }

        if self.timeouts.poll_interval.is_zero() {
            return Err(FinderError::Configuration(
                "timeouts.poll_interval must be non-zero".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use tracing_test::traced_test;

    fn write_toml(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_are_valid() {
        let config = FinderConfig::default();
        config.validate().unwrap();
        assert_eq!(config.scan.coarse, PassSpec::new(2000.0, 50.0));
        assert_eq!(config.scan.edge_margin_px, 5);
        assert_eq!(config.exposure.policy().dim_gain, 1.5);
    }

    #[test]
    #[serial]
    fn missing_file_falls_back_to_defaults() {
        let config = FinderConfig::load_from("does/not/exist.toml").unwrap();
        assert_eq!(config, FinderConfig::default());
    }

    #[test]
    #[serial]
    fn toml_overrides_defaults() {
        let file = write_toml(
            r#"
            [scan]
            settle = "250ms"
            channel = "red"
            thresh_factor = 0.7

            [scan.fine]
            range = 100.0
            step = 5.0

            [exposure]
            initial = "4ms"
            min_brightness = 60
            max_brightness = 240
            ceiling = "200ms"
            "#,
        );

        let config = FinderConfig::load_from(file.path()).unwrap();
        assert_eq!(config.scan.settle, Duration::from_millis(250));
        assert_eq!(config.scan.channel, ColorChannel::Red);
        assert_eq!(config.scan.fine, PassSpec::new(100.0, 5.0));
        // untouched sections keep their defaults
        assert_eq!(config.scan.coarse, PassSpec::new(2000.0, 50.0));
        assert_eq!(config.exposure.initial, Duration::from_millis(4));
        assert_eq!(config.exposure.ceiling, Some(Duration::from_millis(200)));
        assert_eq!(config.exposure.max_attempts, 20);
    }

    #[test]
    #[serial]
    fn env_overrides_file() {
        let file = write_toml(
            r#"
            [exposure]
            initial = "10ms"
            min_brightness = 60
            max_brightness = 240
            "#,
        );
        std::env::set_var("FINDER_EXPOSURE__MIN_BRIGHTNESS", "90");
        std::env::set_var("FINDER_APPLICATION__LOG_LEVEL", "debug");

        let result = FinderConfig::load_from(file.path());

        std::env::remove_var("FINDER_EXPOSURE__MIN_BRIGHTNESS");
        std::env::remove_var("FINDER_APPLICATION__LOG_LEVEL");

        let config = result.unwrap();
        assert_eq!(config.exposure.min_brightness, 90);
        assert_eq!(config.application.log_level, "debug");
    }

    #[test]
    #[serial]
    fn malformed_file_is_a_config_error() {
        let file = write_toml("[scan]\nsettle = 12\n");
        let err = FinderConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, FinderError::Config(_)));
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = FinderConfig::default();
        config.application.log_level = "loud".into();
        assert!(config.validate().is_err());

        let mut config = FinderConfig::default();
        config.scan.coarse = PassSpec::new(2000.0, 30.0);
        assert!(config.validate().is_err());

        let mut config = FinderConfig::default();
        config.scan.thresh_factor = 0.0;
        assert!(config.validate().is_err());

        let mut config = FinderConfig::default();
        config.exposure.min_brightness = 230;
        assert!(config.validate().is_err());

        let mut config = FinderConfig::default();
        config.exposure.dim_gain = 1.0;
        assert!(config.validate().is_err());

        let mut config = FinderConfig::default();
        config.exposure.bright_gain = 1.2;
        assert!(config.validate().is_err());

        let mut config = FinderConfig::default();
        config.exposure.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = FinderConfig::default();
        config.exposure.floor = Some(Duration::from_millis(50));
        config.exposure.ceiling = Some(Duration::from_millis(5));
        assert!(config.validate().is_err());

        let mut config = FinderConfig::default();
        config.timeouts.poll_interval = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    #[traced_test]
    fn coarser_fine_step_is_warned_not_rejected() {
        let mut config = FinderConfig::default();
        config.scan.fine = PassSpec::new(120.0, 60.0);

        assert!(config.validate().is_ok());
        assert!(logs_contain("fine step is not finer"));
    }

    #[test]
    #[traced_test]
    fn finer_fine_step_is_not_warned() {
        FinderConfig::default().validate().unwrap();
        assert!(!logs_contain("fine step is not finer"));
    }
}
