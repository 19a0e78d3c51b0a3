//! Layered monitor configuration
//!
//! Sources, lowest priority first:
//! - built-in defaults
//! - optional TOML file
//! - `DROWSY__`-prefixed environment variables (`__` separates sections,
//!   e.g. `DROWSY__DMS__ALERT_THRESHOLD_SECS=3.5`)

use std::path::Path;

use alerting::AlertConfig;
use camera_capture::{CameraConfig, Preprocessing};
use config::{Config, Environment, File, FileFormat};
use dms::{DetectorConfig, DmsConfig};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::MonitorError;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "DROWSY";

/// Output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Print every analysis as a JSON line on stdout
    pub json_lines: bool,
    /// Log throughput every N frames (0 disables)
    pub log_every_frames: u64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            json_lines: false,
            log_every_frames: 300,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub camera: CameraConfig,
    pub preprocessing: Preprocessing,
    pub dms: DmsConfig,
    pub alerting: AlertConfig,
    pub detector: DetectorConfig,
    pub output: OutputConfig,
}

impl MonitorConfig {
    /// Load defaults, then `path`, then the process environment
    pub fn load(path: Option<&Path>) -> Result<Self, MonitorError> {
        Self::load_with_env(path, Environment::with_prefix(ENV_PREFIX))
    }

    /// Load with an explicit environment source
    pub fn load_with_env(path: Option<&Path>, env: Environment) -> Result<Self, MonitorError> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Some(path) = path {
            info!("Loading configuration from {}", path.display());
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }

        let config: Self = builder
            .add_source(env.separator("__").try_parsing(true))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        debug!("Effective configuration: {:?}", config);
        Ok(config)
    }

    /// Reject invalid values; nothing is clamped
    pub fn validate(&self) -> Result<(), MonitorError> {
        self.camera.validate()?;
        self.preprocessing.validate()?;
        self.dms.validate()?;
        self.detector.validate()?;
        Ok(())
    }
}
