//! Driver configuration.
//!
//! Protocol constants are fixed in [`crate::protocol::constants`]; this only
//! covers the timing and capture knobs that may differ between hosts.

use crate::frame::WIDTH;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Largest accepted per-scan frame quota.
pub const MAX_CAPTURE_FRAMES: usize = 64;

/// Configuration for the driver core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Frames kept per scan. One more is captured and discarded first.
    pub capture_frames: usize,
    /// Delay the MCU waits after reset and idle transitions, in milliseconds.
    pub settle_ms: u16,
    /// Reply deadline for image readout, in milliseconds.
    pub image_timeout_ms: u32,
    /// Width of the assembled image in pixels.
    pub image_width: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            capture_frames: 1,
            settle_ms: 20,
            image_timeout_ms: 500,
            image_width: WIDTH * 3,
        }
    }
}

impl DriverConfig {
    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capture_frames == 0 {
            return Err(ConfigError::InvalidCaptureFrames);
        }
        if self.capture_frames > MAX_CAPTURE_FRAMES {
            return Err(ConfigError::TooManyCaptureFrames(self.capture_frames));
        }
        if self.image_width < WIDTH {
            return Err(ConfigError::InvalidImageWidth(self.image_width));
        }
        if self.image_timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout);
        }
        Ok(())
    }

    /// Image readout deadline as a [`Duration`].
    pub fn image_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.image_timeout_ms))
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Quota of zero frames.
    #[error("capture_frames must be at least 1")]
    InvalidCaptureFrames,
    /// Quota above [`MAX_CAPTURE_FRAMES`].
    #[error("capture_frames {0} exceeds the limit of {max}", max = MAX_CAPTURE_FRAMES)]
    TooManyCaptureFrames(usize),
    /// Image narrower than a sensor frame.
    #[error("image width {0} is narrower than one frame")]
    InvalidImageWidth(usize),
    /// Zero image timeout.
    #[error("image timeout must be non-zero")]
    InvalidTimeout,
    /// Config file could not be read.
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    /// Config file is not valid TOML.
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    /// Driver settings.
    #[serde(default)]
    pub driver: DriverConfig,
    /// Command-line output settings.
    #[serde(default)]
    pub output: OutputConfig,
}

/// Output settings for the command-line tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory assembled images are written to.
    pub directory: PathBuf,
    /// Number of scans when not running continuously.
    pub scans: u32,
    /// Keep scanning until interrupted.
    pub continuous: bool,
    /// Print metrics in Prometheus text format on exit.
    pub print_metrics: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            scans: 1,
            continuous: false,
            print_metrics: false,
        }
    }
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: FileConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.driver.validate()?;
        Ok(config)
    }
}
