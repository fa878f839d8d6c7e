//! Configuration for the proximity scanner.

use crate::collector::time::{TimestampParser, DEFAULT_TIME_LAYOUT};
use crate::core::fingerprint::FingerprintMode;
use crate::error::{AnalysisError, ErrorPolicy};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main configuration for a scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Width of the time window
    #[serde(with = "duration_serde")]
    pub window_width: Duration,

    /// How far the window advances per step
    #[serde(with = "duration_serde")]
    pub slide_step: Duration,

    /// Names of the fields the scan reads
    pub fields: FieldNames,

    /// How timestamps are written in the records
    pub timestamp: TimestampConfig,

    /// What to do with a record whose fields cannot be parsed
    pub error_policy: ErrorPolicy,

    /// How pair fingerprints are derived
    pub fingerprint: FingerprintMode,

    /// Directory for interaction output files
    pub export_path: PathBuf,

    /// Directory for scan statistics
    pub data_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vessel-proximity");

        Self {
            window_width: Duration::from_secs(10 * 60),
            slide_step: Duration::from_secs(5 * 60),
            fields: FieldNames::default(),
            timestamp: TimestampConfig::default(),
            error_policy: ErrorPolicy::default(),
            fingerprint: FingerprintMode::default(),
            export_path: data_dir.join("exports"),
            data_path: data_dir,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::Io(e.to_string()))?;
            let config: Config =
                serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
        }

        let content =
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;

        std::fs::write(&config_path, content).map_err(|e| ConfigError::Io(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vessel-proximity")
            .join("config.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.export_path).map_err(|e| ConfigError::Io(e.to_string()))?;
        std::fs::create_dir_all(&self.data_path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Ok(())
    }

    /// Check the values a scan cannot run without.
    ///
    /// The step may not exceed the width: consecutive window positions must
    /// overlap or touch, otherwise records between them are never seen.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.window_width.is_zero() {
            return Err(AnalysisError::Configuration(
                "window width must be positive".to_string(),
            ));
        }
        if self.slide_step.is_zero() {
            return Err(AnalysisError::Configuration(
                "slide step must be positive".to_string(),
            ));
        }
        if self.slide_step > self.window_width {
            return Err(AnalysisError::Configuration(format!(
                "slide step ({}s) must not exceed window width ({}s)",
                self.slide_step.as_secs(),
                self.window_width.as_secs()
            )));
        }
        self.window_width()?;
        self.slide_step()?;
        self.timestamp.parser()?;
        Ok(())
    }

    /// Window width as a calendar duration.
    pub fn window_width(&self) -> Result<chrono::Duration, AnalysisError> {
        to_chrono(self.window_width, "window width")
    }

    /// Slide step as a calendar duration.
    pub fn slide_step(&self) -> Result<chrono::Duration, AnalysisError> {
        to_chrono(self.slide_step, "slide step")
    }
}

fn to_chrono(duration: Duration, what: &str) -> Result<chrono::Duration, AnalysisError> {
    chrono::Duration::from_std(duration)
        .map_err(|e| AnalysisError::Configuration(format!("{what} out of range: {e}")))
}

/// Header names of the fields a scan reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldNames {
    pub entity_id: String,
    pub timestamp: String,
    pub latitude: String,
    pub longitude: String,
    pub geokey: String,
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            entity_id: "MMSI".to_string(),
            timestamp: "BaseDateTime".to_string(),
            latitude: "LAT".to_string(),
            longitude: "LON".to_string(),
            geokey: "Geohash".to_string(),
        }
    }
}

/// Layout and zone of the timestamp field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampConfig {
    /// chrono format string
    pub layout: String,
    /// IANA time zone the naive timestamps are written in
    pub timezone: String,
}

impl Default for TimestampConfig {
    fn default() -> Self {
        Self {
            layout: DEFAULT_TIME_LAYOUT.to_string(),
            timezone: "UTC".to_string(),
        }
    }
}

impl TimestampConfig {
    pub fn parser(&self) -> Result<TimestampParser, AnalysisError> {
        TimestampParser::new(self.layout.clone(), &self.timezone)
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Serialize error: {0}")]
    Serialize(String),
}

/// Serde support for Duration.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
