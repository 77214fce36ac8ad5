//! Configuration structures for the Le Mans results dashboard.

use crate::error::{Error, Result};
use crate::types::PitSignalPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Upper bound on the speed distribution bin count.
pub const MAX_SPEED_HISTOGRAM_BINS: usize = 1000;

/// Main configuration for the dashboard core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Source file reading configuration.
    pub source: SourceConfig,
    /// Normalization variant configuration.
    pub normalizer: NormalizerConfig,
    /// Dashboard aggregate configuration.
    pub dashboard: DashboardConfig,
}

impl Config {
    /// Parse a configuration from JSON text. Missing sections take their defaults.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if matches!(self.source.delimiter, b'"' | b'\n' | b'\r') {
            return Err(Error::config(format!(
                "delimiter {:?} cannot be a quote or line terminator",
                self.source.delimiter as char
            )));
        }
        let bins = self.dashboard.speed_histogram_bins;
        if bins == 0 || bins > MAX_SPEED_HISTOGRAM_BINS {
            return Err(Error::config(format!(
                "speed_histogram_bins must be between 1 and {MAX_SPEED_HISTOGRAM_BINS}, got {bins}"
            )));
        }
        Ok(())
    }
}

/// What to do with rows whose field count differs from the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedRowPolicy {
    /// Skip the row and count it in the load report.
    #[default]
    Skip,
    /// Abort the whole load.
    Fail,
}

/// Source file reading configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Field delimiter byte.
    pub delimiter: u8,
    /// Malformed row handling, applied uniformly to the whole load.
    pub malformed_rows: MalformedRowPolicy,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            delimiter: b',',
            malformed_rows: MalformedRowPolicy::Skip,
        }
    }
}

/// Which derived columns the normalizer produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// One-hot encode `Category` in addition to `Tyres`.
    pub include_category_one_hot: bool,
    /// Per-car pit signal derivation.
    pub pit_signal_policy: PitSignalPolicy,
}

impl NormalizerConfig {
    /// Category one-hot plus pit events since the previous record.
    pub fn full() -> Self {
        Self {
            include_category_one_hot: true,
            pit_signal_policy: PitSignalPolicy::EventCount,
        }
    }

    /// Tyres one-hot only, stateless pit flag.
    pub fn compact() -> Self {
        Self {
            include_category_one_hot: false,
            pit_signal_policy: PitSignalPolicy::BinaryThreshold,
        }
    }
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self::full()
    }
}

/// Dashboard aggregate configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Number of equal-width bins in the speed distribution.
    pub speed_histogram_bins: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            speed_histogram_bins: 30,
        }
    }
}
