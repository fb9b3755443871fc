//! Configuration and settings management
//!
//! Loads transmission settings from config files and environment variables.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default directory downloaded media lands in
pub const DEFAULT_DOWNLOAD_DIR: &str = "downloads";
/// Default seconds between two progress edits
pub const DEFAULT_PROGRESS_INTERVAL_SECS: u64 = 5;
/// Default buffer size of a transfer's progress channel
pub const DEFAULT_PROGRESS_CHANNEL_CAPACITY: usize = 64;

/// Build the layered configuration source shared by all settings structs.
///
/// Order: `config/default`, `config/{RUN_MODE}`, `config/local` (all
/// optional), then `APP__`-prefixed environment variables, then plain
/// environment variables with empty values ignored.
///
/// # Errors
///
/// Returns a `ConfigError` if a present source cannot be parsed.
pub fn build_config() -> Result<Config, ConfigError> {
    let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

    Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
        // Local overrides, not checked into git
        .add_source(File::with_name("config/local").required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .add_source(Environment::default().ignore_empty(true))
        .build()
}

/// Transmission settings
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TransmissionSettings {
    /// Directory downloaded media is written to
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
    /// Minimum seconds between two progress edits of one transfer
    #[serde(default = "default_progress_interval_secs")]
    pub progress_interval_secs: u64,
    /// Buffer size of a transfer's progress channel
    #[serde(default = "default_progress_channel_capacity")]
    pub progress_channel_capacity: usize,
}

fn default_download_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DOWNLOAD_DIR)
}

const fn default_progress_interval_secs() -> u64 {
    DEFAULT_PROGRESS_INTERVAL_SECS
}

const fn default_progress_channel_capacity() -> usize {
    DEFAULT_PROGRESS_CHANNEL_CAPACITY
}

impl Default for TransmissionSettings {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            progress_interval_secs: default_progress_interval_secs(),
            progress_channel_capacity: default_progress_channel_capacity(),
        }
    }
}

impl TransmissionSettings {
    /// Load settings from config files and environment.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        build_config()?.try_deserialize()
    }

    /// Minimum time between two progress edits.
    #[must_use]
    pub const fn progress_interval(&self) -> Duration {
        Duration::from_secs(self.progress_interval_secs)
    }

    /// Progress channel capacity, never zero.
    #[must_use]
    pub fn progress_channel_capacity(&self) -> usize {
        self.progress_channel_capacity.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_unset() -> Result<(), ConfigError> {
        let settings: TransmissionSettings = Config::builder().build()?.try_deserialize()?;
        assert_eq!(settings.download_dir, PathBuf::from("downloads"));
        assert_eq!(settings.progress_interval(), Duration::from_secs(5));
        assert_eq!(settings.progress_channel_capacity(), 64);
        Ok(())
    }

    #[test]
    fn overrides_are_honored() -> Result<(), ConfigError> {
        let settings: TransmissionSettings = Config::builder()
            .set_override("download_dir", "/srv/media")?
            .set_override("progress_interval_secs", 10)?
            .set_override("progress_channel_capacity", 0)?
            .build()?
            .try_deserialize()?;

        assert_eq!(settings.download_dir, PathBuf::from("/srv/media"));
        assert_eq!(settings.progress_interval(), Duration::from_secs(10));
        assert_eq!(settings.progress_channel_capacity(), 1);
        Ok(())
    }
}
