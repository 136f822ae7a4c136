//! Configuration loading and management.

use std::path::{Path, PathBuf};

use chrono::TimeDelta;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use mh_core::{BatchWriteConfig, DayBoundaries, DayError, StatusSettings};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,
    /// Default AFK threshold for status updates that carry none.
    pub max_afk_time_secs: i64,
    pub night_end_hour: u32,
    pub morning_start_hour: u32,
    pub intermittent_period_mins: i64,
    /// Cap on concurrent batch write calls; unbounded when unset.
    pub max_in_flight_batches: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        let settings = StatusSettings::default();
        Self {
            database_path: data_dir.join("mh.db"),
            max_afk_time_secs: settings.max_afk_time.num_seconds(),
            night_end_hour: settings.boundaries.night_end_hour,
            morning_start_hour: settings.boundaries.morning_start_hour,
            intermittent_period_mins: settings.boundaries.intermittent_period.num_minutes(),
            max_in_flight_batches: None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error(transparent)]
    Day(#[from] DayError),

    #[error("{name} = {value} is out of range")]
    OutOfRange { name: &'static str, value: i64 },
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (MH_*)
        figment = figment.merge(Env::prefixed("MH_"));

        figment.extract()
    }

    /// Status update settings, validated.
    pub fn status_settings(&self) -> Result<StatusSettings, SettingsError> {
        let intermittent_period = TimeDelta::try_minutes(self.intermittent_period_mins).ok_or(
            SettingsError::OutOfRange {
                name: "intermittent_period_mins",
                value: self.intermittent_period_mins,
            },
        )?;
        let max_afk_time =
            TimeDelta::try_seconds(self.max_afk_time_secs).ok_or(SettingsError::OutOfRange {
                name: "max_afk_time_secs",
                value: self.max_afk_time_secs,
            })?;

        let boundaries = DayBoundaries {
            night_end_hour: self.night_end_hour,
            morning_start_hour: self.morning_start_hour,
            intermittent_period,
        };
        boundaries.validate()?;
        Ok(StatusSettings {
            boundaries,
            max_afk_time,
            ..StatusSettings::default()
        })
    }

    #[must_use]
    pub const fn batch_config(&self) -> BatchWriteConfig {
        BatchWriteConfig {
            max_in_flight: self.max_in_flight_batches,
        }
    }
}

/// Returns the platform-specific config directory for mh.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("mh"))
}

/// Returns the platform-specific data directory for mh.
///
/// On Linux: `~/.local/share/mh`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("mh"))
}
