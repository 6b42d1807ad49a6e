//! Application-level configuration: day-boundary timezone, schedule times,
//! and streak policy knobs.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use time::{
    Date, OffsetDateTime, Time, UtcOffset,
    macros::{format_description, offset, time},
};
use tracing::{info, warn};

use crate::oracle::DayWindow;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "STREAK_SQUAD_CONFIG_PATH";

/// Immutable runtime configuration shared across the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Fixed UTC offset governing every day-boundary computation. One
    /// offset for the whole fleet; per-player timezones are out of scope.
    pub day_offset: UtcOffset,
    /// Local time of day for the read-only status broadcast sweep.
    pub status_broadcast_at: Time,
    /// Local time of day for the close-out sweep that commits the streak.
    pub close_out_at: Time,
    /// Minimum roster size for a group to be streak-eligible.
    pub min_cohort: usize,
    /// Upper bound on concurrently evaluated groups during a fleet sweep.
    pub sweep_concurrency: usize,
    /// Budget for a single player's oracle lookup; overruns count as not
    /// solved.
    pub oracle_timeout: Duration,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to
    /// built-in defaults when the file is absent or malformed.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => match AppConfig::try_from(raw) {
                    Ok(config) => {
                        info!(path = %path.display(), "loaded configuration");
                        config
                    }
                    Err(err) => {
                        warn!(
                            path = %path.display(),
                            error = %err,
                            "invalid config values; falling back to defaults"
                        );
                        Self::default()
                    }
                },
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Today's calendar date in the configured timezone.
    pub fn today(&self) -> Date {
        OffsetDateTime::now_utc().to_offset(self.day_offset).date()
    }

    /// Half-open unix-timestamp window covering one local calendar day.
    pub fn day_window(&self, date: Date) -> DayWindow {
        let start = date.midnight().assume_offset(self.day_offset).unix_timestamp();
        DayWindow {
            start,
            end: start + 86_400,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            day_offset: offset!(+8),
            status_broadcast_at: time!(9:00),
            close_out_at: time!(23:30),
            min_cohort: 2,
            sweep_concurrency: 8,
            oracle_timeout: Duration::from_secs(15),
        }
    }
}

/// JSON representation of the configuration file.
#[derive(Debug, Deserialize)]
struct RawConfig {
    /// UTC offset like `+08:00`.
    timezone_offset: Option<String>,
    /// Local `HH:MM` for the status broadcast.
    status_broadcast_time: Option<String>,
    /// Local `HH:MM` for the close-out.
    close_out_time: Option<String>,
    min_cohort_size: Option<usize>,
    sweep_concurrency: Option<usize>,
    oracle_timeout_secs: Option<u64>,
}

impl TryFrom<RawConfig> for AppConfig {
    type Error = time::error::Parse;

    fn try_from(raw: RawConfig) -> Result<Self, Self::Error> {
        let defaults = AppConfig::default();

        let day_offset = match raw.timezone_offset {
            Some(ref value) => UtcOffset::parse(
                value,
                format_description!("[offset_hour sign:mandatory]:[offset_minute]"),
            )?,
            None => defaults.day_offset,
        };

        let status_broadcast_at = match raw.status_broadcast_time {
            Some(ref value) => parse_time_of_day(value)?,
            None => defaults.status_broadcast_at,
        };

        let close_out_at = match raw.close_out_time {
            Some(ref value) => parse_time_of_day(value)?,
            None => defaults.close_out_at,
        };

        Ok(Self {
            day_offset,
            status_broadcast_at,
            close_out_at,
            min_cohort: raw.min_cohort_size.unwrap_or(defaults.min_cohort),
            sweep_concurrency: raw.sweep_concurrency.unwrap_or(defaults.sweep_concurrency),
            oracle_timeout: raw
                .oracle_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.oracle_timeout),
        })
    }
}

fn parse_time_of_day(value: &str) -> Result<Time, time::error::Parse> {
    Time::parse(value, format_description!("[hour]:[minute]"))
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
