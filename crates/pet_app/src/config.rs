use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveTime;
use pet_core::CompanionTheme;
use tracing::{info, warn};

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Directory holding one JSON file per persisted key. `None` keeps state in memory.
    pub data_dir: Option<PathBuf>,
    pub cleanup_interval: Duration,
    pub morning_reminder: NaiveTime,
    pub evening_reminder: NaiveTime,
    /// Theme used when nothing has been stored yet.
    pub theme: CompanionTheme,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(dir) = std::env::var("PET_DATA_DIR") {
            let dir = dir.trim();
            if !dir.is_empty() {
                info!(path = dir, "using data directory");
                config.data_dir = Some(PathBuf::from(dir));
            }
        }
        if let Ok(secs) = std::env::var("PET_CLEANUP_INTERVAL_SECS") {
            if let Ok(value) = secs.trim().parse::<u64>() {
                if value > 0 {
                    config.cleanup_interval = Duration::from_secs(value);
                }
            }
        }
        if let Ok(time) = std::env::var("PET_MORNING_REMINDER") {
            match parse_clock_time(&time) {
                Ok(value) => config.morning_reminder = value,
                Err(err) => warn!(%err, "ignoring PET_MORNING_REMINDER"),
            }
        }
        if let Ok(time) = std::env::var("PET_EVENING_REMINDER") {
            match parse_clock_time(&time) {
                Ok(value) => config.evening_reminder = value,
                Err(err) => warn!(%err, "ignoring PET_EVENING_REMINDER"),
            }
        }
        if let Ok(theme) = std::env::var("PET_THEME") {
            match theme.trim().parse::<CompanionTheme>() {
                Ok(value) => config.theme = value,
                Err(err) => warn!(%err, "ignoring PET_THEME"),
            }
        }
        Ok(config)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            cleanup_interval: Duration::from_secs(60),
            morning_reminder: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
            evening_reminder: NaiveTime::from_hms_opt(17, 35, 0).unwrap_or_default(),
            theme: CompanionTheme::Pet,
        }
    }
}

/// Parses a 24-hour `HH:MM` value.
pub fn parse_clock_time(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .with_context(|| format!("`{}` is not a HH:MM time", value.trim()))
}
