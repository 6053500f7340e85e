//! Application-level configuration loading, including matchmaking timing.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "TYPERUSH_BACK_CONFIG_PATH";

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
///
/// The matchmaking thresholds and delays are deployment-tunable; only the
/// shorten-never-lengthen countdown rule is fixed in code.
pub struct AppConfig {
    /// Roster size at which a waiting public race schedules its start.
    pub join_trigger: usize,
    /// Countdown length scheduled when the join trigger is reached.
    pub start_delay: Duration,
    /// Roster size at which a long remaining countdown is shortened.
    pub shorten_trigger: usize,
    /// Countdown length applied when the shorten trigger fires.
    pub shorten_delay: Duration,
    /// Minimum remaining time below which the countdown is left alone.
    pub shorten_floor: Duration,
    /// Lead time granted by a manual host start before typing begins.
    pub start_lead: Duration,
    /// Races starting within this window are closed to late joiners.
    pub starting_soon_window: Duration,
    /// Age beyond which the janitor deletes race and player rows.
    pub retention: Duration,
    /// Optional in-process janitor cadence; `None` relies on an external trigger.
    pub janitor_interval: Option<Duration>,
    /// Per-channel broadcast capacity for row-change subscriptions.
    pub subscription_capacity: usize,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to baked-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(path = %path.display(), "loaded configuration from file");
                    config
                }
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
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            join_trigger: 2,
            start_delay: Duration::from_secs(15),
            shorten_trigger: 5,
            shorten_delay: Duration::from_secs(5),
            shorten_floor: Duration::from_secs(5),
            start_lead: Duration::from_secs(3),
            starting_soon_window: Duration::from_secs(5),
            retention: Duration::from_secs(24 * 60 * 60),
            janitor_interval: None,
            subscription_capacity: 16,
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    join_trigger: Option<usize>,
    start_delay_secs: Option<u64>,
    shorten_trigger: Option<usize>,
    shorten_delay_secs: Option<u64>,
    shorten_floor_secs: Option<u64>,
    start_lead_secs: Option<u64>,
    starting_soon_window_secs: Option<u64>,
    retention_hours: Option<u64>,
    janitor_interval_secs: Option<u64>,
    subscription_capacity: Option<usize>,
}

impl From<RawConfig> for AppConfig {
    fn from(raw: RawConfig) -> Self {
        let defaults = Self::default();
        Self {
            join_trigger: raw.join_trigger.unwrap_or(defaults.join_trigger),
            start_delay: raw
                .start_delay_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.start_delay),
            shorten_trigger: raw.shorten_trigger.unwrap_or(defaults.shorten_trigger),
            shorten_delay: raw
                .shorten_delay_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.shorten_delay),
            shorten_floor: raw
                .shorten_floor_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.shorten_floor),
            start_lead: raw
                .start_lead_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.start_lead),
            starting_soon_window: raw
                .starting_soon_window_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.starting_soon_window),
            retention: raw
                .retention_hours
                .map(|hours| Duration::from_secs(hours * 60 * 60))
                .unwrap_or(defaults.retention),
            janitor_interval: raw.janitor_interval_secs.map(Duration::from_secs),
            subscription_capacity: raw
                .subscription_capacity
                .unwrap_or(defaults.subscription_capacity),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
