//! Application-level configuration loading: sweeper cadence, match lifetime and SSE sizing.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use serde_with::{DurationSeconds, serde_as};
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "TICTACTOE_BACK_CONFIG_PATH";

const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_MAX_MATCH_AGE: Duration = Duration::from_secs(600);
const DEFAULT_SSE_CHANNEL_CAPACITY: usize = 64;
/// Ceiling for both the sweep interval and the match age.
const MAX_DURATION: Duration = Duration::from_secs(365 * 24 * 60 * 60);

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Pause between two sweeper passes.
    #[serde(rename = "sweep_interval_secs")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub sweep_interval: Duration,
    /// Matches created longer ago than this are reclaimed by the sweeper.
    #[serde(rename = "max_match_age_secs")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub max_match_age: Duration,
    /// Buffered events per SSE subscriber before it starts lagging.
    pub sse_channel_capacity: usize,
    /// Seed for mark and first-turn draws; draws are unseeded when absent.
    pub coin_seed: Option<u64>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(config) => {
                    info!(
                        path = %path.display(),
                        sweep_interval_secs = config.sweep_interval.as_secs(),
                        max_match_age_secs = config.max_match_age.as_secs(),
                        "loaded config"
                    );
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

    /// Parse a JSON document. Zero durations or capacity are replaced by their defaults,
    /// durations longer than a year are capped.
    pub fn from_json(contents: &str) -> serde_json::Result<Self> {
        let parsed: Self = serde_json::from_str(contents)?;
        Ok(parsed.sanitized())
    }

    fn sanitized(mut self) -> Self {
        if self.sweep_interval.is_zero() {
            warn!("sweep interval must be positive; using default");
            self.sweep_interval = DEFAULT_SWEEP_INTERVAL;
        }
        if self.max_match_age.is_zero() {
            warn!("max match age must be positive; using default");
            self.max_match_age = DEFAULT_MAX_MATCH_AGE;
        }
        if self.sweep_interval > MAX_DURATION {
            warn!(
                sweep_interval_secs = self.sweep_interval.as_secs(),
                "sweep interval too long; capping to one year"
            );
            self.sweep_interval = MAX_DURATION;
        }
        if self.max_match_age > MAX_DURATION {
            warn!(
                max_match_age_secs = self.max_match_age.as_secs(),
                "max match age too long; capping to one year"
            );
            self.max_match_age = MAX_DURATION;
        }
        if self.sse_channel_capacity == 0 {
            self.sse_channel_capacity = DEFAULT_SSE_CHANNEL_CAPACITY;
        }
        self
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            max_match_age: DEFAULT_MAX_MATCH_AGE,
            sse_channel_capacity: DEFAULT_SSE_CHANNEL_CAPACITY,
            coin_seed: None,
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
