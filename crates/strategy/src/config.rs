use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use common::{Error, Result};

/// Rule file (TOML) shared by the level watcher and the trend bot.
/// Every section and key is optional; missing values take the defaults below.
///
/// Example `config/monitor.toml`:
/// ```toml
/// [levels]
/// tolerance = 5.0
/// hysteresis = 50.0
/// context_levels = 3
///
/// [trend]
/// short_period = 50
/// long_period = 200
///
/// [watch]
/// timezone = "US/Pacific"
/// open = "06:30"
/// close = "13:00"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitorFileConfig {
    pub levels: LevelRules,
    pub trend: TrendRules,
    pub watch: WatchSchedule,
}

/// Parameters of the level-crossing signal engine.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LevelRules {
    /// Half-width of the band around a level that counts as a test.
    pub tolerance: f64,
    /// Distance price must travel away before a level can fire again.
    pub hysteresis: f64,
    /// Neighbouring levels attached to each signal.
    pub context_levels: usize,
}

impl Default for LevelRules {
    fn default() -> Self {
        Self {
            tolerance: 5.0,
            hysteresis: 50.0,
            context_levels: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TrendRules {
    pub short_period: usize,
    pub long_period: usize,
    /// Bars required before any classification is attempted.
    pub min_points: usize,
    /// Days of stored bars fed into the averages.
    pub history_days: i64,
    pub poll_interval_secs: u64,
    /// Minimum spacing between git commits of the data directory.
    pub commit_every_mins: i64,
}

impl Default for TrendRules {
    fn default() -> Self {
        Self {
            short_period: 50,
            long_period: 200,
            min_points: 50,
            history_days: 30,
            poll_interval_secs: 60,
            commit_every_mins: 30,
        }
    }
}

/// Polling cadence and market calendar for the level watcher.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct WatchSchedule {
    /// IANA timezone name the market hours are expressed in.
    pub timezone: String,
    /// Session open, `HH:MM`.
    pub open: String,
    /// Session close, `HH:MM`.
    pub close: String,
    pub poll_interval_secs: u64,
    /// Sleep when no levels are loaded.
    pub idle_retry_secs: u64,
    /// Sleep after a failed tick.
    pub error_backoff_secs: u64,
    /// Pause between consecutive signal posts.
    pub alert_gap_ms: u64,
    pub status_every_mins: u32,
    pub api_warning_every_mins: u32,
}

impl Default for WatchSchedule {
    fn default() -> Self {
        Self {
            timezone: "US/Pacific".to_string(),
            open: "06:30".to_string(),
            close: "13:00".to_string(),
            poll_interval_secs: 30,
            idle_retry_secs: 60,
            error_backoff_secs: 60,
            alert_gap_ms: 1_000,
            status_every_mins: 10,
            api_warning_every_mins: 5,
        }
    }
}

impl MonitorFileConfig {
    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = %path.display(), "No rule file found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let cfg = Self::parse(&content)?;
        info!(path = %path.display(), "Loaded rule file");
        Ok(cfg)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(content)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let l = &self.levels;
        if !(l.tolerance.is_finite() && l.tolerance >= 0.0) {
            return Err(Error::Config(format!(
                "levels.tolerance must be a non-negative number, got {}",
                l.tolerance
            )));
        }
        if !(l.hysteresis.is_finite() && l.hysteresis >= 0.0) {
            return Err(Error::Config(format!(
                "levels.hysteresis must be a non-negative number, got {}",
                l.hysteresis
            )));
        }

        let t = &self.trend;
        if t.short_period < 2 || t.long_period < t.short_period {
            return Err(Error::Config(format!(
                "trend periods must satisfy 2 <= short ({}) <= long ({})",
                t.short_period, t.long_period
            )));
        }
        if t.min_points < 2 {
            return Err(Error::Config("trend.min_points must be at least 2".to_string()));
        }

        let w = &self.watch;
        if w.status_every_mins == 0 || w.api_warning_every_mins == 0 {
            return Err(Error::Config(
                "watch reminder intervals must be at least one minute".to_string(),
            ));
        }
        Ok(())
    }
}
