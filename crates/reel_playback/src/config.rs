//! Playback configuration (playback.toml)

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::boundary::PlaybackMode;
use crate::error::{PlaybackError, Result};
use crate::speed::validate_speed;

/// Engine configuration
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct PlaybackConfig {
    /// Scheduler period in milliseconds
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Speed multiplier at construction
    #[serde(default = "default_initial_speed")]
    pub initial_speed: f64,
    /// Ramp acceleration in speed units per wall second; `<= 0` snaps instantly
    #[serde(default = "default_acceleration")]
    pub acceleration: f64,
    #[serde(default)]
    pub mode: PlaybackMode,
    #[serde(default)]
    pub duration: DurationPolicy,
}

fn default_tick_interval_ms() -> u64 {
    16
}

fn default_initial_speed() -> f64 {
    1.0
}

fn default_acceleration() -> f64 {
    4.0
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            initial_speed: default_initial_speed(),
            acceleration: default_acceleration(),
            mode: PlaybackMode::default(),
            duration: DurationPolicy::default(),
        }
    }
}

/// Timeline length derived from event count when none is given
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct DurationPolicy {
    #[serde(default = "default_seconds_per_event")]
    pub seconds_per_event: f64,
    #[serde(default = "default_min_seconds")]
    pub min_seconds: f64,
    #[serde(default = "default_max_seconds")]
    pub max_seconds: f64,
}

fn default_seconds_per_event() -> f64 {
    0.25
}

fn default_min_seconds() -> f64 {
    10.0
}

fn default_max_seconds() -> f64 {
    900.0
}

impl Default for DurationPolicy {
    fn default() -> Self {
        Self {
            seconds_per_event: default_seconds_per_event(),
            min_seconds: default_min_seconds(),
            max_seconds: default_max_seconds(),
        }
    }
}

impl DurationPolicy {
    /// Duration for a timeline of `event_count` events.
    pub fn resolve(&self, event_count: usize) -> f64 {
        (event_count as f64 * self.seconds_per_event).clamp(self.min_seconds, self.max_seconds)
    }
}

impl PlaybackConfig {
    /// Parse and validate TOML
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: PlaybackConfig =
            toml::from_str(content).map_err(|e| PlaybackError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            PlaybackError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tick_interval_ms == 0 {
            return Err(PlaybackError::Config(
                "tick_interval_ms must be greater than 0".into(),
            ));
        }
        validate_speed(self.initial_speed)?;
        if !self.acceleration.is_finite() {
            return Err(PlaybackError::InvalidAcceleration(self.acceleration));
        }
        let d = &self.duration;
        let all_finite = [d.seconds_per_event, d.min_seconds, d.max_seconds]
            .iter()
            .all(|v| v.is_finite() && *v >= 0.0);
        if !all_finite || d.min_seconds > d.max_seconds {
            return Err(PlaybackError::Config(format!(
                "invalid duration policy: seconds_per_event={}, min_seconds={}, max_seconds={}",
                d.seconds_per_event, d.min_seconds, d.max_seconds
            )));
        }
        Ok(())
    }

    /// Serialize to TOML string
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| PlaybackError::Config(e.to_string()))
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}
