//! Playback error types

use thiserror::Error;

use crate::transport::TransportState;

/// Playback-related errors
///
/// Every variant describes an expected, recoverable condition. Operations that
/// return one of these leave the engine exactly as it was before the call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlaybackError {
    /// The event sequence has no events
    #[error("timeline is empty")]
    EmptyTimeline,

    /// Requested speed lies outside the supported multiplier range
    #[error("speed out of range: {speed} (allowed {min}..={max})")]
    SpeedOutOfRange { speed: f64, min: f64, max: f64 },

    /// Acceleration must be a finite number
    #[error("invalid acceleration: {0}")]
    InvalidAcceleration(f64),

    /// Duration must be finite and non-negative
    #[error("invalid duration: {0}")]
    InvalidDuration(f64),

    /// Transport transition not allowed from the current state
    #[error("cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: TransportState,
    },

    /// Preset name not present in the preset table
    #[error("unknown preset: {0}")]
    UnknownPreset(String),

    /// Stepping forward past the last event
    #[error("already at end")]
    AtEnd,

    /// Stepping backward past the first event
    #[error("already at beginning")]
    AtBeginning,

    /// The tick scheduler could not be started
    #[error("scheduler error: {0}")]
    Scheduler(String),

    /// Configuration could not be parsed or failed validation
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl PlaybackError {
    pub(crate) fn speed_out_of_range(speed: f64) -> Self {
        Self::SpeedOutOfRange {
            speed,
            min: crate::speed::MIN_SPEED,
            max: crate::speed::MAX_SPEED,
        }
    }
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
