//! Speed ramping for the virtual clock.
//!
//! Virtual position is integrated in closed form over a trapezoidal velocity
//! profile: speed moves linearly from `v0` to the target at a constant
//! acceleration, then holds. Only the most recent anchor is kept, so any
//! number of speed changes compose without accumulating error.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{PlaybackError, Result};

/// Slowest supported speed multiplier.
pub const MIN_SPEED: f64 = 0.1;
/// Fastest supported speed multiplier.
pub const MAX_SPEED: f64 = 200.0;

pub(crate) const EPSILON: f64 = 1e-9;

/// Returns `Ok(speed)` when `speed` lies in [`MIN_SPEED`, `MAX_SPEED`].
pub fn validate_speed(speed: f64) -> Result<f64> {
    if speed.is_finite() && (MIN_SPEED..=MAX_SPEED).contains(&speed) {
        Ok(speed)
    } else {
        Err(PlaybackError::speed_out_of_range(speed))
    }
}

/// The (wall, virtual, speed) state a ramp is computed from.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClockAnchor {
    /// Speed at the anchor instant.
    pub v0: f64,
    /// Wall time the anchor was taken at.
    pub ramp_start_wall: f64,
    /// Virtual time at `ramp_start_wall`.
    pub virtual_at_ramp_start: f64,
    /// Wall seconds needed to reach `target_speed`; 0 means instantaneous.
    pub ramp_duration: f64,
    pub target_speed: f64,
    /// Speed units per wall second; `<= 0` disables ramping.
    pub acceleration: f64,
}

impl ClockAnchor {
    fn ramp_sign(&self) -> f64 {
        let delta = self.target_speed - self.v0;
        if delta.abs() < EPSILON {
            0.0
        } else {
            delta.signum()
        }
    }

    fn displacement(&self, t: f64) -> f64 {
        self.v0 * t + 0.5 * self.ramp_sign() * self.acceleration * t * t
    }

    fn recompute_ramp(&mut self) {
        self.ramp_duration = if self.acceleration > 0.0 {
            (self.target_speed - self.v0).abs() / self.acceleration
        } else {
            0.0
        };
    }

    fn ramp_settled(&self, t: f64) -> bool {
        self.ramp_duration < EPSILON || t >= self.ramp_duration
    }
}

/// Kinematic model mapping wall time to virtual time.
///
/// All sampling methods take `&self`; the current speed is derived from the
/// anchor rather than stored, so reads never mutate.
#[derive(Clone, Debug, PartialEq)]
pub struct SpeedController {
    anchor: ClockAnchor,
}

impl SpeedController {
    /// Create a controller running at `speed` from the origin.
    pub fn new(speed: f64, acceleration: f64) -> Result<Self> {
        let speed = validate_speed(speed)?;
        if !acceleration.is_finite() {
            return Err(PlaybackError::InvalidAcceleration(acceleration));
        }
        Ok(Self {
            anchor: ClockAnchor {
                v0: speed,
                ramp_start_wall: 0.0,
                virtual_at_ramp_start: 0.0,
                ramp_duration: 0.0,
                target_speed: speed,
                acceleration,
            },
        })
    }

    pub fn anchor(&self) -> &ClockAnchor {
        &self.anchor
    }

    pub fn target_speed(&self) -> f64 {
        self.anchor.target_speed
    }

    pub fn acceleration(&self) -> f64 {
        self.anchor.acceleration
    }

    /// Begin a ramp from the speed at `wall_now` towards `target`.
    pub fn set_target(&mut self, target: f64, wall_now: f64, virtual_now: f64) -> Result<()> {
        let target = validate_speed(target)?;
        let v0 = self.speed_at(wall_now);
        self.anchor.v0 = v0;
        self.anchor.ramp_start_wall = wall_now;
        self.anchor.virtual_at_ramp_start = virtual_now;
        self.anchor.target_speed = target;
        self.anchor.recompute_ramp();
        Ok(())
    }

    /// Jump to `speed` immediately and anchor at `(wall_now, virtual_pos)`.
    pub fn snap_to(&mut self, wall_now: f64, virtual_pos: f64, speed: f64) -> Result<()> {
        let speed = validate_speed(speed)?;
        self.place(wall_now, virtual_pos, speed);
        Ok(())
    }

    pub(crate) fn place(&mut self, wall_now: f64, virtual_pos: f64, speed: f64) {
        self.anchor.v0 = speed;
        self.anchor.target_speed = speed;
        self.anchor.ramp_start_wall = wall_now;
        self.anchor.virtual_at_ramp_start = virtual_pos;
        self.anchor.ramp_duration = 0.0;
    }

    /// Move the anchor to `(wall_now, virtual_now)`, keeping the target.
    ///
    /// An unfinished ramp continues from the speed reached at `wall_now`.
    pub fn reanchor(&mut self, wall_now: f64, virtual_now: f64) {
        let v0 = self.speed_at(wall_now);
        self.anchor.v0 = v0;
        self.anchor.ramp_start_wall = wall_now;
        self.anchor.virtual_at_ramp_start = virtual_now;
        self.anchor.recompute_ramp();
    }

    /// Anchor at `(wall_now, virtual_now)` running at `speed`, keeping the
    /// target. The remaining ramp is recomputed from `speed`.
    pub(crate) fn resume_at(&mut self, wall_now: f64, virtual_now: f64, speed: f64) {
        self.anchor.v0 = speed;
        self.anchor.ramp_start_wall = wall_now;
        self.anchor.virtual_at_ramp_start = virtual_now;
        self.anchor.recompute_ramp();
    }

    /// Change the ramp acceleration without disturbing virtual time.
    pub fn set_acceleration(
        &mut self,
        acceleration: f64,
        wall_now: f64,
        virtual_now: f64,
    ) -> Result<()> {
        if !acceleration.is_finite() {
            return Err(PlaybackError::InvalidAcceleration(acceleration));
        }
        let v0 = self.speed_at(wall_now);
        self.anchor.v0 = v0;
        self.anchor.ramp_start_wall = wall_now;
        self.anchor.virtual_at_ramp_start = virtual_now;
        self.anchor.acceleration = acceleration;
        self.anchor.recompute_ramp();
        Ok(())
    }

    /// Virtual time at `wall_now`.
    pub fn virtual_at(&self, wall_now: f64) -> f64 {
        let a = &self.anchor;
        let t = (wall_now - a.ramp_start_wall).max(0.0);
        if a.ramp_settled(t) {
            a.virtual_at_ramp_start
                + a.displacement(a.ramp_duration)
                + a.target_speed * (t - a.ramp_duration).max(0.0)
        } else {
            a.virtual_at_ramp_start + a.displacement(t)
        }
    }

    /// Instantaneous speed at `wall_now`.
    pub fn speed_at(&self, wall_now: f64) -> f64 {
        let a = &self.anchor;
        let t = (wall_now - a.ramp_start_wall).max(0.0);
        if a.ramp_settled(t) {
            a.target_speed
        } else {
            a.v0 + a.ramp_sign() * a.acceleration * t
        }
    }

    pub fn is_ramping(&self, wall_now: f64) -> bool {
        (self.speed_at(wall_now) - self.anchor.target_speed).abs() > EPSILON
    }
}

/// Named speed multipliers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpeedPreset {
    QuarterSpeed,
    HalfSpeed,
    Normal,
    Double,
    Fast,
    VeryFast,
    Scrub,
}

impl SpeedPreset {
    pub const ALL: [SpeedPreset; 7] = [
        Self::QuarterSpeed,
        Self::HalfSpeed,
        Self::Normal,
        Self::Double,
        Self::Fast,
        Self::VeryFast,
        Self::Scrub,
    ];

    pub fn multiplier(self) -> f64 {
        match self {
            Self::QuarterSpeed => 0.25,
            Self::HalfSpeed => 0.5,
            Self::Normal => 1.0,
            Self::Double => 2.0,
            Self::Fast => 5.0,
            Self::VeryFast => 20.0,
            Self::Scrub => 100.0,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::QuarterSpeed => "QuarterSpeed",
            Self::HalfSpeed => "HalfSpeed",
            Self::Normal => "Normal",
            Self::Double => "Double",
            Self::Fast => "Fast",
            Self::VeryFast => "VeryFast",
            Self::Scrub => "Scrub",
        }
    }
}

impl fmt::Display for SpeedPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SpeedPreset {
    type Err = PlaybackError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|preset| preset.name() == s)
            .ok_or_else(|| PlaybackError::UnknownPreset(s.to_string()))
    }
}
