//! Virtual clock for variable-speed replay timing.
//!
//! Wall time comes from a pluggable [`TimeSource`]; virtual time is derived
//! from it through a [`SpeedController`]. The clock can be frozen (paused),
//! repositioned and re-anchored without ever jumping.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::error::Result;
use crate::speed::{validate_speed, SpeedController, EPSILON as RAMP_EPSILON};

/// Source of monotonically non-decreasing wall time, in seconds.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> f64;
}

/// Wall time backed by [`Instant`].
#[derive(Debug)]
pub struct MonotonicTime {
    epoch: Instant,
}

impl MonotonicTime {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for MonotonicTime {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicTime {
    fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }
}

/// Hand-driven wall time for deterministic tests.
#[derive(Debug, Default)]
pub struct ManualTime {
    bits: AtomicU64,
}

impl ManualTime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward by `secs`. Negative values are ignored.
    pub fn advance(&self, secs: f64) {
        if secs > 0.0 {
            self.set(self.now() + secs);
        }
    }

    pub fn set(&self, secs: f64) {
        self.bits.store(secs.to_bits(), Ordering::SeqCst);
    }
}

impl TimeSource for ManualTime {
    fn now(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::SeqCst))
    }
}

/// Maps wall time elapsed since [`VirtualClock::start`] onto virtual time.
pub struct VirtualClock {
    source: Arc<dyn TimeSource>,
    /// Wall reading at start. `None` until started.
    origin: Option<f64>,
    speed: SpeedController,
    /// Position and speed held while paused.
    hold: Option<Hold>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Hold {
    virtual_time: f64,
    speed: f64,
}

impl fmt::Debug for VirtualClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualClock")
            .field("origin", &self.origin)
            .field("speed", &self.speed)
            .field("hold", &self.hold)
            .finish_non_exhaustive()
    }
}

impl VirtualClock {
    pub fn new(source: Arc<dyn TimeSource>, speed: f64, acceleration: f64) -> Result<Self> {
        Ok(Self {
            source,
            origin: None,
            speed: SpeedController::new(speed, acceleration)?,
            hold: None,
        })
    }

    /// Start measuring wall time. Calling again has no effect.
    pub fn start(&mut self) {
        if self.origin.is_none() {
            self.origin = Some(self.source.now());
        }
    }

    pub fn is_started(&self) -> bool {
        self.origin.is_some()
    }

    /// Return to the unstarted state at virtual 0, keeping the target speed.
    pub fn reset(&mut self) {
        self.origin = None;
        self.hold = None;
        let target = self.speed.target_speed();
        self.speed.place(0.0, 0.0, target);
    }

    /// Seconds of wall time since start; 0 before start.
    pub fn wall_now(&self) -> f64 {
        match self.origin {
            Some(origin) => (self.source.now() - origin).max(0.0),
            None => 0.0,
        }
    }

    /// Current virtual time.
    pub fn virtual_now(&self) -> f64 {
        match self.hold {
            Some(held) => held.virtual_time,
            None => self.speed.virtual_at(self.wall_now()),
        }
    }

    /// Instantaneous speed. While frozen, the speed reached at freeze time.
    pub fn current_speed(&self) -> f64 {
        match self.hold {
            Some(held) => held.speed,
            None => self.speed.speed_at(self.wall_now()),
        }
    }

    pub fn target_speed(&self) -> f64 {
        self.speed.target_speed()
    }

    pub fn acceleration(&self) -> f64 {
        self.speed.acceleration()
    }

    pub fn is_ramping(&self) -> bool {
        match self.hold {
            Some(held) => (held.speed - self.speed.target_speed()).abs() > RAMP_EPSILON,
            None => self.speed.is_ramping(self.wall_now()),
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.hold.is_some()
    }

    /// Ramp towards `target` from the current speed.
    pub fn set_target_speed(&mut self, target: f64) -> Result<()> {
        let wall = self.settle_hold();
        let virt = self.speed.virtual_at(wall);
        self.speed.set_target(target, wall, virt)?;
        self.refresh_hold(wall);
        Ok(())
    }

    /// Jump to `speed` with no ramp.
    pub fn snap_speed(&mut self, speed: f64) -> Result<()> {
        let speed = validate_speed(speed)?;
        let wall = self.settle_hold();
        let virt = self.speed.virtual_at(wall);
        self.speed.place(wall, virt, speed);
        self.refresh_hold(wall);
        Ok(())
    }

    pub fn set_acceleration(&mut self, acceleration: f64) -> Result<()> {
        let wall = self.settle_hold();
        let virt = self.speed.virtual_at(wall);
        self.speed.set_acceleration(acceleration, wall, virt)?;
        self.refresh_hold(wall);
        Ok(())
    }

    /// Place virtual time at `position` without changing speed.
    pub fn snap_position(&mut self, position: f64) {
        let wall = self.settle_hold();
        self.speed.reanchor(wall, position);
        self.refresh_hold(wall);
    }

    /// Hold virtual time and speed at their current values.
    pub fn freeze(&mut self) {
        if self.hold.is_none() {
            self.hold = Some(Hold {
                virtual_time: self.virtual_now(),
                speed: self.current_speed(),
            });
        }
    }

    /// Resume at the current wall time from the held position and speed.
    ///
    /// A ramp interrupted by [`VirtualClock::freeze`] continues from the speed
    /// it had reached, so paused wall time never advances it.
    pub fn reanchor(&mut self) {
        let wall = self.settle_hold();
        if self.hold.take().is_none() {
            let virt = self.speed.virtual_at(wall);
            self.speed.reanchor(wall, virt);
        }
    }

    /// Re-anchor the controller on the held state at the current wall time.
    /// Returns that wall time.
    fn settle_hold(&mut self) -> f64 {
        let wall = self.wall_now();
        if let Some(held) = self.hold {
            self.speed.resume_at(wall, held.virtual_time, held.speed);
        }
        wall
    }

    fn refresh_hold(&mut self, wall: f64) {
        if self.hold.is_some() {
            self.hold = Some(Hold {
                virtual_time: self.speed.virtual_at(wall),
                speed: self.speed.speed_at(wall),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn clock(speed: f64) -> (Arc<ManualTime>, VirtualClock) {
        let time = Arc::new(ManualTime::new());
        let clock = VirtualClock::new(time.clone(), speed, 0.0).unwrap();
        (time, clock)
    }

    #[test]
    fn test_unstarted_clock_stays_at_zero() {
        let (time, clock) = clock(1.0);
        time.advance(5.0);
        assert_eq!(clock.wall_now(), 0.0);
        assert_eq!(clock.virtual_now(), 0.0);
    }

    #[test]
    fn test_start_is_idempotent() {
        let (time, mut clock) = clock(2.0);
        time.set(10.0);
        clock.start();
        time.advance(1.0);
        clock.start();
        time.advance(1.0);
        assert!(approx(clock.wall_now(), 2.0));
        assert!(approx(clock.virtual_now(), 4.0));
    }

    #[test]
    fn test_freeze_and_reanchor_preserve_position() {
        let (time, mut clock) = clock(1.0);
        clock.start();
        time.advance(3.0);
        clock.freeze();
        time.advance(100.0);
        assert!(approx(clock.virtual_now(), 3.0));

        clock.reanchor();
        assert!(!clock.is_frozen());
        assert!(approx(clock.virtual_now(), 3.0));
        time.advance(1.0);
        assert!(approx(clock.virtual_now(), 4.0));
    }

    #[test]
    fn test_snap_position_while_frozen() {
        let (time, mut clock) = clock(1.0);
        clock.start();
        time.advance(2.0);
        clock.freeze();
        clock.snap_position(7.5);
        assert!(approx(clock.virtual_now(), 7.5));
        clock.reanchor();
        time.advance(0.5);
        assert!(approx(clock.virtual_now(), 8.0));
    }

    #[test]
    fn test_reset_keeps_target_speed() {
        let (time, mut clock) = clock(1.0);
        clock.start();
        clock.snap_speed(4.0).unwrap();
        time.advance(1.0);
        clock.reset();
        assert!(!clock.is_started());
        assert_eq!(clock.virtual_now(), 0.0);
        assert_eq!(clock.target_speed(), 4.0);
        clock.start();
        time.advance(1.0);
        assert!(approx(clock.virtual_now(), 4.0));
    }

    #[test]
    fn test_invalid_speed_leaves_clock_untouched() {
        let (time, mut clock) = clock(1.0);
        clock.start();
        time.advance(1.0);
        assert!(clock.set_target_speed(1000.0).is_err());
        assert!(clock.snap_speed(0.0).is_err());
        assert_eq!(clock.target_speed(), 1.0);
        assert!(approx(clock.virtual_now(), 1.0));
    }

    #[test]
    fn test_ramp_reports_intermediate_speed() {
        let time = Arc::new(ManualTime::new());
        let mut clock = VirtualClock::new(time.clone(), 1.0, 2.0).unwrap();
        clock.start();
        clock.set_target_speed(5.0).unwrap();
        time.advance(1.0);
        assert!(clock.is_ramping());
        assert!(approx(clock.current_speed(), 3.0));
        time.advance(1.0);
        assert!(!clock.is_ramping());
        assert!(approx(clock.current_speed(), 5.0));
    }

    #[test]
    fn test_freeze_mid_ramp_holds_speed() {
        let time = Arc::new(ManualTime::new());
        let mut clock = VirtualClock::new(time.clone(), 1.0, 1.0).unwrap();
        clock.start();
        clock.set_target_speed(5.0).unwrap();
        time.advance(1.0);
        clock.freeze();
        let held = clock.virtual_now();
        assert!(approx(held, 1.5));

        time.advance(10.0);
        assert!(approx(clock.current_speed(), 2.0));
        assert!(clock.is_ramping());

        clock.reanchor();
        assert!(approx(clock.current_speed(), 2.0));
        assert!(approx(clock.virtual_now(), held));
        time.advance(1.0);
        // 2 * 1 + 0.5 * 1 * 1
        assert!(approx(clock.virtual_now(), held + 2.5));
        assert!(approx(clock.current_speed(), 3.0));
        time.advance(2.0);
        assert!(!clock.is_ramping());
        assert!(approx(clock.current_speed(), 5.0));
    }

    #[test]
    fn test_speed_change_while_frozen_applies_on_resume() {
        let time = Arc::new(ManualTime::new());
        let mut clock = VirtualClock::new(time.clone(), 1.0, 1.0).unwrap();
        clock.start();
        time.advance(2.0);
        clock.freeze();
        time.advance(5.0);
        clock.set_target_speed(3.0).unwrap();
        assert!(approx(clock.virtual_now(), 2.0));
        assert!(approx(clock.current_speed(), 1.0));
        time.advance(5.0);

        clock.reanchor();
        time.advance(2.0);
        // ramp 1 -> 3 over 2 s covers 4 virtual seconds
        assert!(approx(clock.virtual_now(), 6.0));
        assert!(approx(clock.current_speed(), 3.0));
    }

    #[test]
    fn test_manual_time_ignores_negative_advance() {
        let time = ManualTime::new();
        time.set(2.0);
        time.advance(-1.0);
        assert_eq!(time.now(), 2.0);
    }
}
