//! Clock + cursor composed into a seekable timeline of fixed duration.
//!
//! The virtual clock only runs forward. Backward travel is expressed by
//! folding clock time around a pivot: while heading backward the playhead
//! moves down by however much virtual time has elapsed since the pivot.

use crate::boundary::PlaybackDirection;
use crate::clock::VirtualClock;
use crate::cursor::{EventBatch, EventCursor};
use crate::error::{PlaybackError, Result};
use crate::sequence::{EventSequence, TimedEvent};

const DURATION_EPSILON: f64 = 1e-9;

/// Clock reading at which the playhead was last placed.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Pivot {
    pub virtual_time: f64,
    pub position: f64,
}

impl Pivot {
    fn at(t: f64) -> Self {
        Self {
            virtual_time: t,
            position: t,
        }
    }
}

#[derive(Debug)]
pub struct SeekableTimeline<E> {
    clock: VirtualClock,
    cursor: EventCursor<E>,
    duration: f64,
    pivot: Pivot,
}

impl<E: TimedEvent> SeekableTimeline<E> {
    pub fn new(events: EventSequence<E>, duration: f64, clock: VirtualClock) -> Result<Self> {
        if !duration.is_finite() || duration < 0.0 {
            return Err(PlaybackError::InvalidDuration(duration));
        }
        Ok(Self {
            clock,
            cursor: EventCursor::new(events),
            duration,
            pivot: Pivot::default(),
        })
    }

    pub fn clock(&self) -> &VirtualClock {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut VirtualClock {
        &mut self.clock
    }

    pub fn cursor(&self) -> &EventCursor<E> {
        &self.cursor
    }

    pub fn cursor_mut(&mut self) -> &mut EventCursor<E> {
        &mut self.cursor
    }

    pub fn events(&self) -> &EventSequence<E> {
        self.cursor.events()
    }

    pub fn is_empty(&self) -> bool {
        self.cursor.is_empty()
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn pivot(&self) -> Pivot {
        self.pivot
    }

    /// Playhead in virtual seconds. Not clamped to the duration.
    pub fn position_seconds(&self, direction: PlaybackDirection) -> f64 {
        let elapsed = self.clock.virtual_now() - self.pivot.virtual_time;
        self.pivot.position + direction.sign() * elapsed
    }

    /// Fraction of the duration covered, in `[0, 1]`.
    pub fn progress(&self, direction: PlaybackDirection) -> f64 {
        if self.duration.abs() < DURATION_EPSILON {
            return 0.0;
        }
        (self.position_seconds(direction) / self.duration).clamp(0.0, 1.0)
    }

    /// Drain the events crossed since the last call.
    pub fn advance(&mut self, direction: PlaybackDirection) -> EventBatch {
        let position = self.position_seconds(direction);
        match direction {
            PlaybackDirection::Forward => self.cursor.drain_forward(position),
            PlaybackDirection::Backward => self.cursor.drain_backward(position),
        }
    }

    /// Whether the cursor has run out of events in `direction`.
    pub fn at_boundary(&self, direction: PlaybackDirection) -> bool {
        match direction {
            PlaybackDirection::Forward => self.cursor.at_end(),
            PlaybackDirection::Backward => self.cursor.at_start(),
        }
    }

    /// Jump to `target` seconds, clamped into `[0, duration]`.
    ///
    /// Returns the clamped position.
    pub fn seek(&mut self, target: f64, direction: PlaybackDirection) -> Result<f64> {
        if self.cursor.is_empty() {
            return Err(PlaybackError::EmptyTimeline);
        }
        let position = if target.is_nan() {
            0.0
        } else {
            target.clamp(0.0, self.duration)
        };
        self.snap_to(position);
        match direction {
            PlaybackDirection::Forward => self.cursor.seek_to(position),
            PlaybackDirection::Backward => self.cursor.seek_backward_to(position),
        }
        tracing::debug!(requested = target, position, %direction, "timeline seek");
        Ok(position)
    }

    pub fn seek_relative(&mut self, delta: f64, direction: PlaybackDirection) -> Result<f64> {
        let current = self.position_seconds(direction);
        self.seek(current + delta, direction)
    }

    /// Place the playhead at `position` without touching the cursor.
    pub fn snap_to(&mut self, position: f64) {
        self.clock.snap_position(position);
        self.pivot = Pivot::at(position);
    }

    /// Go back to the edge `direction` starts from.
    pub fn rewind(&mut self, direction: PlaybackDirection) {
        match direction {
            PlaybackDirection::Forward => {
                self.cursor.reset_to_start();
                self.snap_to(0.0);
            }
            PlaybackDirection::Backward => {
                self.cursor.reset_to_end();
                self.cursor.turn(PlaybackDirection::Backward);
                self.snap_to(self.duration);
            }
        }
    }

    /// Turn the playhead around in place.
    pub fn set_heading(&mut self, from: PlaybackDirection, to: PlaybackDirection) {
        if from == to {
            return;
        }
        self.pivot = Pivot {
            virtual_time: self.clock.virtual_now(),
            position: self.position_seconds(from),
        };
        self.cursor.turn(to);
    }

    /// Back to the unstarted state at position 0.
    pub fn reset(&mut self) {
        self.clock.reset();
        self.cursor.reset_to_start();
        self.pivot = Pivot::default();
    }
}
