//! Bidirectional event cursor.
//!
//! The cursor index means different things depending on heading. Moving
//! forward, `index` is the next event to emit. Moving backward, `index` is
//! the next event to emit when walking towards the start; every event above
//! it has already been consumed. [`EventCursor::turn`] converts between the
//! two conventions.

use smallvec::SmallVec;

use crate::boundary::PlaybackDirection;
use crate::sequence::{EventSequence, TimedEvent};

/// Indices of the events emitted by one drain, in emission order.
pub type EventBatch = SmallVec<[usize; 16]>;

#[derive(Clone, Debug)]
pub struct EventCursor<E> {
    events: EventSequence<E>,
    index: isize,
}

impl<E: TimedEvent> EventCursor<E> {
    pub fn new(events: EventSequence<E>) -> Self {
        Self { events, index: 0 }
    }

    pub fn events(&self) -> &EventSequence<E> {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn index(&self) -> isize {
        self.index
    }

    fn len_isize(&self) -> isize {
        self.events.len() as isize
    }

    /// Forward drains have nothing left.
    pub fn at_end(&self) -> bool {
        self.index >= self.len_isize()
    }

    /// Backward drains have nothing left.
    pub fn at_start(&self) -> bool {
        self.index < 0
    }

    fn time_at(&self, index: isize) -> f64 {
        self.events[index as usize].playback_time()
    }

    /// Position at the first event with time `>= t`, clamped to a valid index.
    pub fn seek_to(&mut self, t: f64) {
        if self.events.is_empty() {
            self.index = 0;
            return;
        }
        let lower = self.events.partition_point(|e| e.playback_time() < t);
        self.index = lower.min(self.events.len() - 1) as isize;
    }

    /// Position for backward travel from `t`: the last event with time `<= t`,
    /// or before the first event when there is none.
    pub fn seek_backward_to(&mut self, t: f64) {
        let upper = self.events.partition_point(|e| e.playback_time() <= t);
        self.index = upper as isize - 1;
    }

    /// Emit every event with time `<= virtual_time`, ascending.
    pub fn drain_forward(&mut self, virtual_time: f64) -> EventBatch {
        let mut batch = EventBatch::new();
        self.index = self.index.max(0);
        while self.index < self.len_isize() && self.time_at(self.index) <= virtual_time {
            batch.push(self.index as usize);
            self.index += 1;
        }
        batch
    }

    /// Emit every event with time `>= virtual_time`, descending.
    pub fn drain_backward(&mut self, virtual_time: f64) -> EventBatch {
        let mut batch = EventBatch::new();
        self.index = self.index.min(self.len_isize() - 1);
        while self.index >= 0 && self.time_at(self.index) >= virtual_time {
            batch.push(self.index as usize);
            self.index -= 1;
        }
        batch
    }

    /// Emit the single next event going forward.
    pub fn try_step_forward(&mut self) -> Option<usize> {
        self.index = self.index.max(0);
        if self.index < self.len_isize() {
            let emitted = self.index as usize;
            self.index += 1;
            Some(emitted)
        } else {
            None
        }
    }

    /// Emit the single next event going backward.
    pub fn try_step_backward(&mut self) -> Option<usize> {
        self.index = self.index.min(self.len_isize() - 1);
        if self.index >= 0 {
            let emitted = self.index as usize;
            self.index -= 1;
            Some(emitted)
        } else {
            None
        }
    }

    /// Switch index convention when heading flips to `direction`.
    pub fn turn(&mut self, direction: PlaybackDirection) {
        match direction {
            PlaybackDirection::Forward => self.index += 1,
            PlaybackDirection::Backward => self.index -= 1,
        }
    }

    pub fn reset_to_start(&mut self) {
        self.index = 0;
    }

    pub fn reset_to_end(&mut self) {
        self.index = self.len_isize();
    }

    /// Number of events emitted so far when walking from the start in the
    /// given heading, i.e. events at indices `< applied` are behind the cursor.
    pub fn applied(&self, direction: PlaybackDirection) -> usize {
        let raw = match direction {
            PlaybackDirection::Forward => self.index,
            PlaybackDirection::Backward => self.index + 1,
        };
        raw.clamp(0, self.len_isize()) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cursor(times: &[f64]) -> EventCursor<f64> {
        EventCursor::new(EventSequence::from(times.to_vec()))
    }

    #[test]
    fn test_fresh_cursor_is_not_at_start() {
        let c = cursor(&[1.0, 2.0]);
        assert_eq!(c.index(), 0);
        assert!(!c.at_start());
        assert!(!c.at_end());
    }

    #[test]
    fn test_drain_forward_includes_equal_times() {
        let mut c = cursor(&[1.0, 2.0, 2.0, 3.0]);
        assert!(c.drain_forward(0.5).is_empty());
        assert_eq!(c.drain_forward(2.0).as_slice(), &[0, 1, 2]);
        assert_eq!(c.drain_forward(2.5).len(), 0);
        assert_eq!(c.drain_forward(10.0).as_slice(), &[3]);
        assert!(c.at_end());
        assert!(c.drain_forward(20.0).is_empty());
    }

    #[test]
    fn test_drain_backward_descends() {
        let mut c = cursor(&[1.0, 2.0, 3.0]);
        c.reset_to_end();
        assert_eq!(c.drain_backward(2.0).as_slice(), &[2, 1]);
        assert_eq!(c.drain_backward(0.0).as_slice(), &[0]);
        assert!(c.at_start());
    }

    #[test]
    fn test_seek_lower_bound_and_clamp() {
        let mut c = cursor(&[1.0, 2.0, 3.0]);
        c.seek_to(1.5);
        assert_eq!(c.index(), 1);
        c.seek_to(2.0);
        assert_eq!(c.index(), 1);
        c.seek_to(99.0);
        assert_eq!(c.index(), 2);
        c.seek_to(-5.0);
        assert_eq!(c.index(), 0);
    }

    #[test]
    fn test_seek_backward_upper_bound() {
        let mut c = cursor(&[1.0, 2.0, 3.0]);
        c.seek_backward_to(99.0);
        assert_eq!(c.index(), 2);
        c.seek_backward_to(2.0);
        assert_eq!(c.index(), 1);
        c.seek_backward_to(0.5);
        assert!(c.at_start());
        assert!(c.drain_backward(0.0).is_empty());
    }

    #[test]
    fn test_empty_cursor() {
        let mut c = cursor(&[]);
        c.seek_to(3.0);
        assert_eq!(c.index(), 0);
        assert!(c.at_end());
        assert!(c.drain_forward(1.0).is_empty());
        assert!(c.drain_backward(0.0).is_empty());
        assert_eq!(c.try_step_forward(), None);
        assert_eq!(c.try_step_backward(), None);
    }

    #[test]
    fn test_turn_switches_convention() {
        let mut c = cursor(&[1.0, 2.0, 3.0]);
        assert_eq!(c.drain_forward(2.0).as_slice(), &[0, 1]);
        c.turn(PlaybackDirection::Backward);
        // event 1 was last emitted, so walking back re-emits it first
        assert_eq!(c.index(), 1);
        assert_eq!(c.applied(PlaybackDirection::Backward), 2);
        assert_eq!(c.drain_backward(1.0).as_slice(), &[1, 0]);
        c.turn(PlaybackDirection::Forward);
        assert_eq!(c.index(), 0);
    }

    #[test]
    fn test_steps_and_applied() {
        let mut c = cursor(&[1.0, 2.0]);
        assert_eq!(c.applied(PlaybackDirection::Forward), 0);
        assert_eq!(c.try_step_forward(), Some(0));
        assert_eq!(c.try_step_forward(), Some(1));
        assert_eq!(c.try_step_forward(), None);
        assert_eq!(c.applied(PlaybackDirection::Forward), 2);

        c.turn(PlaybackDirection::Backward);
        assert_eq!(c.try_step_backward(), Some(1));
        assert_eq!(c.try_step_backward(), Some(0));
        assert_eq!(c.try_step_backward(), None);
        assert_eq!(c.applied(PlaybackDirection::Backward), 0);
    }
}
