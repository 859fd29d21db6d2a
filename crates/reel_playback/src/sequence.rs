//! Time-ordered event sequences.
//!
//! The engine never looks inside an event. All it needs is the playback time,
//! in virtual seconds, exposed through [`TimedEvent`].

use serde::{Deserialize, Serialize};
use std::ops::Deref;
use std::sync::Arc;

/// Anything that can be placed on the virtual timeline.
pub trait TimedEvent {
    /// Playback time in virtual seconds.
    fn playback_time(&self) -> f64;
}

impl TimedEvent for f64 {
    fn playback_time(&self) -> f64 {
        *self
    }
}

impl<E: TimedEvent + ?Sized> TimedEvent for Arc<E> {
    fn playback_time(&self) -> f64 {
        (**self).playback_time()
    }
}

/// A payload stamped with its playback time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Timed<T> {
    /// Playback time in virtual seconds.
    pub time: f64,
    /// The wrapped domain value.
    pub payload: T,
}

impl<T> Timed<T> {
    pub fn new(time: f64, payload: T) -> Self {
        Self { time, payload }
    }
}

impl<T> TimedEvent for Timed<T> {
    fn playback_time(&self) -> f64 {
        self.time
    }
}

/// Immutable, shared, ascending-by-time list of events.
///
/// Ordering is established by whoever builds the sequence; it is assumed here
/// and not re-checked. [`EventSequence::is_ordered`] is available for callers
/// that want to verify their input.
#[derive(Debug)]
pub struct EventSequence<E> {
    events: Arc<[E]>,
}

impl<E> Clone for EventSequence<E> {
    fn clone(&self) -> Self {
        Self {
            events: Arc::clone(&self.events),
        }
    }
}

impl<E> EventSequence<E> {
    /// An empty sequence.
    pub fn empty() -> Self {
        Self {
            events: Arc::from(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&E> {
        self.events.get(index)
    }

    pub fn as_slice(&self) -> &[E] {
        &self.events
    }
}

impl<E: TimedEvent> EventSequence<E> {
    /// Playback time of the last event, if any.
    pub fn last_time(&self) -> Option<f64> {
        self.events.last().map(TimedEvent::playback_time)
    }

    /// Whether playback times are non-decreasing.
    pub fn is_ordered(&self) -> bool {
        self.events
            .windows(2)
            .all(|pair| pair[0].playback_time() <= pair[1].playback_time())
    }
}

impl<E> Deref for EventSequence<E> {
    type Target = [E];

    fn deref(&self) -> &[E] {
        &self.events
    }
}

impl<E> From<Vec<E>> for EventSequence<E> {
    fn from(events: Vec<E>) -> Self {
        Self {
            events: Arc::from(events),
        }
    }
}

impl<E> From<Arc<[E]>> for EventSequence<E> {
    fn from(events: Arc<[E]>) -> Self {
        Self { events }
    }
}

impl<E> FromIterator<E> for EventSequence<E> {
    fn from_iter<I: IntoIterator<Item = E>>(iter: I) -> Self {
        Self {
            events: iter.into_iter().collect(),
        }
    }
}
