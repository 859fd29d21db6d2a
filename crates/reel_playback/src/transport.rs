//! Play/pause/stop state machine wrapped around a tick scheduler.
//!
//! The transport owns the scheduler and fans ticks out to its subscribers.
//! A panicking tick subscriber is logged and counted; it never stops the
//! scheduler.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use crate::boundary::PlaybackMode;
use crate::error::{PlaybackError, Result};
use crate::observer::{Subscribers, SubscriptionId};
use crate::scheduler::{TickFn, TickScheduler};

/// Transport state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportState {
    #[default]
    Idle,
    Playing,
    Paused,
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Playing => f.write_str("playing"),
            Self::Paused => f.write_str("paused"),
        }
    }
}

struct TransportInner {
    state: TransportState,
    mode: PlaybackMode,
    interval: Duration,
}

struct TransportShared {
    inner: Mutex<TransportInner>,
    scheduler: Arc<dyn TickScheduler>,
    tick_handlers: Subscribers<()>,
    state_handlers: Subscribers<TransportState>,
    tick_faults: AtomicU64,
}

impl TransportShared {
    fn fire_tick(&self) {
        if self.inner.lock().state != TransportState::Playing {
            return;
        }
        let mut fault = None;
        self.tick_handlers.emit_each(|handler| {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| handler(&()))) {
                fault = Some(panic_message(payload.as_ref()));
                self.tick_faults.fetch_add(1, Ordering::Relaxed);
            }
        });
        if let Some(message) = fault {
            tracing::error!(
                %message,
                faults = self.tick_faults.load(Ordering::Relaxed),
                "tick subscriber panicked"
            );
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Cheaply cloneable handle to a transport.
#[derive(Clone)]
pub struct PlaybackTransport {
    shared: Arc<TransportShared>,
}

impl fmt::Debug for PlaybackTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.shared.inner.lock();
        f.debug_struct("PlaybackTransport")
            .field("state", &inner.state)
            .field("mode", &inner.mode)
            .field("interval", &inner.interval)
            .finish_non_exhaustive()
    }
}

impl PlaybackTransport {
    pub fn new(scheduler: Arc<dyn TickScheduler>, interval: Duration) -> Self {
        Self {
            shared: Arc::new(TransportShared {
                inner: Mutex::new(TransportInner {
                    state: TransportState::Idle,
                    mode: PlaybackMode::Once,
                    interval,
                }),
                scheduler,
                tick_handlers: Subscribers::new(),
                state_handlers: Subscribers::new(),
                tick_faults: AtomicU64::new(0),
            }),
        }
    }

    pub fn state(&self) -> TransportState {
        self.shared.inner.lock().state
    }

    pub fn mode(&self) -> PlaybackMode {
        self.shared.inner.lock().mode
    }

    pub fn set_mode(&self, mode: PlaybackMode) {
        self.shared.inner.lock().mode = mode;
    }

    pub fn interval(&self) -> Duration {
        self.shared.inner.lock().interval
    }

    /// Number of tick subscriber panics caught so far.
    pub fn tick_faults(&self) -> u64 {
        self.shared.tick_faults.load(Ordering::Relaxed)
    }

    pub fn on_tick<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.shared.tick_handlers.subscribe(move |_| handler())
    }

    pub fn on_state_change<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(TransportState) + Send + Sync + 'static,
    {
        self.shared
            .state_handlers
            .subscribe(move |state| handler(*state))
    }

    pub fn unsubscribe_tick(&self, id: SubscriptionId) -> bool {
        self.shared.tick_handlers.unsubscribe(id)
    }

    pub fn unsubscribe_state(&self, id: SubscriptionId) -> bool {
        self.shared.state_handlers.unsubscribe(id)
    }

    /// Start ticking. Already playing is a no-op.
    pub fn play(&self) -> Result<()> {
        if self.play_deferred()? {
            self.publish(TransportState::Playing);
        }
        Ok(())
    }

    /// Start without notifying. Returns whether the state changed.
    /// Pair with [`PlaybackTransport::publish`].
    pub(crate) fn play_deferred(&self) -> Result<bool> {
        let mut inner = self.shared.inner.lock();
        if inner.state == TransportState::Playing {
            return Ok(false);
        }
        let weak: Weak<TransportShared> = Arc::downgrade(&self.shared);
        let tick: TickFn = Arc::new(move || {
            if let Some(shared) = weak.upgrade() {
                shared.fire_tick();
            }
        });
        self.shared.scheduler.start(inner.interval, tick)?;
        tracing::debug!(from = %inner.state, "transport playing");
        inner.state = TransportState::Playing;
        Ok(true)
    }

    /// Pause ticking. Only valid while playing.
    pub fn pause(&self) -> Result<()> {
        self.pause_deferred()?;
        self.publish(TransportState::Paused);
        Ok(())
    }

    /// Stop ticking and return to idle from any state.
    pub fn stop(&self) {
        self.halt();
        self.publish(TransportState::Idle);
    }

    /// Stop without notifying. Pair with [`PlaybackTransport::publish`].
    pub(crate) fn halt(&self) {
        let mut inner = self.shared.inner.lock();
        self.shared.scheduler.stop();
        if inner.state != TransportState::Idle {
            tracing::debug!(from = %inner.state, "transport stopped");
        }
        inner.state = TransportState::Idle;
    }

    /// Pause without notifying. Pair with [`PlaybackTransport::publish`].
    pub(crate) fn pause_deferred(&self) -> Result<()> {
        let mut inner = self.shared.inner.lock();
        if inner.state != TransportState::Playing {
            return Err(PlaybackError::InvalidTransition {
                action: "pause",
                state: inner.state,
            });
        }
        self.shared.scheduler.stop();
        inner.state = TransportState::Paused;
        tracing::debug!("transport paused");
        Ok(())
    }

    pub(crate) fn publish(&self, state: TransportState) {
        self.shared.state_handlers.emit(&state);
    }

    /// Run one tick immediately, as the scheduler would.
    pub fn fire_tick(&self) {
        self.shared.fire_tick();
    }

    /// Stop the scheduler without notifying anyone.
    pub(crate) fn shutdown(&self) {
        self.shared.scheduler.stop();
        self.shared.inner.lock().state = TransportState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ManualScheduler;
    use std::sync::atomic::AtomicUsize;

    fn transport() -> (Arc<ManualScheduler>, PlaybackTransport) {
        let sched = Arc::new(ManualScheduler::new());
        let transport = PlaybackTransport::new(sched.clone(), Duration::from_millis(16));
        (sched, transport)
    }

    #[test]
    fn test_transitions() {
        let (sched, t) = transport();
        assert_eq!(t.state(), TransportState::Idle);
        t.play().unwrap();
        assert!(sched.is_running());
        t.play().unwrap();
        assert_eq!(t.state(), TransportState::Playing);
        t.pause().unwrap();
        assert_eq!(t.state(), TransportState::Paused);
        assert!(!sched.is_running());
        t.play().unwrap();
        t.stop();
        assert_eq!(t.state(), TransportState::Idle);
        t.stop();
        assert_eq!(t.state(), TransportState::Idle);
    }

    #[test]
    fn test_pause_requires_playing() {
        let (_, t) = transport();
        let err = t.pause().unwrap_err();
        assert_eq!(
            err,
            PlaybackError::InvalidTransition {
                action: "pause",
                state: TransportState::Idle
            }
        );
        t.play().unwrap();
        t.pause().unwrap();
        assert!(t.pause().is_err());
    }

    #[test]
    fn test_state_notifications() {
        let (_, t) = transport();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        t.on_state_change(move |state| s.lock().push(state));
        t.play().unwrap();
        t.play().unwrap();
        t.pause().unwrap();
        t.stop();
        assert_eq!(
            *seen.lock(),
            vec![
                TransportState::Playing,
                TransportState::Paused,
                TransportState::Idle
            ]
        );
    }

    #[test]
    fn test_ticks_only_while_playing() {
        let (sched, t) = transport();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        t.on_tick(move || {
            h.fetch_add(1, Ordering::SeqCst);
        });
        t.fire_tick();
        t.play().unwrap();
        sched.fire();
        sched.fire();
        t.pause().unwrap();
        t.fire_tick();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_panicking_subscriber_is_contained() {
        let (sched, t) = transport();
        let hits = Arc::new(AtomicUsize::new(0));
        t.on_tick(|| panic!("boom"));
        let h = hits.clone();
        t.on_tick(move || {
            h.fetch_add(1, Ordering::SeqCst);
        });
        t.play().unwrap();
        sched.fire();
        sched.fire();
        assert_eq!(t.tick_faults(), 2);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(t.state(), TransportState::Playing);
    }
}
