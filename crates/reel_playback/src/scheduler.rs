//! Periodic tick sources.
//!
//! [`ThreadScheduler`] drives ticks from a dedicated worker thread.
//! [`ManualScheduler`] fires only when asked, for deterministic tests.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::{PlaybackError, Result};

/// Callback invoked on every tick.
pub type TickFn = Arc<dyn Fn() + Send + Sync>;

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Something that calls a tick function periodically.
///
/// `stop` must not block on a tick in progress; it may be called from inside
/// the tick callback itself.
pub trait TickScheduler: Send + Sync {
    /// Begin ticking, replacing any previous schedule.
    fn start(&self, interval: Duration, tick: TickFn) -> Result<()>;
    fn stop(&self);
    fn is_running(&self) -> bool;
}

struct ThreadState {
    generation: u64,
    running: bool,
}

struct ThreadInner {
    state: Mutex<ThreadState>,
    wake: Condvar,
}

/// Ticks from a background thread at a fixed cadence.
pub struct ThreadScheduler {
    inner: Arc<ThreadInner>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ThreadScheduler {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ThreadInner {
                state: Mutex::new(ThreadState {
                    generation: 0,
                    running: false,
                }),
                wake: Condvar::new(),
            }),
            worker: Mutex::new(None),
        }
    }
}

impl Default for ThreadScheduler {
    fn default() -> Self {
        Self::new()
    }
}

fn run_worker(inner: Arc<ThreadInner>, generation: u64, interval: Duration, tick: TickFn) {
    let mut deadline = Instant::now() + interval;
    loop {
        {
            let mut state = inner.state.lock();
            loop {
                if state.generation != generation {
                    return;
                }
                if Instant::now() >= deadline {
                    break;
                }
                inner.wake.wait_until(&mut state, deadline);
            }
        }

        tick();

        deadline += interval;
        let now = Instant::now();
        if deadline < now {
            // fell behind; skip missed ticks instead of bursting
            deadline = now + interval;
        }
    }
}

impl TickScheduler for ThreadScheduler {
    fn start(&self, interval: Duration, tick: TickFn) -> Result<()> {
        let interval = interval.max(MIN_INTERVAL);
        let generation = {
            let mut state = self.inner.state.lock();
            state.generation += 1;
            state.running = true;
            self.inner.wake.notify_all();
            state.generation
        };

        let inner = Arc::clone(&self.inner);
        let spawned = thread::Builder::new()
            .name("reel-playback-tick".into())
            .spawn(move || run_worker(inner, generation, interval, tick));

        match spawned {
            Ok(handle) => {
                // a superseded worker exits on its own once it sees the new generation
                *self.worker.lock() = Some(handle);
                tracing::debug!(?interval, generation, "tick worker started");
                Ok(())
            }
            Err(err) => {
                let mut state = self.inner.state.lock();
                if state.generation == generation {
                    state.running = false;
                }
                tracing::error!(%err, "failed to spawn tick worker");
                Err(PlaybackError::Scheduler(err.to_string()))
            }
        }
    }

    fn stop(&self) {
        let mut state = self.inner.state.lock();
        if state.running {
            state.generation += 1;
            state.running = false;
            self.inner.wake.notify_all();
            tracing::debug!(generation = state.generation, "tick worker stopping");
        }
    }

    fn is_running(&self) -> bool {
        self.inner.state.lock().running
    }
}

impl Drop for ThreadScheduler {
    fn drop(&mut self) {
        self.stop();
        if let Some(handle) = self.worker.get_mut().take() {
            // the last owner may be released from inside a tick
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

/// A scheduler that ticks only when [`ManualScheduler::fire`] is called.
#[derive(Default)]
pub struct ManualScheduler {
    slot: Mutex<Option<(Duration, TickFn)>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one tick if started. Returns whether a tick ran.
    pub fn fire(&self) -> bool {
        let tick = self.slot.lock().as_ref().map(|(_, tick)| Arc::clone(tick));
        match tick {
            Some(tick) => {
                tick();
                true
            }
            None => false,
        }
    }

    /// Interval passed to the last `start`, while running.
    pub fn interval(&self) -> Option<Duration> {
        self.slot.lock().as_ref().map(|(interval, _)| *interval)
    }
}

impl TickScheduler for ManualScheduler {
    fn start(&self, interval: Duration, tick: TickFn) -> Result<()> {
        *self.slot.lock() = Some((interval, tick));
        Ok(())
    }

    fn stop(&self) {
        self.slot.lock().take();
    }

    fn is_running(&self) -> bool {
        self.slot.lock().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, TickFn) {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        (
            hits,
            Arc::new(move || {
                h.fetch_add(1, Ordering::SeqCst);
            }),
        )
    }

    #[test]
    fn test_manual_fire() {
        let sched = ManualScheduler::new();
        let (hits, tick) = counter();
        assert!(!sched.fire());
        sched.start(Duration::from_millis(16), tick).unwrap();
        assert_eq!(sched.interval(), Some(Duration::from_millis(16)));
        assert!(sched.fire());
        assert!(sched.fire());
        sched.stop();
        assert!(!sched.fire());
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_manual_stop_from_tick() {
        let sched = Arc::new(ManualScheduler::new());
        let inner = Arc::downgrade(&sched);
        sched
            .start(
                Duration::from_millis(1),
                Arc::new(move || {
                    if let Some(s) = inner.upgrade() {
                        s.stop();
                    }
                }),
            )
            .unwrap();
        assert!(sched.fire());
        assert!(!sched.is_running());
    }

    #[test]
    fn test_thread_scheduler_ticks_and_stops() {
        let sched = ThreadScheduler::new();
        let (hits, tick) = counter();
        sched.start(Duration::from_millis(1), tick).unwrap();
        assert!(sched.is_running());

        let deadline = Instant::now() + Duration::from_secs(5);
        while hits.load(Ordering::SeqCst) < 3 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
        }
        assert!(hits.load(Ordering::SeqCst) >= 3);

        sched.stop();
        assert!(!sched.is_running());
        thread::sleep(Duration::from_millis(20));
        let settled = hits.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(hits.load(Ordering::SeqCst), settled);
    }

    #[test]
    fn test_restart_replaces_worker() {
        let sched = ThreadScheduler::new();
        let (first, tick_a) = counter();
        let (second, tick_b) = counter();
        sched.start(Duration::from_millis(1), tick_a).unwrap();
        sched.start(Duration::from_millis(1), tick_b).unwrap();
        thread::sleep(Duration::from_millis(30));
        let a = first.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(first.load(Ordering::SeqCst), a);
        assert!(second.load(Ordering::SeqCst) > 0);
    }
}
