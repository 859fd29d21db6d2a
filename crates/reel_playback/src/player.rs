//! Timeline player: the orchestrator tying clock, cursor, boundary policy and
//! transport together.
//!
//! A [`TimelinePlayer`] is a cheap handle that can be cloned across threads.
//! All mutable state sits behind one mutex that the tick and every public
//! operation share. Subscribers are always called after that mutex has been
//! released, so they may call back into the player.
//!
//! Lock order is player, then transport. Transport transitions that happen
//! during a tick are deferred and published once the player lock is dropped.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Weak};

use crate::boundary::{resolve_boundary, PlaybackDirection, PlaybackMode};
use crate::clock::{MonotonicTime, TimeSource, VirtualClock};
use crate::config::PlaybackConfig;
use crate::cursor::EventBatch;
use crate::diagnostics::{PlaybackCounters, PlaybackDiagnostics};
use crate::error::{PlaybackError, Result};
use crate::observer::{Subscribers, SubscriptionId};
use crate::scheduler::{ThreadScheduler, TickScheduler};
use crate::sequence::{EventSequence, TimedEvent};
use crate::speed::SpeedPreset;
use crate::stepper::TimelineStepper;
use crate::timeline::SeekableTimeline;
use crate::transport::{PlaybackTransport, TransportState};

/// Player state as seen by consumers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerState {
    /// Not started, stopped, or repositioned after finishing.
    #[default]
    Idle,
    Playing,
    Paused,
    /// Reached a boundary in `Once` mode.
    Finished,
}

impl From<TransportState> for PlayerState {
    fn from(state: TransportState) -> Self {
        match state {
            TransportState::Idle => Self::Idle,
            TransportState::Playing => Self::Playing,
            TransportState::Paused => Self::Paused,
        }
    }
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Playing => f.write_str("playing"),
            Self::Paused => f.write_str("paused"),
            Self::Finished => f.write_str("finished"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Channel {
    Event,
    Progress,
    State,
    Loop,
}

/// Handle for removing a subscriber with [`TimelinePlayer::unsubscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Subscription {
    channel: Channel,
    id: SubscriptionId,
}

struct PlayerCore<E> {
    timeline: SeekableTimeline<E>,
    direction: PlaybackDirection,
    mode: PlaybackMode,
    finished: bool,
    counters: PlaybackCounters,
}

impl<E: TimedEvent> PlayerCore<E> {
    fn progress(&self) -> f64 {
        self.timeline.progress(self.direction)
    }

    /// Clear the finished flag, returning whether it was set.
    fn unfinish(&mut self) -> bool {
        std::mem::replace(&mut self.finished, false)
    }
}

/// What a tick produced, delivered after the lock is released.
struct TickOutcome {
    batch: EventBatch,
    progress: f64,
    loop_count: Option<u64>,
    finished: bool,
}

struct PlayerShared<E> {
    core: Mutex<PlayerCore<E>>,
    transport: PlaybackTransport,
    events: EventSequence<E>,
    on_event: Subscribers<E>,
    on_progress: Subscribers<f64>,
    on_state: Subscribers<PlayerState>,
    on_loop: Subscribers<u64>,
}

impl<E: TimedEvent> PlayerShared<E> {
    fn tick(&self) {
        let outcome = {
            let mut core = self.core.lock();
            if core.timeline.is_empty() || self.transport.state() != TransportState::Playing {
                return;
            }
            let direction = core.direction;
            let batch = core.timeline.advance(direction);
            let drained = batch.len() as u64;
            core.counters.tick_count += 1;
            core.counters.events_fired += drained;
            core.counters.total_events_across_ticks += drained;
            if drained > 0 {
                tracing::trace!(drained, %direction, cursor = core.timeline.cursor().index(), "tick drained");
            }

            let mut loop_count = None;
            let mut finished = false;
            if core.timeline.at_boundary(direction) {
                let resolution = resolve_boundary(core.mode, direction);
                if resolution.stop {
                    self.transport.halt();
                    core.finished = true;
                    finished = true;
                    tracing::info!(%direction, "playback finished");
                } else if resolution.loop_fired {
                    core.counters.loop_count += 1;
                    if resolution.rewind {
                        core.timeline.rewind(resolution.direction);
                    }
                    if resolution.direction != direction {
                        core.timeline.set_heading(direction, resolution.direction);
                        core.direction = resolution.direction;
                    }
                    loop_count = Some(core.counters.loop_count);
                    tracing::info!(
                        mode = %core.mode,
                        direction = %resolution.direction,
                        loop_count = core.counters.loop_count,
                        "boundary continued playback"
                    );
                }
            }

            TickOutcome {
                batch,
                progress: core.progress(),
                loop_count,
                finished,
            }
        };

        for &index in &outcome.batch {
            self.on_event.emit(&self.events[index]);
        }
        self.on_progress.emit(&outcome.progress);
        if let Some(count) = outcome.loop_count {
            self.on_loop.emit(&count);
        }
        if outcome.finished {
            self.transport.publish(TransportState::Idle);
            self.on_state.emit(&PlayerState::Finished);
        }
    }
}

impl<E> Drop for PlayerShared<E> {
    fn drop(&mut self) {
        self.transport.shutdown();
    }
}

/// Builder for [`TimelinePlayer`].
pub struct PlayerBuilder<E> {
    events: EventSequence<E>,
    duration: Option<f64>,
    config: PlaybackConfig,
    time_source: Option<Arc<dyn TimeSource>>,
    scheduler: Option<Arc<dyn TickScheduler>>,
}

impl<E> PlayerBuilder<E>
where
    E: TimedEvent + Send + Sync + 'static,
{
    /// Total timeline length in virtual seconds. Defaults to the
    /// configured duration policy applied to the event count.
    pub fn duration(mut self, seconds: f64) -> Self {
        self.duration = Some(seconds);
        self
    }

    pub fn config(mut self, config: PlaybackConfig) -> Self {
        self.config = config;
        self
    }

    /// Wall-time source. Defaults to [`MonotonicTime`].
    pub fn time_source(mut self, source: Arc<dyn TimeSource>) -> Self {
        self.time_source = Some(source);
        self
    }

    /// Tick source. Defaults to a [`ThreadScheduler`].
    pub fn scheduler(mut self, scheduler: Arc<dyn TickScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn build(self) -> Result<TimelinePlayer<E>> {
        let config = self.config;
        config.validate()?;

        let duration = self
            .duration
            .unwrap_or_else(|| config.duration.resolve(self.events.len()));
        let source = self
            .time_source
            .unwrap_or_else(|| Arc::new(MonotonicTime::new()) as Arc<dyn TimeSource>);
        let scheduler = self
            .scheduler
            .unwrap_or_else(|| Arc::new(ThreadScheduler::new()) as Arc<dyn TickScheduler>);

        let clock = VirtualClock::new(source, config.initial_speed, config.acceleration)?;
        let timeline = SeekableTimeline::new(self.events.clone(), duration, clock)?;
        let transport = PlaybackTransport::new(scheduler, config.tick_interval());
        transport.set_mode(config.mode);

        let shared = Arc::new(PlayerShared {
            core: Mutex::new(PlayerCore {
                timeline,
                direction: PlaybackDirection::Forward,
                mode: config.mode,
                finished: false,
                counters: PlaybackCounters::default(),
            }),
            transport,
            events: self.events,
            on_event: Subscribers::new(),
            on_progress: Subscribers::new(),
            on_state: Subscribers::new(),
            on_loop: Subscribers::new(),
        });

        let weak: Weak<PlayerShared<E>> = Arc::downgrade(&shared);
        shared.transport.on_tick(move || {
            if let Some(shared) = weak.upgrade() {
                shared.tick();
            }
        });
        let weak: Weak<PlayerShared<E>> = Arc::downgrade(&shared);
        shared.transport.on_state_change(move |state| {
            if let Some(shared) = weak.upgrade() {
                shared.on_state.emit(&PlayerState::from(state));
            }
        });

        tracing::debug!(
            events = shared.events.len(),
            duration,
            mode = %config.mode,
            speed = config.initial_speed,
            "player built"
        );
        Ok(TimelinePlayer { shared })
    }
}

/// Variable-speed player over a fixed event sequence.
pub struct TimelinePlayer<E> {
    shared: Arc<PlayerShared<E>>,
}

impl<E> Clone for TimelinePlayer<E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<E> fmt::Debug for TimelinePlayer<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimelinePlayer")
            .field("events", &self.shared.events.len())
            .field("transport", &self.shared.transport)
            .finish_non_exhaustive()
    }
}

impl<E> TimelinePlayer<E>
where
    E: TimedEvent + Send + Sync + 'static,
{
    pub fn builder(events: impl Into<EventSequence<E>>) -> PlayerBuilder<E> {
        PlayerBuilder {
            events: events.into(),
            duration: None,
            config: PlaybackConfig::default(),
            time_source: None,
            scheduler: None,
        }
    }

    /// Player with default configuration, a real clock and a thread scheduler.
    pub fn new(events: impl Into<EventSequence<E>>, duration: f64) -> Result<Self> {
        Self::builder(events).duration(duration).build()
    }

    // --- transport ---

    /// Start or resume playback.
    ///
    /// Paused time is not counted. Playing again after finishing starts over
    /// from the edge the current direction begins at.
    pub fn play(&self) -> Result<()> {
        let started = {
            let mut core = self.shared.core.lock();
            if core.timeline.is_empty() {
                return Err(PlaybackError::EmptyTimeline);
            }
            // ticks block on the core lock until the clock below is anchored
            let started = self.shared.transport.play_deferred()?;
            if started {
                if core.unfinish() {
                    let direction = core.direction;
                    core.timeline.rewind(direction);
                    tracing::debug!(%direction, "restarting finished playback");
                }
                let clock = core.timeline.clock_mut();
                clock.start();
                clock.reanchor();
            }
            started
        };
        if started {
            self.shared.transport.publish(TransportState::Playing);
        }
        Ok(())
    }

    /// Pause playback, holding the current position.
    pub fn pause(&self) -> Result<()> {
        {
            let mut core = self.shared.core.lock();
            self.shared.transport.pause_deferred()?;
            core.timeline.clock_mut().freeze();
        }
        self.shared.transport.publish(TransportState::Paused);
        Ok(())
    }

    /// Stop and rewind. Direction and counters return to their initial values.
    pub fn stop(&self) {
        {
            let mut core = self.shared.core.lock();
            self.shared.transport.halt();
            core.timeline.reset();
            core.direction = PlaybackDirection::Forward;
            core.counters = PlaybackCounters::default();
            core.finished = false;
        }
        self.shared.transport.publish(TransportState::Idle);
    }

    pub fn state(&self) -> PlayerState {
        let core = self.shared.core.lock();
        if core.finished {
            PlayerState::Finished
        } else {
            self.shared.transport.state().into()
        }
    }

    /// Run one tick now, exactly as the scheduler would.
    pub fn tick(&self) {
        self.shared.transport.fire_tick();
    }

    // --- positioning ---

    /// Jump to `timestamp` virtual seconds, clamped to the duration.
    pub fn seek(&self, timestamp: f64) -> Result<f64> {
        let (position, progress, was_finished) = {
            let mut core = self.shared.core.lock();
            let direction = core.direction;
            let position = core.timeline.seek(timestamp, direction)?;
            (position, core.progress(), core.unfinish())
        };
        self.after_reposition(progress, was_finished);
        Ok(position)
    }

    /// Jump by `delta` virtual seconds from the current position.
    pub fn seek_relative(&self, delta: f64) -> Result<f64> {
        let (position, progress, was_finished) = {
            let mut core = self.shared.core.lock();
            let direction = core.direction;
            let position = core.timeline.seek_relative(delta, direction)?;
            (position, core.progress(), core.unfinish())
        };
        self.after_reposition(progress, was_finished);
        Ok(position)
    }

    /// Deliver the next event and park on it. Returns the event's index.
    pub fn step_forward(&self) -> Result<usize> {
        self.step(TimelineStepper::step_forward)
    }

    /// Deliver the previous event and park on it. Returns the event's index.
    pub fn step_backward(&self) -> Result<usize> {
        self.step(TimelineStepper::step_backward)
    }

    fn step(
        &self,
        stepper: fn(&mut SeekableTimeline<E>, &mut PlaybackDirection) -> Result<usize>,
    ) -> Result<usize> {
        let (index, progress, was_finished) = {
            let mut core = self.shared.core.lock();
            let core = &mut *core;
            let index = stepper(&mut core.timeline, &mut core.direction)?;
            core.counters.events_fired += 1;
            (index, core.progress(), core.unfinish())
        };
        self.shared.on_event.emit(&self.shared.events[index]);
        self.after_reposition(progress, was_finished);
        Ok(index)
    }

    fn after_reposition(&self, progress: f64, was_finished: bool) {
        if was_finished {
            self.shared.on_state.emit(&PlayerState::Idle);
        }
        self.shared.on_progress.emit(&progress);
    }

    /// Playhead in virtual seconds, within `[0, duration]`.
    pub fn position(&self) -> f64 {
        let core = self.shared.core.lock();
        core.timeline
            .position_seconds(core.direction)
            .clamp(0.0, core.timeline.duration())
    }

    pub fn duration(&self) -> f64 {
        self.shared.core.lock().timeline.duration()
    }

    pub fn progress(&self) -> f64 {
        self.shared.core.lock().progress()
    }

    pub fn events(&self) -> &EventSequence<E> {
        &self.shared.events
    }

    // --- direction and mode ---

    pub fn direction(&self) -> PlaybackDirection {
        self.shared.core.lock().direction
    }

    /// Turn around at the current position.
    pub fn set_direction(&self, direction: PlaybackDirection) {
        let mut core = self.shared.core.lock();
        let from = core.direction;
        if from != direction {
            core.timeline.set_heading(from, direction);
            core.direction = direction;
            tracing::debug!(%from, to = %direction, "direction changed");
        }
    }

    pub fn reverse(&self) {
        let direction = self.direction().reversed();
        self.set_direction(direction);
    }

    pub fn mode(&self) -> PlaybackMode {
        self.shared.core.lock().mode
    }

    pub fn set_mode(&self, mode: PlaybackMode) {
        let mut core = self.shared.core.lock();
        core.mode = mode;
        self.shared.transport.set_mode(mode);
        tracing::debug!(%mode, "mode changed");
    }

    // --- speed ---

    pub fn current_speed(&self) -> f64 {
        self.shared.core.lock().timeline.clock().current_speed()
    }

    pub fn target_speed(&self) -> f64 {
        self.shared.core.lock().timeline.clock().target_speed()
    }

    /// Ramp towards `speed` at the configured acceleration.
    pub fn set_target_speed(&self, speed: f64) -> Result<()> {
        let mut core = self.shared.core.lock();
        core.timeline.clock_mut().set_target_speed(speed)?;
        tracing::debug!(speed, "speed target changed");
        Ok(())
    }

    pub fn acceleration(&self) -> f64 {
        self.shared.core.lock().timeline.clock().acceleration()
    }

    pub fn set_acceleration(&self, acceleration: f64) -> Result<()> {
        let mut core = self.shared.core.lock();
        core.timeline.clock_mut().set_acceleration(acceleration)?;
        tracing::debug!(acceleration, "acceleration changed");
        Ok(())
    }

    pub fn is_ramping(&self) -> bool {
        self.shared.core.lock().timeline.clock().is_ramping()
    }

    /// Snap to a named preset speed, with no ramp.
    pub fn apply_preset(&self, name: &str) -> Result<()> {
        let preset: SpeedPreset = name.parse()?;
        self.apply_speed_preset(preset)
    }

    pub fn apply_speed_preset(&self, preset: SpeedPreset) -> Result<()> {
        let mut core = self.shared.core.lock();
        core.timeline.clock_mut().snap_speed(preset.multiplier())?;
        tracing::debug!(%preset, speed = preset.multiplier(), "speed preset applied");
        Ok(())
    }

    // --- observation ---

    /// Snapshot of all externally observable state.
    pub fn diagnostics(&self) -> PlaybackDiagnostics {
        let core = self.shared.core.lock();
        let transport = &self.shared.transport;
        let clock = core.timeline.clock();
        let state = if core.finished {
            PlayerState::Finished
        } else {
            transport.state().into()
        };
        PlaybackDiagnostics {
            state,
            mode: core.mode,
            direction: core.direction,
            current_speed: clock.current_speed(),
            target_speed: clock.target_speed(),
            acceleration: clock.acceleration(),
            is_ramping: clock.is_ramping(),
            position_seconds: core
                .timeline
                .position_seconds(core.direction)
                .clamp(0.0, core.timeline.duration()),
            duration_seconds: core.timeline.duration(),
            progress: core.progress(),
            event_count: core.timeline.events().len(),
            cursor_index: core.timeline.cursor().index(),
            counters: core.counters,
            average_batch_size: core.counters.average_batch_size(),
            tick_faults: transport.tick_faults(),
            tick_interval_ms: u64::try_from(transport.interval().as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn counters(&self) -> PlaybackCounters {
        self.shared.core.lock().counters
    }

    /// Called once per delivered event, in delivery order.
    pub fn on_event<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        Subscription {
            channel: Channel::Event,
            id: self.shared.on_event.subscribe(handler),
        }
    }

    /// Called once per tick and after every reposition.
    pub fn on_progress<F>(&self, handler: F) -> Subscription
    where
        F: Fn(f64) + Send + Sync + 'static,
    {
        Subscription {
            channel: Channel::Progress,
            id: self.shared.on_progress.subscribe(move |p| handler(*p)),
        }
    }

    pub fn on_state_changed<F>(&self, handler: F) -> Subscription
    where
        F: Fn(PlayerState) + Send + Sync + 'static,
    {
        Subscription {
            channel: Channel::State,
            id: self.shared.on_state.subscribe(move |s| handler(*s)),
        }
    }

    /// Called with the new loop count whenever a boundary continues playback.
    pub fn on_loop_completed<F>(&self, handler: F) -> Subscription
    where
        F: Fn(u64) + Send + Sync + 'static,
    {
        Subscription {
            channel: Channel::Loop,
            id: self.shared.on_loop.subscribe(move |n| handler(*n)),
        }
    }

    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        let id = subscription.id;
        match subscription.channel {
            Channel::Event => self.shared.on_event.unsubscribe(id),
            Channel::Progress => self.shared.on_progress.unsubscribe(id),
            Channel::State => self.shared.on_state.unsubscribe(id),
            Channel::Loop => self.shared.on_loop.unsubscribe(id),
        }
    }
}
