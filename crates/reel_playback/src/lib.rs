//! Reel Playback Engine
//!
//! Replays a finite, time-ordered event sequence against a variable-speed
//! virtual clock:
//!
//! - **Speed ramps**: closed-form trapezoidal velocity profile, continuous
//!   across any number of speed changes
//! - **Boundary modes**: stop, loop or ping-pong at either end of the timeline
//! - **Transport**: play / pause / stop over a pluggable tick scheduler
//! - **Positioning**: seek, relative seek, single-step and reversal
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use reel_playback::{ManualScheduler, ManualTime, PlayerState, TimelinePlayer};
//!
//! let time = Arc::new(ManualTime::new());
//! let scheduler = Arc::new(ManualScheduler::new());
//!
//! let player = TimelinePlayer::builder(vec![1.0, 2.0, 3.0])
//!     .duration(4.0)
//!     .time_source(time.clone())
//!     .scheduler(scheduler.clone())
//!     .build()
//!     .unwrap();
//!
//! player.on_event(|t| println!("event at {t}"));
//! player.play().unwrap();
//!
//! time.advance(3.5);
//! scheduler.fire();
//! assert_eq!(player.state(), PlayerState::Finished);
//! ```

pub mod boundary;
pub mod clock;
pub mod config;
pub mod cursor;
pub mod diagnostics;
pub mod error;
pub mod observer;
pub mod player;
pub mod scheduler;
pub mod sequence;
pub mod speed;
pub mod stepper;
pub mod timeline;
pub mod transport;

pub use boundary::{resolve_boundary, BoundaryResolution, PlaybackDirection, PlaybackMode};
pub use clock::{ManualTime, MonotonicTime, TimeSource, VirtualClock};
pub use config::{DurationPolicy, PlaybackConfig};
pub use cursor::{EventBatch, EventCursor};
pub use diagnostics::{PlaybackCounters, PlaybackDiagnostics};
pub use error::{PlaybackError, Result};
pub use observer::{Subscribers, SubscriptionId};
pub use player::{PlayerBuilder, PlayerState, Subscription, TimelinePlayer};
pub use scheduler::{ManualScheduler, ThreadScheduler, TickFn, TickScheduler};
pub use sequence::{EventSequence, Timed, TimedEvent};
pub use speed::{ClockAnchor, SpeedController, SpeedPreset, MAX_SPEED, MIN_SPEED};
pub use stepper::TimelineStepper;
pub use timeline::{Pivot, SeekableTimeline};
pub use transport::{PlaybackTransport, TransportState};
