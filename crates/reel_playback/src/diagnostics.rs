//! Point-in-time snapshots of player state.

use serde::Serialize;

use crate::boundary::{PlaybackDirection, PlaybackMode};
use crate::player::PlayerState;

/// Cumulative counters, reset by `stop`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PlaybackCounters {
    /// Events delivered by ticks and steps.
    pub events_fired: u64,
    /// Loop iterations and ping-pong turns.
    pub loop_count: u64,
    /// Ticks that drained while playing.
    pub tick_count: u64,
    /// Events delivered by ticks only.
    pub total_events_across_ticks: u64,
}

impl PlaybackCounters {
    /// Mean events per tick, 0 before the first tick.
    pub fn average_batch_size(&self) -> f64 {
        if self.tick_count == 0 {
            0.0
        } else {
            self.total_events_across_ticks as f64 / self.tick_count as f64
        }
    }
}

/// Immutable view of everything externally observable about a player.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlaybackDiagnostics {
    pub state: PlayerState,
    pub mode: PlaybackMode,
    pub direction: PlaybackDirection,
    pub current_speed: f64,
    pub target_speed: f64,
    pub acceleration: f64,
    pub is_ramping: bool,
    pub position_seconds: f64,
    pub duration_seconds: f64,
    pub progress: f64,
    pub event_count: usize,
    pub cursor_index: isize,
    pub counters: PlaybackCounters,
    pub average_batch_size: f64,
    /// Tick subscriber panics caught by the transport.
    pub tick_faults: u64,
    pub tick_interval_ms: u64,
}

impl PlaybackDiagnostics {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_batch_size() {
        let mut counters = PlaybackCounters::default();
        assert_eq!(counters.average_batch_size(), 0.0);
        counters.tick_count = 4;
        counters.total_events_across_ticks = 6;
        assert_eq!(counters.average_batch_size(), 1.5);
    }

    #[test]
    fn test_json_field_names() {
        let diag = PlaybackDiagnostics {
            state: PlayerState::Paused,
            mode: PlaybackMode::PingPong,
            direction: PlaybackDirection::Backward,
            current_speed: 1.0,
            target_speed: 1.0,
            acceleration: 4.0,
            is_ramping: false,
            position_seconds: 2.0,
            duration_seconds: 4.0,
            progress: 0.5,
            event_count: 3,
            cursor_index: -1,
            counters: PlaybackCounters::default(),
            average_batch_size: 0.0,
            tick_faults: 0,
            tick_interval_ms: 16,
        };
        let value: serde_json::Value = serde_json::from_str(&diag.to_json().unwrap()).unwrap();
        assert_eq!(value["state"], "paused");
        assert_eq!(value["mode"], "ping_pong");
        assert_eq!(value["direction"], "backward");
        assert_eq!(value["cursor_index"], -1);
        assert_eq!(value["counters"]["loop_count"], 0);
    }
}
