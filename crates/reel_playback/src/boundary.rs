//! Playback modes and what happens when the cursor runs out of events.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Heading of the cursor along the timeline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackDirection {
    #[default]
    Forward,
    Backward,
}

impl PlaybackDirection {
    pub fn reversed(self) -> Self {
        match self {
            Self::Forward => Self::Backward,
            Self::Backward => Self::Forward,
        }
    }

    /// +1 forward, -1 backward.
    pub fn sign(self) -> f64 {
        match self {
            Self::Forward => 1.0,
            Self::Backward => -1.0,
        }
    }
}

impl fmt::Display for PlaybackDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forward => f.write_str("forward"),
            Self::Backward => f.write_str("backward"),
        }
    }
}

/// Behavior at the end of the timeline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackMode {
    /// Stop at the boundary.
    #[default]
    Once,
    /// Jump back to the start of the current heading and continue.
    Loop,
    /// Reverse heading at each boundary.
    PingPong,
}

impl fmt::Display for PlaybackMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Once => f.write_str("once"),
            Self::Loop => f.write_str("loop"),
            Self::PingPong => f.write_str("ping_pong"),
        }
    }
}

/// Outcome of hitting a boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundaryResolution {
    /// Playback should halt.
    pub stop: bool,
    /// A loop iteration completed.
    pub loop_fired: bool,
    /// Cursor and clock go back to the start of `direction`.
    pub rewind: bool,
    /// Heading after the boundary.
    pub direction: PlaybackDirection,
}

/// Decide what a boundary does for `mode` while heading in `direction`.
pub fn resolve_boundary(mode: PlaybackMode, direction: PlaybackDirection) -> BoundaryResolution {
    match mode {
        PlaybackMode::Once => BoundaryResolution {
            stop: true,
            loop_fired: false,
            rewind: false,
            direction,
        },
        PlaybackMode::Loop => BoundaryResolution {
            stop: false,
            loop_fired: true,
            rewind: true,
            direction,
        },
        PlaybackMode::PingPong => BoundaryResolution {
            stop: false,
            loop_fired: true,
            rewind: false,
            direction: direction.reversed(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_once_stops() {
        let r = resolve_boundary(PlaybackMode::Once, PlaybackDirection::Forward);
        assert!(r.stop);
        assert!(!r.loop_fired);
        assert_eq!(r.direction, PlaybackDirection::Forward);
    }

    #[test]
    fn test_loop_rewinds_same_heading() {
        for dir in [PlaybackDirection::Forward, PlaybackDirection::Backward] {
            let r = resolve_boundary(PlaybackMode::Loop, dir);
            assert!(!r.stop && r.loop_fired && r.rewind);
            assert_eq!(r.direction, dir);
        }
    }

    #[test]
    fn test_ping_pong_reverses() {
        let r = resolve_boundary(PlaybackMode::PingPong, PlaybackDirection::Forward);
        assert!(!r.stop && r.loop_fired && !r.rewind);
        assert_eq!(r.direction, PlaybackDirection::Backward);
        let r = resolve_boundary(PlaybackMode::PingPong, PlaybackDirection::Backward);
        assert_eq!(r.direction, PlaybackDirection::Forward);
    }

    #[test]
    fn test_mode_serde_names() {
        assert_eq!(
            serde_json::to_string(&PlaybackMode::PingPong).unwrap(),
            "\"ping_pong\""
        );
        let dir: PlaybackDirection = serde_json::from_str("\"backward\"").unwrap();
        assert_eq!(dir, PlaybackDirection::Backward);
    }
}
