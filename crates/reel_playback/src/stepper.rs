//! Single-event stepping.

use crate::boundary::PlaybackDirection;
use crate::error::{PlaybackError, Result};
use crate::sequence::TimedEvent;
use crate::timeline::SeekableTimeline;

/// Moves a timeline exactly one event at a time.
///
/// Each step turns the heading if needed, crosses one event and parks the
/// playhead on that event's time so a following play resumes from it. On
/// failure nothing is changed.
pub struct TimelineStepper;

impl TimelineStepper {
    /// Cross the next event going forward. Returns its index.
    pub fn step_forward<E: TimedEvent>(
        timeline: &mut SeekableTimeline<E>,
        direction: &mut PlaybackDirection,
    ) -> Result<usize> {
        Self::check(timeline, *direction, PlaybackDirection::Forward)?;
        Self::face(timeline, direction, PlaybackDirection::Forward);
        let index = timeline
            .cursor_mut()
            .try_step_forward()
            .ok_or(PlaybackError::AtEnd)?;
        Self::park(timeline, index, PlaybackDirection::Forward);
        Ok(index)
    }

    /// Cross the previous event going backward. Returns its index.
    pub fn step_backward<E: TimedEvent>(
        timeline: &mut SeekableTimeline<E>,
        direction: &mut PlaybackDirection,
    ) -> Result<usize> {
        Self::check(timeline, *direction, PlaybackDirection::Backward)?;
        Self::face(timeline, direction, PlaybackDirection::Backward);
        let index = timeline
            .cursor_mut()
            .try_step_backward()
            .ok_or(PlaybackError::AtBeginning)?;
        Self::park(timeline, index, PlaybackDirection::Backward);
        Ok(index)
    }

    fn check<E: TimedEvent>(
        timeline: &SeekableTimeline<E>,
        heading: PlaybackDirection,
        step: PlaybackDirection,
    ) -> Result<()> {
        if timeline.is_empty() {
            return Err(PlaybackError::EmptyTimeline);
        }
        let applied = timeline.cursor().applied(heading);
        match step {
            PlaybackDirection::Forward if applied == timeline.cursor().len() => {
                Err(PlaybackError::AtEnd)
            }
            PlaybackDirection::Backward if applied == 0 => Err(PlaybackError::AtBeginning),
            _ => Ok(()),
        }
    }

    fn face<E: TimedEvent>(
        timeline: &mut SeekableTimeline<E>,
        direction: &mut PlaybackDirection,
        step: PlaybackDirection,
    ) {
        if *direction != step {
            timeline.set_heading(*direction, step);
            *direction = step;
        }
    }

    fn park<E: TimedEvent>(timeline: &mut SeekableTimeline<E>, index: usize, step: PlaybackDirection) {
        let time = timeline.events()[index].playback_time();
        timeline.snap_to(time);
        tracing::debug!(index, time, direction = %step, "stepped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ManualTime, VirtualClock};
    use crate::sequence::EventSequence;
    use std::sync::Arc;

    fn timeline(times: &[f64]) -> SeekableTimeline<f64> {
        let clock = VirtualClock::new(Arc::new(ManualTime::new()), 1.0, 0.0).unwrap();
        SeekableTimeline::new(EventSequence::from(times.to_vec()), 4.0, clock).unwrap()
    }

    #[test]
    fn test_step_through_and_back() {
        let mut tl = timeline(&[1.0, 2.0, 3.0]);
        let mut dir = PlaybackDirection::Forward;

        assert_eq!(TimelineStepper::step_forward(&mut tl, &mut dir), Ok(0));
        assert_eq!(tl.position_seconds(dir), 1.0);
        assert_eq!(TimelineStepper::step_forward(&mut tl, &mut dir), Ok(1));
        assert_eq!(TimelineStepper::step_forward(&mut tl, &mut dir), Ok(2));
        assert_eq!(
            TimelineStepper::step_forward(&mut tl, &mut dir),
            Err(PlaybackError::AtEnd)
        );

        assert_eq!(TimelineStepper::step_backward(&mut tl, &mut dir), Ok(2));
        assert_eq!(dir, PlaybackDirection::Backward);
        assert_eq!(TimelineStepper::step_backward(&mut tl, &mut dir), Ok(1));
        assert_eq!(tl.position_seconds(dir), 2.0);
        assert_eq!(TimelineStepper::step_forward(&mut tl, &mut dir), Ok(1));
        assert_eq!(dir, PlaybackDirection::Forward);
    }

    #[test]
    fn test_step_backward_at_beginning() {
        let mut tl = timeline(&[1.0, 2.0]);
        let mut dir = PlaybackDirection::Forward;
        assert_eq!(
            TimelineStepper::step_backward(&mut tl, &mut dir),
            Err(PlaybackError::AtBeginning)
        );
        assert_eq!(dir, PlaybackDirection::Forward);
        assert_eq!(tl.cursor().index(), 0);
    }

    #[test]
    fn test_step_empty() {
        let mut tl = timeline(&[]);
        let mut dir = PlaybackDirection::Forward;
        assert_eq!(
            TimelineStepper::step_forward(&mut tl, &mut dir),
            Err(PlaybackError::EmptyTimeline)
        );
        assert_eq!(
            TimelineStepper::step_backward(&mut tl, &mut dir),
            Err(PlaybackError::EmptyTimeline)
        );
    }
}
