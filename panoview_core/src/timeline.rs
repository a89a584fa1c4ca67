//! Crossfade timing.
//!
//! The coordinator samples a [`PresentationTimeline`] once per tick and
//! broadcasts the result. Renderers never time fades themselves.

use std::time::Duration;

/// One `present` broadcast worth of progress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PresentStep {
    pub fraction: f64,
    pub finished: bool,
}

/// Progress of one crossfade.
#[derive(Debug, Clone)]
pub struct PresentationTimeline {
    start: Duration,
    duration: Duration,
    last_fraction: f64,
    finished: bool,
}

impl PresentationTimeline {
    /// Starts a timeline at `start` on the coordinator clock.
    pub fn new(start: Duration, duration: Duration) -> Self {
        Self {
            start,
            duration,
            last_fraction: 0.0,
            finished: false,
        }
    }

    /// Samples progress at `now`.
    ///
    /// Fractions never decrease and stay in `[0, 1]`. Once `now - start`
    /// reaches the duration the step `(1.0, finished)` is returned, exactly
    /// once; later samples return `None`.
    pub fn sample(&mut self, now: Duration) -> Option<PresentStep> {
        if self.finished {
            return None;
        }

        let elapsed = now.saturating_sub(self.start);
        if elapsed >= self.duration {
            self.finished = true;
            self.last_fraction = 1.0;
            return Some(PresentStep {
                fraction: 1.0,
                finished: true,
            });
        }

        let fraction = (elapsed.as_secs_f64() / self.duration.as_secs_f64()).min(1.0);
        self.last_fraction = self.last_fraction.max(fraction);
        Some(PresentStep {
            fraction: self.last_fraction,
            finished: false,
        })
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn start(&self) -> Duration {
        self.start
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}
