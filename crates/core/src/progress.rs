//! Progress reporting
//!
//! Long-running passes report through a [`ProgressObserver`] at a bounded
//! frequency: at most [`LOGS_FREQUENCY`] reports plus the final one. The
//! observer is advisory and has no way to cancel a pass.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of progress reports a pass aims for
pub const LOGS_FREQUENCY: usize = 20;

/// Stage of a pansharpening job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Resampling,
    Fusion,
    HistogramMatching,
    TargetCreation,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Resampling => "resampling",
            Phase::Fusion => "fusion",
            Phase::HistogramMatching => "histogram matching",
            Phase::TargetCreation => "target creation",
        };
        f.write_str(name)
    }
}

/// Receives progress updates; `fraction` is in `[0, 1]`.
pub trait ProgressObserver {
    fn on_progress(&mut self, phase: Phase, fraction: f64, message: &str);
}

impl<F> ProgressObserver for F
where
    F: FnMut(Phase, f64, &str),
{
    fn on_progress(&mut self, phase: Phase, fraction: f64, message: &str) {
        self(phase, fraction, message)
    }
}

/// Observer that ignores every update
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_progress(&mut self, _phase: Phase, _fraction: f64, _message: &str) {}
}

/// Counts work units and reports every `ceil(total / LOGS_FREQUENCY)` of them.
#[derive(Debug, Clone)]
pub struct ProgressTicker {
    phase: Phase,
    total: usize,
    every: usize,
    done: usize,
}

impl ProgressTicker {
    pub fn new(phase: Phase, total: usize) -> Self {
        Self {
            phase,
            total,
            every: total.div_ceil(LOGS_FREQUENCY).max(1),
            done: 0,
        }
    }

    /// Record one finished unit, reporting when due
    pub fn tick(&mut self, observer: &mut dyn ProgressObserver) {
        self.done += 1;
        if self.done % self.every == 0 || self.done == self.total {
            let fraction = if self.total == 0 {
                1.0
            } else {
                (self.done as f64 / self.total as f64).min(1.0)
            };
            let message = format!("{} {}/{}", self.phase, self.done, self.total);
            tracing::debug!("{}", message);
            observer.on_progress(self.phase, fraction, &message);
        }
    }

    pub fn done(&self) -> usize {
        self.done
    }

    pub fn total(&self) -> usize {
        self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticker_bounded_reports() {
        for total in [1usize, 7, 20, 21, 100, 1234] {
            let mut calls = Vec::new();
            let mut observer = |_: Phase, fraction: f64, _: &str| calls.push(fraction);
            let mut ticker = ProgressTicker::new(Phase::Fusion, total);
            for _ in 0..total {
                ticker.tick(&mut observer);
            }
            assert!(calls.len() <= LOGS_FREQUENCY + 1, "total {}", total);
            assert_eq!(calls.last().copied(), Some(1.0));
            assert!(calls.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn test_no_progress_is_silent() {
        let mut ticker = ProgressTicker::new(Phase::Resampling, 3);
        for _ in 0..3 {
            ticker.tick(&mut NoProgress);
        }
        assert_eq!(ticker.done(), 3);
    }
}
