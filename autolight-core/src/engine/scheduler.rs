//! Three independent cadences driven by externally supplied elapsed time.
//!
//! The scheduler never reads a clock. The run loop feeds it real elapsed
//! time; tests feed it synthetic durations.

use std::time::Duration;

/// Smoothing cadence, ~60 Hz.
pub const SMOOTHING_PERIOD: Duration = Duration::from_micros(16_667);

/// One named tick counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    period: Duration,
    accumulated: Duration,
}

impl Cadence {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            accumulated: Duration::ZERO,
        }
    }

    /// Period for a rate in Hz. Non-positive rates give a zero period,
    /// which fires on every advance; rates too small to represent never
    /// fire.
    pub fn from_hz(hz: f32) -> Self {
        if hz > 0.0 {
            Self::new(Duration::try_from_secs_f64(1.0 / hz as f64).unwrap_or(Duration::MAX))
        } else {
            Self::new(Duration::ZERO)
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn set_period(&mut self, period: Duration) {
        self.period = period;
        self.accumulated = self.accumulated.min(period);
    }

    /// Add `elapsed`; fire at most once. A backlog longer than one period
    /// is dropped rather than replayed.
    fn advance(&mut self, elapsed: Duration) -> bool {
        self.accumulated = self.accumulated.saturating_add(elapsed);
        if self.accumulated < self.period {
            return false;
        }
        self.accumulated -= self.period;
        if self.accumulated >= self.period {
            self.accumulated = Duration::ZERO;
        }
        true
    }

    /// Time until the next firing.
    fn remaining(&self) -> Duration {
        self.period.saturating_sub(self.accumulated)
    }
}

/// Which cadences fired during one [`Scheduler::advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ticks {
    pub capture: bool,
    pub output: bool,
    /// Time accumulated since the previous smoothing tick.
    pub smoothing: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    capture: Cadence,
    output: Cadence,
    smoothing: Cadence,
    since_smoothing: Duration,
}

impl Scheduler {
    pub fn new(capture_fps: f32, output_rate_hz: f32, smoothing_period: Duration) -> Self {
        Self {
            capture: Cadence::from_hz(capture_fps),
            output: Cadence::from_hz(output_rate_hz),
            smoothing: Cadence::new(smoothing_period),
            since_smoothing: Duration::ZERO,
        }
    }

    pub fn capture(&self) -> &Cadence {
        &self.capture
    }

    pub fn output(&self) -> &Cadence {
        &self.output
    }

    pub fn smoothing(&self) -> &Cadence {
        &self.smoothing
    }

    pub fn set_capture_fps(&mut self, fps: f32) {
        self.capture.set_period(Cadence::from_hz(fps).period());
    }

    pub fn set_output_rate(&mut self, hz: f32) {
        self.output.set_period(Cadence::from_hz(hz).period());
    }

    pub fn set_smoothing_period(&mut self, period: Duration) {
        self.smoothing.set_period(period);
    }

    pub fn advance(&mut self, elapsed: Duration) -> Ticks {
        self.since_smoothing = self.since_smoothing.saturating_add(elapsed);
        let smoothing = self.smoothing.advance(elapsed).then(|| {
            let dt = self.since_smoothing;
            self.since_smoothing = Duration::ZERO;
            dt
        });
        Ticks {
            capture: self.capture.advance(elapsed),
            output: self.output.advance(elapsed),
            smoothing,
        }
    }

    /// Shortest wait until any cadence fires.
    pub fn next_deadline(&self) -> Duration {
        self.capture
            .remaining()
            .min(self.output.remaining())
            .min(self.smoothing.remaining())
    }
}
