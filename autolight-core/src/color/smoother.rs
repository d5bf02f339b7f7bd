//! Time-weighted exponential approach toward a target color.

use crate::color::sample::ColorSample;

/// Default time constant, in seconds.
pub const DEFAULT_SMOOTHING_RATE: f32 = 0.5;

#[derive(Debug, Clone)]
pub struct Smoother {
    enabled: bool,
    /// Seconds to close the gap at a constant `dt`.
    rate: f32,
    current: ColorSample,
}

impl Smoother {
    pub fn new(enabled: bool, rate: f32) -> Self {
        Self {
            enabled,
            rate,
            current: ColorSample::BLACK,
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn set_rate(&mut self, rate: f32) {
        self.rate = rate;
    }

    pub fn current(&self) -> ColorSample {
        self.current
    }

    /// Step `dt_seconds` toward `target` and return the new state.
    pub fn advance(&mut self, dt_seconds: f32, target: ColorSample) -> ColorSample {
        if !self.enabled {
            self.current = target;
            return target;
        }
        let factor = if self.rate > 0.0 {
            (dt_seconds / self.rate).min(1.0)
        } else {
            1.0
        };
        self.current = self.current.lerp(target, factor);
        self.current
    }
}

impl Default for Smoother {
    fn default() -> Self {
        Self::new(true, DEFAULT_SMOOTHING_RATE)
    }
}
