//! Stateful per-sample color processing.
//!
//! Stages run in a fixed order:
//!
//! 1. **Black holdover**: an exact black sample is replaced by the last
//!    non-black one.
//! 2. **Max brightness** (optional): scale so the brightest channel is 1.
//! 3. **White mix**: move every channel toward 1 by a percentage.
//! 4. **Saturation**: scale HSV saturation by `1 + pct/100`.

use crate::color::sample::{ColorSample, hsv_to_rgb, rgb_to_hsv};

/// Tunables read on every [`ColorPipeline::process`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineSettings {
    pub force_max_brightness: bool,
    /// `0..=100`.
    pub white_mix_percent: f32,
    /// `-100..=100`; 0 leaves the color untouched.
    pub saturation_percent: f32,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            force_max_brightness: true,
            white_mix_percent: 0.0,
            saturation_percent: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ColorPipeline {
    settings: PipelineSettings,
    last_non_black: ColorSample,
}

impl ColorPipeline {
    pub fn new(settings: PipelineSettings) -> Self {
        Self {
            settings,
            last_non_black: ColorSample::BLACK,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Swap in new settings. Holdover state is kept.
    pub fn set_settings(&mut self, settings: PipelineSettings) {
        self.settings = settings;
    }

    pub fn last_non_black(&self) -> ColorSample {
        self.last_non_black
    }

    pub fn process(&mut self, sample: ColorSample) -> ColorSample {
        let mut c = if sample.is_black() {
            self.last_non_black
        } else {
            self.last_non_black = sample;
            sample
        };

        if self.settings.force_max_brightness {
            c = force_max_brightness(c);
        }
        c = apply_white_mix(c, self.settings.white_mix_percent);
        apply_saturation(c, self.settings.saturation_percent)
    }
}

/// Scale so the largest channel is 1. Black passes through.
pub fn force_max_brightness(c: ColorSample) -> ColorSample {
    let max = c.max_channel();
    if max <= 0.0 {
        return c;
    }
    let scale = 1.0 / max;
    c.map(|v| (v * scale).min(1.0))
}

pub fn apply_white_mix(c: ColorSample, percent: f32) -> ColorSample {
    let mix = percent / 100.0;
    c.map(|v| v + (1.0 - v) * mix)
}

pub fn apply_saturation(c: ColorSample, percent: f32) -> ColorSample {
    if percent == 0.0 {
        return c;
    }
    let mut hsv = rgb_to_hsv(c);
    hsv.s = (hsv.s * (1.0 + percent / 100.0)).clamp(0.0, 1.0);
    hsv_to_rgb(hsv)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain() -> PipelineSettings {
        PipelineSettings {
            force_max_brightness: false,
            white_mix_percent: 0.0,
            saturation_percent: 0.0,
        }
    }

    #[test]
    fn black_without_history_stays_black() {
        let mut p = ColorPipeline::new(PipelineSettings::default());
        assert_eq!(p.process(ColorSample::BLACK), ColorSample::BLACK);
    }

    #[test]
    fn black_is_replaced_by_last_non_black() {
        let mut p = ColorPipeline::new(plain());
        let c = ColorSample::new(0.2, 0.4, 0.6);
        assert_eq!(p.process(c), c);
        assert_eq!(p.process(ColorSample::BLACK), c);
        assert_eq!(p.process(ColorSample::BLACK), c);
        assert_eq!(p.last_non_black(), c);
    }

    #[test]
    fn max_brightness_normalizes_peak() {
        let c = force_max_brightness(ColorSample::new(0.1, 0.5, 0.25));
        assert_eq!(c.max_channel(), 1.0);
        assert_eq!(c.r, 0.2);
        assert_eq!(force_max_brightness(ColorSample::BLACK), ColorSample::BLACK);
    }

    #[test]
    fn white_mix_moves_toward_white() {
        let c = apply_white_mix(ColorSample::new(0.0, 0.5, 1.0), 50.0);
        assert_eq!(c, ColorSample::new(0.5, 0.75, 1.0));
        assert_eq!(
            apply_white_mix(ColorSample::new(0.25, 0.0, 0.75), 100.0),
            ColorSample::WHITE
        );
    }

    #[test]
    fn zero_saturation_is_identity() {
        let c = ColorSample::new(0.3, 0.6, 0.9);
        assert_eq!(apply_saturation(c, 0.0), c);
    }

    #[test]
    fn full_desaturation_gives_grey() {
        let c = apply_saturation(ColorSample::new(1.0, 0.5, 0.0), -100.0);
        assert_eq!(c, ColorSample::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn saturation_boost_is_clamped() {
        let c = apply_saturation(ColorSample::new(1.0, 0.75, 0.5), 100.0);
        // s goes 0.5 -> 1.0, so the minimum channel hits zero.
        assert!((c.b - 0.0).abs() < 1e-6);
        assert_eq!(c.r, 1.0);
    }

    #[test]
    fn stages_compose_in_order() {
        let mut p = ColorPipeline::new(PipelineSettings {
            force_max_brightness: true,
            white_mix_percent: 50.0,
            saturation_percent: 0.0,
        });
        // (0.25, 0.125, 0) -> (1, 0.5, 0) -> (1, 0.75, 0.5)
        let out = p.process(ColorSample::new(0.25, 0.125, 0.0));
        assert_eq!(out, ColorSample::new(1.0, 0.75, 0.5));
    }
}
