//! Read-only configuration snapshot for [`ColorEngine`](super::ColorEngine).

use std::time::Duration;

use crate::capture::types::{CaptureRegion, SourceKind};
use crate::color::extractor::DEFAULT_MAX_DIMENSION;
use crate::color::pipeline::PipelineSettings;
use crate::color::smoother::DEFAULT_SMOOTHING_RATE;
use crate::engine::scheduler::SMOOTHING_PERIOD;
use crate::osc::transmitter::OscTarget;

/// Consecutive invalid frames tolerated before the source is dropped.
pub const DEFAULT_MAX_CONSECUTIVE_FAILURES: u32 = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Which capture backend to build. Fixed for the engine's lifetime.
    pub source: SourceKind,
    pub capture_fps: f32,
    pub output_rate_hz: f32,
    pub pipeline: PipelineSettings,
    pub enable_smoothing: bool,
    /// Smoother time constant, seconds.
    pub smoothing_rate: f32,
    pub smoothing_period: Duration,
    pub osc: OscTarget,
    /// Frame-relative sub-rectangle averaged instead of the whole frame.
    pub crop: Option<CaptureRegion>,
    pub max_dimension: u32,
    pub max_consecutive_failures: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::Duplication,
            capture_fps: 5.0,
            output_rate_hz: 3.0,
            pipeline: PipelineSettings::default(),
            enable_smoothing: true,
            smoothing_rate: DEFAULT_SMOOTHING_RATE,
            smoothing_period: SMOOTHING_PERIOD,
            osc: OscTarget::default(),
            crop: None,
            max_dimension: DEFAULT_MAX_DIMENSION,
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
        }
    }
}
