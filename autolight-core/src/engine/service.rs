//! The capture → extract → process → smooth → transmit loop.
//!
//! [`ColorEngine`] owns every stage and drives them from a [`Scheduler`]:
//!
//! 1. **Capture** (`1 / capture_fps`): grab the region, count failures,
//!    reduce the frame to a color and run it through the pipeline.
//! 2. **Smoothing** (~60 Hz): move the output color toward the latest
//!    processed color.
//! 3. **Output** (`1 / output_rate_hz`): send the output color over OSC.
//!
//! Nothing here returns an error once running. Sustained capture failure
//! releases the source and flips [`EngineStatus::SourceLost`]. Every stage
//! then idles, so no stale color goes out, while the loop keeps going so
//! the caller can report it and [`resume`](ColorEngine::resume).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::capture::types::{CaptureRegion, PixelBuffer, SourceKind};
use crate::capture::{CaptureSource, open_source};
use crate::color::{ColorExtractor, ColorPipeline, ColorSample, Smoother};
use crate::engine::config::EngineConfig;
use crate::engine::scheduler::{Scheduler, Ticks};
use crate::error::AutolightError;
use crate::osc::transmitter::{SendOutcome, Transmitter};

/// Shortest sleep between loop iterations.
const MIN_PACE: Duration = Duration::from_millis(1);

/// User-visible capture state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    /// Capturing on schedule.
    Running,
    /// The source failed persistently and has been released.
    SourceLost,
}

// ── ColorEngine ──────────────────────────────────────────────────

/// Single-task color engine.
///
/// # Lifetime
///
/// Call [`run`](Self::run) to start the loop. It runs until
/// [`stop`](Self::stop) is called or the flag from
/// [`stop_handle`](Self::stop_handle) is cleared, then releases the
/// capture source.
pub struct ColorEngine {
    config: EngineConfig,
    source: Box<dyn CaptureSource>,
    region: CaptureRegion,
    extractor: ColorExtractor,
    pipeline: ColorPipeline,
    smoother: Smoother,
    transmitter: Transmitter,
    scheduler: Scheduler,
    last_frame: PixelBuffer,
    /// Latest processed color; `None` until the first valid frame.
    target: Option<ColorSample>,
    output: ColorSample,
    last_send: Option<SendOutcome>,
    consecutive_failures: u32,
    status: EngineStatus,
    running: Arc<AtomicBool>,
}

impl ColorEngine {
    /// Build the engine with the platform backend named in `config`.
    pub fn from_config(config: EngineConfig) -> Self {
        let source = open_source(config.source);
        Self::new(config, source)
    }

    /// Build the engine around an explicit capture source.
    pub fn new(mut config: EngineConfig, source: Box<dyn CaptureSource>) -> Self {
        config.source = source.kind();
        Self {
            extractor: ColorExtractor::new(config.max_dimension),
            pipeline: ColorPipeline::new(config.pipeline),
            smoother: Smoother::new(config.enable_smoothing, config.smoothing_rate),
            transmitter: Transmitter::new(config.osc.clone(), config.output_rate_hz),
            scheduler: Scheduler::new(
                config.capture_fps,
                config.output_rate_hz,
                config.smoothing_period,
            ),
            config,
            source,
            region: CaptureRegion::default(),
            last_frame: PixelBuffer::invalid(),
            target: None,
            output: ColorSample::BLACK,
            last_send: None,
            consecutive_failures: 0,
            status: EngineStatus::Running,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    // ── External interfaces ──────────────────────────────────────

    /// Screen rectangle to capture from the next capture tick on.
    pub fn set_region(&mut self, region: CaptureRegion) {
        if region != self.region {
            debug!(
                "capture region set to ({}, {})-({}, {})",
                region.left, region.top, region.right, region.bottom
            );
        }
        self.region = region;
    }

    pub fn region(&self) -> CaptureRegion {
        self.region
    }

    /// Replace the configuration snapshot. The capture backend is fixed
    /// at construction, so a different `source` is ignored.
    pub fn update_config(&mut self, mut config: EngineConfig) {
        if config.source != self.config.source {
            warn!(
                "capture source cannot change while running ({:?} -> {:?}); keeping {:?}",
                self.config.source, config.source, self.config.source
            );
            config.source = self.config.source;
        }

        self.pipeline.set_settings(config.pipeline);
        self.smoother.set_enabled(config.enable_smoothing);
        self.smoother.set_rate(config.smoothing_rate);
        self.extractor = ColorExtractor::new(config.max_dimension);
        self.scheduler.set_capture_fps(config.capture_fps);
        self.scheduler.set_output_rate(config.output_rate_hz);
        self.scheduler.set_smoothing_period(config.smoothing_period);
        if config.output_rate_hz != self.config.output_rate_hz {
            self.transmitter.set_rate(config.output_rate_hz);
        }
        self.transmitter.set_target(config.osc.clone());
        self.config = config;
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Last valid captured frame, before downscaling.
    pub fn last_frame(&self) -> &PixelBuffer {
        &self.last_frame
    }

    /// [`last_frame`](Self::last_frame) as tightly packed RGBA.
    pub fn preview_rgba(&self) -> Vec<u8> {
        self.last_frame
            .to_rgba8(self.source.kind().swaps_red_blue())
    }

    /// The smoothed color most recently computed for output.
    pub fn output_color(&self) -> ColorSample {
        self.output
    }

    /// The processed color the smoother is approaching.
    pub fn target_color(&self) -> Option<ColorSample> {
        self.target
    }

    pub fn status(&self) -> EngineStatus {
        self.status
    }

    pub fn source_kind(&self) -> SourceKind {
        self.source.kind()
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Result of the most recent output tick.
    pub fn last_send(&self) -> Option<SendOutcome> {
        self.last_send
    }

    pub fn transmitter(&self) -> &Transmitter {
        &self.transmitter
    }

    /// Rebuild a lost source and resume capturing.
    pub fn resume(&mut self) -> bool {
        if self.status == EngineStatus::Running {
            return true;
        }
        if !self.source.reinitialize() {
            warn!("{:?} source still unavailable", self.source.kind());
            return false;
        }
        info!("{:?} source recovered", self.source.kind());
        self.consecutive_failures = 0;
        self.status = EngineStatus::Running;
        true
    }

    // ── Loop ─────────────────────────────────────────────────────

    /// A cloneable handle that can be used to stop the engine from
    /// another task.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run until stopped.
    ///
    /// Fails only if the OSC socket cannot be set up at start.
    pub async fn run(&mut self) -> Result<(), AutolightError> {
        self.running.store(true, Ordering::SeqCst);
        if let Err(e) = self.transmitter.connect().await {
            self.running.store(false, Ordering::SeqCst);
            return Err(e);
        }
        info!(
            "engine started: {:?} source, {} fps capture, {} Hz output",
            self.source.kind(),
            self.config.capture_fps,
            self.config.output_rate_hz
        );

        let mut last = Instant::now();
        while self.running.load(Ordering::SeqCst) {
            tokio::time::sleep(self.scheduler.next_deadline().max(MIN_PACE)).await;
            let now = Instant::now();
            self.tick(now.duration_since(last)).await;
            last = now;
        }

        self.source.release();
        info!("engine stopped");
        Ok(())
    }

    /// Advance every cadence by `elapsed` and run whatever is due.
    ///
    /// Once the source is lost, nothing runs until [`resume`](Self::resume).
    pub async fn tick(&mut self, elapsed: Duration) -> Ticks {
        let ticks = self.scheduler.advance(elapsed);

        if self.status != EngineStatus::Running {
            return ticks;
        }

        if ticks.capture {
            self.capture_once();
        }
        // Capture may have just lost the source.
        if self.status != EngineStatus::Running {
            return ticks;
        }

        if let (Some(dt), Some(target)) = (ticks.smoothing, self.target) {
            self.output = self.smoother.advance(dt.as_secs_f32(), target);
        }

        if ticks.output && self.target.is_some() {
            let outcome = self.transmitter.send(self.output).await;
            if outcome == SendOutcome::Failed {
                debug!("output tick dropped");
            }
            self.last_send = Some(outcome);
        }

        ticks
    }

    fn capture_once(&mut self) {
        let kind = self.source.kind();
        if kind == SourceKind::SharedTexture && !self.source.is_healthy() {
            debug!("shared-texture publisher inactive; reconnecting");
            if !self.source.reinitialize() {
                self.lose_source("publisher inactive and reconnect failed");
                return;
            }
        }

        let frame = self.source.capture(&self.region);
        if !frame.is_valid() {
            self.consecutive_failures += 1;
            if self.consecutive_failures > self.config.max_consecutive_failures {
                self.lose_source("too many consecutive capture failures");
            }
            return;
        }
        self.consecutive_failures = 0;

        let sample = self.extractor.extract(&frame, self.config.crop.as_ref(), kind);
        self.target = Some(self.pipeline.process(sample));
        self.last_frame = frame;
    }

    fn lose_source(&mut self, reason: &str) {
        error!(
            "{:?} capture stopped: {reason} ({} failures)",
            self.source.kind(),
            self.consecutive_failures
        );
        self.source.release();
        self.status = EngineStatus::SourceLost;
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    use tokio::net::UdpSocket;

    use super::*;
    use crate::osc::transmitter::OscTarget;

    /// Counters shared between a test and the boxed source.
    #[derive(Default)]
    struct Calls {
        captures: usize,
        reinits: usize,
        releases: usize,
        last_region: Option<CaptureRegion>,
    }

    struct ScriptedSource {
        kind: SourceKind,
        frames: VecDeque<PixelBuffer>,
        healthy: bool,
        reinit_ok: bool,
        calls: Rc<RefCell<Calls>>,
    }

    impl ScriptedSource {
        fn new(kind: SourceKind, frames: Vec<PixelBuffer>) -> (Self, Rc<RefCell<Calls>>) {
            let calls = Rc::new(RefCell::new(Calls::default()));
            let source = Self {
                kind,
                frames: frames.into(),
                healthy: true,
                reinit_ok: true,
                calls: Rc::clone(&calls),
            };
            (source, calls)
        }
    }

    impl CaptureSource for ScriptedSource {
        fn capture(&mut self, region: &CaptureRegion) -> PixelBuffer {
            let mut p = self.calls.borrow_mut();
            p.captures += 1;
            p.last_region = Some(*region);
            self.frames.pop_front().unwrap_or_else(PixelBuffer::invalid)
        }

        fn reinitialize(&mut self) -> bool {
            self.calls.borrow_mut().reinits += 1;
            self.reinit_ok
        }

        fn is_healthy(&mut self) -> bool {
            self.healthy
        }

        fn kind(&self) -> SourceKind {
            self.kind
        }

        fn release(&mut self) {
            self.calls.borrow_mut().releases += 1;
        }
    }

    const ORANGE: [u8; 4] = [0, 128, 255, 255];

    fn config(max_failures: u32) -> EngineConfig {
        EngineConfig {
            capture_fps: 10.0,
            output_rate_hz: 0.0,
            enable_smoothing: false,
            max_consecutive_failures: max_failures,
            ..EngineConfig::default()
        }
    }

    async fn receiver() -> (UdpSocket, OscTarget) {
        let rx = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let target = OscTarget {
            port: rx.local_addr().unwrap().port(),
            ..OscTarget::default()
        };
        (rx, target)
    }

    /// Long enough for every cadence to fire.
    const FULL_TICK: Duration = Duration::from_millis(500);

    #[tokio::test]
    async fn valid_frame_flows_to_output() {
        let (_rx, osc) = receiver().await;
        let (src, calls) = ScriptedSource::new(
            SourceKind::Duplication,
            vec![PixelBuffer::filled(400, 300, ORANGE)],
        );
        let mut engine = ColorEngine::new(EngineConfig { osc, ..config(10) }, Box::new(src));
        engine.set_region(CaptureRegion::new(0, 0, 400, 300));

        let ticks = engine.tick(FULL_TICK).await;
        assert!(ticks.capture && ticks.output && ticks.smoothing.is_some());
        assert_eq!(calls.borrow().last_region, Some(CaptureRegion::new(0, 0, 400, 300)));
        assert_eq!(engine.output_color(), ColorSample::new(1.0, 128.0 / 255.0, 0.0));
        assert_eq!(engine.last_frame().width(), 400);
        assert_eq!(engine.last_send(), Some(SendOutcome::Sent));
        assert_eq!(&engine.preview_rgba()[..4], &[255, 128, 0, 255]);
    }

    #[tokio::test]
    async fn nothing_is_sent_before_the_first_frame() {
        let (src, _calls) = ScriptedSource::new(SourceKind::Duplication, vec![]);
        let mut engine = ColorEngine::new(config(10), Box::new(src));
        let ticks = engine.tick(FULL_TICK).await;
        assert!(ticks.output);
        assert_eq!(engine.last_send(), None);
        assert_eq!(engine.target_color(), None);
    }

    #[tokio::test]
    async fn sustained_failure_releases_source() {
        let (src, calls) = ScriptedSource::new(SourceKind::Duplication, vec![]);
        let mut engine = ColorEngine::new(config(3), Box::new(src));

        for _ in 0..3 {
            engine.tick(FULL_TICK).await;
        }
        assert_eq!(engine.status(), EngineStatus::Running);
        assert_eq!(engine.consecutive_failures(), 3);

        engine.tick(FULL_TICK).await;
        assert_eq!(engine.status(), EngineStatus::SourceLost);
        assert_eq!(calls.borrow().releases, 1);

        // Capture stays stopped.
        engine.tick(FULL_TICK).await;
        assert_eq!(calls.borrow().captures, 4);
    }

    #[tokio::test]
    async fn output_stops_once_the_source_is_lost() {
        let (_rx, osc) = receiver().await;
        let (src, _calls) = ScriptedSource::new(
            SourceKind::Duplication,
            vec![PixelBuffer::filled(4, 4, ORANGE)],
        );
        let mut cfg = EngineConfig { osc, ..config(1) };
        cfg.enable_smoothing = true;
        let mut engine = ColorEngine::new(cfg, Box::new(src));

        engine.tick(FULL_TICK).await;
        assert_eq!(engine.last_send(), Some(SendOutcome::Sent));
        let sent = engine.transmitter().last_sent();

        // Two failures exceed the limit of one.
        engine.tick(FULL_TICK).await;
        engine.tick(FULL_TICK).await;
        assert_eq!(engine.status(), EngineStatus::SourceLost);
        let output = engine.output_color();
        let sent_at_loss = engine.transmitter().last_sent();
        assert!(sent_at_loss >= sent);

        for _ in 0..5 {
            engine.tick(FULL_TICK).await;
        }
        assert_eq!(engine.transmitter().last_sent(), sent_at_loss);
        assert_eq!(engine.output_color(), output);
    }

    #[tokio::test]
    async fn valid_frame_resets_failure_count() {
        let frames = vec![
            PixelBuffer::invalid(),
            PixelBuffer::invalid(),
            PixelBuffer::filled(4, 4, ORANGE),
            PixelBuffer::invalid(),
        ];
        let (src, _calls) = ScriptedSource::new(SourceKind::Blit, frames);
        let mut engine = ColorEngine::new(config(2), Box::new(src));
        for _ in 0..4 {
            engine.tick(FULL_TICK).await;
        }
        assert_eq!(engine.consecutive_failures(), 1);
        assert_eq!(engine.status(), EngineStatus::Running);
    }

    #[tokio::test]
    async fn inactive_publisher_with_failed_reconnect_is_lost() {
        let (mut src, calls) = ScriptedSource::new(SourceKind::SharedTexture, vec![]);
        src.healthy = false;
        src.reinit_ok = false;
        let mut engine = ColorEngine::new(config(10), Box::new(src));

        engine.tick(FULL_TICK).await;
        assert_eq!(engine.status(), EngineStatus::SourceLost);
        assert_eq!(calls.borrow().reinits, 1);
        assert_eq!(calls.borrow().captures, 0);
    }

    #[tokio::test]
    async fn shared_texture_swaps_channels() {
        let (src, _calls) = ScriptedSource::new(
            SourceKind::SharedTexture,
            vec![PixelBuffer::filled(8, 8, ORANGE)],
        );
        let mut engine = ColorEngine::new(config(10), Box::new(src));
        engine.tick(FULL_TICK).await;
        assert_eq!(engine.target_color(), Some(ColorSample::new(0.0, 128.0 / 255.0, 1.0)));
    }

    #[tokio::test]
    async fn crop_limits_the_average() {
        let mut frame = PixelBuffer::filled(20, 10, [0, 0, 0, 255]);
        for y in 0..10 {
            let o = y * frame.stride();
            frame.pixels_mut()[o..o + 40].copy_from_slice(&ORANGE.repeat(10));
        }
        let (src, _calls) = ScriptedSource::new(SourceKind::Blit, vec![frame]);
        let mut cfg = config(10);
        cfg.crop = Some(CaptureRegion::new(0, 0, 10, 10));
        cfg.pipeline.force_max_brightness = false;
        let mut engine = ColorEngine::new(cfg, Box::new(src));

        engine.tick(FULL_TICK).await;
        assert_eq!(engine.target_color(), Some(ColorSample::new(1.0, 128.0 / 255.0, 0.0)));
    }

    #[tokio::test]
    async fn update_config_keeps_source_kind() {
        let (src, _calls) = ScriptedSource::new(SourceKind::Blit, vec![]);
        let mut engine = ColorEngine::new(config(10), Box::new(src));
        let mut cfg = engine.config().clone();
        cfg.source = SourceKind::SharedTexture;
        cfg.capture_fps = 2.0;
        engine.update_config(cfg);
        assert_eq!(engine.config().source, SourceKind::Blit);
        assert_eq!(engine.config().capture_fps, 2.0);
    }

    #[tokio::test]
    async fn resume_after_loss() {
        let (src, _calls) = ScriptedSource::new(SourceKind::Duplication, vec![]);
        let mut engine = ColorEngine::new(config(0), Box::new(src));
        engine.tick(FULL_TICK).await;
        assert_eq!(engine.status(), EngineStatus::SourceLost);

        assert!(engine.resume());
        assert_eq!(engine.status(), EngineStatus::Running);
        assert_eq!(engine.consecutive_failures(), 0);
    }

    #[tokio::test]
    async fn smoothing_approaches_target_between_captures() {
        let (src, _calls) = ScriptedSource::new(
            SourceKind::Blit,
            vec![PixelBuffer::filled(4, 4, [0, 0, 255, 255])],
        );
        let mut cfg = config(10);
        cfg.enable_smoothing = true;
        cfg.smoothing_rate = 1.0;
        cfg.capture_fps = 1.0;
        cfg.smoothing_period = Duration::from_millis(250);
        let mut engine = ColorEngine::new(cfg, Box::new(src));

        engine.tick(Duration::from_secs(1)).await;
        // dt 1.0 s at rate 1.0 closes the gap in one step.
        assert_eq!(engine.output_color(), ColorSample::new(1.0, 0.0, 0.0));
    }

    #[tokio::test]
    async fn stop_handle_clears_running_flag() {
        let (src, _calls) = ScriptedSource::new(SourceKind::Blit, vec![]);
        let engine = ColorEngine::new(config(10), Box::new(src));
        let handle = engine.stop_handle();
        handle.store(true, Ordering::SeqCst);
        assert!(engine.is_running());
        engine.stop();
        assert!(!handle.load(Ordering::SeqCst));
    }
}
