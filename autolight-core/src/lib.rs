//! # autolight-core
//!
//! Screen-to-OSC ambient color core: samples a visual source, reduces it
//! to one color, and streams that color to a remote consumer.
//!
//! This crate contains:
//! - **Capture**: `CaptureSource` with DXGI duplication, GDI blit and
//!   Spout shared-texture backends, all returning `PixelBuffer`
//! - **Color**: bilinear downscale, average color, the processing
//!   pipeline and the smoother
//! - **OSC**: single-float message encoding and the rate-limited
//!   `Transmitter`
//! - **Engine**: `Scheduler` cadences and the `ColorEngine` loop
//! - **Error**: `AutolightError` and `CaptureError`, `thiserror`-based

pub mod capture;
pub mod color;
pub mod engine;
pub mod error;
pub mod osc;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use capture::{
    CaptureRegion, CaptureSource, PixelBuffer, SourceKind, open_source,
};
pub use color::{ColorExtractor, ColorPipeline, ColorSample, PipelineSettings, Smoother};
pub use engine::{ColorEngine, EngineConfig, EngineStatus, Scheduler, Ticks};
pub use error::{AutolightError, CaptureError};
pub use osc::{OscTarget, SendOutcome, Transmitter};
