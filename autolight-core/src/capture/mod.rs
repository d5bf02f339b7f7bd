//! Frame capture backends.
//!
//! ```text
//!                 ┌──────────────────────┐
//!   region ─────► │ dyn CaptureSource     │ ─────► PixelBuffer (or invalid)
//!                 └──────────────────────┘
//!                   │        │         │
//!      RegionDuplicator  RegionBlitter  SharedTextureReceiver
//!       (DXGI dup.)       (GDI blit)     (Spout texture import)
//! ```
//!
//! | Module           | Purpose                                              |
//! |------------------|------------------------------------------------------|
//! | `types`          | `PixelBuffer`, `CaptureRegion`, `SourceKind`          |
//! | `duplicator`     | Retry/clamp logic over a `DuplicationBackend`         |
//! | `dxgi`           | DXGI Desktop Duplication session (Windows)            |
//! | `blitter`        | Stateless GDI screen blit (Windows)                   |
//! | `shared_texture` | Publisher connect/receive/liveness lifecycle          |
//! | `spout`          | Spout sender registry + D3D11 texture import (Windows)|

pub mod blitter;
pub mod duplicator;
pub mod dxgi;
pub mod shared_texture;
pub mod spout;
pub mod types;

pub use blitter::RegionBlitter;
pub use duplicator::{DuplicationBackend, RegionDuplicator};
pub use dxgi::DxgiDuplication;
pub use shared_texture::{SenderInfo, SharedTextureReceiver, TextureDirectory};
pub use spout::SpoutDirectory;
pub use types::{CaptureRegion, PixelBuffer, SourceKind, SurfaceSize};

/// A pluggable producer of BGRA frames.
///
/// Implementations never fail across this boundary: any backend error is
/// logged, handled locally, and reported as [`PixelBuffer::invalid`].
pub trait CaptureSource {
    /// Capture `region` intersected with the source's bounds.
    fn capture(&mut self, region: &CaptureRegion) -> PixelBuffer;

    /// Tear down and rebuild every session handle. Returns whether the
    /// rebuilt session is usable.
    fn reinitialize(&mut self) -> bool;

    /// Cheap, non-blocking liveness check.
    fn is_healthy(&mut self) -> bool;

    /// Which backend this is.
    fn kind(&self) -> SourceKind;

    /// Drop all session handles. Safe to call in any state.
    fn release(&mut self) {}
}

/// Build the default backend for `kind`.
pub fn open_source(kind: SourceKind) -> Box<dyn CaptureSource> {
    match kind {
        SourceKind::Duplication => Box::new(RegionDuplicator::new(DxgiDuplication::new(0))),
        SourceKind::Blit => Box::new(RegionBlitter::new()),
        SourceKind::SharedTexture => Box::new(SharedTextureReceiver::new(SpoutDirectory::new())),
    }
}
