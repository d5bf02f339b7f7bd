//! Region capture on top of an OS display-duplication session.
//!
//! The session itself (device, duplication handle, staging surface) lives
//! behind [`DuplicationBackend`]; this module owns the policy:
//!
//! 1. Lazily open the session on first use.
//! 2. Clamp the requested region to the output surface. A degenerate
//!    clamp returns the invalid sentinel without touching the session.
//! 3. On an acquire failure, rebuild the session once and retry once.
//!    A second failure returns the sentinel; the next tick may try again.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::capture::CaptureSource;
use crate::capture::types::{CaptureRegion, PixelBuffer, SourceKind, SurfaceSize};
use crate::error::CaptureError;

/// Upper bound on how long one acquire may block.
pub const ACQUIRE_TIMEOUT: Duration = Duration::from_millis(1000);

// ── DuplicationBackend ───────────────────────────────────────────

/// Platform session for output duplication.
///
/// `open` builds every handle as a unit and `close` drops them as a unit;
/// a backend never holds a partially built session.
pub trait DuplicationBackend {
    /// Build a fresh session and report the full output size.
    fn open(&mut self) -> Result<SurfaceSize, CaptureError>;

    /// Acquire the next desktop frame and copy out `region`, which the
    /// caller has already clamped to the surface.
    fn copy_region(
        &mut self,
        region: &CaptureRegion,
        timeout: Duration,
    ) -> Result<PixelBuffer, CaptureError>;

    /// Release the session. Safe to call when nothing is open.
    fn close(&mut self);
}

// ── RegionDuplicator ─────────────────────────────────────────────

/// [`CaptureSource`] backed by display duplication.
pub struct RegionDuplicator<B: DuplicationBackend> {
    backend: B,
    surface: Option<SurfaceSize>,
    timeout: Duration,
}

impl<B: DuplicationBackend> RegionDuplicator<B> {
    /// Wrap `backend`. No session is opened until the first capture.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            surface: None,
            timeout: ACQUIRE_TIMEOUT,
        }
    }

    /// Override the per-acquire wait budget.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Size of the current output surface, if a session is open.
    pub fn surface(&self) -> Option<SurfaceSize> {
        self.surface
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Clamp and copy once against the current session.
    fn attempt(&mut self, region: &CaptureRegion) -> Result<PixelBuffer, CaptureError> {
        let size = self.surface.ok_or(CaptureError::NotInitialized)?;
        let clamped = region.clamp_to(size.width, size.height);
        if clamped.is_empty() {
            return Ok(PixelBuffer::invalid());
        }
        self.backend.copy_region(&clamped, self.timeout)
    }
}

impl<B: DuplicationBackend> CaptureSource for RegionDuplicator<B> {
    fn capture(&mut self, region: &CaptureRegion) -> PixelBuffer {
        if self.surface.is_none() && !self.reinitialize() {
            return PixelBuffer::invalid();
        }

        match self.attempt(region) {
            Ok(buf) => return buf,
            Err(e) => debug!("duplication acquire failed: {e}; rebuilding session"),
        }

        if !self.reinitialize() {
            return PixelBuffer::invalid();
        }

        match self.attempt(region) {
            Ok(buf) => buf,
            Err(e) => {
                warn!("duplication retry failed: {e}");
                PixelBuffer::invalid()
            }
        }
    }

    fn reinitialize(&mut self) -> bool {
        self.backend.close();
        self.surface = None;
        match self.backend.open() {
            Ok(size) => {
                info!("duplication session ready ({}x{})", size.width, size.height);
                self.surface = Some(size);
                true
            }
            Err(e) => {
                warn!("duplication session unavailable: {e}");
                false
            }
        }
    }

    fn is_healthy(&mut self) -> bool {
        self.surface.is_some()
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Duplication
    }

    fn release(&mut self) {
        self.backend.close();
        self.surface = None;
    }
}

// ── Tests ────────────────────────────────────────────────────────
