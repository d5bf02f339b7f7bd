//! Cross-process shared-texture receiver.
//!
//! Publisher discovery and connection are separate from frame capture:
//!
//! - [`connect`](SharedTextureReceiver::connect) finds an active publisher
//!   and sizes the receive buffer to it.
//! - [`receive`](SharedTextureReceiver::receive) imports one frame,
//!   connecting first if needed and reallocating the buffer when the
//!   publisher's size changed.
//! - [`is_sender_active`](SharedTextureReceiver::is_sender_active) samples
//!   publisher metadata at most every [`LIVENESS_CHECK_INTERVAL`] and
//!   reports inactivity after [`INACTIVITY_TIMEOUT`] without a frame.
//!
//! The platform registry and GPU import sit behind [`TextureDirectory`].

use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::capture::CaptureSource;
use crate::capture::types::{CaptureRegion, PixelBuffer, SourceKind};
use crate::error::CaptureError;

/// Minimum spacing between publisher metadata queries.
pub const LIVENESS_CHECK_INTERVAL: Duration = Duration::from_millis(500);

/// A publisher with no successful receive for this long is inactive.
pub const INACTIVITY_TIMEOUT: Duration = Duration::from_millis(3000);

// ── SenderInfo ───────────────────────────────────────────────────

/// Identity and reported size of a shared-texture publisher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderInfo {
    pub name: String,
    pub width: u32,
    pub height: u32,
}

impl SenderInfo {
    fn has_size(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

// ── TextureDirectory ─────────────────────────────────────────────

/// Platform access to shared-texture publishers.
pub trait TextureDirectory {
    /// The publisher currently marked active, if any.
    fn active_sender(&mut self) -> Result<SenderInfo, CaptureError>;

    /// Fresh metadata for `name`; `None` once the publisher is gone.
    fn sender_info(&mut self, name: &str) -> Option<SenderInfo>;

    /// Import `sender`'s texture and copy it into `dst`, which the caller
    /// has already sized to the sender's reported dimensions.
    fn read_frame(&mut self, sender: &SenderInfo, dst: &mut PixelBuffer)
    -> Result<(), CaptureError>;

    /// Drop GPU and registry handles. Safe to call in any state.
    fn close(&mut self);
}

// ── SharedTextureReceiver ────────────────────────────────────────

/// [`CaptureSource`] that imports frames from a shared-texture publisher.
pub struct SharedTextureReceiver<D: TextureDirectory> {
    directory: D,
    sender: Option<SenderInfo>,
    /// Receive buffer, sized to the connected sender.
    buffer: PixelBuffer,
    last_check: Option<Instant>,
    last_frame: Instant,
    active: bool,
}

impl<D: TextureDirectory> SharedTextureReceiver<D> {
    pub fn new(directory: D) -> Self {
        Self {
            directory,
            sender: None,
            buffer: PixelBuffer::invalid(),
            last_check: None,
            last_frame: Instant::now(),
            active: false,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.sender.is_some()
    }

    /// Name of the connected publisher.
    pub fn sender_name(&self) -> Option<&str> {
        self.sender.as_ref().map(|s| s.name.as_str())
    }

    /// Size of the current receive buffer.
    pub fn buffer_size(&self) -> Option<(u32, u32)> {
        self.buffer
            .is_valid()
            .then(|| (self.buffer.width(), self.buffer.height()))
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    pub fn directory_mut(&mut self) -> &mut D {
        &mut self.directory
    }

    /// Find and bind an active publisher. No-op if already connected.
    pub fn connect(&mut self) -> bool {
        self.connect_at(Instant::now())
    }

    /// [`connect`](Self::connect) with an explicit clock (for testing).
    pub fn connect_at(&mut self, now: Instant) -> bool {
        if self.sender.is_some() {
            return true;
        }

        let info = match self.directory.active_sender() {
            Ok(info) if info.has_size() => info,
            Ok(info) => {
                debug!("publisher {} reports an empty texture", info.name);
                return false;
            }
            Err(e) => {
                debug!("shared-texture connect failed: {e}");
                return false;
            }
        };

        info!(
            "connected to shared-texture sender {} ({}x{})",
            info.name, info.width, info.height
        );
        self.buffer = PixelBuffer::new(info.width, info.height);
        self.sender = Some(info);
        self.last_frame = now;
        self.last_check = None;
        self.active = true;
        true
    }

    /// Import one frame from the connected publisher.
    pub fn receive(&mut self) -> PixelBuffer {
        self.receive_at(Instant::now())
    }

    /// [`receive`](Self::receive) with an explicit clock (for testing).
    pub fn receive_at(&mut self, now: Instant) -> PixelBuffer {
        if self.sender.is_none() && !self.connect_at(now) {
            return PixelBuffer::invalid();
        }
        let Some(name) = self.sender.as_ref().map(|s| s.name.clone()) else {
            return PixelBuffer::invalid();
        };

        match self.directory.sender_info(&name) {
            Some(info) if info.has_size() => self.adopt_size(info),
            _ => {
                debug!("shared-texture sender {name} has no texture");
                return PixelBuffer::invalid();
            }
        }

        let Some(sender) = self.sender.as_ref() else {
            return PixelBuffer::invalid();
        };
        match self.directory.read_frame(sender, &mut self.buffer) {
            Ok(()) => {
                self.last_frame = now;
                self.active = true;
                self.buffer.clone()
            }
            Err(e) => {
                debug!("shared-texture receive failed: {e}");
                PixelBuffer::invalid()
            }
        }
    }

    /// Whether the publisher is still producing frames.
    pub fn is_sender_active(&mut self) -> bool {
        self.is_sender_active_at(Instant::now())
    }

    /// [`is_sender_active`](Self::is_sender_active) with an explicit clock.
    pub fn is_sender_active_at(&mut self, now: Instant) -> bool {
        let Some(name) = self.sender.as_ref().map(|s| s.name.clone()) else {
            return false;
        };

        let fresh = now.saturating_duration_since(self.last_frame) < INACTIVITY_TIMEOUT;
        if let Some(checked) = self.last_check {
            if now.saturating_duration_since(checked) < LIVENESS_CHECK_INTERVAL {
                return self.active && fresh;
            }
        }
        self.last_check = Some(now);

        let Some(info) = self.directory.sender_info(&name) else {
            self.active = false;
            return false;
        };

        // A resized publisher counts as a fresh one.
        if info.has_size() && self.sender.as_ref().is_some_and(|s| !same_size(s, &info)) {
            self.adopt_size(info);
            self.last_frame = now;
            self.active = true;
            return true;
        }

        self.active = fresh;
        self.active
    }

    /// Release the receive buffer and forget the publisher.
    pub fn disconnect(&mut self) {
        if let Some(sender) = self.sender.take() {
            info!("disconnected from shared-texture sender {}", sender.name);
        }
        self.buffer = PixelBuffer::invalid();
        self.last_check = None;
        self.active = false;
        self.directory.close();
    }

    fn adopt_size(&mut self, info: SenderInfo) {
        let changed = self
            .sender
            .as_ref()
            .is_none_or(|s| !same_size(s, &info) || !self.buffer.is_valid());
        if changed {
            debug!(
                "shared-texture sender {} resized to {}x{}",
                info.name, info.width, info.height
            );
            self.buffer = PixelBuffer::new(info.width, info.height);
        }
        self.sender = Some(info);
    }
}

fn same_size(a: &SenderInfo, b: &SenderInfo) -> bool {
    a.width == b.width && a.height == b.height
}

impl<D: TextureDirectory> CaptureSource for SharedTextureReceiver<D> {
    /// The publisher decides the frame; `region` is not consulted.
    fn capture(&mut self, _region: &CaptureRegion) -> PixelBuffer {
        self.receive()
    }

    fn reinitialize(&mut self) -> bool {
        self.disconnect();
        self.connect()
    }

    fn is_healthy(&mut self) -> bool {
        self.is_sender_active()
    }

    fn kind(&self) -> SourceKind {
        SourceKind::SharedTexture
    }

    fn release(&mut self) {
        self.disconnect();
    }
}

impl<D: TextureDirectory> Drop for SharedTextureReceiver<D> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

// ── Tests ────────────────────────────────────────────────────────
