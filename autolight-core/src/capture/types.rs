//! Shared types for the capture stage.
//!
//! [`PixelBuffer`] is the only frame representation that flows between
//! the capture backends and the color extractor. A buffer with zero
//! width or height (see [`PixelBuffer::invalid`]) is the canonical
//! "no frame" sentinel returned by every backend on failure.

use serde::{Deserialize, Serialize};

/// Bytes per BGRA sample.
pub const BYTES_PER_PIXEL: usize = 4;

// ── SourceKind ───────────────────────────────────────────────────

/// Which capture backend produced a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// OS display duplication of one output.
    Duplication,
    /// Direct blit from live screen memory.
    Blit,
    /// Cross-process GPU texture import.
    SharedTexture,
}

impl SourceKind {
    /// Shared-texture publishers hand us R and B reversed relative to
    /// screen capture.
    pub const fn swaps_red_blue(self) -> bool {
        matches!(self, SourceKind::SharedTexture)
    }
}

// ── CaptureRegion ────────────────────────────────────────────────

/// Screen-space rectangle, right/bottom exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CaptureRegion {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl CaptureRegion {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Region anchored at `(x, y)` with the given size.
    pub const fn from_xywh(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self::new(
            x,
            y,
            x.saturating_add(width as i32),
            y.saturating_add(height as i32),
        )
    }

    /// Width in pixels, negative for inverted rectangles.
    pub fn width(&self) -> i64 {
        self.right as i64 - self.left as i64
    }

    /// Height in pixels, negative for inverted rectangles.
    pub fn height(&self) -> i64 {
        self.bottom as i64 - self.top as i64
    }

    /// `true` if the region covers no pixels.
    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    /// Intersect with `[0, width) × [0, height)`.
    pub fn clamp_to(&self, width: u32, height: u32) -> Self {
        let w = i32::try_from(width).unwrap_or(i32::MAX);
        let h = i32::try_from(height).unwrap_or(i32::MAX);
        self.intersect(&Self::new(0, 0, w, h))
    }

    /// Overlap of two regions; empty if they do not touch.
    pub fn intersect(&self, other: &Self) -> Self {
        Self {
            left: self.left.max(other.left),
            top: self.top.max(other.top),
            right: self.right.min(other.right),
            bottom: self.bottom.min(other.bottom),
        }
    }
}

// ── SurfaceSize ──────────────────────────────────────────────────

/// Dimensions of a backend's capture surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

// ── PixelBuffer ──────────────────────────────────────────────────

/// An owned BGRA bitmap.
///
/// `pixels` holds `height` rows of `stride` bytes; `stride` is at least
/// `width * 4`. Buffers are produced fresh by each capture call and never
/// modified afterwards except through copy/crop operations that return a
/// new buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    stride: usize,
    pixels: Vec<u8>,
}

impl PixelBuffer {
    /// The "no frame" sentinel.
    pub const fn invalid() -> Self {
        Self {
            width: 0,
            height: 0,
            stride: 0,
            pixels: Vec::new(),
        }
    }

    /// A zeroed, tightly packed buffer. Zero dimensions yield the sentinel.
    pub fn new(width: u32, height: u32) -> Self {
        if width == 0 || height == 0 {
            return Self::invalid();
        }
        let stride = width as usize * BYTES_PER_PIXEL;
        Self {
            width,
            height,
            stride,
            pixels: vec![0u8; stride * height as usize],
        }
    }

    /// A buffer with every pixel set to `bgra`.
    pub fn filled(width: u32, height: u32, bgra: [u8; 4]) -> Self {
        let mut buf = Self::new(width, height);
        for px in buf.pixels.chunks_exact_mut(BYTES_PER_PIXEL) {
            px.copy_from_slice(&bgra);
        }
        buf
    }

    /// Copy `height` rows of `width` pixels out of `src`, whose rows are
    /// `src_pitch` bytes apart.
    ///
    /// GPU mappings routinely pad rows, so `src_pitch` may exceed
    /// `width * 4`. Returns the sentinel if `src` is too short or the
    /// pitch cannot hold a row.
    pub fn from_rows(src: &[u8], src_pitch: usize, width: u32, height: u32) -> Self {
        let mut buf = Self::new(width, height);
        if buf.is_valid() && buf.fill_from_rows(src, src_pitch) {
            buf
        } else {
            Self::invalid()
        }
    }

    /// Overwrite this buffer's pixels with rows read from `src`.
    ///
    /// Used by receivers that keep a long-lived receive buffer. Returns
    /// `false`, leaving the buffer untouched, if `src` cannot supply
    /// `height` rows of `width` pixels at `src_pitch`.
    pub fn fill_from_rows(&mut self, src: &[u8], src_pitch: usize) -> bool {
        let row_bytes = self.width as usize * BYTES_PER_PIXEL;
        if !self.is_valid() || src_pitch < row_bytes {
            return false;
        }
        let needed = src_pitch * (self.height as usize - 1) + row_bytes;
        if src.len() < needed {
            return false;
        }

        for y in 0..self.height as usize {
            let s = y * src_pitch;
            let d = y * self.stride;
            self.pixels[d..d + row_bytes].copy_from_slice(&src[s..s + row_bytes]);
        }
        true
    }

    /// `true` unless this is the "no frame" sentinel.
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0 && !self.pixels.is_empty()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row pitch in bytes.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Raw storage, `stride * height` bytes.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub(crate) fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Pixel bytes of row `y`, without padding.
    ///
    /// # Panics
    ///
    /// Panics if `y` is out of bounds.
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride;
        &self.pixels[start..start + self.width as usize * BYTES_PER_PIXEL]
    }

    /// BGRA sample at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let o = y as usize * self.stride + x as usize * BYTES_PER_PIXEL;
        [
            self.pixels[o],
            self.pixels[o + 1],
            self.pixels[o + 2],
            self.pixels[o + 3],
        ]
    }

    /// Copy out `region`, clamped to this buffer.
    pub fn crop(&self, region: &CaptureRegion) -> Self {
        if !self.is_valid() {
            return Self::invalid();
        }
        let r = region.clamp_to(self.width, self.height);
        if r.is_empty() {
            return Self::invalid();
        }
        let offset = r.top as usize * self.stride + r.left as usize * BYTES_PER_PIXEL;
        Self::from_rows(
            &self.pixels[offset..],
            self.stride,
            r.width() as u32,
            r.height() as u32,
        )
    }

    /// Tightly packed RGBA copy for preview consumers.
    ///
    /// When `source_is_rgba` is set the bytes are already in R,G,B,A order
    /// (shared-texture frames) and are copied straight through.
    pub fn to_rgba8(&self, source_is_rgba: bool) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.pixel_count() * BYTES_PER_PIXEL);
        for y in 0..self.height {
            for px in self.row(y).chunks_exact(BYTES_PER_PIXEL) {
                if source_is_rgba {
                    out.extend_from_slice(px);
                } else {
                    out.extend_from_slice(&[px[2], px[1], px[0], px[3]]);
                }
            }
        }
        out
    }
}

// ── Tests ────────────────────────────────────────────────────────
