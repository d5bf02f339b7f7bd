//! Frame reduction: bounded bilinear downscale, then a channel average.

use crate::capture::types::{BYTES_PER_PIXEL, CaptureRegion, PixelBuffer, SourceKind};
use crate::color::sample::ColorSample;

/// Largest edge a frame is reduced to before averaging.
pub const DEFAULT_MAX_DIMENSION: u32 = 100;

/// Reduce `buffer` so neither edge exceeds `max_dimension`.
///
/// Frames already within the cap are copied unchanged. Otherwise every
/// destination pixel blends its four nearest source pixels, alpha
/// included, and truncates to `u8`.
pub fn downscale(buffer: &PixelBuffer, max_dimension: u32) -> PixelBuffer {
    if !buffer.is_valid() {
        return PixelBuffer::invalid();
    }
    let (w, h) = (buffer.width(), buffer.height());
    if w <= max_dimension && h <= max_dimension {
        return buffer.clone();
    }

    let scale = (max_dimension as f32 / w as f32).min(max_dimension as f32 / h as f32);
    let new_w = (w as f32 * scale) as u32;
    let new_h = (h as f32 * scale) as u32;
    let mut out = PixelBuffer::new(new_w, new_h);
    if !out.is_valid() {
        return out;
    }

    let src = buffer.pixels();
    let stride = buffer.stride();
    let out_stride = out.stride();
    let dst = out.pixels_mut();

    for y in 0..new_h {
        let sy = y as f32 / scale;
        let y1 = (sy as u32).min(h - 1);
        let y2 = (y1 + 1).min(h - 1);
        let dy = sy - y1 as f32;

        for x in 0..new_w {
            let sx = x as f32 / scale;
            let x1 = (sx as u32).min(w - 1);
            let x2 = (x1 + 1).min(w - 1);
            let dx = sx - x1 as f32;

            let at = |px: u32, py: u32| py as usize * stride + px as usize * BYTES_PER_PIXEL;
            let (p11, p12) = (at(x1, y1), at(x2, y1));
            let (p21, p22) = (at(x1, y2), at(x2, y2));
            let o = y as usize * out_stride + x as usize * BYTES_PER_PIXEL;

            for c in 0..BYTES_PER_PIXEL {
                let top = lerp(src[p11 + c], src[p12 + c], dx);
                let bottom = lerp(src[p21 + c], src[p22 + c], dx);
                dst[o + c] = (top + (bottom - top) * dy) as u8;
            }
        }
    }
    out
}

fn lerp(a: u8, b: u8, t: f32) -> f32 {
    a as f32 + (b as f32 - a as f32) * t
}

/// Mean color of `buffer`; black for an invalid buffer.
///
/// Shared-texture frames carry R and B reversed, so `kind` decides the
/// channel order.
pub fn average_color(buffer: &PixelBuffer, kind: SourceKind) -> ColorSample {
    if !buffer.is_valid() || buffer.pixel_count() == 0 {
        return ColorSample::BLACK;
    }

    let (mut r, mut g, mut b) = (0u64, 0u64, 0u64);
    for y in 0..buffer.height() {
        for px in buffer.row(y).chunks_exact(BYTES_PER_PIXEL) {
            b += px[0] as u64;
            g += px[1] as u64;
            r += px[2] as u64;
        }
    }

    let denom = (buffer.pixel_count() as u64 * 255) as f32;
    let (mut r, g, mut b) = (r as f32 / denom, g as f32 / denom, b as f32 / denom);
    if kind.swaps_red_blue() {
        std::mem::swap(&mut r, &mut b);
    }
    ColorSample::new(r, g, b)
}

// ── ColorExtractor ───────────────────────────────────────────────

/// Crop, downscale and average in one call.
#[derive(Debug, Clone, Copy)]
pub struct ColorExtractor {
    max_dimension: u32,
}

impl ColorExtractor {
    pub fn new(max_dimension: u32) -> Self {
        Self {
            max_dimension: max_dimension.max(1),
        }
    }

    pub fn max_dimension(&self) -> u32 {
        self.max_dimension
    }

    /// Average color of `buffer`, optionally restricted to `crop`
    /// (frame-relative). An empty crop result gives black.
    pub fn extract(
        &self,
        buffer: &PixelBuffer,
        crop: Option<&CaptureRegion>,
        kind: SourceKind,
    ) -> ColorSample {
        let reduced = match crop {
            Some(region) => downscale(&buffer.crop(region), self.max_dimension),
            None => downscale(buffer, self.max_dimension),
        };
        average_color(&reduced, kind)
    }
}

impl Default for ColorExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DIMENSION)
    }
}
