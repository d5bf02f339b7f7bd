//! Direct screen-memory blit via GDI.
//!
//! Fallback for machines where display duplication is unavailable (RDP
//! sessions, some virtual GPUs). Every call builds and destroys its own
//! device contexts, so there is no session to rebuild and nothing to
//! retry: a failed blit is terminal for that call only.

use tracing::debug;

use crate::capture::CaptureSource;
use crate::capture::types::{CaptureRegion, PixelBuffer, SourceKind};
#[cfg(not(target_os = "windows"))]
use crate::error::CaptureError;

/// Stateless GDI screen capturer.
#[derive(Debug, Default, Clone, Copy)]
pub struct RegionBlitter;

impl RegionBlitter {
    pub fn new() -> Self {
        Self
    }
}

impl CaptureSource for RegionBlitter {
    fn capture(&mut self, region: &CaptureRegion) -> PixelBuffer {
        let Some(desktop) = platform::virtual_desktop() else {
            return PixelBuffer::invalid();
        };
        let clamped = region.intersect(&desktop);
        if clamped.is_empty() {
            return PixelBuffer::invalid();
        }

        match unsafe { platform::blit(&clamped) } {
            Ok(buf) => buf,
            Err(e) => {
                debug!("screen blit failed: {e}");
                PixelBuffer::invalid()
            }
        }
    }

    fn reinitialize(&mut self) -> bool {
        platform::virtual_desktop().is_some()
    }

    fn is_healthy(&mut self) -> bool {
        platform::virtual_desktop().is_some()
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Blit
    }
}

// ── Windows implementation ───────────────────────────────────────

#[cfg(target_os = "windows")]
mod platform {
    use windows::Win32::Foundation::HWND;
    use windows::Win32::Graphics::Gdi::{
        BI_RGB, BITMAPINFO, BITMAPINFOHEADER, BitBlt, CreateCompatibleBitmap,
        CreateCompatibleDC, DIB_RGB_COLORS, DeleteDC, DeleteObject, GetDC, GetDIBits,
        ReleaseDC, SRCCOPY, SelectObject,
    };
    use windows::Win32::UI::WindowsAndMessaging::{
        GetSystemMetrics, SM_CXVIRTUALSCREEN, SM_CYVIRTUALSCREEN, SM_XVIRTUALSCREEN,
        SM_YVIRTUALSCREEN,
    };

    use crate::capture::types::{CaptureRegion, PixelBuffer};
    use crate::error::CaptureError;

    /// Bounding box of all monitors in screen coordinates.
    pub(super) fn virtual_desktop() -> Option<CaptureRegion> {
        let (x, y, w, h) = unsafe {
            (
                GetSystemMetrics(SM_XVIRTUALSCREEN),
                GetSystemMetrics(SM_YVIRTUALSCREEN),
                GetSystemMetrics(SM_CXVIRTUALSCREEN),
                GetSystemMetrics(SM_CYVIRTUALSCREEN),
            )
        };
        if w <= 0 || h <= 0 {
            return None;
        }
        Some(CaptureRegion::new(x, y, x + w, y + h))
    }

    /// Blit `region` (already inside the desktop) into a fresh buffer.
    pub(super) unsafe fn blit(region: &CaptureRegion) -> Result<PixelBuffer, CaptureError> {
        let width = region.width() as i32;
        let height = region.height() as i32;

        let screen_dc = unsafe { GetDC(HWND::default()) };
        if screen_dc.is_invalid() {
            return Err(CaptureError::Platform("GetDC(NULL) returned null".into()));
        }

        let mem_dc = unsafe { CreateCompatibleDC(screen_dc) };
        if mem_dc.is_invalid() {
            unsafe { ReleaseDC(HWND::default(), screen_dc) };
            return Err(CaptureError::Platform("CreateCompatibleDC failed".into()));
        }

        let bitmap = unsafe { CreateCompatibleBitmap(screen_dc, width, height) };
        if bitmap.is_invalid() {
            unsafe {
                let _ = DeleteDC(mem_dc);
                ReleaseDC(HWND::default(), screen_dc);
            }
            return Err(CaptureError::Platform("CreateCompatibleBitmap failed".into()));
        }

        let old = unsafe { SelectObject(mem_dc, bitmap) };
        let blitted = unsafe {
            BitBlt(
                mem_dc,
                0,
                0,
                width,
                height,
                screen_dc,
                region.left,
                region.top,
                SRCCOPY,
            )
        };

        let mut buf = PixelBuffer::new(width as u32, height as u32);
        let mut bmi = BITMAPINFO {
            bmiHeader: BITMAPINFOHEADER {
                biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                biWidth: width,
                // Negative height = top-down DIB.
                biHeight: -height,
                biPlanes: 1,
                biBitCount: 32,
                biCompression: BI_RGB.0,
                ..Default::default()
            },
            ..Default::default()
        };

        let lines = if blitted.is_ok() {
            unsafe {
                GetDIBits(
                    mem_dc,
                    bitmap,
                    0,
                    height as u32,
                    Some(buf.pixels_mut().as_mut_ptr().cast()),
                    &mut bmi,
                    DIB_RGB_COLORS,
                )
            }
        } else {
            0
        };

        unsafe {
            SelectObject(mem_dc, old);
            let _ = DeleteObject(bitmap);
            let _ = DeleteDC(mem_dc);
            ReleaseDC(HWND::default(), screen_dc);
        }

        blitted.map_err(|e| CaptureError::Platform(format!("BitBlt failed: {e}")))?;
        if lines != height {
            return Err(CaptureError::Platform(format!(
                "GetDIBits copied {lines} of {height} lines"
            )));
        }
        Ok(buf)
    }
}

// ── Non-Windows stub ─────────────────────────────────────────────

#[cfg(not(target_os = "windows"))]
mod platform {
    use super::*;

    pub(super) fn virtual_desktop() -> Option<CaptureRegion> {
        None
    }

    pub(super) unsafe fn blit(_region: &CaptureRegion) -> Result<PixelBuffer, CaptureError> {
        Err(CaptureError::Unsupported("GDI screen blit"))
    }
}

#[cfg(all(test, not(target_os = "windows")))]
mod tests {
    use super::*;

    #[test]
    fn unsupported_platform_yields_sentinel() {
        let mut blitter = RegionBlitter::new();
        assert!(!blitter.is_healthy());
        assert!(!blitter.reinitialize());
        assert!(!blitter.capture(&CaptureRegion::new(0, 0, 10, 10)).is_valid());
        assert_eq!(blitter.kind(), SourceKind::Blit);
    }
}
