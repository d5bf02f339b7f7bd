//! DXGI Desktop Duplication session for Windows.
//!
//! Implements [`DuplicationBackend`] with the Direct3D 11 Desktop
//! Duplication API:
//!
//! 1. Create a D3D11 device.
//! 2. Enumerate outputs and duplicate the target monitor.
//! 3. Create a CPU-readable staging texture sized to the full output.
//! 4. On each [`copy_region`](DuplicationBackend::copy_region):
//!    - `AcquireNextFrame` (blocks up to the timeout).
//!    - Copy the desktop texture to the staging texture.
//!    - Map, copy the requested rows out, unmap.
//!
//! # Platform
//!
//! This module is **Windows-only**. On other platforms `open` fails with
//! [`CaptureError::Unsupported`].

#[cfg(not(target_os = "windows"))]
use crate::capture::duplicator::DuplicationBackend;
#[cfg(not(target_os = "windows"))]
use crate::capture::types::{CaptureRegion, PixelBuffer, SurfaceSize};
#[cfg(not(target_os = "windows"))]
use crate::error::CaptureError;

/// DXGI-backed duplication of one monitor.
///
/// All handles live in a single `Session` value, created by `open` and
/// dropped by `close`, so the device, duplication and staging texture
/// always belong together.
pub struct DxgiDuplication {
    /// Monitor index (0 = primary).
    monitor_index: u32,
    #[cfg(target_os = "windows")]
    session: Option<platform::Session>,
}

impl DxgiDuplication {
    pub fn new(monitor_index: u32) -> Self {
        Self {
            monitor_index,
            #[cfg(target_os = "windows")]
            session: None,
        }
    }

    pub fn monitor_index(&self) -> u32 {
        self.monitor_index
    }
}

// ── Windows implementation ───────────────────────────────────────

#[cfg(target_os = "windows")]
mod platform {
    use std::time::Duration;

    use windows::{
        Win32::Graphics::{
            Direct3D::D3D_DRIVER_TYPE_HARDWARE,
            Direct3D11::*,
            Dxgi::{Common::*, *},
        },
        core::Interface,
    };

    use super::DxgiDuplication;
    use crate::capture::duplicator::DuplicationBackend;
    use crate::capture::types::{BYTES_PER_PIXEL, CaptureRegion, PixelBuffer, SurfaceSize};
    use crate::error::CaptureError;

    pub(super) struct Session {
        width: u32,
        height: u32,
        context: ID3D11DeviceContext,
        duplication: IDXGIOutputDuplication,
        staging_texture: ID3D11Texture2D,
        // Held so the device outlives the objects created from it.
        _device: ID3D11Device,
    }

    fn platform_err(what: &str, e: windows::core::Error) -> CaptureError {
        CaptureError::Platform(format!("{what} failed: {e}"))
    }

    unsafe fn open_session(monitor_index: u32) -> Result<Session, CaptureError> {
        // 1. Create D3D11 device + immediate context.
        let mut device = None;
        let mut context = None;
        unsafe {
            D3D11CreateDevice(
                None,
                D3D_DRIVER_TYPE_HARDWARE,
                None,
                D3D11_CREATE_DEVICE_BGRA_SUPPORT,
                None,
                D3D11_SDK_VERSION,
                Some(&mut device),
                None,
                Some(&mut context),
            )
            .map_err(|e| platform_err("D3D11CreateDevice", e))?;
        }
        let device =
            device.ok_or_else(|| CaptureError::Platform("D3D11 device is None".into()))?;
        let context =
            context.ok_or_else(|| CaptureError::Platform("D3D11 context is None".into()))?;

        // 2. Device → Adapter → Output.
        let dxgi_device: IDXGIDevice = device
            .cast()
            .map_err(|e| platform_err("cast to IDXGIDevice", e))?;
        let adapter = unsafe {
            dxgi_device
                .GetAdapter()
                .map_err(|e| platform_err("GetAdapter", e))?
        };
        let output: IDXGIOutput = unsafe {
            adapter
                .EnumOutputs(monitor_index)
                .map_err(|e| platform_err("EnumOutputs", e))?
        };

        // 3. Duplicate the output.
        let output1: IDXGIOutput1 = output
            .cast()
            .map_err(|e| platform_err("cast to IDXGIOutput1", e))?;
        let duplication = unsafe {
            output1
                .DuplicateOutput(&device)
                .map_err(|e| platform_err("DuplicateOutput", e))?
        };

        let dup_desc = unsafe { duplication.GetDesc() };
        let width = dup_desc.ModeDesc.Width;
        let height = dup_desc.ModeDesc.Height;

        // 4. CPU-readable staging texture covering the whole output.
        let staging_desc = D3D11_TEXTURE2D_DESC {
            Width: width,
            Height: height,
            MipLevels: 1,
            ArraySize: 1,
            Format: DXGI_FORMAT_B8G8R8A8_UNORM,
            SampleDesc: DXGI_SAMPLE_DESC {
                Count: 1,
                Quality: 0,
            },
            Usage: D3D11_USAGE_STAGING,
            BindFlags: 0,
            CPUAccessFlags: D3D11_CPU_ACCESS_READ.0 as u32,
            MiscFlags: 0,
        };
        let mut staging_texture = None;
        unsafe {
            device
                .CreateTexture2D(&staging_desc, None, Some(&mut staging_texture))
                .map_err(|e| platform_err("CreateTexture2D (staging)", e))?;
        }
        let staging_texture = staging_texture
            .ok_or_else(|| CaptureError::Platform("staging texture is None".into()))?;

        Ok(Session {
            width,
            height,
            context,
            duplication,
            staging_texture,
            _device: device,
        })
    }

    impl Session {
        unsafe fn copy_region(
            &mut self,
            region: &CaptureRegion,
            timeout: Duration,
        ) -> Result<PixelBuffer, CaptureError> {
            let timeout_ms = timeout.as_millis().min(u32::MAX as u128) as u32;
            let mut frame_info = DXGI_OUTDUPL_FRAME_INFO::default();
            let mut resource = None;

            match unsafe {
                self.duplication
                    .AcquireNextFrame(timeout_ms, &mut frame_info, &mut resource)
            } {
                Ok(()) => {}
                Err(e) if e.code() == DXGI_ERROR_WAIT_TIMEOUT => {
                    return Err(CaptureError::Timeout(timeout));
                }
                Err(e) => {
                    return Err(CaptureError::SessionLost(format!("AcquireNextFrame: {e}")));
                }
            }

            let result = unsafe { self.copy_acquired(resource, region) };
            // Release the DXGI frame whatever happened above.
            let _ = unsafe { self.duplication.ReleaseFrame() };
            result
        }

        unsafe fn copy_acquired(
            &mut self,
            resource: Option<IDXGIResource>,
            region: &CaptureRegion,
        ) -> Result<PixelBuffer, CaptureError> {
            let resource = resource
                .ok_or_else(|| CaptureError::Platform("acquired resource is None".into()))?;
            let texture: ID3D11Texture2D = resource
                .cast()
                .map_err(|e| platform_err("cast to ID3D11Texture2D", e))?;

            unsafe {
                self.context.CopyResource(&self.staging_texture, &texture);
            }

            let mut mapped = D3D11_MAPPED_SUBRESOURCE::default();
            unsafe {
                self.context
                    .Map(&self.staging_texture, 0, D3D11_MAP_READ, 0, Some(&mut mapped))
                    .map_err(|e| platform_err("Map", e))?;
            }

            let pitch = mapped.RowPitch as usize;
            let total = pitch * self.height as usize;
            let src = unsafe { std::slice::from_raw_parts(mapped.pData as *const u8, total) };
            let offset = region.top as usize * pitch + region.left as usize * BYTES_PER_PIXEL;
            let buf = PixelBuffer::from_rows(
                &src[offset..],
                pitch,
                region.width() as u32,
                region.height() as u32,
            );

            unsafe { self.context.Unmap(&self.staging_texture, 0) };
            Ok(buf)
        }
    }

    impl DuplicationBackend for DxgiDuplication {
        fn open(&mut self) -> Result<SurfaceSize, CaptureError> {
            self.session = None;
            let session = unsafe { open_session(self.monitor_index)? };
            let size = SurfaceSize {
                width: session.width,
                height: session.height,
            };
            self.session = Some(session);
            Ok(size)
        }

        fn copy_region(
            &mut self,
            region: &CaptureRegion,
            timeout: Duration,
        ) -> Result<PixelBuffer, CaptureError> {
            let session = self.session.as_mut().ok_or(CaptureError::NotInitialized)?;
            unsafe { session.copy_region(region, timeout) }
        }

        fn close(&mut self) {
            self.session = None;
        }
    }
}

// ── Non-Windows stub ─────────────────────────────────────────────

#[cfg(not(target_os = "windows"))]
impl DuplicationBackend for DxgiDuplication {
    fn open(&mut self) -> Result<SurfaceSize, CaptureError> {
        Err(CaptureError::Unsupported("DXGI desktop duplication"))
    }

    fn copy_region(
        &mut self,
        _region: &CaptureRegion,
        _timeout: std::time::Duration,
    ) -> Result<PixelBuffer, CaptureError> {
        Err(CaptureError::Unsupported("DXGI desktop duplication"))
    }

    fn close(&mut self) {}
}

#[cfg(all(test, not(target_os = "windows")))]
mod tests {
    use super::*;
    use crate::capture::{CaptureSource, RegionDuplicator};

    #[test]
    fn unsupported_platform_yields_sentinel() {
        let mut dup = RegionDuplicator::new(DxgiDuplication::new(0));
        assert!(!dup.reinitialize());
        assert!(!dup.capture(&CaptureRegion::new(0, 0, 100, 100)).is_valid());
        assert_eq!(dup.backend().monitor_index(), 0);
    }
}
