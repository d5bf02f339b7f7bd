//! Spout sender registry and D3D11 texture import.
//!
//! Spout publishers advertise themselves through named shared memory:
//!
//! | Mapping              | Contents                                        |
//! |----------------------|-------------------------------------------------|
//! | `SpoutSenderNames`   | Array of NUL-padded 256-byte sender names       |
//! | `ActiveSenderName`   | One 256-byte name                               |
//! | `<sender name>`      | [`SharedTextureInfo`] (280 bytes)               |
//!
//! The texture itself is a DXGI shared handle which we open on our own
//! D3D11 device, copy into a cached staging texture, and map for reading.
//!
//! # Platform
//!
//! The registry parsers are portable. Everything that touches shared
//! memory or Direct3D is **Windows-only**; elsewhere the directory never
//! finds a publisher.

use tracing::debug;

#[cfg(not(target_os = "windows"))]
use crate::capture::shared_texture::{SenderInfo, TextureDirectory};
#[cfg(not(target_os = "windows"))]
use crate::capture::types::PixelBuffer;
#[cfg(not(target_os = "windows"))]
use crate::error::CaptureError;

/// Width of one name slot in the registry mappings.
pub const SENDER_NAME_LEN: usize = 256;

/// Slots in `SpoutSenderNames` unless the publisher raised the limit.
pub const MAX_SENDERS: usize = 10;

/// Size of the per-sender info block.
pub const SHARED_TEXTURE_INFO_LEN: usize = 280;

const FORMAT_R8G8B8A8_UNORM: u32 = 28;
const FORMAT_R8G8B8A8_UNORM_SRGB: u32 = 29;
const FORMAT_B8G8R8A8_UNORM: u32 = 87;
const FORMAT_B8G8R8X8_UNORM: u32 = 88;
const FORMAT_B8G8R8A8_UNORM_SRGB: u32 = 91;

pub const SENDER_NAMES_MAP: &str = "SpoutSenderNames";
pub const ACTIVE_SENDER_MAP: &str = "ActiveSenderName";

// ── Registry parsing ─────────────────────────────────────────────

/// Per-sender metadata block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SharedTextureInfo {
    /// 32-bit DXGI shared handle.
    pub share_handle: u32,
    pub width: u32,
    pub height: u32,
    /// `DXGI_FORMAT` value.
    pub format: u32,
}

impl SharedTextureInfo {
    /// Decode the little-endian layout:
    /// `handle, width, height, format, usage, description[256], partner`.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < SHARED_TEXTURE_INFO_LEN {
            return None;
        }
        let word = |at: usize| {
            u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
        };
        Some(Self {
            share_handle: word(0),
            width: word(4),
            height: word(8),
            format: word(12),
        })
    }

    /// Whether the texture holds four 8-bit channels per pixel, the only
    /// layout the color path can average. Older senders leave the format
    /// at zero; those always publish BGRA.
    pub fn has_8bit_channels(&self) -> bool {
        matches!(
            self.format,
            0 | FORMAT_R8G8B8A8_UNORM
                | FORMAT_R8G8B8A8_UNORM_SRGB
                | FORMAT_B8G8R8A8_UNORM
                | FORMAT_B8G8R8X8_UNORM
                | FORMAT_B8G8R8A8_UNORM_SRGB
        )
    }
}

/// Decode a NUL-padded name slot. Empty slots yield `None`.
pub fn decode_name(slot: &[u8]) -> Option<String> {
    let end = slot.iter().position(|&b| b == 0).unwrap_or(slot.len());
    if end == 0 {
        return None;
    }
    Some(String::from_utf8_lossy(&slot[..end]).into_owned())
}

/// Names listed in a `SpoutSenderNames` block, stopping at the first
/// empty slot.
pub fn parse_sender_list(bytes: &[u8]) -> Vec<String> {
    bytes
        .chunks_exact(SENDER_NAME_LEN)
        .map_while(decode_name)
        .collect()
}

/// Pick the publisher to follow: the registry's active sender when it is
/// still listed, otherwise the first listed sender.
pub fn choose_sender(active: Option<String>, listed: &[String]) -> Option<String> {
    match active {
        Some(name) if listed.iter().any(|n| *n == name) => Some(name),
        _ => {
            if let Some(first) = listed.first() {
                debug!("no usable active sender, falling back to {first}");
            }
            listed.first().cloned()
        }
    }
}

// ── SpoutDirectory ───────────────────────────────────────────────

/// [`TextureDirectory`](crate::capture::TextureDirectory) over the Spout
/// shared-memory registry.
pub struct SpoutDirectory {
    #[cfg(target_os = "windows")]
    importer: Option<platform::Importer>,
}

impl SpoutDirectory {
    pub fn new() -> Self {
        Self {
            #[cfg(target_os = "windows")]
            importer: None,
        }
    }
}

impl Default for SpoutDirectory {
    fn default() -> Self {
        Self::new()
    }
}

// ── Windows implementation ───────────────────────────────────────

#[cfg(target_os = "windows")]
mod platform {
    use std::ffi::CString;

    use windows::{
        Win32::{
            Foundation::{CloseHandle, HANDLE},
            Graphics::{
                Direct3D::D3D_DRIVER_TYPE_HARDWARE,
                Direct3D11::*,
                Dxgi::Common::{DXGI_FORMAT, DXGI_SAMPLE_DESC},
            },
            System::Memory::{FILE_MAP_READ, MapViewOfFile, OpenFileMappingA, UnmapViewOfFile},
        },
        core::PCSTR,
    };

    use super::*;
    use crate::capture::shared_texture::{SenderInfo, TextureDirectory};
    use crate::capture::types::PixelBuffer;
    use crate::error::CaptureError;

    fn platform_err(what: &str, e: windows::core::Error) -> CaptureError {
        CaptureError::Platform(format!("{what} failed: {e}"))
    }

    /// Copy `len` bytes out of the named shared-memory block.
    unsafe fn read_mapping(name: &str, len: usize) -> Option<Vec<u8>> {
        let cname = CString::new(name).ok()?;
        let handle =
            unsafe { OpenFileMappingA(FILE_MAP_READ.0, false, PCSTR(cname.as_ptr().cast())) }
                .ok()?;

        let view = unsafe { MapViewOfFile(handle, FILE_MAP_READ, 0, 0, len) };
        if view.Value.is_null() {
            let _ = unsafe { CloseHandle(handle) };
            return None;
        }
        let bytes = unsafe { std::slice::from_raw_parts(view.Value as *const u8, len) }.to_vec();

        unsafe {
            let _ = UnmapViewOfFile(view);
            let _ = CloseHandle(handle);
        }
        Some(bytes)
    }

    pub(super) fn texture_info(name: &str) -> Option<SharedTextureInfo> {
        let bytes = unsafe { read_mapping(name, SHARED_TEXTURE_INFO_LEN)? };
        SharedTextureInfo::parse(&bytes)
    }

    fn listed_senders() -> Vec<String> {
        unsafe { read_mapping(SENDER_NAMES_MAP, SENDER_NAME_LEN * MAX_SENDERS) }
            .map(|bytes| parse_sender_list(&bytes))
            .unwrap_or_default()
    }

    fn active_sender_name() -> Option<String> {
        let bytes = unsafe { read_mapping(ACTIVE_SENDER_MAP, SENDER_NAME_LEN)? };
        decode_name(&bytes)
    }

    // ── Importer ─────────────────────────────────────────────────

    /// D3D11 device plus a staging texture reused while the sender's
    /// size and format hold.
    pub(super) struct Importer {
        device: ID3D11Device,
        context: ID3D11DeviceContext,
        staging: Option<(ID3D11Texture2D, u32, u32, DXGI_FORMAT)>,
    }

    impl Importer {
        pub(super) unsafe fn create() -> Result<Self, CaptureError> {
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
            Ok(Self {
                device: device
                    .ok_or_else(|| CaptureError::Platform("D3D11 device is None".into()))?,
                context: context
                    .ok_or_else(|| CaptureError::Platform("D3D11 context is None".into()))?,
                staging: None,
            })
        }

        unsafe fn staging_for(
            &mut self,
            desc: &D3D11_TEXTURE2D_DESC,
        ) -> Result<ID3D11Texture2D, CaptureError> {
            if let Some((tex, w, h, fmt)) = &self.staging {
                if *w == desc.Width && *h == desc.Height && *fmt == desc.Format {
                    return Ok(tex.clone());
                }
            }

            let staging_desc = D3D11_TEXTURE2D_DESC {
                Width: desc.Width,
                Height: desc.Height,
                MipLevels: 1,
                ArraySize: 1,
                Format: desc.Format,
                SampleDesc: DXGI_SAMPLE_DESC {
                    Count: 1,
                    Quality: 0,
                },
                Usage: D3D11_USAGE_STAGING,
                BindFlags: 0,
                CPUAccessFlags: D3D11_CPU_ACCESS_READ.0 as u32,
                MiscFlags: 0,
            };
            let mut staging = None;
            unsafe {
                self.device
                    .CreateTexture2D(&staging_desc, None, Some(&mut staging))
                    .map_err(|e| platform_err("CreateTexture2D (staging)", e))?;
            }
            let staging =
                staging.ok_or_else(|| CaptureError::Platform("staging texture is None".into()))?;
            self.staging = Some((staging.clone(), desc.Width, desc.Height, desc.Format));
            Ok(staging)
        }

        pub(super) unsafe fn copy_into(
            &mut self,
            info: &SharedTextureInfo,
            dst: &mut PixelBuffer,
        ) -> Result<(), CaptureError> {
            let handle = HANDLE(info.share_handle as usize as *mut core::ffi::c_void);
            let shared: ID3D11Texture2D = unsafe { self.device.OpenSharedResource(handle) }
                .map_err(|e| platform_err("OpenSharedResource", e))?;

            let mut desc = D3D11_TEXTURE2D_DESC::default();
            unsafe { shared.GetDesc(&mut desc) };
            if desc.Width < dst.width() || desc.Height < dst.height() {
                return Err(CaptureError::Platform(format!(
                    "shared texture is {}x{}, expected {}x{}",
                    desc.Width,
                    desc.Height,
                    dst.width(),
                    dst.height()
                )));
            }

            let staging = unsafe { self.staging_for(&desc)? };
            unsafe { self.context.CopyResource(&staging, &shared) };

            let mut mapped = D3D11_MAPPED_SUBRESOURCE::default();
            unsafe {
                self.context
                    .Map(&staging, 0, D3D11_MAP_READ, 0, Some(&mut mapped))
                    .map_err(|e| platform_err("Map", e))?;
            }
            let pitch = mapped.RowPitch as usize;
            let src = unsafe {
                std::slice::from_raw_parts(mapped.pData as *const u8, pitch * desc.Height as usize)
            };
            let copied = dst.fill_from_rows(src, pitch);
            unsafe { self.context.Unmap(&staging, 0) };

            if copied {
                Ok(())
            } else {
                Err(CaptureError::Platform("mapped texture too small".into()))
            }
        }
    }

    impl TextureDirectory for SpoutDirectory {
        fn active_sender(&mut self) -> Result<SenderInfo, CaptureError> {
            let listed = listed_senders();
            let name = choose_sender(active_sender_name(), &listed)
                .ok_or(CaptureError::NoPublisher)?;
            self.sender_info(&name).ok_or(CaptureError::NoPublisher)
        }

        fn sender_info(&mut self, name: &str) -> Option<SenderInfo> {
            let info = texture_info(name)?;
            Some(SenderInfo {
                name: name.to_string(),
                width: info.width,
                height: info.height,
            })
        }

        fn read_frame(
            &mut self,
            sender: &SenderInfo,
            dst: &mut PixelBuffer,
        ) -> Result<(), CaptureError> {
            let info = texture_info(&sender.name).ok_or(CaptureError::NoPublisher)?;
            if !info.has_8bit_channels() {
                return Err(CaptureError::Platform(format!(
                    "sender {} publishes DXGI format {}, expected 8-bit RGBA/BGRA",
                    sender.name, info.format
                )));
            }
            if self.importer.is_none() {
                self.importer = Some(unsafe { Importer::create()? });
            }
            let importer = self.importer.as_mut().ok_or(CaptureError::NotInitialized)?;
            unsafe { importer.copy_into(&info, dst) }
        }

        fn close(&mut self) {
            self.importer = None;
        }
    }
}

// ── Non-Windows stub ─────────────────────────────────────────────

#[cfg(not(target_os = "windows"))]
impl TextureDirectory for SpoutDirectory {
    fn active_sender(&mut self) -> Result<SenderInfo, CaptureError> {
        Err(CaptureError::Unsupported("Spout shared textures"))
    }

    fn sender_info(&mut self, _name: &str) -> Option<SenderInfo> {
        None
    }

    fn read_frame(
        &mut self,
        _sender: &SenderInfo,
        _dst: &mut PixelBuffer,
    ) -> Result<(), CaptureError> {
        Err(CaptureError::Unsupported("Spout shared textures"))
    }

    fn close(&mut self) {}
}

// ── Tests ────────────────────────────────────────────────────────
