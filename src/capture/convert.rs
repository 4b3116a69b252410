//! Surface-to-bitmap conversion
//!
//! The platform copies a captured GPU surface into CPU-readable memory and
//! exposes it as a [`SurfaceView`]. [`normalize`] turns any supported native
//! layout into a [`PixelBuffer`] of exactly the size the capture target had
//! when the session was created.
//!
//! | Surface format | Handling |
//! |---|---|
//! | `Bgra8`, `Bgra8Srgb` | row copy, stride padding dropped |
//! | `Bgrx8` | row copy, alpha forced to 255 |
//! | `Rgba8`, `Rgba8Srgb` | red/blue swizzle |
//! | `Rgba16Float` | half-float clamped to 8 bits, swizzled |
//!
//! When the surface is larger than expected it is cropped; when it is
//! smaller the remainder stays transparent black.

use super::{
    CapturePlatform,
    pixel_buffer::{BYTES_PER_PIXEL, PixelBuffer, premultiply},
    session::CapturedFrame,
};
use crate::{
    error::{CaptureError, CaptureResult},
    model::{AlphaMode, Size, SurfaceFormat},
};

/// CPU-mapped view of a captured surface
#[derive(Debug, Clone, Copy)]
pub struct SurfaceView<'a> {
    /// Native pixel layout
    pub format: SurfaceFormat,
    /// How to read the alpha channel
    pub alpha:  AlphaMode,
    /// Width in pixels
    pub width:  u32,
    /// Height in pixels
    pub height: u32,
    /// Bytes between the starts of consecutive rows
    pub stride: usize,
    /// Mapped memory, at least `stride * (height - 1) + width * bpp` bytes
    pub bytes:  &'a [u8],
}

/// Copies a captured frame into a new [`PixelBuffer`] of size `expected`
///
/// The frame borrows its session, so this always runs before the frame pool
/// is disposed.
pub fn convert_frame<P: CapturePlatform>(
    frame: &CapturedFrame<'_, P>,
    expected: Size,
) -> CaptureResult<PixelBuffer> {
    frame.map_surface(|view| normalize(&view, expected))
}

/// Normalizes a mapped surface to BGRA8 premultiplied
pub fn normalize(view: &SurfaceView<'_>, expected: Size) -> CaptureResult<PixelBuffer> {
    if expected.is_empty() {
        return Err(CaptureError::Conversion {
            reason: format!("expected size {} has no area", expected),
        });
    }

    let bpp = view.format.bytes_per_pixel().ok_or_else(|| CaptureError::Conversion {
        reason: format!("unsupported surface format {:?}", view.format),
    })?;

    let row_len = view.width as usize * bpp;
    if view.stride < row_len {
        return Err(CaptureError::Conversion {
            reason: format!("row pitch {} is smaller than a {}-byte row", view.stride, row_len),
        });
    }

    let needed = match view.height {
        0 => 0,
        h => view.stride * (h as usize - 1) + row_len,
    };
    if view.bytes.len() < needed {
        return Err(CaptureError::Conversion {
            reason: format!(
                "mapped surface holds {} bytes, {}x{} needs {}",
                view.bytes.len(),
                view.width,
                view.height,
                needed
            ),
        });
    }

    if view.width != expected.width || view.height != expected.height {
        tracing::debug!(
            "Surface {}x{} differs from target {}, cropping/padding",
            view.width,
            view.height,
            expected
        );
    }

    let mut out = PixelBuffer::zeroed(expected);
    let out_stride = out.stride();
    let copy_w = view.width.min(expected.width) as usize;
    let copy_h = view.height.min(expected.height) as usize;
    let dst = out.as_bytes_mut();

    for y in 0..copy_h {
        let src_start = y * view.stride;
        let src_row = &view.bytes[src_start..src_start + copy_w * bpp];
        let dst_start = y * out_stride;
        let dst_row = &mut dst[dst_start..dst_start + copy_w * BYTES_PER_PIXEL];
        convert_row(view.format, view.alpha, src_row, dst_row);
    }

    Ok(out)
}

fn convert_row(format: SurfaceFormat, alpha: AlphaMode, src: &[u8], dst: &mut [u8]) {
    let dst = dst.chunks_exact_mut(BYTES_PER_PIXEL);
    match format {
        SurfaceFormat::Bgra8 | SurfaceFormat::Bgra8Srgb => {
            for (s, d) in src.chunks_exact(4).zip(dst) {
                store(d, [s[0], s[1], s[2], s[3]], alpha);
            }
        }
        SurfaceFormat::Bgrx8 => {
            for (s, d) in src.chunks_exact(4).zip(dst) {
                store(d, [s[0], s[1], s[2], 255], AlphaMode::Ignore);
            }
        }
        SurfaceFormat::Rgba8 | SurfaceFormat::Rgba8Srgb => {
            for (s, d) in src.chunks_exact(4).zip(dst) {
                store(d, [s[2], s[1], s[0], s[3]], alpha);
            }
        }
        SurfaceFormat::Rgba16Float => {
            for (s, d) in src.chunks_exact(8).zip(dst) {
                let channel = |i: usize| unorm8(half_to_f32(u16::from_le_bytes([s[i], s[i + 1]])));
                store(d, [channel(4), channel(2), channel(0), channel(6)], alpha);
            }
        }
        // rejected earlier by bytes_per_pixel
        SurfaceFormat::Other(_) => {}
    }
}

fn store(dst: &mut [u8], [b, g, r, a]: [u8; 4], alpha: AlphaMode) {
    let px = match alpha {
        AlphaMode::Premultiplied => [b, g, r, a],
        AlphaMode::Straight => [premultiply(b, a), premultiply(g, a), premultiply(r, a), a],
        AlphaMode::Ignore => [b, g, r, 255],
    };
    dst.copy_from_slice(&px);
}

/// Decodes an IEEE 754 binary16 value
fn half_to_f32(bits: u16) -> f32 {
    let sign = if bits & 0x8000 != 0 { -1.0 } else { 1.0 };
    let exp = i32::from((bits >> 10) & 0x1F);
    let mantissa = f32::from(bits & 0x03FF);

    match exp {
        0 => sign * mantissa * 2f32.powi(-24),
        0x1F if mantissa == 0.0 => sign * f32::INFINITY,
        0x1F => f32::NAN,
        _ => sign * (1.0 + mantissa / 1024.0) * 2f32.powi(exp - 15),
    }
}

fn unorm8(v: f32) -> u8 {
    if v.is_nan() {
        return 0;
    }
    (v.clamp(0.0, 1.0) * 255.0 + 0.5) as u8
}
