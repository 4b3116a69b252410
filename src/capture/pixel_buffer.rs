//! CPU-owned BGRA8 premultiplied pixel buffer
//!
//! [`PixelBuffer`] is what the capture pipeline hands back to callers. The
//! layout is fixed: 4 bytes per pixel in B, G, R, A order, color premultiplied
//! by alpha, rows tightly packed (`stride == width * 4`).

use image::{Rgba, RgbaImage};

use crate::{
    error::{CaptureError, CaptureResult},
    model::{Region, Size},
};

/// Bytes per BGRA8 pixel
pub const BYTES_PER_PIXEL: usize = 4;

/// Pixel layout of a [`PixelBuffer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 8-bit B, G, R, A with premultiplied color
    Bgra8Premultiplied,
}

/// Captured window contents in CPU memory
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width:  u32,
    height: u32,
    data:   Vec<u8>,
}

impl PixelBuffer {
    /// Wraps tightly packed BGRA8 premultiplied bytes
    ///
    /// Fails with `InvalidParameter` when the size is zero or the byte count
    /// does not match `width * height * 4`.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> CaptureResult<Self> {
        let size = Size::new(width, height);
        if size.is_empty() {
            return Err(CaptureError::InvalidParameter {
                parameter: "size".to_string(),
                reason:    format!("pixel buffer {} has no area", size),
            });
        }

        let expected = size.area() * BYTES_PER_PIXEL;
        if data.len() != expected {
            return Err(CaptureError::InvalidParameter {
                parameter: "data".to_string(),
                reason:    format!(
                    "{} bytes do not match {} BGRA8 pixels ({} bytes)",
                    data.len(),
                    size,
                    expected
                ),
            });
        }

        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Creates a fully transparent buffer
    pub(crate) fn zeroed(size: Size) -> Self {
        Self {
            width:  size.width,
            height: size.height,
            data:   vec![0; size.area() * BYTES_PER_PIXEL],
        }
    }

    /// Builds a buffer from straight-alpha RGBA pixels
    ///
    /// Used by tests and by callers that already hold decoded images.
    pub fn from_rgba(image: &RgbaImage) -> CaptureResult<Self> {
        let mut data = Vec::with_capacity(image.as_raw().len());
        for px in image.pixels() {
            let [r, g, b, a] = px.0;
            data.extend_from_slice(&[premultiply(b, a), premultiply(g, a), premultiply(r, a), a]);
        }
        Self::new(image.width(), image.height(), data)
    }

    /// Creates an opaque gradient test pattern
    ///
    /// # Examples
    ///
    /// ```
    /// use window_snap::capture::PixelBuffer;
    ///
    /// let buf = PixelBuffer::from_test_pattern(320, 200);
    /// assert_eq!(buf.dimensions(), (320, 200));
    /// assert_eq!(buf.as_bytes().len(), 320 * 200 * 4);
    /// ```
    pub fn from_test_pattern(width: u32, height: u32) -> Self {
        let size = Size::new(width.max(1), height.max(1));
        let mut buf = Self::zeroed(size);
        let stride = buf.stride();
        for (y, row) in buf.data.chunks_exact_mut(stride).enumerate() {
            let ratio = y as f32 / size.height as f32;
            for (x, px) in row.chunks_exact_mut(BYTES_PER_PIXEL).enumerate() {
                let xr = x as f32 / size.width as f32;
                px[0] = 255;
                px[1] = (255.0 * ratio) as u8;
                px[2] = (255.0 * xr) as u8;
                px[3] = 255;
            }
        }
        buf
    }

    /// Returns `(width, height)`
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Returns the size
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes per row
    pub fn stride(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL
    }

    /// Always [`PixelFormat::Bgra8Premultiplied`]
    pub fn format(&self) -> PixelFormat {
        PixelFormat::Bgra8Premultiplied
    }

    /// Raw pixel bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Mutable raw pixel bytes
    pub(crate) fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Consumes the buffer and returns its bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// BGRA bytes of the pixel at `(x, y)`
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = y as usize * self.stride() + x as usize * BYTES_PER_PIXEL;
        let mut px = [0u8; 4];
        px.copy_from_slice(&self.data[offset..offset + BYTES_PER_PIXEL]);
        Some(px)
    }

    /// Copies out a region of interest
    ///
    /// The region must lie inside the buffer, otherwise an error is returned.
    ///
    /// # Examples
    ///
    /// ```
    /// use window_snap::{capture::PixelBuffer, model::Region};
    ///
    /// let buf = PixelBuffer::from_test_pattern(1920, 1080);
    /// let cropped = buf.crop(Region::new(100, 100, 800, 600)).unwrap();
    /// assert_eq!(cropped.dimensions(), (800, 600));
    /// ```
    pub fn crop(&self, region: Region) -> CaptureResult<Self> {
        if !region.fits_within(self.size()) {
            return Err(CaptureError::InvalidParameter {
                parameter: "crop".to_string(),
                reason:    format!(
                    "Region ({}x{} at {},{}) is empty or extends beyond image bounds ({}x{})",
                    region.width, region.height, region.x, region.y, self.width, self.height
                ),
            });
        }

        let row_bytes = region.width as usize * BYTES_PER_PIXEL;
        let mut data = Vec::with_capacity(row_bytes * region.height as usize);
        for y in region.y..region.y + region.height {
            let start = y as usize * self.stride() + region.x as usize * BYTES_PER_PIXEL;
            data.extend_from_slice(&self.data[start..start + row_bytes]);
        }

        Self::new(region.width, region.height, data)
    }

    /// Converts to a straight-alpha RGBA image for encoding
    pub fn to_rgba_image(&self) -> RgbaImage {
        RgbaImage::from_fn(self.width, self.height, |x, y| {
            let offset = y as usize * self.stride() + x as usize * BYTES_PER_PIXEL;
            let px = &self.data[offset..offset + BYTES_PER_PIXEL];
            let (b, g, r, a) = (px[0], px[1], px[2], px[3]);
            Rgba([unpremultiply(r, a), unpremultiply(g, a), unpremultiply(b, a), a])
        })
    }
}

impl std::fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format())
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Multiplies a color channel by alpha with rounding
pub(crate) fn premultiply(c: u8, a: u8) -> u8 {
    ((u16::from(c) * u16::from(a) + 127) / 255) as u8
}

/// Divides a premultiplied color channel by alpha with rounding
pub(crate) fn unpremultiply(c: u8, a: u8) -> u8 {
    match a {
        0 => 0,
        255 => c,
        _ => ((u32::from(c) * 255 + u32::from(a) / 2) / u32::from(a)).min(255) as u8,
    }
}
