//! Data models and type definitions for window-snap
//!
//! This module defines the plain value types shared by the capture pipeline:
//! - Window handles, sizes and crop regions
//! - GPU driver kinds and Direct3D feature levels
//! - Native surface formats and alpha interpretation
//! - `CaptureOptions`, the serde-loadable per-capture configuration

use std::{fmt, path::Path, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    capture::constants,
    error::{CaptureError, CaptureResult},
};

/// Opaque identifier of a top-level window (an HWND on Windows)
///
/// Parsed from decimal (`657930`) or hexadecimal (`0xA0A0A`) text, matching
/// how window inspectors usually print handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowHandle(pub isize);

impl WindowHandle {
    /// Returns the raw handle value
    pub fn raw(self) -> isize {
        self.0
    }

    /// Returns true for the null handle, which never names a window
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:X}", self.0)
    }
}

impl FromStr for WindowHandle {
    type Err = CaptureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let parsed = match trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
            Some(hex) => isize::from_str_radix(hex, 16),
            None => trimmed.parse::<isize>(),
        };

        parsed.map(WindowHandle).map_err(|e| CaptureError::InvalidParameter {
            parameter: "window".to_string(),
            reason:    format!("'{}' is not a window handle: {}", s, e),
        })
    }
}

/// Width and height in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    /// Width in pixels
    pub width:  u32,
    /// Height in pixels
    pub height: u32,
}

impl Size {
    /// Creates a new size
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns true if either dimension is zero
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Number of pixels covered by this size
    pub fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Rectangular region of interest inside a captured frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    /// Left edge in pixels
    pub x:      u32,
    /// Top edge in pixels
    pub y:      u32,
    /// Width in pixels
    pub width:  u32,
    /// Height in pixels
    pub height: u32,
}

impl Region {
    /// Creates a new region
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Returns true if the region lies entirely inside `bounds`
    pub fn fits_within(&self, bounds: Size) -> bool {
        self.width > 0
            && self.height > 0
            && u64::from(self.x) + u64::from(self.width) <= u64::from(bounds.width)
            && u64::from(self.y) + u64::from(self.height) <= u64::from(bounds.height)
    }
}

impl FromStr for Region {
    type Err = CaptureError;

    /// Parses `X,Y,W,H`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: String| CaptureError::InvalidParameter {
            parameter: "crop".to_string(),
            reason,
        };

        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(invalid(format!("expected X,Y,W,H but got '{}'", s)));
        }

        let mut values = [0u32; 4];
        for (value, part) in values.iter_mut().zip(&parts) {
            *value = part
                .parse()
                .map_err(|e| invalid(format!("'{}' is not a pixel offset: {}", part, e)))?;
        }

        Ok(Region::new(values[0], values[1], values[2], values[3]))
    }
}

/// Kind of rendering driver backing a GPU device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    /// Hardware-accelerated adapter
    Hardware,
    /// Software rasterizer (WARP)
    Software,
}

impl DriverKind {
    /// Returns the driver kind as a lowercase string
    pub fn as_str(&self) -> &'static str {
        match self {
            DriverKind::Hardware => "hardware",
            DriverKind::Software => "software",
        }
    }
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Direct3D feature level, ordered from oldest to newest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FeatureLevel {
    /// Direct3D 9.1
    Level9_1,
    /// Direct3D 9.2
    Level9_2,
    /// Direct3D 9.3
    Level9_3,
    /// Direct3D 10.0
    Level10_0,
    /// Direct3D 10.1
    Level10_1,
    /// Direct3D 11.0
    Level11_0,
    /// Direct3D 11.1
    Level11_1,
}

impl FeatureLevel {
    /// Every level the device factory requests, best first
    pub const DESCENDING: [FeatureLevel; 7] = [
        FeatureLevel::Level11_1,
        FeatureLevel::Level11_0,
        FeatureLevel::Level10_1,
        FeatureLevel::Level10_0,
        FeatureLevel::Level9_3,
        FeatureLevel::Level9_2,
        FeatureLevel::Level9_1,
    ];

    /// Returns the level in `major_minor` notation
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureLevel::Level9_1 => "9_1",
            FeatureLevel::Level9_2 => "9_2",
            FeatureLevel::Level9_3 => "9_3",
            FeatureLevel::Level10_0 => "10_0",
            FeatureLevel::Level10_1 => "10_1",
            FeatureLevel::Level11_0 => "11_0",
            FeatureLevel::Level11_1 => "11_1",
        }
    }
}

impl fmt::Display for FeatureLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Pixel layout of a native GPU surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceFormat {
    /// 8-bit BGRA
    Bgra8,
    /// 8-bit BGRA with sRGB transfer
    Bgra8Srgb,
    /// 8-bit BGR with an unused fourth byte
    Bgrx8,
    /// 8-bit RGBA
    Rgba8,
    /// 8-bit RGBA with sRGB transfer
    Rgba8Srgb,
    /// 16-bit half-float RGBA (HDR surfaces)
    Rgba16Float,
    /// Any layout the converter does not understand, carrying the native code
    Other(u32),
}

impl SurfaceFormat {
    /// Bytes per pixel, `None` for unknown formats
    pub fn bytes_per_pixel(&self) -> Option<usize> {
        match self {
            SurfaceFormat::Bgra8
            | SurfaceFormat::Bgra8Srgb
            | SurfaceFormat::Bgrx8
            | SurfaceFormat::Rgba8
            | SurfaceFormat::Rgba8Srgb => Some(4),
            SurfaceFormat::Rgba16Float => Some(8),
            SurfaceFormat::Other(_) => None,
        }
    }
}

/// How the alpha channel of a native surface is to be interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlphaMode {
    /// Color channels are already multiplied by alpha
    Premultiplied,
    /// Color channels are independent of alpha
    Straight,
    /// Alpha carries no meaning; the pixel is opaque
    Ignore,
}

/// PNG compression effort
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PngCompression {
    /// Fastest encode, largest file
    Fast,
    /// Balanced
    #[default]
    Default,
    /// Smallest file, slowest encode
    Best,
}

impl FromStr for PngCompression {
    type Err = CaptureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fast" => Ok(PngCompression::Fast),
            "default" => Ok(PngCompression::Default),
            "best" => Ok(PngCompression::Best),
            other => Err(CaptureError::InvalidParameter {
                parameter: "compression".to_string(),
                reason:    format!("'{}' is not one of fast, default, best", other),
            }),
        }
    }
}

/// Per-capture configuration
///
/// Every field has a default, so a JSON file only needs the keys it wants to
/// change:
///
/// ```
/// use window_snap::model::CaptureOptions;
///
/// let opts = CaptureOptions::from_json_str(r#"{ "timeout_ms": 2500, "cursor": true }"#).unwrap();
/// assert_eq!(opts.timeout_ms, 2500);
/// assert!(opts.cursor);
/// assert!(!opts.border);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CaptureOptions {
    /// How long to wait for the first frame
    pub timeout_ms:        u64,
    /// Extra time granted to session teardown after a frame wait gives up
    pub teardown_grace_ms: u64,
    /// Include the mouse cursor in the frame
    pub cursor:            bool,
    /// Draw the yellow capture border around the target
    pub border:            bool,
    /// PNG compression effort
    pub compression:       PngCompression,
    /// Optional region of interest applied after conversion
    pub crop:              Option<Region>,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            timeout_ms:        constants::capture_timeout_ms(),
            teardown_grace_ms: constants::teardown_grace_ms(),
            cursor:            false,
            border:            false,
            compression:       PngCompression::Default,
            crop:              None,
        }
    }
}

impl CaptureOptions {
    /// Creates a builder starting from the defaults
    pub fn builder() -> CaptureOptionsBuilder {
        CaptureOptionsBuilder::default()
    }

    /// Parses options from a JSON document
    pub fn from_json_str(json: &str) -> CaptureResult<Self> {
        let opts: CaptureOptions =
            serde_json::from_str(json).map_err(|e| CaptureError::InvalidParameter {
                parameter: "config".to_string(),
                reason:    e.to_string(),
            })?;
        opts.validate()?;
        Ok(opts)
    }

    /// Reads and parses options from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> CaptureResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| CaptureError::InvalidParameter {
            parameter: "config".to_string(),
            reason:    format!("cannot read {}: {}", path.display(), e),
        })?;
        Self::from_json_str(&text)
    }

    /// Frame wait deadline
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Teardown grace period
    pub fn teardown_grace(&self) -> Duration {
        Duration::from_millis(self.teardown_grace_ms)
    }

    /// Checks option values that serde alone cannot reject
    pub fn validate(&self) -> CaptureResult<()> {
        if self.timeout_ms == 0 {
            return Err(CaptureError::InvalidParameter {
                parameter: "timeout_ms".to_string(),
                reason:    "must be greater than zero".to_string(),
            });
        }
        match self.crop {
            Some(crop) if crop.width == 0 || crop.height == 0 => Err(CaptureError::InvalidParameter {
                parameter: "crop".to_string(),
                reason:    format!("region {}x{} has no area", crop.width, crop.height),
            }),
            _ => Ok(()),
        }
    }
}

/// Builder for [`CaptureOptions`]
#[derive(Debug, Clone, Default)]
pub struct CaptureOptionsBuilder {
    opts: CaptureOptions,
}

impl CaptureOptionsBuilder {
    /// Sets the frame wait deadline in milliseconds
    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.opts.timeout_ms = timeout_ms;
        self
    }

    /// Sets the teardown grace period in milliseconds
    pub fn teardown_grace_ms(mut self, grace_ms: u64) -> Self {
        self.opts.teardown_grace_ms = grace_ms;
        self
    }

    /// Enables or disables cursor capture
    pub fn cursor(mut self, cursor: bool) -> Self {
        self.opts.cursor = cursor;
        self
    }

    /// Enables or disables the capture border
    pub fn border(mut self, border: bool) -> Self {
        self.opts.border = border;
        self
    }

    /// Sets PNG compression effort
    pub fn compression(mut self, compression: PngCompression) -> Self {
        self.opts.compression = compression;
        self
    }

    /// Sets the region of interest
    pub fn crop(mut self, region: Region) -> Self {
        self.opts.crop = Some(region);
        self
    }

    /// Finishes the builder
    pub fn build(self) -> CaptureOptions {
        self.opts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========== WindowHandle Tests ==========

    #[test]
    fn test_window_handle_parse_decimal() {
        let handle: WindowHandle = "657930".parse().unwrap();
        assert_eq!(handle, WindowHandle(657930));
    }

    #[test]
    fn test_window_handle_parse_hex() {
        let handle: WindowHandle = "0xA0A0A".parse().unwrap();
        assert_eq!(handle, WindowHandle(0xA0A0A));
        assert_eq!(handle.to_string(), "0xA0A0A");
    }

    #[test]
    fn test_window_handle_parse_garbage() {
        let err = "notepad".parse::<WindowHandle>().unwrap_err();
        assert!(matches!(err, CaptureError::InvalidParameter { ref parameter, .. } if parameter == "window"));
    }

    #[test]
    fn test_window_handle_null() {
        assert!(WindowHandle(0).is_null());
        assert!(!WindowHandle(42).is_null());
    }

    // ========== Size / Region Tests ==========

    #[test]
    fn test_size_empty() {
        assert!(Size::new(0, 10).is_empty());
        assert!(Size::new(10, 0).is_empty());
        assert!(!Size::new(1, 1).is_empty());
        assert_eq!(Size::new(640, 480).area(), 307_200);
    }

    #[test]
    fn test_region_parse() {
        let region: Region = "10, 20, 300,400".parse().unwrap();
        assert_eq!(region, Region::new(10, 20, 300, 400));
    }

    #[test]
    fn test_region_parse_wrong_arity() {
        assert!("1,2,3".parse::<Region>().is_err());
        assert!("1,2,3,x".parse::<Region>().is_err());
    }

    #[test]
    fn test_region_fits_within() {
        let bounds = Size::new(100, 50);
        assert!(Region::new(0, 0, 100, 50).fits_within(bounds));
        assert!(!Region::new(1, 0, 100, 50).fits_within(bounds));
        assert!(!Region::new(0, 0, 0, 10).fits_within(bounds));
        assert!(!Region::new(u32::MAX, 0, 2, 2).fits_within(bounds));
    }

    // ========== FeatureLevel Tests ==========

    #[test]
    fn test_feature_levels_descending() {
        let levels = FeatureLevel::DESCENDING;
        assert!(levels.windows(2).all(|w| w[0] > w[1]));
        assert_eq!(levels[0].to_string(), "11_1");
        assert_eq!(levels[6].to_string(), "9_1");
    }

    // ========== CaptureOptions Tests ==========

    #[test]
    fn test_options_from_json_partial() {
        let opts = CaptureOptions::from_json_str(
            r#"{ "border": true, "compression": "best", "crop": { "x": 1, "y": 2, "width": 3, "height": 4 } }"#,
        )
        .unwrap();
        assert!(opts.border);
        assert_eq!(opts.compression, PngCompression::Best);
        assert_eq!(opts.crop, Some(Region::new(1, 2, 3, 4)));
        assert_eq!(opts.timeout_ms, constants::capture_timeout_ms());
    }

    #[test]
    fn test_options_from_json_rejects_unknown_keys() {
        let err = CaptureOptions::from_json_str(r#"{ "scale": 2.0 }"#).unwrap_err();
        assert!(err.to_string().contains("config"));
    }

    #[test]
    fn test_options_rejects_zero_timeout() {
        let err = CaptureOptions::from_json_str(r#"{ "timeout_ms": 0 }"#).unwrap_err();
        assert!(matches!(err, CaptureError::InvalidParameter { ref parameter, .. } if parameter == "timeout_ms"));
    }

    #[test]
    fn test_options_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("options.json");
        std::fs::write(&path, r#"{ "cursor": true, "timeout_ms": 900 }"#).unwrap();

        let opts = CaptureOptions::from_json_file(&path).unwrap();
        assert!(opts.cursor);
        assert_eq!(opts.timeout(), Duration::from_millis(900));
    }

    #[test]
    fn test_options_from_missing_file() {
        let err = CaptureOptions::from_json_file("/definitely/not/here.json").unwrap_err();
        assert!(err.to_string().contains("cannot read"));
    }

    #[test]
    fn test_options_builder() {
        let opts = CaptureOptions::builder()
            .timeout_ms(1234)
            .teardown_grace_ms(10)
            .cursor(true)
            .border(true)
            .compression(PngCompression::Fast)
            .crop(Region::new(0, 0, 8, 8))
            .build();

        assert_eq!(opts.timeout_ms, 1234);
        assert_eq!(opts.teardown_grace(), Duration::from_millis(10));
        assert!(opts.cursor && opts.border);
        assert_eq!(opts.compression, PngCompression::Fast);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_compression_from_str() {
        assert_eq!("FAST".parse::<PngCompression>().unwrap(), PngCompression::Fast);
        assert_eq!("best".parse::<PngCompression>().unwrap(), PngCompression::Best);
        assert!("lossy".parse::<PngCompression>().is_err());
    }
}
