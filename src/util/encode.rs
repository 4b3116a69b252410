//! PNG encoding for captured pixel buffers
//!
//! Converts a [`PixelBuffer`] (BGRA8 premultiplied) into a lossless
//! straight-alpha RGBA8 PNG and optionally places it on disk. File placement
//! is all-or-nothing: bytes go to a temporary file in the destination
//! directory, which replaces the destination only after it was fully written
//! and synced.
//!
//! # Examples
//!
//! ```
//! use window_snap::{capture::PixelBuffer, model::PngCompression, util::encode::save_png};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let path = dir.path().join("shot.png");
//!
//! let buffer = PixelBuffer::from_test_pattern(320, 200);
//! let encoded = save_png(&buffer, &path, PngCompression::Fast).unwrap();
//!
//! assert_eq!((encoded.width, encoded.height), (320, 200));
//! assert_eq!(std::fs::read(&path).unwrap(), encoded.bytes);
//! ```

use std::{
    io::{Cursor, Write},
    path::Path,
};

use image::{
    ExtendedColorType, ImageEncoder,
    codecs::png::{CompressionType, FilterType, PngEncoder},
};

use crate::{
    capture::PixelBuffer,
    error::{CaptureError, CaptureResult},
    model::PngCompression,
};

/// PNG bytes with the dimensions they encode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    /// Complete PNG file contents
    pub bytes:  Vec<u8>,
    /// Width in pixels
    pub width:  u32,
    /// Height in pixels
    pub height: u32,
}

impl EncodedImage {
    /// Writes the PNG bytes to `sink`
    pub fn write_to<W: Write>(&self, mut sink: W) -> CaptureResult<()> {
        sink.write_all(&self.bytes).map_err(encode_error)?;
        sink.flush().map_err(encode_error)
    }
}

fn encode_error(e: impl std::fmt::Display) -> CaptureError {
    CaptureError::Encode {
        reason: e.to_string(),
    }
}

/// Maps a 0-100 quality value to a compression effort
///
/// - 0-33: Fast
/// - 34-66: Default
/// - 67-100: Best (values above 100 are treated as 100)
pub fn compression_from_quality(quality: u8) -> PngCompression {
    match quality {
        0..=33 => PngCompression::Fast,
        34..=66 => PngCompression::Default,
        _ => PngCompression::Best,
    }
}

fn compression_type(compression: PngCompression) -> CompressionType {
    match compression {
        PngCompression::Fast => CompressionType::Fast,
        PngCompression::Default => CompressionType::Default,
        PngCompression::Best => CompressionType::Best,
    }
}

/// Encodes with default compression
pub fn encode_png(buffer: &PixelBuffer) -> CaptureResult<EncodedImage> {
    encode_png_with_compression(buffer, PngCompression::Default)
}

/// Encodes with the given compression effort
pub fn encode_png_with_compression(
    buffer: &PixelBuffer,
    compression: PngCompression,
) -> CaptureResult<EncodedImage> {
    let mut output = Vec::new();

    // Use adaptive filter for automatic per-scanline optimization
    let encoder = PngEncoder::new_with_quality(
        Cursor::new(&mut output),
        compression_type(compression),
        FilterType::Adaptive,
    );

    let rgba = buffer.to_rgba_image();
    let (width, height) = rgba.dimensions();

    encoder
        .write_image(rgba.as_raw(), width, height, ExtendedColorType::Rgba8)
        .map_err(encode_error)?;

    Ok(EncodedImage {
        bytes: output,
        width,
        height,
    })
}

/// Encodes `buffer` and atomically places it at `path`
///
/// On any failure no file is left at `path` and no temporary file is left
/// next to it; an existing file at `path` is only replaced on success.
pub fn save_png(
    buffer: &PixelBuffer,
    path: &Path,
    compression: PngCompression,
) -> CaptureResult<EncodedImage> {
    let encoded = encode_png_with_compression(buffer, compression)?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::Builder::new()
        .prefix(".window-snap-")
        .suffix(".png.tmp")
        .tempfile_in(dir)
        .map_err(|e| encode_error(format!("cannot create file in {}: {}", dir.display(), e)))?;

    tmp.write_all(&encoded.bytes).map_err(encode_error)?;
    tmp.flush().map_err(encode_error)?;
    tmp.as_file().sync_all().map_err(encode_error)?;

    tmp.persist(path)
        .map_err(|e| encode_error(format!("cannot replace {}: {}", path.display(), e.error)))?;

    tracing::debug!(
        "Wrote {}x{} PNG ({} bytes) to {}",
        encoded.width,
        encoded.height,
        encoded.bytes.len(),
        path.display()
    );
    Ok(encoded)
}

#[cfg(test)]
mod tests {
    use image::{GenericImageView, Rgba, RgbaImage};

    use super::*;

    // ========== Helper Functions Tests ==========

    #[test]
    fn test_compression_from_quality() {
        assert_eq!(compression_from_quality(0), PngCompression::Fast);
        assert_eq!(compression_from_quality(33), PngCompression::Fast);
        assert_eq!(compression_from_quality(34), PngCompression::Default);
        assert_eq!(compression_from_quality(66), PngCompression::Default);
        assert_eq!(compression_from_quality(67), PngCompression::Best);
        assert_eq!(compression_from_quality(100), PngCompression::Best);
        assert_eq!(compression_from_quality(255), PngCompression::Best);
    }

    // ========== PNG Encoding Tests ==========

    #[test]
    fn test_encode_png_signature() {
        let buffer = PixelBuffer::from_test_pattern(100, 100);
        let encoded = encode_png(&buffer).unwrap();

        assert_eq!((encoded.width, encoded.height), (100, 100));
        assert_eq!(&encoded.bytes[0..8], &[137, 80, 78, 71, 13, 10, 26, 10]);
    }

    #[test]
    fn test_encode_png_compression_levels() {
        let buffer = PixelBuffer::from_test_pattern(640, 480);

        let fast = encode_png_with_compression(&buffer, PngCompression::Fast).unwrap();
        let best = encode_png_with_compression(&buffer, PngCompression::Best).unwrap();

        assert!(best.bytes.len() <= fast.bytes.len());
    }

    #[test]
    fn test_encode_unpremultiplies() {
        let straight = RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 128]));
        let buffer = PixelBuffer::from_rgba(&straight).unwrap();
        assert_eq!(buffer.pixel(0, 0), Some([0, 0, 128, 128]));

        let encoded = encode_png(&buffer).unwrap();
        let decoded = image::load_from_memory(&encoded.bytes).unwrap();
        assert_eq!(decoded.get_pixel(1, 1), Rgba([255, 0, 0, 128]));
    }

    #[test]
    fn test_write_to_sink() {
        let encoded = encode_png(&PixelBuffer::from_test_pattern(8, 8)).unwrap();
        let mut sink = Vec::new();
        encoded.write_to(&mut sink).unwrap();
        assert_eq!(sink, encoded.bytes);
    }

    // ========== File Placement Tests ==========

    #[test]
    fn test_save_png_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.png");
        std::fs::write(&path, b"stale").unwrap();

        let encoded = save_png(&PixelBuffer::from_test_pattern(16, 16), &path, PngCompression::Fast).unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), encoded.bytes);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_save_png_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("shot.png");

        let err = save_png(&PixelBuffer::from_test_pattern(4, 4), &path, PngCompression::Fast).unwrap_err();

        assert!(matches!(err, CaptureError::Encode { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn test_save_png_onto_directory_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("occupied");
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("keep.txt"), b"x").unwrap();

        let result = save_png(&PixelBuffer::from_test_pattern(4, 4), &target, PngCompression::Fast);

        assert!(result.is_err());
        assert!(target.is_dir());
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("occupied")]);
    }
}
