//! PNG encoding and file placement tests

mod common;

use window_snap::{
    capture::{
        PixelBuffer, WindowCapturer,
        mock::{FrameDelivery, MockConfig, MockPlatform},
    },
    error::CaptureError,
    model::{PngCompression, Region, WindowHandle},
    util::encode::{encode_png, save_png},
};

use crate::common::{checkerboard, dir_entries, fast_options, timeout_options};

#[test]
fn test_checkerboard_round_trip_is_exact() {
    let original = checkerboard(100, 50, 10);
    let buffer = PixelBuffer::from_rgba(&original).unwrap();

    let encoded = encode_png(&buffer).unwrap();
    let decoded = image::load_from_memory(&encoded.bytes).unwrap().to_rgba8();

    assert_eq!(decoded.dimensions(), (100, 50));
    assert_eq!(decoded.as_raw(), original.as_raw());
}

#[test]
fn test_checkerboard_round_trip_through_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("board.png");
    let original = checkerboard(100, 50, 1);

    for compression in [PngCompression::Fast, PngCompression::Default, PngCompression::Best] {
        save_png(&PixelBuffer::from_rgba(&original).unwrap(), &path, compression).unwrap();
        let decoded = image::open(&path).unwrap().to_rgba8();
        assert_eq!(decoded, original, "{compression:?}");
    }

    assert_eq!(dir_entries(dir.path()), vec!["board.png".to_string()]);
}

#[test]
fn test_cropped_buffer_round_trip() {
    let original = checkerboard(100, 50, 10);
    let buffer = PixelBuffer::from_rgba(&original).unwrap();

    let cropped = buffer.crop(Region::new(10, 0, 20, 10)).unwrap();
    let decoded = image::load_from_memory(&encode_png(&cropped).unwrap().bytes)
        .unwrap()
        .to_rgba8();

    assert_eq!(decoded.dimensions(), (20, 10));
    assert_eq!(decoded.get_pixel(0, 0), original.get_pixel(10, 0));
    assert_eq!(decoded.get_pixel(15, 5), original.get_pixel(25, 5));
}

#[test]
fn test_failed_write_leaves_no_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("no-such-dir").join("shot.png");

    let err = save_png(&PixelBuffer::from_test_pattern(32, 32), &path, PngCompression::Fast).unwrap_err();

    assert!(matches!(err, CaptureError::Encode { .. }));
    assert!(err.remediation_hint().contains("writable"));
    assert!(!path.exists());
    assert!(dir_entries(dir.path()).is_empty());
}

#[test]
fn test_failed_replace_keeps_previous_target() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("shot.png");
    std::fs::create_dir(&target).unwrap();

    let result = save_png(&PixelBuffer::from_test_pattern(32, 32), &target, PngCompression::Fast);

    assert!(result.is_err());
    assert!(target.is_dir());
    assert_eq!(dir_entries(dir.path()), vec!["shot.png".to_string()]);
}

#[tokio::test]
async fn test_capture_to_file_writes_decodable_png() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("window.png");
    let capturer = WindowCapturer::new(MockPlatform::new(), fast_options());

    let encoded = capturer.capture_to_file(WindowHandle(0x42), &path).await.unwrap();

    let decoded = image::open(&path).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (encoded.width, encoded.height));
    assert_eq!(std::fs::read(&path).unwrap(), encoded.bytes);
}

#[tokio::test]
async fn test_failed_capture_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("window.png");
    let platform = MockPlatform::with_config(MockConfig {
        delivery: FrameDelivery::Never,
        ..MockConfig::default()
    });
    let capturer = WindowCapturer::new(platform, timeout_options(30));

    let err = capturer.capture_to_file(WindowHandle(0x42), &path).await.unwrap_err();

    assert!(matches!(err, CaptureError::CaptureTimeout { .. }));
    assert!(dir_entries(dir.path()).is_empty());
}
