//! Live Windows Graphics Capture tests
//!
//! These tests need an interactive Windows desktop with at least one visible,
//! non-minimized top-level window. They are marked `#[ignore]`; run them
//! manually with:
//!
//! ```powershell
//! cargo test --test windows_integration_tests -- --ignored --nocapture
//!
//! # target a specific window (decimal or 0x hex HWND)
//! $env:WINDOW_SNAP_TEST_HWND = "0x1A2B3C"
//! $env:RUST_LOG = "window_snap=debug"
//! cargo test --test windows_integration_tests -- --ignored --nocapture
//! ```
//!
//! # Requirements
//!
//! - Windows 10 version 1903 or later (Windows 11 for border control)
//! - Direct3D 11 runtime

#![cfg(target_os = "windows")]

mod common;

use window_snap::{
    capture::{WindowCapturer, WindowsPlatform},
    error::CaptureError,
    model::{CaptureOptions, WindowHandle},
};

use crate::common::fast_options;

fn test_window() -> Option<WindowHandle> {
    std::env::var("WINDOW_SNAP_TEST_HWND").ok()?.parse().ok()
}

#[test]
#[ignore = "requires Windows desktop environment"]
fn test_capture_is_supported() {
    assert!(WindowsPlatform::is_supported());
}

#[test]
#[ignore = "requires Windows desktop environment"]
fn test_capture_real_window() {
    let Some(window) = test_window() else {
        eprintln!("WINDOW_SNAP_TEST_HWND not set, skipping");
        return;
    };
    let capturer = WindowCapturer::new(WindowsPlatform::new(), fast_options());

    let buffer = capturer.capture_blocking(window).unwrap();

    eprintln!("Captured {} at {}x{}", window, buffer.width(), buffer.height());
    assert!(buffer.width() > 0 && buffer.height() > 0);
    assert!(buffer.as_bytes().chunks_exact(4).any(|px| px[3] != 0));
}

#[test]
#[ignore = "requires Windows desktop environment"]
fn test_sequential_real_captures() {
    let Some(window) = test_window() else {
        eprintln!("WINDOW_SNAP_TEST_HWND not set, skipping");
        return;
    };
    let capturer = WindowCapturer::new(WindowsPlatform::new(), fast_options());

    let first = capturer.capture_blocking(window).unwrap();
    let second = capturer.capture_blocking(window).unwrap();

    assert_eq!(first.dimensions(), second.dimensions());
}

#[test]
#[ignore = "requires Windows desktop environment"]
fn test_invalid_handle_is_not_capturable() {
    let capturer = WindowCapturer::new(WindowsPlatform::new(), CaptureOptions::default());

    let err = capturer.capture_blocking(WindowHandle(0x7FFF_FFF0)).unwrap_err();

    assert!(matches!(err, CaptureError::TargetNotCapturable { .. }), "{err:?}");
}

#[tokio::test]
#[ignore = "requires Windows desktop environment"]
async fn test_capture_real_window_to_file() {
    let Some(window) = test_window() else {
        eprintln!("WINDOW_SNAP_TEST_HWND not set, skipping");
        return;
    };
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("live.png");
    let capturer = WindowCapturer::new(WindowsPlatform::new(), fast_options());

    let encoded = capturer.capture_to_file(window, &path).await.unwrap();

    let decoded = image::open(&path).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (encoded.width, encoded.height));
}
