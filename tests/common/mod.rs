//! Shared helpers for the integration tests

#![allow(dead_code)]

use std::{
    thread,
    time::{Duration, Instant},
};

use image::{Rgba, RgbaImage};
use window_snap::{
    capture::mock::{MockPlatform, MockStats},
    model::CaptureOptions,
};

/// Options with short deadlines suitable for mock captures
pub fn fast_options() -> CaptureOptions {
    CaptureOptions::builder().timeout_ms(2000).teardown_grace_ms(1000).build()
}

/// Options whose frame wait gives up after `timeout_ms`
pub fn timeout_options(timeout_ms: u64) -> CaptureOptions {
    CaptureOptions::builder().timeout_ms(timeout_ms).teardown_grace_ms(2000).build()
}

/// Straight-alpha checkerboard alternating opaque red and green cells
pub fn checkerboard(width: u32, height: u32, cell: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        if ((x / cell) + (y / cell)) % 2 == 0 {
            Rgba([255, 0, 0, 255])
        } else {
            Rgba([0, 255, 0, 255])
        }
    })
}

/// Polls the mock until nothing is live any more, returning the final stats
///
/// Teardown after a cancelled wait happens on a blocking worker thread, so
/// tests have to wait for it instead of checking right away.
pub fn wait_for_teardown(platform: &MockPlatform, within: Duration) -> MockStats {
    let deadline = Instant::now() + within;
    loop {
        let stats = platform.stats();
        let idle = stats.sessions_live == 0 && stats.pools_live == 0 && stats.subscribers_live == 0;
        if idle || Instant::now() >= deadline {
            return stats;
        }
        thread::sleep(Duration::from_millis(10));
    }
}

/// Names of every entry in `dir`, sorted
pub fn dir_entries(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
