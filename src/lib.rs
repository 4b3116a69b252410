//! window-snap: single-shot window capture to PNG
//!
//! This library captures exactly one frame of a native window through
//! Windows Graphics Capture, converts it to a BGRA8 premultiplied
//! [`capture::PixelBuffer`] and optionally writes it out as a lossless PNG.
//! The pipeline runs against the `capture::CapturePlatform` seam, so it can
//! be exercised end to end with [`capture::MockPlatform`] on any OS.

pub mod capture;
pub mod error;
pub mod model;
pub mod util;
