//! Timeout and pipeline constants for window capture.
//!
//! # Runtime Configuration
//!
//! Timeout values can be overridden at runtime via environment variables:
//!
//! | Environment Variable | Default | Description |
//! |---------------------|---------|-------------|
//! | `WINDOW_SNAP_CAPTURE_TIMEOUT_MS` | 5000 | Deadline for the first frame |
//! | `WINDOW_SNAP_TEARDOWN_GRACE_MS` | 1000 | Extra time for session teardown |
//!
//! ## Windows
//! - The first capture in a process loads the capture DLLs and allocates GPU
//!   resources, which can take a second or two
//! - DWM only composes a new frame when the window content changes or the
//!   compositor ticks, so a static window may need a full refresh cycle

/// Default deadline for the frame-arrival notification.
///
/// Graphics Capture usually delivers the first frame within one compositor
/// refresh. Five seconds leaves room for cold starts and HDR tone mapping
/// while still catching minimized windows that never produce a frame.
pub const CAPTURE_TIMEOUT_MS: u64 = 5000;

/// Default grace period added on top of the frame deadline before the async
/// wrapper gives up on the blocking task.
///
/// Covers unsubscribing the frame handler and closing the session and pool.
pub const TEARDOWN_GRACE_MS: u64 = 1000;

/// Frame pool buffer depth. Only the newest frame is ever needed.
pub const FRAME_POOL_DEPTH: u32 = 1;

/// Runtime class whose activation factory creates capture items.
pub const CAPTURE_ITEM_CLASS: &str = "Windows.Graphics.Capture.GraphicsCaptureItem";

// =============================================================================
// Environment Variable Overrides
// =============================================================================

/// Environment variable overriding [`CAPTURE_TIMEOUT_MS`].
pub const CAPTURE_TIMEOUT_ENV: &str = "WINDOW_SNAP_CAPTURE_TIMEOUT_MS";

/// Environment variable overriding [`TEARDOWN_GRACE_MS`].
pub const TEARDOWN_GRACE_ENV: &str = "WINDOW_SNAP_TEARDOWN_GRACE_MS";

/// Helper to get a timeout from environment variable or fall back to default.
fn get_timeout_from_env(env_var: &str, default: u64) -> u64 {
    std::env::var(env_var)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .filter(|&ms| ms > 0)
        .unwrap_or(default)
}

/// Get the frame deadline, checking environment variable override.
///
/// Override with: `WINDOW_SNAP_CAPTURE_TIMEOUT_MS`
///
/// # Example
///
/// ```bash
/// # Wait up to 10 seconds on slow GPUs or HDR displays
/// export WINDOW_SNAP_CAPTURE_TIMEOUT_MS=10000
/// ```
pub fn capture_timeout_ms() -> u64 {
    get_timeout_from_env(CAPTURE_TIMEOUT_ENV, CAPTURE_TIMEOUT_MS)
}

/// Get the teardown grace period, checking environment variable override.
///
/// Override with: `WINDOW_SNAP_TEARDOWN_GRACE_MS`
pub fn teardown_grace_ms() -> u64 {
    get_timeout_from_env(TEARDOWN_GRACE_ENV, TEARDOWN_GRACE_MS)
}
