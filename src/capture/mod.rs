//! Window capture pipeline
//!
//! This module provides the single-shot window capture pipeline and the seam
//! it runs on. It includes:
//!
//! - `CapturePlatform`: the native operations the pipeline needs (device
//!   creation, capture items, frame pools, sessions, surface readback),
//!   implemented by `WindowsPlatform` on Windows and by `MockPlatform` for
//!   tests
//! - Pipeline stages, leaves first: [`device`], [`adapter`], [`target`],
//!   [`session`], [`frame_sync`], [`convert`]
//! - `WindowCapturer`: the orchestrator exposed through `CaptureFacade`

use std::{path::Path, sync::Arc};

use async_trait::async_trait;

use crate::{
    error::{CaptureResult, NativeError},
    model::{DriverKind, FeatureLevel, Size, WindowHandle},
    util::encode::EncodedImage,
};

pub mod adapter;
pub mod capturer;
pub mod constants;
pub mod convert;
pub mod device;
pub mod frame_sync;
pub mod mock;
pub mod pixel_buffer;
pub mod session;
pub mod target;

#[cfg(target_os = "windows")]
pub mod windows_backend;

#[cfg(not(target_os = "windows"))]
pub mod unsupported;

pub use capturer::WindowCapturer;
pub use convert::SurfaceView;
pub use frame_sync::{DetachHook, FrameSlot};
pub use mock::MockPlatform;
pub use pixel_buffer::{PixelBuffer, PixelFormat};
#[cfg(not(target_os = "windows"))]
pub use unsupported::UnsupportedPlatform;
#[cfg(target_os = "windows")]
pub use windows_backend::WindowsPlatform;

/// Native platform for the current target OS
#[cfg(target_os = "windows")]
pub type SystemPlatform = WindowsPlatform;

/// Native platform for the current target OS
#[cfg(not(target_os = "windows"))]
pub type SystemPlatform = UnsupportedPlatform;

/// Best-effort session toggles applied before capture starts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSettings {
    /// Include the mouse cursor
    pub cursor: bool,
    /// Show the capture border around the window
    pub border: bool,
}

/// Native operations behind the capture pipeline
///
/// Every method maps to one compositor or Direct3D call (or a short fixed
/// sequence of them). Failures come back as [`NativeError`]; the pipeline
/// stages translate them into [`CaptureError`](crate::error::CaptureError)
/// variants. Resources are plain owned values: dropping one releases it,
/// and `close_*` methods consume theirs so a handle can never be closed
/// twice.
///
/// # Thread Safety
///
/// Frame notifications arrive on a thread owned by the platform, so the
/// frame type must be `Send`. The device is cached across calls by
/// [`WindowCapturer`] and must be `Send` as well.
pub trait CapturePlatform: Send + Sync + 'static {
    /// Owned rendering device
    type Device: Send;
    /// Capture-API view of a device
    type Interop;
    /// Capturable surface for one window
    type Item;
    /// Frame pool
    type Pool;
    /// Capture session
    type Session;
    /// One captured frame
    type Frame: Send + 'static;

    /// Creates a device on `driver`, trying `levels` in order
    fn create_device(
        &self,
        driver: DriverKind,
        levels: &[FeatureLevel],
    ) -> Result<(Self::Device, FeatureLevel), NativeError>;

    /// Queries the device's DXGI interface and wraps it for the capture API
    fn exchange_interface(&self, device: &Self::Device) -> Result<Self::Interop, NativeError>;

    /// Creates a capture item for `window` through the activation factory of
    /// `class_name`, returning it with its content size
    fn create_item(
        &self,
        class_name: &str,
        window: WindowHandle,
    ) -> Result<(Self::Item, Size), NativeError>;

    /// Creates a free-threaded frame pool of `buffer_depth` BGRA8 buffers
    fn create_frame_pool(
        &self,
        interop: &Self::Interop,
        size: Size,
        buffer_depth: u32,
    ) -> Result<Self::Pool, NativeError>;

    /// Creates a session binding `pool` to `item`
    fn create_session(
        &self,
        pool: &Self::Pool,
        item: &Self::Item,
    ) -> Result<Self::Session, NativeError>;

    /// Applies optional toggles; unsupported ones are skipped
    fn apply_session_settings(&self, session: &Self::Session, settings: SessionSettings);

    /// Registers the frame-arrival handler, returning the hook that removes it
    ///
    /// The handler must pass every notification to [`FrameSlot::deliver`].
    fn subscribe(
        &self,
        pool: &Self::Pool,
        slot: Arc<FrameSlot<Self::Frame>>,
    ) -> Result<DetachHook, NativeError>;

    /// Starts producing frames
    fn start_capture(&self, session: &Self::Session) -> Result<(), NativeError>;

    /// Copies `frame` into CPU-readable memory and runs `f` over it
    fn map_surface<R, F>(&self, device: &Self::Device, frame: &Self::Frame, f: F) -> CaptureResult<R>
    where
        F: FnOnce(SurfaceView<'_>) -> CaptureResult<R>;

    /// Closes a session
    fn close_session(&self, session: Self::Session);

    /// Closes a frame pool
    fn close_pool(&self, pool: Self::Pool);
}

/// High-level capture interface
///
/// Implemented by [`WindowCapturer`]; lets callers hold a
/// `Box<dyn CaptureFacade>` without naming the platform.
#[async_trait]
pub trait CaptureFacade: Send + Sync {
    /// Captures one frame of `window`
    async fn capture(&self, window: WindowHandle) -> CaptureResult<PixelBuffer>;

    /// Captures one frame of `window` and writes it to `path` as PNG
    async fn capture_to_file(&self, window: WindowHandle, path: &Path) -> CaptureResult<EncodedImage>;
}
