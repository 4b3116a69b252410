//! Stand-in platform for operating systems without Windows Graphics Capture
//!
//! Device and item creation fail with a native "not supported" error, so a
//! capture on these targets ends in [`CaptureError::DeviceCreation`] or
//! [`CaptureError::TargetNotCapturable`] without touching anything else. The
//! remaining operations can only be reached with resources this platform
//! never hands out.
//!
//! [`CaptureError::DeviceCreation`]: crate::error::CaptureError::DeviceCreation
//! [`CaptureError::TargetNotCapturable`]: crate::error::CaptureError::TargetNotCapturable

use std::{convert::Infallible, sync::Arc};

use super::{CapturePlatform, DetachHook, FrameSlot, SessionSettings, SurfaceView};
use crate::{
    error::{CaptureResult, NativeError},
    model::{DriverKind, FeatureLevel, Size, WindowHandle},
};

/// HRESULT for "the requested operation is not supported" (E_NOTIMPL)
const E_NOTIMPL: i32 = 0x8000_4001_u32 as i32;

fn unsupported(what: &str) -> NativeError {
    NativeError::new(
        E_NOTIMPL,
        format!("{} is unsupported: window capture requires Windows 10 1903 or later", what),
    )
}

/// Platform used on every non-Windows target
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedPlatform;

impl UnsupportedPlatform {
    /// Creates the platform
    pub fn new() -> Self {
        Self
    }
}

impl CapturePlatform for UnsupportedPlatform {
    type Device = Infallible;
    type Interop = Infallible;
    type Item = Infallible;
    type Pool = Infallible;
    type Session = Infallible;
    type Frame = Infallible;

    fn create_device(
        &self,
        driver: DriverKind,
        _levels: &[FeatureLevel],
    ) -> Result<(Infallible, FeatureLevel), NativeError> {
        Err(unsupported(&format!("{} device creation", driver)))
    }

    fn exchange_interface(&self, device: &Infallible) -> Result<Infallible, NativeError> {
        match *device {}
    }

    fn create_item(&self, _class_name: &str, _window: WindowHandle) -> Result<(Infallible, Size), NativeError> {
        Err(unsupported("capture item creation"))
    }

    fn create_frame_pool(&self, interop: &Infallible, _size: Size, _depth: u32) -> Result<Infallible, NativeError> {
        match *interop {}
    }

    fn create_session(&self, pool: &Infallible, _item: &Infallible) -> Result<Infallible, NativeError> {
        match *pool {}
    }

    fn apply_session_settings(&self, session: &Infallible, _settings: SessionSettings) {
        match *session {}
    }

    fn subscribe(&self, pool: &Infallible, _slot: Arc<FrameSlot<Infallible>>) -> Result<DetachHook, NativeError> {
        match *pool {}
    }

    fn start_capture(&self, session: &Infallible) -> Result<(), NativeError> {
        match *session {}
    }

    fn map_surface<R, F>(&self, _device: &Infallible, frame: &Infallible, _f: F) -> CaptureResult<R>
    where
        F: FnOnce(SurfaceView<'_>) -> CaptureResult<R>,
    {
        match *frame {}
    }

    fn close_session(&self, session: Infallible) {
        match session {}
    }

    fn close_pool(&self, pool: Infallible) {
        match pool {}
    }
}
