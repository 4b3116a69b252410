//! Compositor device adapter
//!
//! Exposes a [`GpuDevice`] to the capture API. The result borrows the device,
//! so it can never outlive it and is never released on its own.

use super::{CapturePlatform, device::GpuDevice};
use crate::error::{CaptureError, CaptureResult};

/// Capture-API view over a borrowed [`GpuDevice`]
pub struct CompositorDevice<'d, P: CapturePlatform> {
    gpu:     &'d GpuDevice<P>,
    interop: P::Interop,
}

impl<'d, P: CapturePlatform> CompositorDevice<'d, P> {
    /// Device this view was derived from
    pub fn gpu(&self) -> &'d GpuDevice<P> {
        self.gpu
    }

    /// Native interop handle
    pub fn interop(&self) -> &P::Interop {
        &self.interop
    }
}

/// Wraps `gpu` for the capture API
///
/// Fails with [`CaptureError::Adapter`] when the device does not expose the
/// DXGI exchange interface.
pub fn adapt<'d, P: CapturePlatform>(
    platform: &P,
    gpu: &'d GpuDevice<P>,
) -> CaptureResult<CompositorDevice<'d, P>> {
    let interop = platform.exchange_interface(gpu.raw()).map_err(|e| {
        tracing::warn!("GPU device has no usable DXGI interface: {}", e);
        CaptureError::Adapter {
            reason: e.to_string(),
        }
    })?;

    Ok(CompositorDevice { gpu, interop })
}
