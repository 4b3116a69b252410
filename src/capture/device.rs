//! GPU device factory
//!
//! Creates the Direct3D 11 device every capture session is derived from.
//! Strategies are tried in order and the first success wins; the default
//! list is a hardware device followed by the WARP software rasterizer, both
//! requesting BGRA support over [`FeatureLevel::DESCENDING`].

use super::CapturePlatform;
use crate::{
    error::{CaptureError, CaptureResult, DeviceAttempt},
    model::{DriverKind, FeatureLevel},
};

/// One way of creating a device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceStrategy {
    /// Driver to request
    pub driver:         DriverKind,
    /// Feature levels to request, best first
    pub feature_levels: &'static [FeatureLevel],
}

/// Hardware first, then exactly one software retry
pub const DEFAULT_STRATEGIES: [DeviceStrategy; 2] = [
    DeviceStrategy {
        driver:         DriverKind::Hardware,
        feature_levels: &FeatureLevel::DESCENDING,
    },
    DeviceStrategy {
        driver:         DriverKind::Software,
        feature_levels: &FeatureLevel::DESCENDING,
    },
];

/// An owned rendering device
///
/// Released exactly once, when dropped. Sessions borrow it, so it always
/// outlives them.
pub struct GpuDevice<P: CapturePlatform> {
    raw:    P::Device,
    driver: DriverKind,
    level:  FeatureLevel,
}

impl<P: CapturePlatform> GpuDevice<P> {
    /// Native device handle
    pub fn raw(&self) -> &P::Device {
        &self.raw
    }

    /// Driver the device runs on
    pub fn driver(&self) -> DriverKind {
        self.driver
    }

    /// Feature level the driver granted
    pub fn feature_level(&self) -> FeatureLevel {
        self.level
    }
}

impl<P: CapturePlatform> std::fmt::Debug for GpuDevice<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuDevice")
            .field("driver", &self.driver)
            .field("level", &self.level)
            .finish_non_exhaustive()
    }
}

/// Creates a device using the first strategy that succeeds
///
/// Fails with [`CaptureError::DeviceCreation`] carrying every attempt when
/// none does.
pub fn create_device<P: CapturePlatform>(
    platform: &P,
    strategies: &[DeviceStrategy],
) -> CaptureResult<GpuDevice<P>> {
    let mut attempts = Vec::with_capacity(strategies.len());

    for strategy in strategies {
        match platform.create_device(strategy.driver, strategy.feature_levels) {
            Ok((raw, level)) => {
                tracing::debug!("Created {} GPU device at feature level {}", strategy.driver, level);
                return Ok(GpuDevice {
                    raw,
                    driver: strategy.driver,
                    level,
                });
            }
            Err(error) => {
                tracing::warn!("{} GPU device creation failed: {}", strategy.driver, error);
                attempts.push(DeviceAttempt {
                    driver: strategy.driver,
                    error,
                });
            }
        }
    }

    Err(CaptureError::DeviceCreation { attempts })
}
