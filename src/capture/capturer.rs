//! Single-shot capture orchestration
//!
//! [`WindowCapturer`] runs the whole pipeline for one window:
//!
//! 1. resolve the window into a [`CaptureTarget`](super::target::CaptureTarget)
//! 2. reuse (or create) the cached [`GpuDevice`]
//! 3. adapt it for the capture API
//! 4. create, configure and start a [`CaptureSession`]
//! 5. wait for the one frame, convert it, tear the session down
//!
//! The async entry points run the blocking pipeline on tokio's blocking pool
//! and never poll. The device cache lock is held for the whole run, which
//! serializes concurrent captures. Time spent queued behind another capture
//! does not count against the deadline. If the async caller is dropped or
//! times out, the blocking task still finishes and disposes its session.
//!
//! # Examples
//!
//! ```
//! use window_snap::{
//!     capture::{CaptureFacade, WindowCapturer, mock::MockPlatform},
//!     model::{CaptureOptions, Region, WindowHandle},
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let opts = CaptureOptions::builder().crop(Region::new(0, 0, 64, 32)).build();
//!     let capturer = WindowCapturer::new(MockPlatform::new(), opts);
//!
//!     let facade: &dyn CaptureFacade = &capturer;
//!     let buffer = facade.capture(WindowHandle(42)).await.unwrap();
//!     assert_eq!(buffer.dimensions(), (64, 32));
//! }
//! ```

use std::{
    path::Path,
    sync::{Arc, Mutex, PoisonError},
    time::Instant,
};

use async_trait::async_trait;
use tokio::sync::oneshot;

use super::{
    CaptureFacade, CapturePlatform, SessionSettings,
    adapter::adapt,
    constants::FRAME_POOL_DEPTH,
    convert::convert_frame,
    device::{DEFAULT_STRATEGIES, DeviceStrategy, GpuDevice, create_device},
    pixel_buffer::PixelBuffer,
    session::CaptureSession,
    target::{CaptureTarget, TargetResolver},
};
use crate::{
    error::{CaptureError, CaptureResult},
    model::{CaptureOptions, WindowHandle},
    util::encode::{EncodedImage, save_png},
};

/// Captures single frames of windows on a [`CapturePlatform`]
///
/// Cheap to clone; clones share the platform and the cached device.
pub struct WindowCapturer<P: CapturePlatform> {
    inner: Arc<Inner<P>>,
}

impl<P: CapturePlatform> Clone for WindowCapturer<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<P: CapturePlatform> {
    platform:   P,
    device:     Mutex<Option<GpuDevice<P>>>,
    resolver:   TargetResolver,
    strategies: Vec<DeviceStrategy>,
    options:    CaptureOptions,
}

impl<P: CapturePlatform> WindowCapturer<P> {
    /// Creates a capturer with the default device strategies and resolver
    pub fn new(platform: P, options: CaptureOptions) -> Self {
        Self::with_parts(platform, options, TargetResolver::new(), DEFAULT_STRATEGIES.to_vec())
    }

    /// Creates a capturer with a custom resolver and device strategy list
    pub fn with_parts(
        platform: P,
        options: CaptureOptions,
        resolver: TargetResolver,
        strategies: Vec<DeviceStrategy>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                platform,
                device: Mutex::new(None),
                resolver,
                strategies,
                options,
            }),
        }
    }

    /// The platform this capturer runs on
    pub fn platform(&self) -> &P {
        &self.inner.platform
    }

    /// Options applied to every capture
    pub fn options(&self) -> &CaptureOptions {
        &self.inner.options
    }

    /// Drops the cached device; the next capture creates a new one
    pub fn release_device(&self) {
        let device = self.inner.device.lock().unwrap_or_else(PoisonError::into_inner).take();
        if device.is_some() {
            tracing::debug!("Released cached GPU device");
        }
    }

    /// Captures one frame on the calling thread
    pub fn capture_blocking(&self, window: WindowHandle) -> CaptureResult<PixelBuffer> {
        self.inner.capture_blocking(window)
    }

    /// Captures one frame without blocking the async runtime
    ///
    /// Waits for any capture already holding the device, then gives up after
    /// the frame timeout plus the teardown grace period.
    pub async fn capture(&self, window: WindowHandle) -> CaptureResult<PixelBuffer> {
        let inner = Arc::clone(&self.inner);
        let options = &self.inner.options;
        let budget = options.timeout() + options.teardown_grace();
        let budget_ms = u64::try_from(budget.as_millis()).unwrap_or(u64::MAX);

        let (locked_tx, locked_rx) = oneshot::channel();
        let mut task = tokio::task::spawn_blocking(move || {
            inner.capture_with(window, move || {
                let _ = locked_tx.send(());
            })
        });

        // The deadline starts once this capture owns the device. A closed
        // channel means the task finished (or failed) before getting there.
        let queued = Instant::now();
        if locked_rx.await.is_ok() {
            tracing::debug!("Capture of window {} got the device after {:?}", window, queued.elapsed());
        }

        match tokio::time::timeout(budget, &mut task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => {
                if join_error.is_panic() {
                    std::panic::resume_unwind(join_error.into_panic());
                }
                tracing::error!("Capture task was cancelled: {}", join_error);
                Err(CaptureError::CaptureTimeout {
                    duration_ms: budget_ms,
                })
            }
            Err(_) => {
                tracing::warn!("Capture of window {} timed out after {}ms", window, budget_ms);
                Err(CaptureError::CaptureTimeout {
                    duration_ms: budget_ms,
                })
            }
        }
    }

    /// Captures one frame and writes it to `path` as PNG
    pub async fn capture_to_file(&self, window: WindowHandle, path: &Path) -> CaptureResult<EncodedImage> {
        let buffer = self.capture(window).await?;
        let compression = self.inner.options.compression;
        let path = path.to_path_buf();

        tokio::task::spawn_blocking(move || save_png(&buffer, &path, compression))
            .await
            .map_err(|e| CaptureError::Encode {
                reason: format!("encoder task failed: {}", e),
            })?
    }
}

impl<P: CapturePlatform> Inner<P> {
    fn capture_blocking(&self, window: WindowHandle) -> CaptureResult<PixelBuffer> {
        self.capture_with(window, || {})
    }

    /// Runs the pipeline, calling `on_locked` once the device cache is held
    fn capture_with(&self, window: WindowHandle, on_locked: impl FnOnce()) -> CaptureResult<PixelBuffer> {
        let started = Instant::now();
        let platform = &self.platform;

        let target = self.resolver.resolve_window(platform, window)?;

        let mut cached = self.device.lock().unwrap_or_else(PoisonError::into_inner);
        on_locked();
        let gpu = match cached.take() {
            Some(gpu) => gpu,
            None => create_device(platform, &self.strategies)?,
        };

        let result = self.run_session(&gpu, &target);

        // A lost device shows up as an adapter failure; build a fresh one next time
        if matches!(result, Err(CaptureError::Adapter { .. })) {
            tracing::warn!("Discarding GPU device after adapter failure");
        } else {
            *cached = Some(gpu);
        }
        drop(cached);

        let buffer = result?;
        let buffer = match self.options.crop {
            Some(region) => buffer.crop(region)?,
            None => buffer,
        };

        tracing::info!(
            "Captured window {} ({}x{}) in {:?}",
            window,
            buffer.width(),
            buffer.height(),
            started.elapsed()
        );
        Ok(buffer)
    }

    fn run_session(&self, gpu: &GpuDevice<P>, target: &CaptureTarget<P>) -> CaptureResult<PixelBuffer> {
        let platform = &self.platform;
        let compositor = adapt(platform, gpu)?;

        let mut session = CaptureSession::create(platform, &compositor, target, FRAME_POOL_DEPTH)?;
        session.apply_settings(SessionSettings {
            cursor: self.options.cursor,
            border: self.options.border,
        });
        session.start()?;

        let buffer = {
            let frame = session.wait_frame(self.options.timeout())?;
            convert_frame(&frame, target.size())?
        };

        session.dispose();
        Ok(buffer)
    }
}

#[async_trait]
impl<P: CapturePlatform> CaptureFacade for WindowCapturer<P> {
    async fn capture(&self, window: WindowHandle) -> CaptureResult<PixelBuffer> {
        WindowCapturer::capture(self, window).await
    }

    async fn capture_to_file(&self, window: WindowHandle, path: &Path) -> CaptureResult<EncodedImage> {
        WindowCapturer::capture_to_file(self, window, path).await
    }
}
