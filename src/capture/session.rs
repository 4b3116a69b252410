//! Frame pool and capture session lifecycle
//!
//! A [`CaptureSession`] owns one frame pool and one session handle bound to a
//! single [`CaptureTarget`]. The frame handler is registered during
//! [`CaptureSession::create`], before [`CaptureSession::start`] can run, so
//! no frame is ever produced without a consumer.
//!
//! Teardown order is fixed: unsubscribe, close the session, close the pool.
//! The session borrows its [`CompositorDevice`], which borrows the
//! [`GpuDevice`], so the device is always released last. Teardown runs from
//! `Drop` on every exit path and [`CaptureSession::dispose`] is idempotent.

use std::{marker::PhantomData, sync::Arc, time::Duration};

use super::{
    CapturePlatform, SessionSettings, SurfaceView,
    adapter::CompositorDevice,
    device::GpuDevice,
    frame_sync::{FrameSlot, FrameWaiter},
    target::CaptureTarget,
};
use crate::{
    error::{CaptureError, CaptureResult},
    model::{Size, WindowHandle},
};

/// A single-shot capture session
pub struct CaptureSession<'a, P: CapturePlatform> {
    platform:    &'a P,
    device:      &'a CompositorDevice<'a, P>,
    window:      WindowHandle,
    size:        Size,
    slot:        Arc<FrameSlot<P::Frame>>,
    waiter:      FrameWaiter<P::Frame>,
    session:     Option<P::Session>,
    pool:        Option<P::Pool>,
    started:     bool,
    frame_taken: bool,
}

impl<'a, P: CapturePlatform> CaptureSession<'a, P> {
    /// Creates the frame pool and session and registers the frame handler
    ///
    /// Partially created resources are closed again when a later step fails.
    pub fn create(
        platform: &'a P,
        device: &'a CompositorDevice<'a, P>,
        target: &CaptureTarget<P>,
        buffer_depth: u32,
    ) -> CaptureResult<Self> {
        let window = target.window();
        let size = target.size();

        let pool = platform
            .create_frame_pool(device.interop(), size, buffer_depth)
            .map_err(|e| CaptureError::Adapter {
                reason: format!("frame pool creation failed: {}", e),
            })?;

        let session = match platform.create_session(&pool, target.item()) {
            Ok(session) => session,
            Err(e) => {
                platform.close_pool(pool);
                return Err(CaptureError::TargetNotCapturable {
                    window,
                    reason: format!("capture session creation failed: {}", e),
                });
            }
        };

        let (slot, waiter) = FrameSlot::channel();
        match platform.subscribe(&pool, Arc::clone(&slot)) {
            Ok(detach) => slot.set_detach(detach),
            Err(e) => {
                platform.close_session(session);
                platform.close_pool(pool);
                return Err(CaptureError::Adapter {
                    reason: format!("frame handler registration failed: {}", e),
                });
            }
        }

        tracing::debug!("Created capture session for window {} at {} (depth {})", window, size, buffer_depth);

        Ok(Self {
            platform,
            device,
            window,
            size,
            slot,
            waiter,
            session: Some(session),
            pool: Some(pool),
            started: false,
            frame_taken: false,
        })
    }

    /// Content size fixed at creation
    pub fn size(&self) -> Size {
        self.size
    }

    /// Window being captured
    pub fn window(&self) -> WindowHandle {
        self.window
    }

    /// True once [`dispose`](Self::dispose) ran
    pub fn is_disposed(&self) -> bool {
        self.session.is_none() && self.pool.is_none()
    }

    /// Applies cursor/border toggles; must precede [`start`](Self::start)
    pub fn apply_settings(&self, settings: SessionSettings) {
        if let Some(session) = &self.session {
            self.platform.apply_session_settings(session, settings);
        }
    }

    /// Starts producing frames; calling it again is a no-op
    pub fn start(&mut self) -> CaptureResult<()> {
        if self.started {
            return Ok(());
        }
        let Some(session) = &self.session else {
            return Err(self.disposed_error());
        };

        self.platform
            .start_capture(session)
            .map_err(|e| CaptureError::TargetNotCapturable {
                window: self.window,
                reason: format!("capture could not start: {}", e),
            })?;
        self.started = true;
        tracing::debug!("Capture started for window {}", self.window);
        Ok(())
    }

    /// Blocks until the one frame of this session arrives
    ///
    /// The returned frame borrows the session, so it is always converted
    /// before the pool can be closed. Fails with
    /// [`CaptureError::CaptureTimeout`] when nothing arrives in `timeout`.
    pub fn wait_frame(&mut self, timeout: Duration) -> CaptureResult<CapturedFrame<'_, P>> {
        if self.is_disposed() {
            return Err(self.disposed_error());
        }
        if !self.started {
            return Err(CaptureError::InvalidParameter {
                parameter: "session".to_string(),
                reason:    "capture was not started".to_string(),
            });
        }
        if self.frame_taken {
            return Err(CaptureError::InvalidParameter {
                parameter: "session".to_string(),
                reason:    "the session already produced its frame".to_string(),
            });
        }

        let frame = self.waiter.wait(timeout)?;
        self.frame_taken = true;

        Ok(CapturedFrame {
            platform: self.platform,
            gpu: self.device.gpu(),
            frame,
            _session: PhantomData,
        })
    }

    /// Unsubscribes and closes the session, then the pool
    pub fn dispose(&mut self) {
        if self.is_disposed() {
            return;
        }

        self.slot.close();
        if let Some(session) = self.session.take() {
            self.platform.close_session(session);
        }
        if let Some(pool) = self.pool.take() {
            self.platform.close_pool(pool);
        }
        tracing::debug!("Disposed capture session for window {}", self.window);
    }

    fn disposed_error(&self) -> CaptureError {
        CaptureError::InvalidParameter {
            parameter: "session".to_string(),
            reason:    "the session was already disposed".to_string(),
        }
    }
}

impl<P: CapturePlatform> Drop for CaptureSession<'_, P> {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// A frame borrowed from a live [`CaptureSession`]
pub struct CapturedFrame<'s, P: CapturePlatform> {
    platform: &'s P,
    gpu:      &'s GpuDevice<P>,
    frame:    P::Frame,
    _session: PhantomData<&'s mut ()>,
}

impl<P: CapturePlatform> CapturedFrame<'_, P> {
    /// Native frame
    pub fn raw(&self) -> &P::Frame {
        &self.frame
    }

    /// Reads the frame into CPU memory and runs `f` over the mapping
    pub fn map_surface<R, F>(&self, f: F) -> CaptureResult<R>
    where
        F: FnOnce(SurfaceView<'_>) -> CaptureResult<R>,
    {
        self.platform.map_surface(self.gpu.raw(), &self.frame, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{
        adapter::adapt,
        constants::FRAME_POOL_DEPTH,
        convert::convert_frame,
        device::{DEFAULT_STRATEGIES, create_device},
        mock::{FrameDelivery, MockConfig, MockEvent, MockPlatform},
        target::TargetResolver,
    };

    fn run<T>(platform: &MockPlatform, body: impl FnOnce(CaptureSession<'_, MockPlatform>) -> T) -> T {
        let gpu = create_device(platform, &DEFAULT_STRATEGIES).unwrap();
        let compositor = adapt(platform, &gpu).unwrap();
        let target = TargetResolver::new().resolve_window(platform, WindowHandle(7)).unwrap();
        let session = CaptureSession::create(platform, &compositor, &target, FRAME_POOL_DEPTH).unwrap();
        body(session)
    }

    #[test]
    fn test_single_frame_round_trip() {
        let platform = MockPlatform::with_config(MockConfig {
            window_size: Size::new(32, 16),
            ..MockConfig::default()
        });

        let buffer = run(&platform, |mut session| {
            let size = session.size();
            session.start().unwrap();
            let frame = session.wait_frame(Duration::from_secs(5)).unwrap();
            convert_frame(&frame, size).unwrap()
        });

        assert_eq!(buffer.dimensions(), (32, 16));
        let stats = platform.stats();
        assert_eq!(stats.sessions_live, 0);
        assert_eq!(stats.pools_live, 0);
    }

    #[test]
    fn test_dispose_twice_is_noop() {
        let platform = MockPlatform::new();
        run(&platform, |mut session| {
            session.dispose();
            assert!(session.is_disposed());
            session.dispose();
        });

        let stats = platform.stats();
        assert_eq!(stats.sessions_created, 1);
        assert_eq!(stats.sessions_live, 0);
        assert_eq!(stats.pools_live, 0);
        assert_eq!(platform.events().iter().filter(|e| **e == MockEvent::SessionClosed).count(), 1);
        assert_eq!(platform.events().iter().filter(|e| **e == MockEvent::PoolClosed).count(), 1);
    }

    #[test]
    fn test_handler_registered_before_start_and_torn_down_in_order() {
        let platform = MockPlatform::new();
        run(&platform, |mut session| {
            session.start().unwrap();
            let _ = session.wait_frame(Duration::from_secs(5)).unwrap();
        });

        let events = platform.events();
        let pos = |wanted: MockEvent| events.iter().position(|e| *e == wanted).unwrap();

        assert!(pos(MockEvent::Subscribed) < pos(MockEvent::Started));
        assert!(pos(MockEvent::Detached) < pos(MockEvent::SessionClosed));
        assert!(pos(MockEvent::SessionClosed) < pos(MockEvent::PoolClosed));
        assert!(pos(MockEvent::PoolClosed) < pos(MockEvent::DeviceReleased));
    }

    #[test]
    fn test_wait_before_start_is_rejected() {
        let platform = MockPlatform::new();
        run(&platform, |mut session| {
            let err = session.wait_frame(Duration::from_millis(10)).err().unwrap();
            assert!(err.to_string().contains("not started"));
        });
    }

    #[test]
    fn test_second_wait_is_rejected() {
        let platform = MockPlatform::new();
        run(&platform, |mut session| {
            session.start().unwrap();
            drop(session.wait_frame(Duration::from_secs(5)).unwrap());
            let err = session.wait_frame(Duration::from_millis(10)).err().unwrap();
            assert!(err.to_string().contains("already produced"));
        });
    }

    #[test]
    fn test_timeout_still_tears_down() {
        let platform = MockPlatform::with_config(MockConfig {
            delivery: FrameDelivery::Never,
            ..MockConfig::default()
        });
        run(&platform, |mut session| {
            session.start().unwrap();
            let err = session.wait_frame(Duration::from_millis(20)).err().unwrap();
            assert!(matches!(err, CaptureError::CaptureTimeout { duration_ms: 20 }));
        });

        let stats = platform.stats();
        assert_eq!(stats.sessions_live, 0);
        assert_eq!(stats.pools_live, 0);
        assert_eq!(stats.subscribers_live, 0);
    }

    #[test]
    fn test_session_failure_closes_pool() {
        let platform = MockPlatform::with_config(MockConfig {
            fail_session: true,
            ..MockConfig::default()
        });
        let gpu = create_device(&platform, &DEFAULT_STRATEGIES).unwrap();
        let compositor = adapt(&platform, &gpu).unwrap();
        let target = TargetResolver::new().resolve_window(&platform, WindowHandle(7)).unwrap();

        let err = CaptureSession::create(&platform, &compositor, &target, 1).err().unwrap();

        assert!(matches!(err, CaptureError::TargetNotCapturable { .. }));
        assert_eq!(platform.stats().pools_created, 1);
        assert_eq!(platform.stats().pools_live, 0);
    }

    #[test]
    fn test_start_failure_reports_target() {
        let platform = MockPlatform::with_config(MockConfig {
            fail_start: true,
            ..MockConfig::default()
        });
        run(&platform, |mut session| {
            let err = session.start().unwrap_err();
            assert!(matches!(err, CaptureError::TargetNotCapturable { .. }));
        });
        assert_eq!(platform.stats().sessions_live, 0);
    }

    #[test]
    fn test_settings_forwarded() {
        let platform = MockPlatform::new();
        let settings = SessionSettings {
            cursor: true,
            border: false,
        };
        run(&platform, |session| session.apply_settings(settings));

        assert!(platform.events().contains(&MockEvent::SettingsApplied(settings)));
    }
}
