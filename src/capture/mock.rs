//! Mock capture platform for testing
//!
//! This module provides `MockPlatform`, an implementation of
//! [`CapturePlatform`] that needs no GPU and no window system. It counts every
//! native resource it hands out and records an ordered event log, so tests
//! can assert that each capture tears down completely and in the right order.
//!
//! # Features
//!
//! - **Resource accounting:** devices, frame pools, sessions and frame
//!   subscribers are counted as created and live
//! - **Event log:** every native call is appended to [`MockPlatform::events`]
//! - **Frame delivery modes:** deliver on start, deliver twice, deliver late,
//!   or never deliver (see [`FrameDelivery`])
//! - **Failure injection:** hardware/software device failure, missing DXGI
//!   interface, closed windows, session/start failure
//! - **Surface layouts:** any [`SurfaceFormat`] and [`AlphaMode`], with row
//!   padding so stride handling is exercised
//!
//! # Examples
//!
//! ```
//! use window_snap::{
//!     capture::{WindowCapturer, mock::MockPlatform},
//!     model::{CaptureOptions, WindowHandle},
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let platform = MockPlatform::new();
//!     let capturer = WindowCapturer::new(platform.clone(), CaptureOptions::default());
//!
//!     let buffer = capturer.capture(WindowHandle(0x1234)).await.unwrap();
//!     assert_eq!(buffer.dimensions(), (800, 600));
//!
//!     let stats = platform.stats();
//!     assert_eq!(stats.sessions_live, 0);
//!     assert_eq!(stats.pools_live, 0);
//! }
//! ```

use std::{
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    thread,
    time::Duration,
};

use super::{CapturePlatform, DetachHook, FrameSlot, SessionSettings, SurfaceView};
use crate::{
    error::{CaptureError, CaptureResult, NativeError},
    model::{AlphaMode, DriverKind, FeatureLevel, Size, SurfaceFormat, WindowHandle},
};

const E_INVALIDARG: i32 = 0x8007_0057_u32 as i32;
const E_NOINTERFACE: i32 = 0x8000_4002_u32 as i32;
const E_FAIL: i32 = 0x8000_4005_u32 as i32;
const DXGI_ERROR_UNSUPPORTED: i32 = 0x887A_0004_u32 as i32;
const ERROR_INVALID_WINDOW_HANDLE: i32 = 0x8007_0578_u32 as i32;

/// Extra bytes appended to every mock surface row
pub const MOCK_ROW_PADDING: usize = 16;

/// When the mock pool raises frame notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDelivery {
    /// One notification from a platform thread right after start
    OnStart,
    /// Two notifications racing from a platform thread
    Twice,
    /// One notification after a delay
    After(Duration),
    /// Never
    Never,
}

/// Behavior of a [`MockPlatform`]
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Hardware device creation fails
    pub fail_hardware:         bool,
    /// Software device creation fails
    pub fail_software:         bool,
    /// Devices do not expose the DXGI exchange interface
    pub no_exchange_interface: bool,
    /// Content size reported for every window
    pub window_size:           Size,
    /// Handles that behave like destroyed windows
    pub closed_windows:        Vec<WindowHandle>,
    /// Session creation fails
    pub fail_session:          bool,
    /// Starting capture fails
    pub fail_start:            bool,
    /// Frame notification behavior
    pub delivery:              FrameDelivery,
    /// Layout of delivered surfaces
    pub surface_format:        SurfaceFormat,
    /// Alpha interpretation of delivered surfaces
    pub surface_alpha:         AlphaMode,
    /// Surface size, when it should differ from `window_size`
    pub surface_size:          Option<Size>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            fail_hardware:         false,
            fail_software:         false,
            no_exchange_interface: false,
            window_size:           Size::new(800, 600),
            closed_windows:        Vec::new(),
            fail_session:          false,
            fail_start:            false,
            delivery:              FrameDelivery::OnStart,
            surface_format:        SurfaceFormat::Bgra8,
            surface_alpha:         AlphaMode::Premultiplied,
            surface_size:          None,
        }
    }
}

/// One native call observed by the mock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockEvent {
    /// A device was created on the given driver
    DeviceCreated(DriverKind),
    /// A device was dropped
    DeviceReleased,
    /// A capture item was created
    ItemCreated(WindowHandle),
    /// A frame pool was created
    PoolCreated,
    /// A session was created
    SessionCreated,
    /// Session toggles were applied
    SettingsApplied(SessionSettings),
    /// A frame handler was registered
    Subscribed,
    /// A frame handler was removed
    Detached,
    /// Capture started
    Started,
    /// A frame was accepted by the consumer
    FramePublished,
    /// A frame surface was read back
    SurfaceMapped,
    /// A session was closed
    SessionClosed,
    /// A frame pool was closed
    PoolClosed,
}

/// Snapshot of resource counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockStats {
    /// Device creation calls, failed ones included
    pub device_attempts:  usize,
    /// Devices successfully created
    pub devices_created:  usize,
    /// Devices not yet dropped
    pub devices_live:     usize,
    /// Frame pools created
    pub pools_created:    usize,
    /// Frame pools not yet closed
    pub pools_live:       usize,
    /// Sessions created
    pub sessions_created: usize,
    /// Sessions not yet closed
    pub sessions_live:    usize,
    /// Frame handlers not yet removed
    pub subscribers_live: usize,
    /// Frames accepted by a consumer
    pub frames_published: usize,
    /// Class name passed to the last capture item lookup
    pub last_class_name:  Option<String>,
}

#[derive(Debug, Default)]
struct Counters {
    device_attempts:  AtomicUsize,
    devices_created:  AtomicUsize,
    devices_live:     AtomicUsize,
    pools_created:    AtomicUsize,
    pools_live:       AtomicUsize,
    sessions_created: AtomicUsize,
    sessions_live:    AtomicUsize,
    subscribers_live: AtomicUsize,
    frames_published: AtomicUsize,
}

#[derive(Debug)]
struct MockState {
    config:          MockConfig,
    counters:        Counters,
    events:          Mutex<Vec<MockEvent>>,
    last_class_name: Mutex<Option<String>>,
}

impl MockState {
    fn record(&self, event: MockEvent) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).push(event);
    }
}

/// In-memory [`CapturePlatform`]
///
/// Cloning shares the counters and event log, so a test can hand one clone
/// to a [`WindowCapturer`](super::WindowCapturer) and inspect another.
#[derive(Debug, Clone)]
pub struct MockPlatform {
    state: Arc<MockState>,
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPlatform {
    /// Creates a mock that succeeds at everything
    pub fn new() -> Self {
        Self::with_config(MockConfig::default())
    }

    /// Creates a mock with custom behavior
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            state: Arc::new(MockState {
                config,
                counters: Counters::default(),
                events: Mutex::new(Vec::new()),
                last_class_name: Mutex::new(None),
            }),
        }
    }

    /// Active configuration
    pub fn config(&self) -> &MockConfig {
        &self.state.config
    }

    /// Current counter values
    pub fn stats(&self) -> MockStats {
        let c = &self.state.counters;
        MockStats {
            device_attempts:  c.device_attempts.load(Ordering::SeqCst),
            devices_created:  c.devices_created.load(Ordering::SeqCst),
            devices_live:     c.devices_live.load(Ordering::SeqCst),
            pools_created:    c.pools_created.load(Ordering::SeqCst),
            pools_live:       c.pools_live.load(Ordering::SeqCst),
            sessions_created: c.sessions_created.load(Ordering::SeqCst),
            sessions_live:    c.sessions_live.load(Ordering::SeqCst),
            subscribers_live: c.subscribers_live.load(Ordering::SeqCst),
            frames_published: c.frames_published.load(Ordering::SeqCst),
            last_class_name:  self
                .state
                .last_class_name
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
        }
    }

    /// Every native call so far, in order
    pub fn events(&self) -> Vec<MockEvent> {
        self.state.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// Mock rendering device; released on drop
#[derive(Debug)]
pub struct MockDevice {
    state:  Arc<MockState>,
    driver: DriverKind,
}

impl MockDevice {
    /// Driver the device was created on
    pub fn driver(&self) -> DriverKind {
        self.driver
    }
}

impl Drop for MockDevice {
    fn drop(&mut self) {
        self.state.counters.devices_live.fetch_sub(1, Ordering::SeqCst);
        self.state.record(MockEvent::DeviceReleased);
    }
}

/// Mock capture-API device view
#[derive(Debug)]
pub struct MockInterop {
    driver: DriverKind,
}

/// Mock capture item
#[derive(Debug, Clone)]
pub struct MockItem {
    window: WindowHandle,
    size:   Size,
}

type Subscriber = Arc<Mutex<Option<Arc<FrameSlot<MockFrame>>>>>;

/// Mock frame pool
#[derive(Debug)]
pub struct MockPool {
    size:       Size,
    subscriber: Subscriber,
    closed:     Arc<AtomicBool>,
}

/// Mock capture session
#[derive(Debug)]
pub struct MockSession {
    window:     WindowHandle,
    size:       Size,
    subscriber: Subscriber,
    closed:     Arc<AtomicBool>,
}

/// Mock captured frame
#[derive(Debug)]
pub struct MockFrame {
    size:        Size,
    pool_closed: Arc<AtomicBool>,
}

/// Deterministic pattern every mock surface carries, as straight BGRA
pub fn mock_pixel(x: u32, y: u32) -> [u8; 4] {
    [x as u8, y as u8, (x ^ y) as u8, 255]
}

fn surface_bytes(format: SurfaceFormat, size: Size) -> (usize, Vec<u8>) {
    let bpp = format.bytes_per_pixel().unwrap_or(4);
    let stride = size.width as usize * bpp + MOCK_ROW_PADDING;
    let mut bytes = vec![0xCD; stride * size.height as usize];

    for y in 0..size.height {
        for x in 0..size.width {
            let [b, g, r, a] = mock_pixel(x, y);
            let offset = y as usize * stride + x as usize * bpp;
            let px = &mut bytes[offset..offset + bpp];
            match format {
                SurfaceFormat::Rgba8 | SurfaceFormat::Rgba8Srgb => px.copy_from_slice(&[r, g, b, a]),
                SurfaceFormat::Rgba16Float => {
                    // exact binary16 values for 0.0 and 1.0 only
                    let half = |c: u8| if c >= 128 { 0x3C00u16 } else { 0 };
                    for (i, c) in [r, g, b, a].into_iter().enumerate() {
                        px[i * 2..i * 2 + 2].copy_from_slice(&half(c).to_le_bytes());
                    }
                }
                _ => px.copy_from_slice(&[b, g, r, a]),
            }
        }
    }

    (stride, bytes)
}

impl MockPlatform {
    fn publish(state: &MockState, slot: &FrameSlot<MockFrame>, frame: MockFrame) {
        if slot.deliver(Ok(frame)) {
            state.counters.frames_published.fetch_add(1, Ordering::SeqCst);
            state.record(MockEvent::FramePublished);
        }
    }
}

impl CapturePlatform for MockPlatform {
    type Device = MockDevice;
    type Interop = MockInterop;
    type Item = MockItem;
    type Pool = MockPool;
    type Session = MockSession;
    type Frame = MockFrame;

    fn create_device(
        &self,
        driver: DriverKind,
        levels: &[FeatureLevel],
    ) -> Result<(MockDevice, FeatureLevel), NativeError> {
        let state = &self.state;
        state.counters.device_attempts.fetch_add(1, Ordering::SeqCst);

        let fails = match driver {
            DriverKind::Hardware => state.config.fail_hardware,
            DriverKind::Software => state.config.fail_software,
        };
        if fails {
            return Err(NativeError::new(
                DXGI_ERROR_UNSUPPORTED,
                format!("mock {} driver unavailable", driver),
            ));
        }
        let Some(&level) = levels.first() else {
            return Err(NativeError::new(E_INVALIDARG, "no feature levels requested"));
        };

        state.counters.devices_created.fetch_add(1, Ordering::SeqCst);
        state.counters.devices_live.fetch_add(1, Ordering::SeqCst);
        state.record(MockEvent::DeviceCreated(driver));
        Ok((
            MockDevice {
                state: Arc::clone(state),
                driver,
            },
            level,
        ))
    }

    fn exchange_interface(&self, device: &MockDevice) -> Result<MockInterop, NativeError> {
        if self.state.config.no_exchange_interface {
            return Err(NativeError::new(E_NOINTERFACE, "E_NOINTERFACE: no such interface supported"));
        }
        Ok(MockInterop {
            driver: device.driver,
        })
    }

    fn create_item(&self, class_name: &str, window: WindowHandle) -> Result<(MockItem, Size), NativeError> {
        *self.state.last_class_name.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(class_name.to_string());

        if self.state.config.closed_windows.contains(&window) {
            return Err(NativeError::new(ERROR_INVALID_WINDOW_HANDLE, "invalid window handle"));
        }

        let size = self.state.config.window_size;
        self.state.record(MockEvent::ItemCreated(window));
        Ok((MockItem { window, size }, size))
    }

    fn create_frame_pool(&self, interop: &MockInterop, size: Size, buffer_depth: u32) -> Result<MockPool, NativeError> {
        if buffer_depth == 0 {
            return Err(NativeError::new(E_INVALIDARG, "buffer depth must be at least 1"));
        }
        tracing::trace!("Mock pool on {} device, depth {}", interop.driver, buffer_depth);

        self.state.counters.pools_created.fetch_add(1, Ordering::SeqCst);
        self.state.counters.pools_live.fetch_add(1, Ordering::SeqCst);
        self.state.record(MockEvent::PoolCreated);
        Ok(MockPool {
            size,
            subscriber: Arc::new(Mutex::new(None)),
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    fn create_session(&self, pool: &MockPool, item: &MockItem) -> Result<MockSession, NativeError> {
        if self.state.config.fail_session {
            return Err(NativeError::new(E_FAIL, "mock session refused"));
        }

        self.state.counters.sessions_created.fetch_add(1, Ordering::SeqCst);
        self.state.counters.sessions_live.fetch_add(1, Ordering::SeqCst);
        self.state.record(MockEvent::SessionCreated);
        Ok(MockSession {
            window:     item.window,
            size:       item.size,
            subscriber: Arc::clone(&pool.subscriber),
            closed:     Arc::clone(&pool.closed),
        })
    }

    fn apply_session_settings(&self, _session: &MockSession, settings: SessionSettings) {
        self.state.record(MockEvent::SettingsApplied(settings));
    }

    fn subscribe(&self, pool: &MockPool, slot: Arc<FrameSlot<MockFrame>>) -> Result<DetachHook, NativeError> {
        *pool.subscriber.lock().unwrap_or_else(PoisonError::into_inner) = Some(slot);
        self.state.counters.subscribers_live.fetch_add(1, Ordering::SeqCst);
        self.state.record(MockEvent::Subscribed);

        let subscriber = Arc::clone(&pool.subscriber);
        let state = Arc::clone(&self.state);
        Ok(Box::new(move || {
            let removed = subscriber.lock().unwrap_or_else(PoisonError::into_inner).take();
            if removed.is_some() {
                state.counters.subscribers_live.fetch_sub(1, Ordering::SeqCst);
                state.record(MockEvent::Detached);
            }
        }))
    }

    fn start_capture(&self, session: &MockSession) -> Result<(), NativeError> {
        if self.state.config.fail_start {
            return Err(NativeError::new(E_FAIL, "mock capture refused to start"));
        }
        self.state.record(MockEvent::Started);
        tracing::trace!("Mock capture started for window {}", session.window);

        let delivery = self.state.config.delivery;
        if delivery == FrameDelivery::Never {
            return Ok(());
        }

        let size = self.state.config.surface_size.unwrap_or(session.size);
        let subscriber = Arc::clone(&session.subscriber);
        let pool_closed = Arc::clone(&session.closed);
        let state = Arc::clone(&self.state);

        thread::spawn(move || {
            if let FrameDelivery::After(delay) = delivery {
                thread::sleep(delay);
            }
            // notifications already dispatched keep their slot
            let slot = subscriber.lock().unwrap_or_else(PoisonError::into_inner).clone();
            let Some(slot) = slot else {
                return;
            };

            let notifications = if delivery == FrameDelivery::Twice { 2 } else { 1 };
            for _ in 0..notifications {
                let frame = MockFrame {
                    size,
                    pool_closed: Arc::clone(&pool_closed),
                };
                MockPlatform::publish(&state, &slot, frame);
            }
        });

        Ok(())
    }

    fn map_surface<R, F>(&self, device: &MockDevice, frame: &MockFrame, f: F) -> CaptureResult<R>
    where
        F: FnOnce(SurfaceView<'_>) -> CaptureResult<R>,
    {
        if frame.pool_closed.load(Ordering::SeqCst) {
            return Err(CaptureError::Conversion {
                reason: "frame read after its pool was closed".to_string(),
            });
        }
        tracing::trace!("Mapping mock surface on {} device", device.driver);

        let format = self.state.config.surface_format;
        let (stride, bytes) = surface_bytes(format, frame.size);
        self.state.record(MockEvent::SurfaceMapped);

        f(SurfaceView {
            format,
            alpha: self.state.config.surface_alpha,
            width: frame.size.width,
            height: frame.size.height,
            stride,
            bytes: &bytes,
        })
    }

    fn close_session(&self, session: MockSession) {
        tracing::trace!("Closing mock session for window {}", session.window);
        self.state.counters.sessions_live.fetch_sub(1, Ordering::SeqCst);
        self.state.record(MockEvent::SessionClosed);
    }

    fn close_pool(&self, pool: MockPool) {
        tracing::trace!("Closing mock pool {}", pool.size);
        pool.closed.store(true, Ordering::SeqCst);
        self.state.counters.pools_live.fetch_sub(1, Ordering::SeqCst);
        self.state.record(MockEvent::PoolClosed);
    }
}
