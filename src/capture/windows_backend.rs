//! Windows Graphics Capture backend
//!
//! Implements [`CapturePlatform`] on top of Direct3D 11 and the
//! `Windows.Graphics.Capture` runtime classes:
//!
//! - **Device**: `D3D11CreateDevice` with BGRA support, wrapped for WinRT via
//!   `CreateDirect3D11DeviceFromDXGIDevice`
//! - **Item**: `IGraphicsCaptureItemInterop::CreateForWindow`, obtained from
//!   the activation factory of the configured class name
//! - **Pool**: a free-threaded `Direct3D11CaptureFramePool`, so frame
//!   notifications arrive on a system worker thread and no message pump is
//!   needed
//! - **Readback**: a staging texture copy mapped for CPU reads
//!
//! # Windows Version Requirements
//!
//! Window capture needs Windows 10 version 1903 or later. The border toggle
//! needs Windows 11; older systems silently keep the border.
//!
//! # Threading
//!
//! Every entry point makes sure the calling thread has joined the
//! multithreaded apartment. The pipeline runs on blocking worker threads,
//! which are reused, so the apartment is entered once per thread and left
//! when the thread exits.

use std::sync::Arc;

use windows::{
    Foundation::TypedEventHandler,
    Graphics::{
        Capture::{Direct3D11CaptureFrame, Direct3D11CaptureFramePool, GraphicsCaptureItem, GraphicsCaptureSession},
        DirectX::{Direct3D11::IDirect3DDevice, DirectXPixelFormat},
        SizeInt32,
    },
    Win32::{
        Foundation::{E_INVALIDARG, E_POINTER, ERROR_INVALID_WINDOW_HANDLE, HMODULE, HWND},
        Graphics::{
            Direct3D::{
                D3D_DRIVER_TYPE, D3D_DRIVER_TYPE_HARDWARE, D3D_DRIVER_TYPE_WARP, D3D_FEATURE_LEVEL,
                D3D_FEATURE_LEVEL_9_1, D3D_FEATURE_LEVEL_9_2, D3D_FEATURE_LEVEL_9_3, D3D_FEATURE_LEVEL_10_0,
                D3D_FEATURE_LEVEL_10_1, D3D_FEATURE_LEVEL_11_0, D3D_FEATURE_LEVEL_11_1,
            },
            Direct3D11::{
                D3D11_CPU_ACCESS_READ, D3D11_CREATE_DEVICE_BGRA_SUPPORT, D3D11_MAP_READ, D3D11_MAPPED_SUBRESOURCE,
                D3D11_SDK_VERSION, D3D11_TEXTURE2D_DESC, D3D11_USAGE_STAGING, D3D11CreateDevice, ID3D11Device,
                ID3D11DeviceContext, ID3D11Texture2D,
            },
            Dxgi::{
                Common::{
                    DXGI_FORMAT, DXGI_FORMAT_B8G8R8A8_UNORM, DXGI_FORMAT_B8G8R8A8_UNORM_SRGB,
                    DXGI_FORMAT_B8G8R8X8_UNORM, DXGI_FORMAT_R8G8B8A8_UNORM, DXGI_FORMAT_R8G8B8A8_UNORM_SRGB,
                    DXGI_FORMAT_R16G16B16A16_FLOAT,
                },
                IDXGIDevice,
            },
        },
        System::WinRT::{
            Direct3D11::{CreateDirect3D11DeviceFromDXGIDevice, IDirect3DDxgiInterfaceAccess},
            Graphics::Capture::IGraphicsCaptureItemInterop,
            RO_INIT_MULTITHREADED, RoGetActivationFactory, RoInitialize, RoUninitialize,
        },
        UI::WindowsAndMessaging::IsWindow,
    },
    core::{HSTRING, IInspectable, Interface},
};

use super::{CapturePlatform, DetachHook, FrameSlot, SessionSettings, SurfaceView};
use crate::{
    error::{CaptureError, CaptureResult, NativeError},
    model::{AlphaMode, DriverKind, FeatureLevel, Size, SurfaceFormat, WindowHandle},
};

fn native(e: windows::core::Error) -> NativeError {
    NativeError::new(e.code().0, e.message().to_string())
}

fn conversion(context: &str, e: windows::core::Error) -> CaptureError {
    CaptureError::Conversion {
        reason: format!("{}: {}", context, native(e)),
    }
}

struct Apartment {
    joined: bool,
}

impl Apartment {
    fn enter() -> Self {
        // S_FALSE (already joined) is a success and still needs a matching uninit
        let joined = unsafe { RoInitialize(RO_INIT_MULTITHREADED) }.is_ok();
        if !joined {
            tracing::debug!("Thread already joined a different apartment");
        }
        Self { joined }
    }
}

impl Drop for Apartment {
    fn drop(&mut self) {
        if self.joined {
            unsafe { RoUninitialize() };
        }
    }
}

thread_local! {
    static APARTMENT: Apartment = Apartment::enter();
}

fn ensure_apartment() {
    APARTMENT.with(|_| {});
}

/// Direct3D 11 device and its immediate context
pub struct D3dDevice {
    device:  ID3D11Device,
    context: ID3D11DeviceContext,
}

// SAFETY: the device is created without D3D11_CREATE_DEVICE_SINGLETHREADED,
// so it is free-threaded. The immediate context is only used by the one
// capture that holds the device cache lock.
unsafe impl Send for D3dDevice {}

/// Frame handed from the pool's worker thread to the capture thread
pub struct WgcFrame(Direct3D11CaptureFrame);

// SAFETY: frames from a free-threaded pool are agile COM objects.
unsafe impl Send for WgcFrame {}

impl Drop for WgcFrame {
    fn drop(&mut self) {
        // returns the buffer to the pool right away instead of at final release
        let _ = self.0.Close();
    }
}

struct AgilePool(Direct3D11CaptureFramePool);

// SAFETY: created with CreateFreeThreaded, which makes the pool agile.
unsafe impl Send for AgilePool {}

/// Windows Graphics Capture platform
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsPlatform;

impl WindowsPlatform {
    /// Creates the platform
    pub fn new() -> Self {
        Self
    }

    /// True when the capture runtime is available on this system
    pub fn is_supported() -> bool {
        ensure_apartment();
        GraphicsCaptureSession::IsSupported().unwrap_or(false)
    }
}

fn driver_type(driver: DriverKind) -> D3D_DRIVER_TYPE {
    match driver {
        DriverKind::Hardware => D3D_DRIVER_TYPE_HARDWARE,
        DriverKind::Software => D3D_DRIVER_TYPE_WARP,
    }
}

fn d3d_level(level: FeatureLevel) -> D3D_FEATURE_LEVEL {
    match level {
        FeatureLevel::Level9_1 => D3D_FEATURE_LEVEL_9_1,
        FeatureLevel::Level9_2 => D3D_FEATURE_LEVEL_9_2,
        FeatureLevel::Level9_3 => D3D_FEATURE_LEVEL_9_3,
        FeatureLevel::Level10_0 => D3D_FEATURE_LEVEL_10_0,
        FeatureLevel::Level10_1 => D3D_FEATURE_LEVEL_10_1,
        FeatureLevel::Level11_0 => D3D_FEATURE_LEVEL_11_0,
        FeatureLevel::Level11_1 => D3D_FEATURE_LEVEL_11_1,
    }
}

fn feature_level(level: D3D_FEATURE_LEVEL) -> Option<FeatureLevel> {
    FeatureLevel::DESCENDING.iter().copied().find(|l| d3d_level(*l) == level)
}

fn surface_format(format: DXGI_FORMAT) -> SurfaceFormat {
    match format {
        DXGI_FORMAT_B8G8R8A8_UNORM => SurfaceFormat::Bgra8,
        DXGI_FORMAT_B8G8R8A8_UNORM_SRGB => SurfaceFormat::Bgra8Srgb,
        DXGI_FORMAT_B8G8R8X8_UNORM => SurfaceFormat::Bgrx8,
        DXGI_FORMAT_R8G8B8A8_UNORM => SurfaceFormat::Rgba8,
        DXGI_FORMAT_R8G8B8A8_UNORM_SRGB => SurfaceFormat::Rgba8Srgb,
        DXGI_FORMAT_R16G16B16A16_FLOAT => SurfaceFormat::Rgba16Float,
        other => SurfaceFormat::Other(other.0 as u32),
    }
}

fn alpha_mode(format: SurfaceFormat) -> AlphaMode {
    match format {
        SurfaceFormat::Bgrx8 => AlphaMode::Ignore,
        _ => AlphaMode::Premultiplied,
    }
}

fn size_int32(size: Size) -> Result<SizeInt32, NativeError> {
    match (i32::try_from(size.width), i32::try_from(size.height)) {
        (Ok(width), Ok(height)) => Ok(SizeInt32 {
            Width:  width,
            Height: height,
        }),
        _ => Err(NativeError::new(E_INVALIDARG.0, format!("frame pool size {} out of range", size))),
    }
}

fn size_from(size: SizeInt32) -> Size {
    Size::new(size.Width.max(0) as u32, size.Height.max(0) as u32)
}

/// Looks up the activation factory of `class_name` as interface `I`
fn activation_factory<I: Interface>(class_name: &str) -> Result<I, NativeError> {
    unsafe { RoGetActivationFactory(&HSTRING::from(class_name)) }.map_err(native)
}

fn hwnd(window: WindowHandle) -> HWND {
    HWND(window.raw() as *mut _)
}

impl CapturePlatform for WindowsPlatform {
    type Device = D3dDevice;
    type Interop = IDirect3DDevice;
    type Item = GraphicsCaptureItem;
    type Pool = Direct3D11CaptureFramePool;
    type Session = GraphicsCaptureSession;
    type Frame = WgcFrame;

    fn create_device(
        &self,
        driver: DriverKind,
        levels: &[FeatureLevel],
    ) -> Result<(D3dDevice, FeatureLevel), NativeError> {
        ensure_apartment();

        let requested: Vec<D3D_FEATURE_LEVEL> = levels.iter().copied().map(d3d_level).collect();
        let mut device: Option<ID3D11Device> = None;
        let mut context: Option<ID3D11DeviceContext> = None;
        let mut achieved = D3D_FEATURE_LEVEL::default();

        unsafe {
            D3D11CreateDevice(
                None,
                driver_type(driver),
                HMODULE::default(),
                D3D11_CREATE_DEVICE_BGRA_SUPPORT,
                Some(requested.as_slice()),
                D3D11_SDK_VERSION,
                Some(&mut device),
                Some(&mut achieved),
                Some(&mut context),
            )
        }
        .map_err(native)?;

        let (Some(device), Some(context)) = (device, context) else {
            return Err(NativeError::new(E_POINTER.0, "D3D11CreateDevice returned no device"));
        };
        let level = feature_level(achieved)
            .or_else(|| levels.first().copied())
            .unwrap_or(FeatureLevel::Level9_1);

        Ok((D3dDevice { device, context }, level))
    }

    fn exchange_interface(&self, device: &D3dDevice) -> Result<IDirect3DDevice, NativeError> {
        let dxgi: IDXGIDevice = device.device.cast().map_err(native)?;
        let inspectable: IInspectable = unsafe { CreateDirect3D11DeviceFromDXGIDevice(&dxgi) }.map_err(native)?;
        inspectable.cast::<IDirect3DDevice>().map_err(native)
    }

    fn create_item(&self, class_name: &str, window: WindowHandle) -> Result<(GraphicsCaptureItem, Size), NativeError> {
        ensure_apartment();

        let hwnd = hwnd(window);
        if !unsafe { IsWindow(hwnd) }.as_bool() {
            return Err(NativeError::new(
                ERROR_INVALID_WINDOW_HANDLE.to_hresult().0,
                "invalid window handle",
            ));
        }

        let interop: IGraphicsCaptureItemInterop = activation_factory(class_name)?;
        let item: GraphicsCaptureItem = unsafe { interop.CreateForWindow(hwnd) }.map_err(native)?;
        let size = item.Size().map_err(native)?;

        Ok((item, size_from(size)))
    }

    fn create_frame_pool(
        &self,
        interop: &IDirect3DDevice,
        size: Size,
        buffer_depth: u32,
    ) -> Result<Direct3D11CaptureFramePool, NativeError> {
        let depth = i32::try_from(buffer_depth)
            .map_err(|_| NativeError::new(E_INVALIDARG.0, format!("frame pool depth {} out of range", buffer_depth)))?;
        Direct3D11CaptureFramePool::CreateFreeThreaded(
            interop,
            DirectXPixelFormat::B8G8R8A8UIntNormalized,
            depth,
            size_int32(size)?,
        )
        .map_err(native)
    }

    fn create_session(
        &self,
        pool: &Direct3D11CaptureFramePool,
        item: &GraphicsCaptureItem,
    ) -> Result<GraphicsCaptureSession, NativeError> {
        pool.CreateCaptureSession(item).map_err(native)
    }

    fn apply_session_settings(&self, session: &GraphicsCaptureSession, settings: SessionSettings) {
        if let Err(e) = session.SetIsCursorCaptureEnabled(settings.cursor) {
            tracing::debug!("Cursor toggle unavailable: {}", native(e));
        }
        if let Err(e) = session.SetIsBorderRequired(settings.border) {
            tracing::debug!("Border toggle unavailable: {}", native(e));
        }
    }

    fn subscribe(
        &self,
        pool: &Direct3D11CaptureFramePool,
        slot: Arc<FrameSlot<WgcFrame>>,
    ) -> Result<DetachHook, NativeError> {
        let handler = TypedEventHandler::<Direct3D11CaptureFramePool, IInspectable>::new(
            move |sender: &Option<Direct3D11CaptureFramePool>, _| {
                let Some(pool) = sender else {
                    return Ok(());
                };
                match pool.TryGetNextFrame() {
                    Ok(frame) => {
                        slot.deliver(Ok(WgcFrame(frame)));
                    }
                    Err(e) => {
                        slot.deliver(Err(CaptureError::Adapter {
                            reason: format!("frame could not be taken from the pool: {}", native(e)),
                        }));
                    }
                }
                Ok(())
            },
        );

        let token = pool.FrameArrived(&handler).map_err(native)?;
        let pool = AgilePool(pool.clone());
        Ok(Box::new(move || {
            if let Err(e) = pool.0.RemoveFrameArrived(token) {
                tracing::debug!("Frame handler removal failed: {}", native(e));
            }
        }))
    }

    fn start_capture(&self, session: &GraphicsCaptureSession) -> Result<(), NativeError> {
        session.StartCapture().map_err(native)
    }

    fn map_surface<R, F>(&self, device: &D3dDevice, frame: &WgcFrame, f: F) -> CaptureResult<R>
    where
        F: FnOnce(SurfaceView<'_>) -> CaptureResult<R>,
    {
        let surface = frame.0.Surface().map_err(|e| conversion("frame surface unavailable", e))?;
        let access: IDirect3DDxgiInterfaceAccess =
            surface.cast().map_err(|e| conversion("frame surface is not DXGI-backed", e))?;
        let source = unsafe { access.GetInterface::<ID3D11Texture2D>() }
            .map_err(|e| conversion("frame texture unavailable", e))?;

        let mut desc = D3D11_TEXTURE2D_DESC::default();
        unsafe { source.GetDesc(&mut desc) };
        let staging_desc = D3D11_TEXTURE2D_DESC {
            BindFlags: 0,
            MiscFlags: 0,
            Usage: D3D11_USAGE_STAGING,
            CPUAccessFlags: D3D11_CPU_ACCESS_READ.0 as u32,
            ..desc
        };

        let mut staging: Option<ID3D11Texture2D> = None;
        unsafe { device.device.CreateTexture2D(&staging_desc, None, Some(&mut staging)) }
            .map_err(|e| conversion("staging texture creation failed", e))?;
        let Some(staging) = staging else {
            return Err(CaptureError::Conversion {
                reason: "staging texture creation returned nothing".to_string(),
            });
        };

        let context = &device.context;
        unsafe { context.CopyResource(&staging, &source) };

        let mut mapped = D3D11_MAPPED_SUBRESOURCE::default();
        unsafe { context.Map(&staging, 0, D3D11_MAP_READ, 0, Some(&mut mapped)) }
            .map_err(|e| conversion("staging texture could not be mapped", e))?;

        let format = surface_format(desc.Format);
        let stride = mapped.RowPitch as usize;
        let len = stride * desc.Height as usize;
        let result = if mapped.pData.is_null() {
            Err(CaptureError::Conversion {
                reason: "mapped surface has no data".to_string(),
            })
        } else {
            // SAFETY: Map succeeded, so pData points at RowPitch * Height
            // readable bytes until Unmap below.
            let bytes = unsafe { std::slice::from_raw_parts(mapped.pData as *const u8, len) };
            f(SurfaceView {
                format,
                alpha: alpha_mode(format),
                width: desc.Width,
                height: desc.Height,
                stride,
                bytes,
            })
        };

        unsafe { context.Unmap(&staging, 0) };
        result
    }

    fn close_session(&self, session: GraphicsCaptureSession) {
        if let Err(e) = session.Close() {
            tracing::debug!("Session close failed: {}", native(e));
        }
    }

    fn close_pool(&self, pool: Direct3D11CaptureFramePool) {
        if let Err(e) = pool.Close() {
            tracing::debug!("Frame pool close failed: {}", native(e));
        }
    }
}
