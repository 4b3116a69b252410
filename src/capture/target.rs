//! Capture target resolution
//!
//! Turns an opaque window handle into a capture item through the activation
//! factory of the capture-item runtime class. The content size is read once
//! here and never updated; a window resized afterwards is handled by the
//! converter, which crops or pads to this size.

use super::{CapturePlatform, constants::CAPTURE_ITEM_CLASS};
use crate::{
    error::{CaptureError, CaptureResult},
    model::{Size, WindowHandle},
};

/// A window resolved into a capturable surface
pub struct CaptureTarget<P: CapturePlatform> {
    window: WindowHandle,
    item:   P::Item,
    size:   Size,
}

impl<P: CapturePlatform> CaptureTarget<P> {
    /// Window this target was resolved from
    pub fn window(&self) -> WindowHandle {
        self.window
    }

    /// Native capture item
    pub fn item(&self) -> &P::Item {
        &self.item
    }

    /// Content size at resolution time
    pub fn size(&self) -> Size {
        self.size
    }
}

impl<P: CapturePlatform> std::fmt::Debug for CaptureTarget<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureTarget")
            .field("window", &self.window)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Resolves window handles into [`CaptureTarget`]s
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetResolver {
    class_name: String,
}

impl Default for TargetResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl TargetResolver {
    /// Resolver using `Windows.Graphics.Capture.GraphicsCaptureItem`
    pub fn new() -> Self {
        Self::with_class_name(CAPTURE_ITEM_CLASS)
    }

    /// Resolver using a different runtime class for the activation factory
    pub fn with_class_name(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
        }
    }

    /// Runtime class name used for factory lookup
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Resolves `window`
    ///
    /// Fails with [`CaptureError::TargetNotCapturable`] when the handle is
    /// null, names no live window, the compositor refuses capture, or the
    /// window has no visible area.
    pub fn resolve_window<P: CapturePlatform>(
        &self,
        platform: &P,
        window: WindowHandle,
    ) -> CaptureResult<CaptureTarget<P>> {
        if window.is_null() {
            return Err(CaptureError::TargetNotCapturable {
                window,
                reason: "null window handle".to_string(),
            });
        }

        let (item, size) = platform.create_item(&self.class_name, window).map_err(|e| {
            tracing::warn!("Window {} rejected by the capture API: {}", window, e);
            CaptureError::TargetNotCapturable {
                window,
                reason: e.to_string(),
            }
        })?;

        if size.is_empty() {
            return Err(CaptureError::TargetNotCapturable {
                window,
                reason: format!("window content size {} has no area", size),
            });
        }

        tracing::debug!("Resolved window {} with content size {}", window, size);
        Ok(CaptureTarget { window, item, size })
    }
}
