//! Error types for window capture operations
//!
//! `CaptureError` is the closed set of failures the capture pipeline reports
//! to callers. Native status codes never cross a component boundary as-is:
//! the platform seam returns [`NativeError`] and each component translates it
//! into the variant that names what went wrong at its level.

use std::fmt;

use crate::model::{DriverKind, WindowHandle};

/// Result type alias for capture operations
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Failure reported by the native graphics/compositor API
///
/// Carries the raw status code (an `HRESULT` on Windows) and the system
/// message for it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} (0x{code:08X})")]
pub struct NativeError {
    /// Native status code
    pub code:    i32,
    /// Human-readable message from the platform
    pub message: String,
}

impl NativeError {
    /// Creates a native error from a status code and message
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// One failed device-creation attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceAttempt {
    /// Driver kind that was tried
    pub driver: DriverKind,
    /// Why it failed
    pub error:  NativeError,
}

impl fmt::Display for DeviceAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.driver, self.error)
    }
}

fn join_attempts(attempts: &[DeviceAttempt]) -> String {
    attempts.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Error type for window capture operations
///
/// Each variant includes detailed context and provides remediation hints
/// through the `remediation_hint()` method.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// No GPU device could be created with any driver
    #[error("Failed to create a GPU device ({})", join_attempts(.attempts))]
    DeviceCreation {
        /// Every attempt made, in order
        attempts: Vec<DeviceAttempt>,
    },

    /// The GPU device could not be exposed to the capture API
    #[error("GPU device is not usable for capture: {reason}")]
    Adapter {
        /// Why the adaptation failed
        reason: String,
    },

    /// The window cannot be captured
    #[error("Window {window} cannot be captured: {reason}")]
    TargetNotCapturable {
        /// Window that was requested
        window: WindowHandle,
        /// Why it was refused
        reason: String,
    },

    /// No frame arrived before the deadline
    #[error("Capture operation timed out after {duration_ms}ms")]
    CaptureTimeout {
        /// Timeout duration in milliseconds
        duration_ms: u64,
    },

    /// The captured surface could not be turned into a pixel buffer
    #[error("Failed to convert captured surface: {reason}")]
    Conversion {
        /// Reason for conversion failure
        reason: String,
    },

    /// PNG encoding or file placement failed
    #[error("Failed to encode image as PNG: {reason}")]
    Encode {
        /// Reason for encoding failure
        reason: String,
    },

    /// Invalid parameter provided
    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        /// Name of the invalid parameter
        parameter: String,
        /// Reason why it's invalid
        reason:    String,
    },
}

impl CaptureError {
    /// Returns an actionable remediation hint for this error
    ///
    /// # Examples
    ///
    /// ```
    /// use window_snap::error::CaptureError;
    ///
    /// let error = CaptureError::CaptureTimeout { duration_ms: 5000 };
    /// assert!(error.remediation_hint().contains("minimized"));
    /// ```
    pub fn remediation_hint(&self) -> &str {
        match self {
            CaptureError::DeviceCreation { .. } => {
                "Neither the hardware GPU nor the WARP software rasterizer could be initialized. \
                 Update the graphics driver and make sure the process runs in an interactive \
                 desktop session."
            }
            CaptureError::Adapter { .. } => {
                "The GPU device was lost or does not expose DXGI. Retry the capture; a fresh \
                 device will be created."
            }
            CaptureError::TargetNotCapturable { .. } => {
                "The window handle is invalid, the window was closed, or the compositor refused \
                 capture. Select the window again and make sure it is not minimized to zero size."
            }
            CaptureError::CaptureTimeout { .. } => {
                "No frame arrived in time. The window may be minimized or fully occluded, or the \
                 GPU is under heavy load. Restore the window and retry, or raise the timeout."
            }
            CaptureError::Conversion { .. } => {
                "The captured surface uses a pixel format that cannot be converted. Disable HDR \
                 for the display and retry."
            }
            CaptureError::Encode { .. } => {
                "Writing the PNG failed. Check that the destination directory exists, is \
                 writable, and has free disk space."
            }
            CaptureError::InvalidParameter { parameter, .. } => match parameter.as_str() {
                "window" => "Pass the window handle as a decimal number or 0x-prefixed hex.",
                "crop" => "Crop regions are X,Y,W,H and must lie inside the captured frame.",
                "config" => "Check the options file is valid JSON with known keys only.",
                _ => "Check the parameter value against the documentation.",
            },
        }
    }

    /// Returns true when simply retrying the same capture may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, CaptureError::CaptureTimeout { .. } | CaptureError::Adapter { .. })
    }
}
