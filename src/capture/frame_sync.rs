//! One-shot bridge from the frame-arrival callback to a waiting caller
//!
//! The compositor raises frame notifications on a thread it owns. A
//! [`FrameSlot`] is handed to that callback; the first call to
//! [`FrameSlot::deliver`] unsubscribes the handler and publishes the frame to
//! the paired [`FrameWaiter`]. Every later notification is dropped.
//!
//! ```
//! use std::time::Duration;
//!
//! use window_snap::capture::frame_sync::FrameSlot;
//!
//! let (slot, waiter) = FrameSlot::<u32>::channel();
//! assert!(slot.deliver(Ok(7)));
//! assert!(!slot.deliver(Ok(8)));
//! assert_eq!(waiter.wait(Duration::from_millis(10)).unwrap(), 7);
//! ```

use std::{
    sync::{
        Arc, Mutex, PoisonError,
        mpsc::{self, Receiver, RecvTimeoutError, SyncSender},
    },
    time::Duration,
};

use crate::error::{CaptureError, CaptureResult};

/// Unsubscribes a frame handler; runs at most once
pub type DetachHook = Box<dyn FnOnce() + Send>;

/// Producer half, shared with the platform's frame callback
pub struct FrameSlot<F> {
    sender: Mutex<Option<SyncSender<CaptureResult<F>>>>,
    detach: Mutex<Option<DetachHook>>,
}

/// Consumer half, owned by the capture session
#[derive(Debug)]
pub struct FrameWaiter<F> {
    receiver: Receiver<CaptureResult<F>>,
}

impl<F: Send> FrameSlot<F> {
    /// Creates a connected slot and waiter
    pub fn channel() -> (Arc<Self>, FrameWaiter<F>) {
        let (tx, rx) = mpsc::sync_channel(1);
        let slot = Arc::new(Self {
            sender: Mutex::new(Some(tx)),
            detach: Mutex::new(None),
        });
        (slot, FrameWaiter { receiver: rx })
    }

    /// Publishes the first result; returns false if one was already published
    ///
    /// The handler is detached before the result is pushed, so once the
    /// waiter observes a frame no further callbacks run. Publishing never
    /// blocks, even when the waiter has given up.
    pub fn deliver(&self, result: CaptureResult<F>) -> bool {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(sender) = sender else {
            tracing::trace!("Ignoring frame notification after the first");
            return false;
        };

        self.detach_now();

        if sender.try_send(result).is_err() {
            tracing::debug!("Frame waiter is gone; dropping delivered frame");
        }
        true
    }

    /// Installs the unsubscribe hook
    ///
    /// If a frame was already delivered the hook runs immediately.
    pub fn set_detach(&self, hook: DetachHook) {
        *self.detach.lock().unwrap_or_else(PoisonError::into_inner) = Some(hook);
        if self.is_delivered() {
            self.detach_now();
        }
    }

    /// Runs the unsubscribe hook if it has not run yet
    pub fn detach_now(&self) {
        let hook = self.detach.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(hook) = hook {
            hook();
        }
    }

    /// True once a result has been published (or the slot was closed)
    pub fn is_delivered(&self) -> bool {
        self.sender.lock().unwrap_or_else(PoisonError::into_inner).is_none()
    }

    /// Stops accepting frames without publishing anything
    ///
    /// The waiter sees a disconnected channel.
    pub fn close(&self) {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner).take();
        drop(sender);
        self.detach_now();
    }
}

impl<F> std::fmt::Debug for FrameSlot<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let delivered = self.sender.lock().map(|s| s.is_none()).unwrap_or(true);
        f.debug_struct("FrameSlot").field("delivered", &delivered).finish()
    }
}

impl<F> FrameWaiter<F> {
    /// Blocks until a frame is published or `timeout` passes
    pub fn wait(&self, timeout: Duration) -> CaptureResult<F> {
        let duration_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        match self.receiver.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!("No frame arrived within {}ms", duration_ms);
                Err(CaptureError::CaptureTimeout { duration_ms })
            }
            Err(RecvTimeoutError::Disconnected) => {
                tracing::warn!("Frame source closed before delivering a frame");
                Err(CaptureError::CaptureTimeout { duration_ms })
            }
        }
    }
}
