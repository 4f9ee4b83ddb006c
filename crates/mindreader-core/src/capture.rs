//! Camera seam: a frame source that can be started and stopped by the tracker.

use crate::types::Frame;
use thiserror::Error;

/// Preferred capture resolution.
pub const PREFERRED_WIDTH: u32 = 640;
pub const PREFERRED_HEIGHT: u32 = 480;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("camera access is not available: {0}")]
    Unavailable(String),
    #[error("camera permission denied: {0}")]
    PermissionDenied(String),
    #[error("camera error: {0}")]
    Device(String),
}

pub trait CaptureDevice {
    /// Acquire the camera and block until the first frame is decodable.
    /// Calling it on a started device does nothing.
    fn start(&mut self) -> Result<(), CaptureError>;

    /// Release the camera. Safe to call when not started, and more than once.
    fn stop(&mut self);

    fn is_active(&self) -> bool;

    /// The current frame, or `None` while no decodable frame is available.
    fn frame(&mut self) -> Result<Option<Frame>, CaptureError>;
}
