//! mindreader-hw — V4L2 camera capture for the Mind Reader tracker.
//!
//! Opens the camera at 640x480, negotiates YUYV/GREY/Y16 and hands decoded
//! frames to the core through the `CaptureDevice` trait.

pub mod camera;
pub mod frame;

pub use camera::{DeviceInfo, V4l2Capture};
pub use frame::PixelFormat;
