//! V4L2 camera capture via the `v4l` crate.

use crate::frame::{self, PixelFormat};
use mindreader_core::capture::{CaptureDevice, CaptureError, PREFERRED_HEIGHT, PREFERRED_WIDTH};
use mindreader_core::Frame;
use std::io;
use std::path::Path;
use v4l::buffer::Type as BufType;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

/// Raw captures tried after warm-up before giving up on a decodable frame.
const FIRST_FRAME_ATTEMPTS: usize = 30;
const STREAM_BUFFERS: u32 = 4;

/// Info about a discovered V4L2 device.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub path: String,
    pub name: String,
    pub driver: String,
    pub bus: String,
}

/// An opened, format-negotiated and streaming device.
struct OpenDevice {
    // Owns the device handle; dropping it stops streaming and closes the device.
    stream: MmapStream<'static>,
    width: u32,
    height: u32,
    pixel_format: PixelFormat,
}

impl OpenDevice {
    fn open(device_path: &str) -> Result<Self, CaptureError> {
        if !Path::new(device_path).exists() {
            return Err(CaptureError::Unavailable(format!("no camera at {device_path}")));
        }

        let device = Device::with_path(device_path).map_err(|e| open_error(device_path, e))?;

        let caps = device
            .query_caps()
            .map_err(|e| CaptureError::Device(format!("failed to query capabilities: {e}")))?;
        tracing::info!(
            device = device_path,
            driver = %caps.driver,
            card = %caps.card,
            "opened camera"
        );
        if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
            return Err(CaptureError::Unavailable(format!(
                "{device_path} does not support video capture"
            )));
        }

        let mut fmt = device
            .format()
            .map_err(|e| CaptureError::Device(format!("failed to get format: {e}")))?;
        fmt.fourcc = FourCC::new(b"YUYV");
        fmt.width = PREFERRED_WIDTH;
        fmt.height = PREFERRED_HEIGHT;

        let negotiated = device
            .set_format(&fmt)
            .map_err(|e| CaptureError::Device(format!("failed to set format: {e}")))?;
        let pixel_format = pixel_format_for(negotiated.fourcc).ok_or_else(|| {
            CaptureError::Device(format!(
                "unsupported pixel format: {:?} (need YUYV, GREY, or Y16)",
                negotiated.fourcc
            ))
        })?;

        tracing::info!(
            width = negotiated.width,
            height = negotiated.height,
            fourcc = ?negotiated.fourcc,
            "negotiated format"
        );

        let stream = MmapStream::with_buffers(&device, BufType::VideoCapture, STREAM_BUFFERS)
            .map_err(|e| CaptureError::Device(format!("failed to create mmap stream: {e}")))?;

        Ok(Self {
            stream,
            width: negotiated.width,
            height: negotiated.height,
            pixel_format,
        })
    }

    /// Dequeue one buffer. `None` when it does not hold a full frame.
    fn capture(&mut self) -> Result<Option<Frame>, CaptureError> {
        let (buf, meta) = self
            .stream
            .next()
            .map_err(|e| CaptureError::Device(format!("failed to dequeue buffer: {e}")))?;

        match frame::decode(self.pixel_format, buf, self.width, self.height) {
            Ok(mut frame) => {
                frame.sequence = meta.sequence;
                Ok(Some(frame))
            }
            Err(e) => {
                tracing::debug!(seq = meta.sequence, error = %e, "partial frame");
                Ok(None)
            }
        }
    }
}

fn pixel_format_for(fourcc: FourCC) -> Option<PixelFormat> {
    if fourcc == FourCC::new(b"YUYV") {
        Some(PixelFormat::Yuyv)
    } else if fourcc == FourCC::new(b"GREY") {
        Some(PixelFormat::Grey)
    } else if fourcc == FourCC::new(b"Y16 ") || fourcc == FourCC::new(b"Y16\0") {
        Some(PixelFormat::Y16)
    } else {
        None
    }
}

/// Discard `warmup` captures, then poll up to `attempts` times for a decodable frame.
fn wait_for_frame<F>(mut next: F, warmup: usize, attempts: usize) -> Result<Option<Frame>, CaptureError>
where
    F: FnMut() -> Result<Option<Frame>, CaptureError>,
{
    // Auto-exposure settles over the first few frames.
    for _ in 0..warmup {
        next()?;
    }
    for _ in 0..attempts {
        if let Some(frame) = next()? {
            return Ok(Some(frame));
        }
    }
    Ok(None)
}

fn open_error(device_path: &str, e: io::Error) -> CaptureError {
    match e.kind() {
        io::ErrorKind::PermissionDenied => CaptureError::PermissionDenied(format!("{device_path}: {e}")),
        io::ErrorKind::NotFound => CaptureError::Unavailable(format!("{device_path}: {e}")),
        _ => CaptureError::Device(format!("{device_path}: {e}")),
    }
}

/// Capture controller for a single V4L2 device at 640x480.
pub struct V4l2Capture {
    device_path: String,
    warmup_frames: usize,
    open: Option<OpenDevice>,
}

impl V4l2Capture {
    pub fn new(device_path: impl Into<String>, warmup_frames: usize) -> Self {
        Self {
            device_path: device_path.into(),
            warmup_frames,
            open: None,
        }
    }

    /// List available V4L2 video capture devices.
    pub fn list_devices() -> Vec<DeviceInfo> {
        let mut devices = Vec::new();

        for i in 0..16 {
            let path = format!("/dev/video{i}");
            if !Path::new(&path).exists() {
                continue;
            }
            let Ok(dev) = Device::with_path(&path) else {
                continue;
            };
            let Ok(caps) = dev.query_caps() else {
                continue;
            };
            if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
                continue;
            }
            devices.push(DeviceInfo {
                path,
                name: caps.card.clone(),
                driver: caps.driver.clone(),
                bus: caps.bus.clone(),
            });
        }

        devices
    }
}

impl CaptureDevice for V4l2Capture {
    fn start(&mut self) -> Result<(), CaptureError> {
        if self.open.is_some() {
            return Ok(());
        }
        let mut device = OpenDevice::open(&self.device_path)?;

        let first = wait_for_frame(|| device.capture(), self.warmup_frames, FIRST_FRAME_ATTEMPTS)?;
        let Some(first) = first else {
            return Err(CaptureError::Device(format!(
                "{}: no complete frame after {FIRST_FRAME_ATTEMPTS} captures",
                self.device_path
            )));
        };

        tracing::info!(
            device = %self.device_path,
            width = device.width,
            height = device.height,
            seq = first.sequence,
            "camera streaming"
        );
        self.open = Some(device);
        Ok(())
    }

    fn stop(&mut self) {
        if self.open.take().is_some() {
            tracing::info!(device = %self.device_path, "camera released");
        }
    }

    fn is_active(&self) -> bool {
        self.open.is_some()
    }

    fn frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        match self.open.as_mut() {
            Some(device) => device.capture(),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_pixel_format_mapping() {
        assert_eq!(pixel_format_for(FourCC::new(b"YUYV")), Some(PixelFormat::Yuyv));
        assert_eq!(pixel_format_for(FourCC::new(b"GREY")), Some(PixelFormat::Grey));
        assert_eq!(pixel_format_for(FourCC::new(b"Y16 ")), Some(PixelFormat::Y16));
        assert_eq!(pixel_format_for(FourCC::new(b"MJPG")), None);
    }

    #[test]
    fn test_open_error_mapping() {
        let denied = open_error("/dev/video0", io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(denied, CaptureError::PermissionDenied(_)));
        let missing = open_error("/dev/video0", io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(missing, CaptureError::Unavailable(_)));
        let busy = open_error("/dev/video0", io::Error::from_raw_os_error(16));
        assert!(matches!(busy, CaptureError::Device(_)));
    }

    type Captured = Result<Option<Frame>, CaptureError>;

    fn scripted(results: Vec<Captured>) -> (impl FnMut() -> Captured, Rc<Cell<usize>>) {
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let mut results = results.into_iter();
        let next = move || {
            counter.set(counter.get() + 1);
            results.next().unwrap_or(Ok(None))
        };
        (next, calls)
    }

    fn tagged(sequence: u32) -> Frame {
        let mut frame = Frame::gray(vec![0; 4], 2, 2);
        frame.sequence = sequence;
        frame
    }

    #[test]
    fn test_warmup_frames_discarded_before_first_frame() {
        let (next, calls) = scripted(vec![
            Ok(Some(tagged(1))),
            Ok(Some(tagged(2))),
            Ok(None),
            Ok(Some(tagged(4))),
        ]);
        let first = wait_for_frame(next, 2, FIRST_FRAME_ATTEMPTS).unwrap();
        assert_eq!(first.map(|f| f.sequence), Some(4));
        assert_eq!(calls.get(), 4);
    }

    #[test]
    fn test_no_decodable_frame_within_attempts() {
        let (next, calls) = scripted(vec![]);
        assert!(wait_for_frame(next, 1, 3).unwrap().is_none());
        assert_eq!(calls.get(), 4);
    }

    #[test]
    fn test_dequeue_error_during_warmup_propagates() {
        let (next, calls) = scripted(vec![
            Ok(None),
            Err(CaptureError::Device("dequeue failed".into())),
            Ok(Some(tagged(3))),
        ]);
        assert!(matches!(wait_for_frame(next, 3, 5), Err(CaptureError::Device(_))));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_missing_device_is_unavailable_and_stop_is_safe() {
        let mut camera = V4l2Capture::new("/dev/video-does-not-exist", 0);
        camera.stop();
        assert!(matches!(camera.start(), Err(CaptureError::Unavailable(_))));
        assert!(!camera.is_active());
        assert!(camera.frame().unwrap().is_none());
        camera.stop();
        camera.stop();
    }
}
