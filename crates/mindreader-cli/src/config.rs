use std::path::PathBuf;
use std::time::Duration;

/// Tracker configuration, loaded from environment variables.
pub struct Config {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Directory containing the detector and emotion ONNX models.
    pub model_dir: PathBuf,
    /// Optional caption bank JSON overriding the built-in phrases.
    pub captions_path: Option<PathBuf>,
    /// Delay between ticks of the annotation loop.
    pub tick: Duration,
    /// Number of frames to discard after opening the camera (AE stabilization).
    pub warmup_frames: usize,
}

impl Config {
    /// Load configuration from `MINDREADER_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let model_dir = std::env::var("MINDREADER_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| mindreader_core::models::default_model_dir());

        Self {
            camera_device: std::env::var("MINDREADER_CAMERA_DEVICE")
                .unwrap_or_else(|_| "/dev/video0".to_string()),
            model_dir,
            captions_path: std::env::var("MINDREADER_CAPTIONS").ok().map(PathBuf::from),
            tick: Duration::from_millis(env_u64("MINDREADER_TICK_MS", 33).max(1)),
            warmup_frames: env_usize("MINDREADER_WARMUP_FRAMES", 4),
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
