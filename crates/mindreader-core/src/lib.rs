//! mindreader-core — Face tracking and emotion captioning engine.
//!
//! Uses SCRFD for face detection and a small FER-style CNN for expression
//! classification, both running via ONNX Runtime for CPU inference.

pub mod annotator;
pub mod captions;
pub mod capture;
pub mod classifier;
pub mod detector;
pub mod layout;
pub mod models;
pub mod overlay;
pub mod thoughts;
pub mod tracker;
pub mod types;

#[cfg(test)]
mod testing;

pub use annotator::{Annotator, SessionState, TickError, TickOutcome, CAPTION_INTERVAL, PREDICTION_INTERVAL};
pub use captions::CaptionBank;
pub use capture::{CaptureDevice, CaptureError};
pub use models::{ModelHandles, ModelLoadError, ModelProvider, OnnxModelLoader};
pub use overlay::Overlay;
pub use tracker::{StartError, StopHandle, Tracker, TrackerState};
pub use types::{Detection, EmotionLabel, FaceBox, Frame};
