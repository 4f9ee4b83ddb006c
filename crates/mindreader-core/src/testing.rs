//! Scripted stand-ins for the model, camera and presentation seams.

use crate::capture::{CaptureDevice, CaptureError};
use crate::classifier::{ClassifierConfig, ClassifierError, EmotionClassifier};
use crate::detector::{DetectorError, FaceDetector};
use crate::layout::CaptionPosition;
use crate::overlay::Overlay;
use crate::types::{Detection, EmotionLabel, FaceBox, Frame};
use ndarray::Array4;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Replays queued detection batches, repeating the last one once the queue drains.
pub struct FakeDetector {
    scripted: Arc<Mutex<VecDeque<Vec<Detection>>>>,
    last: Vec<Detection>,
    pub calls: Arc<AtomicUsize>,
}

impl FakeDetector {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self {
            scripted: Arc::new(Mutex::new(VecDeque::new())),
            last: detections,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn script(&self) -> Arc<Mutex<VecDeque<Vec<Detection>>>> {
        Arc::clone(&self.scripted)
    }
}

impl FaceDetector for FakeDetector {
    fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>, DetectorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(next) = self.scripted.lock().unwrap().pop_front() {
            self.last = next;
        }
        Ok(self.last.clone())
    }
}

/// Replays queued score vectors, repeating the last one once the queue drains.
pub struct FakeClassifier {
    scripted: Arc<Mutex<VecDeque<Vec<f32>>>>,
    last: Vec<f32>,
    config: ClassifierConfig,
    pub calls: Arc<AtomicUsize>,
    pub shapes: Arc<Mutex<Vec<Vec<usize>>>>,
}

impl FakeClassifier {
    pub fn new(scores: Vec<f32>) -> Self {
        Self {
            scripted: Arc::new(Mutex::new(VecDeque::new())),
            last: scores,
            config: ClassifierConfig::default(),
            calls: Arc::new(AtomicUsize::new(0)),
            shapes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_config(mut self, config: ClassifierConfig) -> Self {
        self.config = config;
        self
    }

    /// Handle for queueing further score vectors after the classifier is boxed.
    pub fn script(&self) -> Arc<Mutex<VecDeque<Vec<f32>>>> {
        Arc::clone(&self.scripted)
    }
}

impl EmotionClassifier for FakeClassifier {
    fn config(&self) -> ClassifierConfig {
        self.config
    }

    fn classify(&mut self, input: &Array4<f32>) -> Result<Vec<f32>, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.shapes.lock().unwrap().push(input.shape().to_vec());
        if let Some(next) = self.scripted.lock().unwrap().pop_front() {
            self.last = next;
        }
        Ok(self.last.clone())
    }
}

/// One-hot scores for a label.
pub fn scores_for(label: EmotionLabel) -> Vec<f32> {
    EmotionLabel::ALL
        .iter()
        .map(|l| if *l == label { 0.9 } else { 0.01 })
        .collect()
}

pub fn gray_frame(width: u32, height: u32) -> Frame {
    Frame::gray(vec![128; (width * height) as usize], width, height)
}

#[derive(Debug, Clone, PartialEq)]
pub enum OverlayEvent {
    Clear,
    Face(FaceBox),
    Caption(EmotionLabel, String),
    Show(EmotionLabel),
    Hide,
    Move(CaptionPosition),
    Status(String, bool),
}

#[derive(Default)]
pub struct RecordingOverlay {
    pub events: Vec<OverlayEvent>,
}

impl RecordingOverlay {
    pub fn captions(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|e| match e {
                OverlayEvent::Caption(_, text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn last_status(&self) -> Option<(String, bool)> {
        self.events.iter().rev().find_map(|e| match e {
            OverlayEvent::Status(msg, err) => Some((msg.clone(), *err)),
            _ => None,
        })
    }

    pub fn take(&mut self) -> Vec<OverlayEvent> {
        std::mem::take(&mut self.events)
    }
}

impl Overlay for RecordingOverlay {
    fn clear(&mut self) {
        self.events.push(OverlayEvent::Clear);
    }

    fn draw_face(&mut self, face: &FaceBox) {
        self.events.push(OverlayEvent::Face(*face));
    }

    fn set_caption(&mut self, emotion: EmotionLabel, text: &str) {
        self.events.push(OverlayEvent::Caption(emotion, text.to_string()));
    }

    fn show_caption(&mut self, emotion: EmotionLabel) {
        self.events.push(OverlayEvent::Show(emotion));
    }

    fn hide_caption(&mut self) {
        self.events.push(OverlayEvent::Hide);
    }

    fn caption_size(&self) -> (u32, u32) {
        (120, 40)
    }

    fn move_caption(&mut self, position: CaptionPosition) {
        self.events.push(OverlayEvent::Move(position));
    }

    fn set_status(&mut self, message: &str, is_error: bool) {
        self.events.push(OverlayEvent::Status(message.to_string(), is_error));
    }
}

/// Camera double that hands out a fixed frame once started.
pub struct FakeCamera {
    frame: Frame,
    pub fail_start: Option<fn() -> CaptureError>,
    pub active: bool,
    pub starts: usize,
    pub stops: usize,
    /// Frames returned as not yet decodable before the real frame shows up.
    pub pending_frames: usize,
}

impl FakeCamera {
    pub fn new(frame: Frame) -> Self {
        Self {
            frame,
            fail_start: None,
            active: false,
            starts: 0,
            stops: 0,
            pending_frames: 0,
        }
    }
}

impl CaptureDevice for FakeCamera {
    fn start(&mut self) -> Result<(), CaptureError> {
        if self.active {
            return Ok(());
        }
        self.starts += 1;
        if let Some(fail) = self.fail_start {
            return Err(fail());
        }
        self.active = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.stops += 1;
        self.active = false;
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        if !self.active {
            return Ok(None);
        }
        if self.pending_frames > 0 {
            self.pending_frames -= 1;
            return Ok(None);
        }
        Ok(Some(self.frame.clone()))
    }
}
