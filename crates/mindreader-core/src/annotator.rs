//! Per-tick face annotation: detect, classify (throttled), caption (throttled), place.

use crate::captions::CaptionBank;
use crate::classifier::{face_tensor, label_for_scores, ClassifierError};
use crate::detector::DetectorError;
use crate::capture::CaptureError;
use crate::layout::{clamp_to_frame, place_caption};
use crate::models::ModelHandles;
use crate::overlay::Overlay;
use crate::types::{EmotionLabel, FaceBox, Frame};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Minimum time between two classifier runs.
pub const PREDICTION_INTERVAL: Duration = Duration::from_millis(250);
/// Minimum time before an unchanged emotion gets a fresh caption.
pub const CAPTION_INTERVAL: Duration = Duration::from_millis(2000);

#[derive(Error, Debug)]
pub enum TickError {
    #[error("face detection failed: {0}")]
    Detector(#[from] DetectorError),
    #[error("emotion classification failed: {0}")]
    Classifier(#[from] ClassifierError),
    #[error("frame capture failed: {0}")]
    Capture(#[from] CaptureError),
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No decodable frame yet; nothing was drawn.
    NotReady,
    /// The detector found nobody; emotion tracking was cleared.
    NoFace,
    Tracked {
        face: FaceBox,
        emotion: Option<EmotionLabel>,
        /// Whether the classifier ran on this tick.
        classified: bool,
    },
    /// The tracker is not running.
    Stopped,
}

/// Emotion and timer bookkeeping for one capture session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub last_prediction_at: Option<Instant>,
    pub last_caption_at: Option<Instant>,
    /// Emotion the current caption was chosen for.
    pub last_emotion: Option<EmotionLabel>,
    pub current_emotion: Option<EmotionLabel>,
}

impl SessionState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn classification_due(&self, now: Instant) -> bool {
        self.last_prediction_at
            .map_or(true, |at| now.saturating_duration_since(at) >= PREDICTION_INTERVAL)
    }

    pub fn caption_due(&self, emotion: EmotionLabel, now: Instant) -> bool {
        self.last_emotion != Some(emotion)
            || self
                .last_caption_at
                .map_or(true, |at| now.saturating_duration_since(at) >= CAPTION_INTERVAL)
    }

    fn clear_emotion(&mut self) {
        self.current_emotion = None;
        self.last_emotion = None;
    }
}

/// Turns frames into overlay updates, owning the session's emotion state.
pub struct Annotator<R = StdRng> {
    captions: CaptionBank,
    rng: R,
    session: SessionState,
}

impl Annotator<StdRng> {
    pub fn new(captions: CaptionBank) -> Self {
        Self::with_rng(captions, StdRng::from_entropy())
    }
}

impl<R: Rng> Annotator<R> {
    pub fn with_rng(captions: CaptionBank, rng: R) -> Self {
        Self {
            captions,
            rng,
            session: SessionState::default(),
        }
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn reset(&mut self) {
        self.session.reset();
    }

    /// Run one tick against a decodable frame.
    pub fn annotate<O: Overlay + ?Sized>(
        &mut self,
        frame: &Frame,
        models: &ModelHandles,
        overlay: &mut O,
        now: Instant,
    ) -> Result<TickOutcome, TickError> {
        let detections = models.detect(frame)?;
        overlay.clear();

        // Only the first detection is tracked; detector ordering is not relied on.
        let Some(first) = detections.first() else {
            self.session.clear_emotion();
            overlay.hide_caption();
            return Ok(TickOutcome::NoFace);
        };

        let face = clamp_to_frame(first, frame.width, frame.height);
        overlay.draw_face(&face);

        let classified = self.session.classification_due(now);
        if classified {
            self.session.last_prediction_at = Some(now);
            if let Some(emotion) = classify_face(frame, &face, models)? {
                self.session.current_emotion = Some(emotion);
                self.update_caption(emotion, now, overlay);
            }
        }

        if self.session.current_emotion.is_some() {
            let (width, height) = overlay.caption_size();
            overlay.move_caption(place_caption(&face, width, height, frame.width));
        }

        Ok(TickOutcome::Tracked {
            face,
            emotion: self.session.current_emotion,
            classified,
        })
    }

    fn update_caption<O: Overlay + ?Sized>(&mut self, emotion: EmotionLabel, now: Instant, overlay: &mut O) {
        if self.session.caption_due(emotion, now) {
            if let Some(text) = self.captions.choose(emotion, &mut self.rng) {
                tracing::debug!(%emotion, text, "new caption");
                overlay.set_caption(emotion, text);
            }
            self.session.last_caption_at = Some(now);
            self.session.last_emotion = Some(emotion);
        }
        overlay.show_caption(emotion);
    }
}

/// Classify the face crop. `None` when the clamped box is empty.
fn classify_face(frame: &Frame, face: &FaceBox, models: &ModelHandles) -> Result<Option<EmotionLabel>, TickError> {
    let Some(input) = face_tensor(frame, face, &models.config()) else {
        return Ok(None);
    };
    let scores = models.classify(&input)?;
    drop(input);

    let emotion = label_for_scores(&scores)
        .ok_or_else(|| ClassifierError::InferenceFailed("classifier returned no scores".into()))?;
    Ok(Some(emotion))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ClassifierConfig;
    use crate::testing::{gray_frame, scores_for, FakeClassifier, FakeDetector, OverlayEvent, RecordingOverlay};
    use crate::types::Detection;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::collections::VecDeque;

    struct Rig {
        annotator: Annotator<StdRng>,
        models: ModelHandles,
        overlay: RecordingOverlay,
        detector_script: Arc<Mutex<VecDeque<Vec<Detection>>>>,
        classifier_script: Arc<Mutex<VecDeque<Vec<f32>>>>,
        classifier_calls: Arc<AtomicUsize>,
        frame: Frame,
    }

    fn face_at(x: f32, y: f32) -> Detection {
        Detection { x, y, width: 80.0, height: 80.0, confidence: 0.95 }
    }

    fn rig(detections: Vec<Detection>, emotion: EmotionLabel) -> Rig {
        let detector = FakeDetector::new(detections);
        let classifier = FakeClassifier::new(scores_for(emotion)).with_config(ClassifierConfig {
            input_size: 8,
            ..ClassifierConfig::default()
        });
        let detector_script = detector.script();
        let classifier_script = classifier.script();
        let classifier_calls = Arc::clone(&classifier.calls);
        Rig {
            annotator: Annotator::with_rng(CaptionBank::default(), StdRng::seed_from_u64(42)),
            models: ModelHandles::new(Box::new(detector), Box::new(classifier)),
            overlay: RecordingOverlay::default(),
            detector_script,
            classifier_script,
            classifier_calls,
            frame: gray_frame(320, 240),
        }
    }

    impl Rig {
        fn tick(&mut self, now: Instant) -> TickOutcome {
            self.annotator
                .annotate(&self.frame, &self.models, &mut self.overlay, now)
                .unwrap()
        }

        fn classifier_calls(&self) -> usize {
            self.classifier_calls.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn test_no_face_clears_emotion_and_skips_classifier() {
        let mut rig = rig(vec![face_at(10.0, 10.0)], EmotionLabel::Happy);
        let t0 = Instant::now();
        rig.tick(t0);
        assert_eq!(rig.annotator.session().current_emotion, Some(EmotionLabel::Happy));
        assert_eq!(rig.classifier_calls(), 1);

        rig.detector_script.lock().unwrap().push_back(vec![]);
        rig.overlay.take();
        let outcome = rig.tick(t0 + Duration::from_secs(1));

        assert_eq!(outcome, TickOutcome::NoFace);
        assert_eq!(rig.classifier_calls(), 1);
        assert_eq!(rig.annotator.session().current_emotion, None);
        assert_eq!(rig.annotator.session().last_emotion, None);
        assert_eq!(rig.overlay.events, vec![OverlayEvent::Clear, OverlayEvent::Hide]);
    }

    #[test]
    fn test_classification_throttled_to_interval() {
        let mut rig = rig(vec![face_at(10.0, 10.0)], EmotionLabel::Sad);
        let t0 = Instant::now();

        assert!(matches!(rig.tick(t0), TickOutcome::Tracked { classified: true, .. }));
        rig.classifier_script.lock().unwrap().push_back(scores_for(EmotionLabel::Angry));

        let outcome = rig.tick(t0 + Duration::from_millis(100));
        assert_eq!(
            outcome,
            TickOutcome::Tracked {
                face: FaceBox { x: 10, y: 10, width: 80, height: 80 },
                emotion: Some(EmotionLabel::Sad),
                classified: false,
            }
        );
        assert!(matches!(rig.tick(t0 + Duration::from_millis(249)), TickOutcome::Tracked { classified: false, .. }));
        assert_eq!(rig.classifier_calls(), 1);

        let outcome = rig.tick(t0 + Duration::from_millis(250));
        assert!(matches!(
            outcome,
            TickOutcome::Tracked { classified: true, emotion: Some(EmotionLabel::Angry), .. }
        ));
        assert_eq!(rig.classifier_calls(), 2);
    }

    #[test]
    fn test_unchanged_emotion_recaptions_after_interval() {
        let mut rig = rig(vec![face_at(10.0, 10.0)], EmotionLabel::Happy);
        let t0 = Instant::now();

        rig.tick(t0);
        assert_eq!(rig.overlay.captions().len(), 1);

        rig.tick(t0 + Duration::from_millis(1000));
        rig.tick(t0 + Duration::from_millis(1750));
        assert_eq!(rig.overlay.captions().len(), 1);
        assert_eq!(rig.classifier_calls(), 3);

        rig.tick(t0 + Duration::from_millis(2000));
        assert_eq!(rig.overlay.captions().len(), 2);
        assert_eq!(rig.classifier_calls(), 4);

        // Captions only change on classification ticks.
        rig.tick(t0 + Duration::from_millis(2100));
        assert_eq!(rig.overlay.captions().len(), 2);
        assert_eq!(rig.classifier_calls(), 4);
        let happy = CaptionBank::default();
        assert!(rig
            .overlay
            .captions()
            .iter()
            .all(|c| happy.get(EmotionLabel::Happy).contains(c)));
    }

    #[test]
    fn test_changed_emotion_recaptions_immediately() {
        let mut rig = rig(vec![face_at(10.0, 10.0)], EmotionLabel::Happy);
        let t0 = Instant::now();
        rig.tick(t0);

        rig.classifier_script.lock().unwrap().push_back(scores_for(EmotionLabel::Fear));
        rig.tick(t0 + Duration::from_millis(300));

        let captions: Vec<_> = rig
            .overlay
            .events
            .iter()
            .filter_map(|e| match e {
                OverlayEvent::Caption(label, _) => Some(*label),
                _ => None,
            })
            .collect();
        assert_eq!(captions, vec![EmotionLabel::Happy, EmotionLabel::Fear]);
        assert_eq!(rig.annotator.session().last_emotion, Some(EmotionLabel::Fear));
    }

    #[test]
    fn test_only_first_detection_is_tracked() {
        let mut rig = rig(
            vec![face_at(300.0, 200.0), face_at(10.0, 10.0)],
            EmotionLabel::Neutral,
        );
        rig.tick(Instant::now());

        let faces: Vec<_> = rig
            .overlay
            .events
            .iter()
            .filter_map(|e| match e {
                OverlayEvent::Face(face) => Some(*face),
                _ => None,
            })
            .collect();
        // Clamped to the 320x240 frame.
        assert_eq!(faces, vec![FaceBox { x: 300, y: 200, width: 20, height: 40 }]);
    }

    #[test]
    fn test_classifier_receives_single_item_batch() {
        let mut rig = rig(vec![face_at(10.0, 10.0)], EmotionLabel::Happy);
        let detector = FakeDetector::new(vec![face_at(10.0, 10.0)]);
        let classifier = FakeClassifier::new(scores_for(EmotionLabel::Happy));
        let shapes = Arc::clone(&classifier.shapes);
        rig.models = ModelHandles::new(Box::new(detector), Box::new(classifier));

        rig.tick(Instant::now());
        assert_eq!(shapes.lock().unwrap().as_slice(), &[vec![1, 48, 48, 1]]);
    }

    #[test]
    fn test_empty_face_box_skips_classification() {
        let mut rig = rig(vec![face_at(500.0, 10.0)], EmotionLabel::Happy);
        let outcome = rig.tick(Instant::now());
        assert_eq!(
            outcome,
            TickOutcome::Tracked {
                face: FaceBox { x: 320, y: 10, width: 0, height: 80 },
                emotion: None,
                classified: true,
            }
        );
        assert_eq!(rig.classifier_calls(), 0);
        assert!(!rig.overlay.events.iter().any(|e| matches!(e, OverlayEvent::Move(_))));
    }

    #[test]
    fn test_caption_follows_face() {
        let mut rig = rig(vec![face_at(10.0, 100.0)], EmotionLabel::Surprise);
        rig.tick(Instant::now());

        // Overlay reports a 120x40 bubble: right of the box, above it.
        let moved = rig.overlay.events.iter().find_map(|e| match e {
            OverlayEvent::Move(pos) => Some(*pos),
            _ => None,
        });
        assert_eq!(moved, Some(crate::layout::CaptionPosition { x: 102, y: 48 }));
        assert!(rig.overlay.events.contains(&OverlayEvent::Show(EmotionLabel::Surprise)));
    }

    #[test]
    fn test_session_state_reset() {
        let mut state = SessionState {
            last_prediction_at: Some(Instant::now()),
            last_caption_at: Some(Instant::now()),
            last_emotion: Some(EmotionLabel::Sad),
            current_emotion: Some(EmotionLabel::Sad),
        };
        state.reset();
        assert_eq!(state, SessionState::default());
        assert!(state.classification_due(Instant::now()));
        assert!(state.caption_due(EmotionLabel::Sad, Instant::now()));
    }
}
