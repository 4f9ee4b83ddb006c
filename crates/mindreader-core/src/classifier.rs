//! Facial expression classification via ONNX Runtime.
//!
//! The classifier is a small CNN trained on 48×48 FER-style crops. Its square input
//! size, channel depth and tensor layout are read from the model's declared input
//! shape once at load time and kept in a [`ClassifierConfig`].

use crate::types::{EmotionLabel, FaceBox, Frame};
use image::imageops::{self, FilterType};
use ndarray::Array4;
use ort::session::Session;
use ort::value::{TensorRef, ValueType};
use std::path::Path;
use thiserror::Error;

const DEFAULT_INPUT_SIZE: u32 = 48;
const DEFAULT_INPUT_CHANNELS: u8 = 1;

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Position of the channel axis in the classifier input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorLayout {
    /// `[batch, height, width, channels]`, as exported from Keras.
    Nhwc,
    /// `[batch, channels, height, width]`, as exported from PyTorch.
    Nchw,
}

/// Input expectations of the loaded classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifierConfig {
    /// Side length of the square input.
    pub input_size: u32,
    /// 1 (grayscale) or 3 (RGB).
    pub channels: u8,
    pub layout: TensorLayout,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            input_size: DEFAULT_INPUT_SIZE,
            channels: DEFAULT_INPUT_CHANNELS,
            layout: TensorLayout::Nhwc,
        }
    }
}

impl ClassifierConfig {
    /// Infer the config from a declared 4-D input shape.
    ///
    /// Dynamic (`-1`) or missing dimensions fall back to the 48×48 grayscale defaults;
    /// a shape that is not 4-D yields the defaults unchanged.
    pub fn from_input_shape(shape: &[i64]) -> Self {
        let defaults = Self::default();
        let &[_, d1, d2, d3] = shape else {
            return defaults;
        };

        let dim = |d: i64| u32::try_from(d).ok().filter(|&v| v > 0);
        let channels = |d: i64| dim(d).filter(|&c| matches!(c, 1 | 3)).map(|c| c as u8);

        if let Some(c) = channels(d3) {
            Self {
                input_size: dim(d1).unwrap_or(defaults.input_size),
                channels: c,
                layout: TensorLayout::Nhwc,
            }
        } else if let Some(c) = channels(d1) {
            Self {
                input_size: dim(d2).unwrap_or(defaults.input_size),
                channels: c,
                layout: TensorLayout::Nchw,
            }
        } else {
            Self {
                input_size: dim(d1).unwrap_or(defaults.input_size),
                ..defaults
            }
        }
    }
}

/// Scores a prepared face crop against the seven expression classes.
pub trait EmotionClassifier: Send {
    fn config(&self) -> ClassifierConfig;

    /// Run one single-item batch, returning one score per class.
    fn classify(&mut self, input: &Array4<f32>) -> Result<Vec<f32>, ClassifierError>;
}

/// Expression classifier backed by ONNX Runtime.
pub struct OnnxEmotionClassifier {
    session: Session,
    config: ClassifierConfig,
}

impl OnnxEmotionClassifier {
    pub fn load(model_path: &str) -> Result<Self, ClassifierError> {
        if !Path::new(model_path).exists() {
            return Err(ClassifierError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(1)?
            .commit_from_file(model_path)?;

        let declared: Vec<i64> = session
            .inputs()
            .first()
            .and_then(|input| match input.dtype() {
                ValueType::Tensor { shape, .. } => Some(shape.iter().copied().collect()),
                _ => None,
            })
            .unwrap_or_default();
        let config = ClassifierConfig::from_input_shape(&declared);

        tracing::info!(
            path = model_path,
            ?declared,
            input_size = config.input_size,
            channels = config.channels,
            layout = ?config.layout,
            "loaded emotion classifier"
        );

        Ok(Self { session, config })
    }
}

impl EmotionClassifier for OnnxEmotionClassifier {
    fn config(&self) -> ClassifierConfig {
        self.config
    }

    fn classify(&mut self, input: &Array4<f32>) -> Result<Vec<f32>, ClassifierError> {
        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;
        let (_, scores) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ClassifierError::InferenceFailed(format!("scores: {e}")))?;
        // Output tensors are freed when `outputs` drops at the end of this call.
        Ok(scores.to_vec())
    }
}

/// Crop the face out of the frame and turn it into the classifier's input batch:
/// resized to the square input size, reduced to the expected channel depth and
/// scaled to [0, 1].
///
/// Returns `None` for an empty face box or an undecodable frame.
pub fn face_tensor(frame: &Frame, face: &FaceBox, config: &ClassifierConfig) -> Option<Array4<f32>> {
    if face.is_empty() {
        return None;
    }
    let rgb = frame.to_rgb_image()?;
    let crop = imageops::crop_imm(&rgb, face.x, face.y, face.width, face.height).to_image();
    let size = config.input_size;
    let patch = imageops::resize(&crop, size, size, FilterType::Triangle);

    let (side, depth) = (size as usize, config.channels as usize);
    let mut tensor = match config.layout {
        TensorLayout::Nhwc => Array4::<f32>::zeros((1, side, side, depth)),
        TensorLayout::Nchw => Array4::<f32>::zeros((1, depth, side, side)),
    };

    for (x, y, pixel) in patch.enumerate_pixels() {
        let [r, g, b] = pixel.0.map(|v| v as f32 / 255.0);
        let values = [r, g, b];
        let (x, y) = (x as usize, y as usize);
        for c in 0..depth {
            let value = if depth == 1 { (r + g + b) / 3.0 } else { values[c] };
            match config.layout {
                TensorLayout::Nhwc => tensor[[0, y, x, c]] = value,
                TensorLayout::Nchw => tensor[[0, c, y, x]] = value,
            }
        }
    }

    Some(tensor)
}

/// Index of the highest score; the lowest index wins ties.
pub fn strongest(scores: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &score) in scores.iter().enumerate() {
        let wins = match best {
            None => true,
            Some((_, top)) => score > top,
        };
        if wins {
            best = Some((i, score));
        }
    }
    best.map(|(i, _)| i)
}

/// Map classifier scores to a label. Indices past the known labels read as neutral.
pub fn label_for_scores(scores: &[f32]) -> Option<EmotionLabel> {
    strongest(scores).map(|i| EmotionLabel::from_index(i).unwrap_or(EmotionLabel::Neutral))
}
