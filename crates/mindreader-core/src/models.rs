//! Model Provider: loads the detector and classifier once and shares them.

use crate::classifier::{ClassifierConfig, ClassifierError, EmotionClassifier, OnnxEmotionClassifier};
use crate::detector::{DetectorError, FaceDetector, ScrfdDetector};
use crate::types::{Detection, Frame};
use ndarray::Array4;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::OnceCell;

/// File name of the SCRFD detector inside the model directory.
pub const DETECTOR_FILE: &str = "det_10g.onnx";
/// File name of the expression classifier inside the model directory.
pub const CLASSIFIER_FILE: &str = "emotion.onnx";

/// Model directory used when none is configured: the web root's public models folder.
pub fn default_model_dir() -> PathBuf {
    PathBuf::from("frontend").join("public").join("models")
}

#[derive(Error, Debug)]
pub enum ModelLoadError {
    #[error("emotion model not found at {path}. Place the exported ONNX classifier at that path or point the model directory elsewhere.")]
    ClassifierNotFound { path: String },
    #[error("face detector not found at {path}. Place an SCRFD ONNX model at that path or point the model directory elsewhere.")]
    DetectorNotFound { path: String },
    #[error("failed to load emotion model: {0}")]
    Classifier(ClassifierError),
    #[error("failed to load face detector: {0}")]
    Detector(DetectorError),
    #[error("model loading task failed: {0}")]
    Task(String),
}

impl From<ClassifierError> for ModelLoadError {
    fn from(e: ClassifierError) -> Self {
        match e {
            ClassifierError::ModelNotFound(path) => ModelLoadError::ClassifierNotFound { path },
            other => ModelLoadError::Classifier(other),
        }
    }
}

impl From<DetectorError> for ModelLoadError {
    fn from(e: DetectorError) -> Self {
        match e {
            DetectorError::ModelNotFound(path) => ModelLoadError::DetectorNotFound { path },
            other => ModelLoadError::Detector(other),
        }
    }
}

/// The loaded detector and classifier, plus the classifier's input config.
///
/// Sessions need exclusive access while running, so each sits behind a mutex;
/// the annotation loop is their only caller.
pub struct ModelHandles {
    detector: Mutex<Box<dyn FaceDetector>>,
    classifier: Mutex<Box<dyn EmotionClassifier>>,
    config: ClassifierConfig,
}

impl ModelHandles {
    pub fn new(detector: Box<dyn FaceDetector>, classifier: Box<dyn EmotionClassifier>) -> Self {
        let config = classifier.config();
        Self {
            detector: Mutex::new(detector),
            classifier: Mutex::new(classifier),
            config,
        }
    }

    pub fn config(&self) -> ClassifierConfig {
        self.config
    }

    pub fn detect(&self, frame: &Frame) -> Result<Vec<Detection>, DetectorError> {
        self.detector
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .detect(frame)
    }

    pub fn classify(&self, input: &Array4<f32>) -> Result<Vec<f32>, ClassifierError> {
        self.classifier
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .classify(input)
    }
}

/// Produces a fresh set of model handles. Called from a blocking worker thread.
pub trait ModelLoader: Send + Sync + 'static {
    fn load(&self) -> Result<ModelHandles, ModelLoadError>;
}

/// Loads the SCRFD detector and the ONNX expression classifier from disk.
pub struct OnnxModelLoader {
    pub detector_path: PathBuf,
    pub classifier_path: PathBuf,
}

impl OnnxModelLoader {
    pub fn in_dir(model_dir: &Path) -> Self {
        Self {
            detector_path: model_dir.join(DETECTOR_FILE),
            classifier_path: model_dir.join(CLASSIFIER_FILE),
        }
    }
}

impl ModelLoader for OnnxModelLoader {
    fn load(&self) -> Result<ModelHandles, ModelLoadError> {
        let detector = ScrfdDetector::load(&self.detector_path.to_string_lossy())?;
        let classifier = OnnxEmotionClassifier::load(&self.classifier_path.to_string_lossy())?;
        Ok(ModelHandles::new(Box::new(detector), Box::new(classifier)))
    }
}

/// Session-wide model cache.
///
/// Concurrent `load` calls share one in-flight load. A failed load leaves the
/// cache empty so the next call tries again.
pub struct ModelProvider {
    loader: Arc<dyn ModelLoader>,
    models: OnceCell<Arc<ModelHandles>>,
}

impl ModelProvider {
    pub fn new(loader: impl ModelLoader) -> Self {
        Self {
            loader: Arc::new(loader),
            models: OnceCell::new(),
        }
    }

    pub async fn load(&self) -> Result<Arc<ModelHandles>, ModelLoadError> {
        self.models
            .get_or_try_init(|| async {
                tracing::info!("loading models");
                let loader = Arc::clone(&self.loader);
                let handles = tokio::task::spawn_blocking(move || loader.load())
                    .await
                    .map_err(|e| ModelLoadError::Task(e.to_string()))??;
                tracing::info!(config = ?handles.config(), "models ready");
                Ok::<_, ModelLoadError>(Arc::new(handles))
            })
            .await
            .cloned()
    }

    /// The cached handles, if a load has completed.
    pub fn loaded(&self) -> Option<Arc<ModelHandles>> {
        self.models.get().cloned()
    }
}
