//! Session controller: drives the annotator over a capture device as an
//! Idle / Tracking / Stopping state machine.

use crate::annotator::{Annotator, TickError, TickOutcome};
use crate::captions::CaptionBank;
use crate::capture::{CaptureDevice, CaptureError};
use crate::models::{ModelHandles, ModelLoadError, ModelProvider};
use crate::overlay::Overlay;
use rand::rngs::StdRng;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    Idle,
    Tracking,
    Stopping,
}

#[derive(Error, Debug)]
pub enum StartError {
    #[error(transparent)]
    Models(#[from] ModelLoadError),
    #[error(transparent)]
    Camera(#[from] CaptureError),
}

/// Cooperative cancellation flag, observed by the tracker at tick boundaries.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct Tracker<C, O, R = StdRng> {
    provider: Arc<ModelProvider>,
    camera: C,
    overlay: O,
    annotator: Annotator<R>,
    models: Option<Arc<ModelHandles>>,
    state: TrackerState,
    stop: StopHandle,
}

impl<C: CaptureDevice, O: Overlay> Tracker<C, O, StdRng> {
    pub fn new(provider: Arc<ModelProvider>, camera: C, overlay: O, captions: CaptionBank) -> Self {
        Self::with_annotator(provider, camera, overlay, Annotator::new(captions))
    }
}

impl<C: CaptureDevice, O: Overlay, R: Rng> Tracker<C, O, R> {
    pub fn with_annotator(provider: Arc<ModelProvider>, camera: C, overlay: O, annotator: Annotator<R>) -> Self {
        Self {
            provider,
            camera,
            overlay,
            annotator,
            models: None,
            state: TrackerState::Idle,
            stop: StopHandle::default(),
        }
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn overlay(&self) -> &O {
        &self.overlay
    }

    pub fn camera(&self) -> &C {
        &self.camera
    }

    pub fn annotator(&self) -> &Annotator<R> {
        &self.annotator
    }

    /// Load models, then start the camera. On failure the camera is released,
    /// the tracker stays Idle and the error is reported on the overlay.
    pub async fn start(&mut self) -> Result<(), StartError> {
        if self.state == TrackerState::Tracking {
            return Ok(());
        }
        self.stop.clear();

        match self.acquire().await {
            Ok(models) => {
                self.models = Some(models);
                self.annotator.reset();
                self.state = TrackerState::Tracking;
                self.overlay.set_status("Looking for faces...", false);
                tracing::info!("tracking started");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to start tracking");
                self.overlay.set_status(&format!("Could not start: {e}"), true);
                self.teardown();
                Err(e)
            }
        }
    }

    async fn acquire(&mut self) -> Result<Arc<ModelHandles>, StartError> {
        self.overlay.set_status("Loading models...", false);
        let models = self.provider.load().await?;
        self.overlay.set_status("Starting camera...", false);
        self.camera.start()?;
        Ok(models)
    }

    /// One tick. Returns `Stopped` without touching the camera unless Tracking.
    pub fn step(&mut self, now: Instant) -> Result<TickOutcome, TickError> {
        if self.state != TrackerState::Tracking {
            return Ok(TickOutcome::Stopped);
        }
        if self.stop.is_requested() {
            self.stop();
            return Ok(TickOutcome::Stopped);
        }
        let Some(models) = self.models.clone() else {
            return Ok(TickOutcome::Stopped);
        };

        let frame = match self.camera.frame()? {
            Some(frame) if frame.is_complete() => frame,
            _ => return Ok(TickOutcome::NotReady),
        };

        self.annotator.annotate(&frame, &models, &mut self.overlay, now)
    }

    /// End the session from any state. Safe to call repeatedly.
    pub fn stop(&mut self) {
        let was_tracking = self.state == TrackerState::Tracking;
        self.teardown();
        self.overlay.set_status("Camera is off.", false);
        if was_tracking {
            tracing::info!("tracking stopped");
        }
    }

    fn teardown(&mut self) {
        self.state = TrackerState::Stopping;
        self.stop.request_stop();
        self.overlay.clear();
        self.overlay.hide_caption();
        self.annotator.reset();
        self.camera.stop();
        self.state = TrackerState::Idle;
    }

    /// Step on a fixed interval until stopped. A failed tick ends the session
    /// and is returned.
    pub async fn run(&mut self, tick: Duration) -> Result<(), TickError> {
        let mut interval = tokio::time::interval(tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        while self.state == TrackerState::Tracking {
            interval.tick().await;
            match self.step(Instant::now()) {
                Ok(outcome) => tracing::trace!(?outcome, "tick"),
                Err(e) => {
                    tracing::error!(error = %e, "tick failed, stopping");
                    self.teardown();
                    self.overlay.set_status(&format!("Tracking stopped: {e}"), true);
                    return Err(e);
                }
            }
        }
        Ok(())
    }
}
