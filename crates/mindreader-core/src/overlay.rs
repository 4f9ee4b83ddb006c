//! Presentation seam: what the annotator draws each tick.

use crate::layout::CaptionPosition;
use crate::types::{EmotionLabel, FaceBox};

/// Receives drawing and status updates from the tracker.
///
/// Implementations render however they like (canvas, terminal, test recorder);
/// the tracker only ever calls them from its own loop.
pub trait Overlay {
    /// Erase everything drawn on the previous tick.
    fn clear(&mut self);

    fn draw_face(&mut self, face: &FaceBox);

    /// Replace the thought bubble text.
    fn set_caption(&mut self, emotion: EmotionLabel, text: &str);

    /// Make the bubble and emotion readout visible for `emotion`.
    fn show_caption(&mut self, emotion: EmotionLabel);

    /// Hide the bubble and reset the emotion readout.
    fn hide_caption(&mut self);

    /// Rendered bubble size in frame pixels, used for placement.
    fn caption_size(&self) -> (u32, u32);

    fn move_caption(&mut self, position: CaptionPosition);

    fn set_status(&mut self, message: &str, is_error: bool);
}
