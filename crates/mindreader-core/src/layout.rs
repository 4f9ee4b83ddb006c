//! Frame-space geometry: face box clamping and thought bubble placement.

use crate::types::{Detection, FaceBox};

/// Gap between the face box and the thought bubble, and minimum margin to the frame edges.
pub const CAPTION_PADDING: u32 = 12;

/// Top-left corner of the thought bubble in frame pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptionPosition {
    pub x: u32,
    pub y: u32,
}

/// Clamp a raw detection to the frame so that the box never starts at a negative
/// coordinate and never extends past the right or bottom edge.
pub fn clamp_to_frame(detection: &Detection, frame_width: u32, frame_height: u32) -> FaceBox {
    let (x, width) = clamp_axis(detection.x, detection.width, frame_width);
    let (y, height) = clamp_axis(detection.y, detection.height, frame_height);
    FaceBox { x, y, width, height }
}

fn clamp_axis(start: f32, extent: f32, limit: u32) -> (u32, u32) {
    let limit = i64::from(limit);
    let start = (start.floor() as i64).clamp(0, limit);
    let extent = (extent.floor() as i64).clamp(0, limit - start);
    (start as u32, extent as u32)
}

/// Place the bubble to the upper-right of the face, flipping to the left when it
/// would overflow the right edge, and keeping it clear of the left and top edges.
pub fn place_caption(
    face: &FaceBox,
    caption_width: u32,
    caption_height: u32,
    frame_width: u32,
) -> CaptionPosition {
    let padding = i64::from(CAPTION_PADDING);
    let (bx, by) = (i64::from(face.x), i64::from(face.y));
    let (bw, cw, ch) = (
        i64::from(face.width),
        i64::from(caption_width),
        i64::from(caption_height),
    );

    let mut x = bx + bw + padding;
    let mut y = by - ch - padding;

    if x + cw + padding > i64::from(frame_width) {
        x = bx - cw - padding;
    }
    if x < padding {
        x = padding;
    }
    if y < padding {
        y = by + padding;
    }

    CaptionPosition {
        x: x as u32,
        y: y as u32,
    }
}
