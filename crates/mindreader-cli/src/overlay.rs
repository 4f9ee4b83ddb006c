use mindreader_core::layout::CaptionPosition;
use mindreader_core::{EmotionLabel, FaceBox, Overlay};

/// Approximate bubble metrics at the preferred 640x480 resolution.
const CHAR_WIDTH: u32 = 8;
const BUBBLE_INSET: u32 = 24;
const BUBBLE_HEIGHT: u32 = 40;

/// Prints overlay changes to stdout, one line per visible change.
#[derive(Default)]
pub struct TerminalOverlay {
    caption: String,
    emotion: Option<EmotionLabel>,
    visible: bool,
    face: Option<FaceBox>,
    position: Option<CaptionPosition>,
}

impl TerminalOverlay {
    fn print_bubble(&self) {
        let (Some(emotion), Some(pos)) = (self.emotion, self.position) else {
            return;
        };
        let face = self
            .face
            .map(|f| format!("face {}x{}@({},{})", f.width, f.height, f.x, f.y))
            .unwrap_or_default();
        println!(
            "{} {:<8} \"{}\"  {face}  bubble@({},{})",
            emotion.emoji(),
            emotion.as_str(),
            self.caption,
            pos.x,
            pos.y
        );
    }
}

impl Overlay for TerminalOverlay {
    fn clear(&mut self) {
        self.face = None;
    }

    fn draw_face(&mut self, face: &FaceBox) {
        self.face = Some(*face);
    }

    fn set_caption(&mut self, emotion: EmotionLabel, text: &str) {
        self.caption = text.to_string();
        self.emotion = Some(emotion);
        // Force a print on the next placement.
        self.position = None;
    }

    fn show_caption(&mut self, emotion: EmotionLabel) {
        if self.emotion != Some(emotion) || !self.visible {
            self.position = None;
        }
        self.emotion = Some(emotion);
        self.visible = true;
    }

    fn hide_caption(&mut self) {
        if self.visible {
            println!("   (no face)");
        }
        self.visible = false;
        self.emotion = None;
        self.position = None;
    }

    fn caption_size(&self) -> (u32, u32) {
        let chars = self.caption.chars().count() as u32;
        (chars * CHAR_WIDTH + BUBBLE_INSET, BUBBLE_HEIGHT)
    }

    fn move_caption(&mut self, position: CaptionPosition) {
        if self.visible && self.position.is_none() {
            self.position = Some(position);
            self.print_bubble();
        } else {
            self.position = Some(position);
        }
    }

    fn set_status(&mut self, message: &str, is_error: bool) {
        if is_error {
            eprintln!("{message}");
        } else {
            println!("{message}");
        }
    }
}
