use image::{GrayImage, RgbImage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Instant;

/// A captured camera frame with interleaved 8-bit pixels.
#[derive(Clone)]
pub struct Frame {
    /// Pixel data, `width * height * channels` bytes, row-major.
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// 1 for grayscale, 3 for RGB.
    pub channels: u8,
    pub timestamp: Instant,
    pub sequence: u32,
}

impl Frame {
    pub fn rgb(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self::with_channels(data, width, height, 3)
    }

    pub fn gray(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self::with_channels(data, width, height, 1)
    }

    fn with_channels(data: Vec<u8>, width: u32, height: u32, channels: u8) -> Self {
        Self {
            data,
            width,
            height,
            channels,
            timestamp: Instant::now(),
            sequence: 0,
        }
    }

    /// Whether the buffer holds a full frame for its declared geometry.
    pub fn is_complete(&self) -> bool {
        let expected = self.width as usize * self.height as usize * self.channels as usize;
        self.width > 0 && self.height > 0 && expected > 0 && self.data.len() >= expected
    }

    /// View the frame as an RGB image, replicating gray into all three channels.
    ///
    /// Returns `None` for incomplete buffers or unsupported channel counts.
    pub fn to_rgb_image(&self) -> Option<RgbImage> {
        if !self.is_complete() {
            return None;
        }
        let pixels = (self.width * self.height) as usize;
        match self.channels {
            3 => RgbImage::from_raw(self.width, self.height, self.data[..pixels * 3].to_vec()),
            1 => {
                let gray = GrayImage::from_raw(self.width, self.height, self.data[..pixels].to_vec())?;
                Some(image::DynamicImage::ImageLuma8(gray).to_rgb8())
            }
            _ => None,
        }
    }
}

/// Raw detector output in frame coordinates; may extend past the frame edges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

/// Face rectangle in frame pixel coordinates, clamped to the visible frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FaceBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl FaceBox {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Seven-way facial expression class, in classifier output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionLabel {
    Angry,
    Disgust,
    Fear,
    Happy,
    Sad,
    Surprise,
    Neutral,
}

impl EmotionLabel {
    /// All labels, indexed by classifier output position.
    pub const ALL: [EmotionLabel; 7] = [
        EmotionLabel::Angry,
        EmotionLabel::Disgust,
        EmotionLabel::Fear,
        EmotionLabel::Happy,
        EmotionLabel::Sad,
        EmotionLabel::Surprise,
        EmotionLabel::Neutral,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EmotionLabel::Angry => "angry",
            EmotionLabel::Disgust => "disgust",
            EmotionLabel::Fear => "fear",
            EmotionLabel::Happy => "happy",
            EmotionLabel::Sad => "sad",
            EmotionLabel::Surprise => "surprise",
            EmotionLabel::Neutral => "neutral",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            EmotionLabel::Angry => "😠",
            EmotionLabel::Disgust => "🤢",
            EmotionLabel::Fear => "😱",
            EmotionLabel::Happy => "😄",
            EmotionLabel::Sad => "😢",
            EmotionLabel::Surprise => "😲",
            EmotionLabel::Neutral => "😐",
        }
    }
}

impl fmt::Display for EmotionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown emotion label: {0}")]
pub struct UnknownLabel(pub String);

impl FromStr for EmotionLabel {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|label| label.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownLabel(s.to_string()))
    }
}
