//! Thought bubble phrases per emotion.

use crate::types::EmotionLabel;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptionError {
    #[error("failed to read caption bank {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid caption bank {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}

/// Candidate captions per emotion, serialized as `{"angry": [...], ...}` in label order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaptionBank {
    entries: BTreeMap<EmotionLabel, Vec<String>>,
}

impl Default for CaptionBank {
    fn default() -> Self {
        let defaults: [(EmotionLabel, [&str; 3]); 7] = [
            (
                EmotionLabel::Angry,
                ["Who touched my food?!", "I need a reboot.", "This line is too slow."],
            ),
            (
                EmotionLabel::Disgust,
                ["That smell has a backstory.", "Why does this exist?", "My face says it all."],
            ),
            (
                EmotionLabel::Fear,
                ["Did that chair just move?", "Nope, nope, nope.", "Is the door locked?"],
            ),
            (
                EmotionLabel::Happy,
                ["This coffee is amazing.", "Life is good.", "Hehe, this is fun."],
            ),
            (
                EmotionLabel::Sad,
                ["I should have ordered fries too.", "I miss my bed.", "Rainy day energy."],
            ),
            (
                EmotionLabel::Surprise,
                ["Plot twist!", "Wait, what?", "Did not see that coming."],
            ),
            (
                EmotionLabel::Neutral,
                ["Just vibing.", "Running on vibes.", "Loading thoughts..."],
            ),
        ];
        defaults
            .into_iter()
            .map(|(label, phrases)| (label, phrases.iter().map(|p| p.to_string()).collect()))
            .collect()
    }
}

impl FromIterator<(EmotionLabel, Vec<String>)> for CaptionBank {
    fn from_iter<I: IntoIterator<Item = (EmotionLabel, Vec<String>)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl CaptionBank {
    /// An empty bank; every label falls through to nothing.
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Built-in phrases, with any non-empty entries from `path` replacing them.
    pub fn load_with_overrides(path: &Path) -> Result<Self, CaptionError> {
        let shown = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| CaptionError::Read {
            path: shown.clone(),
            source,
        })?;
        let overrides: CaptionBank = serde_json::from_str(&raw).map_err(|source| CaptionError::Parse {
            path: shown.clone(),
            source,
        })?;

        let mut bank = Self::default();
        bank.merge(overrides);
        tracing::info!(path = %shown, "loaded caption bank");
        Ok(bank)
    }

    /// Replace entries with the non-empty lists from `other`.
    pub fn merge(&mut self, other: CaptionBank) {
        for (label, phrases) in other.entries {
            if !phrases.is_empty() {
                self.entries.insert(label, phrases);
            }
        }
    }

    pub fn insert(&mut self, label: EmotionLabel, phrases: Vec<String>) {
        self.entries.insert(label, phrases);
    }

    pub fn get(&self, label: EmotionLabel) -> &[String] {
        self.entries.get(&label).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (EmotionLabel, &[String])> {
        self.entries.iter().map(|(label, phrases)| (*label, phrases.as_slice()))
    }

    /// Pick a caption uniformly at random for `label`, using the neutral phrases
    /// when the label has none.
    pub fn choose<R: Rng + ?Sized>(&self, label: EmotionLabel, rng: &mut R) -> Option<&str> {
        let phrases = match self.get(label) {
            [] => self.get(EmotionLabel::Neutral),
            phrases => phrases,
        };
        phrases.choose(rng).map(String::as_str)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
