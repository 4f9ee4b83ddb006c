//! Offline preprocessor: labeled CSV rows in, per-emotion caption JSON out.

use crate::captions::CaptionBank;
use crate::types::EmotionLabel;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

const TEXT_COLUMNS: [&str; 4] = ["text", "dialogue", "sentence", "utterance"];
const LABEL_COLUMNS: [&str; 2] = ["label", "emotion"];

#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("CSV not found: {0}")]
    InputMissing(PathBuf),
    #[error("CSV is empty: {0}")]
    InputEmpty(PathBuf),
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to serialize thoughts: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThoughtOptions {
    pub max_per_label: usize,
    /// Longest accepted text, in characters.
    pub max_length: usize,
    pub seed: u64,
}

impl Default for ThoughtOptions {
    fn default() -> Self {
        Self {
            max_per_label: 60,
            max_length: 140,
            seed: 42,
        }
    }
}

/// Map a raw dataset label to an emotion: numeric class codes first, then names.
pub fn normalize_label(raw: &str) -> Option<EmotionLabel> {
    let value = raw.trim();
    let by_code = match value {
        "0" => Some(EmotionLabel::Sad),
        "1" | "2" => Some(EmotionLabel::Happy),
        "3" => Some(EmotionLabel::Angry),
        "4" => Some(EmotionLabel::Fear),
        "5" => Some(EmotionLabel::Surprise),
        "6" => Some(EmotionLabel::Neutral),
        "7" => Some(EmotionLabel::Disgust),
        _ => None,
    };
    if by_code.is_some() {
        return by_code;
    }

    match value.to_ascii_lowercase().as_str() {
        "sad" | "sadness" => Some(EmotionLabel::Sad),
        "angry" | "anger" => Some(EmotionLabel::Angry),
        "fear" => Some(EmotionLabel::Fear),
        "happy" | "joy" | "love" => Some(EmotionLabel::Happy),
        "surprise" => Some(EmotionLabel::Surprise),
        "disgust" => Some(EmotionLabel::Disgust),
        "neutral" => Some(EmotionLabel::Neutral),
        _ => None,
    }
}

/// Split CSV text into records. Fields may be double-quoted, with `""` as an escaped quote;
/// quoted fields may span lines. Blank lines are skipped.
fn records(csv: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = csv.chars().peekable();

    let mut finish = |fields: &mut Vec<String>, field: &mut String| {
        fields.push(std::mem::take(field));
        let record = std::mem::take(fields);
        if !(record.len() == 1 && record[0].trim().is_empty()) {
            records.push(record);
        }
    };

    while let Some(c) = chars.next() {
        match (c, quoted) {
            ('"', true) if chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            ('"', true) => quoted = false,
            ('"', false) if field.trim().is_empty() => {
                field.clear();
                quoted = true;
            }
            (',', false) => fields.push(std::mem::take(&mut field)),
            ('\r', false) if chars.peek() == Some(&'\n') => {}
            ('\n', false) => finish(&mut fields, &mut field),
            _ => field.push(c),
        }
    }
    if !fields.is_empty() || !field.is_empty() {
        finish(&mut fields, &mut field);
    }
    records
}

/// Which fields of a record hold the text and the label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Columns {
    Named { text: usize, label: usize },
    /// No header: last field is the label, everything before it is text.
    Positional,
}

impl Columns {
    fn from_header(fields: &[String]) -> Option<Self> {
        let names: Vec<String> = fields.iter().map(|f| f.trim().to_ascii_lowercase()).collect();
        let find = |candidates: &[&str]| {
            candidates
                .iter()
                .find_map(|c| names.iter().position(|n| n == c))
        };

        let text = find(&TEXT_COLUMNS);
        let label = find(&LABEL_COLUMNS);
        if text.is_none() && label.is_none() {
            return None;
        }
        Some(Self::Named {
            text: text.unwrap_or(0),
            label: label.unwrap_or(names.len().saturating_sub(1)),
        })
    }

    fn extract(&self, fields: &[String]) -> Option<(String, String)> {
        match *self {
            Self::Named { text, label } => Some((fields.get(text)?.clone(), fields.get(label)?.clone())),
            Self::Positional => {
                let (label, text) = fields.split_last()?;
                if text.is_empty() {
                    return None;
                }
                Some((text.join(","), label.clone()))
            }
        }
    }
}

/// Bucket, dedupe, shuffle and cap the labeled rows of `csv`.
pub fn thoughts_from_csv(csv: &str, options: &ThoughtOptions) -> CaptionBank {
    let mut rows = records(csv).into_iter().peekable();

    let columns = match rows.peek().and_then(|header| Columns::from_header(header)) {
        Some(columns) => {
            rows.next();
            columns
        }
        None => Columns::Positional,
    };

    let mut buckets: BTreeMap<EmotionLabel, Vec<String>> =
        EmotionLabel::ALL.iter().map(|l| (*l, Vec::new())).collect();
    let mut seen: HashSet<(EmotionLabel, String)> = HashSet::new();
    let mut skipped = 0usize;

    for row in rows {
        let Some((text, label)) = columns.extract(&row) else {
            skipped += 1;
            continue;
        };
        let text = text.trim();
        if text.is_empty() || text.chars().count() > options.max_length {
            skipped += 1;
            continue;
        }
        let Some(emotion) = normalize_label(&label) else {
            skipped += 1;
            continue;
        };
        if seen.insert((emotion, text.to_string())) {
            if let Some(bucket) = buckets.get_mut(&emotion) {
                bucket.push(text.to_string());
            }
        }
    }
    tracing::debug!(skipped, "rows dropped");

    let mut rng = StdRng::seed_from_u64(options.seed);
    buckets
        .into_iter()
        .map(|(label, mut items)| {
            items.shuffle(&mut rng);
            items.truncate(options.max_per_label);
            (label, items)
        })
        .collect()
}

/// Read the CSV at `input` and build the caption bank from it.
pub fn build_thoughts(input: &Path, options: &ThoughtOptions) -> Result<CaptionBank, PreprocessError> {
    if !input.exists() {
        return Err(PreprocessError::InputMissing(input.to_path_buf()));
    }
    let csv = std::fs::read_to_string(input).map_err(|source| PreprocessError::Io {
        path: input.to_path_buf(),
        source,
    })?;
    if csv.trim().is_empty() {
        return Err(PreprocessError::InputEmpty(input.to_path_buf()));
    }

    let bank = thoughts_from_csv(&csv, options);
    for (label, items) in bank.iter() {
        tracing::info!(%label, count = items.len(), "bucket");
    }
    Ok(bank)
}

/// Write the bank as pretty-printed JSON, creating the parent directory.
pub fn write_thoughts(bank: &CaptionBank, output: &Path) -> Result<(), PreprocessError> {
    let json = bank.to_json_pretty()?;
    let io_err = |source| PreprocessError::Io {
        path: output.to_path_buf(),
        source,
    };
    if let Some(dir) = output.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(io_err)?;
    }
    std::fs::write(output, json).map_err(io_err)?;
    tracing::info!(path = %output.display(), "wrote thoughts");
    Ok(())
}
