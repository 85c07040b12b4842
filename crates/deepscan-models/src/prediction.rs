//! Per-face prediction models.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification label for a face or a whole video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Label {
    /// Face (or video) judged authentic
    Real,
    /// Face (or video) judged synthetically manipulated
    Deepfake,
    /// No usable prediction (missing input, model unavailable, no faces)
    #[default]
    Unknown,
}

impl Label {
    /// Map a classifier's argmax index to a label.
    ///
    /// `deepfake_index` is the output column the model was trained to emit
    /// for manipulated faces; every other index is `Real`.
    pub fn from_class_index(index: usize, deepfake_index: usize) -> Self {
        if index == deepfake_index {
            Label::Deepfake
        } else {
            Label::Real
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Real => "Real",
            Label::Deepfake => "Deepfake",
            Label::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of classifying a single face image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: Label,
    /// Probability of the winning class, in percent (0-100)
    pub confidence: f32,
}

impl Prediction {
    pub fn new(label: Label, confidence: f32) -> Self {
        Self { label, confidence }
    }

    /// Prediction used whenever a face could not be classified.
    pub fn unknown() -> Self {
        Self {
            label: Label::Unknown,
            confidence: 0.0,
        }
    }

    /// Build a prediction from class probabilities (already softmaxed).
    ///
    /// Returns `Unknown` for an empty or non-finite distribution.
    pub fn from_probabilities(probabilities: &[f32], deepfake_index: usize) -> Self {
        // Ties go to the lowest index
        let best = probabilities
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, p)| p.is_finite())
            .fold(None, |best: Option<(usize, f32)>, (index, p)| match best {
                Some((_, best_p)) if best_p >= p => best,
                _ => Some((index, p)),
            });

        match best {
            Some((index, p)) => Self {
                label: Label::from_class_index(index, deepfake_index),
                confidence: p * 100.0,
            },
            None => Self::unknown(),
        }
    }
}
