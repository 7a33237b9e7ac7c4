use std::fmt;

use serde::{Deserialize, Serialize};

use crate::shared::frame::Frame;

/// The closed set of emotion categories, in FER+ output order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Neutral,
    Happiness,
    Surprise,
    Sadness,
    Anger,
    Disgust,
    Fear,
    Contempt,
}

impl Emotion {
    pub const ALL: [Emotion; 8] = [
        Emotion::Neutral,
        Emotion::Happiness,
        Emotion::Surprise,
        Emotion::Sadness,
        Emotion::Anger,
        Emotion::Disgust,
        Emotion::Fear,
        Emotion::Contempt,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn label(self) -> &'static str {
        match self {
            Emotion::Neutral => "neutral",
            Emotion::Happiness => "happiness",
            Emotion::Surprise => "surprise",
            Emotion::Sadness => "sadness",
            Emotion::Anger => "anger",
            Emotion::Disgust => "disgust",
            Emotion::Fear => "fear",
            Emotion::Contempt => "contempt",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of one classification call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EmotionResult {
    pub emotion: Emotion,
    /// Kept for diagnostics; the overlay only shows the label.
    pub confidence: f32,
}

impl EmotionResult {
    pub fn new(emotion: Emotion, confidence: f32) -> Self {
        Self {
            emotion,
            confidence,
        }
    }

    pub fn label(&self) -> &'static str {
        self.emotion.label()
    }
}

/// Domain interface for whole-frame emotion classification.
pub trait EmotionClassifier: Send {
    fn classify(&mut self, frame: &Frame) -> Result<EmotionResult, Box<dyn std::error::Error>>;
}
