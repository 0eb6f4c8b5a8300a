use std::path::PathBuf;

use thiserror::Error;
use video_ingest::Frame;

use crate::labels::canonical_label;

/// Label published before the first usable classification arrives.
pub const UNKNOWN_LABEL: &str = "…";

/// One raw entry of a classifier's ranked output.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub label: String,
    pub confidence: f32,
}

impl Classification {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

/// Canonical top-1 result of a classification cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: String,
    pub confidence: f32,
}

impl Prediction {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }

    /// Sentinel held until the first prediction is published.
    pub fn unknown() -> Self {
        Self::new(UNKNOWN_LABEL, 0.0)
    }

    /// Build a prediction from the head of a descending ranked list.
    ///
    /// Returns `None` when the list is empty or the top label has no usable
    /// token once synonyms and score annotations are stripped.
    pub fn from_ranked(ranked: &[Classification]) -> Option<Self> {
        let top = ranked.first()?;
        let label = canonical_label(&top.label)?;
        Some(Self {
            label,
            confidence: top.confidence.clamp(0.0, 1.0),
        })
    }
}

impl Default for Prediction {
    fn default() -> Self {
        Self::unknown()
    }
}

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("unsupported frame: {0}")]
    UnsupportedFrame(String),
    #[error("failed to load classifier model from {path:?}")]
    ModelLoad {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
    #[error(transparent)]
    Inference(#[from] anyhow::Error),
}

/// Image classifier: frame in, ranked `(label, confidence)` list out.
///
/// Implementations return entries sorted by descending confidence.
pub trait Classifier: Send + Sync {
    fn classify(&self, frame: &Frame) -> Result<Vec<Classification>, ClassifyError>;
}
