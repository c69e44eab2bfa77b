use serde::{Deserialize, Serialize};

use crate::types::segmentation::Segmentation;

/// A pool word scored by the model for active-learning selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceRecord {
    /// Surface form of the pool word.
    pub word: String,
    /// Morphs the pool holds for the word (gold when the pool is annotated).
    pub morphs: Vec<String>,
    /// Morphs the model predicted for the word.
    pub predicted: Vec<String>,
    /// Mean marginal probability of the predicted tags, in `[0.0, 1.0]`.
    pub confidence: f64,
}

impl ConfidenceRecord {
    /// The pool segmentation this record was built from.
    pub fn segmentation(&self) -> Segmentation {
        Segmentation::from_decoded(self.word.clone(), self.morphs.clone())
    }

    /// The model's predicted segmentation.
    pub fn predicted_segmentation(&self) -> Segmentation {
        Segmentation::from_decoded(self.word.clone(), self.predicted.clone())
    }
}
