//! # Sequence Labeling Capability
//!
//! The active-learning loop never looks inside the sequence model. Any
//! structured-prediction backend that can be fitted on feature/label
//! sequences and asked for tags and per-position tag marginals plugs in
//! through [`SequenceTrainer`] and [`SequenceModel`].

use serde::{Deserialize, Serialize};

use crate::codec::tags::BoundaryTag;
use crate::error::Result;
use crate::features::CharFeatures;

/// A probability distribution over the boundary tags at one position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TagDistribution([f64; BoundaryTag::NUM_TAGS]);

impl TagDistribution {
    /// Wraps per-tag probabilities indexed by [`BoundaryTag::index`].
    pub fn new(probs: [f64; BoundaryTag::NUM_TAGS]) -> Self {
        Self(probs)
    }

    /// Builds a distribution from a function of the tag.
    pub fn from_fn(mut f: impl FnMut(BoundaryTag) -> f64) -> Self {
        let mut probs = [0.0; BoundaryTag::NUM_TAGS];
        for tag in BoundaryTag::all_tags() {
            probs[tag.index()] = f(*tag);
        }
        Self(probs)
    }

    /// All mass on a single tag.
    pub fn point(tag: BoundaryTag) -> Self {
        Self::from_fn(|t| if t == tag { 1.0 } else { 0.0 })
    }

    /// Equal mass on every tag.
    pub fn uniform() -> Self {
        Self([1.0 / BoundaryTag::NUM_TAGS as f64; BoundaryTag::NUM_TAGS])
    }

    /// Probability assigned to `tag`.
    pub fn prob(&self, tag: BoundaryTag) -> f64 {
        self.0[tag.index()]
    }

    /// The most probable tag (lowest index wins ties).
    pub fn argmax(&self) -> BoundaryTag {
        let mut best = 0;
        for idx in 1..BoundaryTag::NUM_TAGS {
            if self.0[idx] > self.0[best] {
                best = idx;
            }
        }
        BoundaryTag::from_index(best).unwrap_or(BoundaryTag::Single)
    }

    /// Rescales the probabilities to sum to one, clamping negatives to zero.
    /// A distribution with no mass becomes uniform.
    pub fn normalized(self) -> Self {
        let clamped = self.0.map(|p| if p.is_finite() { p.max(0.0) } else { 0.0 });
        let total: f64 = clamped.iter().sum();
        if total <= 0.0 {
            return Self::uniform();
        }
        Self(clamped.map(|p| (p / total).min(1.0)))
    }

    /// Whether every probability lies in `[0, 1]` and they sum to one.
    pub fn is_valid(&self) -> bool {
        let total: f64 = self.0.iter().sum();
        self.0.iter().all(|p| (0.0..=1.0).contains(p)) && (total - 1.0).abs() < 1e-6
    }

    pub fn as_array(&self) -> &[f64; BoundaryTag::NUM_TAGS] {
        &self.0
    }
}

/// A trained sequence labeler.
pub trait SequenceModel {
    /// Most likely tag sequence for each input sequence.
    fn predict(&self, features: &[Vec<CharFeatures>]) -> Result<Vec<Vec<BoundaryTag>>>;

    /// Per-position tag marginals for each input sequence.
    fn predict_marginals(
        &self,
        features: &[Vec<CharFeatures>],
    ) -> Result<Vec<Vec<TagDistribution>>>;

    /// Opaque artifact that [`SequenceTrainer::restore`] turns back into a model.
    fn to_bytes(&self) -> Result<Vec<u8>>;
}

/// Fits [`SequenceModel`]s and restores persisted ones.
pub trait SequenceTrainer {
    type Model: SequenceModel;

    /// Trains a model on aligned feature and label sequences.
    fn fit(
        &self,
        features: &[Vec<CharFeatures>],
        labels: &[Vec<BoundaryTag>],
    ) -> Result<Self::Model>;

    /// Restores a model from bytes produced by [`SequenceModel::to_bytes`].
    fn restore(&self, bytes: &[u8]) -> Result<Self::Model>;
}
