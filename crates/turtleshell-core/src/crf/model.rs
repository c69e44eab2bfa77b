//! Linear-chain CRF over interned string features.
//!
//! Emission scores are the sum of per-feature, per-tag weights for the
//! features active at a position; unknown features contribute nothing.
//! Training is stochastic gradient ascent on the conditional
//! log-likelihood. A constrained model restricts both Viterbi decoding and
//! the marginals to grammatical tag sequences.

use std::collections::HashMap;

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::lattice::Lattice;
use super::viterbi::ViterbiDecoder;
use crate::codec::tags::BoundaryTag;
use crate::error::{Result, TurtleError};
use crate::features::CharFeatures;
use crate::labeler::{SequenceModel, SequenceTrainer, TagDistribution};
use crate::random;

const NUM_TAGS: usize = BoundaryTag::NUM_TAGS;

/// A trained CRF.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrfModel {
    features: HashMap<String, usize>,
    /// Row-major `[feature][tag]`.
    emission: Vec<f64>,
    /// `[from][to]`.
    transitions: Vec<Vec<f64>>,
    constrained: bool,
}

impl CrfModel {
    fn empty(features: HashMap<String, usize>, constrained: bool) -> Self {
        let emission = vec![0.0; features.len() * NUM_TAGS];
        Self {
            features,
            emission,
            transitions: vec![vec![0.0; NUM_TAGS]; NUM_TAGS],
            constrained,
        }
    }

    /// Number of interned features.
    pub fn num_features(&self) -> usize {
        self.features.len()
    }

    /// Whether prediction is restricted to grammatical tag sequences.
    pub fn is_constrained(&self) -> bool {
        self.constrained
    }

    pub fn transition(&self, from: BoundaryTag, to: BoundaryTag) -> f64 {
        self.transitions[from.index()][to.index()]
    }

    fn feature_ids(&self, sequence: &[CharFeatures]) -> Vec<Vec<usize>> {
        sequence
            .iter()
            .map(|position| {
                position
                    .names()
                    .filter_map(|name| self.features.get(name).copied())
                    .collect()
            })
            .collect()
    }

    fn emissions(&self, ids: &[Vec<usize>]) -> Vec<Vec<f64>> {
        ids.iter()
            .map(|position| {
                let mut scores = vec![0.0; NUM_TAGS];
                for &f in position {
                    let row = &self.emission[f * NUM_TAGS..(f + 1) * NUM_TAGS];
                    for (score, weight) in scores.iter_mut().zip(row) {
                        *score += weight;
                    }
                }
                scores
            })
            .collect()
    }

    fn decode(&self, emissions: &[Vec<f64>]) -> Result<Vec<BoundaryTag>> {
        let decoder = ViterbiDecoder::new(NUM_TAGS);
        let path = if self.constrained {
            decoder.decode_constrained(emissions, &self.transitions)?
        } else {
            decoder.decode(emissions, &self.transitions)?
        };
        path.into_iter()
            .map(|idx| {
                BoundaryTag::from_index(idx).ok_or_else(|| {
                    TurtleError::Model(format!("decoder produced tag index {idx}"))
                })
            })
            .collect()
    }

    fn check_shapes(&self) -> Result<()> {
        if self.emission.len() != self.features.len() * NUM_TAGS {
            return Err(TurtleError::ShapeMismatch(format!(
                "emission weights: expected {} values, got {}",
                self.features.len() * NUM_TAGS,
                self.emission.len()
            )));
        }
        if self.transitions.len() != NUM_TAGS
            || self.transitions.iter().any(|row| row.len() != NUM_TAGS)
        {
            return Err(TurtleError::ShapeMismatch(format!(
                "transition matrix must be {NUM_TAGS}x{NUM_TAGS}"
            )));
        }
        if let Some((name, _)) = self
            .features
            .iter()
            .find(|(_, id)| **id >= self.features.len())
        {
            return Err(TurtleError::ShapeMismatch(format!(
                "feature {name:?} has an out-of-range id"
            )));
        }
        Ok(())
    }
}

impl SequenceModel for CrfModel {
    fn predict(&self, features: &[Vec<CharFeatures>]) -> Result<Vec<Vec<BoundaryTag>>> {
        features
            .iter()
            .map(|sequence| {
                let emissions = self.emissions(&self.feature_ids(sequence));
                self.decode(&emissions)
            })
            .collect()
    }

    fn predict_marginals(
        &self,
        features: &[Vec<CharFeatures>],
    ) -> Result<Vec<Vec<TagDistribution>>> {
        Ok(features
            .iter()
            .map(|sequence| {
                let emissions = self.emissions(&self.feature_ids(sequence));
                let lattice = if self.constrained {
                    Lattice::compute_constrained(&emissions, &self.transitions)
                } else {
                    Lattice::compute(&emissions, &self.transitions)
                };
                lattice.distributions()
            })
            .collect())
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// CRF training hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrfTrainer {
    /// Passes over the training set
    pub max_iterations: usize,
    /// Initial step size, decayed as `lr / (1 + epoch / 10)`
    pub learning_rate: f64,
    /// L2 decay coefficient, applied once per epoch
    pub l2: f64,
    /// Seed for the per-epoch visiting order
    pub seed: u64,
    /// Restrict prediction to grammatical tag sequences
    pub constrained: bool,
}

impl Default for CrfTrainer {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            learning_rate: 0.1,
            l2: 1e-4,
            seed: 0,
            constrained: true,
        }
    }
}

impl CrfTrainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_l2(mut self, l2: f64) -> Self {
        self.l2 = l2;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_constrained(mut self, constrained: bool) -> Self {
        self.constrained = constrained;
        self
    }

    fn intern(features: &[Vec<CharFeatures>]) -> HashMap<String, usize> {
        let mut index = HashMap::new();
        for name in features.iter().flatten().flat_map(CharFeatures::names) {
            if !index.contains_key(name) {
                let id = index.len();
                index.insert(name.to_string(), id);
            }
        }
        index
    }

    /// One gradient step on a single sequence; returns its log-likelihood.
    fn step(model: &mut CrfModel, ids: &[Vec<usize>], gold: &[usize], lr: f64) -> f64 {
        let emissions = model.emissions(ids);
        let lattice = Lattice::compute(&emissions, &model.transitions);

        let mut gold_score = 0.0;
        for (t, &tag) in gold.iter().enumerate() {
            gold_score += emissions[t][tag];
            if t > 0 {
                gold_score += model.transitions[gold[t - 1]][tag];
            }
        }

        let mut emission_grad = vec![[0.0; NUM_TAGS]; ids.len()];
        for (t, grad) in emission_grad.iter_mut().enumerate() {
            for (tag, g) in grad.iter_mut().enumerate() {
                *g = -lattice.marginal(t, tag);
            }
            grad[gold[t]] += 1.0;
        }

        let mut transition_grad = [[0.0; NUM_TAGS]; NUM_TAGS];
        for t in 1..ids.len() {
            for (from, row) in transition_grad.iter_mut().enumerate() {
                for (to, g) in row.iter_mut().enumerate() {
                    *g -= lattice.pair_marginal(t, from, to, &emissions, &model.transitions);
                }
            }
            transition_grad[gold[t - 1]][gold[t]] += 1.0;
        }

        for (position, grad) in ids.iter().zip(&emission_grad) {
            for &f in position {
                for (tag, g) in grad.iter().enumerate() {
                    model.emission[f * NUM_TAGS + tag] += lr * g;
                }
            }
        }
        for (row, grad_row) in model.transitions.iter_mut().zip(&transition_grad) {
            for (w, g) in row.iter_mut().zip(grad_row) {
                *w += lr * g;
            }
        }

        gold_score - lattice.log_partition()
    }
}

impl SequenceTrainer for CrfTrainer {
    type Model = CrfModel;

    fn fit(&self, features: &[Vec<CharFeatures>], labels: &[Vec<BoundaryTag>]) -> Result<CrfModel> {
        if features.is_empty() {
            return Err(TurtleError::Model("cannot fit on an empty training set".into()));
        }
        if features.len() != labels.len() {
            return Err(TurtleError::ShapeMismatch(format!(
                "{} feature sequences but {} label sequences",
                features.len(),
                labels.len()
            )));
        }
        if let Some((i, _)) = features
            .iter()
            .zip(labels)
            .enumerate()
            .find(|(_, (f, l))| f.len() != l.len())
        {
            return Err(TurtleError::ShapeMismatch(format!(
                "sequence {i}: {} feature positions but {} labels",
                features[i].len(),
                labels[i].len()
            )));
        }

        let mut model = CrfModel::empty(Self::intern(features), self.constrained);
        let sequences: Vec<(Vec<Vec<usize>>, Vec<usize>)> = features
            .iter()
            .zip(labels)
            .filter(|(f, _)| !f.is_empty())
            .map(|(f, l)| {
                (
                    model.feature_ids(f),
                    l.iter().map(|tag| tag.index()).collect(),
                )
            })
            .collect();

        let mut rng = random::seeded(self.seed);
        let mut order: Vec<usize> = (0..sequences.len()).collect();

        for epoch in 0..self.max_iterations {
            let lr = self.learning_rate / (1.0 + epoch as f64 / 10.0);
            order.shuffle(&mut rng);

            let mut log_likelihood = 0.0;
            for &idx in &order {
                let (ids, gold) = &sequences[idx];
                log_likelihood += Self::step(&mut model, ids, gold, lr);
            }

            let decay = 1.0 - lr * self.l2;
            model.emission.iter_mut().for_each(|w| *w *= decay);
            model
                .transitions
                .iter_mut()
                .flatten()
                .for_each(|w| *w *= decay);

            debug!(
                epoch = epoch + 1,
                epochs = self.max_iterations,
                log_likelihood,
                "crf epoch complete"
            );
        }

        Ok(model)
    }

    fn restore(&self, bytes: &[u8]) -> Result<CrfModel> {
        let model: CrfModel = serde_json::from_slice(bytes)?;
        model.check_shapes()?;
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode;
    use crate::features::FeatureExtractor;
    use crate::types::{Dataset, Segmentation};

    fn corpus() -> Dataset {
        ["cat!s", "dog!s", "bird!s", "cat", "dog", "walk!ed", "talk!ed", "walk"]
            .into_iter()
            .map(|segmented| {
                Segmentation::new(segmented.split('!').map(String::from).collect()).unwrap()
            })
            .collect()
    }

    fn quick() -> CrfTrainer {
        CrfTrainer::new().with_max_iterations(30).with_seed(7)
    }

    #[test]
    fn test_fit_rejects_empty_training_set() {
        let err = CrfTrainer::new().fit(&[], &[]).unwrap_err();
        assert!(matches!(err, TurtleError::Model(_)));
    }

    #[test]
    fn test_fit_rejects_misaligned_labels() {
        let extractor = FeatureExtractor::default();
        let features = vec![extractor.word_features("ab")];
        let labels = vec![vec![BoundaryTag::WordStart, BoundaryTag::WordEnd]];
        assert!(matches!(
            CrfTrainer::new().fit(&features, &labels),
            Err(TurtleError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_learns_training_data() {
        let batch = FeatureExtractor::default()
            .extract_dataset(&corpus())
            .unwrap();
        let model = quick().fit(&batch.features, &batch.labels).unwrap();

        let predicted = model.predict(&batch.features).unwrap();
        assert_eq!(predicted, batch.labels);
    }

    #[test]
    fn test_generalizes_suffix() {
        let extractor = FeatureExtractor::default();
        let batch = extractor.extract_dataset(&corpus()).unwrap();
        let model = quick().fit(&batch.features, &batch.labels).unwrap();

        let predicted = model.predict(&[extractor.word_features("talks")]).unwrap();
        assert!(BoundaryTag::is_well_formed(&predicted[0]));
        assert_eq!(decode("talks", &predicted[0]).last().map(String::as_str), Some("s"));
    }

    #[test]
    fn test_marginals_are_distributions() {
        let extractor = FeatureExtractor::default();
        let batch = extractor.extract_dataset(&corpus()).unwrap();
        let model = quick().fit(&batch.features, &batch.labels).unwrap();

        let marginals = model
            .predict_marginals(&[extractor.word_features("unseen")])
            .unwrap();
        assert_eq!(marginals[0].len(), "unseen".len() + 2);
        assert!(marginals[0].iter().all(TagDistribution::is_valid));
    }

    #[test]
    fn test_constrained_marginals_match_decoding_grammar() {
        let extractor = FeatureExtractor::default();
        let batch = extractor.extract_dataset(&corpus()).unwrap();
        let features = [extractor.word_features("unseen")];

        let model = quick().fit(&batch.features, &batch.labels).unwrap();
        let marginals = model.predict_marginals(&features).unwrap();
        let tags = model.predict(&features).unwrap();
        assert!(BoundaryTag::is_well_formed(&tags[0]));

        let dists = &marginals[0];
        assert!((dists[0].prob(BoundaryTag::WordStart) - 1.0).abs() < 1e-9);
        assert!((dists[dists.len() - 1].prob(BoundaryTag::WordEnd) - 1.0).abs() < 1e-9);
        for dist in &dists[1..dists.len() - 1] {
            assert!(dist.prob(BoundaryTag::WordStart) < 1e-9);
            assert!(dist.prob(BoundaryTag::WordEnd) < 1e-9);
        }

        let free = quick()
            .with_constrained(false)
            .fit(&batch.features, &batch.labels)
            .unwrap();
        assert!(free.predict_marginals(&features).unwrap()[0].iter().all(TagDistribution::is_valid));
    }

    #[test]
    fn test_training_is_deterministic() {
        let batch = FeatureExtractor::default()
            .extract_dataset(&corpus())
            .unwrap();
        let a = quick().fit(&batch.features, &batch.labels).unwrap();
        let b = quick().fit(&batch.features, &batch.labels).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_bytes_restore() {
        let batch = FeatureExtractor::default()
            .extract_dataset(&corpus())
            .unwrap();
        let trainer = quick();
        let model = trainer.fit(&batch.features, &batch.labels).unwrap();

        let restored = trainer.restore(&model.to_bytes().unwrap()).unwrap();
        assert_eq!(
            restored.predict(&batch.features).unwrap(),
            model.predict(&batch.features).unwrap()
        );
    }

    #[test]
    fn test_restore_rejects_bad_shapes() {
        let mut model = CrfModel::empty(HashMap::from([("x".to_string(), 0)]), false);
        model.emission.pop();
        let bytes = serde_json::to_vec(&model).unwrap();
        assert!(matches!(
            CrfTrainer::new().restore(&bytes),
            Err(TurtleError::ShapeMismatch(_))
        ));
        assert!(matches!(
            CrfTrainer::new().restore(b"not json"),
            Err(TurtleError::Serialization(_))
        ));
    }
}
