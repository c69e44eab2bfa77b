//! # Active-Learning Selection
//!
//! Partitions a scored pool into the increment handed to the annotator and
//! the residual carried into the next cycle.

use serde::{Deserialize, Serialize};

use crate::random;
use crate::types::ConfidenceRecord;

/// How many pool words a single cycle may take.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResidualPolicy {
    /// Leave at least one word in the residual while the pool has more
    /// than one word.
    #[default]
    Reserve,
    /// Allow the increment to drain the pool.
    Exhaust,
}

/// Order in which pool words are offered for annotation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    /// Lowest confidence first.
    #[default]
    LeastConfidence,
    /// Seeded random order, ignoring confidence.
    Random,
}

/// Ordering among words with equal confidence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Keep pool order.
    #[default]
    PoolOrder,
    /// Seeded shuffle before sorting.
    Shuffled,
}

/// Increment and residual produced by one selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub increment: Vec<ConfidenceRecord>,
    pub residual: Vec<ConfidenceRecord>,
}

/// Number of words the increment takes from a pool of `pool_size`.
#[must_use]
pub fn increment_len(pool_size: usize, increment_size: usize, policy: ResidualPolicy) -> usize {
    match policy {
        ResidualPolicy::Reserve if pool_size > 1 => increment_size.min(pool_size - 1),
        ResidualPolicy::Reserve => pool_size,
        ResidualPolicy::Exhaust => increment_size.min(pool_size),
    }
}

/// Selection settings for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selector {
    pub increment_size: usize,
    pub policy: ResidualPolicy,
    pub strategy: SelectionStrategy,
    pub tie_break: TieBreak,
    pub seed: u64,
}

impl Selector {
    pub fn new(increment_size: usize) -> Self {
        Self {
            increment_size,
            policy: ResidualPolicy::default(),
            strategy: SelectionStrategy::default(),
            tie_break: TieBreak::default(),
            seed: 0,
        }
    }

    pub fn with_policy(mut self, policy: ResidualPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_strategy(mut self, strategy: SelectionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Orders the pool and splits it. Every record lands in exactly one of
    /// the two halves.
    pub fn select(&self, mut records: Vec<ConfidenceRecord>) -> Selection {
        let k = increment_len(records.len(), self.increment_size, self.policy);

        match self.strategy {
            SelectionStrategy::LeastConfidence => {
                if self.tie_break == TieBreak::Shuffled {
                    random::shuffle_seeded(&mut records, self.seed);
                }
                // stable: equal confidences keep their current order
                records.sort_by(|a, b| a.confidence.total_cmp(&b.confidence));
            }
            SelectionStrategy::Random => {
                random::shuffle_seeded(&mut records, self.seed);
            }
        }

        let residual = records.split_off(k);
        Selection {
            increment: records,
            residual,
        }
    }
}

/// Least-confidence selection with the default residual policy.
///
/// # Examples
/// ```
/// use turtleshell_core::selection::select;
/// use turtleshell_core::types::ConfidenceRecord;
///
/// let record = |word: &str, confidence| ConfidenceRecord {
///     word: word.into(),
///     morphs: vec![word.into()],
///     predicted: vec![word.into()],
///     confidence,
/// };
/// let selection = select(vec![record("a", 0.9), record("b", 0.1), record("c", 0.5)], 5);
///
/// assert_eq!(selection.increment.len(), 2);
/// assert_eq!(selection.increment[0].word, "b");
/// assert_eq!(selection.residual[0].word, "a");
/// ```
pub fn select(records: Vec<ConfidenceRecord>, increment_size: usize) -> Selection {
    Selector::new(increment_size).select(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(word: &str, confidence: f64) -> ConfidenceRecord {
        ConfidenceRecord {
            word: word.into(),
            morphs: vec![word.into()],
            predicted: vec![word.into()],
            confidence,
        }
    }

    fn words(records: &[ConfidenceRecord]) -> Vec<&str> {
        records.iter().map(|r| r.word.as_str()).collect()
    }

    fn pool() -> Vec<ConfidenceRecord> {
        vec![
            record("w0", 0.7),
            record("w1", 0.2),
            record("w2", 0.9),
            record("w3", 0.2),
            record("w4", 0.5),
        ]
    }

    #[test]
    fn test_increment_len_reserve() {
        assert_eq!(increment_len(10, 3, ResidualPolicy::Reserve), 3);
        assert_eq!(increment_len(3, 3, ResidualPolicy::Reserve), 2);
        assert_eq!(increment_len(1, 3, ResidualPolicy::Reserve), 1);
        assert_eq!(increment_len(0, 3, ResidualPolicy::Reserve), 0);
    }

    #[test]
    fn test_increment_len_exhaust() {
        assert_eq!(increment_len(3, 3, ResidualPolicy::Exhaust), 3);
        assert_eq!(increment_len(2, 3, ResidualPolicy::Exhaust), 2);
    }

    #[test]
    fn test_least_confidence_is_stable() {
        let selection = select(pool(), 3);
        assert_eq!(words(&selection.increment), vec!["w1", "w3", "w4"]);
        assert_eq!(words(&selection.residual), vec!["w0", "w2"]);
    }

    #[test]
    fn test_partition_is_exact() {
        let selection = Selector::new(10)
            .with_tie_break(TieBreak::Shuffled)
            .with_seed(4)
            .select(pool());
        assert_eq!(selection.increment.len(), 4);
        assert_eq!(selection.residual.len(), 1);

        let mut all = words(&selection.increment);
        all.extend(words(&selection.residual));
        all.sort_unstable();
        assert_eq!(all, vec!["w0", "w1", "w2", "w3", "w4"]);
        assert_eq!(selection.residual[0].word, "w2");
    }

    #[test]
    fn test_exhaust_drains_pool() {
        let selection = Selector::new(10)
            .with_policy(ResidualPolicy::Exhaust)
            .select(pool());
        assert_eq!(selection.increment.len(), 5);
        assert!(selection.residual.is_empty());
    }

    #[test]
    fn test_single_word_pool() {
        let selection = select(vec![record("only", 0.3)], 4);
        assert_eq!(words(&selection.increment), vec!["only"]);
        assert!(selection.residual.is_empty());
    }

    #[test]
    fn test_empty_pool() {
        let selection = select(Vec::new(), 4);
        assert!(selection.increment.is_empty());
        assert!(selection.residual.is_empty());
    }

    #[test]
    fn test_random_strategy_is_seeded() {
        let selector = Selector::new(2)
            .with_strategy(SelectionStrategy::Random)
            .with_seed(9);
        let a = selector.select(pool());
        let b = selector.select(pool());
        assert_eq!(a, b);
        assert_eq!(a.increment.len(), 2);
        assert_eq!(a.residual.len(), 3);
    }
}
