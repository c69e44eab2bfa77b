//! Initial train/test/pool partitioning of a gold corpus.

use serde::{Deserialize, Serialize};
use tracing::info;
use turtleshell_core::random;
use turtleshell_core::types::{Dataset, Segmentation, SplitKind};
use turtleshell_core::{Result, TurtleError};

/// How a gold corpus is cut into the three starting splits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BootstrapPlan {
    /// Share of the corpus held out for evaluation
    pub test_fraction: f64,
    /// Words in the initial training set
    pub initial_size: usize,
}

impl Default for BootstrapPlan {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            initial_size: 100,
        }
    }
}

/// The three datasets a trajectory starts from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Splits {
    pub train: Dataset,
    pub test: Dataset,
    pub pool: Dataset,
}

impl Splits {
    pub fn new(train: Dataset, test: Dataset, pool: Dataset) -> Self {
        Self { train, test, pool }
    }

    pub fn get(&self, kind: SplitKind) -> &Dataset {
        match kind {
            SplitKind::Train => &self.train,
            SplitKind::Test => &self.test,
            SplitKind::Pool => &self.pool,
        }
    }
}

/// Shuffles `corpus` with `seed`, holds out the test share, then takes the
/// first `initial_size` remaining words for training and leaves the rest in
/// the pool.
///
/// # Errors
///
/// Returns `TurtleError::InvalidConfig` if `test_fraction` lies outside
/// `[0, 1)`.
pub fn partition(corpus: &Dataset, plan: BootstrapPlan, seed: u64) -> Result<Splits> {
    if !(0.0..1.0).contains(&plan.test_fraction) {
        return Err(TurtleError::InvalidConfig(format!(
            "test_fraction must be in [0, 1), got {}",
            plan.test_fraction
        )));
    }

    let mut examples: Vec<Segmentation> = corpus.examples().to_vec();
    random::shuffle_seeded(&mut examples, seed);

    let train_share = (examples.len() as f64 * (1.0 - plan.test_fraction)).floor() as usize;
    let test = examples.split_off(train_share);
    let pool = examples.split_off(plan.initial_size.min(examples.len()));

    let splits = Splits::new(examples.into(), test.into(), pool.into());
    info!(
        seed,
        train = splits.train.len(),
        test = splits.test.len(),
        pool = splits.pool.len(),
        "partitioned corpus"
    );
    Ok(splits)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus(n: usize) -> Dataset {
        (0..n)
            .map(|i| Segmentation::new(vec![format!("w{i}"), "s".into()]).unwrap())
            .collect()
    }

    #[test]
    fn test_partition_sizes() {
        let plan = BootstrapPlan {
            test_fraction: 0.2,
            initial_size: 3,
        };
        let splits = partition(&corpus(20), plan, 1).unwrap();
        assert_eq!(splits.test.len(), 4);
        assert_eq!(splits.train.len(), 3);
        assert_eq!(splits.pool.len(), 13);
    }

    #[test]
    fn test_partition_covers_corpus() {
        let splits = partition(&corpus(10), BootstrapPlan::default(), 5).unwrap();
        let mut words: Vec<&str> = [SplitKind::Train, SplitKind::Test, SplitKind::Pool]
            .into_iter()
            .flat_map(|kind| splits.get(kind).words())
            .collect();
        words.sort_unstable();
        let mut expected: Vec<String> = (0..10).map(|i| format!("w{i}s")).collect();
        expected.sort_unstable();
        assert_eq!(words, expected);
        // initial size larger than what is left: pool is empty
        assert!(splits.pool.is_empty());
    }

    #[test]
    fn test_partition_is_seeded() {
        let plan = BootstrapPlan {
            test_fraction: 0.3,
            initial_size: 2,
        };
        assert_eq!(
            partition(&corpus(12), plan, 8).unwrap(),
            partition(&corpus(12), plan, 8).unwrap()
        );
    }

    #[test]
    fn test_rejects_bad_fraction() {
        let plan = BootstrapPlan {
            test_fraction: 1.0,
            initial_size: 1,
        };
        assert!(matches!(
            partition(&corpus(4), plan, 0),
            Err(TurtleError::InvalidConfig(_))
        ));
    }
}
