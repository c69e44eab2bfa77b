//! Persistence of committed cycles.
//!
//! A cycle is addressed by its [`CycleKey`] and, once committed, is never
//! rewritten. Each backend reports a second commit under the same key as an
//! error.

pub mod fs;
pub mod memory;
pub mod sqlite;

use std::fmt;

use serde::{Deserialize, Serialize};
use turtleshell_core::scoring::EvaluationReport;
use turtleshell_core::types::{ConfidenceRecord, Dataset, Segmentation};

use crate::config::CycleConfig;

pub use fs::FsStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Address of one cycle: the trajectory seed and the cumulative number of
/// pool words selected before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CycleKey {
    pub seed: u64,
    pub select_size: usize,
}

impl CycleKey {
    pub fn new(seed: u64, select_size: usize) -> Self {
        Self { seed, select_size }
    }
}

impl fmt::Display for CycleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seed{}/select{}", self.seed, self.select_size)
    }
}

/// Everything a cycle produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleArtifacts {
    pub key: CycleKey,
    /// Settings the cycle ran with
    pub config: CycleConfig,
    /// Training set the model was fitted on
    pub train: Dataset,
    /// Model segmentations of the test words
    pub test_predictions: Vec<Segmentation>,
    /// Model segmentations of the pool words; `None` when the pool was empty
    pub pool_predictions: Option<Vec<Segmentation>>,
    /// Pool words selected for annotation
    pub increment: Vec<ConfidenceRecord>,
    /// Pool words carried into the next cycle
    pub residual: Vec<ConfidenceRecord>,
    pub evaluation: EvaluationReport,
    /// Serialized model, stored apart from the JSON record
    #[serde(skip)]
    pub model: Vec<u8>,
}

impl CycleArtifacts {
    /// Increment as a dataset of the pool's recorded segmentations.
    pub fn increment_dataset(&self) -> Dataset {
        self.increment.iter().map(ConfidenceRecord::segmentation).collect()
    }

    /// Residual as a dataset of the pool's recorded segmentations.
    pub fn residual_dataset(&self) -> Dataset {
        self.residual.iter().map(ConfidenceRecord::segmentation).collect()
    }
}

/// Storage backend for committed cycles.
pub trait CycleStore: Send + Sync {
    /// The cycle committed under `key`, if any.
    fn load(&self, key: CycleKey) -> anyhow::Result<Option<CycleArtifacts>>;

    /// Commit a cycle. Fails without side effects if the key is taken.
    fn commit(&self, artifacts: &CycleArtifacts) -> anyhow::Result<()>;

    fn contains(&self, key: CycleKey) -> anyhow::Result<bool>;

    /// All committed keys in ascending order.
    fn keys(&self) -> anyhow::Result<Vec<CycleKey>>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_display_and_order() {
        let mut keys = vec![CycleKey::new(1, 5), CycleKey::new(0, 10), CycleKey::new(1, 0)];
        keys.sort();
        assert_eq!(keys[0], CycleKey::new(0, 10));
        assert_eq!(keys[1].to_string(), "seed1/select0");
    }

    #[test]
    fn test_artifact_datasets() {
        let artifacts = testing::artifacts(CycleKey::new(0, 0));
        assert_eq!(artifacts.increment_dataset().labels_for("birds"), Some("BMMES"));
        assert_eq!(artifacts.residual_dataset().words(), vec!["cow"]);
    }

    #[test]
    fn test_model_is_not_serialized() {
        let artifacts = testing::artifacts(CycleKey::new(0, 0));
        let json = serde_json::to_string(&artifacts).unwrap();
        let back: CycleArtifacts = serde_json::from_str(&json).unwrap();
        assert!(back.model.is_empty());
        assert_eq!(back.increment, artifacts.increment);
    }
}
