//! Directory-per-cycle store.
//!
//! Layout under the root:
//!
//! ```text
//! seed<S>/select<N>/
//!     cycle.json          artifact record (everything but the model)
//!     crf.model           model bytes
//!     train.{src,tgt}     training set
//!     select.{src,tgt}    pool the cycle selected from
//!     test.pred.tgt       test predictions
//!     select.pred.tgt     pool predictions (only for a non-empty pool)
//!     increment.{src,tgt}
//!     residual.{src,tgt}
//!     eval.txt            rendered evaluation report
//! ```
//!
//! A cycle is written into a staging directory next to its final location
//! and renamed into place, so an interrupted commit leaves no cycle behind.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use tracing::{debug, warn};
use turtleshell_core::types::{ConfidenceRecord, Dataset, Segmentation};

use super::{CycleArtifacts, CycleKey, CycleStore};
use crate::data::{save_src_file, save_tgt_file};

const RECORD_FILE: &str = "cycle.json";
const MODEL_FILE: &str = "crf.model";

/// Stores cycles as plain files under a root directory.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .with_context(|| format!("creating store root {}", root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the cycle committed under `key`.
    pub fn cycle_dir(&self, key: CycleKey) -> PathBuf {
        self.root
            .join(format!("seed{}", key.seed))
            .join(format!("select{}", key.select_size))
    }

    fn staging_dir(&self, key: CycleKey) -> PathBuf {
        self.root.join(format!("seed{}", key.seed)).join(format!(
            ".select{}.staging-{}",
            key.select_size,
            std::process::id()
        ))
    }

    fn write_cycle(dir: &Path, artifacts: &CycleArtifacts) -> anyhow::Result<()> {
        let record = serde_json::to_vec_pretty(artifacts)?;
        fs::write(dir.join(RECORD_FILE), record)?;
        fs::write(dir.join(MODEL_FILE), &artifacts.model)?;

        save_pair(dir, "train", &artifacts.train)?;
        let pool: Dataset = artifacts
            .increment
            .iter()
            .chain(&artifacts.residual)
            .map(ConfidenceRecord::segmentation)
            .collect();
        save_pair(dir, "select", &pool)?;
        save_pair(dir, "increment", &artifacts.increment_dataset())?;
        save_pair(dir, "residual", &artifacts.residual_dataset())?;

        save_predictions(&dir.join("test.pred.tgt"), &artifacts.test_predictions)?;
        if let Some(pool_predictions) = &artifacts.pool_predictions {
            save_predictions(&dir.join("select.pred.tgt"), pool_predictions)?;
        }

        fs::write(dir.join("eval.txt"), artifacts.evaluation.render())?;
        Ok(())
    }
}

impl CycleStore for FsStore {
    fn load(&self, key: CycleKey) -> anyhow::Result<Option<CycleArtifacts>> {
        let dir = self.cycle_dir(key);
        if !dir.is_dir() {
            return Ok(None);
        }

        let record = fs::read(dir.join(RECORD_FILE))
            .with_context(|| format!("reading {}", dir.join(RECORD_FILE).display()))?;
        let mut artifacts: CycleArtifacts = serde_json::from_slice(&record)
            .with_context(|| format!("parsing {}", dir.join(RECORD_FILE).display()))?;
        artifacts.model = fs::read(dir.join(MODEL_FILE))
            .with_context(|| format!("reading {}", dir.join(MODEL_FILE).display()))?;

        if artifacts.key != key {
            bail!("{} holds cycle {}, expected {key}", dir.display(), artifacts.key);
        }
        Ok(Some(artifacts))
    }

    fn commit(&self, artifacts: &CycleArtifacts) -> anyhow::Result<()> {
        let key = artifacts.key;
        let target = self.cycle_dir(key);
        if target.exists() {
            bail!("cycle {key} is already committed at {}", target.display());
        }

        let staging = self.staging_dir(key);
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }
        fs::create_dir_all(&staging)
            .with_context(|| format!("creating {}", staging.display()))?;

        let written = Self::write_cycle(&staging, artifacts)
            .and_then(|()| Ok(fs::rename(&staging, &target)?));
        if let Err(e) = written {
            if let Err(cleanup) = fs::remove_dir_all(&staging) {
                warn!(dir = %staging.display(), error = %cleanup, "failed to remove staging directory");
            }
            return Err(e.context(format!("committing cycle {key}")));
        }

        debug!(key = %key, dir = %target.display(), "committed cycle to disk");
        Ok(())
    }

    fn contains(&self, key: CycleKey) -> anyhow::Result<bool> {
        Ok(self.cycle_dir(key).is_dir())
    }

    fn keys(&self) -> anyhow::Result<Vec<CycleKey>> {
        let mut keys = Vec::new();
        for seed_entry in fs::read_dir(&self.root)? {
            let seed_entry = seed_entry?;
            let Some(seed) = parse_suffix(&seed_entry.file_name(), "seed") else {
                continue;
            };
            if !seed_entry.file_type()?.is_dir() {
                continue;
            }
            for cycle_entry in fs::read_dir(seed_entry.path())? {
                let cycle_entry = cycle_entry?;
                if let Some(select_size) = parse_suffix(&cycle_entry.file_name(), "select") {
                    keys.push(CycleKey::new(seed, select_size as usize));
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

fn parse_suffix(name: &std::ffi::OsStr, prefix: &str) -> Option<u64> {
    name.to_str()?.strip_prefix(prefix)?.parse().ok()
}

fn save_pair(dir: &Path, stem: &str, dataset: &Dataset) -> anyhow::Result<()> {
    save_src_file(dir.join(format!("{stem}.src")), dataset)?;
    save_tgt_file(dir.join(format!("{stem}.tgt")), dataset)
}

fn save_predictions(path: &Path, predictions: &[Segmentation]) -> anyhow::Result<()> {
    let dataset: Dataset = predictions.iter().cloned().collect();
    save_tgt_file(path, &dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::artifacts;

    fn temp_store(name: &str) -> FsStore {
        let root = std::env::temp_dir().join(format!(
            "turtleshell-fs-{}-{name}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&root);
        FsStore::open(root).unwrap()
    }

    #[test]
    fn test_commit_and_load() {
        let store = temp_store("roundtrip");
        let key = CycleKey::new(1, 0);
        store.commit(&artifacts(key)).unwrap();

        assert!(store.contains(key).unwrap());
        assert_eq!(store.load(key).unwrap(), Some(artifacts(key)));

        let dir = store.cycle_dir(key);
        let increment = fs::read_to_string(dir.join("increment.tgt")).unwrap();
        assert_eq!(increment.trim_end(), "b i r d ! s");
        assert!(dir.join("select.pred.tgt").exists());
        assert!(
            fs::read_to_string(dir.join("eval.txt"))
                .unwrap()
                .starts_with("# TurtleShell Evaluation Report")
        );

        fs::remove_dir_all(store.root()).unwrap();
    }

    #[test]
    fn test_second_commit_is_rejected() {
        let store = temp_store("immutable");
        let key = CycleKey::new(0, 0);
        store.commit(&artifacts(key)).unwrap();

        let mut changed = artifacts(key);
        changed.model = vec![7, 7];
        assert!(store.commit(&changed).is_err());
        assert_eq!(store.load(key).unwrap().unwrap().model, vec![1, 2, 3]);

        fs::remove_dir_all(store.root()).unwrap();
    }

    #[test]
    fn test_empty_pool_writes_no_pool_predictions() {
        let store = temp_store("nopool");
        let key = CycleKey::new(0, 4);
        let mut cycle = artifacts(key);
        cycle.pool_predictions = None;
        store.commit(&cycle).unwrap();

        assert!(!store.cycle_dir(key).join("select.pred.tgt").exists());
        assert_eq!(store.load(key).unwrap().unwrap().pool_predictions, None);

        fs::remove_dir_all(store.root()).unwrap();
    }

    #[test]
    fn test_keys_skip_staging_and_foreign_entries() {
        let store = temp_store("keys");
        store.commit(&artifacts(CycleKey::new(2, 5))).unwrap();
        store.commit(&artifacts(CycleKey::new(2, 0))).unwrap();
        fs::create_dir_all(store.root().join("seed2").join(".select9.staging-1")).unwrap();
        fs::create_dir_all(store.root().join("notes")).unwrap();

        assert_eq!(
            store.keys().unwrap(),
            vec![CycleKey::new(2, 0), CycleKey::new(2, 5)]
        );
        assert!(store.load(CycleKey::new(2, 9)).unwrap().is_none());

        fs::remove_dir_all(store.root()).unwrap();
    }
}
