use std::collections::BTreeMap;
use std::sync::Mutex;

use anyhow::bail;
use tracing::debug;

use super::{CycleArtifacts, CycleKey, CycleStore};

/// Keeps committed cycles in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    cycles: Mutex<BTreeMap<CycleKey, CycleArtifacts>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> anyhow::Result<std::sync::MutexGuard<'_, BTreeMap<CycleKey, CycleArtifacts>>> {
        self.cycles
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))
    }
}

impl CycleStore for MemoryStore {
    fn load(&self, key: CycleKey) -> anyhow::Result<Option<CycleArtifacts>> {
        Ok(self.lock()?.get(&key).cloned())
    }

    fn commit(&self, artifacts: &CycleArtifacts) -> anyhow::Result<()> {
        let mut cycles = self.lock()?;
        if cycles.contains_key(&artifacts.key) {
            bail!("cycle {} is already committed", artifacts.key);
        }
        cycles.insert(artifacts.key, artifacts.clone());
        debug!(key = %artifacts.key, "committed cycle to memory");
        Ok(())
    }

    fn contains(&self, key: CycleKey) -> anyhow::Result<bool> {
        Ok(self.lock()?.contains_key(&key))
    }

    fn keys(&self) -> anyhow::Result<Vec<CycleKey>> {
        Ok(self.lock()?.keys().copied().collect())
    }
}
