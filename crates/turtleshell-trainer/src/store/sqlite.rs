//! SQLite-backed store: one row per cycle, primary key `(seed, select_size)`.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::{bail, Context};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::{CycleArtifacts, CycleKey, CycleStore};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS cycles (
        seed        INTEGER NOT NULL,
        select_size INTEGER NOT NULL,
        record      TEXT    NOT NULL,
        model       BLOB    NOT NULL,
        PRIMARY KEY (seed, select_size)
    );
";

/// Stores cycles in a single SQLite database.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("opening database {}", path.display()))?;
        Self::initialize(conn)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> anyhow::Result<Self> {
        Self::initialize(Connection::open_in_memory()?)
    }

    fn initialize(conn: Connection) -> anyhow::Result<Self> {
        conn.execute_batch(SCHEMA).context("creating cycles table")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> anyhow::Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("sqlite store lock poisoned"))
    }
}

// SQLite integers are signed; seeds are stored by bit pattern.
fn seed_column(seed: u64) -> i64 {
    seed as i64
}

impl CycleStore for SqliteStore {
    fn load(&self, key: CycleKey) -> anyhow::Result<Option<CycleArtifacts>> {
        let row: Option<(String, Vec<u8>)> = self
            .conn()?
            .query_row(
                "SELECT record, model FROM cycles WHERE seed = ?1 AND select_size = ?2",
                params![seed_column(key.seed), key.select_size as i64],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .with_context(|| format!("loading cycle {key}"))?;

        let Some((record, model)) = row else {
            return Ok(None);
        };
        let mut artifacts: CycleArtifacts = serde_json::from_str(&record)
            .with_context(|| format!("parsing stored cycle {key}"))?;
        artifacts.model = model;
        Ok(Some(artifacts))
    }

    fn commit(&self, artifacts: &CycleArtifacts) -> anyhow::Result<()> {
        let key = artifacts.key;
        if self.contains(key)? {
            bail!("cycle {key} is already committed");
        }

        let record = serde_json::to_string(artifacts)?;
        self.conn()?
            .execute(
                "INSERT INTO cycles (seed, select_size, record, model) VALUES (?1, ?2, ?3, ?4)",
                params![
                    seed_column(key.seed),
                    key.select_size as i64,
                    record,
                    artifacts.model
                ],
            )
            .with_context(|| format!("committing cycle {key}"))?;

        debug!(key = %key, "committed cycle to sqlite");
        Ok(())
    }

    fn contains(&self, key: CycleKey) -> anyhow::Result<bool> {
        let found: Option<i64> = self
            .conn()?
            .query_row(
                "SELECT 1 FROM cycles WHERE seed = ?1 AND select_size = ?2",
                params![seed_column(key.seed), key.select_size as i64],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn keys(&self) -> anyhow::Result<Vec<CycleKey>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT seed, select_size FROM cycles")?;
        let mut keys = stmt
            .query_map([], |row| {
                let seed: i64 = row.get(0)?;
                let select_size: i64 = row.get(1)?;
                Ok(CycleKey::new(seed as u64, select_size as usize))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        keys.sort();
        Ok(keys)
    }
}
