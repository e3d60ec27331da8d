//! Quota-bound persistent store for model graph bytes.
//!
//! One SQLite table keyed by model id. The cache is version-agnostic
//! storage: it records the version string it was given but never
//! interprets it (see [`super::guard::VersionedCacheGuard`]).
//!
//! Invariant: total stored bytes never exceed the configured quota. `put`
//! evicts oldest-access-first until the new entry fits, inside a single
//! transaction, so no reader can observe a torn over-quota state. An entry
//! larger than the entire quota is refused outright, never partially
//! cached.

use std::path::Path;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{params, Connection, OptionalExtension};

use crate::core::{VisionError, VisionResult};

/// Per-entry statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntryStats {
    pub id: String,
    pub size_bytes: u64,
    /// Wall-clock milliseconds of the last access.
    pub last_access_ms: i64,
    pub version: String,
}

/// Aggregate cache statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub total_bytes: u64,
    pub entries: Vec<CacheEntryStats>,
}

/// Content-keyed artifact store with LRU eviction.
///
/// Writes are serialized through an internal mutex; cache writes happen
/// once per model download, not per frame, so contention is negligible.
pub struct ArtifactCache {
    conn: Mutex<Connection>,
    quota_bytes: u64,
}

impl ArtifactCache {
    /// Opens (or creates) a cache database at `path`.
    pub fn open(path: impl AsRef<Path>, quota_bytes: u64) -> VisionResult<Self> {
        let conn = Connection::open(path.as_ref())?;
        Self::from_connection(conn, quota_bytes)
    }

    /// Opens an in-memory cache, useful for tests and ephemeral sessions.
    pub fn open_in_memory(quota_bytes: u64) -> VisionResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, quota_bytes)
    }

    fn from_connection(conn: Connection, quota_bytes: u64) -> VisionResult<Self> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;

            CREATE TABLE IF NOT EXISTS artifacts (
              id TEXT PRIMARY KEY,
              bytes BLOB NOT NULL,
              size_bytes INTEGER NOT NULL,
              last_access INTEGER NOT NULL,
              access_seq INTEGER NOT NULL,
              version TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_artifacts_access
              ON artifacts(last_access, access_seq);
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
            quota_bytes,
        })
    }

    /// The configured quota in bytes.
    pub fn quota_bytes(&self) -> u64 {
        self.quota_bytes
    }

    /// Fetches an entry's bytes and refreshes its access time.
    pub fn get(&self, id: &str) -> VisionResult<Option<Vec<u8>>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let bytes: Option<Vec<u8>> = tx
            .query_row("SELECT bytes FROM artifacts WHERE id = ?1", [id], |row| {
                row.get(0)
            })
            .optional()?;

        if bytes.is_some() {
            let seq = next_access_seq(&tx)?;
            tx.execute(
                "UPDATE artifacts SET last_access = ?1, access_seq = ?2 WHERE id = ?3",
                params![now_ms(), seq, id],
            )?;
        }
        tx.commit()?;
        Ok(bytes)
    }

    /// Stores an entry, evicting oldest-access entries until it fits.
    ///
    /// Returns [`VisionError::ArtifactTooLargeForCache`] without storing
    /// anything when the entry alone exceeds the quota.
    pub fn put(&self, id: &str, bytes: &[u8], version: &str) -> VisionResult<()> {
        let size = bytes.len() as u64;
        if size > self.quota_bytes {
            return Err(VisionError::ArtifactTooLargeForCache {
                size_bytes: size,
                quota_bytes: self.quota_bytes,
            });
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        // Replacing an entry frees its old footprint first.
        tx.execute("DELETE FROM artifacts WHERE id = ?1", [id])?;

        let mut total: u64 = tx
            .query_row(
                "SELECT COALESCE(SUM(size_bytes), 0) FROM artifacts",
                [],
                |row| row.get::<_, i64>(0),
            )
            .map(|v| v as u64)?;

        while total + size > self.quota_bytes {
            let victim: Option<(String, i64)> = tx
                .query_row(
                    "SELECT id, size_bytes FROM artifacts
                     ORDER BY last_access ASC, access_seq ASC LIMIT 1",
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            match victim {
                Some((victim_id, victim_size)) => {
                    tx.execute("DELETE FROM artifacts WHERE id = ?1", [&victim_id])?;
                    total -= victim_size as u64;
                    tracing::debug!(evicted = %victim_id, freed = victim_size, "cache eviction");
                }
                None => break,
            }
        }

        let seq = next_access_seq(&tx)?;
        tx.execute(
            "INSERT INTO artifacts (id, bytes, size_bytes, last_access, access_seq, version)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![id, bytes, size as i64, now_ms(), seq, version],
        )?;
        tx.commit()?;

        tracing::debug!(id, size, version, "artifact cached");
        Ok(())
    }

    /// Removes an entry.
    pub fn invalidate(&self, id: &str) -> VisionResult<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM artifacts WHERE id = ?1", [id])?;
        Ok(())
    }

    /// The stored version string of an entry, without touching its bytes
    /// or access time. The cache does not interpret this value.
    pub fn entry_version(&self, id: &str) -> VisionResult<Option<String>> {
        let conn = self.lock()?;
        let version = conn
            .query_row("SELECT version FROM artifacts WHERE id = ?1", [id], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(version)
    }

    /// Aggregate and per-entry statistics.
    pub fn stats(&self) -> VisionResult<CacheStats> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, size_bytes, last_access, version FROM artifacts
             ORDER BY last_access ASC, access_seq ASC",
        )?;
        let entries = stmt
            .query_map([], |row| {
                Ok(CacheEntryStats {
                    id: row.get(0)?,
                    size_bytes: row.get::<_, i64>(1)? as u64,
                    last_access_ms: row.get(2)?,
                    version: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        let total_bytes = entries.iter().map(|e| e.size_bytes).sum();
        Ok(CacheStats {
            total_bytes,
            entries,
        })
    }

    fn lock(&self) -> VisionResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| VisionError::InvalidState {
            message: "artifact cache lock poisoned".to_string(),
        })
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Monotonic tiebreaker so eviction order stays deterministic even when
/// two accesses land on the same wall-clock millisecond.
fn next_access_seq(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COALESCE(MAX(access_seq), 0) + 1 FROM artifacts",
        [],
        |row| row.get(0),
    )
}
