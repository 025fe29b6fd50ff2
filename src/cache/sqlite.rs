//! SQLite-backed cache tier for persistence across runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use std::sync::Mutex;

use super::backend::CacheBackend;
use crate::error::{Error, Result};

/// Schema for the cache table.
const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS cache_entries (
    cache_key TEXT PRIMARY KEY,
    value BLOB NOT NULL,
    expires_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_cache_entries_expires
    ON cache_entries(expires_at);
"#;

/// Persistent cache tier storing serialized JSON in SQLite.
pub struct SqliteCache {
  conn: Mutex<Connection>,
}

impl SqliteCache {
  /// Open (or create) the cache database at the default location,
  /// `<data dir>/gw2api/cache.db`.
  pub fn open() -> Result<Self> {
    let path = Self::default_path()?;

    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| Error::Cache(format!("failed to create cache directory: {}", e)))?;
    }

    Self::open_at(&path)
  }

  /// Open (or create) the cache database at an explicit path.
  pub fn open_at(path: &Path) -> Result<Self> {
    let conn = Connection::open(path).map_err(|e| {
      Error::Cache(format!(
        "failed to open cache database at {}: {}",
        path.display(),
        e
      ))
    })?;

    let cache = Self {
      conn: Mutex::new(conn),
    };
    cache.run_migrations()?;

    Ok(cache)
  }

  fn default_path() -> Result<std::path::PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| Error::Cache("could not determine data directory".to_string()))?;

    Ok(data_dir.join("gw2api").join("cache.db"))
  }

  fn run_migrations(&self) -> Result<()> {
    let conn = self.lock()?;

    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| Error::Cache(format!("failed to run cache migrations: {}", e)))?;

    Ok(())
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
    self
      .conn
      .lock()
      .map_err(|e| Error::Cache(format!("lock poisoned: {}", e)))
  }
}

#[async_trait]
impl CacheBackend for SqliteCache {
  async fn get(&self, key: &str) -> Result<Option<Value>> {
    let conn = self.lock()?;

    let mut stmt = conn
      .prepare("SELECT value, expires_at FROM cache_entries WHERE cache_key = ?")
      .map_err(|e| Error::Cache(format!("failed to prepare query: {}", e)))?;

    // A missing row is a normal miss; everything else is a real
    // backend failure and must propagate
    let row: Option<(Vec<u8>, String)> = stmt
      .query_row(params![key], |row| Ok((row.get(0)?, row.get(1)?)))
      .optional()
      .map_err(|e| Error::Cache(format!("failed to read entry: {}", e)))?;

    let (data, expires_at) = match row {
      Some(row) => row,
      None => return Ok(None),
    };

    if parse_datetime(&expires_at)? <= Utc::now() {
      conn
        .execute("DELETE FROM cache_entries WHERE cache_key = ?", params![key])
        .map_err(|e| Error::Cache(format!("failed to evict expired entry: {}", e)))?;
      return Ok(None);
    }

    let value: Value = serde_json::from_slice(&data)?;
    Ok(Some(value))
  }

  async fn set(&self, key: &str, value: Value, ttl_seconds: u64) -> Result<()> {
    let conn = self.lock()?;

    let data = serde_json::to_vec(&value)?;
    let expires_at = Utc::now() + chrono::Duration::seconds(ttl_seconds as i64);

    conn
      .execute(
        "INSERT OR REPLACE INTO cache_entries (cache_key, value, expires_at)
         VALUES (?, ?, ?)",
        params![key, data, format_datetime(expires_at)],
      )
      .map_err(|e| Error::Cache(format!("failed to store entry: {}", e)))?;

    Ok(())
  }

  async fn mset(&self, entries: Vec<(String, Value, u64)>) -> Result<()> {
    let now = Utc::now();

    // Serialize before opening the transaction so a bad value cannot
    // leave it dangling
    let mut rows = Vec::with_capacity(entries.len());
    for (key, value, ttl) in entries {
      let data = serde_json::to_vec(&value)?;
      let expires_at = now + chrono::Duration::seconds(ttl as i64);
      rows.push((key, data, format_datetime(expires_at)));
    }

    let mut conn = self.lock()?;

    // Drop rolls back on any failure below, so an error never leaves
    // the connection inside a dangling transaction
    let tx = conn
      .transaction()
      .map_err(|e| Error::Cache(format!("failed to begin transaction: {}", e)))?;

    for (key, data, expires_at) in rows {
      tx.execute(
        "INSERT OR REPLACE INTO cache_entries (cache_key, value, expires_at)
         VALUES (?, ?, ?)",
        params![key, data, expires_at],
      )
      .map_err(|e| Error::Cache(format!("failed to store entry: {}", e)))?;
    }

    tx.commit()
      .map_err(|e| Error::Cache(format!("failed to commit transaction: {}", e)))?;

    Ok(())
  }

  async fn flush(&self) -> Result<()> {
    let conn = self.lock()?;

    conn
      .execute("DELETE FROM cache_entries", [])
      .map_err(|e| Error::Cache(format!("failed to flush cache: {}", e)))?;

    Ok(())
  }
}

fn format_datetime(dt: DateTime<Utc>) -> String {
  dt.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.3f")
    .map(|dt| dt.and_utc())
    .map_err(|e| Error::Cache(format!("failed to parse datetime '{}': {}", s, e)))
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[tokio::test]
  async fn persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.db");

    {
      let cache = SqliteCache::open_at(&path).unwrap();
      cache.set("k", json!({"id": "abc"}), 60).await.unwrap();
    }

    let cache = SqliteCache::open_at(&path).unwrap();
    assert_eq!(
      cache.get("k").await.unwrap(),
      Some(json!({"id": "abc"}))
    );
  }

  #[tokio::test]
  async fn expired_entries_are_evicted() {
    let dir = tempfile::tempdir().unwrap();
    let cache = SqliteCache::open_at(&dir.path().join("cache.db")).unwrap();

    cache.set("k", json!(1), 0).await.unwrap();
    assert_eq!(cache.get("k").await.unwrap(), None);
  }

  #[tokio::test]
  async fn mset_and_flush() {
    let dir = tempfile::tempdir().unwrap();
    let cache = SqliteCache::open_at(&dir.path().join("cache.db")).unwrap();

    cache
      .mset(vec![
        ("a".to_string(), json!(1), 60),
        ("b".to_string(), json!(2), 60),
      ])
      .await
      .unwrap();
    assert_eq!(cache.get("a").await.unwrap(), Some(json!(1)));
    assert_eq!(cache.get("b").await.unwrap(), Some(json!(2)));

    cache.flush().await.unwrap();
    assert_eq!(cache.get("a").await.unwrap(), None);
    assert_eq!(cache.get("b").await.unwrap(), None);
  }

  #[tokio::test]
  async fn interleaved_transactional_and_plain_writes() {
    let dir = tempfile::tempdir().unwrap();
    let cache = SqliteCache::open_at(&dir.path().join("cache.db")).unwrap();

    // Back-to-back transactions and plain statements must never see a
    // transaction left open by a previous call
    cache
      .mset(vec![("a".to_string(), json!(1), 60)])
      .await
      .unwrap();
    cache.set("b", json!(2), 60).await.unwrap();
    cache
      .mset(vec![("c".to_string(), json!(3), 60)])
      .await
      .unwrap();

    assert_eq!(cache.get("a").await.unwrap(), Some(json!(1)));
    assert_eq!(cache.get("b").await.unwrap(), Some(json!(2)));
    assert_eq!(cache.get("c").await.unwrap(), Some(json!(3)));
  }

  #[tokio::test]
  async fn corrupt_row_surfaces_as_backend_error_not_miss() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.db");
    let cache = SqliteCache::open_at(&path).unwrap();

    // Write a row with a non-text expiry behind the cache's back
    let raw = Connection::open(&path).unwrap();
    raw
      .execute(
        "INSERT INTO cache_entries (cache_key, value, expires_at) VALUES ('k', x'7b7d', 123)",
        [],
      )
      .unwrap();

    let err = cache.get("k").await.unwrap_err();
    assert!(matches!(err, Error::Cache(_)));
  }
}
