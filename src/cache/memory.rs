//! In-memory cache tier with per-entry expiry.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

use super::backend::CacheBackend;
use crate::error::{Error, Result};

struct Entry {
  value: Value,
  expires_at: DateTime<Utc>,
}

/// Process-local cache tier backed by a hash map.
///
/// Expired entries are dropped lazily on read; there is no background
/// sweeper.
#[derive(Default)]
pub struct MemoryCache {
  entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryCache {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Entry>>> {
    self
      .entries
      .lock()
      .map_err(|e| Error::Cache(format!("lock poisoned: {}", e)))
  }
}

#[async_trait]
impl CacheBackend for MemoryCache {
  async fn get(&self, key: &str) -> Result<Option<Value>> {
    let mut entries = self.lock()?;

    match entries.get(key) {
      Some(entry) if entry.expires_at > Utc::now() => Ok(Some(entry.value.clone())),
      Some(_) => {
        entries.remove(key);
        Ok(None)
      }
      None => Ok(None),
    }
  }

  async fn set(&self, key: &str, value: Value, ttl_seconds: u64) -> Result<()> {
    let entry = Entry {
      value,
      expires_at: Utc::now() + Duration::seconds(ttl_seconds as i64),
    };
    self.lock()?.insert(key.to_string(), entry);
    Ok(())
  }

  async fn flush(&self) -> Result<()> {
    self.lock()?.clear();
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[tokio::test]
  async fn set_then_get_returns_clone() {
    let cache = MemoryCache::new();
    cache.set("k", json!({"id": 1}), 60).await.unwrap();

    let mut first = cache.get("k").await.unwrap().unwrap();
    first["id"] = json!(999);

    // Mutating the returned value must not touch the cached one
    assert_eq!(cache.get("k").await.unwrap().unwrap(), json!({"id": 1}));
  }

  #[tokio::test]
  async fn expired_entries_miss() {
    let cache = MemoryCache::new();
    cache.set("k", json!(1), 0).await.unwrap();
    assert_eq!(cache.get("k").await.unwrap(), None);
  }

  #[tokio::test]
  async fn flush_clears_everything() {
    let cache = MemoryCache::new();
    cache.set("a", json!(1), 60).await.unwrap();
    cache.set("b", json!(2), 60).await.unwrap();
    cache.flush().await.unwrap();
    assert_eq!(cache.get("a").await.unwrap(), None);
    assert_eq!(cache.get("b").await.unwrap(), None);
  }

  #[tokio::test]
  async fn mget_aligns_with_keys() {
    let cache = MemoryCache::new();
    cache.set("a", json!(1), 60).await.unwrap();
    cache.set("c", json!(3), 60).await.unwrap();

    let keys = vec!["a".to_string(), "b".to_string(), "c".to_string()];
    let values = cache.mget(&keys).await.unwrap();
    assert_eq!(values, vec![Some(json!(1)), None, Some(json!(3))]);
  }
}
