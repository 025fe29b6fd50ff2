//! The contract every cache tier must satisfy.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// One cache tier in an ordered fallback chain.
///
/// Values are opaque JSON with a time-to-live in seconds. A missing key
/// is a normal `Ok(None)` return, never an error. Implementations must
/// hand out owned values so caller mutation cannot corrupt the tier.
#[async_trait]
pub trait CacheBackend: Send + Sync {
  async fn get(&self, key: &str) -> Result<Option<Value>>;

  /// Batched lookup. The result is aligned with `keys`; missing slots
  /// are `None`.
  async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Value>>> {
    let mut values = Vec::with_capacity(keys.len());
    for key in keys {
      values.push(self.get(key).await?);
    }
    Ok(values)
  }

  async fn set(&self, key: &str, value: Value, ttl_seconds: u64) -> Result<()>;

  /// Batched write of `(key, value, ttl_seconds)` entries.
  async fn mset(&self, entries: Vec<(String, Value, u64)>) -> Result<()> {
    for (key, value, ttl) in entries {
      self.set(&key, value, ttl).await?;
    }
    Ok(())
  }

  /// Drop every entry in this tier.
  async fn flush(&self) -> Result<()>;
}
