//! Cache tier that doesn't cache anything.

use async_trait::async_trait;
use serde_json::Value;

use super::backend::CacheBackend;
use crate::error::Result;

/// Backend used when caching is disabled - all operations are no-ops.
/// This is the default tier of a freshly constructed [`crate::Client`].
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCache;

#[async_trait]
impl CacheBackend for NoopCache {
  async fn get(&self, _key: &str) -> Result<Option<Value>> {
    Ok(None) // Always miss
  }

  async fn set(&self, _key: &str, _value: Value, _ttl_seconds: u64) -> Result<()> {
    Ok(()) // Discard
  }

  async fn flush(&self) -> Result<()> {
    Ok(())
  }
}
