//! Ordered fallback chain over cache tiers.

use futures::future::try_join_all;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use super::backend::CacheBackend;
use crate::error::Result;

/// An ordered list of cache tiers.
///
/// Reads walk the tiers front to back and stop at the first hit; batched
/// reads fall through to later tiers only for the keys that are still
/// missing. Writes go through to every tier unconditionally.
#[derive(Clone, Default)]
pub struct CacheChain {
  tiers: Vec<Arc<dyn CacheBackend>>,
}

impl CacheChain {
  pub fn new(tiers: Vec<Arc<dyn CacheBackend>>) -> Self {
    Self { tiers }
  }

  pub fn is_empty(&self) -> bool {
    self.tiers.is_empty()
  }

  /// Get one key out of the first tier that has it.
  pub async fn get(&self, key: &str) -> Result<Option<Value>> {
    for tier in &self.tiers {
      if let Some(value) = tier.get(key).await? {
        return Ok(Some(value));
      }
    }

    Ok(None)
  }

  /// Get many keys, merging hits across tiers positionally.
  ///
  /// The result is aligned with `keys`. Each tier after the first is
  /// only asked for the slots that are still empty; earlier-tier hits
  /// always win.
  pub async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<Value>>> {
    let mut values: Vec<Option<Value>> = vec![None; keys.len()];
    // Positions in `keys` that no tier has answered yet
    let mut missing: Vec<usize> = (0..keys.len()).collect();

    for tier in &self.tiers {
      if missing.is_empty() {
        break;
      }

      let missing_keys: Vec<String> = missing.iter().map(|&i| keys[i].clone()).collect();
      let tier_values = tier.mget(&missing_keys).await?;

      let mut still_missing = Vec::new();
      for (slot, value) in missing.iter().zip(tier_values) {
        match value {
          Some(value) => values[*slot] = Some(value),
          None => still_missing.push(*slot),
        }
      }
      missing = still_missing;
    }

    Ok(values)
  }

  /// Write one entry through to every tier.
  pub async fn set(&self, key: &str, value: &Value, ttl_seconds: u64) -> Result<()> {
    try_join_all(
      self
        .tiers
        .iter()
        .map(|tier| tier.set(key, value.clone(), ttl_seconds)),
    )
    .await?;

    Ok(())
  }

  /// Write many entries through to every tier.
  pub async fn set_many(&self, entries: &[(String, Value)], ttl_seconds: u64) -> Result<()> {
    try_join_all(self.tiers.iter().map(|tier| {
      let entries: Vec<(String, Value, u64)> = entries
        .iter()
        .map(|(key, value)| (key.clone(), value.clone(), ttl_seconds))
        .collect();
      tier.mset(entries)
    }))
    .await?;

    Ok(())
  }

  /// Flush every tier and wait for all of them.
  pub async fn flush_all(&self) -> Result<()> {
    debug!("flushing {} cache tier(s)", self.tiers.len());
    try_join_all(self.tiers.iter().map(|tier| tier.flush())).await?;

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::MemoryCache;
  use async_trait::async_trait;
  use serde_json::json;
  use std::sync::atomic::{AtomicUsize, Ordering};

  /// Tier wrapper that counts reads, for asserting short-circuits.
  struct Counting {
    inner: MemoryCache,
    gets: AtomicUsize,
  }

  impl Counting {
    fn new() -> Self {
      Self {
        inner: MemoryCache::new(),
        gets: AtomicUsize::new(0),
      }
    }
  }

  #[async_trait]
  impl CacheBackend for Counting {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
      self.gets.fetch_add(1, Ordering::SeqCst);
      self.inner.get(key).await
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Value>>> {
      self.gets.fetch_add(1, Ordering::SeqCst);
      self.inner.mget(keys).await
    }

    async fn set(&self, key: &str, value: Value, ttl_seconds: u64) -> Result<()> {
      self.inner.set(key, value, ttl_seconds).await
    }

    async fn flush(&self) -> Result<()> {
      self.inner.flush().await
    }
  }

  #[tokio::test]
  async fn get_short_circuits_on_first_tier_hit() {
    let tier0 = Arc::new(Counting::new());
    let tier1 = Arc::new(Counting::new());
    tier0.inner.set("k", json!(1), 60).await.unwrap();
    tier1.inner.set("k", json!(2), 60).await.unwrap();

    let chain = CacheChain::new(vec![tier0.clone(), tier1.clone()]);

    assert_eq!(chain.get("k").await.unwrap(), Some(json!(1)));
    assert_eq!(tier0.gets.load(Ordering::SeqCst), 1);
    assert_eq!(tier1.gets.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn get_falls_through_to_later_tiers() {
    let tier0 = Arc::new(MemoryCache::new());
    let tier1 = Arc::new(MemoryCache::new());
    tier1.set("k", json!("deep"), 60).await.unwrap();

    let chain = CacheChain::new(vec![tier0, tier1]);
    assert_eq!(chain.get("k").await.unwrap(), Some(json!("deep")));
    assert_eq!(chain.get("missing").await.unwrap(), None);
  }

  #[tokio::test]
  async fn get_many_merges_partial_hits_positionally() {
    let tier0 = Arc::new(MemoryCache::new());
    let tier1 = Arc::new(MemoryCache::new());
    tier0.set("a", json!("a0"), 60).await.unwrap();
    tier1.set("a", json!("a1"), 60).await.unwrap();
    tier1.set("b", json!("b1"), 60).await.unwrap();

    let chain = CacheChain::new(vec![tier0, tier1]);
    let keys = vec!["a".to_string(), "b".to_string(), "c".to_string()];
    let values = chain.get_many(&keys).await.unwrap();

    // Earlier-tier hit wins for "a", tier 1 fills "b", "c" stays absent
    assert_eq!(
      values,
      vec![Some(json!("a0")), Some(json!("b1")), None]
    );
  }

  #[tokio::test]
  async fn get_many_stops_once_all_slots_filled() {
    let tier0 = Arc::new(Counting::new());
    let tier1 = Arc::new(Counting::new());
    tier0.inner.set("a", json!(1), 60).await.unwrap();

    let chain = CacheChain::new(vec![tier0, tier1.clone()]);
    chain.get_many(&["a".to_string()]).await.unwrap();

    assert_eq!(tier1.gets.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn writes_fan_out_to_every_tier() {
    let tier0 = Arc::new(MemoryCache::new());
    let tier1 = Arc::new(MemoryCache::new());
    let chain = CacheChain::new(vec![tier0.clone(), tier1.clone()]);

    chain.set("k", &json!(7), 60).await.unwrap();
    assert_eq!(tier0.get("k").await.unwrap(), Some(json!(7)));
    assert_eq!(tier1.get("k").await.unwrap(), Some(json!(7)));

    chain
      .set_many(&[("m".to_string(), json!(8))], 60)
      .await
      .unwrap();
    assert_eq!(tier0.get("m").await.unwrap(), Some(json!(8)));
    assert_eq!(tier1.get("m").await.unwrap(), Some(json!(8)));
  }

  #[tokio::test]
  async fn flush_all_clears_every_tier() {
    let tier0 = Arc::new(MemoryCache::new());
    let tier1 = Arc::new(MemoryCache::new());
    tier0.set("a", json!(1), 60).await.unwrap();
    tier1.set("b", json!(2), 60).await.unwrap();

    let chain = CacheChain::new(vec![tier0.clone(), tier1.clone()]);
    chain.flush_all().await.unwrap();

    assert_eq!(tier0.get("a").await.unwrap(), None);
    assert_eq!(tier1.get("b").await.unwrap(), None);
  }
}
