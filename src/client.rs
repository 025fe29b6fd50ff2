//! Client entry point: configuration context, endpoint accessors and
//! the build-version cache guard.

use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::cache::{CacheBackend, CacheChain, NoopCache};
use crate::endpoint::{Endpoint, EndpointDescriptor, DEFAULT_BASE_URL};
use crate::endpoints;
use crate::error::Result;
use crate::requester::{HttpRequester, Requester};

/// Cache key of the build-version marker.
const CACHE_BUILD_ID_KEY: &str = "cacheBuildId";

/// Client for the API.
///
/// Holds the active locale, API key, cache tiers and transport. Every
/// endpoint accessor snapshots this context into the returned
/// [`Endpoint`], so later changes to the client never affect endpoints
/// that were already handed out.
#[derive(Clone)]
pub struct Client {
  base_url: String,
  lang: String,
  api_key: Option<String>,
  caches: Vec<Arc<dyn CacheBackend>>,
  requester: Arc<dyn Requester>,
}

impl Client {
  /// Create a client with the reqwest transport and no caching.
  pub fn new() -> Result<Self> {
    Ok(Self::with_requester(Arc::new(HttpRequester::new()?)))
  }

  /// Create a client over a custom transport.
  pub fn with_requester(requester: Arc<dyn Requester>) -> Self {
    Self {
      base_url: DEFAULT_BASE_URL.to_string(),
      lang: "en".to_string(),
      api_key: None,
      caches: vec![Arc::new(NoopCache)],
      requester,
    }
  }

  /// Set the language for locale-aware endpoints.
  pub fn language(mut self, lang: &str) -> Self {
    debug!(lang, "set the language");
    self.lang = lang.to_string();
    self
  }

  /// Set the API key for authenticated endpoints.
  pub fn authenticate(mut self, api_key: &str) -> Self {
    debug!("set the api key");
    self.api_key = Some(api_key.to_string());
    self
  }

  /// Set the cache tiers, ordered fastest first.
  pub fn cache_storage(mut self, caches: Vec<Arc<dyn CacheBackend>>) -> Self {
    debug!(tiers = caches.len(), "updated the cache storage");
    self.caches = caches;
    self
  }

  /// Override the API base URL.
  pub fn base_url(mut self, base_url: &str) -> Self {
    self.base_url = base_url.trim_end_matches('/').to_string();
    self
  }

  /// Build an endpoint for an arbitrary descriptor. The engine works
  /// unmodified for any combination of the descriptor flags.
  pub fn endpoint(&self, descriptor: EndpointDescriptor) -> Endpoint {
    Endpoint::new(
      descriptor,
      self.base_url.clone(),
      self.lang.clone(),
      self.api_key.clone(),
      CacheChain::new(self.caches.clone()),
      Arc::clone(&self.requester),
    )
  }

  /// Make sure we get new content if the game updates: compare the
  /// cached build id against the live one and flush every cache tier
  /// when the live build is newer. The live id is persisted as the new
  /// marker exactly once per check, after any flush. An absent marker
  /// is seeded without flushing.
  pub async fn flush_cache_if_game_updated(&self) -> Result<()> {
    let build = self.build();
    let live_build = build.clone().live();

    let (cached, live) = tokio::join!(
      build.cache_get_raw(CACHE_BUILD_ID_KEY),
      live_build.get(None)
    );

    #[derive(Deserialize)]
    struct BuildResponse {
      id: i64,
    }

    let cached_build_id = cached?.and_then(|marker| marker.as_i64());
    let live_build_id = serde_json::from_value::<BuildResponse>(live?)?.id;

    // Only flush if the cached build id is set (as a safety measure)
    // and older than the current one
    if let Some(cached_build_id) = cached_build_id {
      if cached_build_id < live_build_id {
        debug!(cached_build_id, live_build_id, "flushing the cache because of a new build");
        CacheChain::new(self.caches.clone()).flush_all().await?;
      }
    }

    build
      .cache_set_raw(CACHE_BUILD_ID_KEY, &Value::from(live_build_id))
      .await
  }

  // All the different API endpoints

  pub fn account(&self) -> Endpoint {
    self.endpoint(endpoints::account())
  }

  pub fn achievements(&self) -> Endpoint {
    self.endpoint(endpoints::achievements())
  }

  pub fn build(&self) -> Endpoint {
    self.endpoint(endpoints::build())
  }

  pub fn currencies(&self) -> Endpoint {
    self.endpoint(endpoints::currencies())
  }

  pub fn files(&self) -> Endpoint {
    self.endpoint(endpoints::files())
  }

  pub fn gliders(&self) -> Endpoint {
    self.endpoint(endpoints::gliders())
  }

  pub fn items(&self) -> Endpoint {
    self.endpoint(endpoints::items())
  }

  pub fn itemstats(&self) -> Endpoint {
    self.endpoint(endpoints::itemstats())
  }

  pub fn maps(&self) -> Endpoint {
    self.endpoint(endpoints::maps())
  }

  pub fn materials(&self) -> Endpoint {
    self.endpoint(endpoints::materials())
  }

  pub fn quaggans(&self) -> Endpoint {
    self.endpoint(endpoints::quaggans())
  }

  pub fn specializations(&self) -> Endpoint {
    self.endpoint(endpoints::specializations())
  }

  pub fn titles(&self) -> Endpoint {
    self.endpoint(endpoints::titles())
  }

  pub fn tokeninfo(&self) -> Endpoint {
    self.endpoint(endpoints::tokeninfo())
  }

  pub fn worlds(&self) -> Endpoint {
    self.endpoint(endpoints::worlds())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::Error;
  use crate::requester::{ApiResponse, RequestOptions};
  use async_trait::async_trait;

  struct NullRequester;

  #[async_trait]
  impl Requester for NullRequester {
    async fn single(&self, url: &str, _options: RequestOptions) -> Result<ApiResponse> {
      Err(Error::Transport(format!("unexpected request to {}", url)))
    }
  }

  fn client() -> Client {
    Client::with_requester(Arc::new(NullRequester))
  }

  #[test]
  fn endpoint_snapshots_client_context() {
    let client = client().language("de").authenticate("key-one");
    let endpoint = client.items().language("fr");
    assert_eq!(endpoint.lang(), "fr");

    // Re-configuring the client must not leak into existing endpoints
    let client = client.language("es");
    assert_eq!(client.items().lang(), "es");
    assert_eq!(endpoint.lang(), "fr");
  }

  #[test]
  fn endpoint_accessors_carry_catalog_paths() {
    let client = client();
    assert_eq!(client.build().descriptor().path, "/v2/build");
    assert_eq!(client.items().descriptor().path, "/v2/items");
    assert_eq!(client.account().descriptor().path, "/v2/account");
    assert!(client.account().descriptor().is_authenticated);
    assert!(client.items().descriptor().is_bulk);
  }
}
