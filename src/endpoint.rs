//! Generic resolution engine for one API endpoint.
//!
//! An [`Endpoint`] pairs a pure-configuration [`EndpointDescriptor`]
//! with the call context it inherited from the [`crate::Client`]
//! (locale, API key, cache tiers, transport). All endpoint variants run
//! through the same six operations; the descriptor flags decide which
//! of them are available and how requests are keyed, chunked and
//! localized.

use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use url::Url;

use crate::cache::CacheChain;
use crate::error::{Error, Result};
use crate::key;
use crate::requester::{ApiResponse, RequestOptions, Requester};

pub const DEFAULT_BASE_URL: &str = "https://api.guildwars2.com";
pub const DEFAULT_MAX_PAGE_SIZE: usize = 200;

/// Pure configuration for one API resource. No logic lives here; the
/// ~40 resource variants are all instances of this structure.
#[derive(Debug, Clone, Copy)]
pub struct EndpointDescriptor {
  pub path: &'static str,
  /// Entities are addressable by id and support `?id=` / `?ids=`.
  pub is_bulk: bool,
  /// Supports `?page=` / `?page_size=` retrieval.
  pub is_paginated: bool,
  /// Bulk endpoint accepts the `?ids=all` wildcard.
  pub supports_bulk_all: bool,
  pub is_localized: bool,
  pub is_authenticated: bool,
  pub is_optionally_authenticated: bool,
  /// Send transport-level credentials (cookies) with requests.
  pub uses_credentialed_transport: bool,
  pub max_page_size: usize,
  /// Cache TTL in seconds. `None` means never cache, always live.
  pub cache_time: Option<u64>,
}

impl Default for EndpointDescriptor {
  fn default() -> Self {
    Self {
      path: "",
      is_bulk: false,
      is_paginated: false,
      supports_bulk_all: true,
      is_localized: false,
      is_authenticated: false,
      is_optionally_authenticated: false,
      uses_credentialed_transport: false,
      max_page_size: DEFAULT_MAX_PAGE_SIZE,
      cache_time: None,
    }
  }
}

impl EndpointDescriptor {
  /// Whether requests must carry an API key: mandatory authentication,
  /// or optional authentication with a key supplied.
  pub fn requires_api_key(&self, api_key: Option<&str>) -> bool {
    self.is_authenticated && (!self.is_optionally_authenticated || api_key.is_some())
  }
}

/// An entity id. The upstream API uses integer ids for most resources
/// and string ids for a few; both must round-trip exactly through the
/// cache and the `?ids=` query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceId {
  Int(i64),
  Str(String),
}

impl ResourceId {
  /// Read the `id` field of an entity.
  pub fn from_entity(entity: &Value) -> Option<Self> {
    match entity.get("id")? {
      Value::Number(n) => n.as_i64().map(ResourceId::Int),
      Value::String(s) => Some(ResourceId::Str(s.clone())),
      _ => None,
    }
  }
}

impl fmt::Display for ResourceId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ResourceId::Int(n) => write!(f, "{}", n),
      ResourceId::Str(s) => f.write_str(s),
    }
  }
}

impl From<i64> for ResourceId {
  fn from(n: i64) -> Self {
    ResourceId::Int(n)
  }
}

impl From<&str> for ResourceId {
  fn from(s: &str) -> Self {
    ResourceId::Str(s.to_string())
  }
}

impl From<String> for ResourceId {
  fn from(s: String) -> Self {
    ResourceId::Str(s)
  }
}

/// One configured endpoint, carrying its own copy of the call context.
///
/// The context is snapshotted from the client at construction;
/// overriding it via [`Endpoint::language`], [`Endpoint::authenticate`]
/// or [`Endpoint::live`] never affects the client or sibling endpoints.
#[derive(Clone)]
pub struct Endpoint {
  descriptor: EndpointDescriptor,
  base_url: String,
  lang: String,
  api_key: Option<String>,
  skip_cache: bool,
  caches: CacheChain,
  requester: Arc<dyn Requester>,
}

impl Endpoint {
  pub(crate) fn new(
    descriptor: EndpointDescriptor,
    base_url: String,
    lang: String,
    api_key: Option<String>,
    caches: CacheChain,
    requester: Arc<dyn Requester>,
  ) -> Self {
    Self {
      descriptor,
      base_url,
      lang,
      api_key,
      skip_cache: false,
      caches,
      requester,
    }
  }

  pub fn descriptor(&self) -> &EndpointDescriptor {
    &self.descriptor
  }

  /// The locale this endpoint will resolve with.
  pub fn lang(&self) -> &str {
    &self.lang
  }

  /// Override the language for this call chain.
  pub fn language(mut self, lang: &str) -> Self {
    debug!(lang, "set the language");
    self.lang = lang.to_string();
    self
  }

  /// Override the API key for this call chain.
  pub fn authenticate(mut self, api_key: &str) -> Self {
    debug!("set the api key");
    self.api_key = Some(api_key.to_string());
    self
  }

  /// Skip cache reads and resolve live. Results are still written back
  /// to the cache tiers.
  pub fn live(mut self) -> Self {
    debug!(path = self.descriptor.path, "skipping cache");
    self.skip_cache = true;
    self
  }

  /// Get the complete ordered list of valid ids for this endpoint.
  pub async fn ids(&self) -> Result<Vec<Value>> {
    debug!(path = self.descriptor.path, "ids() called");

    if !self.descriptor.is_bulk {
      return Err(Error::UnsupportedOperation {
        operation: "ids",
        required: "bulk expanding",
      });
    }

    let content = self
      .resolve_single(Some("ids"), self.descriptor.path)
      .await?;
    Ok(serde_json::from_value(content)?)
  }

  /// Get a single entry. Bulk endpoints require an id; other endpoints
  /// resolve their bare base URL and ignore the id in the query.
  pub async fn get(&self, id: Option<ResourceId>) -> Result<Value> {
    debug!(path = self.descriptor.path, "get() called");

    if id.is_none() && self.descriptor.is_bulk {
      return Err(Error::InvalidArgument(
        "\"get\" requires an id for bulk expanding endpoints".to_string(),
      ));
    }

    let suffix = id.as_ref().map(ToString::to_string);
    let live_path = match &id {
      Some(id) if self.descriptor.is_bulk => {
        format!("{}?id={}", self.descriptor.path, id)
      }
      _ => self.descriptor.path.to_string(),
    };

    self.resolve_single(suffix.as_deref(), &live_path).await
  }

  /// Get a single entry through a literal URL suffix appended to the
  /// endpoint path (e.g. a character name path segment).
  pub async fn get_url(&self, suffix: &str) -> Result<Value> {
    debug!(path = self.descriptor.path, suffix, "get_url() called");

    let live_path = format!("{}{}", self.descriptor.path, suffix);
    self.resolve_single(Some(suffix), &live_path).await
  }

  /// Get multiple entries by id.
  ///
  /// The input is deduplicated first; the result holds exactly the
  /// entities of the deduplicated id list, in that order, merged from
  /// cache hits and live fetches.
  pub async fn many(&self, ids: &[ResourceId]) -> Result<Vec<Value>> {
    debug!(
      path = self.descriptor.path,
      count = ids.len(),
      "many() called"
    );

    if !self.descriptor.is_bulk {
      return Err(Error::UnsupportedOperation {
        operation: "many",
        required: "bulk expanding",
      });
    }

    // Exit out early if we don't request any ids
    if ids.is_empty() {
      return Ok(Vec::new());
    }

    // Always only work on unique ids, since that's how the API works
    let ids = dedup(ids);

    let Some(ttl) = self.descriptor.cache_time else {
      return self.many_live(&ids, false).await;
    };

    let keys: Vec<String> = ids.iter().map(|id| self.key_for(&id.to_string())).collect();
    let slots = if self.skip_cache {
      vec![None; ids.len()]
    } else {
      self.caches.get_many(&keys).await?
    };

    // Slots are aligned with the deduplicated ids, so a full hit is
    // already in caller order
    let cached: Vec<Value> = slots.into_iter().flatten().collect();
    if cached.len() == ids.len() {
      debug!(path = self.descriptor.path, "many() resolving fully from cache");
      return Ok(cached);
    }

    debug!(
      path = self.descriptor.path,
      hits = cached.len(),
      "many() resolving partially from cache"
    );

    let cached_ids: HashSet<ResourceId> =
      cached.iter().filter_map(ResourceId::from_entity).collect();
    let missing: Vec<ResourceId> = ids
      .iter()
      .filter(|id| !cached_ids.contains(id))
      .cloned()
      .collect();

    let partial = !cached.is_empty();
    let fetched = self.many_live(&missing, partial).await?;

    let entries: Vec<(String, Value)> = fetched
      .iter()
      .filter_map(|entity| {
        ResourceId::from_entity(entity).map(|id| (self.key_for(&id.to_string()), entity.clone()))
      })
      .collect();
    self.caches.set_many(&entries, ttl).await?;

    // Merge the new content with the cached content and restore the
    // caller's id order
    let mut content = fetched;
    content.extend(cached);
    Ok(sort_by_id_list(content, &ids))
  }

  /// Get one page with the endpoint's maximum page size.
  pub async fn page(&self, page: usize) -> Result<Vec<Value>> {
    self.page_sized(page, self.descriptor.max_page_size).await
  }

  /// Get one page of `size` entries.
  pub async fn page_sized(&self, page: usize, size: usize) -> Result<Vec<Value>> {
    debug!(path = self.descriptor.path, page, size, "page() called");

    if !self.descriptor.is_bulk && !self.descriptor.is_paginated {
      return Err(Error::UnsupportedOperation {
        operation: "page",
        required: "bulk expanding or paginated",
      });
    }

    if size == 0 || size > self.descriptor.max_page_size {
      return Err(Error::InvalidArgument(format!(
        "\"size\" has to be between 0 and {}, was {}",
        self.descriptor.max_page_size, size
      )));
    }

    let Some(ttl) = self.descriptor.cache_time else {
      return self.page_live(page, size).await;
    };

    let key = self.key_for(&format!("page-{}/{}", page, size));
    if !self.skip_cache {
      if let Some(cached) = self.caches.get(&key).await? {
        debug!(path = self.descriptor.path, "page() resolving from cache");
        return Ok(serde_json::from_value(cached)?);
      }
    }

    let content = self.page_live(page, size).await?;
    self
      .write_back_list(key, &content, ttl)
      .await?;
    Ok(content)
  }

  /// Get all entries.
  pub async fn all(&self) -> Result<Vec<Value>> {
    debug!(path = self.descriptor.path, "all() called");

    if !self.descriptor.is_bulk && !self.descriptor.is_paginated {
      return Err(Error::UnsupportedOperation {
        operation: "all",
        required: "bulk expanding or paginated",
      });
    }

    let Some(ttl) = self.descriptor.cache_time else {
      return self.all_live().await;
    };

    let key = self.key_for("all");
    if !self.skip_cache {
      if let Some(cached) = self.caches.get(&key).await? {
        debug!(path = self.descriptor.path, "all() resolving from cache");
        return Ok(serde_json::from_value(cached)?);
      }
    }

    let content = self.all_live().await?;
    self
      .write_back_list(key, &content, ttl)
      .await?;
    Ok(content)
  }

  // Shared cache-or-live path for single-value operations.
  async fn resolve_single(&self, suffix: Option<&str>, live_path: &str) -> Result<Value> {
    let Some(ttl) = self.descriptor.cache_time else {
      return Ok(self.request_single(live_path).await?.body);
    };

    let key = self.key_for_opt(suffix);
    if !self.skip_cache {
      if let Some(cached) = self.caches.get(&key).await? {
        debug!(path = self.descriptor.path, "resolving from cache");
        return Ok(cached);
      }
    }

    let content = self.request_single(live_path).await?.body;
    self.caches.set(&key, &content, ttl).await?;
    Ok(content)
  }

  // Store a list result, plus each entity under its own id key for
  // bulk endpoints (a page/all fetch opportunistically warms the
  // per-id cache).
  async fn write_back_list(&self, key: String, content: &[Value], ttl: u64) -> Result<()> {
    let mut entries = vec![(key, Value::Array(content.to_vec()))];

    if self.descriptor.is_bulk {
      entries.extend(content.iter().filter_map(|entity| {
        ResourceId::from_entity(entity).map(|id| (self.key_for(&id.to_string()), entity.clone()))
      }));
    }

    self.caches.set_many(&entries, ttl).await
  }

  // Live bulk fetch, chunked to the maximum page size and issued
  // concurrently. A partial top-up tolerates a 404: when every
  // not-cached id is invalid the API answers 404, mirroring its
  // behavior of silently omitting invalid ids from mixed requests.
  async fn many_live(&self, ids: &[ResourceId], partial: bool) -> Result<Vec<Value>> {
    debug!(
      path = self.descriptor.path,
      count = ids.len(),
      "many() requesting from api"
    );

    let urls: Vec<String> = ids
      .chunks(self.descriptor.max_page_size)
      .map(|group| format!("{}?ids={}", self.descriptor.path, join_ids(group)))
      .collect();

    match self.request_many(&urls).await {
      Ok(responses) => {
        let mut content = Vec::new();
        for response in responses {
          content.extend(serde_json::from_value::<Vec<Value>>(response.body)?);
        }
        Ok(content)
      }
      Err(err) if partial && err.status() == Some(404) => Ok(Vec::new()),
      Err(err) => Err(err),
    }
  }

  async fn page_live(&self, page: usize, size: usize) -> Result<Vec<Value>> {
    debug!(path = self.descriptor.path, "page() requesting from api");

    let response = self
      .request_single(&format!(
        "{}?page={}&page_size={}",
        self.descriptor.path, page, size
      ))
      .await?;
    Ok(serde_json::from_value(response.body)?)
  }

  async fn all_live(&self) -> Result<Vec<Value>> {
    debug!(path = self.descriptor.path, "all() requesting from api");

    // Use bulk expansion if the endpoint supports the "all" keyword
    if self.descriptor.is_bulk && self.descriptor.supports_bulk_all {
      let response = self
        .request_single(&format!("{}?ids=all", self.descriptor.path))
        .await?;
      return Ok(serde_json::from_value(response.body)?);
    }

    // Get everything via all pages instead. The first page tells us
    // the total entry count through the X-Result-Total header.
    let size = self.descriptor.max_page_size;
    let first = self
      .request_single(&format!("{}?page=0&page_size={}", self.descriptor.path, size))
      .await?;
    let total = first.result_total.unwrap_or(0);
    let mut content: Vec<Value> = serde_json::from_value(first.body)?;

    // Return early if the first page already includes all entries
    if total <= size {
      return Ok(content);
    }

    // Request all missing pages in parallel; pages concatenate in
    // ascending index order, so no id-based re-sort is needed
    let page_count = total.div_ceil(size);
    let urls: Vec<String> = (1..page_count)
      .map(|page| format!("{}?page={}&page_size={}", self.descriptor.path, page, size))
      .collect();

    for response in self.request_many(&urls).await? {
      content.extend(serde_json::from_value::<Vec<Value>>(response.body)?);
    }
    Ok(content)
  }

  async fn request_single(&self, path: &str) -> Result<ApiResponse> {
    let url = self.build_url(path)?;
    debug!(%url, "single request");
    self.requester.single(&url, self.request_options()).await
  }

  async fn request_many(&self, paths: &[String]) -> Result<Vec<ApiResponse>> {
    let urls: Vec<String> = paths
      .iter()
      .map(|path| self.build_url(path))
      .collect::<Result<_>>()?;
    debug!(urls = %urls.join(", "), "multiple requests");
    self.requester.many(&urls, self.request_options()).await
  }

  fn request_options(&self) -> RequestOptions {
    RequestOptions {
      include_credentials: self.descriptor.uses_credentialed_transport,
    }
  }

  /// Append the access token for endpoints that require a key and the
  /// language for localized endpoints. Comma-joined id lists are
  /// significant to the upstream API and must stay literal.
  fn build_url(&self, path: &str) -> Result<String> {
    let mut url = Url::parse(&format!("{}{}", self.base_url, path))
      .map_err(|e| Error::InvalidArgument(format!("invalid url {}{}: {}", self.base_url, path, e)))?;

    if self.descriptor.requires_api_key(self.api_key.as_deref()) {
      url
        .query_pairs_mut()
        .append_pair("access_token", self.api_key.as_deref().unwrap_or(""));
    }

    if self.descriptor.is_localized {
      url.query_pairs_mut().append_pair("lang", &self.lang);
    }

    Ok(url.to_string().replace("%2C", ","))
  }

  fn key_for(&self, suffix: &str) -> String {
    self.key_for_opt(Some(suffix))
  }

  fn key_for_opt(&self, suffix: Option<&str>) -> String {
    key::cache_key(
      &self.descriptor,
      &self.base_url,
      suffix,
      &self.lang,
      self.api_key.as_deref(),
    )
  }

  /// Read one raw cache key out of the tier chain. Used by the
  /// build-version guard for its marker.
  pub(crate) async fn cache_get_raw(&self, key: &str) -> Result<Option<Value>> {
    self.caches.get(key).await
  }

  /// Write one raw cache key through every tier.
  pub(crate) async fn cache_set_raw(&self, key: &str, value: &Value) -> Result<()> {
    let ttl = self.descriptor.cache_time.unwrap_or(0);
    self.caches.set(key, value, ttl).await
  }
}

/// Order-preserving deduplication.
fn dedup(ids: &[ResourceId]) -> Vec<ResourceId> {
  let mut seen = HashSet::new();
  ids
    .iter()
    .filter(|id| seen.insert((*id).clone()))
    .cloned()
    .collect()
}

fn join_ids(ids: &[ResourceId]) -> String {
  ids
    .iter()
    .map(ToString::to_string)
    .collect::<Vec<_>>()
    .join(",")
}

/// Guarantee the element order of bulk results: one id-to-position
/// index, then a sort keyed through it. Entities without a known id
/// sink to the end.
fn sort_by_id_list(mut entries: Vec<Value>, ids: &[ResourceId]) -> Vec<Value> {
  let index: HashMap<&ResourceId, usize> = ids.iter().enumerate().map(|(i, id)| (id, i)).collect();

  entries.sort_by_key(|entry| {
    ResourceId::from_entity(entry)
      .and_then(|id| index.get(&id).copied())
      .unwrap_or(usize::MAX)
  });
  entries
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn dedup_preserves_first_occurrence_order() {
    let ids: Vec<ResourceId> = vec![5.into(), 3.into(), 1.into(), 3.into(), 5.into()];
    assert_eq!(
      dedup(&ids),
      vec![ResourceId::Int(5), ResourceId::Int(3), ResourceId::Int(1)]
    );
  }

  #[test]
  fn join_ids_is_comma_separated() {
    let ids: Vec<ResourceId> = vec![1.into(), "uuid-2".into(), 3.into()];
    assert_eq!(join_ids(&ids), "1,uuid-2,3");
  }

  #[test]
  fn sort_by_id_list_restores_caller_order() {
    let entries = vec![json!({"id": 1}), json!({"id": 5}), json!({"id": 3})];
    let ids: Vec<ResourceId> = vec![5.into(), 3.into(), 1.into()];
    assert_eq!(
      sort_by_id_list(entries, &ids),
      vec![json!({"id": 5}), json!({"id": 3}), json!({"id": 1})]
    );
  }

  #[test]
  fn sort_by_id_list_handles_string_ids() {
    let entries = vec![json!({"id": "b"}), json!({"id": "a"})];
    let ids: Vec<ResourceId> = vec!["a".into(), "b".into()];
    assert_eq!(
      sort_by_id_list(entries, &ids),
      vec![json!({"id": "a"}), json!({"id": "b"})]
    );
  }

  #[test]
  fn resource_id_round_trips_entity_ids() {
    assert_eq!(
      ResourceId::from_entity(&json!({"id": 42})),
      Some(ResourceId::Int(42))
    );
    assert_eq!(
      ResourceId::from_entity(&json!({"id": "S-1"})),
      Some(ResourceId::Str("S-1".to_string()))
    );
    assert_eq!(ResourceId::from_entity(&json!({"name": "x"})), None);
  }

  #[test]
  fn requires_api_key_matrix() {
    let mandatory = EndpointDescriptor {
      is_authenticated: true,
      ..EndpointDescriptor::default()
    };
    assert!(mandatory.requires_api_key(None));
    assert!(mandatory.requires_api_key(Some("k")));

    let optional = EndpointDescriptor {
      is_authenticated: true,
      is_optionally_authenticated: true,
      ..EndpointDescriptor::default()
    };
    assert!(!optional.requires_api_key(None));
    assert!(optional.requires_api_key(Some("k")));

    let open = EndpointDescriptor::default();
    assert!(!open.requires_api_key(Some("k")));
  }
}
