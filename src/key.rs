//! Deterministic cache key derivation.
//!
//! Two semantically identical requests must always map to the same key;
//! requests differing in locale or credential (for endpoints sensitive to
//! either) must never collide. Credential material never appears in the
//! clear, only a fixed-width hash of it.

use sha2::{Digest, Sha256};

use crate::endpoint::EndpointDescriptor;

/// Derive the cache key for one request against `descriptor`.
///
/// `suffix` is the per-request discriminator: an item id, `"ids"`,
/// `"all"`, or `"page-{page}/{size}"`. The base identity (base URL plus
/// endpoint path) is always included.
pub fn cache_key(
  descriptor: &EndpointDescriptor,
  base_url: &str,
  suffix: Option<&str>,
  lang: &str,
  api_key: Option<&str>,
) -> String {
  let mut key = format!("{}{}", base_url, descriptor.path);

  if let Some(suffix) = suffix {
    key.push(':');
    key.push_str(suffix);
  }

  if descriptor.is_localized {
    key.push(':');
    key.push_str(lang);
  }

  if descriptor.requires_api_key(api_key) {
    key.push(':');
    key.push_str(&credential_hash(api_key.unwrap_or("")));
  }

  key
}

/// SHA256 hash of the credential, hex encoded for a stable fixed-width
/// key component.
pub fn credential_hash(api_key: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(api_key.as_bytes());
  hex::encode(hasher.finalize())
}
