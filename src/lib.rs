//! Cached async client for the Guild Wars 2 REST API.
//!
//! The API exposes thousands of addressable game-data resources that
//! rarely change. This crate resolves requests against an ordered chain
//! of cache tiers first and tops up the misses with chunked, concurrent
//! live requests, keeping request volume low without giving up stable
//! ordering or partial-failure tolerance.
//!
//! ```no_run
//! use gw2api::{Client, MemoryCache, ResourceId};
//! use std::sync::Arc;
//!
//! # async fn run() -> gw2api::Result<()> {
//! let client = Client::new()?
//!   .language("en")
//!   .cache_storage(vec![Arc::new(MemoryCache::new())]);
//!
//! // Flush stale data once per process start
//! client.flush_cache_if_game_updated().await?;
//!
//! let items = client
//!   .items()
//!   .many(&[ResourceId::Int(12), ResourceId::Int(30)])
//!   .await?;
//! # let _ = items;
//! # Ok(())
//! # }
//! ```

mod cache;
mod client;
mod endpoint;
pub mod endpoints;
mod error;
mod key;
mod requester;

pub use cache::{CacheBackend, CacheChain, MemoryCache, NoopCache, SqliteCache};
pub use client::Client;
pub use endpoint::{Endpoint, EndpointDescriptor, ResourceId, DEFAULT_BASE_URL};
pub use error::{Error, Result};
pub use requester::{ApiResponse, HttpRequester, RequestOptions, Requester};
