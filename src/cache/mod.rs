//! Tiered caching for API responses.
//!
//! A [`crate::Client`] carries an ordered list of cache tiers. Reads
//! fall through the tiers until the first hit, writes go through to
//! every tier, and a whole-chain flush backs the build-version guard.

mod backend;
mod chain;
mod memory;
mod noop;
mod sqlite;

pub use backend::CacheBackend;
pub use chain::CacheChain;
pub use memory::MemoryCache;
pub use noop::NoopCache;
pub use sqlite::SqliteCache;
