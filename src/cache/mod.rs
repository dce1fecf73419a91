//! Catalog caching
//!
//! [`CacheStore`] holds the one in-memory catalog snapshot with a TTL freshness
//! check. [`DiskCache`] optionally keeps the last successful fetch on disk so a
//! new process can serve stale data before its first fetch succeeds.

mod disk;
mod store;

pub use disk::{DiskCache, DiskCacheError, StoredCatalog};
pub use store::{CacheStore, CatalogSnapshot};
