//! Storage module for the cached sitemap
//!
//! This module holds the single cached payload between updates, including:
//! - The `SitemapCache` trait and its error types
//! - A SQLite backend that survives restarts
//! - An in-memory backend for tests and one-off runs
//! - TTL expiry checked on every read

mod memory;
mod schema;
mod sqlite;
mod traits;

pub use memory::MemoryCache;
pub use sqlite::SqliteCache;
pub use traits::{CacheError, CacheResult, SitemapCache};

use crate::sitemap::SitemapPayload;
use chrono::{DateTime, Utc};
use std::path::Path;

/// Opens the SQLite cache at `path`, creating it if needed
pub fn open_cache(path: &Path) -> CacheResult<SqliteCache> {
    SqliteCache::new(path)
}

/// A payload as read back from the cache
#[derive(Debug, Clone, PartialEq)]
pub struct CachedSitemap {
    pub payload: SitemapPayload,

    /// Fingerprint of the configuration the payload was fetched under
    pub fingerprint: String,

    pub stored_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CachedSitemap {
    /// Whether this entry was produced from the source `fingerprint` names
    pub fn matches(&self, fingerprint: &str) -> bool {
        self.fingerprint == fingerprint
    }
}
