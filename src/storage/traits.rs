//! Cache trait and error types
//!
//! This module defines the interface every cache backend implements and
//! the errors they share.

use crate::sitemap::SitemapPayload;
use crate::storage::CachedSitemap;
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

/// Errors that can occur during cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt cache entry: {0}")]
    Corrupt(String),

    #[error("Cache lock poisoned")]
    Poisoned,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Single-slot store for the current sitemap payload
///
/// There is exactly one slot per installation. Writes replace the slot as a
/// whole, so a reader sees either the previous payload or the new one.
/// Expired entries are deleted when read and reported as absent.
pub trait SitemapCache: Send {
    /// Reads the slot as of `now`
    fn get_at(&mut self, now: DateTime<Utc>) -> CacheResult<Option<CachedSitemap>>;

    /// Replaces the slot, returning the expiry that was stored
    fn put_at(
        &mut self,
        payload: &SitemapPayload,
        fingerprint: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> CacheResult<DateTime<Utc>>;

    /// Empties the slot
    fn clear(&mut self) -> CacheResult<()>;

    /// When a manual update was last accepted, if ever
    fn last_manual_update(&self) -> CacheResult<Option<DateTime<Utc>>>;

    fn record_manual_update(&mut self, at: DateTime<Utc>) -> CacheResult<()>;

    /// Reads the slot as of the current time
    fn get(&mut self) -> CacheResult<Option<CachedSitemap>> {
        self.get_at(Utc::now())
    }

    /// Replaces the slot, with the TTL counted from the current time
    fn put(
        &mut self,
        payload: &SitemapPayload,
        fingerprint: &str,
        ttl: Duration,
    ) -> CacheResult<DateTime<Utc>> {
        self.put_at(payload, fingerprint, ttl, Utc::now())
    }
}
