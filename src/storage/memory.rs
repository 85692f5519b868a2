//! In-memory cache backend

use crate::sitemap::SitemapPayload;
use crate::storage::traits::{CacheResult, SitemapCache};
use crate::storage::CachedSitemap;
use chrono::{DateTime, Duration, Utc};

/// Cache that lives only as long as the process
#[derive(Debug, Default)]
pub struct MemoryCache {
    slot: Option<CachedSitemap>,
    last_manual_update: Option<DateTime<Utc>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SitemapCache for MemoryCache {
    fn get_at(&mut self, now: DateTime<Utc>) -> CacheResult<Option<CachedSitemap>> {
        if matches!(&self.slot, Some(cached) if cached.expires_at <= now) {
            self.slot = None;
        }
        Ok(self.slot.clone())
    }

    fn put_at(
        &mut self,
        payload: &SitemapPayload,
        fingerprint: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> CacheResult<DateTime<Utc>> {
        let expires_at = now + ttl;
        self.slot = Some(CachedSitemap {
            payload: payload.clone(),
            fingerprint: fingerprint.to_string(),
            stored_at: now,
            expires_at,
        });
        Ok(expires_at)
    }

    fn clear(&mut self) -> CacheResult<()> {
        self.slot = None;
        Ok(())
    }

    fn last_manual_update(&self) -> CacheResult<Option<DateTime<Utc>>> {
        Ok(self.last_manual_update)
    }

    fn record_manual_update(&mut self, at: DateTime<Utc>) -> CacheResult<()> {
        self.last_manual_update = Some(at);
        Ok(())
    }
}
