//! Inbound interface of the relay
//!
//! [`SitemapService`] ties configuration, the updater, the cache and the
//! renderer together and exposes the operations the CLI (or any other
//! host) calls: trigger an update, render the sitemap, report status and
//! clear the cache.

use crate::config::Config;
use crate::diagnostics::TracingDiagnostics;
use crate::output::{SitemapStatus, XmlRenderer};
use crate::sitemap::{Fetch, FetchError, SafeFetcher, SitemapPayload, UpdateError, UpdateOutcome, Updater};
use crate::storage::{open_cache, CacheError, CachedSitemap, SitemapCache, SqliteCache};
use crate::url::DomainValidator;
use crate::RelayError;
use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Errors from service operations that are not plain update failures
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Manual updates are rate limited, retry in {retry_after}s")]
    RateLimited { retry_after: i64 },

    #[error(transparent)]
    Update(#[from] UpdateError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// One relay installation: a source, a cache slot and an output document
pub struct SitemapService<F: Fetch, C: SitemapCache> {
    config: Config,
    updater: Updater<F>,
    cache: Mutex<C>,
    renderer: XmlRenderer,
    update_lock: tokio::sync::Mutex<()>,
}

impl SitemapService<SafeFetcher, SqliteCache> {
    /// Builds the production service: HTTPS fetcher, SQLite cache at
    /// `cache.path`, and update events forwarded to `tracing`
    pub fn from_config(config: Config) -> Result<Self, RelayError> {
        let validator = DomainValidator::new();
        let fetcher = SafeFetcher::new(validator.clone()).map_err(|source| {
            FetchError::Transport {
                url: config.source.domain.clone(),
                source,
            }
        })?;
        let updater =
            Updater::new(fetcher, validator).with_diagnostics(Arc::new(TracingDiagnostics));
        let cache = open_cache(Path::new(&config.cache.path))?;

        Ok(Self::new(config, updater, cache))
    }
}

impl<F: Fetch, C: SitemapCache> SitemapService<F, C> {
    pub fn new(config: Config, updater: Updater<F>, cache: C) -> Self {
        let renderer = XmlRenderer::new(config.output.site_url.clone());
        Self {
            config,
            updater,
            cache: Mutex::new(cache),
            renderer,
            update_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn renderer(&self) -> &XmlRenderer {
        &self.renderer
    }

    /// Runs one update unless another is already in flight
    ///
    /// Nothing is written to the cache unless the update succeeds.
    pub async fn trigger_update(&self) -> Result<UpdateOutcome, UpdateError> {
        let _guard = self
            .update_lock
            .try_lock()
            .map_err(|_| UpdateError::InProgress)?;
        self.run_update().await
    }

    /// Runs an administrator-requested update, at most once per
    /// `limits.manual-update-interval-secs`
    pub async fn trigger_manual_update(
        &self,
        now: DateTime<Utc>,
    ) -> Result<UpdateOutcome, ServiceError> {
        // A refused trigger must not use up the interval
        let _guard = self
            .update_lock
            .try_lock()
            .map_err(|_| UpdateError::InProgress)?;

        {
            let mut cache = self.lock_cache()?;
            if let Some(last) = cache.last_manual_update()? {
                let next_allowed = last + self.config.limits.manual_update_interval();
                if now < next_allowed {
                    return Err(ServiceError::RateLimited {
                        retry_after: (next_allowed - now).num_seconds().max(1),
                    });
                }
            }
            cache.record_manual_update(now)?;
        }

        Ok(self.run_update().await?)
    }

    /// Reads the cache, treating entries from another source as absent
    ///
    /// An entry whose fingerprint does not match the current configuration
    /// is evicted.
    pub fn cached(&self) -> Result<Option<CachedSitemap>, CacheError> {
        let mut cache = self.lock_cache()?;
        match cache.get()? {
            Some(cached) if cached.matches(&self.config.fingerprint()) => Ok(Some(cached)),
            Some(_) => {
                tracing::info!("Cached sitemap belongs to a different source, discarding");
                cache.clear()?;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Renders the cached sitemap, updating once first if the cache is empty
    ///
    /// Never fails: cache or update errors degrade to the fallback document.
    pub async fn render_sitemap(&self) -> String {
        let payload = self.load_or_update().await;
        self.renderer
            .render(payload.as_ref(), self.config.source.flatten)
    }

    /// Renders one page of `output.max-urls-per-page` entries
    pub async fn render_page(&self, page: usize) -> String {
        let payload = self.load_or_update().await;
        self.renderer.render_page(
            payload.as_ref(),
            self.config.source.flatten,
            page,
            self.config.output.max_urls_per_page,
        )
    }

    pub fn status(&self) -> Result<SitemapStatus, CacheError> {
        let cached = self.cached()?;
        let last_manual = self.lock_cache()?.last_manual_update()?;
        Ok(SitemapStatus::new(&self.config, cached.as_ref(), last_manual))
    }

    /// Removes the cached payload
    pub fn clear(&self) -> Result<(), CacheError> {
        self.lock_cache()?.clear()
    }

    async fn load_or_update(&self) -> Option<SitemapPayload> {
        match self.cached() {
            Ok(Some(cached)) => return Some(cached.payload),
            Ok(None) => {}
            Err(e) => tracing::warn!("Failed to read sitemap cache: {}", e),
        }

        if let Err(e) = self.trigger_update().await {
            tracing::warn!("Sitemap update before render failed: {}", e);
            return None;
        }

        match self.cached() {
            Ok(cached) => cached.map(|c| c.payload),
            Err(e) => {
                tracing::warn!("Failed to read sitemap cache: {}", e);
                None
            }
        }
    }

    /// Caller holds `update_lock`
    async fn run_update(&self) -> Result<UpdateOutcome, UpdateError> {
        let refreshed = self.updater.refresh(&self.config).await?;
        let mut cache = self.lock_cache()?;
        self.updater.store(&mut *cache, &self.config, refreshed)
    }

    fn lock_cache(&self) -> Result<MutexGuard<'_, C>, CacheError> {
        self.cache.lock().map_err(|_| CacheError::Poisoned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sitemap::mock::{sitemap_index, urlset, StaticFetcher};
    use crate::sitemap::{PayloadKind, SitemapEntry};
    use crate::storage::MemoryCache;
    use chrono::Duration;

    const ROOT: &str = "https://my-store.myshopify.com/sitemap.xml";

    fn config() -> Config {
        let mut config = Config::default();
        config.source.domain = "my-store.myshopify.com".to_string();
        config.output.site_url = "https://blog.example.com".to_string();
        config
    }

    fn service(fetcher: StaticFetcher, cache: MemoryCache) -> SitemapService<StaticFetcher, MemoryCache> {
        SitemapService::new(config(), Updater::new(fetcher, DomainValidator::new()), cache)
    }

    fn live_fetcher() -> StaticFetcher {
        StaticFetcher::default().with(
            ROOT,
            &urlset(&["https://my-store.myshopify.com/a", "https://my-store.myshopify.com/b"]),
        )
    }

    #[tokio::test]
    async fn test_render_updates_once_when_cache_empty() {
        let service = service(live_fetcher(), MemoryCache::new());

        let xml = service.render_sitemap().await;
        assert_eq!(xml.matches("<url>").count(), 2);
        assert_eq!(service.updater_calls(), 1);

        // Served from cache the second time
        service.render_sitemap().await;
        assert_eq!(service.updater_calls(), 1);
    }

    #[tokio::test]
    async fn test_render_falls_back_when_update_fails() {
        let service = service(StaticFetcher::default(), MemoryCache::new());
        let xml = service.render_sitemap().await;

        assert_eq!(xml.matches("<url>").count(), 1);
        assert!(xml.contains("<loc>https://blog.example.com</loc>"));
        assert!(xml.contains("<priority>1.0</priority>"));
    }

    #[tokio::test]
    async fn test_failed_update_keeps_stale_data() {
        let mut cache = MemoryCache::new();
        let stale = SitemapPayload::Flat(vec![SitemapEntry::new("https://my-store.myshopify.com/stale")]);
        cache.put(&stale, &config().fingerprint(), Duration::hours(1)).unwrap();

        let service = service(StaticFetcher::default(), cache);
        assert!(service.trigger_update().await.is_err());

        let xml = service.render_sitemap().await;
        assert!(xml.contains("/stale</loc>"));
    }

    #[tokio::test]
    async fn test_foreign_fingerprint_is_discarded() {
        let mut cache = MemoryCache::new();
        let other = SitemapPayload::Flat(vec![SitemapEntry::new("https://other.myshopify.com/x")]);
        cache.put(&other, "another-source", Duration::hours(1)).unwrap();

        let service = service(live_fetcher(), cache);
        assert!(service.cached().unwrap().is_none());

        let xml = service.render_sitemap().await;
        assert!(!xml.contains("other.myshopify.com"));
        assert_eq!(xml.matches("<url>").count(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_update_is_refused() {
        let service = service(live_fetcher(), MemoryCache::new());
        let _held = service.update_lock.try_lock().unwrap();

        assert!(matches!(
            service.trigger_update().await,
            Err(UpdateError::InProgress)
        ));
        assert_eq!(service.updater_calls(), 0);
    }

    #[tokio::test]
    async fn test_manual_update_rate_limit() {
        let service = service(live_fetcher(), MemoryCache::new());
        let now = Utc::now();

        service.trigger_manual_update(now).await.unwrap();

        match service.trigger_manual_update(now + Duration::seconds(10)).await {
            Err(ServiceError::RateLimited { retry_after }) => assert_eq!(retry_after, 20),
            other => panic!("expected rate limit, got {:?}", other.map(|o| o.count)),
        }

        assert!(service
            .trigger_manual_update(now + Duration::seconds(30))
            .await
            .is_ok());
        assert_eq!(service.updater_calls(), 2);
    }

    #[tokio::test]
    async fn test_refused_manual_update_keeps_window_open() {
        let service = service(live_fetcher(), MemoryCache::new());
        let now = Utc::now();

        {
            let _held = service.update_lock.try_lock().unwrap();
            assert!(matches!(
                service.trigger_manual_update(now).await,
                Err(ServiceError::Update(UpdateError::InProgress))
            ));
        }
        assert!(service.status().unwrap().last_manual_update.is_none());

        assert!(service.trigger_manual_update(now).await.is_ok());
        assert_eq!(service.updater_calls(), 1);
    }

    #[tokio::test]
    async fn test_status_and_clear() {
        let fetcher = StaticFetcher::default().with(
            ROOT,
            &sitemap_index(&["https://my-store.myshopify.com/sitemap_products_1.xml"]),
        );
        let service = service(fetcher, MemoryCache::new());

        let before = service.status().unwrap();
        assert!(!before.has_data);

        service.trigger_update().await.unwrap();
        let after = service.status().unwrap();
        assert!(after.has_data);
        assert_eq!(after.kind, Some(PayloadKind::Index));
        assert_eq!(after.sitemap_url, "https://blog.example.com/store.xml");

        service.clear().unwrap();
        assert!(!service.status().unwrap().has_data);
    }

    #[tokio::test]
    async fn test_render_page_uses_configured_page_size() {
        let mut config = config();
        config.output.max_urls_per_page = 1;
        let service = SitemapService::new(
            config,
            Updater::new(live_fetcher(), DomainValidator::new()),
            MemoryCache::new(),
        );

        let second = service.render_page(2).await;
        assert_eq!(second.matches("<url>").count(), 1);
        assert!(second.contains("/b</loc>"));
    }

    impl SitemapService<StaticFetcher, MemoryCache> {
        fn updater_calls(&self) -> usize {
            self.updater.fetcher().calls()
        }
    }
}
