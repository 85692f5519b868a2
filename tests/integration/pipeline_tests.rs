//! Integration tests for the update and render pipeline
//!
//! These tests use wiremock as the remote store. Requests the relay makes to
//! `https://<store>/<path>` are routed to the mock server by path, so the
//! full fetch, parse, flatten, cache and render cycle runs end-to-end.

use async_trait::async_trait;
use sitemap_relay::config::{parse_config, Config};
use sitemap_relay::sitemap::{Fetch, FetchError, SafeFetcher, UpdateError, Updater};
use sitemap_relay::storage::{MemoryCache, SitemapCache, SqliteCache};
use sitemap_relay::url::DomainValidator;
use sitemap_relay::{SitemapPayload, SitemapService};
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const STORE: &str = "shop.example.myshopify.com";

/// Forwards every request to the mock server, keeping only the path
struct MockOrigin {
    base: String,
    client: reqwest::Client,
}

impl MockOrigin {
    fn new(server: &MockServer) -> Self {
        Self {
            base: server.uri(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Fetch for MockOrigin {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;
        let target = format!("{}{}", self.base, parsed.path());

        let response = self
            .client
            .get(&target)
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;

        if response.status().as_u16() != 200 {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;
        Ok(body.to_vec())
    }
}

fn config_toml(flatten: bool, cache_path: &str) -> String {
    format!(
        r#"
[source]
domain = "{}"
remote-path = "sitemap.xml"
flatten = {}

[schedule]
frequency = "daily"

[output]
site-url = "https://blog.example.com"

[cache]
path = "{}"
"#,
        STORE, flatten, cache_path
    )
}

fn test_config(flatten: bool) -> Config {
    parse_config(&config_toml(flatten, "unused.db")).unwrap()
}

fn service<C: SitemapCache>(
    server: &MockServer,
    config: Config,
    cache: C,
) -> SitemapService<MockOrigin, C> {
    SitemapService::new(
        config,
        Updater::new(MockOrigin::new(server), DomainValidator::new()),
        cache,
    )
}

async fn mount(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

fn index_body() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <sitemap><loc>https://{}/sitemap_products_1.xml</loc></sitemap>
</sitemapindex>"#,
        STORE
    )
}

fn products_body() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>https://{}/products/widget</loc><changefreq>daily</changefreq></url>
</urlset>"#,
        STORE
    )
}

#[tokio::test]
async fn test_flattened_index_renders_single_url() {
    let server = MockServer::start().await;
    mount(&server, "/sitemap.xml", &index_body()).await;
    mount(&server, "/sitemap_products_1.xml", &products_body()).await;

    let service = service(&server, test_config(true), MemoryCache::new());
    service.trigger_update().await.unwrap();
    let xml = service.render_sitemap().await;

    assert!(xml.contains("<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">"));
    assert_eq!(xml.matches("<url>").count(), 1);
    assert!(xml.contains("<loc>https://shop.example.myshopify.com/products/widget</loc>"));
    assert!(xml.contains("<changefreq>daily</changefreq>"));
    assert!(!xml.contains("<lastmod>"));
    assert!(!xml.contains("<priority>"));
}

#[tokio::test]
async fn test_index_is_passed_through_without_flatten() {
    let server = MockServer::start().await;
    mount(&server, "/sitemap.xml", &index_body()).await;

    let service = service(&server, test_config(false), MemoryCache::new());
    let xml = service.render_sitemap().await;

    assert!(xml.contains("<sitemapindex"));
    assert!(xml.contains("<loc>https://shop.example.myshopify.com/sitemap_products_1.xml</loc>"));
}

#[tokio::test]
async fn test_flatten_failure_keeps_previous_payload() {
    let server = MockServer::start().await;
    mount(&server, "/sitemap.xml", &index_body()).await;
    // The child sitemap answers 404

    let config = test_config(true);
    let mut cache = MemoryCache::new();
    let previous = SitemapPayload::Flat(vec![sitemap_relay::SitemapEntry::new(
        "https://shop.example.myshopify.com/previous",
    )]);
    cache
        .put(&previous, &config.fingerprint(), config.schedule.frequency.ttl())
        .unwrap();

    let service = service(&server, config, cache);
    assert!(matches!(
        service.trigger_update().await,
        Err(UpdateError::FlattenFailed)
    ));
    assert_eq!(service.cached().unwrap().unwrap().payload, previous);
}

#[tokio::test]
async fn test_sqlite_cache_survives_restart() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("cache.db");

    {
        let server = MockServer::start().await;
        mount(&server, "/sitemap.xml", &products_body()).await;

        let service = service(&server, test_config(false), SqliteCache::new(&db).unwrap());
        service.trigger_update().await.unwrap();
    }

    // The origin is gone now; rendering must come from the cache
    let server = MockServer::start().await;
    let service = service(&server, test_config(false), SqliteCache::new(&db).unwrap());
    let status = service.status().unwrap();
    assert!(status.has_data);
    assert_eq!(status.count, 1);

    let xml = service.render_sitemap().await;
    assert!(xml.contains("/products/widget</loc>"));
}

#[tokio::test]
async fn test_changed_source_invalidates_cache() {
    let server = MockServer::start().await;
    mount(&server, "/sitemap.xml", &index_body()).await;
    mount(&server, "/sitemap_products_1.xml", &products_body()).await;

    let mut cache = MemoryCache::new();
    {
        let unflattened = service(&server, test_config(false), MemoryCache::new());
        unflattened.trigger_update().await.unwrap();
        let cached = unflattened.cached().unwrap().unwrap();
        cache
            .put(&cached.payload, &cached.fingerprint, chrono::Duration::hours(1))
            .unwrap();
    }

    // Same cache, flatten switched on: the stored index must not be served
    let flattened = service(&server, test_config(true), cache);
    let xml = flattened.render_sitemap().await;
    assert!(!xml.contains("<sitemapindex"));
    assert!(xml.contains("/products/widget</loc>"));
}

#[tokio::test]
async fn test_config_file_round_trip() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("relay.db");
    let config_path = dir.path().join("relay.toml");
    std::fs::write(&config_path, config_toml(true, &db.to_string_lossy())).unwrap();

    let config = sitemap_relay::config::load_config(&config_path).unwrap();
    assert_eq!(config.fingerprint().len(), 64);
    assert_eq!(config.source.domain, STORE);
    assert!(config.source.flatten);
    assert_eq!(config.output.filename, "store.xml");

    let service = SitemapService::from_config(config).unwrap();
    assert!(!service.status().unwrap().has_data);
    assert!(db.exists());
}

#[tokio::test]
async fn test_safe_fetcher_refuses_plain_http() {
    let fetcher = SafeFetcher::new(DomainValidator::new()).unwrap();
    assert!(matches!(
        fetcher.fetch("http://example.com/sitemap.xml").await,
        Err(FetchError::InsecureScheme(_))
    ));
}
