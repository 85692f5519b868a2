//! HTTP fetcher implementation
//!
//! This module handles every outbound request, including:
//! - Building the HTTP client with a fixed user agent and TLS settings
//! - Refusing non-HTTPS URLs and unsafe hosts before any request is made
//! - Following redirects manually so each hop is re-validated
//! - Connecting only to addresses that passed the public-IP check
//! - Bounding the response body while it streams in

use crate::url::{extract_domain, DomainValidator};
use crate::DomainError;
use async_trait::async_trait;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use reqwest::header::LOCATION;
use reqwest::{redirect::Policy, Client, StatusCode};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Per-request timeout
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Largest accepted response body (10 MiB)
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Redirect hops followed before giving up
pub const MAX_REDIRECTS: usize = 5;

/// User agent sent with every request
pub const USER_AGENT: &str = concat!("sitemap-relay/", env!("CARGO_PKG_VERSION"));

/// Errors from a single fetch
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Refusing non-HTTPS URL: {0}")]
    InsecureScheme(String),

    #[error("Unsafe domain: {0}")]
    UnsafeDomain(#[from] DomainError),

    #[error("Transport error for {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Response from {url} exceeds {limit} bytes")]
    ResponseTooLarge { url: String, limit: usize },

    #[error("Too many redirects starting at {0}")]
    TooManyRedirects(String),
}

/// Anything that can fetch a sitemap document by URL
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Returns the raw body of a successful (HTTP 200) response
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Outcome of a single request
#[derive(Debug, Clone)]
enum Hop {
    Body(Vec<u8>),
    Redirect(Url),
}

/// One GET without following redirects
#[async_trait]
trait Transport: Send + Sync {
    async fn get(&self, url: &Url, max_bytes: usize) -> Result<Hop, FetchError>;
}

#[async_trait]
impl Transport for Client {
    async fn get(&self, url: &Url, max_bytes: usize) -> Result<Hop, FetchError> {
        download(self, url, max_bytes).await
    }
}

/// Client-side DNS that hands out a host's addresses only if all are public
///
/// Validation and connection share one lookup, so a host cannot pass the
/// check and then resolve somewhere private.
struct PublicOnlyDns {
    validator: DomainValidator,
}

impl Resolve for PublicOnlyDns {
    fn resolve(&self, name: Name) -> Resolving {
        let validator = self.validator.clone();
        let host = name.as_str().to_string();
        Box::pin(async move {
            match public_socket_addrs(&validator, &host).await {
                Ok(addrs) => Ok(Box::new(addrs.into_iter()) as Addrs),
                Err(e) => Err(Box::new(e) as Box<dyn std::error::Error + Send + Sync>),
            }
        })
    }
}

/// The port is filled in by the connector
async fn public_socket_addrs(
    validator: &DomainValidator,
    host: &str,
) -> Result<Vec<SocketAddr>, DomainError> {
    let addrs = validator.public_addrs(host).await?;
    Ok(addrs.into_iter().map(|ip| SocketAddr::new(ip, 0)).collect())
}

/// Builds an HTTP client with proper configuration
///
/// Redirects are disabled on the client; [`SafeFetcher`] follows them itself.
/// Host names are resolved through `validator`, and any lookup that yields a
/// non-public address fails the connection.
///
/// # Example
///
/// ```no_run
/// use sitemap_relay::sitemap::build_http_client;
/// use sitemap_relay::url::DomainValidator;
///
/// let client = build_http_client(&DomainValidator::new()).unwrap();
/// ```
pub fn build_http_client(validator: &DomainValidator) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(FETCH_TIMEOUT)
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::none())
        .use_rustls_tls()
        .http1_only()
        .gzip(true)
        .brotli(true)
        .dns_resolver(Arc::new(PublicOnlyDns {
            validator: validator.clone(),
        }))
        .build()
}

/// HTTPS-only fetcher that validates every host it contacts
#[derive(Debug, Clone)]
pub struct SafeFetcher {
    client: Client,
    validator: DomainValidator,
    max_bytes: usize,
}

impl SafeFetcher {
    /// Creates a fetcher using the given validator for every hop
    pub fn new(validator: DomainValidator) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(&validator)?,
            validator,
            max_bytes: MAX_BODY_BYTES,
        })
    }

    /// Checks a URL is HTTPS with a safe host, without sending anything
    pub async fn check_target(&self, raw: &str) -> Result<Url, FetchError> {
        let url = Url::parse(raw).map_err(|e| FetchError::InvalidUrl(format!("{}: {}", raw, e)))?;

        let host = match extract_domain(&url) {
            Some(host) if !host.is_empty() => host,
            _ => return Err(FetchError::InvalidUrl(format!("{}: missing host", raw))),
        };

        if url.scheme() != "https" {
            return Err(FetchError::InsecureScheme(raw.to_string()));
        }

        self.validator.validate(&host).await?;
        Ok(url)
    }

    async fn fetch_via<T: Transport + ?Sized>(
        &self,
        transport: &T,
        url: &str,
    ) -> Result<Vec<u8>, FetchError> {
        let mut target = self.check_target(url).await?;

        for hop in 0..=MAX_REDIRECTS {
            match transport.get(&target, self.max_bytes).await? {
                Hop::Body(body) => {
                    tracing::debug!(url = %target, bytes = body.len(), "Fetched document");
                    return Ok(body);
                }
                Hop::Redirect(next) => {
                    tracing::debug!(from = %target, to = %next, hop, "Following redirect");
                    target = self.check_target(next.as_str()).await?;
                }
            }
        }

        Err(FetchError::TooManyRedirects(url.to_string()))
    }
}

#[async_trait]
impl Fetch for SafeFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.fetch_via(&self.client, url).await
    }
}

/// Sends one GET and reads the body up to `max_bytes`
///
/// A 3xx with a `Location` header is returned as a redirect target; any
/// other status besides 200 is an error.
async fn download(client: &Client, url: &Url, max_bytes: usize) -> Result<Hop, FetchError> {
    let transport = |source: reqwest::Error| FetchError::Transport {
        url: url.to_string(),
        source,
    };

    let mut response = client.get(url.clone()).send().await.map_err(transport)?;
    let status = response.status();

    if status.is_redirection() {
        if let Some(location) = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
        {
            let next = url
                .join(location)
                .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", location, e)))?;
            return Ok(Hop::Redirect(next));
        }
    }

    if status != StatusCode::OK {
        return Err(FetchError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let too_large = || FetchError::ResponseTooLarge {
        url: url.to_string(),
        limit: max_bytes,
    };

    if let Some(length) = response.content_length() {
        if length > max_bytes as u64 {
            return Err(too_large());
        }
    }

    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(transport)? {
        if body.len() + chunk.len() > max_bytes {
            return Err(too_large());
        }
        body.extend_from_slice(&chunk);
    }

    Ok(Hop::Body(body))
}
