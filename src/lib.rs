//! Sitemap-Relay: mirror a remote XML sitemap behind a local cache
//!
//! This crate fetches a sitemap (or sitemap index) from one configured
//! external host, parses it into normalized entries, caches the result with
//! an expiry, and renders it back as sitemap-protocol 0.9 XML.

pub mod config;
pub mod diagnostics;
pub mod output;
pub mod service;
pub mod sitemap;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Sitemap-Relay operations
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] sitemap::FetchError),

    #[error("Parse error: {0}")]
    Parse(#[from] sitemap::ParseError),

    #[error("Update failed: {0}")]
    Update(#[from] sitemap::UpdateError),

    #[error("Cache error: {0}")]
    Cache(#[from] storage::CacheError),

    #[error("Service error: {0}")]
    Service(#[from] service::ServiceError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Reasons a configured hostname is refused as a fetch target
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("Domain is empty")]
    Empty,

    #[error("Malformed hostname: {0}")]
    Syntax(String),

    #[error("IP address literals are not accepted: {0}")]
    IpLiteral(String),

    #[error("Hostname does not match the first-party pattern: {0}")]
    FirstParty(String),

    #[error("Hostname could not be resolved: {0}")]
    Unresolvable(String),

    #[error("Hostname {host} resolves to non-public address {addr}")]
    NonPublic { host: String, addr: std::net::IpAddr },
}

/// Result type alias for Sitemap-Relay operations
pub type Result<T> = std::result::Result<T, RelayError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use output::XmlRenderer;
pub use service::SitemapService;
pub use sitemap::{SitemapEntry, SitemapIndexEntry, SitemapPayload};
pub use url::DomainValidator;
