//! Hostname handling for Sitemap-Relay
//!
//! This module decides whether a configured hostname is an acceptable fetch
//! target: shape checks, first-party suffix matching, and a resolution step
//! that refuses anything pointing at loopback, private, or reserved space.

mod domain;

pub use domain::{
    check_syntax, is_public_ip, normalize_host, DomainKind, DomainValidator, Resolve,
    SystemResolver, FIRST_PARTY_SUFFIX,
};

use url::Url;

/// Extracts the lowercase host from a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sitemap_relay::url::extract_domain;
///
/// let url = Url::parse("https://Shop.Example.COM/sitemap.xml").unwrap();
/// assert_eq!(extract_domain(&url), Some("shop.example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}
