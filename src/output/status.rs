//! Status report for the cached sitemap
//!
//! This module provides the summary shown by the `status` command: what is
//! cached, how much of it, and when it expires.

use crate::config::Config;
use crate::output::page_count;
use crate::sitemap::PayloadKind;
use crate::storage::CachedSitemap;
use chrono::{DateTime, Utc};

/// Snapshot of the relay's cache state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitemapStatus {
    /// Configured source host, as written in the config
    pub domain: String,

    /// Public URL the rendered sitemap is served at
    pub sitemap_url: String,

    pub has_data: bool,
    pub kind: Option<PayloadKind>,
    pub count: usize,

    /// Pages of `output.max-urls-per-page` entries the cache spans
    pub pages: usize,

    pub stored_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_manual_update: Option<DateTime<Utc>>,
}

impl SitemapStatus {
    /// Builds a status from what the cache currently holds
    pub fn new(
        config: &Config,
        cached: Option<&CachedSitemap>,
        last_manual_update: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            domain: config.source.domain.clone(),
            sitemap_url: config.sitemap_url(),
            has_data: cached.map_or(false, |c| !c.payload.is_empty()),
            kind: cached.map(|c| c.payload.kind()),
            count: cached.map_or(0, |c| c.payload.len()),
            pages: page_count(cached.map(|c| &c.payload), config.output.max_urls_per_page),
            stored_at: cached.map(|c| c.stored_at),
            expires_at: cached.map(|c| c.expires_at),
            last_manual_update,
        }
    }

    pub fn is_index(&self) -> bool {
        self.kind == Some(PayloadKind::Index)
    }
}

/// Prints the status to stdout
pub fn print_status(status: &SitemapStatus) {
    println!("=== Sitemap Status ===\n");

    println!("Source:");
    if status.domain.is_empty() {
        println!("  Domain: (not configured)");
    } else {
        println!("  Domain: {}", status.domain);
    }
    println!("  Served at: {}", status.sitemap_url);
    println!();

    println!("Cache:");
    println!("  Has data: {}", if status.has_data { "yes" } else { "no" });
    if let Some(kind) = status.kind {
        println!("  Type: {}", kind);
        println!("  Is index: {}", if status.is_index() { "yes" } else { "no" });
        println!("  Entries: {}", status.count);
        println!("  Pages: {}", status.pages);
    }
    if let Some(stored_at) = status.stored_at {
        println!("  Stored: {}", stored_at.to_rfc3339());
    }
    if let Some(expires_at) = status.expires_at {
        println!("  Expires: {}", expires_at.to_rfc3339());
    }
    if let Some(last) = status.last_manual_update {
        println!("  Last manual update: {}", last.to_rfc3339());
    }
}
