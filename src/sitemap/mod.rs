//! Sitemap module for fetching and processing remote sitemaps
//!
//! This module contains the core update pipeline, including:
//! - HTTPS fetching with host validation and size limits
//! - Lenient sitemap and sitemap index parsing
//! - Sequential flattening of sitemap indexes
//! - Overall update orchestration

mod fetcher;
mod flattener;
mod parser;
mod types;
mod updater;

#[cfg(test)]
pub(crate) mod mock;

pub use fetcher::{
    build_http_client, Fetch, FetchError, SafeFetcher, FETCH_TIMEOUT, MAX_BODY_BYTES,
    MAX_REDIRECTS, USER_AGENT,
};
pub use flattener::{FlattenError, Flattener, DEFAULT_MAX_REFS};
pub use parser::{classify_and_parse, parse_with_hint, sniff_index, ParseError, ParsedSitemap};
pub use types::{PayloadKind, SitemapEntry, SitemapIndexEntry, SitemapPayload};
pub use updater::{UpdateError, UpdateOutcome, Updater};
