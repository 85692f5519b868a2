//! Sitemap data model shared by the parser, cache and renderer

use serde::{Deserialize, Serialize};
use std::fmt;

/// One `<url>` record of a urlset
///
/// Optional fields are carried verbatim; they are never parsed or
/// reformatted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SitemapEntry {
    /// Absolute URL of the page
    pub location: String,

    /// `<lastmod>` value (W3C datetime, opaque)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,

    /// `<changefreq>` value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_frequency: Option<String>,

    /// `<priority>` value, textual
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
}

impl SitemapEntry {
    /// Creates an entry with only a location
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            last_modified: None,
            change_frequency: None,
            priority: None,
        }
    }
}

/// One `<sitemap>` reference of a sitemap index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SitemapIndexEntry {
    pub location: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
}

impl SitemapIndexEntry {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            last_modified: None,
        }
    }
}

/// The cached artifact: either a flat list of pages or an index of sitemaps
///
/// The variant is the type flag, so payload and flag are always stored and
/// read together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "entries", rename_all = "lowercase")]
pub enum SitemapPayload {
    Flat(Vec<SitemapEntry>),
    Index(Vec<SitemapIndexEntry>),
}

impl SitemapPayload {
    pub fn kind(&self) -> PayloadKind {
        match self {
            Self::Flat(_) => PayloadKind::Flat,
            Self::Index(_) => PayloadKind::Index,
        }
    }

    /// Number of entries or refs
    pub fn len(&self) -> usize {
        match self {
            Self::Flat(entries) => entries.len(),
            Self::Index(refs) => refs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Shape of a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    Flat,
    Index,
}

impl PayloadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flat => "flat",
            Self::Index => "index",
        }
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
