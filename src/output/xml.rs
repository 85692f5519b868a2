//! Sitemap-protocol XML output
//!
//! Renders a cached payload back into a `urlset` or `sitemapindex`
//! document. Rendering never fails: a missing or empty payload produces a
//! one-entry fallback document pointing at the site root.

use crate::sitemap::{SitemapEntry, SitemapIndexEntry, SitemapPayload};
use chrono::{NaiveDate, Utc};
use quick_xml::escape::escape;

/// Namespace of sitemap protocol 0.9
pub const SITEMAP_NAMESPACE: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// Writes sitemap documents for one site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlRenderer {
    site_url: String,
}

impl XmlRenderer {
    /// `site_url` is the root URL used by the fallback document
    pub fn new(site_url: impl Into<String>) -> Self {
        Self {
            site_url: site_url.into(),
        }
    }

    pub fn site_url(&self) -> &str {
        &self.site_url
    }

    /// Renders the whole payload, dating any fallback entry today (UTC)
    pub fn render(&self, payload: Option<&SitemapPayload>, flatten: bool) -> String {
        self.render_on(payload, flatten, Utc::now().date_naive())
    }

    /// Renders the whole payload with a fixed fallback date
    ///
    /// An index payload is written as a `sitemapindex` unless `flatten` is
    /// set, in which case it has no page entries to offer and an empty
    /// `urlset` is written instead.
    pub fn render_on(
        &self,
        payload: Option<&SitemapPayload>,
        flatten: bool,
        today: NaiveDate,
    ) -> String {
        match payload {
            Some(SitemapPayload::Flat(entries)) if !entries.is_empty() => urlset(entries),
            Some(SitemapPayload::Index(refs)) if !refs.is_empty() => {
                if flatten {
                    urlset(&[])
                } else {
                    sitemap_index(refs)
                }
            }
            _ => self.fallback(today),
        }
    }

    /// Renders one 1-based page of at most `per_page` entries
    ///
    /// Page 1 of a missing or empty payload is the fallback document; any
    /// page past the end is an empty `urlset`.
    pub fn render_page(
        &self,
        payload: Option<&SitemapPayload>,
        flatten: bool,
        page: usize,
        per_page: usize,
    ) -> String {
        let per_page = per_page.max(1);
        let in_range = |len: usize| page >= 1 && page <= page_count_for(len, per_page);

        match payload {
            Some(SitemapPayload::Flat(entries)) if in_range(entries.len()) => {
                urlset(page_slice(entries, page, per_page))
            }
            Some(SitemapPayload::Index(refs)) if !flatten && in_range(refs.len()) => {
                sitemap_index(page_slice(refs, page, per_page))
            }
            Some(payload) if !payload.is_empty() => urlset(&[]),
            _ if page == 1 => self.fallback(Utc::now().date_naive()),
            _ => urlset(&[]),
        }
    }

    fn fallback(&self, today: NaiveDate) -> String {
        urlset(&[SitemapEntry {
            location: self.site_url.clone(),
            last_modified: Some(today.format("%Y-%m-%d").to_string()),
            change_frequency: Some("daily".to_string()),
            priority: Some("1.0".to_string()),
        }])
    }
}

/// Number of `per_page`-sized pages the payload spans; zero when empty
pub fn page_count(payload: Option<&SitemapPayload>, per_page: usize) -> usize {
    payload.map_or(0, |p| page_count_for(p.len(), per_page.max(1)))
}

fn page_count_for(len: usize, per_page: usize) -> usize {
    len.div_ceil(per_page)
}

fn page_slice<T>(items: &[T], page: usize, per_page: usize) -> &[T] {
    let start = (page - 1) * per_page;
    let end = (start + per_page).min(items.len());
    &items[start..end]
}

fn urlset(entries: &[SitemapEntry]) -> String {
    let mut xml = open_root("urlset");
    for entry in entries {
        xml.push_str("\t<url>\n");
        push_element(&mut xml, "loc", &escape_loc(&entry.location));
        push_optional(&mut xml, "lastmod", entry.last_modified.as_deref());
        push_optional(&mut xml, "changefreq", entry.change_frequency.as_deref());
        push_optional(&mut xml, "priority", entry.priority.as_deref());
        xml.push_str("\t</url>\n");
    }
    xml.push_str("</urlset>");
    xml
}

fn sitemap_index(refs: &[SitemapIndexEntry]) -> String {
    let mut xml = open_root("sitemapindex");
    for child in refs {
        xml.push_str("\t<sitemap>\n");
        push_element(&mut xml, "loc", &escape_loc(&child.location));
        push_optional(&mut xml, "lastmod", child.last_modified.as_deref());
        xml.push_str("\t</sitemap>\n");
    }
    xml.push_str("</sitemapindex>");
    xml
}

fn open_root(name: &str) -> String {
    format!(
        "{}\n<{} xmlns=\"{}\">\n",
        XML_DECLARATION, name, SITEMAP_NAMESPACE
    )
}

fn push_element(xml: &mut String, name: &str, escaped: &str) {
    xml.push_str("\t\t<");
    xml.push_str(name);
    xml.push('>');
    xml.push_str(escaped);
    xml.push_str("</");
    xml.push_str(name);
    xml.push_str(">\n");
}

fn push_optional(xml: &mut String, name: &str, value: Option<&str>) {
    if let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) {
        push_element(xml, name, &escape(value));
    }
}

/// Trims, percent-encodes spaces and XML-escapes a location
fn escape_loc(location: &str) -> String {
    escape(location.trim().replace(' ', "%20").as_str()).into_owned()
}
