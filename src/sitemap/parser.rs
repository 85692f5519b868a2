//! Sitemap XML parser
//!
//! This module turns raw sitemap bytes into a [`SitemapPayload`]:
//! - `<urlset>` documents become [`SitemapPayload::Flat`]
//! - `<sitemapindex>` documents become [`SitemapPayload::Index`]
//!
//! Only direct children of a `<url>` or `<sitemap>` in the sitemap namespace
//! are read, so extension blocks such as `<image:image>` never supply a
//! location.
//!
//! Parsing is lenient. Elements without a `<loc>` are skipped, undecodable
//! text drops only the value it belongs to, and an XML error part-way
//! through a document keeps everything read before it. Only a document that
//! fails before its first element is rejected outright.

use crate::sitemap::types::{SitemapEntry, SitemapIndexEntry, SitemapPayload};
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::PrefixDeclaration;
use quick_xml::Reader;
use thiserror::Error;

/// Errors for documents that cannot be used at all
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Sitemap document is empty")]
    Empty,

    #[error("Sitemap document is not well-formed: {0}")]
    Malformed(String),
}

/// A parsed document plus any non-fatal diagnostics collected on the way
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSitemap {
    pub payload: SitemapPayload,
    pub warnings: Vec<String>,
}

/// Child elements the parser reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Loc,
    LastMod,
    ChangeFreq,
    Priority,
}

impl Field {
    fn from_name(name: &[u8], container: Container) -> Option<Self> {
        match (name, container) {
            (b"loc", _) => Some(Self::Loc),
            (b"lastmod", _) => Some(Self::LastMod),
            (b"changefreq", Container::Url) => Some(Self::ChangeFreq),
            (b"priority", Container::Url) => Some(Self::Priority),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    Url,
    Sitemap,
}

/// Values gathered for the `<url>` or `<sitemap>` being read
#[derive(Debug)]
struct Pending {
    container: Container,
    loc: Option<String>,
    lastmod: Option<String>,
    changefreq: Option<String>,
    priority: Option<String>,
}

impl Pending {
    fn new(container: Container) -> Self {
        Self {
            container,
            loc: None,
            lastmod: None,
            changefreq: None,
            priority: None,
        }
    }

    /// The first non-empty occurrence of each field wins
    fn set(&mut self, field: Field, value: &str) {
        let value = value.trim();
        if value.is_empty() {
            return;
        }
        let slot = match field {
            Field::Loc => &mut self.loc,
            Field::LastMod => &mut self.lastmod,
            Field::ChangeFreq => &mut self.changefreq,
            Field::Priority => &mut self.priority,
        };
        if slot.is_none() {
            *slot = Some(value.to_string());
        }
    }
}

/// Accumulated results of one pass over a document
#[derive(Debug, Default)]
struct Collected {
    urls: Vec<SitemapEntry>,
    refs: Vec<SitemapIndexEntry>,
    saw_sitemap: bool,
    warnings: Vec<String>,
}

impl Collected {
    fn finish(&mut self, pending: Pending) {
        let Some(location) = pending.loc else {
            return;
        };
        match pending.container {
            Container::Url => self.urls.push(SitemapEntry {
                location,
                last_modified: pending.lastmod,
                change_frequency: pending.changefreq,
                priority: pending.priority,
            }),
            Container::Sitemap => self.refs.push(SitemapIndexEntry {
                location,
                last_modified: pending.lastmod,
            }),
        }
    }
}

/// Fast dialect check on the raw bytes
///
/// Returns true if the document contains a `sitemapindex` element, with or
/// without a namespace prefix.
#[must_use]
pub fn sniff_index(xml: &[u8]) -> bool {
    contains(xml, b"<sitemapindex") || contains(xml, b":sitemapindex")
}

/// Remembers prefixes declared for the sitemap namespace, e.g. `xmlns:sm`
fn record_sitemap_prefixes(e: &BytesStart, prefixes: &mut Vec<Vec<u8>>) {
    for attr in e.attributes().flatten() {
        if let Some(PrefixDeclaration::Named(prefix)) = attr.key.as_namespace_binding() {
            if contains(&attr.value, b"/schemas/sitemap/") && !prefixes.iter().any(|p| p.as_slice() == prefix) {
                prefixes.push(prefix.to_vec());
            }
        }
    }
}

/// Unprefixed names, or names under a prefix bound to the sitemap namespace
fn in_sitemap_namespace(e: &BytesStart, sitemap_prefixes: &[Vec<u8>]) -> bool {
    match e.name().prefix() {
        None => true,
        Some(prefix) => sitemap_prefixes
            .iter()
            .any(|p| p.as_slice() == prefix.into_inner()),
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

/// Parses a document and classifies it as a urlset or a sitemap index
///
/// # Examples
///
/// ```
/// use sitemap_relay::sitemap::{classify_and_parse, SitemapPayload};
///
/// let xml = br#"<?xml version="1.0" encoding="UTF-8"?>
/// <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
///   <url><loc>https://example.com/page1</loc><priority>0.8</priority></url>
/// </urlset>"#;
///
/// let parsed = classify_and_parse(xml).unwrap();
/// match parsed.payload {
///     SitemapPayload::Flat(entries) => assert_eq!(entries[0].priority.as_deref(), Some("0.8")),
///     SitemapPayload::Index(_) => unreachable!(),
/// }
/// ```
pub fn classify_and_parse(xml: &[u8]) -> Result<ParsedSitemap, ParseError> {
    parse_with_hint(xml, false)
}

/// Parses a document, forcing the index dialect when `force_index` is set
pub fn parse_with_hint(xml: &[u8], force_index: bool) -> Result<ParsedSitemap, ParseError> {
    if xml.iter().all(u8::is_ascii_whitespace) {
        return Err(ParseError::Empty);
    }

    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    reader.config_mut().check_end_names = false;
    reader.config_mut().allow_unmatched_ends = true;

    let mut buf = Vec::new();
    let mut collected = Collected::default();
    let mut root: Option<Vec<u8>> = None;
    let mut pending: Option<Pending> = None;
    let mut field: Option<Field> = None;
    let mut text = String::new();
    let mut text_ok = true;
    let mut depth = 0usize;
    let mut entry_depth = 0usize;
    let mut sitemap_prefixes: Vec<Vec<u8>> = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                depth += 1;
                record_sitemap_prefixes(&e, &mut sitemap_prefixes);
                let known = in_sitemap_namespace(&e, &sitemap_prefixes);
                let name = e.local_name().as_ref().to_vec();
                if root.is_none() {
                    root = Some(name.clone());
                }
                let container = match name.as_slice() {
                    b"url" if known => Some(Container::Url),
                    b"sitemap" if known => Some(Container::Sitemap),
                    _ => None,
                };
                match container {
                    Some(container) => {
                        if container == Container::Sitemap {
                            collected.saw_sitemap = true;
                        }
                        if let Some(unclosed) = pending.replace(Pending::new(container)) {
                            collected.finish(unclosed);
                        }
                        entry_depth = depth;
                        field = None;
                    }
                    None => {
                        if let Some(current) = &pending {
                            // Only direct children count; extension blocks such as
                            // <image:image> carry their own <loc>
                            field = if known && depth == entry_depth + 1 {
                                Field::from_name(&name, current.container)
                            } else {
                                None
                            };
                            text.clear();
                            text_ok = true;
                        }
                    }
                }
            }
            Ok(Event::Empty(e)) => {
                let name = e.local_name().as_ref().to_vec();
                if root.is_none() {
                    root = Some(name.clone());
                }
                if name == b"sitemap" && in_sitemap_namespace(&e, &sitemap_prefixes) {
                    collected.saw_sitemap = true;
                }
            }
            Ok(Event::Text(e)) => {
                if field.is_some() && text_ok {
                    match e.unescape() {
                        Ok(value) => text.push_str(&value),
                        Err(err) => {
                            collected
                                .warnings
                                .push(format!("Skipped undecodable text: {}", err));
                            text_ok = false;
                        }
                    }
                }
            }
            Ok(Event::CData(e)) => {
                if field.is_some() && text_ok {
                    text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Ok(Event::End(_)) => {
                if pending.is_some() && depth == entry_depth {
                    if let Some(done) = pending.take() {
                        collected.finish(done);
                    }
                    field = None;
                } else if depth == entry_depth + 1 {
                    if let (Some(current), Some(f)) = (pending.as_mut(), field.take()) {
                        if text_ok {
                            current.set(f, &text);
                        }
                        text.clear();
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Eof) => break,
            Err(err) => {
                if root.is_none() {
                    return Err(ParseError::Malformed(err.to_string()));
                }
                collected.warnings.push(format!(
                    "Stopped reading at byte {}: {}",
                    reader.buffer_position(),
                    err
                ));
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    let is_index =
        force_index || root.as_deref() == Some(b"sitemapindex".as_slice()) || collected.saw_sitemap;

    let payload = if is_index {
        SitemapPayload::Index(collected.refs)
    } else {
        SitemapPayload::Flat(collected.urls)
    };

    Ok(ParsedSitemap {
        payload,
        warnings: collected.warnings,
    })
}
