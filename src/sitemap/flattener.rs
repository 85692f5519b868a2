//! Sitemap index flattening
//!
//! Expands the refs of a sitemap index into one list of page entries by
//! fetching each child sitemap in turn. Children are fetched one at a time
//! in ref order; a child that cannot be fetched or parsed is skipped rather
//! than failing the whole run. Only one level is expanded: a child that is
//! itself an index contributes nothing.

use crate::diagnostics::{Diagnostics, NoopDiagnostics, UpdateEvent};
use crate::sitemap::fetcher::Fetch;
use crate::sitemap::parser::classify_and_parse;
use crate::sitemap::types::{SitemapEntry, SitemapIndexEntry, SitemapPayload};
use thiserror::Error;
use tokio::time::Instant;

/// Default cap on child sitemaps per index
pub const DEFAULT_MAX_REFS: usize = 500;

/// Limits hit while flattening
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlattenError {
    #[error("Sitemap index lists {count} child sitemaps, limit is {limit}")]
    TooManyRefs { count: usize, limit: usize },

    #[error("Deadline reached after {processed} of {total} child sitemaps")]
    DeadlineExceeded { processed: usize, total: usize },
}

/// Sequential child-sitemap expander
pub struct Flattener<'a, F: Fetch + ?Sized> {
    fetcher: &'a F,
    max_refs: usize,
    deadline: Option<Instant>,
    diagnostics: &'a dyn Diagnostics,
}

impl<'a, F: Fetch + ?Sized> Flattener<'a, F> {
    pub fn new(fetcher: &'a F) -> Self {
        Self {
            fetcher,
            max_refs: DEFAULT_MAX_REFS,
            deadline: None,
            diagnostics: &NoopDiagnostics,
        }
    }

    /// Refuses indexes with more refs than this
    pub fn max_refs(mut self, max_refs: usize) -> Self {
        self.max_refs = max_refs;
        self
    }

    /// Stops with [`FlattenError::DeadlineExceeded`] once this instant passes
    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn diagnostics(mut self, diagnostics: &'a dyn Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Fetches every child and concatenates their entries in ref order
    ///
    /// An empty result is not an error here; the updater decides what an
    /// empty flatten means.
    pub async fn flatten(
        &self,
        refs: &[SitemapIndexEntry],
    ) -> Result<Vec<SitemapEntry>, FlattenError> {
        if refs.len() > self.max_refs {
            return Err(FlattenError::TooManyRefs {
                count: refs.len(),
                limit: self.max_refs,
            });
        }

        let total = refs.len();
        let mut entries = Vec::new();

        for (processed, child) in refs.iter().enumerate() {
            let location = child.location.trim();
            if location.is_empty() {
                continue;
            }

            let exceeded = FlattenError::DeadlineExceeded { processed, total };

            let body = match self.deadline {
                Some(deadline) => {
                    if Instant::now() >= deadline {
                        return Err(exceeded);
                    }
                    match tokio::time::timeout_at(deadline, self.fetcher.fetch(location)).await {
                        Ok(result) => result,
                        Err(_) => return Err(exceeded),
                    }
                }
                None => self.fetcher.fetch(location).await,
            };

            let body = match body {
                Ok(body) => body,
                Err(e) => {
                    self.skip(location, e.to_string());
                    continue;
                }
            };

            match classify_and_parse(&body) {
                Ok(parsed) => match parsed.payload {
                    SitemapPayload::Flat(mut found) => {
                        tracing::debug!("Child sitemap {} has {} entries", location, found.len());
                        entries.append(&mut found);
                    }
                    SitemapPayload::Index(_) => {
                        self.skip(location, "nested sitemap index".to_string());
                    }
                },
                Err(e) => self.skip(location, e.to_string()),
            }
        }

        self.diagnostics.event(&UpdateEvent::Flattened {
            refs: total,
            entries: entries.len(),
        });

        Ok(entries)
    }

    fn skip(&self, location: &str, reason: String) {
        self.diagnostics.event(&UpdateEvent::ChildSkipped {
            location: location.to_string(),
            reason,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::RecordingDiagnostics;
    use crate::sitemap::mock::{urlset, StaticFetcher};
    use std::time::Duration;

    fn refs(locs: &[&str]) -> Vec<SitemapIndexEntry> {
        locs.iter().map(|loc| SitemapIndexEntry::new(*loc)).collect()
    }

    fn locations(entries: &[SitemapEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.location.as_str()).collect()
    }

    #[tokio::test]
    async fn test_failed_child_is_skipped() {
        let fetcher = StaticFetcher::default()
            .with("https://s.myshopify.com/1.xml", &urlset(&["https://s.myshopify.com/a", "https://s.myshopify.com/b"]))
            .with("https://s.myshopify.com/3.xml", &urlset(&["https://s.myshopify.com/c"]));
        let recorder = RecordingDiagnostics::new();

        let entries = Flattener::new(&fetcher)
            .diagnostics(&recorder)
            .flatten(&refs(&[
                "https://s.myshopify.com/1.xml",
                "https://s.myshopify.com/2.xml",
                "https://s.myshopify.com/3.xml",
            ]))
            .await
            .unwrap();

        assert_eq!(
            locations(&entries),
            vec!["https://s.myshopify.com/a", "https://s.myshopify.com/b", "https://s.myshopify.com/c"]
        );

        let skipped: Vec<_> = recorder
            .events()
            .into_iter()
            .filter_map(|e| match e {
                UpdateEvent::ChildSkipped { location, .. } => Some(location),
                _ => None,
            })
            .collect();
        assert_eq!(skipped, vec!["https://s.myshopify.com/2.xml".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_locations_are_not_fetched() {
        let fetcher = StaticFetcher::default()
            .with("https://s.myshopify.com/1.xml", &urlset(&["https://s.myshopify.com/a"]));

        let entries = Flattener::new(&fetcher)
            .flatten(&refs(&["", "   ", "https://s.myshopify.com/1.xml"]))
            .await
            .unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_nested_index_and_garbage_contribute_nothing() {
        let fetcher = StaticFetcher::default()
            .with(
                "https://s.myshopify.com/nested.xml",
                "<sitemapindex><sitemap><loc>https://s.myshopify.com/deeper.xml</loc></sitemap></sitemapindex>",
            )
            .with("https://s.myshopify.com/deeper.xml", &urlset(&["https://s.myshopify.com/deep"]))
            .with("https://s.myshopify.com/blank.xml", "   ")
            .with("https://s.myshopify.com/ok.xml", &urlset(&["https://s.myshopify.com/ok"]));

        let entries = Flattener::new(&fetcher)
            .flatten(&refs(&[
                "https://s.myshopify.com/nested.xml",
                "https://s.myshopify.com/blank.xml",
                "https://s.myshopify.com/ok.xml",
            ]))
            .await
            .unwrap();

        assert_eq!(locations(&entries), vec!["https://s.myshopify.com/ok"]);
        assert_eq!(fetcher.calls(), 3);
    }

    #[tokio::test]
    async fn test_all_children_failing_is_empty_ok() {
        let fetcher = StaticFetcher::default();
        let entries = Flattener::new(&fetcher)
            .flatten(&refs(&["https://s.myshopify.com/1.xml", "https://s.myshopify.com/2.xml"]))
            .await
            .unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_ref_cap_checked_before_fetching() {
        let fetcher = StaticFetcher::default();
        let result = Flattener::new(&fetcher)
            .max_refs(2)
            .flatten(&refs(&["https://s.myshopify.com/1.xml", "https://s.myshopify.com/2.xml", "https://s.myshopify.com/3.xml"]))
            .await;

        assert_eq!(result, Err(FlattenError::TooManyRefs { count: 3, limit: 2 }));
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_stops_flattening() {
        let fetcher = StaticFetcher::default()
            .with_delay(Duration::from_secs(10))
            .with("https://s.myshopify.com/1.xml", &urlset(&["https://s.myshopify.com/a"]))
            .with("https://s.myshopify.com/2.xml", &urlset(&["https://s.myshopify.com/b"]));

        let deadline = Instant::now() + Duration::from_secs(15);
        let result = Flattener::new(&fetcher)
            .deadline(deadline)
            .flatten(&refs(&["https://s.myshopify.com/1.xml", "https://s.myshopify.com/2.xml"]))
            .await;

        assert_eq!(
            result,
            Err(FlattenError::DeadlineExceeded {
                processed: 1,
                total: 2
            })
        );
    }
}
