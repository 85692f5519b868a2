//! Update orchestration
//!
//! This module drives one refresh of the cached sitemap:
//! - Validating the configured domain
//! - Fetching and parsing the root document
//! - Flattening a sitemap index when configured to
//! - Writing the result to the cache in a single step
//!
//! Any failure leaves the cache exactly as it was.

use crate::config::Config;
use crate::diagnostics::{Diagnostics, NoopDiagnostics, UpdateEvent};
use crate::sitemap::fetcher::{Fetch, FetchError};
use crate::sitemap::flattener::{FlattenError, Flattener};
use crate::sitemap::parser::{parse_with_hint, sniff_index, ParseError, ParsedSitemap};
use crate::sitemap::types::{PayloadKind, SitemapPayload};
use crate::storage::{CacheError, SitemapCache};
use crate::url::DomainValidator;
use crate::DomainError;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tokio::time::Instant;

/// Reasons an update did not produce a new cache entry
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("No source domain configured")]
    NoDomain,

    #[error("Invalid source domain: {0}")]
    InvalidDomain(DomainError),

    #[error("Failed to fetch sitemap: {0}")]
    FetchFailed(FetchError),

    #[error("Sitemap response was empty")]
    EmptyResponse,

    #[error("Failed to parse sitemap: {0}")]
    Parse(#[from] ParseError),

    #[error("No entries could be collected from any child sitemap")]
    FlattenFailed,

    #[error("Flattening stopped: {0}")]
    Flatten(#[from] FlattenError),

    #[error("Sitemap contains no entries")]
    NoData,

    #[error("Update did not finish before its deadline")]
    DeadlineExceeded,

    #[error("Another update is already running")]
    InProgress,

    #[error("Failed to write cache: {0}")]
    Cache(#[from] CacheError),
}

/// What a successful update stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub kind: PayloadKind,
    pub count: usize,
    pub expires_at: DateTime<Utc>,

    /// Non-fatal parser diagnostics from the root document
    pub warnings: Vec<String>,
}

/// Fetches, classifies and caches the configured sitemap
pub struct Updater<F: Fetch> {
    fetcher: F,
    validator: DomainValidator,
    diagnostics: Arc<dyn Diagnostics>,
}

impl<F: Fetch> Updater<F> {
    pub fn new(fetcher: F, validator: DomainValidator) -> Self {
        Self {
            fetcher,
            validator,
            diagnostics: Arc::new(NoopDiagnostics),
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn Diagnostics>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Runs a full update and writes the result to `cache`
    ///
    /// The cache is only touched once the new payload is complete.
    pub async fn update<C: SitemapCache + ?Sized>(
        &self,
        config: &Config,
        cache: &mut C,
    ) -> Result<UpdateOutcome, UpdateError> {
        let refreshed = self.refresh(config).await?;
        self.store(cache, config, refreshed)
    }

    /// Builds the payload to cache without touching any cache
    ///
    /// The whole run, flattening included, is bounded by
    /// `limits.update-deadline-secs`.
    pub async fn refresh(&self, config: &Config) -> Result<ParsedSitemap, UpdateError> {
        let deadline = Instant::now() + config.limits.update_deadline();

        let result = match tokio::time::timeout_at(deadline, self.build(config, deadline)).await {
            Ok(result) => result,
            Err(_) => Err(UpdateError::DeadlineExceeded),
        };

        if let Err(e) = &result {
            self.diagnostics.event(&UpdateEvent::UpdateFailed {
                reason: e.to_string(),
            });
        }

        result
    }

    /// Writes a refreshed payload with the configured TTL and fingerprint
    pub fn store<C: SitemapCache + ?Sized>(
        &self,
        cache: &mut C,
        config: &Config,
        refreshed: ParsedSitemap,
    ) -> Result<UpdateOutcome, UpdateError> {
        let kind = refreshed.payload.kind();
        let count = refreshed.payload.len();

        let expires_at = cache
            .put(
                &refreshed.payload,
                &config.fingerprint(),
                config.schedule.frequency.ttl(),
            )
            .map_err(|e| {
                self.diagnostics.event(&UpdateEvent::UpdateFailed {
                    reason: e.to_string(),
                });
                UpdateError::Cache(e)
            })?;

        self.diagnostics
            .event(&UpdateEvent::CacheWritten { kind, count });

        Ok(UpdateOutcome {
            kind,
            count,
            expires_at,
            warnings: refreshed.warnings,
        })
    }

    async fn build(&self, config: &Config, deadline: Instant) -> Result<ParsedSitemap, UpdateError> {
        let domain = config.source.domain.trim();
        if domain.is_empty() {
            return Err(UpdateError::NoDomain);
        }

        let host = self
            .validator
            .validate(domain)
            .await
            .map_err(UpdateError::InvalidDomain)?;

        let url = format!(
            "https://{}/{}",
            host,
            config.source.remote_path.trim_start_matches('/')
        );
        self.diagnostics
            .event(&UpdateEvent::FetchStarted { url: url.clone() });

        let body = self
            .fetcher
            .fetch(&url)
            .await
            .map_err(UpdateError::FetchFailed)?;

        if body.is_empty() {
            return Err(UpdateError::EmptyResponse);
        }

        let parsed = parse_with_hint(&body, sniff_index(&body))?;
        for warning in &parsed.warnings {
            tracing::debug!("Sitemap parser: {}", warning);
        }
        self.diagnostics.event(&UpdateEvent::Classified {
            kind: parsed.payload.kind(),
            count: parsed.payload.len(),
        });

        let payload = match parsed.payload {
            SitemapPayload::Index(refs) if config.source.flatten => {
                let entries = Flattener::new(&self.fetcher)
                    .max_refs(config.limits.max_child_sitemaps)
                    .deadline(deadline)
                    .diagnostics(self.diagnostics.as_ref())
                    .flatten(&refs)
                    .await?;

                if entries.is_empty() {
                    return Err(UpdateError::FlattenFailed);
                }
                SitemapPayload::Flat(entries)
            }
            other => other,
        };

        if payload.is_empty() {
            return Err(UpdateError::NoData);
        }

        Ok(ParsedSitemap {
            payload,
            warnings: parsed.warnings,
        })
    }
}
