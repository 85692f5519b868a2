use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::time::Duration;

/// Main configuration structure for Sitemap-Relay
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
}

impl Config {
    /// Hex SHA-256 over the fields that identify the remote source
    ///
    /// A cached payload is only served while the fingerprint it was stored
    /// under matches the current configuration.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.source.domain.trim().to_lowercase().as_bytes());
        hasher.update(b"\n");
        hasher.update(self.source.remote_path.as_bytes());
        hasher.update(b"\n");
        hasher.update(if self.source.flatten { b"flat" } else { b"keep" });
        hex::encode(hasher.finalize())
    }

    /// Public URL of the rendered sitemap (site root + output filename)
    pub fn sitemap_url(&self) -> String {
        format!(
            "{}/{}",
            self.output.site_url.trim_end_matches('/'),
            self.output.filename
        )
    }
}

/// Where the remote sitemap lives and how it is shaped on update
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Bare hostname of the remote store (no scheme, no path)
    pub domain: String,

    /// Path appended to the domain, without a leading slash
    #[serde(rename = "remote-path")]
    pub remote_path: String,

    /// Expand a sitemap index into one flat urlset at update time
    pub flatten: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            domain: String::new(),
            remote_path: "sitemap.xml".to_string(),
            flatten: false,
        }
    }
}

/// Refresh schedule configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub frequency: Frequency,
}

/// Supported refresh frequencies; each doubles as the cache TTL
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Hourly,
    #[serde(rename = "twicedaily")]
    TwiceDaily,
    #[default]
    Daily,
    Weekly,
}

impl Frequency {
    /// Length of one refresh period
    pub fn period(&self) -> Duration {
        match self {
            Self::Hourly => Duration::from_secs(60 * 60),
            Self::TwiceDaily => Duration::from_secs(12 * 60 * 60),
            Self::Daily => Duration::from_secs(24 * 60 * 60),
            Self::Weekly => Duration::from_secs(7 * 24 * 60 * 60),
        }
    }

    /// Cache TTL for payloads stored under this schedule
    pub fn ttl(&self) -> chrono::Duration {
        match self {
            Self::Hourly => chrono::Duration::hours(1),
            Self::TwiceDaily => chrono::Duration::hours(12),
            Self::Daily => chrono::Duration::hours(24),
            Self::Weekly => chrono::Duration::days(7),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// File name the rendered sitemap is published under
    pub filename: String,

    /// Directory the rendered file is written to
    pub directory: String,

    /// Root URL of the local site, used for the fallback document
    #[serde(rename = "site-url")]
    pub site_url: String,

    /// Maximum number of `<url>` elements per rendered page
    #[serde(rename = "max-urls-per-page")]
    pub max_urls_per_page: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            filename: "store.xml".to_string(),
            directory: ".".to_string(),
            site_url: String::new(),
            max_urls_per_page: 2000,
        }
    }
}

/// Cache store configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Path to the SQLite file backing the cache
    pub path: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: "sitemap-cache.db".to_string(),
        }
    }
}

/// Upper bound on `update-deadline-secs` (one day)
pub const MAX_UPDATE_DEADLINE_SECS: u64 = 24 * 60 * 60;

/// Upper bound on `manual-update-interval-secs` (one day)
pub const MAX_MANUAL_UPDATE_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// Bounds on update work
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Largest sitemap index that will be flattened
    #[serde(rename = "max-child-sitemaps")]
    pub max_child_sitemaps: usize,

    /// Wall-clock budget for one complete update
    #[serde(rename = "update-deadline-secs")]
    pub update_deadline_secs: u64,

    /// Minimum spacing between manual update triggers
    #[serde(rename = "manual-update-interval-secs")]
    pub manual_update_interval_secs: u64,
}

impl LimitsConfig {
    /// Deadline for one update, clamped to [`MAX_UPDATE_DEADLINE_SECS`]
    pub fn update_deadline(&self) -> Duration {
        Duration::from_secs(self.update_deadline_secs.min(MAX_UPDATE_DEADLINE_SECS))
    }

    /// Manual trigger spacing, clamped to [`MAX_MANUAL_UPDATE_INTERVAL_SECS`]
    pub fn manual_update_interval(&self) -> chrono::Duration {
        let secs = self
            .manual_update_interval_secs
            .min(MAX_MANUAL_UPDATE_INTERVAL_SECS);
        chrono::Duration::seconds(i64::try_from(secs).unwrap_or(0))
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_child_sitemaps: 500,
            update_deadline_secs: 300,
            manual_update_interval_secs: 30,
        }
    }
}
