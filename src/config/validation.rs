use crate::config::types::{
    CacheConfig, Config, LimitsConfig, OutputConfig, SourceConfig,
    MAX_MANUAL_UPDATE_INTERVAL_SECS, MAX_UPDATE_DEADLINE_SECS,
};
use crate::url::check_syntax;
use crate::ConfigError;
use url::Url;

/// Sitemap protocol ceiling on URLs per document
const PROTOCOL_MAX_URLS: usize = 50_000;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_source_config(&config.source)?;
    validate_output_config(&config.output)?;
    validate_cache_config(&config.cache)?;
    validate_limits_config(&config.limits)?;
    Ok(())
}

/// Validates the remote source settings
///
/// An empty domain is allowed here; updates report it as a missing domain.
/// Only the syntax is checked, DNS is consulted when an update runs.
fn validate_source_config(config: &SourceConfig) -> Result<(), ConfigError> {
    if !config.domain.trim().is_empty() {
        check_syntax(&config.domain)
            .map_err(|e| ConfigError::Validation(format!("Invalid source domain: {}", e)))?;
    }

    if config.remote_path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "remote-path cannot be empty".to_string(),
        ));
    }

    if config.remote_path.starts_with('/') {
        return Err(ConfigError::Validation(format!(
            "remote-path must not start with '/', got '{}'",
            config.remote_path
        )));
    }

    if config
        .remote_path
        .chars()
        .any(|c| c.is_whitespace() || c == '#')
    {
        return Err(ConfigError::Validation(format!(
            "remote-path contains invalid characters: '{}'",
            config.remote_path
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.filename.is_empty() {
        return Err(ConfigError::Validation(
            "output filename cannot be empty".to_string(),
        ));
    }

    if config
        .filename
        .chars()
        .any(|c| matches!(c, '/' | '\\') || c.is_whitespace())
    {
        return Err(ConfigError::Validation(format!(
            "output filename must be a plain file name, got '{}'",
            config.filename
        )));
    }

    if config.directory.is_empty() {
        return Err(ConfigError::Validation(
            "output directory cannot be empty".to_string(),
        ));
    }

    let site = Url::parse(&config.site_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid site-url: {}", e)))?;

    if site.scheme() != "http" && site.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "site-url must use http or https, got '{}'",
            config.site_url
        )));
    }

    if config.max_urls_per_page < 1 || config.max_urls_per_page > PROTOCOL_MAX_URLS {
        return Err(ConfigError::Validation(format!(
            "max-urls-per-page must be between 1 and {}, got {}",
            PROTOCOL_MAX_URLS, config.max_urls_per_page
        )));
    }

    Ok(())
}

fn validate_cache_config(config: &CacheConfig) -> Result<(), ConfigError> {
    if config.path.is_empty() {
        return Err(ConfigError::Validation(
            "cache path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_limits_config(config: &LimitsConfig) -> Result<(), ConfigError> {
    if config.max_child_sitemaps < 1 {
        return Err(ConfigError::Validation(format!(
            "max-child-sitemaps must be >= 1, got {}",
            config.max_child_sitemaps
        )));
    }

    if config.update_deadline_secs < 1 || config.update_deadline_secs > MAX_UPDATE_DEADLINE_SECS {
        return Err(ConfigError::Validation(format!(
            "update-deadline-secs must be between 1 and {}, got {}",
            MAX_UPDATE_DEADLINE_SECS, config.update_deadline_secs
        )));
    }

    if config.manual_update_interval_secs > MAX_MANUAL_UPDATE_INTERVAL_SECS {
        return Err(ConfigError::Validation(format!(
            "manual-update-interval-secs must be at most {}, got {}",
            MAX_MANUAL_UPDATE_INTERVAL_SECS, config.manual_update_interval_secs
        )));
    }

    Ok(())
}
