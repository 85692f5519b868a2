//! Configuration module for Sitemap-Relay
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use sitemap_relay::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("relay.toml")).unwrap();
//! println!("Refreshing every {:?}", config.schedule.frequency.period());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    CacheConfig, Config, Frequency, LimitsConfig, OutputConfig, ScheduleConfig, SourceConfig,
    MAX_MANUAL_UPDATE_INTERVAL_SECS, MAX_UPDATE_DEADLINE_SECS,
};

// Re-export parser functions
pub use parser::{load_config, parse_config};
