//! SQLite cache implementation
//!
//! This module provides a SQLite-backed implementation of the SitemapCache
//! trait. The payload is stored as one JSON value in a single-row table.

use crate::sitemap::SitemapPayload;
use crate::storage::schema::{initialize_schema, LAST_MANUAL_UPDATE_KEY};
use crate::storage::traits::{CacheError, CacheResult, SitemapCache};
use crate::storage::CachedSitemap;
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// SQLite cache backend
pub struct SqliteCache {
    conn: Connection,
}

impl SqliteCache {
    /// Opens or creates the cache database at `path`
    pub fn new(path: &Path) -> CacheResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> CacheResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn parse_timestamp(raw: &str) -> CacheResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CacheError::Corrupt(format!("bad timestamp {:?}: {}", raw, e)))
}

impl SitemapCache for SqliteCache {
    fn get_at(&mut self, now: DateTime<Utc>) -> CacheResult<Option<CachedSitemap>> {
        let row = self
            .conn
            .query_row(
                "SELECT payload, fingerprint, stored_at, expires_at FROM sitemap_cache WHERE slot = 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;

        let Some((payload, fingerprint, stored_at, expires_at)) = row else {
            return Ok(None);
        };

        let expires_at = parse_timestamp(&expires_at)?;
        if expires_at <= now {
            tracing::debug!("Cached sitemap expired at {}", expires_at);
            self.clear()?;
            return Ok(None);
        }

        Ok(Some(CachedSitemap {
            payload: serde_json::from_str(&payload)?,
            fingerprint,
            stored_at: parse_timestamp(&stored_at)?,
            expires_at,
        }))
    }

    fn put_at(
        &mut self,
        payload: &SitemapPayload,
        fingerprint: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> CacheResult<DateTime<Utc>> {
        let expires_at = now + ttl;
        let json = serde_json::to_string(payload)?;

        self.conn.execute(
            "INSERT OR REPLACE INTO sitemap_cache (slot, payload, fingerprint, stored_at, expires_at)
             VALUES (1, ?1, ?2, ?3, ?4)",
            params![json, fingerprint, now.to_rfc3339(), expires_at.to_rfc3339()],
        )?;

        Ok(expires_at)
    }

    fn clear(&mut self) -> CacheResult<()> {
        self.conn.execute("DELETE FROM sitemap_cache", [])?;
        Ok(())
    }

    fn last_manual_update(&self) -> CacheResult<Option<DateTime<Utc>>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM relay_meta WHERE key = ?1",
                params![LAST_MANUAL_UPDATE_KEY],
                |row| row.get(0),
            )
            .optional()?;

        raw.as_deref().map(parse_timestamp).transpose()
    }

    fn record_manual_update(&mut self, at: DateTime<Utc>) -> CacheResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO relay_meta (key, value) VALUES (?1, ?2)",
            params![LAST_MANUAL_UPDATE_KEY, at.to_rfc3339()],
        )?;
        Ok(())
    }
}
