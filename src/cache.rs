// src/cache.rs

//! Advertising cache: persisted record of the latest remotely-known
//! manifest versions
//!
//! The cache is the only mutable shared state in the engine. It lives in a
//! small SQLite store, is written exclusively by [`AdvertisingCache::refresh`],
//! and is read-only to everything else. A refresh within the staleness
//! window is a no-op unless forced, and concurrent refreshers serialize on
//! an internal gate so one network fetch serves all waiters.

use crate::error::{Error, Result};
use crate::feed::PackageFeed;
use crate::manifest::ManifestId;
use crate::version::ManifestVersion;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info};

/// Default staleness window: entries older than this are not trusted for
/// update calculation without a refresh
pub const DEFAULT_STALENESS: Duration = Duration::from_secs(24 * 60 * 60);

/// Persisted advertising cache keyed by manifest id
pub struct AdvertisingCache {
    db_path: PathBuf,
    staleness: Duration,
    // Single-flight gate: at most one refresh talks to the feed at a time.
    refresh_gate: Mutex<()>,
}

impl AdvertisingCache {
    /// Open (or create) the cache store at the given path
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::InitError(format!("Failed to create cache directory: {}", e))
            })?;
        }

        let cache = Self {
            db_path,
            staleness: DEFAULT_STALENESS,
            refresh_gate: Mutex::new(()),
        };

        // Schema creation is idempotent; opening an existing store is safe.
        let conn = cache.connection()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS advertised_manifests (
                manifest_id TEXT PRIMARY KEY,
                latest_version TEXT NOT NULL,
                feature_band TEXT,
                fetched_at TEXT NOT NULL
            )",
            [],
        )?;

        Ok(cache)
    }

    /// Override the staleness window (tests use very short windows)
    pub fn with_staleness(mut self, staleness: Duration) -> Self {
        self.staleness = staleness;
        self
    }

    fn connection(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA busy_timeout = 5000;
            ",
        )?;
        Ok(conn)
    }

    /// Refresh advertised versions from the feed
    ///
    /// No network activity occurs when the cache is fresh and `force` is
    /// false. On feed failure, existing entries are left untouched:
    /// stale-but-present beats empty.
    pub fn refresh(&self, feed: &dyn PackageFeed, include_preview: bool, force: bool) -> Result<()> {
        if !force && self.is_fresh()? {
            debug!("Advertising cache is fresh, skipping refresh");
            return Ok(());
        }

        // A poisoned gate only means an earlier refresher panicked; the
        // store itself is still consistent.
        let _guard = self
            .refresh_gate
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        // Another caller may have completed a refresh while we waited on
        // the gate; observe its result instead of fetching again.
        if !force && self.is_fresh()? {
            debug!("Advertising cache was refreshed while waiting");
            return Ok(());
        }

        let advertised = feed.latest_versions(include_preview)?;
        let fetched_at = Utc::now().to_rfc3339();

        let mut conn = self.connection()?;
        let tx = conn.transaction()?;
        for entry in &advertised {
            tx.execute(
                "INSERT INTO advertised_manifests (manifest_id, latest_version, feature_band, fetched_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(manifest_id) DO UPDATE SET
                     latest_version = excluded.latest_version,
                     feature_band = excluded.feature_band,
                     fetched_at = excluded.fetched_at",
                params![
                    entry.id.as_str(),
                    entry.version.to_string(),
                    entry.version.feature_band(),
                    fetched_at,
                ],
            )?;
        }
        tx.commit()?;

        info!("Advertising cache refreshed: {} manifests", advertised.len());
        Ok(())
    }

    /// The cached latest version for a manifest, or `None` if never advertised
    pub fn get(&self, id: &ManifestId) -> Result<Option<ManifestVersion>> {
        let conn = self.connection()?;
        let row: Option<(String, Option<String>)> = conn
            .query_row(
                "SELECT latest_version, feature_band FROM advertised_manifests
                 WHERE manifest_id = ?1",
                params![id.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            None => Ok(None),
            Some((version, band)) => {
                Ok(Some(ManifestVersion::parse(&version, band.as_deref())?))
            }
        }
    }

    /// Timestamp of the most recent completed refresh, if any
    pub fn last_refreshed(&self) -> Result<Option<DateTime<Utc>>> {
        let conn = self.connection()?;
        let newest: Option<String> = conn.query_row(
            "SELECT MAX(fetched_at) FROM advertised_manifests",
            [],
            |row| row.get(0),
        )?;

        match newest {
            None => Ok(None),
            Some(ts) => {
                let parsed = DateTime::parse_from_rfc3339(&ts).map_err(|e| {
                    Error::InitError(format!("Invalid cache timestamp '{}': {}", ts, e))
                })?;
                Ok(Some(parsed.with_timezone(&Utc)))
            }
        }
    }

    /// Whether the cache was refreshed within the staleness window
    pub fn is_fresh(&self) -> Result<bool> {
        match self.last_refreshed()? {
            None => Ok(false),
            Some(refreshed_at) => {
                let age = Utc::now().signed_duration_since(refreshed_at);
                Ok(age.to_std().map(|age| age <= self.staleness).unwrap_or(true))
            }
        }
    }

    /// Path of the backing store
    pub fn path(&self) -> &Path {
        &self.db_path
    }
}
