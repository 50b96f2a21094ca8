// src/feed.rs

//! Remote workload package feed
//!
//! This module provides the capability seam to the distribution channel:
//! - Fetching the latest advertised manifest versions
//! - Downloading manifest packages with atomic on-disk placement
//! - Verifying package digests when the feed publishes them
//!
//! The wire protocol is deliberately thin: the feed is an opaque byte
//! source keyed by `(manifest id, version)`, plus one JSON index of the
//! latest versions (`manifests.json`).

use crate::error::{Error, Result};
use crate::manifest::ManifestId;
use crate::version::ManifestVersion;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default timeout for HTTP requests (30 seconds)
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum retry attempts for feed metadata fetches
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds
const RETRY_DELAY_MS: u64 = 1000;

/// The latest version the feed advertises for one manifest
#[derive(Debug, Clone)]
pub struct AdvertisedManifest {
    pub id: ManifestId,
    pub version: ManifestVersion,
}

/// Remote source of workload manifest packages
///
/// Production code talks to [`HttpPackageFeed`]; tests substitute
/// [`InMemoryPackageFeed`].
pub trait PackageFeed: Send + Sync {
    /// Fetch the latest advertised version per manifest
    ///
    /// Preview (pre-release) versions are excluded unless
    /// `include_preview` is set.
    fn latest_versions(&self, include_preview: bool) -> Result<Vec<AdvertisedManifest>>;

    /// Download the package for `(id, version)` to `dest`
    ///
    /// A single attempt; retry policy belongs to the caller. The file at
    /// `dest` is either complete or absent, never partial.
    fn download_package(
        &self,
        id: &ManifestId,
        version: &ManifestVersion,
        dest: &Path,
    ) -> Result<()>;
}

/// Feed index format (`manifests.json`)
#[derive(Debug, Deserialize)]
struct FeedIndex {
    manifests: Vec<FeedEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeedEntry {
    id: String,
    latest_version: String,
    #[serde(default)]
    feature_band: Option<String>,
}

/// HTTP feed client with retry support for metadata fetches
pub struct HttpPackageFeed {
    client: Client,
    base_url: String,
    max_retries: u32,
}

impl HttpPackageFeed {
    /// Create a feed client with the default request timeout
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, HTTP_TIMEOUT)
    }

    /// Create a feed client with a caller-supplied request deadline
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::InitError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_retries: MAX_RETRIES,
        })
    }

    fn package_url(&self, id: &ManifestId, version: &ManifestVersion) -> String {
        format!("{}/packages/{}/{}.tar.gz", self.base_url, id, version)
    }

    /// Fetch the optional `.sha256` sidecar for a package URL
    fn fetch_digest(&self, package_url: &str) -> Result<Option<String>> {
        let digest_url = format!("{}.sha256", package_url);
        let response = self
            .client
            .get(&digest_url)
            .send()
            .map_err(|e| Error::FeedUnavailable(format!("{}: {}", digest_url, e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Error::FeedUnavailable(format!(
                "HTTP {} from {}",
                response.status(),
                digest_url
            )));
        }

        let digest = response
            .text()
            .map_err(|e| Error::FeedUnavailable(format!("Failed to read digest: {}", e)))?;
        Ok(Some(digest.trim().to_string()))
    }
}

impl PackageFeed for HttpPackageFeed {
    fn latest_versions(&self, include_preview: bool) -> Result<Vec<AdvertisedManifest>> {
        let index_url = format!("{}/manifests.json", self.base_url);
        info!("Fetching advertised manifest versions from {}", index_url);

        let mut attempt = 0;
        let index: FeedIndex = loop {
            attempt += 1;
            match self.client.get(&index_url).send() {
                Ok(response) => {
                    if !response.status().is_success() {
                        return Err(Error::FeedUnavailable(format!(
                            "HTTP {} from {}",
                            response.status(),
                            index_url
                        )));
                    }

                    break response.json().map_err(|e| {
                        Error::FeedUnavailable(format!("Failed to parse feed index: {}", e))
                    })?;
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(Error::FeedUnavailable(format!(
                            "Failed to fetch feed index after {} attempts: {}",
                            attempt, e
                        )));
                    }
                    warn!("Feed index fetch attempt {} failed: {}, retrying...", attempt, e);
                    std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64));
                }
            }
        };

        let mut advertised = Vec::with_capacity(index.manifests.len());
        for entry in index.manifests {
            let version = ManifestVersion::parse(&entry.latest_version, entry.feature_band.as_deref())
                .map_err(|e| Error::FeedUnavailable(format!("Bad feed entry '{}': {}", entry.id, e)))?;

            if version.is_preview() && !include_preview {
                debug!("Skipping preview version {} of {}", version, entry.id);
                continue;
            }

            advertised.push(AdvertisedManifest {
                id: ManifestId::new(entry.id),
                version,
            });
        }

        info!("Feed advertises {} manifests", advertised.len());
        Ok(advertised)
    }

    fn download_package(
        &self,
        id: &ManifestId,
        version: &ManifestVersion,
        dest: &Path,
    ) -> Result<()> {
        let url = self.package_url(id, version);
        info!("Downloading {} to {}", url, dest.display());

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| Error::FeedUnavailable(format!("{}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(Error::FeedUnavailable(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        // Write to a temporary sibling first, then rename into place so a
        // partially-written package is never observable at `dest`.
        let temp_path = dest.with_extension("tmp");
        let mut file = File::create(&temp_path)?;
        if let Err(e) = io::copy(&mut response, &mut file) {
            let _ = fs::remove_file(&temp_path);
            return Err(Error::Io(e));
        }
        drop(file);

        if let Some(expected) = self.fetch_digest(&url)? {
            if let Err(e) = verify_checksum(&temp_path, &expected) {
                let _ = fs::remove_file(&temp_path);
                return Err(e);
            }
        }

        fs::rename(&temp_path, dest)?;
        debug!("Downloaded {} {}", id, version);
        Ok(())
    }
}

/// Verify a file's SHA-256 digest matches the expected hex string
pub fn verify_checksum(path: &Path, expected: &str) -> Result<()> {
    use sha2::{Digest, Sha256};

    debug!("Verifying checksum for {}", path.display());

    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;

    let actual = format!("{:x}", hasher.finalize());
    if actual != expected {
        return Err(Error::ChecksumMismatch {
            expected: expected.to_string(),
            actual,
        });
    }

    Ok(())
}

/// In-process feed backed by maps, for tests and offline development
///
/// Supports failure injection per manifest id and counts index fetches so
/// tests can assert single-flight/staleness behavior.
#[derive(Default)]
pub struct InMemoryPackageFeed {
    advertised: Vec<AdvertisedManifest>,
    packages: HashMap<(String, String), Vec<u8>>,
    failing_downloads: HashSet<String>,
    unavailable: AtomicBool,
    fetch_calls: AtomicUsize,
}

impl InMemoryPackageFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advertise `version` as the latest for `id`
    pub fn advertise(&mut self, id: &str, version: ManifestVersion) {
        self.advertised.push(AdvertisedManifest {
            id: ManifestId::new(id),
            version,
        });
    }

    /// Register package bytes for `(id, version)`
    pub fn add_package(&mut self, id: &str, version: &ManifestVersion, bytes: Vec<u8>) {
        self.packages
            .insert((id.to_string(), version.to_string()), bytes);
    }

    /// Make every download of `id` fail
    pub fn fail_downloads_for(&mut self, id: &str) {
        self.failing_downloads.insert(id.to_string());
    }

    /// Toggle whether index fetches fail with `FeedUnavailable`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of index fetches served (or refused) so far
    pub fn fetch_count(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

impl PackageFeed for InMemoryPackageFeed {
    fn latest_versions(&self, include_preview: bool) -> Result<Vec<AdvertisedManifest>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);

        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::FeedUnavailable("simulated outage".to_string()));
        }

        Ok(self
            .advertised
            .iter()
            .filter(|a| include_preview || !a.version.is_preview())
            .cloned()
            .collect())
    }

    fn download_package(
        &self,
        id: &ManifestId,
        version: &ManifestVersion,
        dest: &Path,
    ) -> Result<()> {
        if self.failing_downloads.contains(id.as_str()) {
            return Err(Error::FeedUnavailable(format!(
                "simulated download failure for {}",
                id
            )));
        }

        let bytes = self
            .packages
            .get(&(id.to_string(), version.to_string()))
            .ok_or_else(|| {
                Error::FeedUnavailable(format!("no package for {} {}", id, version))
            })?;

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(dest, bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_feed_filters_previews() {
        let mut feed = InMemoryPackageFeed::new();
        feed.advertise("sdk.a", ManifestVersion::parse("1.0.0", None).unwrap());
        feed.advertise(
            "sdk.b",
            ManifestVersion::parse("2.0.0-preview.1", None).unwrap(),
        );

        let stable = feed.latest_versions(false).unwrap();
        assert_eq!(stable.len(), 1);
        assert_eq!(stable[0].id.as_str(), "sdk.a");

        let all = feed.latest_versions(true).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(feed.fetch_count(), 2);
    }

    #[test]
    fn test_in_memory_feed_download() {
        let mut feed = InMemoryPackageFeed::new();
        let version = ManifestVersion::parse("1.0.0", None).unwrap();
        feed.add_package("sdk.a", &version, b"archive-bytes".to_vec());

        let temp = tempfile::tempdir().unwrap();
        let dest = temp.path().join("sdk.a.tar.gz");
        feed.download_package(&ManifestId::new("sdk.a"), &version, &dest)
            .unwrap();

        assert_eq!(fs::read(&dest).unwrap(), b"archive-bytes");
    }

    #[test]
    fn test_in_memory_feed_unavailable() {
        let feed = InMemoryPackageFeed::new();
        feed.set_unavailable(true);
        assert!(matches!(
            feed.latest_versions(false),
            Err(Error::FeedUnavailable(_))
        ));
    }

    #[test]
    fn test_http_feed_accepts_caller_deadline() {
        HttpPackageFeed::new("http://localhost/feed").unwrap();
        HttpPackageFeed::with_timeout("http://localhost/feed/", Duration::from_secs(5)).unwrap();
    }

    #[test]
    fn test_verify_checksum() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("data");
        fs::write(&path, b"hello").unwrap();

        // sha256("hello")
        let expected = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";
        verify_checksum(&path, expected).unwrap();

        let result = verify_checksum(&path, "deadbeef");
        assert!(matches!(result, Err(Error::ChecksumMismatch { .. })));
    }
}
