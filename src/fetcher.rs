// src/fetcher.rs

//! Package fetcher: downloads manifest packages for an update plan
//!
//! Downloads run on a bounded worker pool rather than one thread per
//! delta, and each package gets its own retry budget. One package failing
//! never cancels or discards its siblings; the report carries both the
//! succeeded and failed identifiers so the caller can retry or abort.

use crate::error::{Error, Result};
use crate::feed::PackageFeed;
use crate::manifest::ManifestId;
use crate::updater::ManifestUpdateDelta;
use crate::version::ManifestVersion;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Size of the download worker pool
pub const DOWNLOAD_WORKERS: usize = 4;

/// Attempts per package before recording a failure
const MAX_ATTEMPTS: u32 = 3;

/// Retry delay in milliseconds
const RETRY_DELAY_MS: u64 = 500;

/// A downloaded manifest package on disk
#[derive(Debug, Clone)]
pub struct PackageLocation {
    pub id: ManifestId,
    pub version: ManifestVersion,
    pub path: PathBuf,
}

/// Outcome of one download batch, keyed by manifest id
#[derive(Debug)]
pub struct DownloadReport {
    /// Successfully downloaded packages, sorted by manifest id
    pub downloaded: Vec<PackageLocation>,
    /// Per-manifest failures after retries were exhausted, sorted by id
    pub failed: Vec<(ManifestId, Error)>,
}

impl DownloadReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Download one package per delta into `download_path`
///
/// Completion order across manifests is unspecified; both result lists are
/// sorted by manifest id so concurrency never leaks into the outcome.
pub fn download_packages(
    feed: &dyn PackageFeed,
    deltas: &[ManifestUpdateDelta],
    download_path: &Path,
) -> Result<DownloadReport> {
    fs::create_dir_all(download_path)?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(DOWNLOAD_WORKERS)
        .build()
        .map_err(|e| Error::InitError(format!("Failed to create download pool: {}", e)))?;

    let results: Vec<std::result::Result<PackageLocation, (ManifestId, Error)>> =
        pool.install(|| {
            deltas
                .par_iter()
                .map(|delta| download_one(feed, delta, download_path))
                .collect()
        });

    let mut downloaded = Vec::new();
    let mut failed = Vec::new();
    for result in results {
        match result {
            Ok(location) => downloaded.push(location),
            Err(failure) => failed.push(failure),
        }
    }
    downloaded.sort_by(|a, b| a.id.cmp(&b.id));
    failed.sort_by(|a, b| a.0.cmp(&b.0));

    info!(
        "Downloaded {} of {} manifest packages",
        downloaded.len(),
        deltas.len()
    );
    Ok(DownloadReport { downloaded, failed })
}

fn download_one(
    feed: &dyn PackageFeed,
    delta: &ManifestUpdateDelta,
    download_path: &Path,
) -> std::result::Result<PackageLocation, (ManifestId, Error)> {
    let dest = download_path.join(format!("{}-{}.tar.gz", delta.id, delta.to));

    let mut attempt = 0;
    loop {
        attempt += 1;
        match feed.download_package(&delta.id, &delta.to, &dest) {
            Ok(()) => {
                return Ok(PackageLocation {
                    id: delta.id.clone(),
                    version: delta.to.clone(),
                    path: dest,
                });
            }
            Err(e) => {
                if attempt >= MAX_ATTEMPTS {
                    return Err((
                        delta.id.clone(),
                        Error::PackageDownload {
                            manifest_id: delta.id.to_string(),
                            reason: format!("{} attempts failed, last: {}", attempt, e),
                        },
                    ));
                }
                warn!(
                    "Download attempt {} for {} failed: {}, retrying...",
                    attempt, delta.id, e
                );
                std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64));
            }
        }
    }
}
