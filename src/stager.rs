// src/stager.rs

//! Package stager: extracts downloaded packages into isolated staging
//! directories
//!
//! Each package is unpacked into its own subdirectory of the temp root,
//! named after the manifest id, so an external installer can publish each
//! one atomically with a rename. A failed extraction removes only that
//! package's partial output; siblings and the temp root itself are never
//! touched, which keeps a crashed update diagnosable.

use crate::error::{Error, Result};
use crate::fetcher::PackageLocation;
use crate::manifest::ManifestId;
use crate::version::ManifestVersion;
use flate2::read::GzDecoder;
use rayon::prelude::*;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tar::Archive;
use tracing::{debug, info};

/// Size of the extraction worker pool
pub const EXTRACT_WORKERS: usize = 4;

/// A fully extracted manifest package awaiting installation
#[derive(Debug, Clone)]
pub struct StagedPackage {
    pub id: ManifestId,
    pub version: ManifestVersion,
    /// Directory owned by this update operation until handed to an installer
    pub path: PathBuf,
}

/// Outcome of one staging batch, keyed by manifest id
#[derive(Debug)]
pub struct StagingReport {
    /// Successfully staged packages, sorted by manifest id
    pub staged: Vec<StagedPackage>,
    /// Per-manifest extraction failures, sorted by id
    pub failed: Vec<(ManifestId, Error)>,
}

impl StagingReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Extract downloaded packages into per-manifest subdirectories of `temp_root`
///
/// Extractions run concurrently; each writes to a disjoint subdirectory so
/// there is no shared mutable state between them.
pub fn extract_to_temp(
    packages: &[PackageLocation],
    temp_root: &Path,
) -> Result<StagingReport> {
    fs::create_dir_all(temp_root)?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(EXTRACT_WORKERS)
        .build()
        .map_err(|e| Error::InitError(format!("Failed to create extraction pool: {}", e)))?;

    let results: Vec<std::result::Result<StagedPackage, (ManifestId, Error)>> =
        pool.install(|| {
            packages
                .par_iter()
                .map(|package| extract_one(package, temp_root))
                .collect()
        });

    let mut staged = Vec::new();
    let mut failed = Vec::new();
    for result in results {
        match result {
            Ok(package) => staged.push(package),
            Err(failure) => failed.push(failure),
        }
    }
    staged.sort_by(|a, b| a.id.cmp(&b.id));
    failed.sort_by(|a, b| a.0.cmp(&b.0));

    info!(
        "Staged {} of {} manifest packages under {}",
        staged.len(),
        packages.len(),
        temp_root.display()
    );
    Ok(StagingReport { staged, failed })
}

fn extract_one(
    package: &PackageLocation,
    temp_root: &Path,
) -> std::result::Result<StagedPackage, (ManifestId, Error)> {
    let staging_dir = temp_root.join(package.id.as_str());

    let result = (|| -> Result<()> {
        // A leftover directory from an earlier attempt is replaced so a
        // retry starts clean.
        if staging_dir.exists() {
            fs::remove_dir_all(&staging_dir)?;
        }
        fs::create_dir_all(&staging_dir)?;

        let file = File::open(&package.path)?;
        let mut archive = Archive::new(GzDecoder::new(file));
        archive.unpack(&staging_dir)?;
        Ok(())
    })();

    match result {
        Ok(()) => {
            debug!("Staged {} {} at {}", package.id, package.version, staging_dir.display());
            Ok(StagedPackage {
                id: package.id.clone(),
                version: package.version.clone(),
                path: staging_dir,
            })
        }
        Err(e) => {
            // Remove only this package's partial output, never siblings.
            let _ = fs::remove_dir_all(&staging_dir);
            Err((
                package.id.clone(),
                Error::Extraction {
                    manifest_id: package.id.to_string(),
                    cause: e.to_string(),
                },
            ))
        }
    }
}
