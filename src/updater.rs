// src/updater.rs

//! Update calculator: diffs installed manifests against the advertising
//! cache to produce a minimal update plan
//!
//! One update cycle walks `Idle → Refreshing → PlanCalculated →
//! Downloading → Staged`; a failure at any stage surfaces its specific
//! error and drops back to `Idle`, leaving per-manifest artifacts from
//! other members of the batch valid.

use crate::cache::AdvertisingCache;
use crate::error::{Error, Result};
use crate::manifest::{ManifestId, WorkloadManifest};
use crate::version::ManifestVersion;
use std::fmt;
use tracing::debug;

/// One manifest's required version transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestUpdateDelta {
    pub id: ManifestId,
    pub from: ManifestVersion,
    pub to: ManifestVersion,
}

/// Stages of one update cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStage {
    Idle,
    Refreshing,
    PlanCalculated,
    Downloading,
    Staged,
}

impl fmt::Display for UpdateStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            UpdateStage::Idle => "idle",
            UpdateStage::Refreshing => "refreshing",
            UpdateStage::PlanCalculated => "plan calculated",
            UpdateStage::Downloading => "downloading",
            UpdateStage::Staged => "staged",
        };
        f.write_str(label)
    }
}

/// Compute the update plan for the installed manifest set
///
/// A delta is emitted only when the advertised version is strictly greater
/// under band-aware comparison; no-op entries are never produced. An
/// installed manifest the feed no longer advertises is skipped (treated as
/// retired from the feed, not an error). Output order follows the
/// provider's deterministic manifest order.
pub fn calculate_updates(
    installed: &[WorkloadManifest],
    cache: &AdvertisingCache,
) -> Result<Vec<ManifestUpdateDelta>> {
    let mut deltas = Vec::new();

    for manifest in installed {
        let Some(advertised) = cache
            .get(&manifest.id)
            .map_err(|e| update_error(&manifest.id, e))?
        else {
            debug!("Manifest {} is not advertised, skipping", manifest.id);
            continue;
        };

        if advertised
            .is_newer_than(&manifest.version)
            .map_err(|e| update_error(&manifest.id, e))?
        {
            deltas.push(ManifestUpdateDelta {
                id: manifest.id.clone(),
                from: manifest.version.clone(),
                to: advertised,
            });
        }
    }

    debug!(
        "Update plan: {} of {} manifests need updating",
        deltas.len(),
        installed.len()
    );
    Ok(deltas)
}

// Every error leaving the calculator names the manifest it belongs to, so
// the consuming command can report exactly which item failed.
fn update_error(id: &ManifestId, source: Error) -> Error {
    Error::UpdateCalculation {
        manifest_id: id.to_string(),
        source: Box::new(source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::feed::InMemoryPackageFeed;

    fn manifest(id: &str, version: &str) -> WorkloadManifest {
        let content = format!(
            r#"{{"id": "{id}", "version": "{version}", "workloads": [], "packs": []}}"#
        );
        WorkloadManifest::parse_json(id, &content).unwrap()
    }

    fn cache_with(advertised: &[(&str, &str)]) -> (tempfile::TempDir, AdvertisingCache) {
        let temp = tempfile::tempdir().unwrap();
        let cache = AdvertisingCache::open(temp.path().join("advertising.db")).unwrap();

        let mut feed = InMemoryPackageFeed::new();
        for (id, version) in advertised {
            feed.advertise(id, ManifestVersion::parse(version, None).unwrap());
        }
        cache.refresh(&feed, false, false).unwrap();

        (temp, cache)
    }

    #[test]
    fn test_no_updates_when_versions_match() {
        let installed = vec![manifest("sdk.a", "1.0.0"), manifest("sdk.b", "2.0.0")];
        let (_temp, cache) = cache_with(&[("sdk.a", "1.0.0"), ("sdk.b", "2.0.0")]);

        let deltas = calculate_updates(&installed, &cache).unwrap();
        assert!(deltas.is_empty());
    }

    #[test]
    fn test_single_delta_for_newer_advertised_version() {
        let installed = vec![manifest("sdk.a", "1.0.0")];
        let (_temp, cache) = cache_with(&[("sdk.a", "2.0.0")]);

        let deltas = calculate_updates(&installed, &cache).unwrap();
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].id.as_str(), "sdk.a");
        assert_eq!(deltas[0].from.to_string(), "1.0.0");
        assert_eq!(deltas[0].to.to_string(), "2.0.0");
    }

    #[test]
    fn test_no_delta_when_advertised_is_older() {
        let installed = vec![manifest("sdk.a", "2.0.0")];
        let (_temp, cache) = cache_with(&[("sdk.a", "1.0.0")]);

        let deltas = calculate_updates(&installed, &cache).unwrap();
        assert!(deltas.is_empty());
    }

    #[test]
    fn test_unadvertised_manifest_is_skipped() {
        let installed = vec![manifest("sdk.a", "1.0.0"), manifest("sdk.b", "1.0.0")];
        let (_temp, cache) = cache_with(&[("sdk.b", "3.0.0")]);

        let deltas = calculate_updates(&installed, &cache).unwrap();
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].id.as_str(), "sdk.b");
    }

    #[test]
    fn test_deltas_follow_installed_order() {
        let installed = vec![
            manifest("sdk.a", "1.0.0"),
            manifest("sdk.b", "1.0.0"),
            manifest("sdk.c", "1.0.0"),
        ];
        let (_temp, cache) =
            cache_with(&[("sdk.c", "2.0.0"), ("sdk.a", "2.0.0"), ("sdk.b", "2.0.0")]);

        let deltas = calculate_updates(&installed, &cache).unwrap();
        let ids: Vec<&str> = deltas.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["sdk.a", "sdk.b", "sdk.c"]);
    }

    #[test]
    fn test_band_mismatch_error_names_manifest() {
        let content = r#"{"id": "sdk.a", "version": "1.0.0", "featureBand": "8.0.100",
                          "workloads": [], "packs": []}"#;
        let installed = vec![WorkloadManifest::parse_json("sdk.a", content).unwrap()];

        let temp = tempfile::tempdir().unwrap();
        let cache = AdvertisingCache::open(temp.path().join("advertising.db")).unwrap();
        let mut feed = InMemoryPackageFeed::new();
        feed.advertise(
            "sdk.a",
            ManifestVersion::parse("2.0.0", Some("9.0.100")).unwrap(),
        );
        cache.refresh(&feed, false, false).unwrap();

        let err = calculate_updates(&installed, &cache).unwrap_err();
        match &err {
            Error::UpdateCalculation {
                manifest_id,
                source,
            } => {
                assert_eq!(manifest_id, "sdk.a");
                assert!(matches!(**source, Error::FeatureBandMismatch { .. }));
            }
            other => panic!("expected UpdateCalculation, got {:?}", other),
        }
        assert!(
            err.to_string().contains("sdk.a"),
            "error must name the offending manifest, got: {}",
            err
        );
    }
}
