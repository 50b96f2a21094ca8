// src/provider.rs

//! Manifest provider: loads installed manifests for a host SDK version
//!
//! Installed manifests live under a host-version-scoped directory, one
//! subdirectory per manifest id, each holding a `WorkloadManifest.json`:
//!
//! ```text
//! <root>/<host_version>/<manifest_id>/WorkloadManifest.json
//! ```
//!
//! Providers return manifests sorted by manifest id so downstream
//! resolution and update planning are reproducible.

use crate::error::{Error, Result};
use crate::manifest::WorkloadManifest;
use semver::Version;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

/// Manifest document filename within each manifest directory
pub const MANIFEST_FILENAME: &str = "WorkloadManifest.json";

/// Environment variable consulted when no explicit SDK version is given
pub const SDK_VERSION_ENV: &str = "LOADOUT_SDK_VERSION";

/// Source of installed workload manifests
///
/// The capability seam between the resolver and manifest storage; tests
/// substitute an in-memory implementation.
pub trait ManifestSource {
    /// Load all manifests applicable to the given host SDK version,
    /// ordered by manifest id
    fn load_manifests(&self, host_version: &str) -> Result<Vec<WorkloadManifest>>;
}

/// Production provider reading manifests from an SDK installation directory
pub struct SdkDirectoryManifestProvider {
    root: PathBuf,
}

impl SdkDirectoryManifestProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ManifestSource for SdkDirectoryManifestProvider {
    fn load_manifests(&self, host_version: &str) -> Result<Vec<WorkloadManifest>> {
        let version_dir = self.root.join(host_version);
        if !version_dir.is_dir() {
            return Err(Error::ManifestNotFound(host_version.to_string()));
        }

        // Collect manifest directory names first so ordering is by id,
        // not by filesystem enumeration order.
        let mut manifest_dirs: Vec<String> = Vec::new();
        for entry in fs::read_dir(&version_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                manifest_dirs.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        manifest_dirs.sort();

        if manifest_dirs.is_empty() {
            return Err(Error::ManifestNotFound(host_version.to_string()));
        }

        let mut manifests = Vec::with_capacity(manifest_dirs.len());
        for id in &manifest_dirs {
            let path = version_dir.join(id).join(MANIFEST_FILENAME);
            debug!("Loading manifest {} from {}", id, path.display());

            let content = fs::read_to_string(&path).map_err(|e| Error::ManifestParse {
                id: id.clone(),
                reason: format!("cannot read {}: {}", path.display(), e),
            })?;

            manifests.push(WorkloadManifest::parse_json(id, &content)?);
        }

        debug!(
            "Loaded {} manifests for SDK version {}",
            manifests.len(),
            host_version
        );
        Ok(manifests)
    }
}

/// Resolve the host SDK version from its candidate sources
///
/// Precedence is explicit and ordered: a caller-supplied value wins, then
/// the `LOADOUT_SDK_VERSION` environment variable. A candidate that is
/// present but malformed is a hard error rather than a fallthrough to the
/// next source, so a typo never silently selects a different SDK.
pub fn resolve_host_version(explicit: Option<&str>, env_value: Option<&str>) -> Result<Version> {
    let (candidate, source) = match (explicit, env_value) {
        (Some(v), _) => (v, "command line"),
        (None, Some(v)) => (v, SDK_VERSION_ENV),
        (None, None) => {
            return Err(Error::HostVersion(
                "no version given and no SDK installation detected".to_string(),
            ));
        }
    };

    Version::parse(candidate).map_err(|e| {
        Error::HostVersion(format!("invalid version '{}' from {}: {}", candidate, source, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn write_manifest(root: &Path, host_version: &str, id: &str, version: &str) {
        let dir = root.join(host_version).join(id);
        fs::create_dir_all(&dir).unwrap();
        let content = format!(
            r#"{{
                "id": "{id}",
                "version": "{version}",
                "workloads": [
                    {{"id": "{id}-workload", "description": "test", "kind": "dev"}}
                ],
                "packs": []
            }}"#
        );
        fs::write(dir.join(MANIFEST_FILENAME), content).unwrap();
    }

    #[test]
    fn test_load_manifests_sorted_by_id() {
        let temp = tempfile::tempdir().unwrap();
        write_manifest(temp.path(), "8.0.100", "sdk.maui", "1.0.0");
        write_manifest(temp.path(), "8.0.100", "sdk.android", "2.0.0");
        write_manifest(temp.path(), "8.0.100", "sdk.ios", "3.0.0");

        let provider = SdkDirectoryManifestProvider::new(temp.path());
        let manifests = provider.load_manifests("8.0.100").unwrap();

        let ids: Vec<&str> = manifests.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["sdk.android", "sdk.ios", "sdk.maui"]);
    }

    #[test]
    fn test_load_manifests_missing_host_version() {
        let temp = tempfile::tempdir().unwrap();
        let provider = SdkDirectoryManifestProvider::new(temp.path());

        let result = provider.load_manifests("9.0.100");
        assert!(matches!(result, Err(Error::ManifestNotFound(v)) if v == "9.0.100"));
    }

    #[test]
    fn test_load_manifests_empty_host_version_dir() {
        let temp = tempfile::tempdir().unwrap();
        fs::create_dir_all(temp.path().join("8.0.100")).unwrap();

        let provider = SdkDirectoryManifestProvider::new(temp.path());
        let result = provider.load_manifests("8.0.100");
        assert!(matches!(result, Err(Error::ManifestNotFound(_))));
    }

    #[test]
    fn test_load_manifests_malformed_document() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("8.0.100").join("sdk.broken");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(MANIFEST_FILENAME), "{ nope").unwrap();

        let provider = SdkDirectoryManifestProvider::new(temp.path());
        let result = provider.load_manifests("8.0.100");
        assert!(matches!(result, Err(Error::ManifestParse { id, .. }) if id == "sdk.broken"));
    }

    #[test]
    fn test_resolve_host_version_precedence() {
        let v = resolve_host_version(Some("8.0.100"), Some("9.0.100")).unwrap();
        assert_eq!(v.to_string(), "8.0.100");

        let v = resolve_host_version(None, Some("9.0.100")).unwrap();
        assert_eq!(v.to_string(), "9.0.100");
    }

    #[test]
    fn test_resolve_host_version_malformed_explicit_is_fatal() {
        // A bad explicit value must not fall through to the env source
        let result = resolve_host_version(Some("garbage"), Some("9.0.100"));
        assert!(matches!(result, Err(Error::HostVersion(_))));
    }

    #[test]
    fn test_resolve_host_version_no_sources() {
        let result = resolve_host_version(None, None);
        assert!(matches!(result, Err(Error::HostVersion(_))));
    }
}
