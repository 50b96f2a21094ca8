// src/manifest.rs

//! Workload manifest document model
//!
//! A manifest is a versioned JSON document describing the optional feature
//! sets (workloads) one SDK component family offers, plus opaque references
//! to the packs that back them. Manifests are immutable once parsed; the
//! resolver merges them into a catalog per resolution.

use crate::error::{Error, Result};
use crate::version::ManifestVersion;
use serde::Deserialize;
use std::fmt;

/// Opaque, case-sensitive manifest identifier, stable across versions
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ManifestId(String);

impl ManifestId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ManifestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque, case-sensitive workload identifier, unique within a resolved catalog
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorkloadId(String);

impl WorkloadId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkloadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Workload kind tag (closed set)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkloadKind {
    /// Directly installable workload
    Dev,
    /// Build-infrastructure workload, composed into dev workloads
    Build,
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkloadKind::Dev => f.write_str("dev"),
            WorkloadKind::Build => f.write_str("build"),
        }
    }
}

/// A single workload entry within a manifest
#[derive(Debug, Clone)]
pub struct WorkloadDefinition {
    pub id: WorkloadId,
    pub description: String,
    /// Abstract workloads are template-only and never directly installable
    pub is_abstract: bool,
    pub kind: WorkloadKind,
}

/// A parsed workload manifest document, immutable once loaded
#[derive(Debug, Clone)]
pub struct WorkloadManifest {
    pub id: ManifestId,
    pub version: ManifestVersion,
    /// Workload entries in document order
    pub workloads: Vec<WorkloadDefinition>,
    /// Opaque pack references (component payload identifiers)
    pub packs: Vec<String>,
}

/// Raw JSON shape of a manifest document
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestDocument {
    id: String,
    version: String,
    #[serde(default)]
    feature_band: Option<String>,
    workloads: Vec<WorkloadEntry>,
    #[serde(default)]
    packs: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WorkloadEntry {
    id: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    is_abstract: bool,
    kind: WorkloadKind,
}

impl WorkloadManifest {
    /// Parse a manifest document from JSON
    ///
    /// `origin` names the document for error reporting (typically the
    /// manifest directory name); it must agree with the document's own `id`.
    pub fn parse_json(origin: &str, content: &str) -> Result<Self> {
        let doc: ManifestDocument =
            serde_json::from_str(content).map_err(|e| Error::ManifestParse {
                id: origin.to_string(),
                reason: e.to_string(),
            })?;

        if doc.id != origin {
            return Err(Error::ManifestParse {
                id: origin.to_string(),
                reason: format!("document declares id '{}'", doc.id),
            });
        }

        let version = ManifestVersion::parse(&doc.version, doc.feature_band.as_deref())
            .map_err(|e| Error::ManifestParse {
                id: origin.to_string(),
                reason: e.to_string(),
            })?;

        let workloads = doc
            .workloads
            .into_iter()
            .map(|w| WorkloadDefinition {
                id: WorkloadId::new(w.id),
                description: w.description,
                is_abstract: w.is_abstract,
                kind: w.kind,
            })
            .collect();

        Ok(Self {
            id: ManifestId::new(doc.id),
            version,
            workloads,
            packs: doc.packs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "id": "sdk.android",
        "version": "1.2.0",
        "featureBand": "8.0.100",
        "workloads": [
            {
                "id": "android",
                "description": "Android SDK workload",
                "isAbstract": false,
                "kind": "dev"
            },
            {
                "id": "android-base",
                "isAbstract": true,
                "kind": "build"
            }
        ],
        "packs": ["Sdk.Android.Runtime", "Sdk.Android.Templates"]
    }"#;

    #[test]
    fn test_parse_manifest() {
        let manifest = WorkloadManifest::parse_json("sdk.android", SAMPLE).unwrap();

        assert_eq!(manifest.id.as_str(), "sdk.android");
        assert_eq!(manifest.version.to_string(), "1.2.0");
        assert_eq!(manifest.version.feature_band(), Some("8.0.100"));
        assert_eq!(manifest.workloads.len(), 2);
        assert_eq!(manifest.packs.len(), 2);

        let first = &manifest.workloads[0];
        assert_eq!(first.id.as_str(), "android");
        assert_eq!(first.kind, WorkloadKind::Dev);
        assert!(!first.is_abstract);

        let second = &manifest.workloads[1];
        assert!(second.is_abstract);
        assert_eq!(second.kind, WorkloadKind::Build);
        assert!(second.description.is_empty());
    }

    #[test]
    fn test_parse_malformed_json() {
        let result = WorkloadManifest::parse_json("sdk.android", "{ not json");
        assert!(matches!(result, Err(Error::ManifestParse { .. })));
    }

    #[test]
    fn test_parse_unknown_kind() {
        let content = r#"{
            "id": "m",
            "version": "1.0.0",
            "workloads": [{"id": "w", "kind": "plugin"}]
        }"#;

        let result = WorkloadManifest::parse_json("m", content);
        assert!(matches!(result, Err(Error::ManifestParse { .. })));
    }

    #[test]
    fn test_parse_id_mismatch() {
        let result = WorkloadManifest::parse_json("sdk.ios", SAMPLE);
        match result {
            Err(Error::ManifestParse { id, reason }) => {
                assert_eq!(id, "sdk.ios");
                assert!(reason.contains("sdk.android"));
            }
            other => panic!("expected ManifestParse, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_invalid_version_field() {
        let content = r#"{
            "id": "m",
            "version": "one.two",
            "workloads": []
        }"#;

        let result = WorkloadManifest::parse_json("m", content);
        assert!(matches!(result, Err(Error::ManifestParse { .. })));
    }
}
