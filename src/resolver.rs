// src/resolver.rs

//! Workload resolver: merges manifests into a queryable catalog
//!
//! Resolution takes the manifests a provider loaded and builds one
//! [`AvailableWorkloadSet`] keyed by workload id. The set is created per
//! resolution and never persisted; queries against it are read-only and
//! safe to repeat concurrently.

use crate::error::{Error, Result};
use crate::manifest::{WorkloadDefinition, WorkloadId, WorkloadManifest};
use std::collections::BTreeMap;
use tracing::debug;

/// The resolved union of workload definitions across all loaded manifests
#[derive(Debug, Default)]
pub struct AvailableWorkloadSet {
    // BTreeMap keeps query results in workload-id order for free.
    workloads: BTreeMap<WorkloadId, WorkloadDefinition>,
}

impl AvailableWorkloadSet {
    /// All workloads whose id contains `filter` (case-insensitive), or the
    /// full catalog when no filter is given. Ordered by workload id.
    pub fn query_available(&self, filter: Option<&str>) -> Vec<&WorkloadDefinition> {
        match filter {
            None => self.workloads.values().collect(),
            Some(stub) => {
                let needle = stub.to_lowercase();
                self.workloads
                    .values()
                    .filter(|w| w.id.as_str().to_lowercase().contains(&needle))
                    .collect()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.workloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workloads.is_empty()
    }
}

/// Merge manifests into a single workload catalog
///
/// A workload id declared by two manifests is a resolution-time conflict
/// and fails the whole resolution; nothing is silently overwritten.
pub fn resolve(manifests: &[WorkloadManifest]) -> Result<AvailableWorkloadSet> {
    let mut workloads = BTreeMap::new();

    for manifest in manifests {
        for workload in &manifest.workloads {
            if workloads.contains_key(&workload.id) {
                return Err(Error::DuplicateWorkloadId(workload.id.to_string()));
            }
            workloads.insert(workload.id.clone(), workload.clone());
        }
    }

    debug!(
        "Resolved {} workloads from {} manifests",
        workloads.len(),
        manifests.len()
    );
    Ok(AvailableWorkloadSet { workloads })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::WorkloadManifest;

    fn manifest(id: &str, workload_ids: &[&str]) -> WorkloadManifest {
        let workloads: Vec<String> = workload_ids
            .iter()
            .map(|w| format!(r#"{{"id": "{w}", "description": "d", "kind": "dev"}}"#))
            .collect();
        let content = format!(
            r#"{{"id": "{id}", "version": "1.0.0", "workloads": [{}], "packs": []}}"#,
            workloads.join(",")
        );
        WorkloadManifest::parse_json(id, &content).unwrap()
    }

    #[test]
    fn test_resolve_union_of_definitions() {
        let manifests = vec![
            manifest("sdk.mobile", &["maui", "android"]),
            manifest("sdk.apple", &["ios"]),
        ];

        let set = resolve(&manifests).unwrap();
        assert_eq!(set.len(), 3);

        let all: Vec<&str> = set
            .query_available(None)
            .iter()
            .map(|w| w.id.as_str())
            .collect();
        assert_eq!(all, vec!["android", "ios", "maui"]);
    }

    #[test]
    fn test_resolve_duplicate_workload_id() {
        let manifests = vec![
            manifest("sdk.mobile", &["maui", "android"]),
            manifest("sdk.other", &["android"]),
        ];

        let result = resolve(&manifests);
        assert!(matches!(result, Err(Error::DuplicateWorkloadId(id)) if id == "android"));
    }

    #[test]
    fn test_query_case_insensitive_substring() {
        let manifests = vec![manifest("sdk.all", &["maui", "android", "ios"])];
        let set = resolve(&manifests).unwrap();

        let matched: Vec<&str> = set
            .query_available(Some("AND"))
            .iter()
            .map(|w| w.id.as_str())
            .collect();
        assert_eq!(matched, vec!["android"]);
    }

    #[test]
    fn test_query_no_match_is_empty_not_error() {
        let manifests = vec![manifest("sdk.all", &["maui"])];
        let set = resolve(&manifests).unwrap();
        assert!(set.query_available(Some("windows")).is_empty());
    }

    #[test]
    fn test_resolve_empty_manifest_list() {
        let set = resolve(&[]).unwrap();
        assert!(set.is_empty());
        assert!(set.query_available(None).is_empty());
    }
}
