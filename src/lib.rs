// src/lib.rs

//! Loadout Workload Engine
//!
//! Resolves and updates workload manifests for a modular SDK: versioned
//! documents declaring optional, installable feature sets tied to a
//! specific host SDK version.
//!
//! # Architecture
//!
//! - Catalog flow: provider loads installed manifests, resolver merges
//!   them into one queryable workload set
//! - Update flow: advertising cache refresh, update calculation, bounded
//!   concurrent download, isolated staging for atomic publish
//! - Capability seams: `ManifestSource` and `PackageFeed` traits with
//!   production and in-memory implementations
//! - The advertising cache is the only persisted mutable state, guarded by
//!   single-flight refresh semantics

pub mod cache;
mod error;
pub mod feed;
pub mod fetcher;
pub mod manifest;
pub mod provider;
pub mod resolver;
pub mod stager;
pub mod updater;
pub mod version;

pub use error::{Error, Result};
