// src/version.rs

//! Manifest version parsing and feature-band-aware comparison
//!
//! Manifest versions are semantic versions scoped to an optional feature
//! band. Versions within the same band form a total order; ordering across
//! bands is undefined and is rejected rather than guessed, so this type
//! deliberately implements neither `Ord` nor `PartialOrd`. Callers go
//! through [`ManifestVersion::try_cmp`].

use crate::error::{Error, Result};
use semver::Version;
use std::cmp::Ordering;
use std::fmt;

/// A manifest version: `major.minor.patch[-prerelease]` plus an optional
/// feature band (e.g. `8.0.100`) that scopes comparability.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ManifestVersion {
    version: Version,
    feature_band: Option<String>,
}

impl ManifestVersion {
    /// Parse a version string, attaching it to a feature band if one is given
    pub fn parse(input: &str, feature_band: Option<&str>) -> Result<Self> {
        let version = Version::parse(input).map_err(|e| Error::VersionParse {
            input: input.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            version,
            feature_band: feature_band.map(|b| b.to_string()),
        })
    }

    /// The feature band this version belongs to, if any
    pub fn feature_band(&self) -> Option<&str> {
        self.feature_band.as_deref()
    }

    /// Whether this is a preview (pre-release) version
    pub fn is_preview(&self) -> bool {
        !self.version.pre.is_empty()
    }

    /// Compare two versions within a feature band
    ///
    /// Fails with [`Error::FeatureBandMismatch`] when the versions belong to
    /// different bands (including band vs. no band).
    pub fn try_cmp(&self, other: &Self) -> Result<Ordering> {
        if self.feature_band != other.feature_band {
            return Err(Error::FeatureBandMismatch {
                left: self.band_label(),
                right: other.band_label(),
            });
        }

        Ok(self.version.cmp(&other.version))
    }

    /// True when `self` is strictly newer than `other` within the same band
    pub fn is_newer_than(&self, other: &Self) -> Result<bool> {
        Ok(self.try_cmp(other)? == Ordering::Greater)
    }

    fn band_label(&self) -> String {
        self.feature_band
            .clone()
            .unwrap_or_else(|| "unbanded".to_string())
    }
}

impl fmt::Display for ManifestVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.version)
    }
}
