// src/error.rs

use thiserror::Error;

/// Core error types for Loadout
#[derive(Error, Debug)]
pub enum Error {
    /// Cache store errors
    #[error("Cache store error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed workload manifest document
    #[error("Failed to parse manifest '{id}': {reason}")]
    ManifestParse { id: String, reason: String },

    /// No manifests installed for the requested host SDK version
    #[error("No workload manifests found for SDK version {0}")]
    ManifestNotFound(String),

    /// Two manifests declare the same workload
    #[error("Workload '{0}' is declared by more than one manifest")]
    DuplicateWorkloadId(String),

    /// Version string is not a valid manifest version
    #[error("Invalid manifest version '{input}': {reason}")]
    VersionParse { input: String, reason: String },

    /// Versions from incompatible feature bands cannot be ordered
    #[error("Cannot compare versions across feature bands ({left} vs {right})")]
    FeatureBandMismatch { left: String, right: String },

    /// Update calculation failed for one manifest
    #[error("Cannot calculate update for manifest '{manifest_id}': {source}")]
    UpdateCalculation {
        manifest_id: String,
        #[source]
        source: Box<Error>,
    },

    /// The remote workload feed could not be reached
    #[error("Workload feed unavailable: {0}")]
    FeedUnavailable(String),

    /// A manifest package download failed after retries
    #[error("Failed to download manifest package '{manifest_id}': {reason}")]
    PackageDownload { manifest_id: String, reason: String },

    /// A manifest package could not be extracted into its staging directory
    #[error("Failed to extract manifest package '{manifest_id}': {cause}")]
    Extraction { manifest_id: String, cause: String },

    /// Downloaded package content did not match the advertised digest
    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// Host SDK version could not be resolved from any source
    #[error("Unable to resolve host SDK version: {0}")]
    HostVersion(String),

    /// Component initialization error
    #[error("Failed to initialize: {0}")]
    InitError(String),
}

/// Result type alias using Loadout's Error type
pub type Result<T> = std::result::Result<T, Error>;
