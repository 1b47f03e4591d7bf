//! Error types for the restore pipeline.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RestoreError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage backend error: {0}")]
    Storage(String),

    #[error("Manifest {key} unavailable: {reason}")]
    ManifestUnavailable { key: String, reason: String },

    #[error("Malformed manifest: {0}")]
    ManifestMalformed(#[from] serde_json::Error),

    #[error("Invalid manifest entry #{index}: {reason}")]
    ManifestInvalid { index: usize, reason: String },

    #[error("Manifest has no segment starting at block 0")]
    NoCanonicalSegment,

    #[error("Blob not found: {0}")]
    BlobNotFound(String),

    #[error("Failed to fetch {key}: {reason}")]
    Fetch { key: String, reason: String },

    #[error("Import of {file} failed with status {status}")]
    Import { file: String, status: String },

    #[error("Failed to spawn {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove restore marker {}: {source}", path.display())]
    MarkerRemoval {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, RestoreError>;
