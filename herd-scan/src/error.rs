//! Error types for herd-scan.

use std::path::PathBuf;

use thiserror::Error;

use herd_core::StoreError;

/// All errors that can arise from a reconciliation pass.
#[derive(Debug, Error)]
pub enum ScanError {
    /// A path the classifier says must be checked could not be inspected and
    /// the caller did not allow absence. This signals an inconsistency
    /// between classification rules and the live filesystem; the top-level
    /// caller should log it and terminate rather than continue the walk.
    #[error("cannot inspect {path}: {source}")]
    Inspect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Fingerprint generation failed (e.g. an unreadable symlink target or a
    /// file that vanished mid-read).
    #[error("cannot fingerprint {path}: {source}")]
    Fingerprint {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An error from the state store.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl ScanError {
    /// Whether this error means the walk hit a state it must not recover
    /// from locally.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ScanError::Inspect { .. })
    }
}
