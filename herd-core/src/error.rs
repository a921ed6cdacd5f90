//! Error types for herd-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from state store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying I/O failure, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error (state document).
    #[error("state document JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A path could not be used as a store key because it is not valid UTF-8.
    /// The JSON document round-trips keys as UTF-8 strings; anything else is
    /// rejected up front rather than stored lossily.
    #[error("path is not valid UTF-8: {path:?}")]
    NonUtf8Path { path: PathBuf },
}

/// Convenience constructor for [`StoreError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}
