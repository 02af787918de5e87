//! Error types for archive operations

use crate::save::SaveError;

/// Archive store and subdirectory handle errors
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// Handle was deleted, reparented, or its store was dropped
    #[error("subdirectory handle '{path}' has been disposed")]
    HandleDisposed { path: String },

    /// No entry matches the requested path
    #[error("no archive entry matches '{0}'")]
    NotFound(String),

    /// Suffix lookup matched more than one entry
    #[error("'{path}' is ambiguous, it matches {candidates:?}")]
    AmbiguousMatch {
        path: String,
        candidates: Vec<String>,
    },

    /// Container serialization failed
    #[error("zip serialization failed: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// I/O failure while writing the container
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Queued operation ended without producing a result
    #[error("queued operation aborted: {0}")]
    OperationAborted(String),

    /// Host refused or failed to save the container
    #[error("save failed: {0}")]
    Save(#[from] SaveError),
}

impl ArchiveError {
    /// Check if error came from touching a disposed handle
    #[inline]
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        matches!(self, Self::HandleDisposed { .. })
    }
}
