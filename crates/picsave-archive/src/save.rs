//! Host save-as-file boundary

use crate::blob::Blob;
use async_trait::async_trait;

/// Errors reported by a [`FileSaver`]
#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    /// Writing the file failed
    #[error("cannot write '{filename}': {source}")]
    Io {
        filename: String,
        #[source]
        source: std::io::Error,
    },

    /// The host declined the save
    #[error("save of '{filename}' rejected: {reason}")]
    Rejected { filename: String, reason: String },
}

/// Host primitive that delivers a blob to the user as a named file
#[async_trait]
pub trait FileSaver: Send + Sync {
    /// Save `blob` under `filename`
    ///
    /// # Errors
    /// Returns error if the host cannot deliver the file
    async fn save(&self, blob: Blob, filename: &str) -> Result<(), SaveError>;
}
