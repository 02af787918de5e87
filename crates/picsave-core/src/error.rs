//! Error types for image acquisition and download orchestration

use crate::host::HostError;
use picsave_archive::{ArchiveError, SaveError};
use std::path::PathBuf;
use std::time::Duration;

/// Errors while turning a source into an image blob
#[derive(Debug, thiserror::Error)]
pub enum AcquireError {
    /// Input value is none of the supported source kinds
    #[error("unsupported image source: {0}")]
    UnsupportedSource(String),

    /// Transport-level fetch failure
    #[error("fetch of '{url}' failed: {source}")]
    Network {
        url: String,
        #[source]
        source: HostError,
    },

    /// Fetch completed with a non-success status
    #[error("fetch of '{url}' returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    /// Fetched body is not an image
    #[error("'{url}' is not an image (content type '{content_type}')")]
    ContentTypeMismatch { url: String, content_type: String },

    /// Element load reported an error
    #[error("loading '{src}' failed: {source}")]
    LoadFailed {
        src: String,
        #[source]
        source: HostError,
    },

    /// Element did not load before the deadline
    #[error("loading '{src}' timed out after {}ms", .timeout.as_millis())]
    LoadTimeout { src: String, timeout: Duration },

    /// Loaded element has no natural size to draw at
    #[error("'{src}' has no natural dimensions")]
    MissingDimensions { src: String },

    /// Pixels of a cross-origin image cannot be read back
    #[error("surface for '{src}' is tainted by cross-origin data")]
    TaintedSurface { src: String },

    /// Surface could not be encoded into a blob
    #[error("encoding surface failed: {0}")]
    Encode(#[from] ConversionError),

    /// Preferred and fallback strategy both failed
    #[error("{fallback} (preferred strategy failed first: {primary})")]
    FailoverExhausted {
        primary: Box<AcquireError>,
        fallback: Box<AcquireError>,
    },
}

impl AcquireError {
    /// Whether the failure stems from cross-origin restrictions
    ///
    /// For [`AcquireError::FailoverExhausted`] either attempt counts.
    #[must_use]
    pub fn is_cross_origin(&self) -> bool {
        match self {
            AcquireError::TaintedSurface { .. } => true,
            AcquireError::FailoverExhausted { primary, fallback } => {
                primary.is_cross_origin() || fallback.is_cross_origin()
            }
            _ => false,
        }
    }

    /// Error of the last attempted strategy
    #[must_use]
    pub fn last_attempt(&self) -> &AcquireError {
        match self {
            AcquireError::FailoverExhausted { fallback, .. } => fallback.last_attempt(),
            other => other,
        }
    }
}

/// Errors inside the conversion engine
///
/// Never returned by [`crate::convert::convert`], which falls back to the
/// original blob; surfaced only by the lower-level encode helpers.
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    /// Decoding or encoding through the `image` crate failed
    #[error("image codec error: {0}")]
    Image(#[from] image::ImageError),

    /// Element-based decode through the host failed
    #[error("element decode failed: {0}")]
    Load(#[source] HostError),

    /// Decoded image has a zero dimension
    #[error("decoded image is empty")]
    EmptySurface,

    /// No encoder for the requested type
    #[error("no encoder for '{0}'")]
    UnsupportedTarget(String),
}

/// Top-level error of download and archive operations
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error(transparent)]
    Acquire(#[from] AcquireError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Save(#[from] SaveError),
}

/// Errors loading a [`crate::config::DownloaderConfig`]
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file unreadable
    #[error("cannot read config '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config text is not valid TOML for the schema
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Values parsed but are out of range
    #[error("invalid config value: {0}")]
    Invalid(String),
}
