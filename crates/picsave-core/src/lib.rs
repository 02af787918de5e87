//! picsave core - image acquisition and download orchestration
//!
//! Turns heterogeneous image sources into named image blobs:
//! - Classifies raw values (elements, locators, surfaces, inline vectors)
//! - Chooses network fetch or element rendering, failing over once
//! - Converts between raster formats through an in-memory surface
//! - Infers file names from MIME types and locators
//! - Saves single images, batches, or writes them into an archive
//!
//! All I/O goes through a [`Host`] implementation.
//!
//! # Example
//!
//! ```rust,ignore
//! use picsave_core::{DownloadOptions, ImageDownloader};
//!
//! # async fn example(host: std::sync::Arc<dyn picsave_core::Host>) -> Result<(), picsave_core::DownloadError> {
//! let downloader = ImageDownloader::new(host);
//! let options = DownloadOptions::new().with_convert_format(picsave_core::ConvertFormat::Webp);
//!
//! let saved = downloader
//!     .download_image("https://example.com/cat.png".into(), &options)
//!     .await?;
//! assert_eq!(saved, "cat.webp");
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
pub mod archive;
pub mod batch;
pub mod config;
pub mod convert;
pub mod downloader;
pub mod error;
pub mod host;
pub mod metadata;
pub mod source;
pub mod strategy;
pub mod types;

// Re-exports for convenience
pub use archive::ArchiveImages;
pub use batch::{batch_delay_for_each, BatchOptions, Settled};
pub use config::DownloaderConfig;
pub use convert::convert;
pub use downloader::ImageDownloader;
pub use error::{AcquireError, ConfigError, ConversionError, DownloadError};
pub use host::{FetchResponse, Fetcher, Host, HostError, ImageLoader, LoadedImage, ObjectUrls};
pub use metadata::{compute_filename, resolve_metadata, FilenameRequest};
pub use source::{classify, HostNode, SourceValue};
pub use strategy::{acquire_with_failover, should_prefer_network, Strategy};
pub use types::{
    AcquisitionPreference, ConvertFormat, DownloadOptions, DownloadableImage, FilenameOption,
    ImageDownloadMetadata, ImageElement, ImageMetadata, SourceKind,
};

pub use picsave_archive::{ArchiveStore, Blob, FileSaver, SaveError, ZIP_MIME};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with picsave core
    pub use crate::{
        ArchiveImages, ArchiveStore, BatchOptions, Blob, ConvertFormat, DownloadOptions,
        DownloaderConfig, Host, HostNode, ImageDownloader, Settled, SourceValue,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
