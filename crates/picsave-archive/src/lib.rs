//! picsave archive
//!
//! Virtual, path-addressed blob store that serializes into a ZIP container.
//!
//! # Core Concepts
//!
//! - [`ArchiveStore`]: path → [`Blob`] map with collision-safe naming and a
//!   lazily rebuilt container
//! - [`SubdirectoryHandle`]: invalidatable view over a directory prefix
//! - [`WorkQueue`]: in-flight writes, drained before serialization
//! - [`path`]: sanitation helpers for file names and archive paths
//!
//! # Example
//!
//! ```rust,ignore
//! use picsave_archive::{ArchiveStore, Blob};
//!
//! let store = ArchiveStore::new("holiday");
//! store.add_file("beach/sunset.png", Blob::new(bytes, "image/png"));
//! store.add_file("beach/sunset.png", other); // stored as "beach/sunset (1).png"
//!
//! let zip = store.to_blob().await?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod blob;
mod error;
pub mod path;
mod queue;
mod save;
mod store;
mod subdir;

pub use blob::{Blob, OCTET_STREAM};
pub use error::ArchiveError;
pub use path::{path_join, sanitize_filename, sanitize_filepath};
pub use queue::WorkQueue;
pub use save::{FileSaver, SaveError};
pub use store::{ArchiveStore, ZIP_MIME};
pub use subdir::SubdirectoryHandle;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
