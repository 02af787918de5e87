//! picsave command line
//!
//! Native [`Host`](picsave_core::Host) implementation and the `picsave`
//! argument surface. The binary in `main.rs` wires them to
//! [`ImageDownloader`](picsave_core::ImageDownloader) and
//! [`ArchiveStore`](picsave_core::ArchiveStore).

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod cli;
pub mod data_url;
pub mod native;

pub use data_url::{decode_data_url, DataUrl, DataUrlError};
pub use native::NativeHost;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
