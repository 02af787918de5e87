//! Host primitives the pipeline is driven through
//!
//! The downloader never performs I/O itself. A [`Host`] supplies network
//! fetch, element loading (decode + draw readiness), temporary object URLs
//! and the save-as-file action. Browsers, native runtimes and test doubles
//! all plug in here.

use async_trait::async_trait;
use image::RgbaImage;
use picsave_archive::{Blob, FileSaver};

/// Failure reported by a host primitive
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    /// Transport failure (DNS, connection, TLS, aborted body)
    #[error("network error: {0}")]
    Network(String),

    /// Resource could not be loaded or decoded as an image
    #[error("load error: {0}")]
    Load(String),

    /// Anything else the host wants to report
    #[error("{0}")]
    Other(String),
}

/// Completed fetch, successful or not
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// HTTP status code
    pub status: u16,
    /// `Content-Type` header, if present
    pub content_type: Option<String>,
    /// Response body; its MIME is the host's best guess
    pub body: Blob,
}

impl FetchResponse {
    /// 200 response with the body's own type as `Content-Type`
    #[must_use]
    pub fn ok(body: Blob) -> Self {
        Self {
            status: 200,
            content_type: Some(body.mime().to_string()),
            body,
        }
    }

    /// Response with `status` and an empty body
    #[must_use]
    pub fn status(status: u16) -> Self {
        Self {
            status,
            content_type: None,
            body: Blob::default(),
        }
    }

    /// Override the `Content-Type` header
    #[inline]
    #[must_use]
    pub fn with_content_type(mut self, content_type: Option<&str>) -> Self {
        self.content_type = content_type.map(str::to_string);
        self
    }

    /// Status in the 2xx range
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A fully loaded image element
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedImage {
    /// Source the element was loaded from
    pub src: String,
    /// Decoded pixels at natural size
    pub pixels: RgbaImage,
    /// False when drawing this image would taint a surface
    pub origin_clean: bool,
}

impl LoadedImage {
    /// Same-origin image
    #[must_use]
    pub fn new(src: impl Into<String>, pixels: RgbaImage) -> Self {
        Self {
            src: src.into(),
            pixels,
            origin_clean: true,
        }
    }

    /// Mark as loaded from a foreign origin without CORS approval
    #[inline]
    #[must_use]
    pub fn cross_origin(mut self) -> Self {
        self.origin_clean = false;
        self
    }

    #[inline]
    #[must_use]
    pub fn natural_width(&self) -> u32 {
        self.pixels.width()
    }

    #[inline]
    #[must_use]
    pub fn natural_height(&self) -> u32 {
        self.pixels.height()
    }
}

/// Network fetch primitive
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch `url`; non-2xx statuses are responses, not errors
    ///
    /// # Errors
    /// Returns `HostError::Network` on transport failure
    async fn fetch(&self, url: &str) -> Result<FetchResponse, HostError>;
}

/// Element load primitive ("render" path)
#[async_trait]
pub trait ImageLoader: Send + Sync {
    /// Load `src` as an image element and wait for it to complete
    ///
    /// Dropping the returned future detaches from the load; the host may
    /// keep transferring in the background.
    ///
    /// # Errors
    /// Returns `HostError::Load` when the element fires its error event
    async fn load(&self, src: &str) -> Result<LoadedImage, HostError>;
}

/// Temporary URLs that reference in-memory blobs
pub trait ObjectUrls: Send + Sync {
    /// Register `blob` and return a URL the loader accepts
    fn create_object_url(&self, blob: &Blob) -> String;

    /// Release a URL from [`ObjectUrls::create_object_url`]
    fn revoke_object_url(&self, url: &str);
}

/// Everything the downloader needs from its environment
pub trait Host: Fetcher + ImageLoader + ObjectUrls + FileSaver {}

impl<T> Host for T where T: Fetcher + ImageLoader + ObjectUrls + FileSaver {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_response_status_range() {
        assert!(FetchResponse::ok(Blob::new(vec![1u8], "image/png")).is_success());
        assert!(FetchResponse::status(204).is_success());
        assert!(!FetchResponse::status(304).is_success());
        assert!(!FetchResponse::status(404).is_success());
    }

    #[test]
    fn ok_response_uses_body_type() {
        let response = FetchResponse::ok(Blob::new(vec![1u8], "image/gif"));
        assert_eq!(response.content_type.as_deref(), Some("image/gif"));

        let response = response.with_content_type(None);
        assert!(response.content_type.is_none());
    }

    #[test]
    fn loaded_image_dimensions() {
        let loaded = LoadedImage::new("a.png", RgbaImage::new(3, 2));
        assert_eq!((loaded.natural_width(), loaded.natural_height()), (3, 2));
        assert!(loaded.origin_clean);
        assert!(!loaded.cross_origin().origin_clean);
    }
}
