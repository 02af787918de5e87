//! Binary content with a MIME type
//!
//! [`Blob`] is the unit stored in an archive and produced by acquisition.
//! Bytes are reference counted, so cloning a blob never copies content.

use std::fmt;
use std::sync::Arc;

/// MIME type used when nothing better is known
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Immutable byte content tagged with a MIME type
#[derive(Clone, PartialEq, Eq)]
pub struct Blob {
    data: Arc<[u8]>,
    mime: String,
}

impl Blob {
    /// Create a blob from bytes and a MIME type
    #[inline]
    #[must_use]
    pub fn new(data: impl Into<Arc<[u8]>>, mime: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            mime: mime.into(),
        }
    }

    /// Create an untyped blob
    #[inline]
    #[must_use]
    pub fn untyped(data: impl Into<Arc<[u8]>>) -> Self {
        Self::new(data, OCTET_STREAM)
    }

    /// Create a blob from UTF-8 text
    #[inline]
    #[must_use]
    pub fn from_text(text: &str, mime: impl Into<String>) -> Self {
        Self::new(text.as_bytes(), mime)
    }

    /// Get reference to bytes
    #[inline]
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// MIME type the blob reports for itself
    #[inline]
    #[must_use]
    pub fn mime(&self) -> &str {
        &self.mime
    }

    /// Same bytes, different MIME type
    #[inline]
    #[must_use]
    pub fn with_mime(&self, mime: impl Into<String>) -> Self {
        Self {
            data: Arc::clone(&self.data),
            mime: mime.into(),
        }
    }

    /// Whether the MIME type is an `image/*` type
    #[inline]
    #[must_use]
    pub fn is_image(&self) -> bool {
        self.mime.starts_with("image/")
    }

    /// Copy bytes out
    #[inline]
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        self.data.to_vec()
    }

    /// Get content length
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blob")
            .field("mime", &self.mime)
            .field("len", &self.data.len())
            .finish()
    }
}

impl Default for Blob {
    fn default() -> Self {
        Self::untyped(Vec::<u8>::new())
    }
}

impl From<Vec<u8>> for Blob {
    fn from(data: Vec<u8>) -> Self {
        Self::untyped(data)
    }
}

impl From<&[u8]> for Blob {
    fn from(data: &[u8]) -> Self {
        Self::untyped(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_new() {
        let blob = Blob::new(vec![1u8, 2, 3], "image/png");
        assert_eq!(blob.data(), &[1, 2, 3]);
        assert_eq!(blob.mime(), "image/png");
        assert!(blob.is_image());
    }

    #[test]
    fn blob_with_mime_shares_bytes() {
        let blob = Blob::new(vec![9u8; 16], "image/png");
        let retyped = blob.with_mime("image/webp");
        assert_eq!(retyped.data(), blob.data());
        assert_eq!(retyped.mime(), "image/webp");
        assert_eq!(blob.mime(), "image/png");
    }

    #[test]
    fn blob_default_is_empty_octet_stream() {
        let blob = Blob::default();
        assert!(blob.is_empty());
        assert_eq!(blob.len(), 0);
        assert_eq!(blob.mime(), OCTET_STREAM);
        assert!(!blob.is_image());
    }

    #[test]
    fn blob_debug_omits_bytes() {
        let blob = Blob::from_text("hello", "text/plain");
        assert_eq!(format!("{blob:?}"), r#"Blob { mime: "text/plain", len: 5 }"#);
    }
}
