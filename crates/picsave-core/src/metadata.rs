//! Extension / MIME inference and output file naming
//!
//! All functions are pure. Extension precedence when naming a file is
//! MIME-derived, then locator-derived, then the caller's default.

use crate::types::{DownloadableImage, ImageMetadata};
use once_cell::sync::Lazy;
use picsave_archive::path::split_extension;
use regex::Regex;
use url::Url;

pub const PNG_MIME: &str = "image/png";
pub const SVG_MIME: &str = "image/svg+xml";

/// Extension → MIME; the first extension listed for a MIME is canonical
const MIME_TABLE: &[(&str, &str)] = &[
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", PNG_MIME),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("apng", "image/apng"),
    ("avif", "image/avif"),
    ("svg", SVG_MIME),
    ("bmp", "image/bmp"),
    ("ico", "image/x-icon"),
    ("tif", "image/tiff"),
    ("tiff", "image/tiff"),
    ("jxl", "image/jxl"),
];

/// Non-canonical MIME spellings seen in the wild
const MIME_ALIASES: &[(&str, &str)] = &[
    ("image/jpg", "jpg"),
    ("image/pjpeg", "jpg"),
    ("image/vnd.microsoft.icon", "ico"),
    ("image/svg", "svg"),
];

static EXTENSION_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9+]+$").expect("valid extension regex"));

/// Extensions with an entry in the MIME table
#[must_use]
pub fn known_extensions() -> impl Iterator<Item = &'static str> {
    MIME_TABLE.iter().map(|(ext, _)| *ext)
}

/// Final path segment of `url`, without query or fragment
///
/// `None` for opaque URLs such as `data:` and for locators ending in `/`.
#[must_use]
pub fn last_path_segment(url: &str) -> Option<String> {
    let segment = match Url::parse(url) {
        Ok(parsed) => parsed.path_segments()?.last()?.to_string(),
        Err(_) => {
            let end = url.find(['?', '#']).unwrap_or(url.len());
            url[..end].rsplit('/').next()?.to_string()
        }
    };
    (!segment.is_empty()).then_some(segment)
}

/// Lower-cased extension of the locator's final path segment
#[must_use]
pub fn extension_from_url(url: &str) -> Option<String> {
    let segment = last_path_segment(url)?;
    let (_, extension) = segment.rsplit_once('.')?;
    let extension = extension.to_ascii_lowercase();
    EXTENSION_PATTERN
        .is_match(&extension)
        .then_some(extension)
}

/// Canonical extension for `mime`
///
/// Parameters after `;` are ignored. Unknown `image/*` types yield their
/// subtype verbatim; other top-level types yield `None`.
#[must_use]
pub fn extension_from_mime(mime: &str) -> Option<String> {
    let essence = mime_essence(mime);
    if let Some((ext, _)) = MIME_TABLE.iter().find(|(_, m)| *m == essence) {
        return Some((*ext).to_string());
    }
    if let Some((_, ext)) = MIME_ALIASES.iter().find(|(m, _)| *m == essence) {
        return Some((*ext).to_string());
    }
    essence
        .strip_prefix("image/")
        .filter(|subtype| !subtype.is_empty())
        .map(str::to_string)
}

/// MIME type for `extension`, case-insensitive, with or without a dot
#[must_use]
pub fn mime_from_extension(extension: &str) -> Option<&'static str> {
    let extension = extension.trim_start_matches('.').to_ascii_lowercase();
    MIME_TABLE
        .iter()
        .find(|(ext, _)| *ext == extension)
        .map(|(_, mime)| *mime)
}

/// Media type of a `data:` URL
#[must_use]
pub fn mime_from_data_url(url: &str) -> Option<String> {
    let head = url.get(..5)?;
    if !head.eq_ignore_ascii_case("data:") {
        return None;
    }
    let header = &url[5..url.find(',')?];
    let media_type = header.split(';').next().unwrap_or_default().trim();
    (!media_type.is_empty()).then(|| media_type.to_ascii_lowercase())
}

/// Lower-cased type/subtype without parameters
fn mime_essence(mime: &str) -> String {
    mime.split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Pre-acquisition metadata for a classified source
#[must_use]
pub fn resolve_metadata(image: &DownloadableImage) -> ImageMetadata {
    match image {
        DownloadableImage::Element(_) | DownloadableImage::Locator(_) => {
            let src = image.src().unwrap_or_default().to_string();
            let (extension, mime) = match mime_from_data_url(&src) {
                Some(mime) => (extension_from_mime(&mime), Some(mime)),
                None => {
                    let extension = extension_from_url(&src);
                    let mime = extension
                        .as_deref()
                        .and_then(mime_from_extension)
                        .map(str::to_string);
                    (extension, mime)
                }
            };
            ImageMetadata {
                name: last_path_segment(&src).map(|segment| split_extension(&segment).0.to_string()),
                src,
                extension,
                mime,
            }
        }
        DownloadableImage::InlineVector(_) => ImageMetadata {
            extension: Some("svg".to_string()),
            mime: Some(SVG_MIME.to_string()),
            ..ImageMetadata::default()
        },
        DownloadableImage::Surface(_) => ImageMetadata {
            extension: Some("png".to_string()),
            mime: Some(PNG_MIME.to_string()),
            ..ImageMetadata::default()
        },
    }
}

/// Inputs of [`compute_filename`]
#[derive(Debug, Clone, Copy)]
pub struct FilenameRequest<'a> {
    /// Caller override
    pub name: Option<&'a str>,
    /// Locator the image came from
    pub url: Option<&'a str>,
    /// Type of the final blob
    pub mime: Option<&'a str>,
    pub default_extension: &'a str,
    pub default_base: &'a str,
}

impl<'a> FilenameRequest<'a> {
    #[must_use]
    pub fn new(default_base: &'a str, default_extension: &'a str) -> Self {
        Self {
            name: None,
            url: None,
            mime: None,
            default_extension,
            default_base,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_name(mut self, name: Option<&'a str>) -> Self {
        self.name = name;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_url(mut self, url: Option<&'a str>) -> Self {
        self.url = url;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_mime(mut self, mime: Option<&'a str>) -> Self {
        self.mime = mime;
        self
    }
}

/// Output file name for an acquired image
///
/// An override keeps its own extension when it has an inner dot. Otherwise
/// the locator's base name is used with the extension swapped, and the
/// default base name is the last resort.
#[must_use]
pub fn compute_filename(request: &FilenameRequest<'_>) -> String {
    let extension = request
        .mime
        .and_then(extension_from_mime)
        .or_else(|| request.url.and_then(extension_from_url))
        .unwrap_or_else(|| request.default_extension.to_string());

    if let Some(name) = request.name {
        let trimmed = name.trim();
        let base = if trimmed.is_empty() {
            request.default_base
        } else {
            trimmed
        };
        let base = base.replace(['/', '\\'], "");
        if has_inner_dot(&base) {
            return base;
        }
        return format!("{base}.{extension}");
    }

    if let Some(segment) = request.url.and_then(last_path_segment) {
        let (base, _) = split_extension(&segment);
        return format!("{base}.{extension}");
    }

    format!("{}.{extension}", request.default_base)
}

/// Dot somewhere other than the first or last character
fn has_inner_dot(name: &str) -> bool {
    let last = name.len().saturating_sub(1);
    name.char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i < last)
}
