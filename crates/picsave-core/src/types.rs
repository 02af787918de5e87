//! Core types for the acquisition pipeline

use crate::host::LoadedImage;
use image::RgbaImage;
use picsave_archive::Blob;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Embedded image element reference
#[derive(Debug, Clone, PartialEq)]
pub struct ImageElement {
    /// Current source locator; empty when the element has none
    pub src: String,
    /// Decoded element, present once the element finished loading
    pub loaded: Option<LoadedImage>,
}

impl ImageElement {
    /// Element that has not loaded yet
    #[must_use]
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            loaded: None,
        }
    }

    /// Element that already completed loading
    #[inline]
    #[must_use]
    pub fn with_loaded(mut self, loaded: LoadedImage) -> Self {
        self.loaded = Some(loaded);
        self
    }
}

/// Classified image source
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadableImage {
    /// Embedded image element
    Element(ImageElement),
    /// Serialized inline vector markup
    InlineVector(String),
    /// Raster drawing surface
    Surface(RgbaImage),
    /// Bare locator string
    Locator(String),
}

impl DownloadableImage {
    #[must_use]
    pub fn kind(&self) -> SourceKind {
        match self {
            DownloadableImage::Element(_) => SourceKind::Element,
            DownloadableImage::InlineVector(_) => SourceKind::InlineVector,
            DownloadableImage::Surface(_) => SourceKind::Surface,
            DownloadableImage::Locator(_) => SourceKind::Locator,
        }
    }

    /// Locator to fetch or load, for element and locator sources
    #[must_use]
    pub fn src(&self) -> Option<&str> {
        match self {
            DownloadableImage::Element(element) => Some(element.src.as_str()),
            DownloadableImage::Locator(url) => Some(url.as_str()),
            DownloadableImage::InlineVector(_) | DownloadableImage::Surface(_) => None,
        }
    }
}

/// Tag of a [`DownloadableImage`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Element,
    InlineVector,
    Surface,
    Locator,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceKind::Element => "element",
            SourceKind::InlineVector => "inline-vector",
            SourceKind::Surface => "surface",
            SourceKind::Locator => "locator",
        };
        f.write_str(name)
    }
}

/// Inferred name and format of a source before acquisition
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageMetadata {
    /// Locator the image comes from; empty for surfaces and inline vectors
    pub src: String,
    /// Explicit base name, if any
    pub name: Option<String>,
    /// Lower-cased extension without the dot
    pub extension: Option<String>,
    /// MIME type implied by the extension or a data URL
    pub mime: Option<String>,
}

/// Result of a successful acquisition
///
/// Consumed by exactly one save or archive write.
#[derive(Debug, Clone)]
pub struct ImageDownloadMetadata {
    /// Locator the image came from
    pub src: String,
    /// Final file name including extension
    pub name: String,
    /// Extension of the final blob type
    pub extension: Option<String>,
    /// MIME type of `blob`
    pub mime: String,
    /// Image bytes
    pub blob: Blob,
}

/// Which acquisition path to try first
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcquisitionPreference {
    /// Decide per image from URL heuristics
    #[default]
    Auto,
    /// Always fetch the original bytes first
    Network,
    /// Always draw the loaded element first
    Canvas,
}

/// Conversion target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConvertFormat {
    Webp,
    Avif,
    Jpg,
}

impl ConvertFormat {
    #[inline]
    #[must_use]
    pub fn mime(self) -> &'static str {
        match self {
            ConvertFormat::Webp => "image/webp",
            ConvertFormat::Avif => "image/avif",
            ConvertFormat::Jpg => "image/jpeg",
        }
    }

    #[inline]
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            ConvertFormat::Webp => "webp",
            ConvertFormat::Avif => "avif",
            ConvertFormat::Jpg => "jpg",
        }
    }
}

impl fmt::Display for ConvertFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ConvertFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "webp" => Ok(ConvertFormat::Webp),
            "avif" => Ok(ConvertFormat::Avif),
            "jpg" | "jpeg" => Ok(ConvertFormat::Jpg),
            other => Err(format!("unknown conversion format '{other}' (expected webp, avif or jpg)")),
        }
    }
}

/// Callback deriving a file name from the source and caller params
pub type FilenameResolver =
    Arc<dyn Fn(&DownloadableImage, Option<&serde_json::Value>) -> String + Send + Sync>;

/// How the output file name is chosen
#[derive(Clone, Default)]
pub enum FilenameOption {
    /// Infer from MIME type and locator
    #[default]
    Infer,
    /// Fixed name; an extension is appended when it has none
    Fixed(String),
    /// Computed per source
    Resolver(FilenameResolver),
}

impl FilenameOption {
    /// Caller-supplied name for `image`, if any
    #[must_use]
    pub fn resolve(
        &self,
        image: &DownloadableImage,
        params: Option<&serde_json::Value>,
    ) -> Option<String> {
        match self {
            FilenameOption::Infer => None,
            FilenameOption::Fixed(name) => Some(name.clone()),
            FilenameOption::Resolver(resolver) => Some(resolver(image, params)),
        }
    }
}

impl fmt::Debug for FilenameOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilenameOption::Infer => f.write_str("Infer"),
            FilenameOption::Fixed(name) => f.debug_tuple("Fixed").field(name).finish(),
            FilenameOption::Resolver(_) => f.write_str("Resolver(..)"),
        }
    }
}

/// Per-call acquisition options
#[derive(Debug, Clone, Default)]
pub struct DownloadOptions {
    /// Output file name policy
    pub filename: FilenameOption,
    /// Strategy preference
    pub prefer: AcquisitionPreference,
    /// Re-encode to this format when the blob differs
    pub convert_format: Option<ConvertFormat>,
    /// Upper bound on element loading
    pub timeout: Option<Duration>,
    /// Opaque value handed to a filename resolver
    pub params: Option<serde_json::Value>,
    /// Archive writes only: directory to place the entry under
    pub directory: Option<String>,
}

impl DownloadOptions {
    /// Create default options
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a fixed file name
    #[must_use]
    pub fn with_filename(mut self, name: impl Into<String>) -> Self {
        self.filename = FilenameOption::Fixed(name.into());
        self
    }

    /// Compute the file name per source
    #[must_use]
    pub fn with_filename_resolver<F>(mut self, resolver: F) -> Self
    where
        F: Fn(&DownloadableImage, Option<&serde_json::Value>) -> String + Send + Sync + 'static,
    {
        self.filename = FilenameOption::Resolver(Arc::new(resolver));
        self
    }

    #[inline]
    #[must_use]
    pub fn prefer_network(mut self) -> Self {
        self.prefer = AcquisitionPreference::Network;
        self
    }

    #[inline]
    #[must_use]
    pub fn prefer_canvas(mut self) -> Self {
        self.prefer = AcquisitionPreference::Canvas;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_prefer(mut self, prefer: AcquisitionPreference) -> Self {
        self.prefer = prefer;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_convert_format(mut self, format: ConvertFormat) -> Self {
        self.convert_format = Some(format);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.params = Some(params);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_directory(mut self, directory: impl Into<String>) -> Self {
        self.directory = Some(directory.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn convert_format_parsing() {
        assert_eq!("WebP".parse::<ConvertFormat>().unwrap(), ConvertFormat::Webp);
        assert_eq!("jpeg".parse::<ConvertFormat>().unwrap(), ConvertFormat::Jpg);
        assert!("gif".parse::<ConvertFormat>().is_err());
        assert_eq!(ConvertFormat::Jpg.mime(), "image/jpeg");
        assert_eq!(ConvertFormat::Avif.to_string(), "avif");
    }

    #[test]
    fn preference_is_single_choice() {
        let options = DownloadOptions::new().prefer_network().prefer_canvas();
        assert_eq!(options.prefer, AcquisitionPreference::Canvas);
    }

    #[test]
    fn resolver_sees_source_and_params() {
        let options = DownloadOptions::new()
            .with_params(json!({ "prefix": "shot" }))
            .with_filename_resolver(|image, params| {
                let prefix = params
                    .and_then(|p| p["prefix"].as_str())
                    .unwrap_or("none");
                format!("{prefix}-{}", image.kind())
            });

        let image = DownloadableImage::Locator("https://x/a.png".to_string());
        let name = options.filename.resolve(&image, options.params.as_ref());
        assert_eq!(name.as_deref(), Some("shot-locator"));
    }

    #[test]
    fn source_accessors() {
        let element = DownloadableImage::Element(ImageElement::new("https://x/a.png"));
        assert_eq!(element.src(), Some("https://x/a.png"));
        assert_eq!(element.kind(), SourceKind::Element);
        assert_eq!(DownloadableImage::Surface(RgbaImage::new(1, 1)).src(), None);
    }

    #[test]
    fn preference_deserializes_lowercase() {
        let prefer: AcquisitionPreference = serde_json::from_str("\"canvas\"").unwrap();
        assert_eq!(prefer, AcquisitionPreference::Canvas);
    }
}
