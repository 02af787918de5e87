//! Source classification
//!
//! Raw host values are tagged exactly once, here. Everything downstream
//! matches on [`DownloadableImage`] instead of probing types again.

use crate::error::AcquireError;
use crate::host::LoadedImage;
use crate::types::{DownloadableImage, ImageElement};
use image::RgbaImage;

/// DOM-style node type of element nodes
pub const ELEMENT_NODE: u16 = 1;

/// A document node as exposed by the host
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostNode {
    pub node_type: u16,
    pub tag_name: String,
    /// Vector-element capability check; `None` when the platform lacks the type
    pub is_vector_element: Option<bool>,
    /// `src` attribute of media elements
    pub src: Option<String>,
    /// Serialized outer markup
    pub markup: Option<String>,
    /// Decoded image, once an image element completed loading
    pub loaded: Option<LoadedImage>,
}

impl HostNode {
    /// Element node with the given tag
    #[must_use]
    pub fn element(tag_name: impl Into<String>) -> Self {
        Self {
            node_type: ELEMENT_NODE,
            tag_name: tag_name.into(),
            ..Self::default()
        }
    }

    /// `<img src=…>` element
    #[must_use]
    pub fn img(src: impl Into<String>) -> Self {
        Self::element("IMG").with_src(src)
    }

    /// `<svg>` element with its serialized markup
    #[must_use]
    pub fn svg(markup: impl Into<String>) -> Self {
        Self::element("svg").with_markup(markup)
    }

    #[inline]
    #[must_use]
    pub fn with_src(mut self, src: impl Into<String>) -> Self {
        self.src = Some(src.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_markup(mut self, markup: impl Into<String>) -> Self {
        self.markup = Some(markup.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_vector_capability(mut self, is_vector: bool) -> Self {
        self.is_vector_element = Some(is_vector);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_loaded(mut self, loaded: LoadedImage) -> Self {
        self.loaded = Some(loaded);
        self
    }

    fn is_element(&self, tag: &str) -> bool {
        self.node_type == ELEMENT_NODE && self.tag_name.eq_ignore_ascii_case(tag)
    }

    fn is_vector(&self) -> bool {
        self.is_vector_element
            .unwrap_or_else(|| self.is_element("svg"))
    }
}

/// Untyped value handed to the downloader
#[derive(Debug, Clone, PartialEq)]
pub enum SourceValue {
    /// Document node
    Node(HostNode),
    /// Locator string
    Text(String),
    /// Drawing surface
    Canvas(RgbaImage),
    /// Anything else, described for error messages
    Opaque(String),
}

impl From<&str> for SourceValue {
    fn from(url: &str) -> Self {
        SourceValue::Text(url.to_string())
    }
}

impl From<String> for SourceValue {
    fn from(url: String) -> Self {
        SourceValue::Text(url)
    }
}

impl From<HostNode> for SourceValue {
    fn from(node: HostNode) -> Self {
        SourceValue::Node(node)
    }
}

impl From<RgbaImage> for SourceValue {
    fn from(surface: RgbaImage) -> Self {
        SourceValue::Canvas(surface)
    }
}

/// Tag `value` as one of the four downloadable kinds
///
/// Priority: image element, locator text, drawing surface, inline vector.
///
/// # Errors
/// Returns `AcquireError::UnsupportedSource` for any other value
pub fn classify(value: SourceValue) -> Result<DownloadableImage, AcquireError> {
    match value {
        SourceValue::Node(node) if node.is_element("img") => {
            Ok(DownloadableImage::Element(ImageElement {
                src: node.src.unwrap_or_default(),
                loaded: node.loaded,
            }))
        }
        SourceValue::Text(url) => Ok(DownloadableImage::Locator(url)),
        SourceValue::Canvas(surface) => Ok(DownloadableImage::Surface(surface)),
        SourceValue::Node(node) if node.is_vector() => match node.markup {
            Some(markup) => Ok(DownloadableImage::InlineVector(markup)),
            None => Err(AcquireError::UnsupportedSource(
                "vector element without markup".to_string(),
            )),
        },
        SourceValue::Node(node) => Err(AcquireError::UnsupportedSource(format!(
            "<{}> node (type {})",
            node.tag_name.to_ascii_lowercase(),
            node.node_type
        ))),
        SourceValue::Opaque(description) => Err(AcquireError::UnsupportedSource(description)),
    }
}
