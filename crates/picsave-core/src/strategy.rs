//! Network vs render acquisition with single failover
//!
//! The network path fetches the original bytes and preserves animation and
//! format. The render path draws the loaded element onto a surface and
//! re-encodes it, which survives missing CORS headers on the fetch but not
//! a tainted canvas. Whichever is preferred runs first; the other runs at
//! most once if it fails.

use crate::convert::{draw_on_surface, encode_surface, is_encodable};
use crate::error::AcquireError;
use crate::host::{Fetcher, ImageLoader, LoadedImage};
use crate::metadata::{known_extensions, PNG_MIME, SVG_MIME};
use crate::types::{AcquisitionPreference, DownloadOptions, DownloadableImage, ImageMetadata};
use once_cell::sync::Lazy;
use picsave_archive::Blob;
use regex::Regex;
use std::fmt;
use std::time::Duration;
use url::Url;

/// Extensions that never carry animation
const STATIC_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "ico"];

/// Formats that may be animated
const ANIMATED_FORMATS: &[&str] = &["gif", "apng", "webp", "avif"];

/// Query keys CDNs use to select the delivered format
const FORMAT_QUERY_KEYS: &[&str] = &["format", "fm", "type", "imageformat", "ext"];

static ANIMATED_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.(gif|apng|webp|avif)$").expect("valid animated path regex"));

static RAW_FORMAT_HINT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(format|fm)=(webp|gif|apng|avif)\b").expect("valid format hint regex")
});

/// Acquisition path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Network,
    Render,
}

impl Strategy {
    #[inline]
    #[must_use]
    pub fn other(self) -> Self {
        match self {
            Strategy::Network => Strategy::Render,
            Strategy::Render => Strategy::Network,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Strategy::Network => "network",
            Strategy::Render => "render",
        })
    }
}

/// Whether to fetch before rendering
///
/// Explicit preferences win. Under `Auto` the network goes first for
/// unknown extensions and for anything that looks animated, since drawing
/// to a surface keeps only the first frame. Purely heuristic.
#[must_use]
pub fn should_prefer_network(metadata: &ImageMetadata, options: &DownloadOptions) -> bool {
    match options.prefer {
        AcquisitionPreference::Network => return true,
        AcquisitionPreference::Canvas => return false,
        AcquisitionPreference::Auto => {}
    }

    // data: URLs have no path, so their media type is the only signal
    if metadata.mime.as_deref().is_some_and(is_animated_mime) {
        return true;
    }

    let extension = metadata.extension.as_deref().map(str::to_ascii_lowercase);
    let Some(extension) =
        extension.filter(|ext| known_extensions().any(|known| known == ext.as_str()))
    else {
        return true;
    };

    let path = metadata
        .src
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    if ANIMATED_PATH.is_match(path) {
        return true;
    }

    !STATIC_EXTENSIONS.contains(&extension.as_str()) && has_animated_format_hint(&metadata.src)
}

fn is_animated_mime(mime: &str) -> bool {
    let essence = mime.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    essence
        .strip_prefix("image/")
        .is_some_and(|subtype| ANIMATED_FORMATS.contains(&subtype))
}

/// Query parameters asking a CDN for an animated-capable format
fn has_animated_format_hint(src: &str) -> bool {
    if let Ok(url) = Url::parse(src) {
        let hinted = url.query_pairs().any(|(key, value)| {
            FORMAT_QUERY_KEYS.contains(&key.to_ascii_lowercase().as_str())
                && ANIMATED_FORMATS.contains(&value.to_ascii_lowercase().as_str())
        });
        if hinted {
            return true;
        }
    }
    RAW_FORMAT_HINT.is_match(src)
}

/// Strategy [`acquire_with_failover`] tries first
#[must_use]
pub fn preferred_strategy(metadata: &ImageMetadata, options: &DownloadOptions) -> Strategy {
    if should_prefer_network(metadata, options) {
        Strategy::Network
    } else {
        Strategy::Render
    }
}

/// Fetch `url` and validate that the body is an image
///
/// The type comes from `Content-Type`, falling back to the body's own type.
///
/// # Errors
/// Returns `Network`, `HttpStatus` or `ContentTypeMismatch`
pub async fn fetch_image<F>(fetcher: &F, url: &str) -> Result<Blob, AcquireError>
where
    F: Fetcher + ?Sized,
{
    let response = fetcher
        .fetch(url)
        .await
        .map_err(|source| AcquireError::Network {
            url: url.to_string(),
            source,
        })?;

    if !response.is_success() {
        return Err(AcquireError::HttpStatus {
            url: url.to_string(),
            status: response.status,
        });
    }

    let content_type = response
        .content_type
        .filter(|header| !header.trim().is_empty())
        .unwrap_or_else(|| response.body.mime().to_string());
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if !mime.starts_with("image/") {
        return Err(AcquireError::ContentTypeMismatch {
            url: url.to_string(),
            content_type,
        });
    }

    Ok(response.body.with_mime(mime))
}

/// Load `src`, giving up after `timeout`
///
/// A timed-out load future is dropped; the host may keep transferring.
///
/// # Errors
/// Returns `LoadTimeout` or `LoadFailed`
pub async fn load_with_timeout<L>(
    loader: &L,
    src: &str,
    timeout: Option<Duration>,
) -> Result<LoadedImage, AcquireError>
where
    L: ImageLoader + ?Sized,
{
    let load = loader.load(src);
    let loaded = match timeout {
        Some(limit) => tokio::time::timeout(limit, load)
            .await
            .map_err(|_| AcquireError::LoadTimeout {
                src: src.to_string(),
                timeout: limit,
            })?,
        None => load.await,
    };

    loaded.map_err(|source| AcquireError::LoadFailed {
        src: src.to_string(),
        source,
    })
}

/// Draw a loaded element and encode it as `mime`, or PNG if `mime` has no
/// encoder
///
/// # Errors
/// Returns `MissingDimensions`, `TaintedSurface` or `Encode`
pub fn render_loaded(loaded: &LoadedImage, mime: Option<&str>) -> Result<Blob, AcquireError> {
    if loaded.natural_width() == 0 || loaded.natural_height() == 0 {
        return Err(AcquireError::MissingDimensions {
            src: loaded.src.clone(),
        });
    }
    if !loaded.origin_clean {
        return Err(AcquireError::TaintedSurface {
            src: loaded.src.clone(),
        });
    }

    let surface = draw_on_surface(&loaded.pixels);
    let mime = mime.filter(|m| is_encodable(m)).unwrap_or(PNG_MIME);
    Ok(encode_surface(&surface, mime)?)
}

async fn render_image<L>(
    loader: &L,
    image: &DownloadableImage,
    metadata: &ImageMetadata,
    timeout: Option<Duration>,
) -> Result<Blob, AcquireError>
where
    L: ImageLoader + ?Sized,
{
    let already_loaded = match image {
        DownloadableImage::Element(element) => element.loaded.clone(),
        _ => None,
    };
    let loaded = match already_loaded {
        Some(loaded) => loaded,
        None => load_with_timeout(loader, &metadata.src, timeout).await?,
    };
    render_loaded(&loaded, metadata.mime.as_deref())
}

async fn run_strategy<H>(
    host: &H,
    strategy: Strategy,
    image: &DownloadableImage,
    metadata: &ImageMetadata,
    options: &DownloadOptions,
) -> Result<Blob, AcquireError>
where
    H: Fetcher + ImageLoader + ?Sized,
{
    match strategy {
        Strategy::Network => fetch_image(host, &metadata.src).await,
        Strategy::Render => render_image(host, image, metadata, options.timeout).await,
    }
}

/// Produce the blob for a classified source
///
/// Inline vectors and surfaces are serialized directly. Elements and
/// locators go through the preferred strategy, then the other one once.
///
/// # Errors
/// Returns the strategy error, or `FailoverExhausted` when both failed
pub async fn acquire_with_failover<H>(
    host: &H,
    image: &DownloadableImage,
    metadata: &ImageMetadata,
    options: &DownloadOptions,
) -> Result<Blob, AcquireError>
where
    H: Fetcher + ImageLoader + ?Sized,
{
    match image {
        DownloadableImage::InlineVector(markup) => return Ok(Blob::from_text(markup, SVG_MIME)),
        DownloadableImage::Surface(surface) => return Ok(encode_surface(surface, PNG_MIME)?),
        DownloadableImage::Element(_) | DownloadableImage::Locator(_) => {}
    }

    let first = preferred_strategy(metadata, options);
    tracing::debug!(src = %metadata.src, strategy = %first, "acquiring image");

    let primary = match run_strategy(host, first, image, metadata, options).await {
        Ok(blob) => return Ok(blob),
        Err(e) => e,
    };

    let second = first.other();
    tracing::warn!(
        src = %metadata.src,
        failed = %first,
        fallback = %second,
        "acquisition failed, trying fallback: {}",
        primary
    );

    run_strategy(host, second, image, metadata, options)
        .await
        .map_err(|fallback| AcquireError::FailoverExhausted {
            primary: Box::new(primary),
            fallback: Box::new(fallback),
        })
}
