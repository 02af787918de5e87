//! Testing utilities for the picsave workspace
//!
//! Shared test host, fixtures, and assertions.

#![allow(missing_docs)]

use async_trait::async_trait;
use image::codecs::gif::GifEncoder;
use image::codecs::png::PngEncoder;
use image::{Delay, ExtendedColorType, Frame, ImageEncoder, Rgba, RgbaImage};
use parking_lot::Mutex;
use picsave_archive::{Blob, FileSaver, SaveError};
use picsave_core::{FetchResponse, Fetcher, Host, HostError, ImageLoader, LoadedImage, ObjectUrls};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Prefix of object URLs handed out by [`MockHost`]
pub const OBJECT_URL_PREFIX: &str = "blob:mock/";

/// Scripted host: fetches and loads answer from per-URL tables
///
/// Unscripted fetches fail with a network error. Unscripted loads of live
/// object URLs decode the blob with the `image` crate; any other unscripted
/// load fails with a load error. Every call is recorded.
#[derive(Default)]
pub struct MockHost {
    responses: Mutex<HashMap<String, Result<FetchResponse, HostError>>>,
    images: Mutex<HashMap<String, Result<LoadedImage, HostError>>>,
    object_urls: Mutex<HashMap<String, Blob>>,
    load_delay: Mutex<Duration>,
    save_failure: Mutex<Option<String>>,
    created: Mutex<Vec<String>>,
    revoked: Mutex<Vec<String>>,
    fetches: Mutex<Vec<String>>,
    loads: Mutex<Vec<String>>,
    saved: Mutex<Vec<(String, Blob)>>,
}

impl MockHost {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle usable as `Arc<dyn Host>`
    #[must_use]
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    #[must_use]
    pub fn with_response(self, url: &str, response: FetchResponse) -> Self {
        self.responses.lock().insert(url.to_string(), Ok(response));
        self
    }

    #[must_use]
    pub fn with_fetch_error(self, url: &str, error: HostError) -> Self {
        self.responses.lock().insert(url.to_string(), Err(error));
        self
    }

    /// Loading `url` yields `pixels`
    #[must_use]
    pub fn with_image(self, url: &str, pixels: RgbaImage) -> Self {
        let loaded = LoadedImage::new(url, pixels);
        self.images.lock().insert(url.to_string(), Ok(loaded));
        self
    }

    /// Loading `url` yields `pixels` that taint a surface
    #[must_use]
    pub fn with_cross_origin_image(self, url: &str, pixels: RgbaImage) -> Self {
        let loaded = LoadedImage::new(url, pixels).cross_origin();
        self.images.lock().insert(url.to_string(), Ok(loaded));
        self
    }

    #[must_use]
    pub fn with_load_error(self, url: &str, error: HostError) -> Self {
        self.images.lock().insert(url.to_string(), Err(error));
        self
    }

    /// Every load waits this long before answering
    #[must_use]
    pub fn with_load_delay(self, delay: Duration) -> Self {
        *self.load_delay.lock() = delay;
        self
    }

    /// Every save is rejected with `reason`
    #[must_use]
    pub fn with_failing_saves(self, reason: &str) -> Self {
        *self.save_failure.lock() = Some(reason.to_string());
        self
    }

    /// URLs passed to `fetch`, in call order
    #[must_use]
    pub fn fetches(&self) -> Vec<String> {
        self.fetches.lock().clone()
    }

    /// URLs passed to `load`, in call order
    #[must_use]
    pub fn loads(&self) -> Vec<String> {
        self.loads.lock().clone()
    }

    #[must_use]
    pub fn created_urls(&self) -> Vec<String> {
        self.created.lock().clone()
    }

    #[must_use]
    pub fn revoked_urls(&self) -> Vec<String> {
        self.revoked.lock().clone()
    }

    /// Object URLs created but not revoked
    #[must_use]
    pub fn live_object_urls(&self) -> usize {
        self.object_urls.lock().len()
    }

    /// Saved files as `(filename, blob)`, in save order
    #[must_use]
    pub fn saved(&self) -> Vec<(String, Blob)> {
        self.saved.lock().clone()
    }

    /// Names of saved files, in save order
    #[must_use]
    pub fn saved_names(&self) -> Vec<String> {
        self.saved.lock().iter().map(|(name, _)| name.clone()).collect()
    }

    fn load_object_url(&self, src: &str) -> Option<Result<LoadedImage, HostError>> {
        let blob = self.object_urls.lock().get(src).cloned()?;
        Some(
            image::load_from_memory(blob.data())
                .map(|decoded| LoadedImage::new(src, decoded.to_rgba8()))
                .map_err(|e| HostError::Load(e.to_string())),
        )
    }
}

#[async_trait]
impl Fetcher for MockHost {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, HostError> {
        self.fetches.lock().push(url.to_string());
        self.responses
            .lock()
            .get(url)
            .cloned()
            .unwrap_or_else(|| Err(HostError::Network(format!("no route to {url}"))))
    }
}

#[async_trait]
impl ImageLoader for MockHost {
    async fn load(&self, src: &str) -> Result<LoadedImage, HostError> {
        self.loads.lock().push(src.to_string());
        let delay = *self.load_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.images.lock().get(src).cloned();
        scripted
            .or_else(|| self.load_object_url(src))
            .unwrap_or_else(|| Err(HostError::Load(format!("cannot load {src}"))))
    }
}

impl ObjectUrls for MockHost {
    fn create_object_url(&self, blob: &Blob) -> String {
        let mut created = self.created.lock();
        let url = format!("{OBJECT_URL_PREFIX}{}", created.len());
        created.push(url.clone());
        self.object_urls.lock().insert(url.clone(), blob.clone());
        url
    }

    fn revoke_object_url(&self, url: &str) {
        self.revoked.lock().push(url.to_string());
        self.object_urls.lock().remove(url);
    }
}

#[async_trait]
impl FileSaver for MockHost {
    async fn save(&self, blob: Blob, filename: &str) -> Result<(), SaveError> {
        if let Some(reason) = self.save_failure.lock().clone() {
            return Err(SaveError::Rejected {
                filename: filename.to_string(),
                reason,
            });
        }
        self.saved.lock().push((filename.to_string(), blob));
        Ok(())
    }
}

/// Upcast for APIs taking `Arc<dyn Host>`
#[must_use]
pub fn as_host(host: &Arc<MockHost>) -> Arc<dyn Host> {
    Arc::clone(host) as Arc<dyn Host>
}

/// Opaque image of one color
#[must_use]
pub fn solid(width: u32, height: u32, color: [u8; 4]) -> RgbaImage {
    RgbaImage::from_pixel(width, height, Rgba(color))
}

/// Red/blue checkerboard with a half-transparent half
#[must_use]
pub fn checkerboard(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        if (x + y) % 2 == 0 {
            Rgba([220, 30, 30, 255])
        } else {
            Rgba([30, 30, 220, 128])
        }
    })
}

/// PNG bytes of `pixels`
#[must_use]
pub fn png_bytes(pixels: &RgbaImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    PngEncoder::new(&mut bytes)
        .write_image(pixels.as_raw(), pixels.width(), pixels.height(), ExtendedColorType::Rgba8)
        .expect("png encoding of fixture");
    bytes
}

/// `image/png` blob of a small checkerboard
#[must_use]
pub fn png_blob() -> Blob {
    Blob::new(png_bytes(&checkerboard(4, 4)), "image/png")
}

/// Two-frame animated GIF bytes
#[must_use]
pub fn animated_gif_bytes() -> Vec<u8> {
    let mut bytes = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut bytes);
        let frames = [solid(2, 2, [255, 0, 0, 255]), solid(2, 2, [0, 255, 0, 255])]
            .into_iter()
            .map(|pixels| Frame::from_parts(pixels, 0, 0, Delay::from_numer_denom_ms(100, 1)));
        encoder
            .encode_frames(frames)
            .expect("gif encoding of fixture");
    }
    bytes
}

/// 200 response carrying `bytes` typed as `mime`
#[must_use]
pub fn image_response(bytes: Vec<u8>, mime: &str) -> FetchResponse {
    FetchResponse::ok(Blob::new(bytes, mime))
}

/// Assert that `blob` decodes to an image of the given size
///
/// # Panics
/// Panics when decoding fails or the size differs
pub fn assert_decodes_to(blob: &Blob, width: u32, height: u32) {
    let decoded = image::load_from_memory(blob.data())
        .unwrap_or_else(|e| panic!("blob of type {} does not decode: {e}", blob.mime()));
    assert_eq!(
        (decoded.width(), decoded.height()),
        (width, height),
        "decoded size of {} blob",
        blob.mime()
    );
}
