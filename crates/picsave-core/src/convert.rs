//! Surface drawing, encoding and format conversion
//!
//! Conversion is best effort: [`convert`] never fails, it hands back the
//! input blob when anything along the way goes wrong.

use crate::error::ConversionError;
use crate::host::{ImageLoader, ObjectUrls};
use crate::metadata::PNG_MIME;
use crate::types::ConvertFormat;
use image::codecs::avif::AvifEncoder;
use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{imageops, ExtendedColorType, ImageEncoder, Rgb, RgbImage, Rgba, RgbaImage};
use picsave_archive::Blob;

/// JPEG quality used for every lossy encode
pub const JPEG_QUALITY: u8 = 92;

const AVIF_SPEED: u8 = 8;
const AVIF_QUALITY: u8 = 80;

/// MIME types [`encode_surface`] can produce
const ENCODABLE: &[&str] = &[PNG_MIME, "image/jpeg", "image/webp", "image/avif", "image/bmp"];

/// Whether a surface can be encoded as `mime`
#[must_use]
pub fn is_encodable(mime: &str) -> bool {
    ENCODABLE.contains(&mime)
}

/// Copy `pixels` onto a fresh transparent surface of the same size
#[must_use]
pub fn draw_on_surface(pixels: &RgbaImage) -> RgbaImage {
    let mut surface = RgbaImage::new(pixels.width(), pixels.height());
    imageops::replace(&mut surface, pixels, 0, 0);
    surface
}

/// Encode `surface` into a blob of type `mime`
///
/// JPEG has no alpha channel; transparent areas are composited on white.
///
/// # Errors
/// Returns `ConversionError::UnsupportedTarget` for types without an encoder,
/// or the codec error if encoding fails
pub fn encode_surface(surface: &RgbaImage, mime: &str) -> Result<Blob, ConversionError> {
    let (width, height) = surface.dimensions();
    if width == 0 || height == 0 {
        return Err(ConversionError::EmptySurface);
    }

    let mut bytes = Vec::new();
    match mime {
        PNG_MIME => PngEncoder::new(&mut bytes).write_image(
            surface.as_raw(),
            width,
            height,
            ExtendedColorType::Rgba8,
        )?,
        "image/jpeg" => {
            let flat = flatten_on_white(surface);
            JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY).write_image(
                flat.as_raw(),
                width,
                height,
                ExtendedColorType::Rgb8,
            )?;
        }
        "image/webp" => WebPEncoder::new_lossless(&mut bytes).write_image(
            surface.as_raw(),
            width,
            height,
            ExtendedColorType::Rgba8,
        )?,
        "image/avif" => AvifEncoder::new_with_speed_quality(&mut bytes, AVIF_SPEED, AVIF_QUALITY)
            .write_image(surface.as_raw(), width, height, ExtendedColorType::Rgba8)?,
        "image/bmp" => BmpEncoder::new(&mut bytes).write_image(
            surface.as_raw(),
            width,
            height,
            ExtendedColorType::Rgba8,
        )?,
        other => return Err(ConversionError::UnsupportedTarget(other.to_string())),
    }

    Ok(Blob::new(bytes, mime))
}

fn flatten_on_white(surface: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(surface.width(), surface.height(), |x, y| {
        let Rgba([r, g, b, a]) = *surface.get_pixel(x, y);
        let alpha = u32::from(a);
        let blend = |c: u8| ((u32::from(c) * alpha + 255 * (255 - alpha)) / 255) as u8;
        Rgb([blend(r), blend(g), blend(b)])
    })
}

/// Re-encode `blob` as `target`
///
/// Returns `blob` untouched when there is no target, when it already has
/// the target type, or when decoding or encoding fails.
pub async fn convert<H>(blob: Blob, target: Option<ConvertFormat>, host: &H) -> Blob
where
    H: ImageLoader + ObjectUrls + ?Sized,
{
    let Some(target) = target else {
        return blob;
    };
    if blob.mime().eq_ignore_ascii_case(target.mime()) {
        return blob;
    }

    match try_convert(&blob, target, host).await {
        Ok(converted) => {
            tracing::debug!(from = %blob.mime(), to = %target, size = converted.len(), "converted image");
            converted
        }
        Err(e) => {
            tracing::warn!(from = %blob.mime(), to = %target, "conversion failed, keeping original: {}", e);
            blob
        }
    }
}

async fn try_convert<H>(blob: &Blob, target: ConvertFormat, host: &H) -> Result<Blob, ConversionError>
where
    H: ImageLoader + ObjectUrls + ?Sized,
{
    let decoded = match decode_in_memory(blob) {
        Ok(pixels) => pixels,
        Err(e) => {
            tracing::debug!("in-memory decode unavailable ({}), loading through host", e);
            decode_with_host(blob, host).await?
        }
    };
    encode_surface(&draw_on_surface(&decoded), target.mime())
}

fn decode_in_memory(blob: &Blob) -> Result<RgbaImage, ConversionError> {
    Ok(image::load_from_memory(blob.data())?.to_rgba8())
}

/// Decode via a temporary object URL; the URL is revoked on every path
async fn decode_with_host<H>(blob: &Blob, host: &H) -> Result<RgbaImage, ConversionError>
where
    H: ImageLoader + ObjectUrls + ?Sized,
{
    let url = host.create_object_url(blob);
    let loaded = host.load(&url).await;
    host.revoke_object_url(&url);

    let loaded = loaded.map_err(ConversionError::Load)?;
    if loaded.natural_width() == 0 || loaded.natural_height() == 0 {
        return Err(ConversionError::EmptySurface);
    }
    Ok(loaded.pixels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostError, LoadedImage};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Calls {
        created: Mutex<Vec<String>>,
        revoked: Mutex<Vec<String>>,
    }

    struct Loader {
        result: Result<RgbaImage, HostError>,
        calls: Calls,
    }

    impl Loader {
        fn new(result: Result<RgbaImage, HostError>) -> Self {
            Self {
                result,
                calls: Calls::default(),
            }
        }
    }

    #[async_trait]
    impl ImageLoader for Loader {
        async fn load(&self, src: &str) -> Result<LoadedImage, HostError> {
            self.result
                .clone()
                .map(|pixels| LoadedImage::new(src, pixels))
        }
    }

    impl ObjectUrls for Loader {
        fn create_object_url(&self, _blob: &Blob) -> String {
            let mut created = self.calls.created.lock().unwrap();
            let url = format!("blob:test/{}", created.len());
            created.push(url.clone());
            url
        }

        fn revoke_object_url(&self, url: &str) {
            self.calls.revoked.lock().unwrap().push(url.to_string());
        }
    }

    fn checker() -> RgbaImage {
        RgbaImage::from_fn(4, 4, |x, y| {
            if (x + y) % 2 == 0 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 128])
            }
        })
    }

    fn png_blob() -> Blob {
        encode_surface(&checker(), PNG_MIME).unwrap()
    }

    #[test]
    fn png_round_trips_losslessly() {
        let blob = png_blob();
        assert_eq!(blob.mime(), PNG_MIME);
        let decoded = image::load_from_memory(blob.data()).unwrap().to_rgba8();
        assert_eq!(decoded, checker());
    }

    #[test]
    fn jpeg_flattens_alpha() {
        let transparent = RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 0]));
        let blob = encode_surface(&transparent, "image/jpeg").unwrap();
        let decoded = image::load_from_memory(blob.data()).unwrap().to_rgb8();
        assert!(decoded.pixels().all(|p| p.0.iter().all(|&c| c > 240)));
    }

    #[test]
    fn unsupported_target_and_empty_surface() {
        assert!(matches!(
            encode_surface(&checker(), "image/gif"),
            Err(ConversionError::UnsupportedTarget(_))
        ));
        assert!(matches!(
            encode_surface(&RgbaImage::new(0, 3), PNG_MIME),
            Err(ConversionError::EmptySurface)
        ));
        assert!(is_encodable("image/webp"));
        assert!(!is_encodable("image/svg+xml"));
    }

    #[tokio::test]
    async fn converts_png_to_webp_in_memory() {
        let loader = Loader::new(Err(HostError::Load("unused".to_string())));
        let out = convert(png_blob(), Some(ConvertFormat::Webp), &loader).await;

        assert_eq!(out.mime(), "image/webp");
        assert_eq!(image::guess_format(out.data()).unwrap(), image::ImageFormat::WebP);
        assert!(loader.calls.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn no_target_or_same_type_is_noop() {
        let loader = Loader::new(Err(HostError::Load("unused".to_string())));
        let blob = png_blob();

        let same = convert(blob.clone(), None, &loader).await;
        assert_eq!(same.data(), blob.data());

        let jpeg = Blob::new(vec![1u8, 2, 3], "image/jpeg");
        let out = convert(jpeg.clone(), Some(ConvertFormat::Jpg), &loader).await;
        assert_eq!(out.data(), jpeg.data());
    }

    #[tokio::test]
    async fn falls_back_to_host_decode_and_revokes() {
        let loader = Loader::new(Ok(checker()));
        let svg = Blob::from_text("<svg xmlns=\"http://www.w3.org/2000/svg\"/>", "image/svg+xml");

        let out = convert(svg, Some(ConvertFormat::Jpg), &loader).await;
        assert_eq!(out.mime(), "image/jpeg");

        let created = loader.calls.created.lock().unwrap().clone();
        assert_eq!(created.len(), 1);
        assert_eq!(*loader.calls.revoked.lock().unwrap(), created);
    }

    #[tokio::test]
    async fn failure_returns_original_and_still_revokes() {
        let loader = Loader::new(Err(HostError::Load("broken".to_string())));
        let garbage = Blob::new(vec![0u8; 16], "image/png");

        let out = convert(garbage.clone(), Some(ConvertFormat::Avif), &loader).await;
        assert_eq!(out.mime(), "image/png");
        assert_eq!(out.data(), garbage.data());
        assert_eq!(loader.calls.revoked.lock().unwrap().len(), 1);
    }
}
