//! The image downloader facade
//!
//! Runs the whole pipeline for a source value:
//! - classify the value into a [`DownloadableImage`]
//! - resolve pre-acquisition metadata
//! - acquire through the preferred strategy with one failover
//! - convert to the requested format
//! - compute the output file name
//!
//! and either hands the result back, saves it through the host, or (see
//! [`crate::archive`]) writes it into an archive.

use crate::batch::{batch_delay_for_each, BatchOptions, Settled};
use crate::config::DownloaderConfig;
use crate::convert::convert;
use crate::error::{AcquireError, DownloadError};
use crate::host::Host;
use crate::metadata::{compute_filename, extension_from_mime, resolve_metadata, FilenameRequest};
use crate::source::{classify, SourceValue};
use crate::strategy::acquire_with_failover;
use crate::types::{DownloadOptions, DownloadableImage, ImageDownloadMetadata};
use std::fmt;
use std::sync::Arc;

/// Acquires, converts, names and saves images through a [`Host`]
#[derive(Clone)]
pub struct ImageDownloader {
    config: DownloaderConfig,
    host: Arc<dyn Host>,
}

impl ImageDownloader {
    /// Create a downloader with default configuration
    #[must_use]
    pub fn new(host: Arc<dyn Host>) -> Self {
        Self::with_config(host, DownloaderConfig::default())
    }

    /// Create a downloader with `config`
    #[must_use]
    pub fn with_config(host: Arc<dyn Host>, config: DownloaderConfig) -> Self {
        Self { config, host }
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &DownloaderConfig {
        &self.config
    }

    #[inline]
    #[must_use]
    pub fn host(&self) -> &Arc<dyn Host> {
        &self.host
    }

    /// Per-call options seeded from the configuration
    #[must_use]
    pub fn default_options(&self) -> DownloadOptions {
        self.config.download_options()
    }

    /// Acquire `source` without saving it
    ///
    /// # Errors
    /// Returns `AcquireError::UnsupportedSource` for unclassifiable values,
    /// or the acquisition error of the last attempted strategy
    pub async fn acquire(
        &self,
        source: SourceValue,
        options: &DownloadOptions,
    ) -> Result<ImageDownloadMetadata, AcquireError> {
        let image = classify(source)?;
        self.acquire_image(&image, options).await
    }

    /// Acquire an already classified image
    ///
    /// # Errors
    /// Returns the acquisition error of the last attempted strategy
    pub async fn acquire_image(
        &self,
        image: &DownloadableImage,
        options: &DownloadOptions,
    ) -> Result<ImageDownloadMetadata, AcquireError> {
        let metadata = resolve_metadata(image);
        tracing::debug!(kind = %image.kind(), src = %metadata.src, "resolved image metadata");

        let blob = acquire_with_failover(&*self.host, image, &metadata, options).await?;
        let blob = convert(blob, options.convert_format, &*self.host).await;

        let override_name = options.filename.resolve(image, options.params.as_ref());
        let url = Some(metadata.src.as_str()).filter(|src| !src.is_empty());
        let request = FilenameRequest::new(&self.config.default_base_name, self.config.default_extension())
            .with_name(override_name.as_deref())
            .with_url(url)
            .with_mime(Some(blob.mime()));
        let name = compute_filename(&request);

        tracing::debug!(name = %name, mime = %blob.mime(), size = blob.len(), "acquired image");
        Ok(ImageDownloadMetadata {
            src: metadata.src,
            name,
            extension: extension_from_mime(blob.mime()),
            mime: blob.mime().to_string(),
            blob,
        })
    }

    /// Acquire `source` and save it through the host
    ///
    /// Returns the file name it was saved under.
    ///
    /// # Errors
    /// Returns the acquisition or save error; it is also logged
    pub async fn download_image(
        &self,
        source: SourceValue,
        options: &DownloadOptions,
    ) -> Result<String, DownloadError> {
        let result = self.acquire_and_save(source, options).await;
        match &result {
            Ok(name) => tracing::info!("Saved image as {}", name),
            Err(e) => tracing::error!("Image download failed: {}", e),
        }
        result
    }

    async fn acquire_and_save(
        &self,
        source: SourceValue,
        options: &DownloadOptions,
    ) -> Result<String, DownloadError> {
        let acquired = self.acquire(source, options).await?;
        self.host.save(acquired.blob, &acquired.name).await?;
        Ok(acquired.name)
    }

    /// Download every source in delayed batches
    ///
    /// One settled outcome per source, in input order.
    pub async fn download_images(
        &self,
        sources: &[SourceValue],
        options: &DownloadOptions,
        batch: BatchOptions,
    ) -> Vec<Settled<String, DownloadError>> {
        tracing::info!("Downloading {} images", sources.len());
        let results = batch_delay_for_each(
            sources,
            |source, _, _| self.download_image(source.clone(), options),
            batch,
        )
        .await;

        let failed = results.iter().filter(|r| r.is_rejected()).count();
        if failed > 0 {
            tracing::warn!("{} of {} image downloads failed", failed, results.len());
        }
        results
    }
}

impl fmt::Debug for ImageDownloader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageDownloader")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
