//! Writing acquired images into an [`ArchiveStore`]
//!
//! Both operations are queued on the store, so a later
//! [`ArchiveStore::to_blob`] waits for them even when the caller never
//! awaits the returned future.

use crate::batch::{batch_delay_for_each, BatchOptions, Settled};
use crate::downloader::ImageDownloader;
use crate::error::DownloadError;
use crate::source::SourceValue;
use crate::types::DownloadOptions;
use picsave_archive::{path_join, ArchiveStore};
use std::future::Future;
use std::sync::Arc;

/// Image acquisition into an archive
pub trait ArchiveImages {
    /// Acquire `source` and store it under its computed file name
    ///
    /// `options.directory`, when set, is prepended to the name. Resolves to
    /// the collision-free path actually used.
    fn add_image(
        &self,
        downloader: &Arc<ImageDownloader>,
        source: SourceValue,
        options: &DownloadOptions,
    ) -> impl Future<Output = Result<String, DownloadError>> + Send + 'static;

    /// Add many images in delayed batches; each one is queued separately
    fn add_images(
        &self,
        downloader: &Arc<ImageDownloader>,
        sources: Vec<SourceValue>,
        options: &DownloadOptions,
        batch: BatchOptions,
    ) -> impl Future<Output = Result<Vec<Settled<String, DownloadError>>, DownloadError>>
           + Send
           + 'static;
}

impl ArchiveImages for ArchiveStore {
    fn add_image(
        &self,
        downloader: &Arc<ImageDownloader>,
        source: SourceValue,
        options: &DownloadOptions,
    ) -> impl Future<Output = Result<String, DownloadError>> + Send + 'static {
        let store = self.clone();
        let downloader = Arc::clone(downloader);
        let options = options.clone();

        let queued = self.enqueue(async move {
            let acquired = match downloader.acquire(source, &options).await {
                Ok(acquired) => acquired,
                Err(e) => {
                    tracing::error!("Archive image failed: {}", e);
                    return Err(DownloadError::from(e));
                }
            };
            let path = path_join([options.directory.as_deref(), Some(acquired.name.as_str())]);
            let stored = store.add_file(&path, acquired.blob);
            tracing::debug!(archive = %store.name(), path = %stored, "added image to archive");
            Ok(stored)
        });

        async move { queued.await? }
    }

    fn add_images(
        &self,
        downloader: &Arc<ImageDownloader>,
        sources: Vec<SourceValue>,
        options: &DownloadOptions,
        batch: BatchOptions,
    ) -> impl Future<Output = Result<Vec<Settled<String, DownloadError>>, DownloadError>>
           + Send
           + 'static {
        let store = self.clone();
        let downloader = Arc::clone(downloader);
        let options = options.clone();

        let queued = self.enqueue(async move {
            let results = batch_delay_for_each(
                &sources,
                |source, _, _| store.add_image(&downloader, source.clone(), &options),
                batch,
            )
            .await;

            let failed = results.iter().filter(|r| r.is_rejected()).count();
            if failed > 0 {
                tracing::warn!("{} of {} archive images failed", failed, results.len());
            }
            results
        });

        async move { Ok(queued.await?) }
    }
}
