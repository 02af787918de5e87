//! Native host
//!
//! [`Host`](picsave_core::Host) backed by the operating system:
//! - `fetch` goes over HTTP(S) with `reqwest`, decodes `data:` URLs locally
//!   and resolves live object URLs
//! - `load` fetches the bytes and decodes them with `image`; there is no
//!   origin policy outside a browser, so every load is origin-clean
//! - object URLs are `blob:picsave/<uuid>` keys into an in-memory table
//! - `save` writes into an output directory and never overwrites

use crate::data_url::{decode_data_url, is_data_url};
use async_trait::async_trait;
use dashmap::DashMap;
use picsave_archive::path::with_counter;
use picsave_archive::{sanitize_filename, Blob, FileSaver, SaveError, OCTET_STREAM};
use picsave_core::{FetchResponse, Fetcher, HostError, ImageLoader, LoadedImage, ObjectUrls};
use reqwest::header::CONTENT_TYPE;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

/// Prefix of object URLs created by [`NativeHost`]
pub const OBJECT_URL_PREFIX: &str = "blob:picsave/";

const USER_AGENT: &str = concat!("picsave/", env!("CARGO_PKG_VERSION"));

/// Host for the command line tool
#[derive(Debug)]
pub struct NativeHost {
    client: reqwest::Client,
    out_dir: PathBuf,
    object_urls: DashMap<String, Blob>,
}

impl NativeHost {
    /// Host saving into `out_dir` with a default HTTP client
    ///
    /// # Errors
    /// Returns `HostError::Other` if the HTTP client cannot be built
    pub fn new(out_dir: impl Into<PathBuf>, request_timeout: Option<Duration>) -> Result<Self, HostError> {
        let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| HostError::Other(format!("cannot build HTTP client: {e}")))?;
        Ok(Self::with_client(client, out_dir))
    }

    #[must_use]
    pub fn with_client(client: reqwest::Client, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            out_dir: out_dir.into(),
            object_urls: DashMap::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Number of object URLs not yet revoked
    #[must_use]
    pub fn live_object_urls(&self) -> usize {
        self.object_urls.len()
    }

    async fn fetch_remote(&self, url: &str) -> Result<FetchResponse, HostError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| HostError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| HostError::Network(e.to_string()))?;

        tracing::debug!(url, status, size = bytes.len(), "fetched");
        let mime = content_type.as_deref().unwrap_or(OCTET_STREAM).to_string();
        Ok(FetchResponse {
            status,
            content_type,
            body: Blob::new(bytes.to_vec(), mime),
        })
    }

    /// Create the first file under `out_dir` named `filename` or
    /// `filename (n)` that does not exist yet
    ///
    /// Creation is exclusive, so concurrent saves of one name each get their
    /// own file.
    async fn create_free_file(&self, filename: &str) -> io::Result<(PathBuf, File)> {
        let mut n = 0;
        loop {
            let candidate = if n == 0 {
                filename.to_string()
            } else {
                with_counter(filename, n)
            };
            let path = self.out_dir.join(&candidate);
            match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => n += 1,
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl Fetcher for NativeHost {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, HostError> {
        if is_data_url(url) {
            let decoded = decode_data_url(url).map_err(|e| HostError::Network(e.to_string()))?;
            return Ok(FetchResponse::ok(decoded.into_blob()));
        }
        if url.starts_with(OBJECT_URL_PREFIX) {
            let blob = self.object_urls.get(url).map(|entry| entry.value().clone());
            return Ok(blob.map_or_else(|| FetchResponse::status(404), FetchResponse::ok));
        }
        self.fetch_remote(url).await
    }
}

#[async_trait]
impl ImageLoader for NativeHost {
    async fn load(&self, src: &str) -> Result<LoadedImage, HostError> {
        let response = self.fetch(src).await.map_err(|e| HostError::Load(e.to_string()))?;
        if !response.is_success() {
            return Err(HostError::Load(format!("{src} answered {}", response.status)));
        }

        let decoded = image::load_from_memory(response.body.data())
            .map_err(|e| HostError::Load(format!("cannot decode {src}: {e}")))?;
        Ok(LoadedImage::new(src, decoded.to_rgba8()))
    }
}

impl ObjectUrls for NativeHost {
    fn create_object_url(&self, blob: &Blob) -> String {
        let url = format!("{OBJECT_URL_PREFIX}{}", uuid::Uuid::new_v4());
        self.object_urls.insert(url.clone(), blob.clone());
        url
    }

    fn revoke_object_url(&self, url: &str) {
        self.object_urls.remove(url);
    }
}

#[async_trait]
impl FileSaver for NativeHost {
    async fn save(&self, blob: Blob, filename: &str) -> Result<(), SaveError> {
        let io_error = |source| SaveError::Io {
            filename: filename.to_string(),
            source,
        };

        tokio::fs::create_dir_all(&self.out_dir).await.map_err(io_error)?;
        let (path, mut file) = self
            .create_free_file(&sanitize_filename(filename))
            .await
            .map_err(io_error)?;
        file.write_all(blob.data()).await.map_err(io_error)?;
        file.flush().await.map_err(io_error)?;

        tracing::info!("Wrote {} ({} bytes)", path.display(), blob.len());
        Ok(())
    }
}
