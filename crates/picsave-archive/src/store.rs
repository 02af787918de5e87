//! In-memory archive store
//!
//! [`ArchiveStore`] maps sanitized, collision-free paths to blobs and turns
//! them into a ZIP container on demand. The container is cached and thrown
//! away on every mutation; the next [`ArchiveStore::to_blob`] rebuilds it.

use crate::blob::Blob;
use crate::error::ArchiveError;
use crate::path::{
    as_directory_path, is_directory_path, sanitize_filename, sanitize_filepath, with_counter,
    SEPARATOR,
};
use crate::queue::WorkQueue;
use crate::save::FileSaver;
use crate::subdir::SubdirectoryHandle;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::future::Future;
use std::io::{Cursor, Write};
use std::sync::{Arc, Weak};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// MIME type of the serialized container
pub const ZIP_MIME: &str = "application/zip";

/// Shared state behind every clone of a store
#[derive(Debug)]
pub(crate) struct StoreInner {
    name: String,
    state: RwLock<StoreState>,
    queue: WorkQueue,
}

#[derive(Debug, Default)]
struct StoreState {
    files: IndexMap<String, Blob>,
    /// Serialized container, `None` when dirty
    container: Option<Blob>,
}

impl StoreState {
    fn invalidate(&mut self) {
        self.container = None;
    }
}

/// Path-addressed blob store with lazy ZIP materialization
///
/// Clones share the same entries and queue.
#[derive(Debug, Clone)]
pub struct ArchiveStore {
    inner: Arc<StoreInner>,
}

impl ArchiveStore {
    /// Create an empty store; `name` is sanitized
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                name: sanitize_filename(name),
                state: RwLock::new(StoreState::default()),
                queue: WorkQueue::new(),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<StoreInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<StoreInner> {
        Arc::downgrade(&self.inner)
    }

    /// Whether two values refer to the same underlying store
    #[inline]
    #[must_use]
    pub fn same_store(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Sanitized archive name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Pending-operation queue of this store
    #[inline]
    #[must_use]
    pub fn queue(&self) -> &WorkQueue {
        &self.inner.queue
    }

    /// Run `operation` as a tracked mutation of this store
    ///
    /// See [`WorkQueue::enqueue`].
    pub fn enqueue<F, T>(
        &self,
        operation: F,
    ) -> impl Future<Output = Result<T, ArchiveError>> + Send + 'static
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.inner.queue.enqueue(operation)
    }

    /// Store `blob` under a sanitized, collision-free version of `path`
    ///
    /// Returns the path actually used.
    pub fn add_file(&self, path: &str, blob: Blob) -> String {
        let mut state = self.inner.state.write();
        let safe = safe_path_in(&state.files, path, &[]);
        tracing::debug!(archive = %self.inner.name, path = %safe, size = blob.len(), "adding file");
        state.files.insert(safe.clone(), blob);
        state.invalidate();
        safe
    }

    /// Collision-free version of `path`, treating keys in `ignoring` as absent
    #[must_use]
    pub fn get_safe_path(&self, path: &str, ignoring: &[String]) -> String {
        safe_path_in(&self.inner.state.read().files, path, ignoring)
    }

    /// Move the entry at `from` to a collision-free version of `to`
    ///
    /// # Errors
    /// - `ArchiveError::NotFound` if nothing matches `from`
    /// - `ArchiveError::AmbiguousMatch` if `from` only matches by suffix and
    ///   more than one entry ends with it
    pub fn rename_file(&self, from: &str, to: &str) -> Result<String, ArchiveError> {
        let mut state = self.inner.state.write();
        let key = resolve_key(&state.files, &sanitize_filepath(from))?;
        let dest = safe_path_in(&state.files, to, std::slice::from_ref(&key));

        if dest != key {
            if let Some(blob) = state.files.shift_remove(&key) {
                state.files.insert(dest.clone(), blob);
                state.invalidate();
            }
        }
        tracing::debug!(archive = %self.inner.name, from = %key, to = %dest, "renamed file");
        Ok(dest)
    }

    /// Delete the entry at `path`; with `recursive`, also everything below it
    ///
    /// Returns the removed keys.
    ///
    /// # Errors
    /// - `ArchiveError::NotFound` if nothing was removed
    /// - `ArchiveError::AmbiguousMatch` if a suffix lookup is ambiguous
    pub fn delete_file(&self, path: &str, recursive: bool) -> Result<Vec<String>, ArchiveError> {
        let sanitized = sanitize_filepath(path);
        let mut state = self.inner.state.write();
        let mut removed = Vec::new();

        let prefix = match resolve_key(&state.files, &sanitized) {
            Ok(key) => {
                state.files.shift_remove(&key);
                let prefix = as_directory_path(&key);
                removed.push(key);
                prefix
            }
            Err(ArchiveError::NotFound(_)) if recursive => as_directory_path(&sanitized),
            Err(e) => return Err(e),
        };

        if recursive {
            removed.extend(remove_prefix_in(&mut state.files, &prefix));
        }

        if removed.is_empty() {
            return Err(ArchiveError::NotFound(sanitized));
        }

        state.invalidate();
        tracing::debug!(archive = %self.inner.name, count = removed.len(), "deleted entries");
        Ok(removed)
    }

    /// Virtual handle over everything stored below `path`
    #[must_use]
    pub fn get_subdirectory(&self, path: &str) -> SubdirectoryHandle {
        let dir = as_directory_path(&sanitize_filepath(path));
        SubdirectoryHandle::new(dir, self.downgrade())
    }

    /// Blob stored at exactly `path`
    #[must_use]
    pub fn get(&self, path: &str) -> Option<Blob> {
        self.inner.state.read().files.get(path).cloned()
    }

    /// Whether an entry exists at exactly `path`
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.inner.state.read().files.contains_key(path)
    }

    /// Snapshot of all entries in insertion order
    #[must_use]
    pub fn files(&self) -> Vec<(String, Blob)> {
        self.inner
            .state
            .read()
            .files
            .iter()
            .map(|(path, blob)| (path.clone(), blob.clone()))
            .collect()
    }

    /// All stored paths in insertion order
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        self.inner.state.read().files.keys().cloned().collect()
    }

    /// Get entry count
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.state.read().files.len()
    }

    /// Check if empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.state.read().files.is_empty()
    }

    /// Whether the cached container must be rebuilt before the next read
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.inner.state.read().container.is_none()
    }

    /// Serialize the store into a ZIP blob
    ///
    /// Drains the work queue first, then reuses the cached container unless a
    /// mutation discarded it.
    ///
    /// # Errors
    /// Returns error if the ZIP writer fails
    pub async fn to_blob(&self) -> Result<Blob, ArchiveError> {
        self.inner.queue.drain().await;

        let mut state = self.inner.state.write();
        if let Some(container) = &state.container {
            return Ok(container.clone());
        }

        let container = build_container(&state.files)?;
        tracing::debug!(
            archive = %self.inner.name,
            entries = state.files.len(),
            size = container.len(),
            "materialized container"
        );
        state.container = Some(container.clone());
        Ok(container)
    }

    /// Serialize and hand `<name>.zip` to the host's save primitive
    ///
    /// Uses the store name when `name` is `None`. Returns the file name.
    ///
    /// # Errors
    /// Returns error if serialization or saving fails
    pub async fn download<S>(&self, name: Option<&str>, saver: &S) -> Result<String, ArchiveError>
    where
        S: FileSaver + ?Sized,
    {
        let blob = self.to_blob().await?;
        let filename = format!(
            "{}.zip",
            name.map_or_else(|| self.inner.name.clone(), sanitize_filename)
        );
        saver.save(blob, &filename).await?;
        tracing::info!(archive = %self.inner.name, %filename, "archive saved");
        Ok(filename)
    }

    /// Keys at or below a directory prefix
    pub(crate) fn keys_under(&self, prefix: &str) -> Vec<String> {
        self.inner
            .state
            .read()
            .files
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Replace the `old` prefix with `new` on every key below `old`
    pub(crate) fn rewrite_prefix(&self, old: &str, new: &str) -> usize {
        let mut state = self.inner.state.write();
        let files = std::mem::take(&mut state.files);
        let mut moved = 0;

        state.files = files
            .into_iter()
            .map(|(key, blob)| match key.strip_prefix(old) {
                Some(rest) => {
                    moved += 1;
                    (format!("{new}{rest}"), blob)
                }
                None => (key, blob),
            })
            .collect();

        if moved > 0 {
            state.invalidate();
        }
        moved
    }

    /// Remove every key below a directory prefix
    pub(crate) fn remove_prefix(&self, prefix: &str) -> Vec<String> {
        let mut state = self.inner.state.write();
        let removed = remove_prefix_in(&mut state.files, prefix);
        if !removed.is_empty() {
            state.invalidate();
        }
        removed
    }
}

fn is_visible(key: &str, ignoring: &[String]) -> bool {
    !ignoring.iter().any(|ignored| ignored == key)
}

/// Whether `candidate` clashes with a visible entry
///
/// A directory clashes with its own key, a file of the same name, or any
/// entry below it. A file clashes with its own key or any entry below
/// `candidate/`.
fn collides(files: &IndexMap<String, Blob>, candidate: &str, ignoring: &[String]) -> bool {
    let mut visible = files.keys().filter(|key| is_visible(key, ignoring));

    if let Some(dir_name) = candidate.strip_suffix(SEPARATOR) {
        visible.any(|key| key == dir_name || key.starts_with(candidate))
    } else {
        let as_dir = as_directory_path(candidate);
        visible.any(|key| key == candidate || key.starts_with(&as_dir))
    }
}

/// Rename ancestor segments that are occupied by files
fn resolve_ancestors(files: &IndexMap<String, Blob>, path: &str, ignoring: &[String]) -> String {
    let directory = is_directory_path(path);
    let segments: Vec<&str> = path.trim_end_matches(SEPARATOR).split(SEPARATOR).collect();
    let Some((last, ancestors)) = segments.split_last() else {
        return path.to_string();
    };

    let mut resolved = String::new();
    for segment in ancestors {
        let mut candidate = format!("{resolved}{segment}");
        let mut n = 1;
        while files.contains_key(&candidate) && is_visible(&candidate, ignoring) {
            candidate = format!("{resolved}{segment} ({n})");
            n += 1;
        }
        resolved = as_directory_path(&candidate);
    }

    resolved.push_str(last);
    if directory {
        resolved.push(SEPARATOR);
    }
    resolved
}

fn safe_path_in(files: &IndexMap<String, Blob>, path: &str, ignoring: &[String]) -> String {
    let sanitized = resolve_ancestors(files, &sanitize_filepath(path), ignoring);
    if !collides(files, &sanitized, ignoring) {
        return sanitized;
    }

    let mut n = 1;
    loop {
        let candidate = with_counter(&sanitized, n);
        if !collides(files, &candidate, ignoring) {
            return candidate;
        }
        n += 1;
    }
}

/// Exact key, or the single key ending in `/path`
fn resolve_key(files: &IndexMap<String, Blob>, path: &str) -> Result<String, ArchiveError> {
    if files.contains_key(path) {
        return Ok(path.to_string());
    }

    let suffix = format!("{SEPARATOR}{path}");
    let mut candidates: Vec<String> = files
        .keys()
        .filter(|key| key.ends_with(&suffix))
        .cloned()
        .collect();

    match candidates.len() {
        0 => Err(ArchiveError::NotFound(path.to_string())),
        1 => Ok(candidates.remove(0)),
        _ => Err(ArchiveError::AmbiguousMatch {
            path: path.to_string(),
            candidates,
        }),
    }
}

fn remove_prefix_in(files: &mut IndexMap<String, Blob>, prefix: &str) -> Vec<String> {
    let doomed: Vec<String> = files
        .keys()
        .filter(|key| key.starts_with(prefix))
        .cloned()
        .collect();
    for key in &doomed {
        files.shift_remove(key);
    }
    doomed
}

/// Already-compressed formats are stored, everything else deflated
fn compression_for(blob: &Blob) -> CompressionMethod {
    match blob.mime() {
        "image/png" | "image/jpeg" | "image/gif" | "image/webp" | "image/avif" | "image/apng"
        | ZIP_MIME => CompressionMethod::Stored,
        _ => CompressionMethod::Deflated,
    }
}

fn build_container(files: &IndexMap<String, Blob>) -> Result<Blob, ArchiveError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

    for (path, blob) in files {
        if is_directory_path(path) && blob.is_empty() {
            continue;
        }
        let options = SimpleFileOptions::default().compression_method(compression_for(blob));
        writer.start_file(path.as_str(), options)?;
        writer.write_all(blob.data())?;
    }

    let cursor = writer.finish()?;
    Ok(Blob::new(cursor.into_inner(), ZIP_MIME))
}
