//! Scoped views over a directory prefix of an [`ArchiveStore`]
//!
//! A handle never owns entries. Every call recomputes its view from the
//! parent store, and every call except [`SubdirectoryHandle::is_valid`]
//! fails with [`ArchiveError::HandleDisposed`] once the handle was deleted,
//! used as the source of a reparent, or its store was dropped.

use crate::blob::Blob;
use crate::error::ArchiveError;
use crate::path::{as_directory_path, path_join, sanitize_filepath};
use crate::store::{ArchiveStore, StoreInner};
use std::sync::Weak;

/// Virtual directory inside an archive store
#[derive(Debug)]
pub struct SubdirectoryHandle {
    path: String,
    parent: Weak<StoreInner>,
    valid: bool,
}

impl SubdirectoryHandle {
    pub(crate) fn new(path: String, parent: Weak<StoreInner>) -> Self {
        Self {
            path,
            parent,
            valid: true,
        }
    }

    /// Whether the handle can still be used
    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.valid && self.parent.strong_count() > 0
    }

    fn disposed(&self) -> ArchiveError {
        ArchiveError::HandleDisposed {
            path: self.path.clone(),
        }
    }

    /// Owning store, or the disposed error
    fn store(&self) -> Result<ArchiveStore, ArchiveError> {
        if !self.valid {
            return Err(self.disposed());
        }
        self.parent
            .upgrade()
            .map(ArchiveStore::from_inner)
            .ok_or_else(|| self.disposed())
    }

    /// Directory path, always ending in `/`
    ///
    /// # Errors
    /// Returns `ArchiveError::HandleDisposed` on an invalid handle
    pub fn path(&self) -> Result<&str, ArchiveError> {
        self.store()?;
        Ok(&self.path)
    }

    /// Entries below this directory, excluding the directory key itself
    ///
    /// # Errors
    /// Returns `ArchiveError::HandleDisposed` on an invalid handle
    pub fn files(&self) -> Result<Vec<(String, Blob)>, ArchiveError> {
        let store = self.store()?;
        Ok(store
            .files()
            .into_iter()
            .filter(|(key, _)| key.starts_with(&self.path) && *key != self.path)
            .collect())
    }

    /// Paths of [`Self::files`]
    ///
    /// # Errors
    /// Returns `ArchiveError::HandleDisposed` on an invalid handle
    pub fn paths(&self) -> Result<Vec<String>, ArchiveError> {
        Ok(self.files()?.into_iter().map(|(key, _)| key).collect())
    }

    /// Store `blob` at `relative` below this directory
    ///
    /// # Errors
    /// Returns `ArchiveError::HandleDisposed` on an invalid handle
    pub fn add_file(&self, relative: &str, blob: Blob) -> Result<String, ArchiveError> {
        let store = self.store()?;
        Ok(store.add_file(&path_join([Some(self.path.as_str()), Some(relative)]), blob))
    }

    /// Nested handle for `relative` below this directory
    ///
    /// # Errors
    /// Returns `ArchiveError::HandleDisposed` on an invalid handle
    pub fn get_subdirectory(&self, relative: &str) -> Result<SubdirectoryHandle, ArchiveError> {
        let store = self.store()?;
        Ok(store.get_subdirectory(&path_join([Some(self.path.as_str()), Some(relative)])))
    }

    /// Move this directory to a collision-free version of `new_path`
    ///
    /// With `recursive`, every entry below the old prefix is re-keyed under
    /// the new one, keeping its suffix. Without it only the handle moves.
    /// Returns the new directory path.
    ///
    /// # Errors
    /// Returns `ArchiveError::HandleDisposed` on an invalid handle
    pub fn rename(&mut self, new_path: &str, recursive: bool) -> Result<String, ArchiveError> {
        let store = self.store()?;
        let own = store.keys_under(&self.path);
        let dest = store.get_safe_path(&as_directory_path(&sanitize_filepath(new_path)), &own);

        if recursive {
            let moved = store.rewrite_prefix(&self.path, &dest);
            tracing::debug!(from = %self.path, to = %dest, moved, "renamed subdirectory");
        }

        self.path.clone_from(&dest);
        Ok(dest)
    }

    /// Move every entry below this directory into `target`
    ///
    /// Entries land under `new_path` (default: the current path), made
    /// collision-free in `target`. Originals are removed from the source
    /// store. This handle is disposed; the returned handle belongs to
    /// `target`.
    ///
    /// # Errors
    /// Returns `ArchiveError::HandleDisposed` on an invalid handle
    pub fn reparent(
        &mut self,
        target: &ArchiveStore,
        new_path: Option<&str>,
    ) -> Result<SubdirectoryHandle, ArchiveError> {
        let source = self.store()?;
        let entries = source.keys_under(&self.path);

        let requested =
            as_directory_path(&sanitize_filepath(new_path.unwrap_or(self.path.as_str())));
        let ignoring = if source.same_store(target) {
            entries.clone()
        } else {
            Vec::new()
        };
        let dest = target.get_safe_path(&requested, &ignoring);

        // Originals go first so a same-store move never collides with itself
        let moved: Vec<(String, Blob)> = entries
            .iter()
            .filter_map(|key| Some((key.strip_prefix(&self.path)?.to_string(), source.get(key)?)))
            .collect();
        for key in &entries {
            source.delete_file(key, false)?;
        }
        for (rest, blob) in moved {
            target.add_file(&format!("{dest}{rest}"), blob);
        }

        tracing::debug!(from = %self.path, to = %dest, count = entries.len(), "reparented subdirectory");
        self.dispose();
        Ok(target.get_subdirectory(&dest))
    }

    /// Dispose this handle; with `recursive`, delete everything below it
    ///
    /// Returns the removed keys.
    ///
    /// # Errors
    /// Returns `ArchiveError::HandleDisposed` on an invalid handle
    pub fn delete_directory(&mut self, recursive: bool) -> Result<Vec<String>, ArchiveError> {
        let store = self.store()?;
        self.dispose();
        if recursive {
            Ok(store.remove_prefix(&self.path))
        } else {
            Ok(Vec::new())
        }
    }

    fn dispose(&mut self) {
        self.valid = false;
        self.parent = Weak::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn seeded() -> ArchiveStore {
        let store = ArchiveStore::new("t");
        store.add_file("photos/a.png", Blob::new(&b"a"[..], "image/png"));
        store.add_file("photos/2024/b.png", Blob::new(&b"b"[..], "image/png"));
        store.add_file("other/c.png", Blob::new(&b"c"[..], "image/png"));
        store
    }

    #[test]
    fn view_is_prefix_filtered() {
        let store = seeded();
        let dir = store.get_subdirectory("photos");
        assert_eq!(dir.path().unwrap(), "photos/");
        assert_eq!(dir.paths().unwrap(), vec!["photos/a.png", "photos/2024/b.png"]);

        store.add_file("photos/new.png", Blob::default());
        assert_eq!(dir.paths().unwrap().len(), 3);
    }

    #[test]
    fn add_file_writes_below_prefix() {
        let store = seeded();
        let dir = store.get_subdirectory("photos/");
        assert_eq!(dir.add_file("a.png", Blob::default()).unwrap(), "photos/a (1).png");

        let nested = dir.get_subdirectory("2024").unwrap();
        assert_eq!(nested.paths().unwrap(), vec!["photos/2024/b.png"]);
    }

    #[test]
    fn recursive_rename_rewrites_prefix() {
        let store = seeded();
        let mut dir = store.get_subdirectory("photos");

        let dest = dir.rename("pictures", true).unwrap();
        assert_eq!(dest, "pictures/");
        assert_eq!(
            store.paths(),
            vec!["pictures/a.png", "pictures/2024/b.png", "other/c.png"]
        );
        assert_eq!(dir.paths().unwrap(), vec!["pictures/a.png", "pictures/2024/b.png"]);
        assert_eq!(store.get("pictures/2024/b.png").unwrap().data(), b"b");
    }

    #[test]
    fn rename_onto_occupied_directory_gets_counter() {
        let store = seeded();
        let mut dir = store.get_subdirectory("photos");
        assert_eq!(dir.rename("other", true).unwrap(), "other (1)/");
        assert!(store.contains("other (1)/a.png"));
        assert!(store.contains("other/c.png"));
    }

    #[test]
    fn non_recursive_rename_only_moves_handle() {
        let store = seeded();
        let mut dir = store.get_subdirectory("photos");
        dir.rename("elsewhere", false).unwrap();
        assert!(store.contains("photos/a.png"));
        assert!(dir.paths().unwrap().is_empty());
    }

    #[test]
    fn recursive_delete_disposes_handle() {
        let store = seeded();
        let mut dir = store.get_subdirectory("photos");

        let removed = dir.delete_directory(true).unwrap();
        assert_eq!(removed.len(), 2);
        assert_eq!(store.paths(), vec!["other/c.png"]);

        assert!(!dir.is_valid());
        assert!(dir.files().unwrap_err().is_disposed());
        assert!(dir.rename("x", true).unwrap_err().is_disposed());
        assert!(dir.delete_directory(true).unwrap_err().is_disposed());
    }

    #[test]
    fn reparent_moves_entries_between_stores() {
        let source = seeded();
        let target = ArchiveStore::new("target");
        target.add_file("photos/existing.png", Blob::default());

        let mut dir = source.get_subdirectory("photos");
        let moved = dir.reparent(&target, None).unwrap();

        assert_eq!(moved.path().unwrap(), "photos (1)/");
        assert_eq!(moved.paths().unwrap(), vec!["photos (1)/a.png", "photos (1)/2024/b.png"]);
        assert_eq!(source.paths(), vec!["other/c.png"]);
        assert!(dir.path().unwrap_err().is_disposed());
    }

    #[test]
    fn reparent_within_same_store() {
        let store = seeded();
        let mut dir = store.get_subdirectory("photos");
        let moved = dir.reparent(&store, Some("archive/photos")).unwrap();

        assert_eq!(moved.path().unwrap(), "archive/photos/");
        assert_eq!(
            store.paths(),
            vec!["other/c.png", "archive/photos/a.png", "archive/photos/2024/b.png"]
        );
    }

    #[test]
    fn reparent_onto_itself_keeps_names() {
        let store = seeded();
        let mut dir = store.get_subdirectory("photos");
        let moved = dir.reparent(&store, None).unwrap();

        assert_eq!(moved.path().unwrap(), "photos/");
        assert_eq!(
            store.paths(),
            vec!["other/c.png", "photos/a.png", "photos/2024/b.png"]
        );
        assert_eq!(store.get("photos/a.png").unwrap().data(), b"a");
    }

    #[test]
    fn reparent_into_own_child() {
        let store = seeded();
        let mut dir = store.get_subdirectory("photos");
        let moved = dir.reparent(&store, Some("photos/old")).unwrap();

        assert_eq!(moved.path().unwrap(), "photos/old/");
        assert_eq!(
            store.paths(),
            vec!["other/c.png", "photos/old/a.png", "photos/old/2024/b.png"]
        );
    }

    #[test]
    fn dropped_store_disposes_handle() {
        let store = seeded();
        let dir = store.get_subdirectory("photos");
        drop(store);
        assert!(!dir.is_valid());
        assert!(dir.paths().unwrap_err().is_disposed());
    }
}
