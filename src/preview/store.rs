/// Temporary references to locally selected files
///
/// A reference is created when a slot is bound to a file and must be
/// released again when the slot's file changes or the slot goes away.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::state::data::{LocalFile, ObjectUrl};
use crate::state::validate;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("could not determine a cache directory")]
    NoCacheDir,
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unknown reference {0}")]
    UnknownReference(ObjectUrl),
}

/// Creates and releases temporary references
pub trait ReferenceStore {
    /// Create a new reference to the file's content
    fn create(&mut self, file: &LocalFile) -> Result<ObjectUrl, StoreError>;

    /// Release a reference; it must not be used afterwards
    fn revoke(&mut self, url: &ObjectUrl) -> Result<(), StoreError>;
}

/// Keeps file content in memory under `blob:<uuid>` keys
#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: HashMap<ObjectUrl, Vec<u8>>,
    created: usize,
    revoked: usize,
}

impl MemoryStore {
    pub fn get(&self, url: &ObjectUrl) -> Option<&[u8]> {
        self.blobs.get(url).map(Vec::as_slice)
    }

    pub fn is_live(&self, url: &ObjectUrl) -> bool {
        self.blobs.contains_key(url)
    }

    /// Number of references created so far
    pub fn created(&self) -> usize {
        self.created
    }

    /// Number of references released so far
    pub fn revoked(&self) -> usize {
        self.revoked
    }

    /// Number of references still alive
    pub fn live(&self) -> usize {
        self.blobs.len()
    }
}

impl ReferenceStore for MemoryStore {
    fn create(&mut self, file: &LocalFile) -> Result<ObjectUrl, StoreError> {
        let url = ObjectUrl(format!("blob:{}", Uuid::new_v4()));
        self.blobs.insert(url.clone(), file.bytes.clone());
        self.created += 1;
        Ok(url)
    }

    fn revoke(&mut self, url: &ObjectUrl) -> Result<(), StoreError> {
        self.blobs
            .remove(url)
            .ok_or_else(|| StoreError::UnknownReference(url.clone()))?;
        self.revoked += 1;
        Ok(())
    }
}

/// Copies selected files into a private cache directory.
///
/// The reference is the path of the copy, which the preview can load
/// directly. The directory is removed when the store is dropped.
#[derive(Debug)]
pub struct CacheDirStore {
    dir: PathBuf,
    files: HashMap<ObjectUrl, PathBuf>,
}

impl CacheDirStore {
    /// Create a store in a fresh subdirectory of `root`
    pub fn new(root: &Path) -> Result<Self, StoreError> {
        let dir = root.join(Uuid::new_v4().to_string());
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;
        debug!(dir = %dir.display(), "preview cache ready");
        Ok(Self {
            dir,
            files: HashMap::new(),
        })
    }

    /// Create a store under the user's cache directory
    /// (~/.cache/attachment-editor/previews on Linux)
    pub fn in_user_cache() -> Result<Self, StoreError> {
        let mut root = dirs::cache_dir()
            .or_else(dirs::home_dir)
            .ok_or(StoreError::NoCacheDir)?;
        root.push("attachment-editor");
        root.push("previews");
        Self::new(&root)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ReferenceStore for CacheDirStore {
    fn create(&mut self, file: &LocalFile) -> Result<ObjectUrl, StoreError> {
        let ext = validate::extension(&file.name);
        let name = if ext == file.name {
            Uuid::new_v4().to_string()
        } else {
            format!("{}.{}", Uuid::new_v4(), ext)
        };
        let path = self.dir.join(name);

        fs::write(&path, &file.bytes).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        let url = ObjectUrl(path.to_string_lossy().to_string());
        self.files.insert(url.clone(), path);
        Ok(url)
    }

    fn revoke(&mut self, url: &ObjectUrl) -> Result<(), StoreError> {
        let path = self
            .files
            .remove(url)
            .ok_or_else(|| StoreError::UnknownReference(url.clone()))?;
        fs::remove_file(&path).map_err(|source| StoreError::Io { path, source })
    }
}

impl Drop for CacheDirStore {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_dir_all(&self.dir) {
            warn!(dir = %self.dir.display(), error = %e, "failed to remove preview cache");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str) -> LocalFile {
        LocalFile::from_bytes(name, b"\x89PNG\r\n\x1a\n".to_vec())
    }

    #[test]
    fn test_memory_store_counts() {
        let mut store = MemoryStore::default();
        let a = store.create(&file("a.png")).unwrap();
        let b = store.create(&file("b.png")).unwrap();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("blob:"));
        assert_eq!(store.get(&a), Some(&b"\x89PNG\r\n\x1a\n"[..]));

        store.revoke(&a).unwrap();
        assert!(!store.is_live(&a));
        assert!(matches!(store.revoke(&a), Err(StoreError::UnknownReference(_))));
        assert_eq!((store.created(), store.revoked(), store.live()), (2, 1, 1));
    }

    #[test]
    fn test_cache_dir_store_writes_and_deletes() {
        let root = tempfile::tempdir().unwrap();
        let mut store = CacheDirStore::new(root.path()).unwrap();

        let url = store.create(&file("shot.png")).unwrap();
        let path = PathBuf::from(url.as_str());
        assert!(path.exists());
        assert_eq!(path.extension().unwrap(), "png");

        store.revoke(&url).unwrap();
        assert!(!path.exists());
        assert!(store.revoke(&url).is_err());
    }

    #[test]
    fn test_cache_dir_store_rejects_foreign_paths() {
        let root = tempfile::tempdir().unwrap();
        let mut store = CacheDirStore::new(root.path()).unwrap();
        let foreign = ObjectUrl("/etc/hosts".into());
        assert!(matches!(store.revoke(&foreign), Err(StoreError::UnknownReference(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_cache_dir_store_with_non_utf8_root() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join(OsStr::from_bytes(b"cache-\xff"));
        let mut store = CacheDirStore::new(&root).unwrap();

        let url = store.create(&file("shot.png")).unwrap();
        assert_eq!(fs::read_dir(store.dir()).unwrap().count(), 1);
        store.revoke(&url).unwrap();
        assert_eq!(fs::read_dir(store.dir()).unwrap().count(), 0);
    }

    #[test]
    fn test_cache_dir_removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let store = CacheDirStore::new(root.path()).unwrap();
        let dir = store.dir().to_path_buf();
        assert!(dir.is_dir());
        drop(store);
        assert!(!dir.exists());
    }
}
