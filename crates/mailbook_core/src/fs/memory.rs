//! In-memory filesystem, used by tests and dry runs.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{Error, ErrorKind, Result};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use super::FileSystem;

#[derive(Default)]
struct Tree {
    files: BTreeMap<PathBuf, Vec<u8>>,
    dirs: BTreeSet<PathBuf>,
}

/// A filesystem kept entirely in memory.
///
/// Uses `Arc<Mutex<..>>` so clones share the same underlying storage.
/// Directories exist implicitly as ancestors of files, or explicitly after
/// `create_dir_all`. Listings are returned in sorted order.
#[derive(Clone, Default)]
pub struct InMemoryFileSystem {
    tree: Arc<Mutex<Tree>>,
}

impl InMemoryFileSystem {
    /// Create a new empty filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file (builder pattern).
    pub fn with_file(self, path: impl AsRef<Path>, content: &[u8]) -> Self {
        self.lock()
            .files
            .insert(path.as_ref().to_path_buf(), content.to_vec());
        self
    }

    /// Add an empty directory (builder pattern).
    pub fn with_dir(self, path: impl AsRef<Path>) -> Self {
        self.lock().dirs.insert(path.as_ref().to_path_buf());
        self
    }

    /// Get the content of a file as a string (for assertions).
    pub fn get_content(&self, path: impl AsRef<Path>) -> Option<String> {
        self.lock()
            .files
            .get(path.as_ref())
            .map(|bytes| String::from_utf8_lossy(bytes).to_string())
    }

    fn lock(&self) -> MutexGuard<'_, Tree> {
        // A poisoned lock only means another test thread panicked mid-write
        self.tree.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn not_found(path: &Path) -> Error {
        Error::new(
            ErrorKind::NotFound,
            format!("File not found: {}", path.display()),
        )
    }
}

impl Tree {
    fn is_dir(&self, path: &Path) -> bool {
        self.dirs.iter().any(|d| d.starts_with(path))
            || self
                .files
                .keys()
                .any(|f| f.starts_with(path) && f.as_path() != path)
    }
}

impl FileSystem for InMemoryFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        let bytes = self
            .lock()
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| Self::not_found(path))?;
        String::from_utf8(bytes).map_err(|e| Error::new(ErrorKind::InvalidData, e))
    }

    fn read_head(&self, path: &Path, limit: usize) -> Result<Vec<u8>> {
        let tree = self.lock();
        let bytes = tree.files.get(path).ok_or_else(|| Self::not_found(path))?;
        Ok(bytes[..bytes.len().min(limit)].to_vec())
    }

    fn write_atomic(&self, path: &Path, content: &[u8]) -> Result<()> {
        let mut tree = self.lock();
        if tree.is_dir(path) {
            return Err(Error::new(
                ErrorKind::IsADirectory,
                format!("Is a directory: {}", path.display()),
            ));
        }
        tree.files.insert(path.to_path_buf(), content.to_vec());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        let tree = self.lock();
        tree.files.contains_key(path) || tree.is_dir(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.lock().is_dir(path)
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        self.lock().dirs.insert(path.to_path_buf());
        Ok(())
    }

    fn list_dir(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let tree = self.lock();
        if !tree.is_dir(dir) {
            return Err(Self::not_found(dir));
        }
        let children: BTreeSet<PathBuf> = tree
            .files
            .keys()
            .chain(tree.dirs.iter())
            .filter_map(|p| {
                let rest = p.strip_prefix(dir).ok()?;
                let first = rest.components().next()?;
                Some(dir.join(first))
            })
            .collect();
        Ok(children.into_iter().collect())
    }

    fn copy_file(&self, from: &Path, to: &Path) -> Result<()> {
        let mut tree = self.lock();
        let bytes = tree
            .files
            .get(from)
            .cloned()
            .ok_or_else(|| Self::not_found(from))?;
        tree.files.insert(to.to_path_buf(), bytes);
        Ok(())
    }

    fn delete_file(&self, path: &Path) -> Result<()> {
        self.lock()
            .files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| Self::not_found(path))
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let mut tree = self.lock();
        let bytes = tree.files.remove(from).ok_or_else(|| Self::not_found(from))?;
        tree.files.insert(to.to_path_buf(), bytes);
        Ok(())
    }
}
