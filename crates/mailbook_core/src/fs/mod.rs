//! Filesystem abstraction module.
//!
//! This module provides the `FileSystem` trait for abstracting filesystem operations,
//! so the reconciliation core can run against the real device storage or an
//! in-memory tree in tests.
//!
//! Every persisted mailbook file (registry, collections descriptor) goes through
//! [`FileSystem::write_atomic`], which must never leave a truncated file behind.

mod memory;
#[cfg(not(target_arch = "wasm32"))]
mod native;

pub use memory::InMemoryFileSystem;
#[cfg(not(target_arch = "wasm32"))]
pub use native::RealFileSystem;

use std::io::Result;
use std::path::{Path, PathBuf};

/// Abstraction over filesystem operations
/// Allows for different implementations: real filesystem, in-memory (for tests), etc.
pub trait FileSystem {
    /// Reads the file content as UTF-8
    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Reads at most `limit` bytes from the start of a file
    fn read_head(&self, path: &Path, limit: usize) -> Result<Vec<u8>>;

    /// Replaces the file content. Either the old or the new content is visible
    /// afterwards, never a partial write.
    fn write_atomic(&self, path: &Path, content: &[u8]) -> Result<()>;

    /// Checks if a file or directory exists
    fn exists(&self, path: &Path) -> bool;

    /// Checks if a path is a directory
    fn is_dir(&self, path: &Path) -> bool;

    /// Creates a directory and all parent directories
    fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Lists the immediate children of a directory, in the order the
    /// underlying storage reports them
    fn list_dir(&self, dir: &Path) -> Result<Vec<PathBuf>>;

    /// Copies a file, overwriting the destination
    fn copy_file(&self, from: &Path, to: &Path) -> Result<()>;

    /// Deletes a file
    fn delete_file(&self, path: &Path) -> Result<()>;

    /// Moves a file, replacing the destination
    fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// Recursively list all files (not directories) below `dir`, depth first
    fn list_files_recursive(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in self.list_dir(dir)? {
            if self.is_dir(&entry) {
                files.extend(self.list_files_recursive(&entry)?);
            } else {
                files.push(entry);
            }
        }
        Ok(files)
    }
}

// Blanket implementation for references to FileSystem
impl<T: FileSystem + ?Sized> FileSystem for &T {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        (**self).read_to_string(path)
    }

    fn read_head(&self, path: &Path, limit: usize) -> Result<Vec<u8>> {
        (**self).read_head(path, limit)
    }

    fn write_atomic(&self, path: &Path, content: &[u8]) -> Result<()> {
        (**self).write_atomic(path, content)
    }

    fn exists(&self, path: &Path) -> bool {
        (**self).exists(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        (**self).is_dir(path)
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        (**self).create_dir_all(path)
    }

    fn list_dir(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        (**self).list_dir(dir)
    }

    fn copy_file(&self, from: &Path, to: &Path) -> Result<()> {
        (**self).copy_file(from, to)
    }

    fn delete_file(&self, path: &Path) -> Result<()> {
        (**self).delete_file(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        (**self).rename(from, to)
    }

    fn list_files_recursive(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        (**self).list_files_recursive(dir)
    }
}

/// Sibling path used to stage an atomic write (`FILELIST` -> `.FILELIST.tmp`).
pub fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.tmp", name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staging_path_is_hidden_sibling() {
        assert_eq!(
            staging_path(Path::new("/mnt/us/documents/FILELIST")),
            PathBuf::from("/mnt/us/documents/.FILELIST.tmp")
        );
    }

    #[test]
    fn test_list_files_recursive_skips_directories() {
        let fs = InMemoryFileSystem::new()
            .with_file("/lib/a/one.mobi", b"1")
            .with_file("/lib/a/deep/two.pdf", b"2")
            .with_file("/lib/three.txt", b"3");

        let mut files = fs.list_files_recursive(Path::new("/lib")).unwrap();
        files.sort();
        assert_eq!(
            files,
            vec![
                PathBuf::from("/lib/a/deep/two.pdf"),
                PathBuf::from("/lib/a/one.mobi"),
                PathBuf::from("/lib/three.txt"),
            ]
        );
    }
}
