//! Native filesystem implementation.
//!
//! Only available on non-WASM targets.

use std::fs::{self, File};
use std::io::{Read, Result, Write};
use std::path::{Path, PathBuf};

use super::{FileSystem, staging_path};

#[derive(Clone, Copy, Default)]
/// This is a simple filesystem implementation that maps to std::fs methods
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path)
    }

    fn read_head(&self, path: &Path, limit: usize) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(limit.min(64 * 1024));
        File::open(path)?
            .take(limit as u64)
            .read_to_end(&mut buf)?;
        Ok(buf)
    }

    fn write_atomic(&self, path: &Path, content: &[u8]) -> Result<()> {
        let tmp = staging_path(path);
        let written = File::create(&tmp).and_then(|mut file| {
            file.write_all(content)?;
            file.sync_all()
        });
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
        fs::rename(&tmp, path).inspect_err(|_| {
            let _ = fs::remove_file(&tmp);
        })
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)
    }

    fn list_dir(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(dir)? {
            entries.push(entry?.path());
        }
        Ok(entries)
    }

    fn copy_file(&self, from: &Path, to: &Path) -> Result<()> {
        fs::copy(from, to).map(|_| ())
    }

    fn delete_file(&self, path: &Path) -> Result<()> {
        fs::remove_file(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        fs::rename(from, to)
    }
}
