//! Access to the remote library.
//!
//! The update cycle only needs two things from the remote side: the current
//! registry text and individual files. [`DirectoryTransport`] serves both
//! from a local or mounted mirror; the CLI adds an HTTP implementation.

use std::path::{Component, Path, PathBuf};

use crate::error::{MailbookError, Result};
use crate::fs::FileSystem;
use crate::registry::REGISTRY_FILE_NAME;

/// Fetches the registry and documents from the remote library.
pub trait Transport {
    /// Current registry text of the remote library
    fn fetch_registry(&self) -> Result<String>;

    /// Store `<dir_hint>/<file_name>` from the remote library at
    /// `destination`. An empty `dir_hint` means the library root.
    fn fetch(&self, dir_hint: &str, file_name: &str, destination: &Path) -> Result<()>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn fetch_registry(&self) -> Result<String> {
        (**self).fetch_registry()
    }

    fn fetch(&self, dir_hint: &str, file_name: &str, destination: &Path) -> Result<()> {
        (**self).fetch(dir_hint, file_name, destination)
    }
}

/// Relative location of a remote file, as used in URLs and log lines.
pub fn remote_path(dir_hint: &str, file_name: &str) -> String {
    if dir_hint.is_empty() {
        file_name.to_string()
    } else {
        format!("{}/{}", dir_hint, file_name)
    }
}

/// Local path for a remote entry below `root`.
///
/// Registry entries come from the remote side, so the directory hint and the
/// file name must each be a single plain path segment. Anything else (`..`,
/// `.`, absolute paths, nested paths) yields `None`. An empty `dir_hint` is
/// the library root.
pub fn local_destination(root: &Path, dir_hint: &str, file_name: &str) -> Option<PathBuf> {
    let dir = if dir_hint.is_empty() {
        root.to_path_buf()
    } else {
        root.join(single_segment(dir_hint)?)
    };
    Some(dir.join(single_segment(file_name)?))
}

fn single_segment(name: &str) -> Option<&Path> {
    let path = Path::new(name);
    let mut components = path.components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Some(path),
        _ => None,
    }
}

/// Copies from a directory holding the remote library.
///
/// Source and destination go through the same [`FileSystem`], so the remote
/// library has to be reachable as a path from where the update runs.
#[derive(Debug, Clone)]
pub struct DirectoryTransport<FS> {
    fs: FS,
    root: PathBuf,
    registry_file: String,
}

impl<FS: FileSystem> DirectoryTransport<FS> {
    /// Serve the library at `root`, with the default registry file name.
    pub fn new(fs: FS, root: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            root: root.into(),
            registry_file: REGISTRY_FILE_NAME.to_string(),
        }
    }

    /// Use a different registry file name.
    pub fn with_registry_file(mut self, name: impl Into<String>) -> Self {
        self.registry_file = name.into();
        self
    }

    fn error(path: &str, e: impl std::fmt::Display) -> MailbookError {
        MailbookError::Transport {
            path: path.to_string(),
            message: e.to_string(),
        }
    }
}

impl<FS: FileSystem> Transport for DirectoryTransport<FS> {
    fn fetch_registry(&self) -> Result<String> {
        let path = self.root.join(&self.registry_file);
        self.fs
            .read_to_string(&path)
            .map_err(|e| Self::error(&self.registry_file, e))
    }

    fn fetch(&self, dir_hint: &str, file_name: &str, destination: &Path) -> Result<()> {
        let relative = remote_path(dir_hint, file_name);
        let source = self.root.join(&relative);
        log::debug!("Copying {} -> {}", source.display(), destination.display());
        self.fs
            .copy_file(&source, destination)
            .map_err(|e| Self::error(&relative, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::InMemoryFileSystem;

    #[test]
    fn test_directory_transport() {
        let fs = InMemoryFileSystem::new()
            .with_file("/srv/library/FILELIST", b"[Travel]\n")
            .with_file("/srv/library/travel/guide.pdf", b"PDF")
            .with_file("/srv/library/loose.txt", b"TXT")
            .with_dir("/mnt/us/documents/travel");
        let transport = DirectoryTransport::new(fs.clone(), "/srv/library");

        assert_eq!(transport.fetch_registry().unwrap(), "[Travel]\n");

        transport
            .fetch("travel", "guide.pdf", Path::new("/mnt/us/documents/travel/guide.pdf"))
            .unwrap();
        transport
            .fetch("", "loose.txt", Path::new("/mnt/us/documents/loose.txt"))
            .unwrap();
        assert_eq!(fs.get_content("/mnt/us/documents/travel/guide.pdf").as_deref(), Some("PDF"));
        assert_eq!(fs.get_content("/mnt/us/documents/loose.txt").as_deref(), Some("TXT"));
    }

    #[test]
    fn test_missing_remote_file_names_relative_path() {
        let transport = DirectoryTransport::new(InMemoryFileSystem::new(), "/srv/library");
        match transport.fetch("travel", "gone.pdf", Path::new("/tmp/gone.pdf")) {
            Err(MailbookError::Transport { path, .. }) => assert_eq!(path, "travel/gone.pdf"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_custom_registry_file() {
        let fs = InMemoryFileSystem::new().with_file("/srv/INDEX", b"");
        let transport = DirectoryTransport::new(fs, "/srv").with_registry_file("INDEX");
        assert_eq!(transport.fetch_registry().unwrap(), "");
        assert_eq!(remote_path("", "a.pdf"), "a.pdf");
    }

    #[test]
    fn test_local_destination_stays_below_root() {
        let root = Path::new("/mnt/us/documents");
        assert_eq!(
            local_destination(root, "travel", "guide.pdf"),
            Some(PathBuf::from("/mnt/us/documents/travel/guide.pdf"))
        );
        assert_eq!(
            local_destination(root, "", "Dune: Messiah.mobi"),
            Some(PathBuf::from("/mnt/us/documents/Dune: Messiah.mobi"))
        );

        for (dir_hint, file) in [
            ("travel", "../../evil.pdf"),
            ("travel", "/etc/passwd"),
            ("travel", "maps/europe.pdf"),
            ("travel", ".."),
            ("travel", ""),
            ("..", "x.pdf"),
            (".", "x.pdf"),
            ("/tmp", "x.pdf"),
        ] {
            assert_eq!(local_destination(root, dir_hint, file), None, "{dir_hint}/{file}");
        }
    }
}
