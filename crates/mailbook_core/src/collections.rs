//! Collection resolution from the library directory tree.
//!
//! Every immediate subdirectory of the library root is a collection. Its
//! display name comes from the registry when a registry collection normalizes
//! to the directory's name, and is guessed from the directory name otherwise.

use indexmap::IndexMap;
use std::path::{Path, PathBuf};

use crate::error::{MailbookError, Result};
use crate::fs::FileSystem;
use crate::normalize::{display_name_from_dir, normalize};

/// Extensions the device can open, matched case-insensitively.
pub const DEVICE_EXTENSIONS: &[&str] = &["txt", "mobi", "azw", "azw2", "pdf"];

/// Collection display name -> member documents, in traversal order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionTree {
    collections: IndexMap<String, Vec<PathBuf>>,
}

impl CollectionTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append documents to a collection, creating it when needed.
    pub fn insert(&mut self, name: impl Into<String>, files: Vec<PathBuf>) {
        self.collections.entry(name.into()).or_default().extend(files);
    }

    /// Documents of a collection.
    pub fn get(&self, name: &str) -> Option<&[PathBuf]> {
        self.collections.get(name).map(Vec::as_slice)
    }

    /// Collections in resolution order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[PathBuf])> {
        self.collections
            .iter()
            .map(|(name, files)| (name.as_str(), files.as_slice()))
    }

    /// Number of collections.
    pub fn len(&self) -> usize {
        self.collections.len()
    }

    /// True when there are no collections.
    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }

    /// Number of documents over all collections.
    pub fn document_count(&self) -> usize {
        self.collections.values().map(Vec::len).sum()
    }
}

/// Display name for a collection directory.
///
/// The first of `known_names` whose normalized form equals `dir_name` wins,
/// so two registry names folding to the same token resolve by registry order.
/// Without a match the name is guessed with [`display_name_from_dir`].
pub fn collection_display_name(dir_name: &str, known_names: &[String]) -> String {
    known_names
        .iter()
        .find(|name| normalize(name) == dir_name)
        .cloned()
        .unwrap_or_else(|| display_name_from_dir(dir_name))
}

/// Build the collection tree for `root`.
///
/// Files directly in `root` belong to no collection and are not listed.
/// Documents are collected recursively and filtered by `extensions` (without
/// the leading dot). Two directories resolving to the same display name are
/// merged into one collection.
pub fn resolve<FS: FileSystem, S: AsRef<str>>(
    fs: &FS,
    root: &Path,
    known_names: &[String],
    extensions: &[S],
) -> Result<CollectionTree> {
    let mut tree = CollectionTree::new();

    for entry in list(fs, root)? {
        if !fs.is_dir(&entry) {
            continue;
        }
        let Some(dir_name) = entry.file_name().map(|n| n.to_string_lossy().to_string()) else {
            continue;
        };

        let display_name = collection_display_name(&dir_name, known_names);
        let documents: Vec<PathBuf> = fs
            .list_files_recursive(&entry)
            .map_err(|source| MailbookError::FileRead {
                path: entry.clone(),
                source,
            })?
            .into_iter()
            .filter(|path| has_allowed_extension(path, extensions))
            .collect();

        log::debug!(
            "Directory '{}' -> collection '{}' ({} documents)",
            dir_name,
            display_name,
            documents.len()
        );
        tree.insert(display_name, documents);
    }

    Ok(tree)
}

fn list<FS: FileSystem>(fs: &FS, dir: &Path) -> Result<Vec<PathBuf>> {
    fs.list_dir(dir).map_err(|source| MailbookError::FileRead {
        path: dir.to_path_buf(),
        source,
    })
}

fn has_allowed_extension<S: AsRef<str>>(path: &Path, extensions: &[S]) -> bool {
    path.extension().is_some_and(|ext| {
        extensions
            .iter()
            .any(|allowed| ext.eq_ignore_ascii_case(allowed.as_ref()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::InMemoryFileSystem;

    fn library() -> InMemoryFileSystem {
        InMemoryFileSystem::new()
            .with_file("/lib/travel/guide.mobi", b"")
            .with_file("/lib/travel/maps/europe.PDF", b"")
            .with_file("/lib/travel/cover.jpg", b"")
            .with_file("/lib/science_fiction/dune.azw", b"")
            .with_file("/lib/loose.txt", b"")
            .with_dir("/lib/empty")
    }

    #[test]
    fn test_known_names_win_over_guesses() {
        let tree = resolve(
            &library(),
            Path::new("/lib"),
            &["Travel".to_string()],
            DEVICE_EXTENSIONS,
        )
        .unwrap();

        let names: Vec<_> = tree.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["Empty", "Science fiction", "Travel"]);
        assert_eq!(
            tree.get("Travel").unwrap(),
            &[
                PathBuf::from("/lib/travel/guide.mobi"),
                PathBuf::from("/lib/travel/maps/europe.PDF"),
            ]
        );
        assert_eq!(tree.get("Empty").unwrap().len(), 0);
        assert_eq!(tree.document_count(), 3);
    }

    #[test]
    fn test_first_known_name_wins_on_collision() {
        let known = vec!["Sci-Fi".to_string(), "SCI-FI".to_string()];
        assert_eq!(collection_display_name("sci-fi", &known), "Sci-Fi");

        let reversed = vec!["SCI-FI".to_string(), "Sci-Fi".to_string()];
        assert_eq!(collection_display_name("sci-fi", &reversed), "SCI-FI");
    }

    #[test]
    fn test_extension_filter_is_configurable() {
        let tree = resolve(&library(), Path::new("/lib"), &[], &["jpg"]).unwrap();
        assert_eq!(
            tree.get("Travel").unwrap(),
            &[PathBuf::from("/lib/travel/cover.jpg")]
        );
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let err = resolve(
            &InMemoryFileSystem::new(),
            Path::new("/nowhere"),
            &[],
            DEVICE_EXTENSIONS,
        )
        .unwrap_err();
        assert!(matches!(err, MailbookError::FileRead { .. }));
    }

    #[test]
    fn test_merging_directories_with_the_same_display_name() {
        let fs = InMemoryFileSystem::new()
            .with_file("/lib/poetry/a.pdf", b"")
            .with_file("/lib/Poetry/b.pdf", b"");
        let tree = resolve(&fs, Path::new("/lib"), &["Poetry".to_string()], DEVICE_EXTENSIONS)
            .unwrap();
        // The registry name matches `poetry`, and `Poetry` guesses the same name
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.get("Poetry").unwrap().len(), 2);
    }
}
