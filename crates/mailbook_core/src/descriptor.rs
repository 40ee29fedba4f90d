//! The on-device collections descriptor (`system/collections.json`).
//!
//! The reader groups documents into shelves from a JSON object keyed by
//! `<collection name>@<locale>`:
//!
//! ```text
//! {"Travel@en-US":{"items":["#B00B7NPRY8^EBOK","*3f78..."],"lastAccess":1371047025000}}
//! ```
//!
//! `lastAccess` doubles as the shelf's creation time on the device, so it is
//! carried over from the previous descriptor and only set for new shelves.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::collections::CollectionTree;
use crate::error::{MailbookError, Result};
use crate::fs::FileSystem;
use crate::identity::identify;

/// Locale suffix used when none is configured.
pub const DEFAULT_LOCALE: &str = "en-US";

/// One shelf in the descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorEntry {
    /// Identity tokens of the member documents
    #[serde(default)]
    pub items: Vec<String>,
    /// Epoch milliseconds
    #[serde(rename = "lastAccess")]
    pub last_access: i64,
}

/// All shelves, keyed by `<name>@<locale>` in sorted order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Descriptor {
    entries: BTreeMap<String, DescriptorEntry>,
}

/// Settings for [`serialize`].
#[derive(Debug, Clone)]
pub struct DescriptorOptions {
    /// Locale tag appended to every collection name
    pub locale: String,
    /// Keep shelves of the previous descriptor that no longer have a folder
    pub preserve_existing: bool,
}

impl Default for DescriptorOptions {
    fn default() -> Self {
        Self {
            locale: DEFAULT_LOCALE.to_string(),
            preserve_existing: true,
        }
    }
}

impl Descriptor {
    /// Create an empty descriptor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Descriptor key for a collection.
    pub fn key(name: &str, locale: &str) -> String {
        format!("{}@{}", name, locale)
    }

    /// Look up a shelf by descriptor key.
    pub fn get(&self, key: &str) -> Option<&DescriptorEntry> {
        self.entries.get(key)
    }

    /// Insert or replace a shelf.
    pub fn insert(&mut self, key: impl Into<String>, entry: DescriptorEntry) {
        self.entries.insert(key.into(), entry);
    }

    /// Shelves in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &DescriptorEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of shelves.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when there are no shelves.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse descriptor JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize with sorted keys and a trailing newline.
    pub fn to_json(&self) -> Result<String> {
        let mut json = serde_json::to_string(self)?;
        json.push('\n');
        Ok(json)
    }

    /// Load the previous descriptor. A missing or unreadable file means
    /// there is none; the device rewrites this file itself, so a corrupt one
    /// is replaced rather than treated as fatal.
    pub fn load<FS: FileSystem>(fs: &FS, path: &Path) -> Option<Self> {
        if !fs.exists(path) {
            return None;
        }
        match fs.read_to_string(path).map_err(MailbookError::from).and_then(|s| Self::from_json(&s)) {
            Ok(descriptor) => Some(descriptor),
            Err(e) => {
                log::warn!("Ignoring unreadable descriptor {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Write through a temporary file; the previous descriptor stays intact
    /// when this fails.
    pub fn save<FS: FileSystem>(&self, fs: &FS, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !fs.exists(parent)
        {
            fs.create_dir_all(parent)?;
        }
        fs.write_atomic(path, json.as_bytes())
            .map_err(|source| MailbookError::FileWrite {
                path: path.to_path_buf(),
                source,
            })
    }
}

/// Build the descriptor for `tree`.
///
/// Items are recomputed for every collection, in the tree's document order.
/// `lastAccess` is copied from `previous` when the key exists there and set
/// to `now_ms` otherwise. Returns the descriptor and whether it differs from
/// `previous` (or any shelf is new).
pub fn serialize<FS: FileSystem>(
    fs: &FS,
    tree: &CollectionTree,
    previous: Option<&Descriptor>,
    options: &DescriptorOptions,
    now_ms: i64,
) -> (Descriptor, bool) {
    let empty = Descriptor::new();
    let previous = previous.unwrap_or(&empty);

    let mut descriptor = if options.preserve_existing {
        previous.clone()
    } else {
        Descriptor::new()
    };
    let mut fresh = false;

    for (name, documents) in tree.iter() {
        let key = Descriptor::key(name, &options.locale);
        let last_access = match previous.get(&key) {
            Some(entry) => entry.last_access,
            None => {
                log::info!("New collection '{}'", name);
                fresh = true;
                now_ms
            }
        };
        let items = documents
            .iter()
            .map(|path| identify(fs, path).to_string())
            .collect();
        descriptor.insert(key, DescriptorEntry { items, last_access });
    }

    let changed = fresh || descriptor != *previous;
    (descriptor, changed)
}
