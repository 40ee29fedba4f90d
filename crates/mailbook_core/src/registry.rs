//! The shared file registry (`FILELIST`).
//!
//! The registry is a flat, INI-like text file that both sides of the sync
//! read and rewrite. Each section is a collection, each key a file name, each
//! value the time that file was last published:
//!
//! ```text
//! [Travel]
//! guide.mobi = 2020-01-01_00:00:00
//!
//! [___NO_COLLECTION___]
//! notes.txt = 2020-01-02_08:30:00
//!
//! [___SPECIAL___]
//! RestartTimeStamp = 2021-06-01_10:00:00
//! ```
//!
//! Two section names are reserved sentinels. They are decoded into
//! [`SectionKind`] once, at parse time, and never compared as strings again.

use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;
use std::path::Path;

use crate::error::{MailbookError, Result};
use crate::fs::FileSystem;
use crate::normalize::normalize;
use crate::timestamp::Timestamp;

/// Registry file name at the top of both libraries.
pub const REGISTRY_FILE_NAME: &str = "FILELIST";

/// Section name for files published without a collection.
pub const NO_COLLECTION_SECTION: &str = "___NO_COLLECTION___";

/// Section name holding control flags instead of files.
pub const CONTROL_SECTION: &str = "___SPECIAL___";

/// Control key carrying the time a device restart was last requested.
pub const RESTART_KEY: &str = "RestartTimeStamp";

/// What a registry section stands for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum SectionKind {
    /// A named collection (a shelf on the device, a folder in the library)
    Collection(String),
    /// Files that live in the library root
    NoCollection,
    /// Control flags such as the restart timestamp
    Control,
}

impl SectionKind {
    /// Decode a section header.
    pub fn from_header(name: &str) -> Self {
        match name {
            NO_COLLECTION_SECTION => SectionKind::NoCollection,
            CONTROL_SECTION => SectionKind::Control,
            other => SectionKind::Collection(other.to_string()),
        }
    }

    /// The section header as written to the registry file.
    pub fn header(&self) -> &str {
        match self {
            SectionKind::Collection(name) => name,
            SectionKind::NoCollection => NO_COLLECTION_SECTION,
            SectionKind::Control => CONTROL_SECTION,
        }
    }

    /// Library subdirectory holding this section's files. Empty for the
    /// library root.
    pub fn dir_hint(&self) -> String {
        match self {
            SectionKind::Collection(name) => normalize(name),
            SectionKind::NoCollection | SectionKind::Control => String::new(),
        }
    }

    /// The collection name, for named collections only.
    pub fn collection_name(&self) -> Option<&str> {
        match self {
            SectionKind::Collection(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header())
    }
}

/// In-memory registry snapshot. Sections and keys keep file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registry {
    sections: IndexMap<SectionKind, IndexMap<String, String>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse registry text.
    ///
    /// Accepts `key = value` and `key: value` lines, `#`/`;` comments and blank
    /// lines. Lines containing ` = ` split at the last occurrence, so file names
    /// holding `=` or `:` survive a round trip. Repeated sections are merged, a
    /// repeated key keeps its last value. Values are kept verbatim; timestamps
    /// are validated when they are used.
    pub fn parse(text: &str) -> Result<Self> {
        let mut registry = Registry::new();
        let mut current: Option<SectionKind> = None;

        for (index, raw) in text.lines().enumerate() {
            let line_no = index + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if let Some(name) = line.strip_prefix('[').and_then(|rest| rest.strip_suffix(']')) {
                let name = name.trim();
                if name.is_empty() {
                    return Err(malformed(line_no, "empty section name"));
                }
                let kind = SectionKind::from_header(name);
                registry.sections.entry(kind.clone()).or_default();
                current = Some(kind);
                continue;
            }

            let Some((key, value)) = split_entry(line) else {
                if line.starts_with('[') {
                    return Err(malformed(line_no, "section header is missing ']'"));
                }
                return Err(malformed(line_no, "expected 'name = timestamp'"));
            };
            let section = current
                .as_ref()
                .ok_or_else(|| malformed(line_no, "entry before the first section header"))?;
            if key.is_empty() {
                return Err(malformed(line_no, "empty file name"));
            }

            registry
                .sections
                .entry(section.clone())
                .or_default()
                .insert(key.to_string(), value.to_string());
        }

        Ok(registry)
    }

    /// Serialize back to registry text, one blank line after every section.
    pub fn to_ini_string(&self) -> String {
        let mut out = String::new();
        for (kind, entries) in &self.sections {
            out.push('[');
            out.push_str(kind.header());
            out.push_str("]\n");
            for (key, value) in entries {
                out.push_str(key);
                out.push_str(" = ");
                out.push_str(value);
                out.push('\n');
            }
            out.push('\n');
        }
        out
    }

    /// Load a registry file. A missing file is an empty registry.
    pub fn load<FS: FileSystem>(fs: &FS, path: &Path) -> Result<Self> {
        if !fs.exists(path) {
            log::debug!("No registry at {}, starting empty", path.display());
            return Ok(Registry::new());
        }
        let text = fs
            .read_to_string(path)
            .map_err(|source| MailbookError::FileRead {
                path: path.to_path_buf(),
                source,
            })?;
        Self::parse(&text)
    }

    /// Write the registry through a temporary file so the previous version
    /// survives a failed write.
    pub fn save<FS: FileSystem>(&self, fs: &FS, path: &Path) -> Result<()> {
        fs.write_atomic(path, self.to_ini_string().as_bytes())
            .map_err(|source| MailbookError::FileWrite {
                path: path.to_path_buf(),
                source,
            })
    }

    /// True when no section exists.
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Section kinds in file order, control section included.
    pub fn sections(&self) -> impl Iterator<Item = &SectionKind> {
        self.sections.keys()
    }

    /// Named collections in file order. Both reserved sections are excluded.
    pub fn collection_names(&self) -> Vec<String> {
        self.sections
            .keys()
            .filter_map(|kind| kind.collection_name().map(str::to_string))
            .collect()
    }

    /// True if the section exists (possibly empty).
    pub fn has_section(&self, section: &SectionKind) -> bool {
        self.sections.contains_key(section)
    }

    /// Raw `(file, value)` pairs of a section, in file order.
    pub fn files(&self, section: &SectionKind) -> impl Iterator<Item = (&str, &str)> {
        self.sections
            .get(section)
            .into_iter()
            .flat_map(|entries| entries.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    /// Number of entries in a section.
    pub fn file_count(&self, section: &SectionKind) -> usize {
        self.sections.get(section).map_or(0, IndexMap::len)
    }

    /// True if the registry records `file` in `section`.
    pub fn has_entry(&self, section: &SectionKind, file: &str) -> bool {
        self.sections
            .get(section)
            .is_some_and(|entries| entries.contains_key(file))
    }

    /// Parsed timestamp of an entry. A stored value that is not a valid
    /// timestamp is an error, not an absent entry.
    pub fn timestamp(&self, section: &SectionKind, file: &str) -> Result<Option<Timestamp>> {
        self.sections
            .get(section)
            .and_then(|entries| entries.get(file))
            .map(|value| Timestamp::parse(value))
            .transpose()
    }

    /// Insert or update an entry, creating the section when needed.
    ///
    /// Names the registry format cannot store are rejected: empty names,
    /// surrounding whitespace, line breaks, and a leading `#` or `;` (read
    /// back as comments).
    pub fn set_entry(
        &mut self,
        section: SectionKind,
        file: impl Into<String>,
        at: Timestamp,
    ) -> Result<()> {
        let file = file.into();
        check_entry_name(&file)?;
        self.sections
            .entry(section)
            .or_default()
            .insert(file, at.to_string());
        Ok(())
    }

    /// Remove an entry. Returns whether it existed.
    pub fn remove_entry(&mut self, section: &SectionKind, file: &str) -> bool {
        self.sections
            .get_mut(section)
            .is_some_and(|entries| entries.shift_remove(file).is_some())
    }

    /// Remove a whole section. Returns whether it existed.
    pub fn remove_section(&mut self, section: &SectionKind) -> bool {
        self.sections.shift_remove(section).is_some()
    }

    /// Restart timestamp from the control section. The key is matched
    /// case-insensitively since older writers stored it lower-cased. Missing
    /// or unparseable values both read as `None`.
    pub fn restart_timestamp(&self) -> Option<Timestamp> {
        self.files(&SectionKind::Control)
            .find(|(key, _)| key.eq_ignore_ascii_case(RESTART_KEY))
            .and_then(|(_, value)| Timestamp::parse(value).ok())
    }

    /// Request a device restart as of `at`.
    pub fn set_restart_timestamp(&mut self, at: Timestamp) {
        let control = self.sections.entry(SectionKind::Control).or_default();
        control.retain(|key, _| !key.eq_ignore_ascii_case(RESTART_KEY));
        control.insert(RESTART_KEY.to_string(), at.to_string());
    }

    /// Pick the section new files should go to.
    ///
    /// Without a query the files go to the library root. With `exact`, the
    /// query is the collection name. Otherwise the query may abbreviate an
    /// existing collection: the shortest name starting with it
    /// (case-insensitively) wins, and an unmatched query names a new
    /// collection.
    pub fn resolve_collection(&self, query: Option<&str>, exact: bool) -> SectionKind {
        let Some(query) = query.map(str::trim).filter(|q| !q.is_empty()) else {
            return SectionKind::NoCollection;
        };
        if exact {
            return SectionKind::Collection(query.to_string());
        }

        let needle = query.to_lowercase();
        self.sections
            .keys()
            .filter_map(SectionKind::collection_name)
            .filter(|name| name.to_lowercase().starts_with(&needle))
            .min_by_key(|name| name.chars().count())
            .map(|name| SectionKind::Collection(name.to_string()))
            .unwrap_or_else(|| SectionKind::Collection(query.to_string()))
    }

    /// Record freshly published files under `section`, all stamped `at`, and
    /// optionally request a restart at the same time. The section is created
    /// even when `files` is empty. Returns the library subdirectory the files
    /// belong in. Nothing is recorded if any name is rejected by
    /// [`Registry::set_entry`].
    pub fn record_files<S: AsRef<str>>(
        &mut self,
        section: SectionKind,
        files: &[S],
        at: Timestamp,
        restart: bool,
    ) -> Result<String> {
        for file in files {
            check_entry_name(file.as_ref())?;
        }
        let dir_hint = section.dir_hint();
        let entries = self.sections.entry(section).or_default();
        for file in files {
            entries.insert(file.as_ref().to_string(), at.to_string());
        }
        if restart {
            self.set_restart_timestamp(at);
        }
        Ok(dir_hint)
    }
}

/// `name = value`, split where the serializer put the delimiter, else at the
/// first `=` or `:`.
fn split_entry(line: &str) -> Option<(&str, &str)> {
    let (key, value) = match line.rsplit_once(" = ") {
        Some(pair) => pair,
        None => {
            let split = line.find(['=', ':'])?;
            (&line[..split], &line[split + 1..])
        }
    };
    Some((key.trim(), value.trim()))
}

fn check_entry_name(name: &str) -> Result<()> {
    let storable = !name.is_empty()
        && name.trim() == name
        && !name.contains(['\n', '\r'])
        && !name.starts_with(['#', ';']);
    if storable {
        Ok(())
    } else {
        Err(MailbookError::InvalidEntryName(name.to_string()))
    }
}

fn malformed(line: usize, reason: &str) -> MailbookError {
    MailbookError::MalformedRegistry {
        line,
        reason: reason.to_string(),
    }
}
