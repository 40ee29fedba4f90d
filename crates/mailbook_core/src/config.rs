//! Configuration types for Mailbook.
//!
//! This module provides the [`Config`] struct describing where the local
//! library lives, how the remote library is reached and which device
//! commands follow an update. Configuration is persisted as TOML (typically
//! at `~/.config/mailbook/config.toml` on Unix systems).
//!
//! # Key Configuration Fields
//!
//! - `library_root`: Local library directory (`/mnt/us/documents` on the device)
//! - `descriptor_path`: The device's collections descriptor
//! - `remote`: Where updates come from (a mounted directory or HTTP)
//! - `converter`: External command turning documents into `.mobi`
//! - `device`: Commands run after an update
//!
//! # Example
//!
//! ```ignore
//! use mailbook_core::config::Config;
//!
//! // Load from the first existing candidate, or defaults
//! let config = Config::load()?;
//!
//! let registry = config.registry_path();
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::collections::DEVICE_EXTENSIONS;
use crate::descriptor::DEFAULT_LOCALE;
use crate::error::{MailbookError, Result};
use crate::fs::FileSystem;
use crate::ingest::OutputPathStrategy;
use crate::registry::REGISTRY_FILE_NAME;

/// `Config` represents the parts of Mailbook that the user can configure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Local library directory; every subdirectory is a collection
    pub library_root: PathBuf,

    /// Registry file name inside the library root
    #[serde(default = "default_registry_file")]
    pub registry_file: String,

    /// The device's collections descriptor
    pub descriptor_path: PathBuf,

    /// Locale suffix for descriptor keys
    #[serde(default = "default_locale")]
    pub locale: String,

    /// Document extensions listed in collections
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Keep descriptor shelves that no longer have a folder
    #[serde(default = "default_true")]
    pub preserve_existing_collections: bool,

    /// Remote library (device side only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<RemoteConfig>,

    /// `.mobi` converter (shell side only)
    #[serde(default)]
    pub converter: ConverterConfig,

    /// Commands run after an update
    #[serde(default)]
    pub device: DeviceConfig,

    /// Extensions accepted by `publish`; `true` means convert to `.mobi`
    #[serde(default = "default_formats")]
    pub formats: IndexMap<String, bool>,
}

/// How the device reaches the remote library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RemoteConfig {
    /// A mounted or local mirror of the remote library
    Directory {
        /// Root of the mirror
        path: PathBuf,
    },
    /// An HTTP server publishing the library
    Http {
        /// Base URL; files are fetched from `<url>/<dir>/<file>`
        url: String,
        /// Cookie file holding the `x-fsn` session value
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cookie_file: Option<PathBuf>,
        /// HTTP proxy URL
        #[serde(default, skip_serializing_if = "Option::is_none")]
        proxy: Option<String>,
    },
}

/// External converter invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConverterConfig {
    /// Command template with `%%OLD_NAME%%` and `%%NEW_NAME%%` placeholders
    #[serde(default = "default_converter_command")]
    pub command: String,

    /// Exit codes treated as success
    #[serde(default = "default_success_codes")]
    pub success_codes: Vec<i32>,

    /// Where converted files are written
    #[serde(default)]
    pub output_path: OutputPathStrategy,
}

/// Device commands, as argv lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Reboots the device so it rereads the descriptor
    #[serde(default = "default_reboot_command")]
    pub reboot_command: Vec<String>,

    /// Asks the reader to refresh its library view
    #[serde(default = "default_refresh_command")]
    pub refresh_command: Vec<String>,
}

fn default_registry_file() -> String {
    REGISTRY_FILE_NAME.to_string()
}

fn default_locale() -> String {
    DEFAULT_LOCALE.to_string()
}

fn default_extensions() -> Vec<String> {
    DEVICE_EXTENSIONS.iter().map(|ext| ext.to_string()).collect()
}

fn default_true() -> bool {
    true
}

fn default_converter_command() -> String {
    "ebook-convert %%OLD_NAME%% %%NEW_NAME%%".to_string()
}

fn default_success_codes() -> Vec<i32> {
    vec![0, 1]
}

fn default_reboot_command() -> Vec<String> {
    vec!["reboot".to_string()]
}

fn default_refresh_command() -> Vec<String> {
    [
        "dbus-send",
        "--system",
        "/default",
        "com.lab126.powerd.resuming",
        "int32:1",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Formats accepted for publishing, in match order.
pub fn default_formats() -> IndexMap<String, bool> {
    let convert = ["epub", "txt", "html", "htm", "rtf", "doc"];
    let keep = ["mobi", "azw", "azw2", "pdf"];
    convert
        .iter()
        .map(|ext| (ext.to_string(), true))
        .chain(keep.iter().map(|ext| (ext.to_string(), false)))
        .collect()
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            command: default_converter_command(),
            success_codes: default_success_codes(),
            output_path: OutputPathStrategy::default(),
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            reboot_command: default_reboot_command(),
            refresh_command: default_refresh_command(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(PathBuf::from("/mnt/us/documents"))
    }
}

impl Config {
    /// Create a config for a library root, with the descriptor in the
    /// device's `system` directory next to it
    pub fn new(library_root: PathBuf) -> Self {
        let descriptor_path = library_root
            .parent()
            .unwrap_or_else(|| Path::new("/"))
            .join("system")
            .join("collections.json");

        Self {
            library_root,
            registry_file: default_registry_file(),
            descriptor_path,
            locale: default_locale(),
            extensions: default_extensions(),
            preserve_existing_collections: true,
            remote: None,
            converter: ConverterConfig::default(),
            device: DeviceConfig::default(),
            formats: default_formats(),
        }
    }

    /// Full path of the registry file
    pub fn registry_path(&self) -> PathBuf {
        self.library_root.join(&self.registry_file)
    }

    /// Load config from a specific path.
    pub fn load_from<FS: FileSystem>(fs: &FS, path: &Path) -> Result<Self> {
        let contents = fs
            .read_to_string(path)
            .map_err(|e| MailbookError::FileRead {
                path: path.to_path_buf(),
                source: e,
            })?;

        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load config from the first existing path among `candidates`.
    pub fn find<FS: FileSystem>(fs: &FS, candidates: &[PathBuf]) -> Result<(Self, PathBuf)> {
        let path = candidates
            .iter()
            .find(|path| fs.exists(path))
            .ok_or_else(|| MailbookError::ConfigNotFound(candidates.to_vec()))?;

        log::debug!("Using config {}", path.display());
        Ok((Self::load_from(fs, path)?, path.clone()))
    }

    /// Save config to a specific path.
    pub fn save_to<FS: FileSystem>(&self, fs: &FS, path: &Path) -> Result<()> {
        // Create parent directory if needed
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs.create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        fs.write_atomic(path, contents.as_bytes())
            .map_err(|source| MailbookError::FileWrite {
                path: path.to_path_buf(),
                source,
            })
    }
}

// ============================================================================
// Native-only implementation (not available in WASM)
// ============================================================================

#[cfg(not(target_arch = "wasm32"))]
impl Config {
    /// Get the config file path (~/.config/mailbook/config.toml)
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("mailbook").join("config.toml"))
    }

    /// Places searched for a config file, in order: the user config
    /// directory, the device's user storage, then the working directory
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = Self::config_path().into_iter().collect();
        paths.push(PathBuf::from("/mnt/us/mailbook.toml"));
        paths.push(PathBuf::from("mailbook.toml"));
        paths
    }

    /// Load config from the first search path that exists, or return the
    /// default if there is none
    pub fn load() -> Result<Self> {
        match Self::find(&crate::fs::RealFileSystem, &Self::search_paths()) {
            Ok((config, _)) => Ok(config),
            Err(MailbookError::ConfigNotFound(_)) => Ok(Config::default()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::InMemoryFileSystem;

    #[test]
    fn test_minimal_file_gets_defaults() {
        let fs = InMemoryFileSystem::new().with_file(
            "/etc/mailbook.toml",
            b"library_root = \"/mnt/us/documents\"\ndescriptor_path = \"/mnt/us/system/collections.json\"\n",
        );
        let config = Config::load_from(&fs, Path::new("/etc/mailbook.toml")).unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.registry_path(), PathBuf::from("/mnt/us/documents/FILELIST"));
        assert_eq!(config.converter.success_codes, vec![0, 1]);
        assert!(config.formats["epub"]);
        assert!(!config.formats["pdf"]);
    }

    #[test]
    fn test_remote_variants() {
        let fs = InMemoryFileSystem::new().with_file(
            "/c.toml",
            b"library_root = \"/lib\"\n\
              descriptor_path = \"/sys/collections.json\"\n\
              [remote]\n\
              kind = \"http\"\n\
              url = \"http://example.org/library\"\n\
              cookie_file = \"/mnt/us/cookies\"\n",
        );
        let config = Config::load_from(&fs, Path::new("/c.toml")).unwrap();

        assert_eq!(
            config.remote,
            Some(RemoteConfig::Http {
                url: "http://example.org/library".to_string(),
                cookie_file: Some(PathBuf::from("/mnt/us/cookies")),
                proxy: None,
            })
        );
    }

    #[test]
    fn test_save_then_load() {
        let fs = InMemoryFileSystem::new();
        let mut config = Config::new(PathBuf::from("/shared/kindle/documents"));
        config.remote = Some(RemoteConfig::Directory {
            path: PathBuf::from("/srv/library"),
        });
        config.converter.output_path = OutputPathStrategy::CollectionPrefixed;
        config.preserve_existing_collections = false;

        let path = Path::new("/home/u/.config/mailbook/config.toml");
        config.save_to(&fs, path).unwrap();

        assert_eq!(Config::load_from(&fs, path).unwrap(), config);
        assert_eq!(
            config.descriptor_path,
            PathBuf::from("/shared/kindle/system/collections.json")
        );
    }

    #[test]
    fn test_find_reports_searched_paths() {
        let candidates = vec![PathBuf::from("/a.toml"), PathBuf::from("/b.toml")];
        let err = Config::find(&InMemoryFileSystem::new(), &candidates).unwrap_err();
        match err {
            MailbookError::ConfigNotFound(paths) => assert_eq!(paths, candidates),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_find_takes_first_existing() {
        let fs = InMemoryFileSystem::new()
            .with_file("/b.toml", b"library_root = \"/b\"\ndescriptor_path = \"/s.json\"\n");
        let (config, path) = Config::find(
            &fs,
            &[PathBuf::from("/a.toml"), PathBuf::from("/b.toml")],
        )
        .unwrap();
        assert_eq!(path, PathBuf::from("/b.toml"));
        assert_eq!(config.library_root, PathBuf::from("/b"));
    }

    #[test]
    fn test_invalid_toml_is_a_format_error() {
        let fs = InMemoryFileSystem::new().with_file("/bad.toml", b"library_root = ");
        let err = Config::load_from(&fs, Path::new("/bad.toml")).unwrap_err();
        assert!(err.is_format_error());
    }
}
