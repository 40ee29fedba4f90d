use std::path::PathBuf;

use thiserror::Error;

/// Unified error type for mailbook operations
#[derive(Debug, Error)]
pub enum MailbookError {
    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    // Registry errors
    #[error("Malformed registry at line {line}: {reason}")]
    MalformedRegistry { line: usize, reason: String },

    #[error("File name '{0}' cannot be stored in the registry")]
    InvalidEntryName(String),

    #[error("Invalid timestamp '{0}', expected YYYY-MM-DD_HH:MM:SS")]
    InvalidTimestamp(String),

    // Descriptor errors
    #[error("Descriptor serialization error: {0}")]
    Descriptor(#[from] serde_json::Error),

    // Config errors
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("No configuration file found (looked in {0:?}). Run 'mailbook init' first.")]
    ConfigNotFound(Vec<PathBuf>),

    // Collaborator errors
    #[error("Transfer of '{path}' failed: {message}")]
    Transport { path: String, message: String },

    #[error("Conversion of '{path}' failed: {message}")]
    Conversion { path: PathBuf, message: String },
}

/// Result type alias for mailbook operations
pub type Result<T> = std::result::Result<T, MailbookError>;

impl MailbookError {
    /// True for errors caused by bad registry or config content rather than I/O.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            MailbookError::MalformedRegistry { .. }
                | MailbookError::InvalidTimestamp(_)
                | MailbookError::ConfigParse(_)
        )
    }
}
