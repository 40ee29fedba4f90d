#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Grouping library directories into collections
pub mod collections;

/// Configuration options
pub mod config;

/// The device's collections descriptor
pub mod descriptor;

/// Error (common error types)
pub mod error;

/// Filesystem abstraction
pub mod fs;

/// Document identity tokens
pub mod identity;

/// Publishing documents into the shell-side library
pub mod ingest;

/// Filename normalization
pub mod normalize;

/// Registry diffing and device decisions
pub mod reconcile;

/// The registry file (`FILELIST`)
pub mod registry;

/// Device-side update cycle
pub mod sync;

/// Registry timestamps
pub mod timestamp;

/// Remote library access
pub mod transport;

pub use error::{MailbookError, Result};
