//! Publishing documents into the shell-side library.
//!
//! [`plan_ingest`] decides which files are accepted and under which name,
//! [`publish`] converts or copies them into the collection directory and
//! records them in the registry, so the device picks them up on its next
//! update.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::ConverterConfig;
use crate::error::{MailbookError, Result};
use crate::fs::FileSystem;
use crate::normalize::normalize;
use crate::registry::{Registry, SectionKind};
use crate::timestamp::Timestamp;

/// Placeholder for the input file in the converter command.
pub const OLD_NAME_PLACEHOLDER: &str = "%%OLD_NAME%%";

/// Placeholder for the output file in the converter command.
pub const NEW_NAME_PLACEHOLDER: &str = "%%NEW_NAME%%";

/// Extension of converted documents.
pub const CONVERTED_EXTENSION: &str = "mobi";

/// A file accepted for publishing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestItem {
    /// Original file
    pub source: PathBuf,
    /// Normalized file name inside the library
    pub target_name: String,
    /// Whether the file goes through the converter
    pub convert: bool,
}

/// Why a file was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The path is not an existing file
    Missing,
    /// The extension is not in the formats table
    Unsupported,
}

/// Result of [`plan_ingest`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestPlan {
    /// Accepted files, in input order
    pub items: Vec<IngestItem>,
    /// Rejected files
    pub skipped: Vec<(PathBuf, SkipReason)>,
}

/// Decide which of `paths` can be published.
///
/// `formats` maps extensions to "needs conversion"; the first entry matching
/// the file's extension (case-insensitively) applies. The target name is the
/// normalized file name, with the extension replaced by `.mobi` for converted
/// formats.
pub fn plan_ingest<FS: FileSystem>(
    fs: &FS,
    paths: &[PathBuf],
    formats: &IndexMap<String, bool>,
) -> IngestPlan {
    let mut plan = IngestPlan::default();

    for path in paths {
        if !fs.exists(path) || fs.is_dir(path) {
            plan.skipped.push((path.clone(), SkipReason::Missing));
            continue;
        }

        let Some(ext) = path.extension().map(|e| e.to_string_lossy().to_string()) else {
            plan.skipped.push((path.clone(), SkipReason::Unsupported));
            continue;
        };
        let Some((_, &convert)) = formats
            .iter()
            .find(|(format, _)| format.eq_ignore_ascii_case(&ext))
        else {
            plan.skipped.push((path.clone(), SkipReason::Unsupported));
            continue;
        };

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let mut target_name = normalize(&file_name);
        if convert {
            target_name = Path::new(&target_name)
                .with_extension(CONVERTED_EXTENSION)
                .to_string_lossy()
                .to_string();
        }

        plan.items.push(IngestItem {
            source: path.clone(),
            target_name,
            convert,
        });
    }

    plan
}

/// Where the converter is told to write its output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputPathStrategy {
    /// Straight to the target path
    #[default]
    AsIs,
    /// Next to the target, prefixed with the collection directory
    /// (`<dir>_<name>`), then moved into place. For converters that derive
    /// metadata from the output file name.
    CollectionPrefixed,
}

impl OutputPathStrategy {
    /// Converter output path for `target` in `collection_dir`.
    pub fn apply(&self, target: &Path, collection_dir: &str) -> PathBuf {
        match self {
            OutputPathStrategy::CollectionPrefixed if !collection_dir.is_empty() => {
                let name = target
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                target.with_file_name(format!("{}_{}", collection_dir, name))
            }
            _ => target.to_path_buf(),
        }
    }
}

/// Converts a document into the device format.
pub trait DocumentConverter {
    /// Convert `input` so that the result ends up at `target`.
    fn convert(&self, input: &Path, target: &Path, collection_dir: &str) -> Result<()>;
}

/// External converter command (Calibre's `ebook-convert` by default).
///
/// The command itself writes to disk; moving its output into place goes
/// through `fs`.
#[derive(Debug, Clone)]
pub struct Converter<FS> {
    fs: FS,
    command: String,
    success_codes: Vec<i32>,
    output_path: OutputPathStrategy,
}

impl<FS: FileSystem> Converter<FS> {
    /// Build a converter from its configuration.
    pub fn from_config(fs: FS, config: &ConverterConfig) -> Self {
        Self {
            fs,
            command: config.command.clone(),
            success_codes: config.success_codes.clone(),
            output_path: config.output_path,
        }
    }

    /// The argv for converting `input` into `output`. Placeholders are
    /// substituted per argument, so paths with spaces stay one argument.
    pub fn command_line(&self, input: &Path, output: &Path) -> Vec<String> {
        let input = input.to_string_lossy();
        let output = output.to_string_lossy();
        self.command
            .split_whitespace()
            .map(|arg| {
                arg.replace(OLD_NAME_PLACEHOLDER, &input)
                    .replace(NEW_NAME_PLACEHOLDER, &output)
            })
            .collect()
    }
}

impl<FS: FileSystem> DocumentConverter for Converter<FS> {
    fn convert(&self, input: &Path, target: &Path, collection_dir: &str) -> Result<()> {
        let output = self.output_path.apply(target, collection_dir);
        let argv = self.command_line(input, &output);
        let (program, args) = argv.split_first().ok_or_else(|| MailbookError::Conversion {
            path: input.to_path_buf(),
            message: "converter command is empty".to_string(),
        })?;

        log::debug!("Running {:?}", argv);
        let result = Command::new(program)
            .args(args)
            .output()
            .map_err(|e| MailbookError::Conversion {
                path: input.to_path_buf(),
                message: format!("Failed to run {}: {}", program, e),
            })?;

        let accepted = result
            .status
            .code()
            .is_some_and(|code| self.success_codes.contains(&code));
        if !accepted {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(MailbookError::Conversion {
                path: input.to_path_buf(),
                message: format!("{} exited with {}: {}", program, result.status, stderr.trim()),
            });
        }

        if output != target {
            self.fs
                .rename(&output, target)
                .map_err(|source| MailbookError::FileWrite {
                    path: target.to_path_buf(),
                    source,
                })?;
        }
        Ok(())
    }
}

/// Settings for [`publish`].
#[derive(Debug, Clone)]
pub struct PublishOptions {
    /// Shell-side library root
    pub library_root: PathBuf,
    /// Registry file name inside the library root
    pub registry_file: String,
    /// Collection query; `None` publishes into the library root
    pub collection: Option<String>,
    /// Use `collection` verbatim instead of matching existing names
    pub exact: bool,
    /// Ask the device to restart after the update
    pub restart: bool,
    /// Delete the originals of published files
    pub delete_sources: bool,
}

/// Outcome of [`publish`].
#[derive(Debug, Clone, Default)]
pub struct PublishReport {
    /// Section the files were recorded under
    pub section: Option<SectionKind>,
    /// Target names now in the library
    pub published: Vec<String>,
    /// Files that could not be converted or copied
    pub failed: Vec<(PathBuf, String)>,
}

/// Convert or copy `items` into the library and record them in its registry.
///
/// Only files that made it into the library are recorded. The registry is
/// written once, after all files, and left untouched when nothing was
/// published and no restart was requested.
pub fn publish<FS: FileSystem, C: DocumentConverter>(
    fs: &FS,
    converter: &C,
    items: &[IngestItem],
    options: &PublishOptions,
    at: Timestamp,
) -> Result<PublishReport> {
    let registry_path = options.library_root.join(&options.registry_file);
    let mut registry = Registry::load(fs, &registry_path)?;

    let section = registry.resolve_collection(options.collection.as_deref(), options.exact);
    if registry.has_section(&section) {
        log::info!("Using collection {}", section);
    } else {
        log::info!("Creating collection {}", section);
    }

    let dir_hint = section.dir_hint();
    let out_dir = options.library_root.join(&dir_hint);
    fs.create_dir_all(&out_dir)?;

    let mut report = PublishReport::default();
    let mut published_sources = Vec::new();
    for item in items {
        let target = out_dir.join(&item.target_name);
        let result = if item.convert {
            converter.convert(&item.source, &target, &dir_hint)
        } else {
            fs.copy_file(&item.source, &target)
                .map_err(|source| MailbookError::FileWrite {
                    path: target.clone(),
                    source,
                })
        };

        match result {
            Ok(()) => {
                log::info!("{} -> {}", item.source.display(), target.display());
                report.published.push(item.target_name.clone());
                published_sources.push(item.source.clone());
            }
            Err(e) => {
                log::warn!("{}", e);
                report.failed.push((item.source.clone(), e.to_string()));
            }
        }
    }

    if !report.published.is_empty() || options.restart {
        registry.record_files(section.clone(), report.published.as_slice(), at, options.restart)?;
        registry.save(fs, &registry_path)?;
    }

    if options.delete_sources {
        for source in &published_sources {
            log::info!("Removing {}", source.display());
            fs.delete_file(source)?;
        }
    }

    report.section = Some(section);
    Ok(report)
}
