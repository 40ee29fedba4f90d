//! Shell-side `publish` command.

use std::path::PathBuf;

use mailbook_core::config::Config;
use mailbook_core::fs::{FileSystem, RealFileSystem};
use mailbook_core::ingest::{Converter, PublishOptions, SkipReason, plan_ingest, publish};
use mailbook_core::timestamp::Timestamp;

/// Files of the current directory, for `publish` without arguments
fn current_dir_files() -> std::io::Result<Vec<PathBuf>> {
    let dir = std::env::current_dir()?;
    Ok(RealFileSystem
        .list_dir(&dir)?
        .into_iter()
        .filter(|path| !RealFileSystem.is_dir(path))
        .collect())
}

/// Handle the publish command
/// Returns true on success, false on error
pub fn handle_publish(
    config: &Config,
    collection: Option<String>,
    collection_exact: Option<String>,
    restart: bool,
    delete: bool,
    files: Vec<PathBuf>,
) -> bool {
    let explicit = !files.is_empty();
    let files = if explicit {
        files
    } else {
        match current_dir_files() {
            Ok(files) => files,
            Err(e) => {
                eprintln!("✗ Could not list the current directory: {}", e);
                return false;
            }
        }
    };

    let plan = plan_ingest(&RealFileSystem, &files, &config.formats);
    for (path, reason) in &plan.skipped {
        match reason {
            SkipReason::Missing => eprintln!("✗ File {} doesn't exist", path.display()),
            // Unsupported files are only worth mentioning when named explicitly
            SkipReason::Unsupported if explicit => {
                eprintln!("✗ {} has no supported extension, omitting", path.display())
            }
            SkipReason::Unsupported => {}
        }
    }
    if plan.items.is_empty() && !restart {
        println!("No valid files to send.");
        return true;
    }

    let exact = collection_exact.is_some();
    let options = PublishOptions {
        library_root: config.library_root.clone(),
        registry_file: config.registry_file.clone(),
        collection: collection_exact.or(collection),
        exact,
        restart,
        delete_sources: delete,
    };
    let converter = Converter::from_config(RealFileSystem, &config.converter);

    let report = match publish(&RealFileSystem, &converter, &plan.items, &options, Timestamp::now()) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("✗ Publishing failed: {}", e);
            return false;
        }
    };

    if let Some(section) = &report.section {
        println!("Collection: {}", section);
    }
    for name in &report.published {
        println!("✓ {}", name);
    }
    for (path, error) in &report.failed {
        eprintln!("✗ {}: {}", path.display(), error);
    }
    if restart {
        println!("Restart flag applied.");
    }

    report.failed.is_empty()
}
