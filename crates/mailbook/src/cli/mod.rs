//! Command handlers for the `mailbook` binary.
//!
//! Handlers print `✓`/`✗` lines for the user and return whether they
//! succeeded; diagnostics go through `log`.

/// Clap argument definitions
mod args;

/// Reboot and refresh commands
mod device;

/// HTTP access to the remote library
mod http;

/// `publish` command (shell side)
mod publish;

/// `diff` and `collections` commands
mod status;

/// `update` and `generate` commands (device side)
mod update;

use clap::Parser;
use std::path::{Path, PathBuf};

use mailbook_core::config::Config;
use mailbook_core::fs::{FileSystem, RealFileSystem};
use mailbook_core::{MailbookError, Result};

use args::{Cli, Commands};

/// Main entry point for the CLI
pub fn run_cli() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let success = match cli.command {
        Commands::Init {
            library_root,
            force,
        } => handle_init(cli.config.as_deref(), library_root.or(cli.library), force),

        Commands::Diff { old, new, json } => status::handle_diff(&old, &new, json),

        Commands::Update { no_reboot, dry_run } => {
            with_config(cli.config.as_deref(), cli.library, |config| {
                update::handle_update(config, no_reboot, dry_run)
            })
        }

        Commands::Generate { no_reboot } => {
            with_config(cli.config.as_deref(), cli.library, |config| {
                update::handle_generate(config, no_reboot)
            })
        }

        Commands::Collections { files } => {
            with_config(cli.config.as_deref(), cli.library, |config| {
                status::handle_collections(config, files)
            })
        }

        Commands::Publish {
            collection,
            collection_exact,
            restart,
            delete,
            files,
        } => with_config(cli.config.as_deref(), cli.library, |config| {
            publish::handle_publish(config, collection, collection_exact, restart, delete, files)
        }),
    };

    if !success {
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

/// Run `handler` with the loaded config, reporting load errors
fn with_config(
    path: Option<&Path>,
    library: Option<PathBuf>,
    handler: impl FnOnce(&Config) -> bool,
) -> bool {
    match load_config(path, library) {
        Ok(config) => handler(&config),
        Err(e) => {
            eprintln!("✗ Error loading config: {}", e);
            false
        }
    }
}

/// Load the config from `path`, or from the default search paths, then apply
/// the `--library` override
fn load_config(path: Option<&Path>, library: Option<PathBuf>) -> Result<Config> {
    let mut config = match path {
        Some(path) => Config::load_from(&RealFileSystem, path)?,
        None => Config::load()?,
    };
    if let Some(library) = library {
        config.library_root = library;
    }
    log::debug!("Library root: {}", config.library_root.display());
    Ok(config)
}

/// Handle the init command
/// Returns true on success, false on error
fn handle_init(path: Option<&Path>, library_root: Option<PathBuf>, force: bool) -> bool {
    let path = match path.map(Path::to_path_buf).or_else(Config::config_path) {
        Some(path) => path,
        None => {
            eprintln!("✗ {}, use --config", MailbookError::NoConfigDir);
            return false;
        }
    };

    if RealFileSystem.exists(&path) && !force {
        eprintln!("✗ Config already exists at {}", path.display());
        eprintln!("  Use --force to overwrite it.");
        return false;
    }

    let config = library_root.map(Config::new).unwrap_or_default();
    match config.save_to(&RealFileSystem, &path) {
        Ok(()) => {
            println!("✓ Created config at {}", path.display());
            println!("  Library: {}", config.library_root.display());
            println!("  Collections file: {}", config.descriptor_path.display());
            println!();
            println!("Add a [remote] section before running 'mailbook update'.");
            true
        }
        Err(e) => {
            eprintln!("✗ Error writing config: {}", e);
            false
        }
    }
}
