//! Command-line argument structures and enums

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mailbook")]
#[command(version)]
#[command(about = "Keep an e-reader library in sync with a library on a shell account", long_about = None)]
pub struct Cli {
    /// Config file (default: first of ~/.config/mailbook/config.toml,
    /// /mnt/us/mailbook.toml, ./mailbook.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the library root
    #[arg(short, long, global = true)]
    pub library: Option<PathBuf>,

    /// Show debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download new documents and regenerate collections (device side)
    Update {
        /// Prevent the device from rebooting after the update
        #[arg(short, long)]
        no_reboot: bool,

        /// Show what would be downloaded without changing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Regenerate collections from the local directory tree, then reboot
    Generate {
        /// Prevent the device from rebooting
        #[arg(short, long)]
        no_reboot: bool,
    },

    /// Show which files a registry update would transfer
    Diff {
        /// Registry currently applied
        old: PathBuf,

        /// Registry to apply
        new: PathBuf,

        /// Print the transfer plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the collections found in the library
    #[command(alias = "ls")]
    Collections {
        /// List the documents of every collection
        #[arg(short, long)]
        files: bool,
    },

    /// Add documents to the library (shell side)
    Publish {
        /// Collection name; a prefix of an existing collection selects it
        #[arg(short, long, group = "target")]
        collection: Option<String>,

        /// Exact collection name, for creating a collection
        #[arg(short = 'C', long, group = "target")]
        collection_exact: Option<String>,

        /// Ask the device to restart after its next update
        #[arg(short, long)]
        restart: bool,

        /// Delete the original files once published
        #[arg(short, long)]
        delete: bool,

        /// Documents to publish (default: every file in the current directory)
        files: Vec<PathBuf>,
    },

    /// Write a default configuration file
    Init {
        /// Library root to configure (default: /mnt/us/documents)
        #[arg(long)]
        library_root: Option<PathBuf>,

        /// Overwrite an existing configuration file
        #[arg(short, long)]
        force: bool,
    },
}
