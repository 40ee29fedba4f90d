//! Read-only commands: `diff` and `collections`.

use std::path::Path;

use mailbook_core::collections::{self, CollectionTree};
use mailbook_core::config::Config;
use mailbook_core::fs::RealFileSystem;
use mailbook_core::reconcile::{diff, restart_requested};
use mailbook_core::registry::Registry;
use mailbook_core::transport::remote_path;

/// Print collections with their document counts
pub fn print_collections(tree: &CollectionTree, show_files: bool) {
    for (name, files) in tree.iter() {
        println!("* '{}' - {} items.", name, files.len());
        if show_files {
            for file in files {
                println!("  - {}", file.display());
            }
        }
    }
    println!("{} documents in the library.", tree.document_count());
}

/// Handle the diff command
/// Returns true on success, false on error
pub fn handle_diff(old: &Path, new: &Path, json: bool) -> bool {
    let load = |path: &Path| {
        Registry::load(&RealFileSystem, path).map_err(|e| {
            eprintln!("✗ {}: {}", path.display(), e);
        })
    };
    let (Ok(old), Ok(new)) = (load(old), load(new)) else {
        return false;
    };

    let plan = match diff(&old, &new) {
        Ok(plan) => plan,
        Err(e) => {
            eprintln!("✗ {}", e);
            return false;
        }
    };

    if json {
        match serde_json::to_string_pretty(&plan) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("✗ {}", e);
                return false;
            }
        }
        return true;
    }

    if plan.is_empty() {
        println!("No files to transfer.");
    } else {
        println!("{} files to transfer:", plan.total_count);
        for transfer in &plan.transfers {
            println!("{}", transfer.section);
            for file in &transfer.files {
                println!("  {}", remote_path(&transfer.dir_hint, file));
            }
        }
    }
    if restart_requested(&old, &new) {
        println!("Restart requested.");
    }
    true
}

/// Handle the collections command
/// Returns true on success, false on error
pub fn handle_collections(config: &Config, show_files: bool) -> bool {
    let registry = match Registry::load(&RealFileSystem, &config.registry_path()) {
        Ok(registry) => registry,
        Err(e) => {
            eprintln!("✗ {}", e);
            return false;
        }
    };

    match collections::resolve(
        &RealFileSystem,
        &config.library_root,
        &registry.collection_names(),
        &config.extensions,
    ) {
        Ok(tree) => {
            print_collections(&tree, show_files);
            true
        }
        Err(e) => {
            eprintln!("✗ {}", e);
            false
        }
    }
}
