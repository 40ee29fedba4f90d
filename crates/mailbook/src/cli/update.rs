//! Device-side commands: `update` and `generate`.

use chrono::Utc;

use mailbook_core::config::{Config, RemoteConfig};
use mailbook_core::fs::RealFileSystem;
use mailbook_core::reconcile::DeviceAction;
use mailbook_core::sync::{UpdateCycle, UpdateOptions, UpdateReport};
use mailbook_core::transport::{DirectoryTransport, Transport, remote_path};
use mailbook_core::Result;

use super::device;
use super::http::HttpTransport;
use super::status::print_collections;

/// Build the transport for the configured remote library
fn transport(config: &Config) -> Result<Option<Box<dyn Transport>>> {
    let transport: Box<dyn Transport> = match &config.remote {
        None => return Ok(None),
        Some(RemoteConfig::Directory { path }) => Box::new(
            DirectoryTransport::new(RealFileSystem, path)
                .with_registry_file(config.registry_file.clone()),
        ),
        Some(RemoteConfig::Http {
            url,
            cookie_file,
            proxy,
        }) => Box::new(HttpTransport::new(
            url,
            cookie_file.as_deref(),
            proxy.as_deref(),
            &config.registry_file,
        )?),
    };
    Ok(Some(transport))
}

fn options(config: &Config, no_reboot: bool, dry_run: bool) -> UpdateOptions {
    let mut options = UpdateOptions::from_config(config, Utc::now().timestamp_millis());
    options.no_reboot = no_reboot;
    options.dry_run = dry_run;
    options
}

/// Handle the update command
/// Returns true on success, false on error
pub fn handle_update(config: &Config, no_reboot: bool, dry_run: bool) -> bool {
    let transport = match transport(config) {
        Ok(Some(transport)) => transport,
        Ok(None) => {
            eprintln!("✗ No remote library configured");
            eprintln!("  Add a [remote] section to the config file.");
            return false;
        }
        Err(e) => {
            eprintln!("✗ {}", e);
            return false;
        }
    };

    let cycle = UpdateCycle::new(RealFileSystem, options(config, no_reboot, dry_run));
    let report = match cycle.run(transport.as_ref()) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("✗ Update failed: {}", e);
            if e.is_format_error() {
                eprintln!("  The local library was not changed.");
            }
            return false;
        }
    };

    if dry_run {
        println!("Would download {} files:", report.plan.total_count);
        for transfer in &report.plan.transfers {
            for file in &transfer.files {
                println!("  {}", remote_path(&transfer.dir_hint, file));
            }
        }
    } else if report.plan.is_empty() {
        println!("No files to download.");
    } else {
        println!("✓ Downloaded {} of {} files", report.fetched, report.plan.total_count);
    }
    for failure in &report.failures {
        eprintln!("✗ {} ({}) will be retried next time", failure.file, failure.section);
    }

    finish(config, &report, dry_run)
}

/// Handle the generate command
/// Returns true on success, false on error
pub fn handle_generate(config: &Config, no_reboot: bool) -> bool {
    let cycle = UpdateCycle::new(RealFileSystem, options(config, no_reboot, false));
    match cycle.generate() {
        Ok(report) => finish(config, &report, false),
        Err(e) => {
            eprintln!("✗ Could not generate collections: {}", e);
            false
        }
    }
}

fn finish(config: &Config, report: &UpdateReport, dry_run: bool) -> bool {
    println!("Collections from directory structure:");
    print_collections(&report.collections, false);
    println!();

    match (report.descriptor_changed, dry_run) {
        (true, false) => println!("✓ Collections file saved."),
        (true, true) => println!("Collections would change."),
        (false, _) => println!("No changes in collections."),
    }

    if dry_run {
        let verb = match report.action {
            DeviceAction::Reboot => "reboot",
            DeviceAction::Refresh => "refresh",
        };
        println!("Dry run, would {} the device.", verb);
        return true;
    }
    device::perform(report.action, &config.device)
}
