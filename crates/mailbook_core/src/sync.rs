//! The device-side update cycle.
//!
//! One run brings the local library up to date with the remote registry and
//! regenerates the collections descriptor:
//!
//! 1. load the registry last applied on the device
//! 2. fetch and parse the remote registry
//! 3. [`diff`] them and fetch every listed file
//! 4. drop failed files from the new registry and persist it
//! 5. resolve collections from the library tree and rewrite the descriptor
//! 6. decide between reboot and refresh
//!
//! Everything before step 4 is read-only on the device, so a malformed
//! registry leaves the library untouched.

use std::path::PathBuf;

use crate::collections::{self, CollectionTree};
use crate::config::Config;
use crate::descriptor::{self, Descriptor, DescriptorOptions};
use crate::error::Result;
use crate::fs::FileSystem;
use crate::reconcile::{
    DeviceAction, FailedTransfer, TransferPlan, apply_failures, diff, restart_requested,
};
use crate::registry::Registry;
use crate::transport::{Transport, local_destination, remote_path};

/// Settings for one update.
#[derive(Debug, Clone)]
pub struct UpdateOptions {
    /// Local library directory
    pub library_root: PathBuf,
    /// Registry file name inside the library root
    pub registry_file: String,
    /// The device's collections descriptor
    pub descriptor_path: PathBuf,
    /// Document extensions listed in collections
    pub extensions: Vec<String>,
    /// Descriptor key suffix and stale-shelf handling
    pub descriptor: DescriptorOptions,
    /// Never reboot, only refresh
    pub no_reboot: bool,
    /// Compute everything, fetch and write nothing
    pub dry_run: bool,
    /// Current time in epoch milliseconds, stamped on new shelves
    pub now_ms: i64,
}

impl UpdateOptions {
    /// Options from a loaded config.
    pub fn from_config(config: &Config, now_ms: i64) -> Self {
        Self {
            library_root: config.library_root.clone(),
            registry_file: config.registry_file.clone(),
            descriptor_path: config.descriptor_path.clone(),
            extensions: config.extensions.clone(),
            descriptor: DescriptorOptions {
                locale: config.locale.clone(),
                preserve_existing: config.preserve_existing_collections,
            },
            no_reboot: false,
            dry_run: false,
            now_ms,
        }
    }

    fn registry_path(&self) -> PathBuf {
        self.library_root.join(&self.registry_file)
    }
}

/// What an update did.
#[derive(Debug, Clone)]
pub struct UpdateReport {
    /// Files the remote registry listed as new or updated
    pub plan: TransferPlan,
    /// Number of files fetched successfully
    pub fetched: usize,
    /// Files that could not be fetched; retried on the next run
    pub failures: Vec<FailedTransfer>,
    /// The remote registry asked for a restart
    pub restart_requested: bool,
    /// Collections found in the library afterwards
    pub collections: CollectionTree,
    /// The descriptor differs from the previous one
    pub descriptor_changed: bool,
    /// What should happen to the device now
    pub action: DeviceAction,
}

/// Runs updates against one library.
pub struct UpdateCycle<FS> {
    fs: FS,
    options: UpdateOptions,
}

impl<FS: FileSystem> UpdateCycle<FS> {
    /// Create an update cycle.
    pub fn new(fs: FS, options: UpdateOptions) -> Self {
        Self { fs, options }
    }

    /// Options this cycle runs with.
    pub fn options(&self) -> &UpdateOptions {
        &self.options
    }

    /// Fetch what changed remotely, then regenerate the collections.
    pub fn run<T: Transport + ?Sized>(&self, transport: &T) -> Result<UpdateReport> {
        let registry_path = self.options.registry_path();
        let old = Registry::load(&self.fs, &registry_path)?;
        let new = Registry::parse(&transport.fetch_registry()?)?;

        let plan = diff(&old, &new)?;
        if plan.is_empty() {
            log::info!("No files to download");
        } else {
            log::info!("Downloading {} files", plan.total_count);
        }

        let (fetched, failures) = if self.options.dry_run {
            (0, Vec::new())
        } else {
            self.fetch_all(transport, &plan)?
        };

        let mut applied = new.clone();
        apply_failures(&mut applied, &failures);
        if self.options.dry_run {
            log::info!("Dry run, registry not written");
        } else {
            applied.save(&self.fs, &registry_path)?;
        }

        let restart = restart_requested(&old, &new);
        let (collections, descriptor_changed) = self.regenerate(&applied)?;
        let action = DeviceAction::decide(
            restart,
            false,
            self.options.no_reboot,
            descriptor_changed,
        );

        Ok(UpdateReport {
            plan,
            fetched,
            failures,
            restart_requested: restart,
            collections,
            descriptor_changed,
            action,
        })
    }

    /// Regenerate the collections from the library as it is, naming them
    /// after the local registry. A changed descriptor always reboots unless
    /// rebooting is disabled.
    pub fn generate(&self) -> Result<UpdateReport> {
        let registry = Registry::load(&self.fs, &self.options.registry_path())?;
        let (collections, descriptor_changed) = self.regenerate(&registry)?;
        let action = DeviceAction::decide(false, true, self.options.no_reboot, descriptor_changed);

        Ok(UpdateReport {
            plan: TransferPlan::default(),
            fetched: 0,
            failures: Vec::new(),
            restart_requested: false,
            collections,
            descriptor_changed,
            action,
        })
    }

    fn fetch_all<T: Transport + ?Sized>(
        &self,
        transport: &T,
        plan: &TransferPlan,
    ) -> Result<(usize, Vec<FailedTransfer>)> {
        let mut fetched = 0;
        let mut failures = Vec::new();

        for transfer in &plan.transfers {
            for file in &transfer.files {
                let relative = remote_path(&transfer.dir_hint, file);
                let failed = || FailedTransfer {
                    section: transfer.section.clone(),
                    file: file.clone(),
                };

                let Some(destination) =
                    local_destination(&self.options.library_root, &transfer.dir_hint, file)
                else {
                    log::warn!("Refusing to download {} outside the library", relative);
                    failures.push(failed());
                    continue;
                };
                if let Some(dir) = destination.parent()
                    && !self.fs.exists(dir)
                {
                    log::info!("Creating directory for '{}'", transfer.dir_hint);
                    self.fs.create_dir_all(dir)?;
                }

                match transport.fetch(&transfer.dir_hint, file, &destination) {
                    Ok(()) => {
                        log::info!("Downloaded {}", relative);
                        fetched += 1;
                    }
                    Err(e) => {
                        log::warn!("Could not download {}, omitting: {}", relative, e);
                        failures.push(failed());
                    }
                }
            }
        }

        Ok((fetched, failures))
    }

    fn regenerate(&self, registry: &Registry) -> Result<(CollectionTree, bool)> {
        let tree = collections::resolve(
            &self.fs,
            &self.options.library_root,
            &registry.collection_names(),
            &self.options.extensions,
        )?;

        let previous = Descriptor::load(&self.fs, &self.options.descriptor_path);
        if self.options.descriptor.preserve_existing {
            log::debug!("Preserving existing collections");
        }
        let (descriptor, changed) = descriptor::serialize(
            &self.fs,
            &tree,
            previous.as_ref(),
            &self.options.descriptor,
            self.options.now_ms,
        );

        if self.options.dry_run {
            log::info!("Dry run, descriptor not written");
        } else if changed {
            descriptor.save(&self.fs, &self.options.descriptor_path)?;
            log::info!("Collections file saved");
        } else {
            log::info!("No changes in collections");
        }

        Ok((tree, changed))
    }
}
