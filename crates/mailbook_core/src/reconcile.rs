//! Reconciliation between two registry snapshots.
//!
//! The device keeps the registry it last applied (the *old* snapshot) and
//! periodically fetches the one published by the shell side (the *new*
//! snapshot). [`diff`] decides which files have to be fetched; the caller
//! performs the transfers, reports failures through [`apply_failures`] and
//! persists what remains, so anything that failed is fetched again next time.
//!
//! Only "newer timestamp wins" is implemented. A collection missing from the
//! new snapshot is not a deletion.

use serde::Serialize;

use crate::error::Result;
use crate::registry::{Registry, SectionKind};

/// Files to fetch for one registry section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transfer {
    /// Section the files belong to
    pub section: SectionKind,
    /// Library subdirectory for the files; empty for the library root
    pub dir_hint: String,
    /// File names, in registry order
    pub files: Vec<String>,
}

/// Everything [`diff`] found to be new or updated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransferPlan {
    /// Sum of all file list lengths, for progress output
    pub total_count: usize,
    /// One entry per section with at least one file to fetch
    pub transfers: Vec<Transfer>,
}

impl TransferPlan {
    /// True when nothing has to be fetched.
    pub fn is_empty(&self) -> bool {
        self.transfers.is_empty()
    }
}

/// A file that could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedTransfer {
    /// Section the file was listed under
    pub section: SectionKind,
    /// File name as listed in the registry
    pub file: String,
}

/// Compute the files of `new` that are missing from `old` or carry a
/// strictly later timestamp there.
///
/// Sections keep the order of `new`, files keep their order within a
/// section. The control section is skipped, and sections with nothing to
/// fetch are left out. A timestamp that fails to parse on either side aborts
/// the whole diff.
///
/// # Example
/// ```
/// use mailbook_core::reconcile::diff;
/// use mailbook_core::registry::Registry;
///
/// let old = Registry::new();
/// let new = Registry::parse("[Travel]\nguide.epub = 2020-01-01_00:00:00\n").unwrap();
///
/// let plan = diff(&old, &new).unwrap();
/// assert_eq!(plan.total_count, 1);
/// assert_eq!(plan.transfers[0].dir_hint, "travel");
/// assert_eq!(plan.transfers[0].files, vec!["guide.epub".to_string()]);
/// ```
pub fn diff(old: &Registry, new: &Registry) -> Result<TransferPlan> {
    let mut plan = TransferPlan::default();

    for section in new.sections() {
        if *section == SectionKind::Control {
            continue;
        }

        let mut files = Vec::new();
        for (file, _) in new.files(section) {
            let new_ts = new.timestamp(section, file)?;
            let wanted = match old.timestamp(section, file)? {
                None => true,
                Some(old_ts) => new_ts.is_some_and(|new_ts| new_ts > old_ts),
            };
            if wanted {
                files.push(file.to_string());
            }
        }

        if files.is_empty() {
            continue;
        }
        log::debug!("{}: {} file(s) to fetch", section, files.len());
        plan.total_count += files.len();
        plan.transfers.push(Transfer {
            section: section.clone(),
            dir_hint: section.dir_hint(),
            files,
        });
    }

    Ok(plan)
}

/// True when `new` requests a restart that `old` has not seen yet.
pub fn restart_requested(old: &Registry, new: &Registry) -> bool {
    match (old.restart_timestamp(), new.restart_timestamp()) {
        (_, None) => false,
        (None, Some(_)) => true,
        (Some(old_ts), Some(new_ts)) => new_ts > old_ts,
    }
}

/// Drop failed entries from the snapshot about to be persisted, so they are
/// treated as new on the next cycle. A collection left empty is removed.
pub fn apply_failures(registry: &mut Registry, failures: &[FailedTransfer]) {
    for failure in failures {
        if registry.remove_entry(&failure.section, &failure.file) {
            log::info!("Will retry '{}' ({}) next time", failure.file, failure.section);
        }
        if registry.file_count(&failure.section) == 0 && registry.has_section(&failure.section) {
            registry.remove_section(&failure.section);
        }
    }
}

/// What to do with the device once the library is updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeviceAction {
    /// Restart the device so it reloads the collections descriptor
    Reboot,
    /// Ask the device to rescan its library without restarting
    Refresh,
}

impl DeviceAction {
    /// Reboot only when a restart was asked for (by the registry or by the
    /// user), rebooting is allowed, and the descriptor actually changed.
    pub fn decide(
        restart_requested: bool,
        forced: bool,
        no_reboot: bool,
        descriptor_changed: bool,
    ) -> Self {
        if (restart_requested || forced) && !no_reboot && descriptor_changed {
            DeviceAction::Reboot
        } else {
            DeviceAction::Refresh
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MailbookError;

    fn registry(text: &str) -> Registry {
        Registry::parse(text).unwrap()
    }

    fn travel() -> SectionKind {
        SectionKind::Collection("Travel".to_string())
    }

    #[test]
    fn test_new_file_is_fetched() {
        let plan = diff(
            &Registry::new(),
            &registry("[Travel]\nguide.epub = 2020-01-01_00:00:00\n"),
        )
        .unwrap();

        assert_eq!(plan.total_count, 1);
        assert_eq!(
            plan.transfers,
            vec![Transfer {
                section: travel(),
                dir_hint: "travel".to_string(),
                files: vec!["guide.epub".to_string()],
            }]
        );
    }

    #[test]
    fn test_unchanged_file_is_skipped() {
        let text = "[Travel]\nguide.epub = 2020-01-01_00:00:00\n";
        let plan = diff(&registry(text), &registry(text)).unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.total_count, 0);
    }

    #[test]
    fn test_only_strictly_newer_files_are_fetched() {
        let old = registry(
            "[Travel]\na.mobi = 2020-01-02_00:00:00\nb.mobi = 2020-01-02_00:00:00\nc.mobi = 2020-01-02_00:00:00\n",
        );
        let new = registry(
            "[Travel]\na.mobi = 2020-01-01_00:00:00\nb.mobi = 2020-01-02_00:00:00\nc.mobi = 2020-01-03_00:00:00\n",
        );

        let plan = diff(&old, &new).unwrap();
        assert_eq!(plan.transfers.len(), 1);
        assert_eq!(plan.transfers[0].files, vec!["c.mobi".to_string()]);
    }

    #[test]
    fn test_no_collection_maps_to_library_root() {
        let plan = diff(
            &Registry::new(),
            &registry("[___NO_COLLECTION___]\nnotes.txt = 2020-01-01_00:00:00\n"),
        )
        .unwrap();
        assert_eq!(plan.transfers[0].section, SectionKind::NoCollection);
        assert_eq!(plan.transfers[0].dir_hint, "");
    }

    #[test]
    fn test_control_section_never_transferred() {
        let plan = diff(
            &Registry::new(),
            &registry("[___SPECIAL___]\nRestartTimeStamp = 2021-06-01_10:00:00\n"),
        )
        .unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_removed_collection_is_not_a_deletion() {
        let old = registry("[Travel]\nguide.epub = 2020-01-01_00:00:00\n");
        let plan = diff(&old, &Registry::new()).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_bad_timestamp_is_fatal() {
        let old = registry("[Travel]\nguide.epub = 2020-01-01_00:00:00\n");
        let new = registry("[Travel]\nguide.epub = tomorrow\n");
        assert!(matches!(
            diff(&old, &new),
            Err(MailbookError::InvalidTimestamp(_))
        ));

        let old = registry("[Travel]\nguide.epub = ???\n");
        let new = registry("[Travel]\nguide.epub = 2020-01-01_00:00:00\n");
        assert!(diff(&old, &new).is_err());
    }

    #[test]
    fn test_diff_is_idempotent() {
        let old = registry("[Travel]\na.mobi = 2020-01-01_00:00:00\n");
        let new = registry(
            "[Travel]\na.mobi = 2020-02-01_00:00:00\nb.mobi = 2020-01-01_00:00:00\n[Poetry]\nc.pdf = 2020-01-01_00:00:00\n",
        );
        assert_eq!(diff(&old, &new).unwrap(), diff(&old, &new).unwrap());
    }

    #[test]
    fn test_restart_requested() {
        let none = Registry::new();
        let early = registry("[___SPECIAL___]\nRestartTimeStamp = 2021-06-01_10:00:00\n");
        let late = registry("[___SPECIAL___]\nRestartTimeStamp = 2021-06-02_10:00:00\n");
        let broken = registry("[___SPECIAL___]\nRestartTimeStamp = whenever\n");

        assert!(restart_requested(&none, &early));
        assert!(restart_requested(&early, &late));
        assert!(!restart_requested(&late, &early));
        assert!(!restart_requested(&early, &early));
        assert!(!restart_requested(&early, &none));
        assert!(!restart_requested(&none, &broken));
        assert!(restart_requested(&broken, &early));
    }

    #[test]
    fn test_apply_failures_prunes_entries_and_empty_sections() {
        let mut new = registry(
            "[Travel]\nguide.epub = 2020-01-01_00:00:00\n[Poetry]\na.pdf = 2020-01-01_00:00:00\nb.pdf = 2020-01-01_00:00:00\n",
        );
        let poetry = SectionKind::Collection("Poetry".to_string());

        apply_failures(
            &mut new,
            &[
                FailedTransfer {
                    section: travel(),
                    file: "guide.epub".to_string(),
                },
                FailedTransfer {
                    section: poetry.clone(),
                    file: "a.pdf".to_string(),
                },
            ],
        );

        assert!(!new.has_section(&travel()));
        assert!(!new.has_entry(&poetry, "a.pdf"));
        assert!(new.has_entry(&poetry, "b.pdf"));

        // The pruned entry shows up again on the next diff
        let retry = diff(&new, &registry("[Poetry]\na.pdf = 2020-01-01_00:00:00\n")).unwrap();
        assert_eq!(retry.transfers[0].files, vec!["a.pdf".to_string()]);
    }

    #[test]
    fn test_device_action_decision() {
        assert_eq!(DeviceAction::decide(true, false, false, true), DeviceAction::Reboot);
        assert_eq!(DeviceAction::decide(false, true, false, true), DeviceAction::Reboot);
        assert_eq!(DeviceAction::decide(true, false, true, true), DeviceAction::Refresh);
        assert_eq!(DeviceAction::decide(true, false, false, false), DeviceAction::Refresh);
        assert_eq!(DeviceAction::decide(false, false, false, true), DeviceAction::Refresh);
    }
}
