//! Publishing on the shell side and updating the device, on a real filesystem

use mailbook_core::config::{Config, default_formats};
use mailbook_core::descriptor::Descriptor;
use mailbook_core::fs::{FileSystem, RealFileSystem};
use mailbook_core::ingest::{Converter, PublishOptions, plan_ingest, publish};
use mailbook_core::reconcile::DeviceAction;
use mailbook_core::registry::{Registry, SectionKind};
use mailbook_core::sync::{UpdateCycle, UpdateOptions};
use mailbook_core::timestamp::Timestamp;
use mailbook_core::transport::DirectoryTransport;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

struct Setup {
    _dir: TempDir,
    inbox: PathBuf,
    remote: PathBuf,
    device: PathBuf,
}

fn setup() -> Setup {
    let dir = tempfile::tempdir().unwrap();
    let inbox = dir.path().join("inbox");
    let remote = dir.path().join("remote");
    let device = dir.path().join("device").join("documents");
    for path in [&inbox, &remote, &device] {
        std::fs::create_dir_all(path).unwrap();
    }
    Setup {
        _dir: dir,
        inbox,
        remote,
        device,
    }
}

fn publish_files(setup: &Setup, names: &[&str], collection: Option<&str>, restart: bool, at: &str) {
    let paths: Vec<PathBuf> = names
        .iter()
        .map(|name| {
            let path = setup.inbox.join(name);
            std::fs::write(&path, name.as_bytes()).unwrap();
            path
        })
        .collect();
    let plan = plan_ingest(&RealFileSystem, &paths, &default_formats());
    assert!(plan.items.iter().all(|item| !item.convert));

    let options = PublishOptions {
        library_root: setup.remote.clone(),
        registry_file: "FILELIST".to_string(),
        collection: collection.map(str::to_string),
        exact: false,
        restart,
        delete_sources: false,
    };
    let converter = Converter::from_config(RealFileSystem, &Config::default().converter);
    let report = publish(
        &RealFileSystem,
        &converter,
        &plan.items,
        &options,
        Timestamp::parse(at).unwrap(),
    )
    .unwrap();
    assert!(report.failed.is_empty());
}

fn update(setup: &Setup, now_ms: i64) -> mailbook_core::sync::UpdateReport {
    let config = Config::new(setup.device.clone());
    let cycle = UpdateCycle::new(RealFileSystem, UpdateOptions::from_config(&config, now_ms));
    cycle
        .run(&DirectoryTransport::new(RealFileSystem, &setup.remote))
        .unwrap()
}

fn descriptor_path(setup: &Setup) -> PathBuf {
    Config::new(setup.device.clone()).descriptor_path
}

#[test]
fn published_documents_reach_the_device() {
    let setup = setup();
    publish_files(&setup, &["Guide Book.pdf", "Map.PDF"], Some("Travel"), false, "2013-06-01_10:00:00");
    publish_files(&setup, &["notes.txt"], None, false, "2013-06-01_10:05:00");

    let report = update(&setup, 1_000);

    assert_eq!(report.plan.total_count, 3);
    assert_eq!(report.fetched, 3);
    assert_eq!(report.action, DeviceAction::Refresh);
    assert!(setup.device.join("travel").join("guide_book.pdf").exists());
    assert!(setup.device.join("travel").join("map.pdf").exists());
    assert!(setup.device.join("notes.txt").exists());

    let descriptor = Descriptor::load(&RealFileSystem, &descriptor_path(&setup)).unwrap();
    let travel = descriptor.get("Travel@en-US").unwrap();
    assert_eq!(travel.items.len(), 2);
    assert_eq!(travel.last_access, 1_000);

    let local = Registry::load(&RealFileSystem, &setup.device.join("FILELIST")).unwrap();
    let remote = Registry::load(&RealFileSystem, &setup.remote.join("FILELIST")).unwrap();
    assert_eq!(local, remote);
}

#[test]
fn restart_request_reboots_once() {
    let setup = setup();
    publish_files(&setup, &["dune.mobi"], Some("Science Fiction"), true, "2013-06-12_14:03:45");

    let first = update(&setup, 1_000);
    assert!(first.restart_requested);
    assert_eq!(first.action, DeviceAction::Reboot);

    let second = update(&setup, 2_000);
    assert!(!second.restart_requested);
    assert!(!second.descriptor_changed);
    assert_eq!(second.action, DeviceAction::Refresh);
}

#[test]
fn republished_file_is_fetched_again() {
    let setup = setup();
    publish_files(&setup, &["dune.mobi"], Some("Science Fiction"), false, "2013-06-12_14:03:45");
    update(&setup, 1_000);

    // Partial name picks the existing collection
    publish_files(&setup, &["dune.mobi"], Some("science"), false, "2013-06-13_08:00:00");
    let report = update(&setup, 2_000);

    assert_eq!(report.plan.total_count, 1);
    assert_eq!(report.plan.transfers[0].section, SectionKind::Collection("Science Fiction".to_string()));
    assert_eq!(report.plan.transfers[0].dir_hint, "science_fiction");
}

#[test]
fn descriptor_write_leaves_no_staging_file() {
    let setup = setup();
    publish_files(&setup, &["a.pdf"], Some("Travel"), false, "2013-06-01_10:00:00");
    update(&setup, 1_000);

    let system_dir = descriptor_path(&setup).parent().unwrap().to_path_buf();
    let entries = RealFileSystem.list_dir(&system_dir).unwrap();
    assert_eq!(entries, vec![system_dir.join("collections.json")]);

    let registry_dir = Path::new(&setup.device);
    assert!(
        RealFileSystem
            .list_dir(registry_dir)
            .unwrap()
            .iter()
            .all(|p| !p.to_string_lossy().ends_with(".tmp"))
    );
}
