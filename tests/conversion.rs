// tests/conversion.rs

//! Integration tests for converting the old registry archive at initialization.

mod common;

use common::{unprivileged_context, write_archive, writable_context};
use prodreg::db::paths;
use prodreg::privilege::RecordingLauncher;
use prodreg::{CallbackProgress, Error, InitLevel, InitStatus, ProgressEvent, Query, Registry};
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const BASE: &str = "mnemonic=SUNWbase\nid=123456789\ntitle=Base\nversion=1.0";
const ADDON: &str = "mnemonic=SUNWaddon\nid=987654321\ntitle=Addon\nparent=123456789\nversion=1.0";

/// (TempDir, root, tools)
fn setup_dirs() -> (TempDir, PathBuf, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("root");
    let tools = dir.path().join("tools");
    fs::create_dir_all(&root).unwrap();
    fs::create_dir_all(&tools).unwrap();
    (dir, root, tools)
}

#[test]
fn test_conversion_happy_path() {
    let (_dir, root, tools) = setup_dirs();
    let archive = write_archive(&root, &[("A", BASE), ("B", ADDON)]);

    let positions = Arc::new(Mutex::new(Vec::new()));
    let recorded = positions.clone();
    let progress = CallbackProgress::new(100, move |event| {
        if let ProgressEvent::Position { current, total } = event {
            recorded.lock().unwrap().push(current * 100 / total.max(1));
        }
    });

    let registry = Registry::initialize_with_progress(
        writable_context(&root, &tools),
        InitLevel::Normal,
        &progress,
    )
    .unwrap();
    assert_eq!(registry.status(), InitStatus::Converted(2));

    let all = registry.get_all().unwrap();
    assert_eq!(all.len(), 2);

    let addon = registry.get(&Query::by_uuid("987654321")).unwrap().unwrap();
    assert_eq!(addon.parent.as_ref().map(|p| p.uuid.as_str()), Some("123456789"));
    assert_eq!(addon.title(), "Addon");
    assert_eq!(addon.unique_name.as_deref(), Some("SUNWaddon"));

    let base = registry.get(&Query::by_uuid("123456789")).unwrap().unwrap();
    assert!(base.children.iter().any(|k| k.uuid == "987654321"));

    assert!(!archive.exists());

    let percents = positions.lock().unwrap().clone();
    assert!(!percents.is_empty());
    assert!(percents.windows(2).all(|w| w[0] <= w[1]), "{:?}", percents);
    assert_eq!(percents.last(), Some(&100));
}

#[test]
fn test_no_conversion_leaves_archive() {
    let (_dir, root, tools) = setup_dirs();
    let archive = write_archive(&root, &[("A", BASE)]);

    let registry =
        Registry::initialize(writable_context(&root, &tools), InitLevel::NoConversion).unwrap();
    assert_eq!(registry.status(), InitStatus::ConversionRecommended);
    assert!(archive.exists());
    assert!(registry.get_all().unwrap().is_empty());
}

#[test]
fn test_conversion_refused_without_write_access() {
    let (_dir, root, tools) = setup_dirs();
    let archive = write_archive(&root, &[("A", BASE)]);
    let launcher = Arc::new(RecordingLauncher::new(0));

    let result = Registry::initialize(
        unprivileged_context(&root, &tools, false, launcher.clone()),
        InitLevel::Normal,
    );
    assert!(matches!(result, Err(Error::NoRegAccess(_))));
    assert!(archive.exists());
    assert!(!paths::registry_db(&root).exists());
    assert!(launcher.calls().is_empty());
}

#[test]
fn test_bad_archive_is_kept() {
    let (_dir, root, tools) = setup_dirs();
    let archive = paths::legacy_archive(&root);
    fs::create_dir_all(archive.parent().unwrap()).unwrap();
    // The fake unzip runs the archive; exit 9 is unzip's "not a zip file"
    fs::write(&archive, "exit 9\n").unwrap();

    let result = Registry::initialize(writable_context(&root, &tools), InitLevel::Normal);
    assert!(matches!(result, Err(Error::BadFile(_))));
    assert!(archive.exists());
}

#[test]
fn test_conversion_is_all_or_nothing() {
    let (_dir, root, tools) = setup_dirs();
    // The second article has no mnemonic and fails to parse
    let archive = write_archive(&root, &[("A", BASE), ("B", "id=5\ntitle=Broken")]);

    let result = Registry::initialize(writable_context(&root, &tools), InitLevel::Normal);
    assert!(matches!(result, Err(Error::BadFile(_))));
    assert!(archive.exists());

    let registry =
        Registry::initialize(writable_context(&root, &tools), InitLevel::NoConversion).unwrap();
    assert!(registry.get_all().unwrap().is_empty());
}

#[test]
fn test_failed_archive_removal_keeps_conversion() {
    let (_dir, root, tools) = setup_dirs();
    let archive = write_archive(&root, &[("A", BASE)]);
    // The archive deletes itself while extracting, so the final removal fails
    let mut script = fs::read_to_string(&archive).unwrap();
    script.push_str("rm -f \"$0\"\n");
    fs::write(&archive, script).unwrap();

    let registry = Registry::initialize(writable_context(&root, &tools), InitLevel::Normal).unwrap();
    assert_eq!(registry.status(), InitStatus::Converted(1));
    assert!(!archive.exists());
    assert!(registry.get(&Query::by_uuid("123456789")).unwrap().is_some());
}
