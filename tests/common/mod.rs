// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use prodreg::db::paths;
use prodreg::privilege::{FixedAuthorizer, RecordingLauncher};
use prodreg::registry::FixedAccess;
use prodreg::{Component, Context, InitLevel, Registry, RegistryConfig};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Write an executable stand-in for `unzip`.
///
/// Invoked as `unzip -qq -o ARCHIVE -d DIR`, it runs ARCHIVE as a shell
/// script inside DIR, so a test "archive" is a script that writes the
/// extracted article files.
pub fn fake_unzip(dir: &Path) -> PathBuf {
    let path = dir.join("unzip");
    fs::write(&path, "#!/bin/sh\ncd \"$5\" && exec /bin/sh \"$3\"\n").unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Place an archive under `root` that extracts to the given articles.
///
/// Each entry is (file name, article text).
pub fn write_archive(root: &Path, articles: &[(&str, &str)]) -> PathBuf {
    let archive = paths::legacy_archive(root);
    fs::create_dir_all(archive.parent().unwrap()).unwrap();

    let mut script = String::new();
    for (name, content) in articles {
        script.push_str(&format!("cat > '{}' <<'ARTICLE_EOF'\n{}\nARTICLE_EOF\n", name, content));
    }
    fs::write(&archive, script).unwrap();
    archive
}

/// Configuration rooted at `root`, with the fake unzip from `tools`
pub fn test_config(root: &Path, tools: &Path) -> RegistryConfig {
    RegistryConfig {
        alt_root: Some(root.to_path_buf()),
        unzip_path: Some(fake_unzip(tools)),
        prune_pkg_list: false,
        ..Default::default()
    }
}

/// Context for a caller that can write the registry directly
pub fn writable_context(root: &Path, tools: &Path) -> Context {
    Context::new(test_config(root, tools))
        .with_access(Arc::new(FixedAccess::read_write()))
        .with_authorizer(Arc::new(FixedAuthorizer(false)))
        .with_launcher(Arc::new(RecordingLauncher::new(1)))
}

/// Context for an unprivileged caller; `grant` decides the RBAC answer
pub fn unprivileged_context(
    root: &Path,
    tools: &Path,
    grant: bool,
    launcher: Arc<RecordingLauncher>,
) -> Context {
    Context::new(test_config(root, tools))
        .with_access(Arc::new(FixedAccess::read_only()))
        .with_authorizer(Arc::new(FixedAuthorizer(grant)))
        .with_launcher(launcher)
}

/// A fresh writable registry in its own temporary root.
///
/// Returns (TempDir, Registry) - keep the TempDir alive to prevent cleanup.
pub fn setup_registry() -> (TempDir, Registry) {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path().join("root");
    let tools = temp_dir.path().join("tools");
    fs::create_dir_all(&root).unwrap();
    fs::create_dir_all(&tools).unwrap();

    let registry = Registry::initialize(writable_context(&root, &tools), InitLevel::Normal).unwrap();
    (temp_dir, registry)
}

/// Component with an English display name, ready to register
pub fn named(uuid: &str, name: &str) -> Component {
    Component::new(uuid).with_display_name("en", name)
}
