// src/db/paths.rs
//! Centralized path derivation for registry files under an alternate root

use std::path::{Path, PathBuf};

/// Registry directory relative to the root
pub const REGISTRY_DIR: &str = "var/sadm/install/registry";

/// Database file name inside the registry directory
pub const REGISTRY_DB: &str = "productregistry.db";

/// Old zipped datasheet archive relative to the root
pub const LEGACY_ARCHIVE: &str = "var/sadm/install/swProductRegistry";

/// Host package database relative to the root
pub const SYS_PKG_DIR: &str = "var/sadm/pkg";

/// Get the directory holding the registry
pub fn registry_dir(root: &Path) -> PathBuf {
    root.join(REGISTRY_DIR)
}

/// Get the registry database file
pub fn registry_db(root: &Path) -> PathBuf {
    registry_dir(root).join(REGISTRY_DB)
}

/// Get the legacy archive path
pub fn legacy_archive(root: &Path) -> PathBuf {
    root.join(LEGACY_ARCHIVE)
}

/// Get the directory of installed host packages
pub fn sys_pkg_dir(root: &Path) -> PathBuf {
    root.join(SYS_PKG_DIR)
}
