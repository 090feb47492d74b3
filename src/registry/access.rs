// src/registry/access.rs

//! Read and write access checks for the registry files

use nix::unistd::{AccessFlags, access, geteuid};
use std::path::Path;

/// Access intent, mirroring `O_RDONLY` / `O_RDWR`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
}

/// Decides whether the current process may read or modify the registry
pub trait AccessPolicy: Send + Sync {
    fn can_access(&self, registry_db: &Path, mode: AccessMode, alt_root: bool) -> bool;
}

/// Access decided by the process credentials and file modes
///
/// Modifying the registry of the running system requires the superuser;
/// under an alternate root, write permission on the registry is enough.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemAccess;

impl AccessPolicy for SystemAccess {
    fn can_access(&self, registry_db: &Path, mode: AccessMode, alt_root: bool) -> bool {
        let flags = match mode {
            AccessMode::ReadOnly => AccessFlags::R_OK,
            AccessMode::ReadWrite => AccessFlags::R_OK | AccessFlags::W_OK,
        };

        if mode == AccessMode::ReadWrite && !alt_root && !geteuid().is_root() {
            return false;
        }

        // A registry that does not exist yet is accessible if the nearest
        // existing ancestor directory is.
        let mut target = registry_db;
        while !target.exists() {
            match target.parent() {
                Some(parent) => target = parent,
                None => return false,
            }
        }
        let flags = if target.is_dir() && target != registry_db {
            flags | AccessFlags::X_OK
        } else {
            flags
        };
        access(target, flags).is_ok()
    }
}

/// Fixed answers, for callers that already know their privileges
#[derive(Debug, Clone, Copy)]
pub struct FixedAccess {
    pub read: bool,
    pub write: bool,
}

impl FixedAccess {
    pub fn read_only() -> Self {
        Self {
            read: true,
            write: false,
        }
    }

    pub fn read_write() -> Self {
        Self {
            read: true,
            write: true,
        }
    }
}

impl AccessPolicy for FixedAccess {
    fn can_access(&self, _registry_db: &Path, mode: AccessMode, _alt_root: bool) -> bool {
        match mode {
            AccessMode::ReadOnly => self.read,
            AccessMode::ReadWrite => self.write,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_checks_ancestor() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("var/sadm/install/registry/productregistry.db");

        assert!(SystemAccess.can_access(&db, AccessMode::ReadOnly, true));
        assert!(SystemAccess.can_access(&db, AccessMode::ReadWrite, true));
    }

    #[test]
    fn test_fixed_access() {
        let ro = FixedAccess::read_only();
        assert!(ro.can_access(Path::new("/x"), AccessMode::ReadOnly, false));
        assert!(!ro.can_access(Path::new("/x"), AccessMode::ReadWrite, false));
        assert!(FixedAccess::read_write().can_access(Path::new("/x"), AccessMode::ReadWrite, true));
    }
}
