// src/privilege/authorizer.rs

//! RBAC grant detection
//!
//! A user may run the helper under pfexec when one of their profiles in
//! `user_attr` has an `exec_attr` entry for the helper command that sets
//! `uid=0` or `euid=0`.

use nix::unistd::{User, getuid};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Decides whether the caller may run the helper with elevated privilege
pub trait Authorizer: Send + Sync {
    fn has_grant(&self) -> bool;
}

/// Authorizer backed by the RBAC databases
#[derive(Debug, Clone)]
pub struct ExecAttrAuthorizer {
    exec_attr: PathBuf,
    user_attr: PathBuf,
    command: PathBuf,
}

impl ExecAttrAuthorizer {
    pub fn new(exec_attr: PathBuf, user_attr: PathBuf, command: PathBuf) -> Self {
        Self {
            exec_attr,
            user_attr,
            command,
        }
    }

    /// Check the grant for a named user
    pub fn user_has_grant(&self, user: &str) -> bool {
        let (Ok(exec_attr), Ok(user_attr)) = (
            fs::read_to_string(&self.exec_attr),
            fs::read_to_string(&self.user_attr),
        ) else {
            debug!("RBAC databases not readable; no grant");
            return false;
        };
        let profiles = user_profiles(&user_attr, user);
        profiles_grant(&exec_attr, &profiles, &self.command)
    }
}

impl Authorizer for ExecAttrAuthorizer {
    fn has_grant(&self) -> bool {
        match User::from_uid(getuid()) {
            Ok(Some(user)) => self.user_has_grant(&user.name),
            _ => false,
        }
    }
}

/// Profiles assigned to `user` in a `user_attr` database
///
/// Lines look like `user:qualifier:res1:res2:key=value;key=value`.
pub fn user_profiles(user_attr: &str, user: &str) -> Vec<String> {
    user_attr
        .lines()
        .filter(|line| !line.starts_with('#'))
        .filter_map(|line| {
            let mut fields = line.splitn(5, ':');
            if fields.next()? != user {
                return None;
            }
            let attrs = fields.nth(3)?;
            attrs
                .split(';')
                .find_map(|kv| kv.strip_prefix("profiles="))
                .map(|p| p.split(',').map(|s| s.trim().to_string()).collect::<Vec<_>>())
        })
        .flatten()
        .filter(|p| !p.is_empty())
        .collect()
}

/// True if any profile runs `command` as root in an `exec_attr` database
///
/// Lines look like `profile:policy:cmd:res1:res2:id:attr`.
pub fn profiles_grant(exec_attr: &str, profiles: &[String], command: &Path) -> bool {
    let command = command.to_string_lossy();
    exec_attr
        .lines()
        .filter(|line| !line.starts_with('#'))
        .any(|line| {
            let fields: Vec<&str> = line.splitn(7, ':').collect();
            if fields.len() < 7 || fields[2] != "cmd" {
                return false;
            }
            let profile_matches = profiles.iter().any(|p| p == fields[0]);
            let command_matches = fields[5] == command || fields[5] == "*";
            let elevates = fields[6]
                .split(';')
                .any(|kv| kv == "uid=0" || kv == "euid=0");
            profile_matches && command_matches && elevates
        })
}

/// Authorizer with a fixed answer
#[derive(Debug, Clone, Copy)]
pub struct FixedAuthorizer(pub bool);

impl Authorizer for FixedAuthorizer {
    fn has_grant(&self) -> bool {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USER_ATTR: &str = "\
# user_attr
root::::auths=solaris.*;profiles=All;lock_after_retries=no
alice::::type=normal;profiles=Software Installation,Basic Solaris User
bob::::type=normal;roles=admin
";

    const EXEC_ATTR: &str = "\
Software Installation:suser:cmd:::/usr/bin/prodreg:uid=0
Software Installation:suser:cmd:::/usr/sbin/pkgadd:uid=0;gid=bin
Basic Solaris User:suser:cmd:::/usr/bin/ls:
";

    #[test]
    fn test_user_profiles() {
        assert_eq!(
            user_profiles(USER_ATTR, "alice"),
            vec!["Software Installation", "Basic Solaris User"]
        );
        assert!(user_profiles(USER_ATTR, "bob").is_empty());
        assert!(user_profiles(USER_ATTR, "carol").is_empty());
    }

    #[test]
    fn test_profiles_grant() {
        let alice = user_profiles(USER_ATTR, "alice");
        assert!(profiles_grant(EXEC_ATTR, &alice, Path::new("/usr/bin/prodreg")));
        assert!(!profiles_grant(EXEC_ATTR, &alice, Path::new("/usr/bin/ls")));
        assert!(!profiles_grant(EXEC_ATTR, &[], Path::new("/usr/bin/prodreg")));
    }

    #[test]
    fn test_user_has_grant_reads_files() {
        let dir = tempfile::tempdir().unwrap();
        let exec_attr = dir.path().join("exec_attr");
        let user_attr = dir.path().join("user_attr");
        fs::write(&exec_attr, EXEC_ATTR).unwrap();
        fs::write(&user_attr, USER_ATTR).unwrap();

        let auth = ExecAttrAuthorizer::new(exec_attr, user_attr, PathBuf::from("/usr/bin/prodreg"));
        assert!(auth.user_has_grant("alice"));
        assert!(!auth.user_has_grant("bob"));

        let missing = ExecAttrAuthorizer::new(
            dir.path().join("nope"),
            dir.path().join("nope2"),
            PathBuf::from("/usr/bin/prodreg"),
        );
        assert!(!missing.user_has_grant("alice"));
    }
}
