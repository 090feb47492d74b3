// src/config.rs

//! Registry configuration and the per-call context
//!
//! Configuration comes from built-in defaults, an optional TOML file and the
//! `PKG_INSTALL_ROOT` environment variable, in that order. A [`Context`]
//! bundles the configuration with the collaborators that decide access,
//! authorization and process launching, so nothing in the library reads
//! global state.
//!
//! # Example config.toml
//!
//! ```toml
//! alt_root = "/a"
//! helper_timeout_secs = 30
//! prune_pkg_list = false
//! ```

use crate::error::{Error, Result};
use crate::privilege::{Authorizer, ExecAttrAuthorizer, Launcher, ProcessLauncher};
use crate::registry::{AccessPolicy, SystemAccess};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Environment variable naming the default alternate root
pub const ENV_INSTALL_ROOT: &str = "PKG_INSTALL_ROOT";

/// Environment variable naming the debug log file
pub const ENV_DEBUG_LOG: &str = "PRODREG_DEBUG";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Prefix prepended to every persisted path; `None` means `/`
    pub alt_root: Option<PathBuf>,
    /// Authorization-elevating helper
    pub pfexec_path: PathBuf,
    /// CLI wrapper re-invoked by the privilege gate
    pub prodreg_path: PathBuf,
    /// External unzip utility; looked up on PATH when unset
    pub unzip_path: Option<PathBuf>,
    pub helper_timeout_secs: u64,
    /// Reconcile converted package lists against installed packages
    pub prune_pkg_list: bool,
    pub exec_attr_path: PathBuf,
    pub user_attr_path: PathBuf,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            alt_root: None,
            pfexec_path: PathBuf::from("/usr/bin/pfexec"),
            prodreg_path: PathBuf::from("/usr/bin/prodreg"),
            unzip_path: None,
            helper_timeout_secs: 300,
            prune_pkg_list: true,
            exec_attr_path: PathBuf::from("/etc/security/exec_attr"),
            user_attr_path: PathBuf::from("/etc/user_attr"),
        }
    }
}

impl RegistryConfig {
    /// Defaults with `PKG_INSTALL_ROOT` applied
    pub fn from_env() -> Self {
        Self::default().with_env()
    }

    /// Load a TOML configuration file, then apply the environment
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigError(format!("{}: {e}", path.display())))?;
        let config: RegistryConfig = toml::from_str(&content)
            .map_err(|e| Error::ConfigError(format!("{}: {e}", path.display())))?;
        Ok(config.with_env())
    }

    fn with_env(mut self) -> Self {
        if self.alt_root.is_none()
            && let Ok(root) = std::env::var(ENV_INSTALL_ROOT)
            && !root.is_empty()
        {
            self.alt_root = Some(PathBuf::from(root));
        }
        self
    }

    /// Override the alternate root for a single call
    pub fn with_alt_root(mut self, root: Option<PathBuf>) -> Self {
        if root.is_some() {
            self.alt_root = root;
        }
        self
    }

    /// The effective root, `/` when no alternate root is configured
    pub fn root(&self) -> &Path {
        self.alt_root.as_deref().unwrap_or(Path::new("/"))
    }

    /// True when an alternate root other than `/` is in effect
    pub fn is_alt_root(&self) -> bool {
        self.root() != Path::new("/")
    }

    pub fn helper_timeout(&self) -> Duration {
        Duration::from_secs(self.helper_timeout_secs)
    }
}

/// Everything a registry call needs besides its arguments
#[derive(Clone)]
pub struct Context {
    pub config: RegistryConfig,
    pub access: Arc<dyn AccessPolicy>,
    pub authorizer: Arc<dyn Authorizer>,
    pub launcher: Arc<dyn Launcher>,
}

impl Context {
    /// Context backed by the real system
    pub fn new(config: RegistryConfig) -> Self {
        let authorizer = ExecAttrAuthorizer::new(
            config.exec_attr_path.clone(),
            config.user_attr_path.clone(),
            config.prodreg_path.clone(),
        );
        let launcher = ProcessLauncher::new(config.helper_timeout());
        Self {
            config,
            access: Arc::new(SystemAccess),
            authorizer: Arc::new(authorizer),
            launcher: Arc::new(launcher),
        }
    }

    pub fn with_access(mut self, access: Arc<dyn AccessPolicy>) -> Self {
        self.access = access;
        self
    }

    pub fn with_authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.authorizer = authorizer;
        self
    }

    pub fn with_launcher(mut self, launcher: Arc<dyn Launcher>) -> Self {
        self.launcher = launcher;
        self
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = RegistryConfig::default();
        assert_eq!(config.root(), Path::new("/"));
        assert!(!config.is_alt_root());
        assert_eq!(config.pfexec_path, PathBuf::from("/usr/bin/pfexec"));
        assert!(config.prune_pkg_list);
    }

    #[test]
    fn test_load_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "alt_root = \"/a\"\nhelper_timeout_secs = 5\nprune_pkg_list = false").unwrap();

        let config = RegistryConfig::load(file.path()).unwrap();
        assert_eq!(config.root(), Path::new("/a"));
        assert!(config.is_alt_root());
        assert_eq!(config.helper_timeout(), Duration::from_secs(5));
        assert!(!config.prune_pkg_list);
        assert_eq!(config.prodreg_path, PathBuf::from("/usr/bin/prodreg"));
    }

    #[test]
    fn test_load_rejects_garbage() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "alt_root = [").unwrap();
        assert!(matches!(
            RegistryConfig::load(file.path()),
            Err(Error::ConfigError(_))
        ));
    }

    #[test]
    fn test_alt_root_override() {
        let config = RegistryConfig::default().with_alt_root(Some(PathBuf::from("/mnt")));
        assert_eq!(config.root(), Path::new("/mnt"));

        let kept = config.clone().with_alt_root(None);
        assert_eq!(kept.root(), Path::new("/mnt"));
    }
}
