// src/registry/sys_pkgs.rs

//! Host package discovery
//!
//! Reads the `pkginfo` file of every installed package under
//! `<root>/var/sadm/pkg` and turns it into a component value, so packages
//! installed outside the registry can be listed next to registered ones.

use super::component::{Component, ComponentType, DEFAULT_LANGUAGE};
use crate::db::paths;
use crate::error::Result;
use crate::progress::ProgressTracker;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Fields read from a package's pkginfo file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PkgInfo {
    pub pkginst: String,
    pub pkg: String,
    pub name: Option<String>,
    pub version: Option<String>,
    pub vendor: Option<String>,
    pub basedir: Option<String>,
    pub category: Option<String>,
}

impl PkgInfo {
    /// Parse `KEY=value` lines; surrounding quotes on values are dropped
    pub fn parse(pkginst: &str, content: &str) -> Self {
        let mut info = PkgInfo {
            pkginst: pkginst.to_string(),
            pkg: pkginst.to_string(),
            ..Default::default()
        };

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim().trim_matches('"').to_string();
            match key.trim() {
                "PKG" => info.pkg = value,
                "NAME" => info.name = Some(value),
                "VERSION" => info.version = Some(value),
                "VENDOR" => info.vendor = Some(value),
                "BASEDIR" => info.basedir = Some(value),
                "CATEGORY" => info.category = Some(value),
                _ => {}
            }
        }

        info
    }

    /// Component view of this package
    pub fn to_component(&self) -> Component {
        let mut c = Component::new(self.pkginst.clone());
        c.instance = 1;
        c.unique_name = Some(self.pkg.clone());
        c.version = self.version.clone();
        c.vendor = self.vendor.clone();
        c.location = self.basedir.clone();
        c.comp_type = ComponentType::Component;
        c.set_display_name(
            DEFAULT_LANGUAGE,
            self.name.clone().unwrap_or_else(|| self.pkg.clone()),
        );
        if let Some(category) = &self.category {
            c.attributes.set("category", category.clone());
        }
        c
    }
}

/// List every package installed under `root`, sorted by instance name
pub fn installed_packages(root: &Path, progress: &dyn ProgressTracker) -> Result<Vec<PkgInfo>> {
    let pkg_dir = paths::sys_pkg_dir(root);
    if !pkg_dir.is_dir() {
        debug!("No package database at {}", pkg_dir.display());
        progress.finish_with_message("no packages");
        return Ok(Vec::new());
    }

    let mut entries: Vec<_> = fs::read_dir(&pkg_dir)?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().join("pkginfo").is_file())
        .collect();
    entries.sort_by_key(|e| e.file_name());

    progress.set_length(entries.len() as u64);
    let mut packages = Vec::with_capacity(entries.len());
    for entry in entries {
        let pkginst = entry.file_name().to_string_lossy().into_owned();
        progress.set_message(&pkginst);
        match fs::read_to_string(entry.path().join("pkginfo")) {
            Ok(content) => packages.push(PkgInfo::parse(&pkginst, &content)),
            Err(e) => warn!("Skipping unreadable pkginfo for {}: {}", pkginst, e),
        }
        progress.increment(1);
    }

    progress.finish_with_message(&format!("{} packages", packages.len()));
    Ok(packages)
}
