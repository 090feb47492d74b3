// src/convert/mod.rs

//! Conversion of the old zipped registry archive
//!
//! The archive is expanded with the external `unzip` utility into a
//! temporary directory, every extracted file is parsed as an [`Article`],
//! the articles are linked up and ordered parents first, and the resulting
//! components are registered in a single transaction. The archive is
//! removed only when every article was registered.
//!
//! Progress is reported on a 0..100 scale in three sections: extraction
//! (5), parsing (8) and registration (87).

mod article;

pub use article::{Article, associate, generate_id, topological_order};

use crate::config::RegistryConfig;
use crate::error::{Error, Result};
use crate::progress::{ProgressTracker, SectionProgress, SilentProgress};
use crate::registry::{
    Component, ComponentRef, DEFAULT_LANGUAGE, Registry, installed_packages, register_in,
};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const EXTRACT_END: u64 = 5;
const PARSE_END: u64 = 13;
const TOTAL: u64 = 100;

/// unzip's exit status for "not a zip file"
const UNZIP_BAD_ZIP: i32 = 9;

/// Property holding an article's package list
const PKGS_PROPERTY: &str = "pkgs";

fn unzip_command(config: &RegistryConfig) -> Result<PathBuf> {
    match &config.unzip_path {
        Some(path) if path.exists() => Ok(path.clone()),
        Some(_) => Err(Error::UnzipNotInstalled),
        None => which::which("unzip").map_err(|_| Error::UnzipNotInstalled),
    }
}

/// Expand `archive` into a fresh temporary directory
pub fn extract(config: &RegistryConfig, archive: &Path) -> Result<TempDir> {
    let unzip = unzip_command(config)?;
    let tmp = tempfile::Builder::new()
        .prefix("prodreg-convert")
        .tempdir()
        .map_err(|e| Error::CannotCreateTmp(e.to_string()))?;

    debug!("Extracting {} into {}", archive.display(), tmp.path().display());
    let output = Command::new(&unzip)
        .arg("-qq")
        .arg("-o")
        .arg(archive)
        .arg("-d")
        .arg(tmp.path())
        .output()
        .map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::UnzipNotInstalled,
            _ => Error::UnzipError(e.to_string()),
        })?;

    match output.status.code() {
        Some(0) => Ok(tmp),
        Some(UNZIP_BAD_ZIP) => Err(Error::BadFile(archive.display().to_string())),
        code => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(Error::UnzipError(format!(
                "exit status {}: {}",
                code.map_or_else(|| "signal".to_string(), |c| c.to_string()),
                stderr.trim()
            )))
        }
    }
}

/// Parse every regular file under `dir` as an article, in name order
pub fn read_articles(dir: &Path, progress: &dyn ProgressTracker) -> Result<Vec<Article>> {
    let files: Vec<PathBuf> = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect();

    progress.set_length(files.len() as u64);
    let mut articles = Vec::with_capacity(files.len());
    for path in files {
        let name = path
            .strip_prefix(dir)
            .unwrap_or(&path)
            .display()
            .to_string();
        let content = fs::read_to_string(&path)
            .map_err(|e| Error::BadFile(format!("{name}: {e}")))?;
        articles.push(Article::parse(&name, &content)?);
        progress.increment(1);
    }
    Ok(articles)
}

/// Keep only the packages of a `pkgs` list that are installed
fn prune_packages(list: &str, installed: &HashSet<String>) -> String {
    list.split_whitespace()
        .filter(|p| installed.contains(*p))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Component for an article whose parent (if any) is already registered
pub fn to_component(
    article: &Article,
    parent: Option<ComponentRef>,
    installed: Option<&HashSet<String>>,
) -> Component {
    let mut c = Component::new(article.key());
    c.unique_name = Some(article.mnemonic.clone());
    c.version = article.current_version().map(str::to_string);
    // Older revisions, most recent first
    c.compatible_versions = article
        .revisions
        .iter()
        .rev()
        .skip(1)
        .cloned()
        .collect();
    c.parent = parent;

    for (name, value) in article.properties.iter() {
        match name {
            "vendor" => c.vendor = Some(value.to_string()),
            "installlocation" => c.location = Some(value.to_string()),
            "uninstallprogram" => c.uninstaller = Some(value.to_string()),
            "title" => c.set_display_name(DEFAULT_LANGUAGE, value),
            PKGS_PROPERTY => match installed {
                Some(installed) => c.attributes.set(name, prune_packages(value, installed)),
                None => c.attributes.set(name, value),
            },
            _ => c.attributes.set(name, value),
        }
    }
    if c.display_name(DEFAULT_LANGUAGE).is_none() {
        c.set_display_name(DEFAULT_LANGUAGE, article.mnemonic.clone());
    }
    c
}

/// Convert `archive` into `registry`, returning the number of articles
pub fn convert_archive(
    registry: &Registry,
    archive: &Path,
    progress: &dyn ProgressTracker,
) -> Result<usize> {
    let config = &registry.context().config;
    progress.set_length(TOTAL);
    progress.set_position(0);
    info!("Converting old registry archive {}", archive.display());

    let result = convert_sections(registry, config, archive, progress);
    match &result {
        Ok(count) => {
            // Articles are already committed at this point
            match fs::remove_file(archive) {
                Ok(()) => info!("Converted {} articles; removed {}", count, archive.display()),
                Err(e) => warn!(
                    "Converted {} articles but could not remove {}: {}",
                    count,
                    archive.display(),
                    e
                ),
            }
            progress.set_position(TOTAL);
            progress.finish_with_message(&format!("converted {count} articles"));
        }
        Err(e) => {
            warn!("Conversion of {} failed: {}", archive.display(), e);
            progress.finish_with_error(&e.to_string());
        }
    }
    result
}

fn convert_sections(
    registry: &Registry,
    config: &RegistryConfig,
    archive: &Path,
    progress: &dyn ProgressTracker,
) -> Result<usize> {
    let extract_section = SectionProgress::new(progress, 0, EXTRACT_END);
    extract_section.set_message("Extracting old registry");
    let tmp = extract(config, archive)?;
    extract_section.finish_with_message("extracted");

    let parse_section = SectionProgress::new(progress, EXTRACT_END, PARSE_END);
    parse_section.set_message("Reading articles");
    let mut articles = read_articles(tmp.path(), &parse_section)?;
    associate(&mut articles);
    let order = topological_order(&articles)?;
    parse_section.finish_with_message("read");

    let installed: Option<HashSet<String>> = if config.prune_pkg_list {
        let packages = installed_packages(registry.root(), &SilentProgress::new())?;
        Some(packages.into_iter().map(|p| p.pkg).collect())
    } else {
        None
    };

    let register_section = SectionProgress::new(progress, PARSE_END, TOTAL);
    register_section.set_message("Registering components");
    register_section.set_length(order.len() as u64);
    let count = registry.write_transaction(|tx| {
        let mut assigned: HashMap<String, ComponentRef> = HashMap::new();
        for &i in &order {
            let article = &articles[i];
            let parent = article.parent.as_ref().and_then(|p| assigned.get(p)).cloned();
            let mut c = to_component(article, parent, installed.as_ref());
            register_in(tx, &mut c)?;
            assigned.insert(c.uuid.clone(), c.reference());
            register_section.increment(1);
        }
        Ok(order.len())
    })?;
    register_section.finish_with_message("registered");
    Ok(count)
}
