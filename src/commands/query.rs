// src/commands/query.rs
//! Initialization and query commands

use super::{context, summary};
use anyhow::{Context as _, Result};
use prodreg::db::paths;
use prodreg::{
    CliProgress, InitLevel, InitStatus, ProgressStyle, ProgressTracker, Query, Registry,
    SilentProgress,
};
use std::path::{Path, PathBuf};

pub fn cmd_init(config: Option<&Path>, alt_root: Option<PathBuf>, no_conversion: bool) -> Result<()> {
    let ctx = context(config, alt_root)?;
    let level = if no_conversion {
        InitLevel::NoConversion
    } else {
        InitLevel::Normal
    };

    let converting = !no_conversion && paths::legacy_archive(ctx.config.root()).exists();
    let registry = if converting {
        let progress = CliProgress::new("Converting registry", 100, ProgressStyle::Bar);
        let result = Registry::initialize_with_progress(ctx, level, &progress);
        match &result {
            Ok(_) => progress.finish_with_message("Conversion complete"),
            Err(_) => progress.finish_with_error("Conversion failed"),
        }
        result
    } else {
        Registry::initialize(ctx, level)
    }
    .context("Failed to initialize the product registry")?;

    match registry.status() {
        InitStatus::Success => println!("Registry ready at {}", registry.db_path().display()),
        InitStatus::ConversionRecommended => {
            println!("Registry ready at {}", registry.db_path().display());
            println!("An old registry archive is present; run 'prodreg init' to convert it.");
        }
        InitStatus::Converted(count) => {
            println!("Converted {} entries into {}", count, registry.db_path().display());
        }
    }
    Ok(())
}

pub fn cmd_list(config: Option<&Path>, alt_root: Option<PathBuf>, xall: bool, sys_pkgs: bool) -> Result<()> {
    let ctx = context(config, alt_root)?;
    let registry = Registry::initialize(ctx, InitLevel::NoConversion)
        .context("Failed to initialize the product registry")?;

    let progress = SilentProgress::new();
    let components = if sys_pkgs {
        registry.get_sys_pkgs(&progress)?
    } else if xall {
        registry.get_xall(&progress)?
    } else {
        registry.get_all()?
    };

    if components.is_empty() {
        println!("No components found");
        return Ok(());
    }
    for c in &components {
        println!("{}", summary(c));
    }
    Ok(())
}

pub fn build_query(
    uuid: Option<String>,
    unique_name: Option<String>,
    instance: Option<u32>,
    version: Option<String>,
    location: Option<String>,
) -> Query {
    Query {
        uuid,
        unique_name,
        version,
        instance,
        location,
    }
}

pub fn cmd_info(config: Option<&Path>, alt_root: Option<PathBuf>, query: &Query) -> Result<()> {
    let ctx = context(config, alt_root)?;
    let registry = Registry::initialize(ctx, InitLevel::NoConversion)
        .context("Failed to initialize the product registry")?;

    let Some(c) = registry.get(query)? else {
        return Err(anyhow::anyhow!("No component matches the query"));
    };

    println!("UUID:         {}", c.uuid);
    println!("Instance:     {}", c.instance);
    println!("Name:         {}", c.title());
    println!("Type:         {}", c.comp_type.as_str());
    if let Some(v) = &c.version {
        println!("Version:      {}", v);
    }
    if !c.compatible_versions.is_empty() {
        println!("Compatible:   {}", c.compatible_versions.join(", "));
    }
    if let Some(name) = &c.unique_name {
        println!("Mnemonic:     {}", name);
    }
    if let Some(vendor) = &c.vendor {
        println!("Vendor:       {}", vendor);
    }
    if let Some(location) = &c.location {
        println!("Location:     {}", location);
    }
    if let Some(uninstaller) = &c.uninstaller {
        println!("Uninstaller:  {}", uninstaller);
    }
    if let Some(parent) = &c.parent {
        println!("Parent:       {} instance {}", parent.uuid, parent.instance);
    }
    for child in &c.children {
        println!("Child:        {} instance {}", child.uuid, child.instance);
    }
    for required in &c.required {
        println!("Requires:     {} instance {}", required.uuid, required.instance);
    }
    for dependent in &c.dependents {
        println!("Required by:  {} instance {}", dependent.uuid, dependent.instance);
    }
    for (name, value) in c.attributes.iter() {
        println!("  {} = {}", name, value);
    }
    Ok(())
}
