// src/commands/register.rs
//! Register and unregister commands
//!
//! These are the entry points the privilege gate re-invokes, so they open
//! the registry without converting an old archive.

use super::context;
use crate::cli::RegisterOpts;
use anyhow::{Context as _, Result};
use prodreg::privilege::RegisterArgs;
use prodreg::{Error, InitLevel, Query, Registry, UnregisterOptions};
use std::path::{Path, PathBuf};
use tracing::info;

impl From<RegisterOpts> for RegisterArgs {
    fn from(opts: RegisterOpts) -> Self {
        Self {
            uuid: opts.uuid,
            compatible: opts.compatible,
            children: opts.children,
            dependents: opts.dependents,
            attributes: opts.attributes,
            names: opts.names,
            location: opts.location,
            parent: opts.parent,
            required: opts.required,
            comp_type: opts.comp_type,
            unique_name: opts.unique_name,
            version: opts.version,
            vendor: opts.vendor,
            uninstaller: opts.uninstaller,
        }
    }
}

pub fn cmd_register(config: Option<&Path>, opts: RegisterOpts) -> Result<()> {
    let ctx = context(config, opts.alt_root.clone())?;
    let args = RegisterArgs::from(opts);
    let mut component = args
        .to_component()
        .context("Failed to decode register arguments")?;

    let registry = Registry::initialize(ctx, InitLevel::NoConversion)
        .context("Failed to initialize the product registry")?;
    registry
        .register(&mut component)
        .with_context(|| format!("Failed to register {}", component.uuid))?;

    info!("Registered {} instance {}", component.uuid, component.instance);
    println!("{}", component.instance);
    Ok(())
}

pub fn cmd_unregister(
    config: Option<&Path>,
    alt_root: Option<PathBuf>,
    uuid: &str,
    instance: u32,
    force: bool,
    recursive: bool,
) -> Result<()> {
    let ctx = context(config, alt_root)?;
    let registry = Registry::initialize(ctx, InitLevel::NoConversion)
        .context("Failed to initialize the product registry")?;

    let component = if instance == 0 {
        let mut matches = registry.get_matching(&Query::by_uuid(uuid))?;
        match matches.len() {
            0 => return Err(Error::UnregNotRegistered(uuid.to_string()).into()),
            1 => matches.remove(0),
            n => {
                return Err(Error::AmbiguousResults(format!(
                    "{} has {} instances; select one with -i",
                    uuid, n
                ))
                .into());
            }
        }
    } else {
        registry
            .get(&Query::by_uuid(uuid).instance(instance))?
            .ok_or_else(|| Error::UnregNotRegistered(format!("{} instance {}", uuid, instance)))?
    };

    registry
        .unregister(&component, UnregisterOptions { force, recursive })
        .with_context(|| format!("Failed to unregister {}", uuid))?;
    Ok(())
}
