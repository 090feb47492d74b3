// src/commands/mod.rs
//! Command handlers for the prodreg CLI

mod netif;
mod query;
mod register;

pub use netif::{cmd_netif_index, cmd_netif_list, cmd_netif_name};
pub use query::{build_query, cmd_info, cmd_init, cmd_list};
pub use register::{cmd_register, cmd_unregister};

use anyhow::{Context as _, Result};
use prodreg::{Component, Context, RegistryConfig};
use std::path::{Path, PathBuf};

/// Build the per-call context from the config file (if any) and `-R`
fn context(config: Option<&Path>, alt_root: Option<PathBuf>) -> Result<Context> {
    let config = match config {
        Some(path) => RegistryConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => RegistryConfig::from_env(),
    };
    Ok(Context::new(config.with_alt_root(alt_root)))
}

/// One-line summary used by `list`
fn summary(c: &Component) -> String {
    format!(
        "{}  {}  {}  {}",
        c.uuid,
        c.instance,
        c.version.as_deref().unwrap_or("-"),
        c.title()
    )
}
