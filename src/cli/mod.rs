// src/cli/mod.rs
//! CLI definitions for prodreg
//!
//! `register` and `unregister` accept the argument grammar the privilege
//! gate produces, so the library can hand a mutation to this binary running
//! under `pfexec`. Values of `-c`, `-d`, `-D`, `-n`, `-P` and `-r` use the
//! braced `value{field}` form with `\`, `{` and `}` escaped by a backslash.
//!
//! The command implementations are in the `commands` module.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

mod netif;

pub use netif::NetifCommands;

#[derive(Parser)]
#[command(name = "prodreg")]
#[command(version)]
#[command(about = "Product install registry", long_about = None)]
pub struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Register a component, replacing any stored state for its instance
    Register(RegisterOpts),

    /// Unregister a component instance
    Unregister {
        /// Component uuid
        #[arg(short = 'u', value_name = "UUID")]
        uuid: String,

        /// Unregister even if other components require it
        #[arg(short = 'f')]
        force: bool,

        /// Alternate root
        #[arg(short = 'R', value_name = "ALTROOT")]
        alt_root: Option<PathBuf>,

        /// Instance to remove; 0 selects the only registered instance
        #[arg(short = 'i', value_name = "INSTANCE", default_value_t = 0)]
        instance: u32,

        /// Also unregister the component's children, deepest first
        #[arg(long)]
        recursive: bool,
    },

    /// Initialize the registry, converting an old registry archive if present
    Init {
        /// Leave an old registry archive unconverted
        #[arg(long)]
        no_conversion: bool,

        /// Alternate root
        #[arg(short = 'R', value_name = "ALTROOT")]
        alt_root: Option<PathBuf>,
    },

    /// List registered components
    List {
        /// Also list installed packages that are not registered
        #[arg(long, conflicts_with = "sys_pkgs")]
        xall: bool,

        /// List only installed packages that are not registered
        #[arg(long)]
        sys_pkgs: bool,

        /// Alternate root
        #[arg(short = 'R', value_name = "ALTROOT")]
        alt_root: Option<PathBuf>,
    },

    /// Show the component best matching a query
    Info {
        /// Component uuid
        #[arg(short = 'u', value_name = "UUID", required_unless_present = "unique_name")]
        uuid: Option<String>,

        /// Component mnemonic
        #[arg(short = 'U', value_name = "NAME")]
        unique_name: Option<String>,

        /// Instance
        #[arg(short = 'i', value_name = "INSTANCE")]
        instance: Option<u32>,

        /// Version, matched exactly or against compatible versions
        #[arg(short = 'v', value_name = "VERSION")]
        version: Option<String>,

        /// Install location
        #[arg(short = 'p', value_name = "LOCATION")]
        location: Option<String>,

        /// Alternate root
        #[arg(short = 'R', value_name = "ALTROOT")]
        alt_root: Option<PathBuf>,
    },

    /// Network interface lookups
    #[command(subcommand)]
    Netif(NetifCommands),
}

/// Arguments of `prodreg register`, still escaped
#[derive(Args, Debug, Clone)]
pub struct RegisterOpts {
    /// Component uuid
    #[arg(short = 'u', value_name = "UUID")]
    pub uuid: String,

    /// Backward compatible version, most recent first
    #[arg(short = 'b', value_name = "VERSION")]
    pub compatible: Vec<String>,

    /// Child reference
    #[arg(short = 'c', value_name = "UUID{INST}{VER}")]
    pub children: Vec<String>,

    /// Dependent reference
    #[arg(short = 'd', value_name = "UUID{INST}{VER}")]
    pub dependents: Vec<String>,

    /// Attribute
    #[arg(short = 'D', value_name = "ATTR{VALUE}", allow_hyphen_values = true)]
    pub attributes: Vec<String>,

    /// Display name
    #[arg(short = 'n', value_name = "NAME{LANG}", allow_hyphen_values = true)]
    pub names: Vec<String>,

    /// Install location
    #[arg(short = 'p', value_name = "LOCATION")]
    pub location: Option<String>,

    /// Parent reference
    #[arg(short = 'P', value_name = "UUID{INST}{VER}")]
    pub parent: Option<String>,

    /// Required reference
    #[arg(short = 'r', value_name = "UUID{INST}{VER}")]
    pub required: Vec<String>,

    /// Alternate root
    #[arg(short = 'R', value_name = "ALTROOT")]
    pub alt_root: Option<PathBuf>,

    /// Component type
    #[arg(short = 't', value_name = "TYPE", value_parser = ["PRODUCT", "FEATURE", "COMPONENT"])]
    pub comp_type: Option<String>,

    /// Mnemonic
    #[arg(short = 'U', value_name = "NAME")]
    pub unique_name: Option<String>,

    /// Version
    #[arg(short = 'v', value_name = "VERSION")]
    pub version: Option<String>,

    /// Vendor
    #[arg(short = 'V', value_name = "VENDOR", allow_hyphen_values = true)]
    pub vendor: Option<String>,

    /// Uninstall command line
    #[arg(short = 'x', value_name = "COMMAND", allow_hyphen_values = true)]
    pub uninstaller: Option<String>,
}
