// src/main.rs

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands, NetifCommands};
use prodreg::config::ENV_DEBUG_LOG;
use std::fs::OpenOptions;
use std::process::ExitCode;
use std::sync::Mutex;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Log to the file named by PRODREG_DEBUG, or to stderr at the level in RUST_LOG
fn init_logging() {
    if let Some(path) = std::env::var_os(ENV_DEBUG_LOG)
        && let Ok(file) = OpenOptions::new().create(true).append(true).open(&path)
    {
        tracing_subscriber::fmt()
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .with_env_filter(EnvFilter::new("debug"))
            .init();
        return;
    }

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.config.as_deref();
    match cli.command {
        Commands::Register(opts) => commands::cmd_register(config, opts),
        Commands::Unregister {
            uuid,
            force,
            alt_root,
            instance,
            recursive,
        } => commands::cmd_unregister(config, alt_root, &uuid, instance, force, recursive),
        Commands::Init {
            no_conversion,
            alt_root,
        } => commands::cmd_init(config, alt_root, no_conversion),
        Commands::List {
            xall,
            sys_pkgs,
            alt_root,
        } => commands::cmd_list(config, alt_root, xall, sys_pkgs),
        Commands::Info {
            uuid,
            unique_name,
            instance,
            version,
            location,
            alt_root,
        } => {
            let query = commands::build_query(uuid, unique_name, instance, version, location);
            commands::cmd_info(config, alt_root, &query)
        }
        Commands::Netif(NetifCommands::List) => commands::cmd_netif_list(),
        Commands::Netif(NetifCommands::Index { name }) => commands::cmd_netif_index(&name),
        Commands::Netif(NetifCommands::Name { index }) => commands::cmd_netif_name(index),
    }
}

fn main() -> ExitCode {
    init_logging();
    debug!("argv: {:?}", std::env::args().collect::<Vec<_>>());

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => {
            debug!("exit 0");
            ExitCode::SUCCESS
        }
        Err(e) => {
            debug!("exit 1: {:#}", e);
            eprintln!("Error: {:#}", e);
            if let Some(hint) = e.downcast_ref::<prodreg::Error>().and_then(|e| e.user_hint()) {
                eprintln!("{}", hint);
            }
            ExitCode::FAILURE
        }
    }
}
