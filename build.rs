// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: alternate root
fn alt_root_arg() -> Arg {
    Arg::new("alt_root")
        .short('R')
        .value_name("ALTROOT")
        .help("Alternate root")
}

/// Repeatable `-x VALUE` argument
fn repeated(id: &'static str, short: char, value_name: &'static str, help: &'static str) -> Arg {
    Arg::new(id)
        .short(short)
        .value_name(value_name)
        .action(ArgAction::Append)
        .help(help)
}

fn single(id: &'static str, short: char, value_name: &'static str, help: &'static str) -> Arg {
    Arg::new(id).short(short).value_name(value_name).help(help)
}

fn build_cli() -> Command {
    Command::new("prodreg")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Prodreg Contributors")
        .about("Product install registry")
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .global(true)
                .help("Configuration file (TOML)"),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("register")
                .about("Register a component, replacing any stored state for its instance")
                .arg(single("uuid", 'u', "UUID", "Component uuid").required(true))
                .arg(repeated("compatible", 'b', "VERSION", "Backward compatible version"))
                .arg(repeated("children", 'c', "UUID{INST}{VER}", "Child reference"))
                .arg(repeated("dependents", 'd', "UUID{INST}{VER}", "Dependent reference"))
                .arg(repeated("attributes", 'D', "ATTR{VALUE}", "Attribute"))
                .arg(repeated("names", 'n', "NAME{LANG}", "Display name"))
                .arg(single("location", 'p', "LOCATION", "Install location"))
                .arg(single("parent", 'P', "UUID{INST}{VER}", "Parent reference"))
                .arg(repeated("required", 'r', "UUID{INST}{VER}", "Required reference"))
                .arg(alt_root_arg())
                .arg(
                    single("comp_type", 't', "TYPE", "Component type")
                        .value_parser(["PRODUCT", "FEATURE", "COMPONENT"]),
                )
                .arg(single("unique_name", 'U', "NAME", "Mnemonic"))
                .arg(single("version", 'v', "VERSION", "Version"))
                .arg(single("vendor", 'V', "VENDOR", "Vendor"))
                .arg(single("uninstaller", 'x', "COMMAND", "Uninstall command line")),
        )
        .subcommand(
            Command::new("unregister")
                .about("Unregister a component instance")
                .arg(single("uuid", 'u', "UUID", "Component uuid").required(true))
                .arg(
                    Arg::new("force")
                        .short('f')
                        .action(ArgAction::SetTrue)
                        .help("Unregister even if other components require it"),
                )
                .arg(alt_root_arg())
                .arg(
                    single("instance", 'i', "INSTANCE", "Instance to remove")
                        .default_value("0"),
                )
                .arg(
                    Arg::new("recursive")
                        .long("recursive")
                        .action(ArgAction::SetTrue)
                        .help("Also unregister the component's children, deepest first"),
                ),
        )
        .subcommand(
            Command::new("init")
                .about("Initialize the registry, converting an old registry archive if present")
                .arg(
                    Arg::new("no_conversion")
                        .long("no-conversion")
                        .action(ArgAction::SetTrue)
                        .help("Leave an old registry archive unconverted"),
                )
                .arg(alt_root_arg()),
        )
        .subcommand(
            Command::new("list")
                .about("List registered components")
                .arg(
                    Arg::new("xall")
                        .long("xall")
                        .action(ArgAction::SetTrue)
                        .help("Also list installed packages that are not registered"),
                )
                .arg(
                    Arg::new("sys_pkgs")
                        .long("sys-pkgs")
                        .action(ArgAction::SetTrue)
                        .help("List only installed packages that are not registered"),
                )
                .arg(alt_root_arg()),
        )
        .subcommand(
            Command::new("info")
                .about("Show the component best matching a query")
                .arg(single("uuid", 'u', "UUID", "Component uuid"))
                .arg(single("unique_name", 'U', "NAME", "Component mnemonic"))
                .arg(single("instance", 'i', "INSTANCE", "Instance"))
                .arg(single("version", 'v', "VERSION", "Version"))
                .arg(single("location", 'p', "LOCATION", "Install location"))
                .arg(alt_root_arg()),
        )
        .subcommand(
            Command::new("netif")
                .about("Network interface lookups")
                .subcommand_required(true)
                .subcommand(Command::new("list").about("List interfaces by index"))
                .subcommand(
                    Command::new("index")
                        .about("Print the index of an interface")
                        .arg(Arg::new("name").required(true).help("Interface name")),
                )
                .subcommand(
                    Command::new("name")
                        .about("Print the name of an interface")
                        .arg(Arg::new("index").required(true).help("Interface index")),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("prodreg.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
