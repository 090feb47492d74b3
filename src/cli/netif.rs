// src/cli/netif.rs
//! Network interface commands

use clap::Subcommand;

#[derive(Subcommand)]
pub enum NetifCommands {
    /// List interfaces by index
    List,

    /// Print the index of an interface
    Index {
        /// Interface name
        name: String,
    },

    /// Print the name of an interface
    Name {
        /// Interface index
        index: u32,
    },
}
