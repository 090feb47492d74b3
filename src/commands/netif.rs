// src/commands/netif.rs
//! Network interface commands

use anyhow::{Context as _, Result};
use prodreg::netif;

pub fn cmd_netif_list() -> Result<()> {
    let interfaces = netif::interfaces().context("Failed to list network interfaces")?;
    for (index, name) in &interfaces {
        println!("{:>4}  {}", index, name);
    }
    Ok(())
}

pub fn cmd_netif_index(name: &str) -> Result<()> {
    let index = netif::name_to_index(name)?;
    println!("{}", index);
    Ok(())
}

pub fn cmd_netif_name(index: u32) -> Result<()> {
    let name = netif::index_to_name(index)?;
    println!("{}", name);
    Ok(())
}
