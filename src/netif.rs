// src/netif.rs

//! Network interface lookups
//!
//! Thin wrappers over `if_nameindex`, `if_nametoindex` and
//! `if_indextoname` that turn errno values into [`NetIfError`].

use nix::errno::Errno;
use nix::net::if_::{if_nameindex, if_nametoindex};
use std::collections::BTreeMap;
use std::ffi::CStr;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetIfError {
    #[error("out of memory")]
    NoMemory,

    #[error("invalid interface name: {0}")]
    InvalidName(String),

    #[error("invalid interface index: {0}")]
    InvalidIndex(u32),

    #[error("interface lookup failed: errno {0}")]
    Errno(i32),
}

fn from_errno(errno: Errno) -> NetIfError {
    match errno {
        Errno::ENOMEM | Errno::ENOBUFS => NetIfError::NoMemory,
        other => NetIfError::Errno(other as i32),
    }
}

/// Every interface, keyed by index
pub fn interfaces() -> Result<BTreeMap<u32, String>, NetIfError> {
    let list = if_nameindex().map_err(from_errno)?;
    Ok(list
        .iter()
        .map(|iface| (iface.index(), iface.name().to_string_lossy().into_owned()))
        .collect())
}

pub fn name_to_index(name: &str) -> Result<u32, NetIfError> {
    if_nametoindex(name).map_err(|errno| match errno {
        Errno::ENXIO | Errno::ENODEV => NetIfError::InvalidName(name.to_string()),
        other => from_errno(other),
    })
}

pub fn index_to_name(index: u32) -> Result<String, NetIfError> {
    let mut buf = [0 as libc::c_char; libc::IF_NAMESIZE];
    // SAFETY: buf holds IF_NAMESIZE bytes, the most if_indextoname writes
    let name = unsafe { libc::if_indextoname(index, buf.as_mut_ptr()) };
    if name.is_null() {
        let errno = Errno::last();
        debug!("if_indextoname({}) failed: {}", index, errno);
        return Err(match errno {
            Errno::ENXIO | Errno::ENODEV => NetIfError::InvalidIndex(index),
            other => from_errno(other),
        });
    }
    // SAFETY: on success buf holds a NUL-terminated name
    let name = unsafe { CStr::from_ptr(buf.as_ptr()) };
    Ok(name.to_string_lossy().into_owned())
}
