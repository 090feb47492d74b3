// src/lib.rs

//! Product install registry
//!
//! Records which products, features and components are installed, how they
//! relate, and lets installers query and mutate that record.
//!
//! # Architecture
//!
//! - Registry: components keyed by (uuid, instance) in SQLite, with parent,
//!   child and requirement edges
//! - Privilege gate: unprivileged callers with an RBAC grant have mutations
//!   performed by `pfexec prodreg`
//! - Conversion: the old zipped article archive is imported once
//! - Marshaling: the installation model crosses a pipe to a child process
//!   as tagged text lines, and zones report disk usage back the same way

pub mod config;
pub mod convert;
pub mod db;
mod error;
pub mod marshal;
pub mod netif;
pub mod privilege;
pub mod progress;
pub mod registry;

pub use config::{Context, RegistryConfig};
pub use error::{Error, Result};
pub use marshal::{MarshalError, MarshalResult, PipeReader, PipeWriter};
pub use netif::NetIfError;
pub use privilege::PrivilegeGate;
pub use progress::{
    CallbackProgress, CliProgress, LogProgress, ProgressEvent, ProgressStyle, ProgressTracker,
    SectionProgress, SilentProgress,
};
pub use registry::{
    AccessMode, Component, ComponentRef, ComponentType, InitLevel, InitStatus, Query, Registry,
    UnregisterOptions,
};
