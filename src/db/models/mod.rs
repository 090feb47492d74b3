// src/db/models/mod.rs

//! Data models for registry database entities
//!
//! Persistence methods are implemented directly on the registry value types
//! so callers work with one `Component` type in memory and on disk.

mod component;

pub use component::{
    adopted_by, append_child_edge, dependents_of, remove_child_edges, remove_other_child_edges,
    remove_required_edges, set_parent,
};
