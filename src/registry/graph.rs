// src/registry/graph.rs

//! Relationship edges between in-memory components
//!
//! Each operation updates both ends of an edge: a child's parent and the
//! parent's child list, a requirement and the target's dependents. Adding
//! an edge twice is a no-op, as is removing one that is not there.

use super::component::{Component, ComponentRef};
use crate::error::{Error, Result};

fn push_unique(list: &mut Vec<ComponentRef>, r: ComponentRef) {
    if !list.contains(&r) {
        list.push(r);
    }
}

fn remove_ref(list: &mut Vec<ComponentRef>, target: &Component) {
    list.retain(|r| !r.points_to(target));
}

fn reject_self(a: &Component, b: &Component) -> Result<()> {
    if a.uuid == b.uuid && a.instance == b.instance {
        return Err(Error::SelfReference(a.uuid.clone()));
    }
    Ok(())
}

/// Record that `component` requires `required`
pub fn add_required(component: &mut Component, required: &mut Component) -> Result<()> {
    reject_self(component, required)?;
    push_unique(&mut component.required, required.reference());
    push_unique(&mut required.dependents, component.reference());
    Ok(())
}

pub fn remove_required(component: &mut Component, required: &mut Component) {
    remove_ref(&mut component.required, required);
    remove_ref(&mut required.dependents, component);
}

/// Make `child` a child of `parent`
///
/// A child that already had another parent is moved.
pub fn add_child(parent: &mut Component, child: &mut Component) -> Result<()> {
    reject_self(parent, child)?;
    push_unique(&mut parent.children, child.reference());
    child.parent = Some(parent.reference());
    Ok(())
}

/// Detach `child` from `parent`
///
/// The child's parent edge is cleared only if it pointed at `parent`.
pub fn remove_child(parent: &mut Component, child: &mut Component) {
    remove_ref(&mut parent.children, child);
    if child.parent.as_ref().is_some_and(|p| p.points_to(parent)) {
        child.parent = None;
    }
}
