// src/registry/mod.rs

//! Product registry
//!
//! The registry stores components keyed by (uuid, instance) together with
//! their parent, child and requirement edges. A [`Registry`] handle is
//! created by [`Registry::initialize`], which also converts an old-format
//! archive when one is present and the caller may write.
//!
//! Mutations go straight to the database when the process can write it.
//! Otherwise a caller holding an RBAC grant has the mutation performed by
//! the `prodreg` CLI through the privilege gate.

mod access;
mod attributes;
mod component;
mod graph;
mod query;
mod sys_pkgs;

pub use access::{AccessMode, AccessPolicy, FixedAccess, SystemAccess};
pub use attributes::AttributeStore;
pub use component::{Component, ComponentRef, ComponentType, DEFAULT_LANGUAGE};
pub use graph::{add_child, add_required, remove_child, remove_required};
pub use query::Query;
pub use sys_pkgs::{PkgInfo, installed_packages};

use crate::config::Context;
use crate::convert;
use crate::db::{self, models, paths};
use crate::error::{Error, Result};
use crate::privilege::{PrivilegeGate, register_args, unregister_args};
use crate::progress::{ProgressTracker, SilentProgress};
use rusqlite::{Connection, Transaction};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// How much work `initialize` may do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InitLevel {
    /// Convert an old-format archive if one exists
    #[default]
    Normal,
    /// Never convert; report that conversion is recommended instead
    NoConversion,
}

/// Outcome of a successful `initialize`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStatus {
    Success,
    /// An old-format archive exists and was left alone
    ConversionRecommended,
    /// An old-format archive was converted; holds the article count
    Converted(usize),
}

/// Options for [`Registry::unregister`]
#[derive(Debug, Clone, Copy, Default)]
pub struct UnregisterOptions {
    /// Remove the component even if others still require it
    pub force: bool,
    /// Remove children depth-first instead of orphaning them
    pub recursive: bool,
}

/// Handle on one registry, rooted at the context's alternate root
#[derive(Debug)]
pub struct Registry {
    ctx: Context,
    db_path: PathBuf,
    status: InitStatus,
}

impl Registry {
    /// Open the registry, converting an old archive when appropriate
    pub fn initialize(ctx: Context, level: InitLevel) -> Result<Self> {
        Self::initialize_with_progress(ctx, level, &SilentProgress::new())
    }

    pub fn initialize_with_progress(
        ctx: Context,
        level: InitLevel,
        progress: &dyn ProgressTracker,
    ) -> Result<Self> {
        let root = ctx.config.root().to_path_buf();
        let db_path = paths::registry_db(&root);
        let archive = paths::legacy_archive(&root);
        let mut registry = Self {
            ctx,
            db_path,
            status: InitStatus::Success,
        };
        debug!("Initializing registry under {}", root.display());

        let writable = registry.can_write_directly();
        if archive.exists() {
            match level {
                InitLevel::NoConversion => {
                    info!("Old registry archive {} left unconverted", archive.display());
                    registry.status = InitStatus::ConversionRecommended;
                }
                InitLevel::Normal => {
                    if std::fs::File::open(&archive).is_err() {
                        return Err(Error::NoFileAccess(archive.display().to_string()));
                    }
                    if !writable {
                        return Err(Error::NoRegAccess(registry.db_path.display().to_string()));
                    }
                    let count = convert::convert_archive(&registry, &archive, progress)?;
                    registry.status = InitStatus::Converted(count);
                }
            }
        }

        if writable && !registry.db_path.exists() {
            db::init(&registry.db_path)?;
        } else if registry.db_path.exists() {
            // Surface a damaged file at initialization rather than on first use
            db::open_readonly(&registry.db_path)?;
        }

        Ok(registry)
    }

    pub fn status(&self) -> InitStatus {
        self.status
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn root(&self) -> &Path {
        self.ctx.config.root()
    }

    fn alt_root_arg(&self) -> Option<&Path> {
        self.ctx.config.is_alt_root().then(|| self.root())
    }

    fn can_write_directly(&self) -> bool {
        self.ctx
            .access
            .can_access(&self.db_path, AccessMode::ReadWrite, self.ctx.config.is_alt_root())
    }

    /// True if the caller can read, or modify, the registry
    ///
    /// Modification counts as possible when the process can write the
    /// files itself or holds the RBAC grant for the CLI.
    pub fn can_access_registry(&self, mode: AccessMode) -> bool {
        let alt_root = self.ctx.config.is_alt_root();
        match mode {
            AccessMode::ReadOnly => self.ctx.access.can_access(&self.db_path, mode, alt_root),
            AccessMode::ReadWrite => {
                self.can_write_directly() || PrivilegeGate::new(&self.ctx).available()
            }
        }
    }

    fn read_conn(&self) -> Result<Option<Connection>> {
        if !self.db_path.exists() {
            return Ok(None);
        }
        if !self.can_access_registry(AccessMode::ReadOnly) {
            return Err(Error::NoRegAccess(self.db_path.display().to_string()));
        }
        db::open_readonly(&self.db_path).map(Some)
    }

    /// Run `f` in one write transaction, creating the database if needed
    pub(crate) fn write_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction) -> Result<T>,
    {
        if !self.db_path.exists() {
            db::init(&self.db_path)?;
        }
        let mut conn = db::open(&self.db_path)?;
        db::transaction(&mut conn, f)
    }

    /// Best match for `query`, or `None`
    ///
    /// Among equally good matches, which one is returned is unspecified.
    pub fn get(&self, query: &Query) -> Result<Option<Component>> {
        Ok(self.get_matching(query)?.into_iter().next())
    }

    /// Every component matching `query`, best first
    pub fn get_matching(&self, query: &Query) -> Result<Vec<Component>> {
        let Some(conn) = self.read_conn()? else {
            return Ok(Vec::new());
        };
        let candidates = match (&query.uuid, &query.unique_name) {
            (Some(uuid), _) => Component::find_by_uuid(&conn, uuid)?,
            (None, Some(name)) => Component::find_by_unique_name(&conn, name)?,
            (None, None) => return Ok(Vec::new()),
        };
        Ok(query.rank(&candidates).into_iter().cloned().collect())
    }

    /// Every registered component
    pub fn get_all(&self) -> Result<Vec<Component>> {
        match self.read_conn()? {
            Some(conn) => Component::list_all(&conn),
            None => Ok(Vec::new()),
        }
    }

    /// Installed host packages that are not registered
    pub fn get_sys_pkgs(&self, progress: &dyn ProgressTracker) -> Result<Vec<Component>> {
        let registered = self.get_all()?;
        let uuids: HashSet<&str> = registered.iter().map(|c| c.uuid.as_str()).collect();
        let names: HashSet<&str> = registered
            .iter()
            .filter_map(|c| c.unique_name.as_deref())
            .collect();

        let packages = installed_packages(self.root(), progress)?;
        Ok(packages
            .iter()
            .filter(|p| !uuids.contains(p.pkginst.as_str()) && !names.contains(p.pkg.as_str()))
            .map(PkgInfo::to_component)
            .collect())
    }

    /// Registered components followed by unregistered host packages
    pub fn get_xall(&self, progress: &dyn ProgressTracker) -> Result<Vec<Component>> {
        let mut all = self.get_all()?;
        all.extend(self.get_sys_pkgs(progress)?);
        Ok(all)
    }

    /// Persist `component`, assigning an instance when it has none
    ///
    /// On return `component.instance` holds the stored instance. When the
    /// registration is delegated to the CLI the instance is left as given.
    pub fn register(&self, component: &mut Component) -> Result<()> {
        validate(component)?;

        if self.can_write_directly() {
            self.write_transaction(|tx| register_in(tx, component))?;
            info!("Registered {} instance {}", component.uuid, component.instance);
            return Ok(());
        }

        let gate = PrivilegeGate::new(&self.ctx);
        if !gate.available() {
            return Err(Error::CannotWrite);
        }
        let status = gate.invoke(&register_args(component, self.alt_root_arg()))?;
        if status == 0 {
            return Err(Error::CannotWrite);
        }
        info!("Registered {} through the privileged helper", component.uuid);
        Ok(())
    }

    /// Remove `component` and every edge other components hold to it
    pub fn unregister(&self, component: &Component, options: UnregisterOptions) -> Result<()> {
        if !self.db_path.exists() {
            return Err(Error::NotInitialized);
        }

        if self.can_write_directly() {
            let removed = self.write_transaction(|tx| unregister_in(tx, component, options))?;
            info!("Unregistered {} component(s) starting at {}", removed, component.uuid);
            return Ok(());
        }

        let gate = PrivilegeGate::new(&self.ctx);
        if !gate.available() {
            return Err(Error::CannotWrite);
        }
        let targets = {
            let conn = db::open_readonly(&self.db_path)?;
            plan_unregister(&conn, component, options)?
        };
        for target in targets {
            let args = unregister_args(&target.uuid, target.instance, self.alt_root_arg());
            if gate.invoke(&args)? == 0 {
                return Err(Error::CannotWrite);
            }
        }
        Ok(())
    }
}

fn validate(c: &Component) -> Result<()> {
    if c.uuid.is_empty() {
        return Err(Error::ParseError("component uuid is empty".to_string()));
    }
    if c.display_name(DEFAULT_LANGUAGE).is_none() {
        return Err(Error::MissingDisplayName(c.uuid.clone()));
    }
    Ok(())
}

fn same_key(r: &ComponentRef, c: &Component) -> bool {
    r.uuid == c.uuid && r.instance == c.instance
}

/// Fill in the instance of a reference that names only a uuid
fn resolve_ref(conn: &Connection, r: &mut ComponentRef) -> Result<()> {
    if r.instance != 0 {
        return Ok(());
    }
    let candidates = Component::find_by_uuid(conn, &r.uuid)?;
    let found = candidates
        .iter()
        .find(|c| r.version.is_none() || c.version == r.version)
        .or_else(|| candidates.first());
    if let Some(found) = found {
        r.instance = found.instance;
    }
    Ok(())
}

/// Reject a parent edge that would make `c` its own ancestor
fn check_ancestry(conn: &Connection, c: &Component) -> Result<()> {
    let Some(parent) = &c.parent else {
        return Ok(());
    };
    let children: HashSet<(&str, u32)> = c
        .children
        .iter()
        .map(|r| (r.uuid.as_str(), r.instance))
        .collect();

    let mut seen = HashSet::new();
    let mut next = Some(parent.clone());
    while let Some(current) = next.take() {
        if same_key(&current, c) || children.contains(&(current.uuid.as_str(), current.instance)) {
            return Err(Error::CycleDetected(c.uuid.clone()));
        }
        if !seen.insert((current.uuid.clone(), current.instance)) {
            break;
        }
        next = Component::find(conn, &current.uuid, current.instance)?.and_then(|p| p.parent);
    }
    Ok(())
}

/// Register inside an open transaction
pub(crate) fn register_in(conn: &Connection, c: &mut Component) -> Result<()> {
    validate(c)?;
    if c.instance == 0 {
        c.instance = Component::next_free_instance(conn, &c.uuid)?;
        debug!("Assigned instance {} to {}", c.instance, c.uuid);
    }

    for r in c.required.iter_mut().chain(c.children.iter_mut()) {
        resolve_ref(conn, r)?;
    }
    if let Some(parent) = c.parent.as_mut() {
        resolve_ref(conn, parent)?;
    }
    let own = c.reference();
    if c.required.iter().chain(c.children.iter()).any(|r| same_key(r, c))
        || c.parent.as_ref().is_some_and(|p| same_key(p, c))
    {
        return Err(Error::SelfReference(own.uuid));
    }
    check_ancestry(conn, c)?;

    // Components registered earlier with this one as parent stay listed
    for adopted in models::adopted_by(conn, &c.uuid, c.instance)? {
        if !c.children.iter().any(|k| k.uuid == adopted.uuid && k.instance == adopted.instance) {
            c.children.push(adopted);
        }
    }

    c.save(conn)?;

    // An edge from an unchanged parent keeps its position in the list
    models::remove_other_child_edges(conn, &c.uuid, c.instance, c.parent.as_ref())?;
    if let Some(parent) = &c.parent {
        if Component::exists(conn, &parent.uuid, parent.instance)? {
            models::append_child_edge(conn, parent, &own)?;
        } else {
            debug!("Parent {} of {} is not registered yet", parent, own);
        }
    }

    for child in &c.children {
        match Component::find(conn, &child.uuid, child.instance)? {
            Some(stored) if stored.parent.is_none() => {
                models::set_parent(conn, &child.uuid, child.instance, Some(&own))?;
            }
            Some(stored) if stored.parent.as_ref().is_some_and(|p| !p.points_to(c)) => {
                warn!("{} already has a different parent; edge from {} kept one-sided", child, own);
            }
            _ => {}
        }
    }
    Ok(())
}

/// Components an unregister would remove, children before their parents
fn plan_unregister(
    conn: &Connection,
    component: &Component,
    options: UnregisterOptions,
) -> Result<Vec<Component>> {
    let root = if component.instance != 0 {
        Component::find(conn, &component.uuid, component.instance)?
    } else {
        let mut found = Component::find_by_uuid(conn, &component.uuid)?;
        if found.len() > 1 {
            return Err(Error::AmbiguousResults(component.uuid.clone()));
        }
        found.pop()
    };
    let root = root.ok_or_else(|| Error::UnregNotRegistered(component.uuid.clone()))?;

    let mut order = Vec::new();
    let mut seen = HashSet::new();
    collect_subtree(conn, root, options.recursive, &mut seen, &mut order)?;

    if !options.force {
        let removing: HashSet<(String, u32)> = order
            .iter()
            .map(|c| (c.uuid.clone(), c.instance))
            .collect();
        for c in &order {
            let outside = c
                .dependents
                .iter()
                .any(|d| !removing.contains(&(d.uuid.clone(), d.instance)));
            if outside {
                return Err(Error::UnregisterWouldBreak(c.uuid.clone()));
            }
        }
    }
    Ok(order)
}

fn collect_subtree(
    conn: &Connection,
    c: Component,
    recursive: bool,
    seen: &mut HashSet<(String, u32)>,
    order: &mut Vec<Component>,
) -> Result<()> {
    if !seen.insert((c.uuid.clone(), c.instance)) {
        return Ok(());
    }
    if recursive {
        for child in &c.children {
            if let Some(stored) = Component::find(conn, &child.uuid, child.instance)?
                && stored.parent.as_ref().is_some_and(|p| p.points_to(&c))
            {
                collect_subtree(conn, stored, recursive, seen, order)?;
            }
        }
    }
    order.push(c);
    Ok(())
}

fn unregister_in(conn: &Connection, component: &Component, options: UnregisterOptions) -> Result<usize> {
    let order = plan_unregister(conn, component, options)?;
    for c in &order {
        for child in &c.children {
            if let Some(stored) = Component::find(conn, &child.uuid, child.instance)?
                && stored.parent.as_ref().is_some_and(|p| p.points_to(c))
            {
                models::set_parent(conn, &child.uuid, child.instance, None)?;
            }
        }
        Component::delete(conn, &c.uuid, c.instance)?;
        models::remove_child_edges(conn, &c.uuid, c.instance)?;
        models::remove_required_edges(conn, &c.uuid, c.instance)?;
        debug!("Removed {} instance {}", c.uuid, c.instance);
    }
    Ok(order.len())
}
