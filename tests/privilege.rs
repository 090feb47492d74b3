// tests/privilege.rs

//! Integration tests for mutations delegated through the privilege gate.

mod common;

use common::{named, unprivileged_context, writable_context};
use prodreg::privilege::{FixedAuthorizer, RecordingLauncher};
use prodreg::registry::FixedAccess;
use prodreg::{
    AccessMode, Context, Error, InitLevel, Query, Registry, RegistryConfig, UnregisterOptions,
};
use std::fs;
use std::sync::Arc;

fn gate_context(grant: bool, launcher: Arc<RecordingLauncher>) -> Context {
    Context::new(RegistryConfig::default())
        .with_access(Arc::new(FixedAccess::read_only()))
        .with_authorizer(Arc::new(FixedAuthorizer(grant)))
        .with_launcher(launcher)
}

#[test]
fn test_register_reexecs_under_pfexec() {
    let launcher = Arc::new(RecordingLauncher::new(0));
    let registry = Registry::initialize(gate_context(true, launcher.clone()), InitLevel::Normal).unwrap();
    assert!(registry.can_access_registry(AccessMode::ReadWrite));

    let mut c = named("U", "X").with_version("1");
    registry.register(&mut c).unwrap();

    assert_eq!(
        launcher.calls(),
        vec![vec![
            "/usr/bin/pfexec", "/usr/bin/prodreg", "register", "-u", "U", "-n", "X{en}", "-v",
            "1",
        ]]
    );
}

#[test]
fn test_helper_failure_is_reported() {
    let launcher = Arc::new(RecordingLauncher::new(1));
    let registry = Registry::initialize(gate_context(true, launcher.clone()), InitLevel::Normal).unwrap();

    let mut c = named("U", "X");
    assert!(matches!(registry.register(&mut c), Err(Error::CannotWrite)));
    assert_eq!(launcher.calls().len(), 1);
}

#[test]
fn test_no_grant_means_no_helper() {
    let launcher = Arc::new(RecordingLauncher::new(0));
    let registry = Registry::initialize(gate_context(false, launcher.clone()), InitLevel::Normal).unwrap();
    assert!(!registry.can_access_registry(AccessMode::ReadWrite));

    let mut c = named("U", "X");
    assert!(matches!(registry.register(&mut c), Err(Error::CannotWrite)));
    assert!(launcher.calls().is_empty());
}

#[test]
fn test_escaped_values_in_argv() {
    let launcher = Arc::new(RecordingLauncher::new(0));
    let registry = Registry::initialize(gate_context(true, launcher.clone()), InitLevel::Normal).unwrap();

    let mut c = named("U", "A{b}");
    c.attributes.set("path", "C:\\x");
    registry.register(&mut c).unwrap();

    let calls = launcher.calls();
    let argv = &calls[0];
    assert!(argv.contains(&"A\\{b\\}{en}".to_string()));
    assert!(argv.contains(&"path{C:\\\\x}".to_string()));
}

#[test]
fn test_recursive_unregister_delegates_each_instance() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("root");
    let tools = dir.path().join("tools");
    fs::create_dir_all(&root).unwrap();
    fs::create_dir_all(&tools).unwrap();

    // Populate the registry as a privileged caller
    let writer = Registry::initialize(writable_context(&root, &tools), InitLevel::Normal).unwrap();
    let mut parent = named("P", "Parent");
    writer.register(&mut parent).unwrap();
    let mut child = named("K", "Child");
    child.parent = Some(parent.reference());
    writer.register(&mut child).unwrap();

    let launcher = Arc::new(RecordingLauncher::new(0));
    let registry = Registry::initialize(
        unprivileged_context(&root, &tools, true, launcher.clone()),
        InitLevel::Normal,
    )
    .unwrap();
    let stored = registry.get(&Query::by_uuid("P")).unwrap().unwrap();
    registry
        .unregister(
            &stored,
            UnregisterOptions {
                force: false,
                recursive: true,
            },
        )
        .unwrap();

    let root_arg = root.to_string_lossy().into_owned();
    let calls = launcher.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(
        calls[0][2..],
        ["unregister", "-u", "K", "-f", "-R", root_arg.as_str(), "-i", "1"]
    );
    assert_eq!(
        calls[1][2..],
        ["unregister", "-u", "P", "-f", "-R", root_arg.as_str(), "-i", "1"]
    );
}
