// tests/registry.rs

//! Integration tests for registering, querying and unregistering components.

mod common;

use common::{named, setup_registry};
use prodreg::registry::{add_child, add_required, remove_child};
use prodreg::{AccessMode, Error, Query, UnregisterOptions};

#[test]
fn test_register_and_get_round_trip() {
    let (_dir, registry) = setup_registry();

    let mut c = named("U1", "Widget").with_version("2.0");
    c.unique_name = Some("SUNWwidget".into());
    c.vendor = Some("Acme".into());
    c.location = Some("/opt/widget".into());
    c.add_compatible_version("1.5");
    c.attributes.set("support", "none");
    registry.register(&mut c).unwrap();
    assert_eq!(c.instance, 1);

    let stored = registry.get(&Query::by_uuid("U1")).unwrap().unwrap();
    assert_eq!(stored.title(), "Widget");
    assert_eq!(stored.version.as_deref(), Some("2.0"));
    assert_eq!(stored.compatible_versions, vec!["1.5"]);
    assert_eq!(stored.vendor.as_deref(), Some("Acme"));
    assert_eq!(stored.attributes.get("support"), Some("none"));

    let by_name = registry.get(&Query::by_unique_name("SUNWwidget")).unwrap().unwrap();
    assert_eq!(by_name.uuid, "U1");

    // A compatible version also matches
    assert!(registry.get(&Query::by_uuid("U1").version("1.5")).unwrap().is_some());
    assert!(registry.get(&Query::by_uuid("U1").version("9")).unwrap().is_none());
}

#[test]
fn test_register_is_idempotent() {
    let (_dir, registry) = setup_registry();

    let mut c = named("U1", "Widget").with_version("1.0");
    registry.register(&mut c).unwrap();
    let first = registry.get_all().unwrap();

    registry.register(&mut c).unwrap();
    let second = registry.get_all().unwrap();

    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);
    assert_eq!(first[0].instance, second[0].instance);
    assert_eq!(first[0].version, second[0].version);
}

#[test]
fn test_register_requires_display_name() {
    let (_dir, registry) = setup_registry();
    let mut c = prodreg::Component::new("U1");
    assert!(matches!(registry.register(&mut c), Err(Error::MissingDisplayName(_))));
    assert!(registry.get_all().unwrap().is_empty());
}

#[test]
fn test_required_edge_shows_as_dependent() {
    let (_dir, registry) = setup_registry();

    let mut base = named("BASE", "Base");
    registry.register(&mut base).unwrap();

    let mut app = named("APP", "App");
    add_required(&mut app, &mut base).unwrap();
    registry.register(&mut app).unwrap();

    let base = registry.get(&Query::by_uuid("BASE")).unwrap().unwrap();
    assert!(base.dependents.iter().any(|d| d.uuid == "APP"));

    // Removing a required component without force would break APP
    assert!(matches!(
        registry.unregister(&base, UnregisterOptions::default()),
        Err(Error::UnregisterWouldBreak(_))
    ));
    registry
        .unregister(
            &base,
            UnregisterOptions {
                force: true,
                recursive: false,
            },
        )
        .unwrap();
    let app = registry.get(&Query::by_uuid("APP")).unwrap().unwrap();
    assert!(app.required.is_empty());
}

#[test]
fn test_child_edges_and_recursive_unregister() {
    let (_dir, registry) = setup_registry();

    let mut parent = named("P", "Parent");
    let mut child = named("K", "Child");
    registry.register(&mut parent).unwrap();
    registry.register(&mut child).unwrap();

    add_child(&mut parent, &mut child).unwrap();
    registry.register(&mut parent).unwrap();
    registry.register(&mut child).unwrap();

    let stored_child = registry.get(&Query::by_uuid("K")).unwrap().unwrap();
    assert_eq!(stored_child.parent.as_ref().map(|p| p.uuid.as_str()), Some("P"));
    let stored_parent = registry.get(&Query::by_uuid("P")).unwrap().unwrap();
    assert!(stored_parent.children.iter().any(|k| k.uuid == "K"));

    registry
        .unregister(
            &stored_parent,
            UnregisterOptions {
                force: false,
                recursive: true,
            },
        )
        .unwrap();
    assert!(registry.get_all().unwrap().is_empty());
}

#[test]
fn test_remove_child_clears_only_matching_parent() {
    let mut parent = named("P", "Parent");
    let mut other = named("O", "Other");
    let mut child = named("K", "Child");

    add_child(&mut parent, &mut child).unwrap();
    remove_child(&mut other, &mut child);
    assert!(child.parent.is_some());

    remove_child(&mut parent, &mut child);
    assert!(child.parent.is_none());
    assert!(parent.children.is_empty());
}

#[test]
fn test_unregister_unknown_component() {
    let (_dir, registry) = setup_registry();
    let ghost = named("GHOST", "Ghost");
    assert!(matches!(
        registry.unregister(&ghost, UnregisterOptions::default()),
        Err(Error::UnregNotRegistered(_))
    ));
}

#[test]
fn test_writable_registry_reports_access() {
    let (_dir, registry) = setup_registry();
    assert!(registry.can_access_registry(AccessMode::ReadOnly));
    assert!(registry.can_access_registry(AccessMode::ReadWrite));
}
