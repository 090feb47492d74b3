// src/db/models/component.rs

//! Persistence for registry components
//!
//! A component is spread over the `components` row plus its display names,
//! attributes, compatible versions, child edges and requirement edges.
//! Dependents are never stored; they are the reverse of `required`.

use crate::error::Result;
use crate::registry::{AttributeStore, Component, ComponentRef, ComponentType};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::collections::BTreeMap;

const COMPONENT_COLUMNS: &str = "uuid, instance, version, unique_name, comp_type, vendor, \
     location, uninstaller, parent_uuid, parent_instance, parent_version";

impl Component {
    /// Insert or replace this component and all of its owned rows
    ///
    /// Rows owned by other components (their child lists and requirement
    /// edges pointing here) are left alone.
    pub fn save(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            "DELETE FROM components WHERE uuid = ?1 AND instance = ?2",
            params![&self.uuid, self.instance],
        )?;

        let (parent_uuid, parent_instance, parent_version) = match &self.parent {
            Some(p) => (Some(&p.uuid), Some(p.instance), p.version.as_ref()),
            None => (None, None, None),
        };

        conn.execute(
            &format!(
                "INSERT INTO components ({COMPONENT_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
            ),
            params![
                &self.uuid,
                self.instance,
                &self.version,
                &self.unique_name,
                self.comp_type.as_str(),
                &self.vendor,
                &self.location,
                &self.uninstaller,
                parent_uuid,
                parent_instance,
                parent_version,
            ],
        )?;

        for (language, name) in &self.display_names {
            conn.execute(
                "INSERT INTO display_names (uuid, instance, language, name) VALUES (?1, ?2, ?3, ?4)",
                params![&self.uuid, self.instance, language, name],
            )?;
        }

        for (position, (name, value)) in self.attributes.iter().enumerate() {
            conn.execute(
                "INSERT INTO attributes (uuid, instance, position, name, value)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![&self.uuid, self.instance, position as i64, name, value],
            )?;
        }

        for (position, version) in self.compatible_versions.iter().enumerate() {
            conn.execute(
                "INSERT INTO compatible_versions (uuid, instance, position, version)
                 VALUES (?1, ?2, ?3, ?4)",
                params![&self.uuid, self.instance, position as i64, version],
            )?;
        }

        for (position, child) in self.children.iter().enumerate() {
            conn.execute(
                "INSERT OR IGNORE INTO children
                 (parent_uuid, parent_instance, position, child_uuid, child_instance, child_version)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    &self.uuid,
                    self.instance,
                    position as i64,
                    &child.uuid,
                    child.instance,
                    &child.version
                ],
            )?;
        }

        for (position, req) in self.required.iter().enumerate() {
            conn.execute(
                "INSERT OR IGNORE INTO required (uuid, instance, req_uuid, req_instance, req_version, position)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    &self.uuid,
                    self.instance,
                    &req.uuid,
                    req.instance,
                    &req.version,
                    position as i64
                ],
            )?;
        }

        Ok(())
    }

    /// Find a component by uuid and instance
    pub fn find(conn: &Connection, uuid: &str, instance: u32) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COMPONENT_COLUMNS} FROM components WHERE uuid = ?1 AND instance = ?2"
        ))?;
        let component = stmt
            .query_row(params![uuid, instance], Self::from_row)
            .optional()?;

        match component {
            Some(mut c) => {
                c.load_relations(conn)?;
                Ok(Some(c))
            }
            None => Ok(None),
        }
    }

    /// Find every instance of a uuid, lowest instance first
    pub fn find_by_uuid(conn: &Connection, uuid: &str) -> Result<Vec<Self>> {
        Self::query_all(
            conn,
            &format!(
                "SELECT {COMPONENT_COLUMNS} FROM components WHERE uuid = ?1 ORDER BY instance"
            ),
            &[&uuid as &dyn rusqlite::ToSql],
        )
    }

    /// Find every component carrying the given unique name
    pub fn find_by_unique_name(conn: &Connection, unique_name: &str) -> Result<Vec<Self>> {
        Self::query_all(
            conn,
            &format!(
                "SELECT {COMPONENT_COLUMNS} FROM components WHERE unique_name = ?1
                 ORDER BY uuid, instance"
            ),
            &[&unique_name as &dyn rusqlite::ToSql],
        )
    }

    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        Self::query_all(
            conn,
            &format!("SELECT {COMPONENT_COLUMNS} FROM components ORDER BY uuid, instance"),
            &[],
        )
    }

    fn query_all(
        conn: &Connection,
        sql: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(sql)?;
        let mut components = stmt
            .query_map(args, Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        for c in &mut components {
            c.load_relations(conn)?;
        }
        Ok(components)
    }

    /// Check whether a (uuid, instance) row exists
    pub fn exists(conn: &Connection, uuid: &str, instance: u32) -> Result<bool> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM components WHERE uuid = ?1 AND instance = ?2",
            params![uuid, instance],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Lowest positive instance number not used by `uuid`
    pub fn next_free_instance(conn: &Connection, uuid: &str) -> Result<u32> {
        let mut stmt =
            conn.prepare("SELECT instance FROM components WHERE uuid = ?1 ORDER BY instance")?;
        let used = stmt
            .query_map([uuid], |row| row.get::<_, u32>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut candidate = 1;
        for instance in used {
            if instance == candidate {
                candidate += 1;
            } else if instance > candidate {
                break;
            }
        }
        Ok(candidate)
    }

    /// Delete this component's row; owned rows cascade
    pub fn delete(conn: &Connection, uuid: &str, instance: u32) -> Result<bool> {
        let n = conn.execute(
            "DELETE FROM components WHERE uuid = ?1 AND instance = ?2",
            params![uuid, instance],
        )?;
        Ok(n > 0)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let comp_type: String = row.get(4)?;
        let parent_uuid: Option<String> = row.get(8)?;
        let parent_instance: Option<u32> = row.get(9)?;
        let parent_version: Option<String> = row.get(10)?;

        let parent = parent_uuid.map(|uuid| ComponentRef {
            uuid,
            instance: parent_instance.unwrap_or(0),
            version: parent_version,
        });

        Ok(Self {
            uuid: row.get(0)?,
            instance: row.get(1)?,
            version: row.get(2)?,
            unique_name: row.get(3)?,
            comp_type: comp_type.parse().unwrap_or(ComponentType::Component),
            vendor: row.get(5)?,
            location: row.get(6)?,
            uninstaller: row.get(7)?,
            parent,
            display_names: BTreeMap::new(),
            attributes: AttributeStore::new(),
            compatible_versions: Vec::new(),
            children: Vec::new(),
            required: Vec::new(),
            dependents: Vec::new(),
        })
    }

    fn load_relations(&mut self, conn: &Connection) -> Result<()> {
        let key = params![&self.uuid, self.instance];

        let mut stmt = conn
            .prepare("SELECT language, name FROM display_names WHERE uuid = ?1 AND instance = ?2")?;
        self.display_names = stmt
            .query_map(key, |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<BTreeMap<String, String>, _>>()?;

        let mut stmt = conn.prepare(
            "SELECT name, value FROM attributes WHERE uuid = ?1 AND instance = ?2 ORDER BY position",
        )?;
        self.attributes = stmt
            .query_map(key, |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<std::result::Result<AttributeStore, _>>()?;

        let mut stmt = conn.prepare(
            "SELECT version FROM compatible_versions WHERE uuid = ?1 AND instance = ?2
             ORDER BY position",
        )?;
        self.compatible_versions = stmt
            .query_map(key, |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;

        let mut stmt = conn.prepare(
            "SELECT child_uuid, child_instance, child_version FROM children
             WHERE parent_uuid = ?1 AND parent_instance = ?2 ORDER BY position, rowid",
        )?;
        self.children = stmt
            .query_map(key, ref_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut stmt = conn.prepare(
            "SELECT req_uuid, req_instance, req_version FROM required
             WHERE uuid = ?1 AND instance = ?2 ORDER BY position, rowid",
        )?;
        self.required = stmt
            .query_map(key, ref_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        self.dependents = dependents_of(conn, &self.uuid, self.instance)?;
        Ok(())
    }
}

fn ref_from_row(row: &Row) -> rusqlite::Result<ComponentRef> {
    Ok(ComponentRef {
        uuid: row.get(0)?,
        instance: row.get(1)?,
        version: row.get(2)?,
    })
}

/// Components whose required set names (uuid, instance)
pub fn dependents_of(conn: &Connection, uuid: &str, instance: u32) -> Result<Vec<ComponentRef>> {
    let mut stmt = conn.prepare(
        "SELECT c.uuid, c.instance, c.version FROM required r
         JOIN components c ON c.uuid = r.uuid AND c.instance = r.instance
         WHERE r.req_uuid = ?1 AND r.req_instance = ?2
         ORDER BY c.uuid, c.instance",
    )?;
    let refs = stmt
        .query_map(params![uuid, instance], ref_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(refs)
}

/// Components whose stored parent edge points at (uuid, instance)
pub fn adopted_by(conn: &Connection, uuid: &str, instance: u32) -> Result<Vec<ComponentRef>> {
    let mut stmt = conn.prepare(
        "SELECT uuid, instance, version FROM components
         WHERE parent_uuid = ?1 AND parent_instance = ?2
         ORDER BY registered_at, uuid, instance",
    )?;
    let refs = stmt
        .query_map(params![uuid, instance], ref_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(refs)
}

/// Append a child edge to a parent's list
///
/// An edge that is already present keeps its position; only the recorded
/// child version is refreshed.
pub fn append_child_edge(conn: &Connection, parent: &ComponentRef, child: &ComponentRef) -> Result<()> {
    let next_position: i64 = conn.query_row(
        "SELECT COALESCE(MAX(position) + 1, 0) FROM children
         WHERE parent_uuid = ?1 AND parent_instance = ?2",
        params![&parent.uuid, parent.instance],
        |row| row.get(0),
    )?;
    conn.execute(
        "INSERT INTO children
         (parent_uuid, parent_instance, position, child_uuid, child_instance, child_version)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT (parent_uuid, parent_instance, child_uuid, child_instance)
         DO UPDATE SET child_version = excluded.child_version",
        params![
            &parent.uuid,
            parent.instance,
            next_position,
            &child.uuid,
            child.instance,
            &child.version
        ],
    )?;
    Ok(())
}

/// Remove every edge pointing at (uuid, instance) as a child
pub fn remove_child_edges(conn: &Connection, uuid: &str, instance: u32) -> Result<()> {
    conn.execute(
        "DELETE FROM children WHERE child_uuid = ?1 AND child_instance = ?2",
        params![uuid, instance],
    )?;
    Ok(())
}

/// Remove edges pointing at (uuid, instance) as a child, except from `keep`
pub fn remove_other_child_edges(
    conn: &Connection,
    uuid: &str,
    instance: u32,
    keep: Option<&ComponentRef>,
) -> Result<()> {
    match keep {
        Some(parent) => conn.execute(
            "DELETE FROM children WHERE child_uuid = ?1 AND child_instance = ?2
             AND NOT (parent_uuid = ?3 AND parent_instance = ?4)",
            params![uuid, instance, &parent.uuid, parent.instance],
        )?,
        None => conn.execute(
            "DELETE FROM children WHERE child_uuid = ?1 AND child_instance = ?2",
            params![uuid, instance],
        )?,
    };
    Ok(())
}

/// Remove every requirement edge targeting (uuid, instance)
pub fn remove_required_edges(conn: &Connection, uuid: &str, instance: u32) -> Result<()> {
    conn.execute(
        "DELETE FROM required WHERE req_uuid = ?1 AND req_instance = ?2",
        params![uuid, instance],
    )?;
    Ok(())
}

/// Point a stored component's parent edge at `parent`, or clear it
pub fn set_parent(
    conn: &Connection,
    uuid: &str,
    instance: u32,
    parent: Option<&ComponentRef>,
) -> Result<()> {
    conn.execute(
        "UPDATE components SET parent_uuid = ?3, parent_instance = ?4, parent_version = ?5
         WHERE uuid = ?1 AND instance = ?2",
        params![
            uuid,
            instance,
            parent.map(|p| &p.uuid),
            parent.map(|p| p.instance),
            parent.and_then(|p| p.version.as_ref())
        ],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;

    fn create_test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("PRAGMA foreign_keys = ON", []).unwrap();
        schema::migrate(&conn).unwrap();
        conn
    }

    fn sample(uuid: &str, instance: u32) -> Component {
        let mut c = Component::new(uuid)
            .with_version("1.0")
            .with_display_name("en", "Sample")
            .with_display_name("fr", "Exemple");
        c.instance = instance;
        c.unique_name = Some("SUNWsample".into());
        c.comp_type = ComponentType::Feature;
        c.attributes.set("zeta", "last");
        c.attributes.set("alpha", "first");
        c.compatible_versions = vec!["0.9".into(), "0.8".into()];
        c
    }

    #[test]
    fn test_save_and_find_round_trip() {
        let conn = create_test_db();
        let mut c = sample("u1", 1);
        c.required.push(ComponentRef::new("dep", 1, Some("2.0".into())));
        c.children.push(ComponentRef::new("kid", 1, None));
        c.save(&conn).unwrap();

        let loaded = Component::find(&conn, "u1", 1).unwrap().unwrap();
        assert_eq!(loaded, c);
        assert_eq!(loaded.attributes.names().collect::<Vec<_>>(), vec!["zeta", "alpha"]);
        assert_eq!(loaded.display_name("fr"), Some("Exemple"));
        assert!(Component::find(&conn, "u1", 2).unwrap().is_none());
    }

    #[test]
    fn test_save_replaces_owned_rows() {
        let conn = create_test_db();
        let mut c = sample("u1", 1);
        c.save(&conn).unwrap();

        c.attributes.remove("zeta");
        c.display_names.remove("fr");
        c.save(&conn).unwrap();

        let loaded = Component::find(&conn, "u1", 1).unwrap().unwrap();
        assert_eq!(loaded.attributes.len(), 1);
        assert_eq!(loaded.display_names.len(), 1);
        assert_eq!(Component::list_all(&conn).unwrap().len(), 1);
    }

    #[test]
    fn test_next_free_instance_fills_gaps() {
        let conn = create_test_db();
        assert_eq!(Component::next_free_instance(&conn, "u").unwrap(), 1);

        sample("u", 1).save(&conn).unwrap();
        sample("u", 3).save(&conn).unwrap();
        assert_eq!(Component::next_free_instance(&conn, "u").unwrap(), 2);

        sample("u", 2).save(&conn).unwrap();
        assert_eq!(Component::next_free_instance(&conn, "u").unwrap(), 4);
    }

    #[test]
    fn test_dependents_are_derived() {
        let conn = create_test_db();
        sample("lib", 1).save(&conn).unwrap();

        let mut app = sample("app", 1);
        app.required.push(ComponentRef::new("lib", 1, Some("1.0".into())));
        app.save(&conn).unwrap();

        let lib = Component::find(&conn, "lib", 1).unwrap().unwrap();
        assert_eq!(lib.dependents, vec![ComponentRef::new("app", 1, Some("1.0".into()))]);

        Component::delete(&conn, "app", 1).unwrap();
        let lib = Component::find(&conn, "lib", 1).unwrap().unwrap();
        assert!(lib.dependents.is_empty());
    }

    #[test]
    fn test_append_child_edge_keeps_order() {
        let conn = create_test_db();
        let parent = sample("p", 1);
        parent.save(&conn).unwrap();

        append_child_edge(&conn, &parent.reference(), &ComponentRef::new("b", 1, None)).unwrap();
        append_child_edge(&conn, &parent.reference(), &ComponentRef::new("a", 1, None)).unwrap();
        append_child_edge(&conn, &parent.reference(), &ComponentRef::new("b", 1, None)).unwrap();

        let loaded = Component::find(&conn, "p", 1).unwrap().unwrap();
        let uuids: Vec<_> = loaded.children.iter().map(|c| c.uuid.as_str()).collect();
        assert_eq!(uuids, vec!["b", "a"]);

        remove_child_edges(&conn, "b", 1).unwrap();
        let loaded = Component::find(&conn, "p", 1).unwrap().unwrap();
        assert_eq!(loaded.children.len(), 1);
    }
}
