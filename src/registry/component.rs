// src/registry/component.rs

//! Component record - the value object stored in the registry
//!
//! A component is identified by a uuid and, once installed, an instance
//! number. Relationship edges are held as [`ComponentRef`] triples rather
//! than pointers so that components can be loaded, cloned and compared
//! independently of the store.

use super::attributes::AttributeStore;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Language tag that must carry a display name before registration
pub const DEFAULT_LANGUAGE: &str = "en";

/// Kind of registered component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ComponentType {
    Product,
    Feature,
    #[default]
    Component,
}

impl ComponentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentType::Product => "PRODUCT",
            ComponentType::Feature => "FEATURE",
            ComponentType::Component => "COMPONENT",
        }
    }
}

impl FromStr for ComponentType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PRODUCT" => Ok(ComponentType::Product),
            "FEATURE" => Ok(ComponentType::Feature),
            "COMPONENT" => Ok(ComponentType::Component),
            _ => Err(format!("Invalid component type: {s}")),
        }
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to another component by (uuid, instance, version)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentRef {
    pub uuid: String,
    /// 0 when the referenced component has not been registered yet
    pub instance: u32,
    pub version: Option<String>,
}

impl ComponentRef {
    pub fn new(uuid: impl Into<String>, instance: u32, version: Option<String>) -> Self {
        Self {
            uuid: uuid.into(),
            instance,
            version,
        }
    }

    /// True if this reference names the given component
    pub fn points_to(&self, component: &Component) -> bool {
        self.uuid == component.uuid && self.instance == component.instance
    }
}

impl fmt::Display for ComponentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.uuid, self.instance)?;
        if let Some(version) = &self.version {
            write!(f, " ({version})")?;
        }
        Ok(())
    }
}

/// A registered (or to-be-registered) product, feature or component
#[derive(Debug, Clone, Default)]
pub struct Component {
    pub uuid: String,
    pub instance: u32,
    pub version: Option<String>,
    pub unique_name: Option<String>,
    pub display_names: BTreeMap<String, String>,
    pub vendor: Option<String>,
    pub location: Option<String>,
    pub uninstaller: Option<String>,
    pub comp_type: ComponentType,
    /// Earlier entries are more recent
    pub compatible_versions: Vec<String>,
    pub attributes: AttributeStore,
    pub parent: Option<ComponentRef>,
    pub children: Vec<ComponentRef>,
    pub required: Vec<ComponentRef>,
    /// Derived from other components' required edges when loaded from a store
    pub dependents: Vec<ComponentRef>,
}

impl Component {
    /// Create a component with the given uuid and nothing else set
    pub fn new(uuid: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            ..Default::default()
        }
    }

    /// Reference triple for this component
    pub fn reference(&self) -> ComponentRef {
        ComponentRef::new(self.uuid.clone(), self.instance, self.version.clone())
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_display_name(mut self, language: &str, name: impl Into<String>) -> Self {
        self.set_display_name(language, name);
        self
    }

    pub fn set_display_name(&mut self, language: &str, name: impl Into<String>) {
        self.display_names.insert(language.to_string(), name.into());
    }

    pub fn display_name(&self, language: &str) -> Option<&str> {
        self.display_names.get(language).map(String::as_str)
    }

    /// Display name in the default language, falling back to the uuid
    pub fn title(&self) -> &str {
        self.display_name(DEFAULT_LANGUAGE).unwrap_or(&self.uuid)
    }

    pub fn add_compatible_version(&mut self, version: impl Into<String>) {
        let version = version.into();
        if !self.compatible_versions.contains(&version) {
            self.compatible_versions.push(version);
        }
    }

    /// True if `version` equals the version or is listed as compatible
    pub fn is_compatible_with(&self, version: &str) -> bool {
        self.version.as_deref() == Some(version)
            || self.compatible_versions.iter().any(|v| v == version)
    }
}

fn same_refs(a: &[ComponentRef], b: &[ComponentRef]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x == y)
}

impl PartialEq for Component {
    /// Vendor, location, uninstaller and dependents do not take part in
    /// equality; dependents are a derived view.
    fn eq(&self, other: &Self) -> bool {
        self.uuid == other.uuid
            && self.instance == other.instance
            && self.version == other.version
            && self.unique_name == other.unique_name
            && self.comp_type == other.comp_type
            && self.display_names == other.display_names
            && self.attributes == other.attributes
            && same_refs(&self.required, &other.required)
            && same_refs(&self.children, &other.children)
            && self.compatible_versions == other.compatible_versions
            && self.parent == other.parent
    }
}

impl Eq for Component {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_type_parse() {
        assert_eq!("feature".parse::<ComponentType>().unwrap(), ComponentType::Feature);
        assert_eq!("PRODUCT".parse::<ComponentType>().unwrap(), ComponentType::Product);
        assert!("bundle".parse::<ComponentType>().is_err());
        assert_eq!(ComponentType::default(), ComponentType::Component);
    }

    #[test]
    fn test_clone_is_deep_and_equal() {
        let mut c = Component::new("uuid-1")
            .with_version("2.0")
            .with_display_name("en", "Thing");
        c.attributes.set("support", "yes");
        c.required.push(ComponentRef::new("uuid-2", 1, Some("1.0".into())));

        let mut copy = c.clone();
        assert_eq!(c, copy);

        copy.attributes.set("support", "no");
        assert_ne!(c, copy);
        assert_eq!(c.attributes.get("support"), Some("yes"));
    }

    #[test]
    fn test_equality_ignores_vendor_and_dependents() {
        let a = Component::new("u").with_display_name("en", "U");
        let mut b = a.clone();
        b.vendor = Some("Someone".into());
        b.dependents.push(ComponentRef::new("x", 1, None));
        assert_eq!(a, b);

        b.compatible_versions.push("0.9".into());
        assert_ne!(a, b);
    }

    #[test]
    fn test_compatible_versions() {
        let mut c = Component::new("u").with_version("3.0");
        c.add_compatible_version("2.5");
        c.add_compatible_version("2.0");
        c.add_compatible_version("2.5");

        assert_eq!(c.compatible_versions, vec!["2.5", "2.0"]);
        assert!(c.is_compatible_with("3.0"));
        assert!(c.is_compatible_with("2.0"));
        assert!(!c.is_compatible_with("1.0"));
    }
}
