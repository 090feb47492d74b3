// src/registry/attributes.rs

//! Attribute store - name/value pairs attached to a component
//!
//! Iteration follows insertion order so listings are stable.

/// Mapping from attribute name to value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeStore {
    entries: Vec<(String, String)>,
}

impl AttributeStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an attribute, replacing any previous value in place
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Remove an attribute, returning its value if it was present
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let pos = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for AttributeStore {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut store = AttributeStore::new();
        for (k, v) in iter {
            store.set(k, v);
        }
        store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_replaces_in_place() {
        let mut attrs = AttributeStore::new();
        attrs.set("vendor", "Acme");
        attrs.set("support", "none");
        attrs.set("vendor", "Acme Corp");

        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs.get("vendor"), Some("Acme Corp"));
        assert_eq!(attrs.names().collect::<Vec<_>>(), vec!["vendor", "support"]);
    }

    #[test]
    fn test_remove() {
        let mut attrs: AttributeStore = [("a", "1"), ("b", "2")].into_iter().collect();

        assert_eq!(attrs.remove("a"), Some("1".to_string()));
        assert_eq!(attrs.remove("a"), None);
        assert_eq!(attrs.get("a"), None);
        assert_eq!(attrs.iter().collect::<Vec<_>>(), vec![("b", "2")]);
    }
}
