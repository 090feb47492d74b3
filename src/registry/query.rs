// src/registry/query.rs

//! Best-match lookup of registered components
//!
//! A query constrains any subset of uuid, unique name, version, instance
//! and location. Uuid or unique name selects the candidates; the remaining
//! fields rank them:
//!
//! 1. uuid + instance
//! 2. uuid + location
//! 3. uuid alone
//! 4. unique name alone
//!
//! A requested version must equal the component's version or appear in its
//! compatible versions; an exact version outranks a compatible one.
//!
//! With both a uuid and a unique name, the unique name must match as well.
//! A query naming neither (only version, instance or location) matches
//! nothing.

use super::component::Component;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub uuid: Option<String>,
    pub unique_name: Option<String>,
    pub version: Option<String>,
    pub instance: Option<u32>,
    pub location: Option<String>,
}

impl Query {
    pub fn by_uuid(uuid: impl Into<String>) -> Self {
        Self {
            uuid: Some(uuid.into()),
            ..Default::default()
        }
    }

    pub fn by_unique_name(name: impl Into<String>) -> Self {
        Self {
            unique_name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn instance(mut self, instance: u32) -> Self {
        self.instance = Some(instance);
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// True if the query names neither a uuid nor a unique name
    pub fn is_unconstrained(&self) -> bool {
        self.uuid.is_none() && self.unique_name.is_none()
    }

    /// Rank a candidate, `None` when it does not satisfy the query
    ///
    /// Higher tuples are better matches: (identity tier, version tier).
    pub fn score(&self, c: &Component) -> Option<(u8, u8)> {
        let tier = match &self.uuid {
            Some(uuid) => {
                if *uuid != c.uuid {
                    return None;
                }
                if self.unique_name.is_some() && self.unique_name != c.unique_name {
                    return None;
                }
                if let Some(instance) = self.instance {
                    if instance != c.instance {
                        return None;
                    }
                    4
                } else if self.location.is_some() && self.location == c.location {
                    3
                } else {
                    2
                }
            }
            None => {
                let name = self.unique_name.as_ref()?;
                if c.unique_name.as_ref() != Some(name) {
                    return None;
                }
                if let Some(instance) = self.instance
                    && instance != c.instance
                {
                    return None;
                }
                1
            }
        };

        let version_tier = match &self.version {
            None => 0,
            Some(v) if c.version.as_ref() == Some(v) => 2,
            Some(v) if c.compatible_versions.contains(v) => 1,
            Some(_) => return None,
        };

        Some((tier, version_tier))
    }

    /// Candidates that satisfy the query, best first
    ///
    /// Equal scores keep the order the candidates were given in.
    pub fn rank<'a>(&self, candidates: &'a [Component]) -> Vec<&'a Component> {
        let mut scored: Vec<_> = candidates
            .iter()
            .filter_map(|c| self.score(c).map(|s| (s, c)))
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.into_iter().map(|(_, c)| c).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comp(uuid: &str, instance: u32, version: &str) -> Component {
        let mut c = Component::new(uuid).with_version(version);
        c.instance = instance;
        c
    }

    #[test]
    fn test_instance_beats_location_beats_uuid() {
        let mut a = comp("u", 1, "1.0");
        a.location = Some("/opt/a".into());
        let b = comp("u", 2, "1.0");
        let candidates = vec![a, b];

        let q = Query::by_uuid("u").instance(2).location("/opt/a");
        assert_eq!(q.rank(&candidates)[0].instance, 2);

        let q = Query::by_uuid("u").location("/opt/a");
        assert_eq!(q.rank(&candidates)[0].instance, 1);
        assert_eq!(q.score(&candidates[0]), Some((3, 0)));
        assert_eq!(q.score(&candidates[1]), Some((2, 0)));

        let q = Query::by_uuid("u").instance(9);
        assert!(q.rank(&candidates).is_empty());
    }

    #[test]
    fn test_exact_version_beats_compatible() {
        let old = comp("u", 1, "1.0");
        let mut new = comp("u", 2, "2.0");
        new.compatible_versions.push("1.0".into());
        let candidates = vec![new, old];

        let ranked = Query::by_uuid("u").version("1.0").rank(&candidates);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].instance, 1);

        assert!(Query::by_uuid("u").version("3.0").rank(&candidates).is_empty());
    }

    #[test]
    fn test_unique_name_is_weakest() {
        let mut c = comp("u", 1, "1.0");
        c.unique_name = Some("SUNWfoo".into());

        assert_eq!(Query::by_unique_name("SUNWfoo").score(&c), Some((1, 0)));
        assert_eq!(Query::by_unique_name("SUNWbar").score(&c), None);
        assert!(Query::default().is_unconstrained());
        assert_eq!(Query::default().score(&c), None);
    }

    #[test]
    fn test_extra_constraints_filter() {
        let mut c = comp("u", 1, "1.0");
        c.unique_name = Some("SUNWfoo".into());
        c.location = Some("/opt/foo".into());

        let mut q = Query::by_uuid("u");
        q.unique_name = Some("SUNWfoo".into());
        assert_eq!(q.score(&c), Some((2, 0)));
        q.unique_name = Some("SUNWbar".into());
        assert_eq!(q.score(&c), None);

        let by_location = Query::default().location("/opt/foo");
        assert!(by_location.is_unconstrained());
        assert_eq!(by_location.score(&c), None);
        assert_eq!(Query::default().version("1.0").score(&c), None);
    }
}
