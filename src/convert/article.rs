// src/convert/article.rs

//! Articles: the old registry's flat property-list records
//!
//! Each extracted file holds one article as `key=value` lines:
//!
//! ```text
//! # comment
//! mnemonic=SUNWbase
//! id=123456789
//! parent=987654321
//! children=111111111 222222222
//! version=1.0
//! title=Base
//! vendor=Acme
//! ```
//!
//! `mnemonic`, `id`, `parent`, `children` and `version` are structural;
//! every `version=` line adds a revision, latest last. Any other key is a
//! plain property.

use crate::error::{Error, Result};
use crate::registry::AttributeStore;
use rand::Rng;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::warn;

/// One record of the old registry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Article {
    pub mnemonic: String,
    pub id: Option<String>,
    pub parent: Option<String>,
    pub children: Vec<String>,
    pub properties: AttributeStore,
    /// Versions in the order they were recorded; the last is current
    pub revisions: Vec<String>,
}

impl Article {
    /// Parse one article; `source` names it in error messages
    pub fn parse(source: &str, content: &str) -> Result<Self> {
        let mut article = Article::default();

        for (n, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(Error::BadFile(format!(
                    "{source}: line {}: expected key=value",
                    n + 1
                )));
            };
            let value = value.trim();
            match key.trim() {
                "mnemonic" => article.mnemonic = value.to_string(),
                "id" => article.id = Some(value.to_string()).filter(|v| !v.is_empty()),
                "parent" => article.parent = Some(value.to_string()).filter(|v| !v.is_empty()),
                "children" => article.children.extend(
                    value
                        .split(|c: char| c.is_whitespace() || c == ',')
                        .filter(|s| !s.is_empty())
                        .map(str::to_string),
                ),
                "version" => article.revisions.push(value.to_string()),
                other => article.properties.set(other, value),
            }
        }

        if article.mnemonic.is_empty() {
            return Err(Error::BadFile(format!("{source}: article has no mnemonic")));
        }
        Ok(article)
    }

    pub fn current_version(&self) -> Option<&str> {
        self.revisions.last().map(String::as_str)
    }

    /// The article's id; only valid after [`associate`]
    pub fn key(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.mnemonic)
    }
}

/// Draw a nine digit id not already in `taken`
pub fn generate_id(taken: &HashSet<String>) -> String {
    let mut rng = rand::thread_rng();
    loop {
        let id = rng.gen_range(100_000_000u32..1_000_000_000).to_string();
        if !taken.contains(&id) {
            return id;
        }
    }
}

/// Give every article an id and make parent and child links agree
///
/// References to ids no article carries are dropped with a warning.
pub fn associate(articles: &mut [Article]) {
    let mut taken: HashSet<String> = articles.iter().filter_map(|a| a.id.clone()).collect();
    for article in articles.iter_mut().filter(|a| a.id.is_none()) {
        let id = generate_id(&taken);
        taken.insert(id.clone());
        article.id = Some(id);
    }

    let index: HashMap<String, usize> = articles
        .iter()
        .enumerate()
        .map(|(i, a)| (a.key().to_string(), i))
        .collect();

    // Children lists name their parent
    for i in 0..articles.len() {
        let parent_id = articles[i].key().to_string();
        let children = std::mem::take(&mut articles[i].children);
        let mut kept = Vec::with_capacity(children.len());
        for child in children {
            match index.get(&child) {
                Some(&c) if c != i => {
                    if articles[c].parent.is_none() {
                        articles[c].parent = Some(parent_id.clone());
                    }
                    kept.push(child);
                }
                _ => warn!("{}: dropping unknown child {}", articles[i].mnemonic, child),
            }
        }
        articles[i].children = kept;
    }

    // Parents list their children
    for i in 0..articles.len() {
        let Some(parent_id) = articles[i].parent.clone() else {
            continue;
        };
        match index.get(&parent_id) {
            Some(&p) if p != i => {
                let id = articles[i].key().to_string();
                if !articles[p].children.contains(&id) {
                    articles[p].children.push(id);
                }
            }
            _ => {
                warn!("{}: dropping unknown parent {}", articles[i].mnemonic, parent_id);
                articles[i].parent = None;
            }
        }
    }
}

/// Indices of `articles` with every parent before its children
pub fn topological_order(articles: &[Article]) -> Result<Vec<usize>> {
    let index: HashMap<&str, usize> = articles
        .iter()
        .enumerate()
        .map(|(i, a)| (a.key(), i))
        .collect();

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); articles.len()];
    let mut queue = VecDeque::new();
    for (i, article) in articles.iter().enumerate() {
        match article.parent.as_deref().and_then(|p| index.get(p)) {
            Some(&p) => children[p].push(i),
            None => queue.push_back(i),
        }
    }

    let mut order = Vec::with_capacity(articles.len());
    while let Some(i) = queue.pop_front() {
        order.push(i);
        queue.extend(children[i].iter().copied());
    }

    if order.len() != articles.len() {
        return Err(Error::BadFile(
            "articles form a parent cycle".to_string(),
        ));
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_article() {
        let article = Article::parse(
            "a",
            "# header\nmnemonic=SUNWbase\nid=123456789\nversion=0.9\nversion=1.0\n\
             title=Base\nchildren=1 2,3\nchildren=4\nvendor = Acme\n",
        )
        .unwrap();
        assert_eq!(article.mnemonic, "SUNWbase");
        assert_eq!(article.id.as_deref(), Some("123456789"));
        assert_eq!(article.current_version(), Some("1.0"));
        assert_eq!(article.children, vec!["1", "2", "3", "4"]);
        assert_eq!(article.properties.get("vendor"), Some("Acme"));
        assert_eq!(article.properties.get("title"), Some("Base"));
    }

    #[test]
    fn test_parse_rejects_bad_lines() {
        assert!(matches!(
            Article::parse("x", "mnemonic=A\nnot a property\n"),
            Err(Error::BadFile(_))
        ));
        assert!(matches!(Article::parse("x", "title=T\n"), Err(Error::BadFile(_))));
    }

    #[test]
    fn test_generated_ids_are_nine_digits() {
        let mut taken = HashSet::new();
        for _ in 0..50 {
            let id = generate_id(&taken);
            assert_eq!(id.len(), 9);
            assert!(taken.insert(id));
        }
    }

    fn article(mnemonic: &str, id: &str, parent: Option<&str>) -> Article {
        Article {
            mnemonic: mnemonic.into(),
            id: Some(id.into()).filter(|s: &String| !s.is_empty()),
            parent: parent.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_associate_links_both_ways() {
        let mut articles = vec![
            article("child", "2", Some("1")),
            article("parent", "1", None),
            article("anon", "", None),
        ];
        articles[1].children.push("3".into());
        articles[1].children.push("999".into());
        associate(&mut articles);

        assert_eq!(articles[1].children, vec!["2"]);
        assert!(articles[2].id.as_ref().is_some_and(|id| id.len() == 9));
    }

    #[test]
    fn test_children_adopt_parent_and_unknown_parent_dropped() {
        let mut articles = vec![article("p", "1", None), article("k", "2", None), article("o", "3", Some("404"))];
        articles[0].children.push("2".into());
        associate(&mut articles);
        assert_eq!(articles[1].parent.as_deref(), Some("1"));
        assert!(articles[2].parent.is_none());
    }

    #[test]
    fn test_topological_order() {
        let articles = vec![
            article("grandchild", "3", Some("2")),
            article("child", "2", Some("1")),
            article("root", "1", None),
        ];
        assert_eq!(topological_order(&articles).unwrap(), vec![2, 1, 0]);

        let cycle = vec![article("a", "1", Some("2")), article("b", "2", Some("1"))];
        assert!(matches!(topological_order(&cycle), Err(Error::BadFile(_))));
    }
}
