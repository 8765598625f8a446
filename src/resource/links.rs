//! HAL link maps.

use serde_json::Value;
use std::collections::BTreeMap;

/// Relation to href mapping taken from a HAL `_links` object.
///
/// A relation may carry one link object or an array of them; both are kept
/// as a list of hrefs in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Links {
    rels: BTreeMap<String, Vec<String>>,
}

impl Links {
    /// Creates an empty link map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a link map from a `_links` value.
    pub fn from_value(value: &Value) -> Self {
        let mut links = Self::new();
        let Some(map) = value.as_object() else {
            return links;
        };

        for (rel, entry) in map {
            let hrefs: Vec<String> = match entry {
                Value::Array(items) => items.iter().filter_map(href).collect(),
                single => href(single).into_iter().collect(),
            };
            if !hrefs.is_empty() {
                links.rels.insert(rel.clone(), hrefs);
            }
        }
        links
    }

    /// Adds a link.
    pub fn insert(&mut self, rel: impl Into<String>, href: impl Into<String>) {
        self.rels.entry(rel.into()).or_default().push(href.into());
    }

    /// First href for a relation.
    pub fn get(&self, rel: &str) -> Option<&str> {
        self.rels
            .get(rel)
            .and_then(|hrefs| hrefs.first())
            .map(String::as_str)
    }

    /// All hrefs for a relation.
    pub fn all(&self, rel: &str) -> &[String] {
        self.rels.get(rel).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Returns true if the relation exists.
    pub fn contains(&self, rel: &str) -> bool {
        self.rels.contains_key(rel)
    }

    /// Relations starting with `prefix`, with the prefix stripped, mapped to their first href.
    pub fn with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = (&'a str, &'a str)> {
        self.rels.iter().filter_map(move |(rel, hrefs)| {
            let name = rel.strip_prefix(prefix)?;
            let first = hrefs.first()?;
            Some((name, first.as_str()))
        })
    }

    /// Returns true if there are no links.
    pub fn is_empty(&self) -> bool {
        self.rels.is_empty()
    }
}

fn href(link: &Value) -> Option<String> {
    link.get("href").and_then(Value::as_str).map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value() {
        let links = Links::from_value(&json!({
            "self": {"href": "/a"},
            "pf:routes": [{"href": "https://one/"}, {"href": "https://two/"}],
            "broken": {"title": "no href"}
        }));

        assert_eq!(links.get("self"), Some("/a"));
        assert_eq!(links.all("pf:routes").len(), 2);
        assert!(!links.contains("broken"));
        assert!(links.get("missing").is_none());
        assert!(links.all("missing").is_empty());
    }

    #[test]
    fn test_with_prefix() {
        let links = Links::from_value(&json!({
            "pf:ssh:app": {"href": "ssh://user-app@ssh.example.com"},
            "pf:ssh:worker": {"href": "ssh://user-worker@ssh.example.com"},
            "ssh": {"href": "ssh://user@ssh.example.com"}
        }));

        let names: Vec<&str> = links.with_prefix("pf:ssh:").map(|(name, _)| name).collect();
        assert_eq!(names, vec!["app", "worker"]);
    }

    #[test]
    fn test_non_object() {
        assert!(Links::from_value(&Value::Null).is_empty());
    }
}
