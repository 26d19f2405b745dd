use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub const SCHEMA_KEY: &str = "schema";
pub const DEFAULT_KEY_KEY: &str = "default_key";
pub const FORMAT_MASK_KEY: &str = "format_mask";
pub const DELIMITER_KEY: &str = "delimiter";
pub const ORDER_KEY: &str = "order";
pub const UNIQUE_KEY: &str = "unique";

/// Summary entries that carry configuration rather than user metadata.
pub const CONFIG_KEYS: &[&str] = &[
    SCHEMA_KEY,
    DEFAULT_KEY_KEY,
    FORMAT_MASK_KEY,
    DELIMITER_KEY,
    ORDER_KEY,
    UNIQUE_KEY,
];

/// Document-level metadata, persisted as the tree's `summary` element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Summary(IndexMap<String, String>);

impl Summary {
    pub fn new() -> Self {
        Summary::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(|v| v.as_str())
    }

    /// Set a value, keeping the position of an existing entry.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.0.get_mut(key) {
            Some(slot) => *slot = value,
            None => {
                self.0.insert(key.to_string(), value);
            }
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.shift_remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// User metadata only.
    pub fn custom(&self) -> impl Iterator<Item = (&str, &str)> {
        self.iter().filter(|(k, _)| !CONFIG_KEYS.contains(k))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Summary {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut summary = Summary::new();
        for (k, v) in iter {
            summary.set(&k.into(), v);
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_set_keeps_position() {
        let mut summary: Summary = [("title", "a"), ("schema", "x/y(z)")].into_iter().collect();
        summary.set("title", "b");
        summary.set("tags", "c");
        let keys: Vec<&str> = summary.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["title", "schema", "tags"]);
        assert_eq!(summary.get("title"), Some("b"));
        let custom: Vec<&str> = summary.custom().map(|(k, _)| k).collect();
        assert_eq!(custom, vec!["title", "tags"]);
    }
}
