//! Case-insensitive index of every key in a document.
//!
//! Built once from the loaded document. Later mutations of the document
//! are not reflected, so resolution may reference keys that no longer exist.

use std::collections::{BTreeMap, BTreeSet};

use crate::value::Value;

/// Lowercased key to the set of original spellings seen in the document.
#[derive(Debug, Clone, Default)]
pub struct KeyIndex {
    keys: BTreeMap<String, BTreeSet<String>>,
}

/// Outcome of resolving a lowercased segment against the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyMatch<'a> {
    /// Exactly one spelling exists.
    Unique(&'a str),
    /// Several case variants exist; none is guessed.
    Ambiguous,
    Missing,
}

impl KeyIndex {
    /// Walk the whole document and record every map key.
    pub fn build(document: &Value) -> Self {
        let mut index = Self::default();
        index.collect(document);
        index
    }

    fn collect(&mut self, value: &Value) {
        match value {
            Value::Map(map) => {
                for (key, child) in map {
                    self.keys
                        .entry(key.to_lowercase())
                        .or_default()
                        .insert(key.clone());
                    self.collect(child);
                }
            }
            Value::List(items) => {
                for item in items {
                    self.collect(item);
                }
            }
            _ => {}
        }
    }

    /// Resolve a segment by its lowercase form.
    pub fn resolve(&self, segment: &str) -> KeyMatch<'_> {
        match self.keys.get(&segment.to_lowercase()) {
            Some(spellings) if spellings.len() == 1 => match spellings.iter().next() {
                Some(only) => KeyMatch::Unique(only),
                None => KeyMatch::Missing,
            },
            Some(_) => KeyMatch::Ambiguous,
            None => KeyMatch::Missing,
        }
    }

    /// All spellings recorded for a lowercased key.
    pub fn spellings(&self, lowered: &str) -> Option<&BTreeSet<String>> {
        self.keys.get(lowered)
    }

    /// Iterate over lowercased keys and their spellings.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.keys.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Map;

    fn doc(json: &str) -> Value {
        Value::from(serde_json::from_str::<serde_json::Value>(json).unwrap())
    }

    #[test]
    fn collects_nested_keys_through_lists() {
        let index = KeyIndex::build(&doc(r#"{"a":[{"B":1},{"c":{"D":2}}]}"#));
        assert_eq!(index.len(), 4);
        assert_eq!(index.resolve("b"), KeyMatch::Unique("B"));
        assert_eq!(index.resolve("D"), KeyMatch::Unique("D"));
    }

    #[test]
    fn case_variants_are_kept_apart() {
        let index = KeyIndex::build(&doc(r#"{"Name":"x","name":"y"}"#));
        assert_eq!(index.resolve("name"), KeyMatch::Ambiguous);
        assert_eq!(index.spellings("name").map(|s| s.len()), Some(2));
    }

    #[test]
    fn scalars_and_empty_maps_have_no_keys() {
        assert!(KeyIndex::build(&Value::Int(3)).is_empty());
        assert!(KeyIndex::build(&Value::Map(Map::new())).is_empty());
        assert_eq!(KeyIndex::build(&Value::Int(3)).resolve("x"), KeyMatch::Missing);
    }
}
