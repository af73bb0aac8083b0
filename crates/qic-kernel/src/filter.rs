//! Result filters applied before display: key selection and row truncation.

use std::collections::{HashMap, HashSet};

use crate::value::Value;

/// Case-insensitive key inclusion and exclusion.
///
/// Inclusion names ending in `*`, `/` or `+` keep their whole subtree.
/// Other included keys keep filtering inside their values.
#[derive(Debug, Clone, Default)]
pub struct KeyFilter {
    include: Option<HashMap<String, bool>>,
    exclude: Option<HashSet<String>>,
}

impl KeyFilter {
    /// Build from comma-separated lists as given on the command line.
    pub fn new(include: Option<&str>, exclude: Option<&str>) -> Self {
        let include = include.map(|list| {
            list.split(',')
                .filter_map(|word| {
                    let name = word.trim_end_matches(['*', '/', '+']);
                    (!name.is_empty()).then(|| (name.to_lowercase(), name.len() != word.len()))
                })
                .collect::<HashMap<_, _>>()
        });
        let exclude = exclude.map(|list| {
            list.split(',')
                .filter(|w| !w.is_empty())
                .map(str::to_lowercase)
                .collect::<HashSet<_>>()
        });
        Self {
            include: include.filter(|m| !m.is_empty()),
            exclude: exclude.filter(|s| !s.is_empty()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_none() && self.exclude.is_none()
    }

    pub fn apply(&self, value: Value) -> Value {
        let value = cut(value, self.include.as_ref(), self.exclude.as_ref());
        match &self.exclude {
            Some(exclude) if self.include.is_some() => cut(value, None, Some(exclude)),
            _ => value,
        }
    }
}

fn cut(value: Value, include: Option<&HashMap<String, bool>>, exclude: Option<&HashSet<String>>) -> Value {
    if include.is_none() && exclude.is_none() {
        return value;
    }
    match value {
        Value::Map(map) => Value::Map(
            map.into_iter()
                .filter_map(|(k, v)| {
                    let lower = k.to_lowercase();
                    if exclude.is_some_and(|ex| ex.contains(&lower)) {
                        return None;
                    }
                    match include {
                        None => Some((k, cut(v, include, exclude))),
                        Some(inc) => match inc.get(&lower) {
                            None => None,
                            Some(true) => Some((k, v)),
                            Some(false) => Some((k, cut(v, include, exclude))),
                        },
                    }
                })
                .collect(),
        ),
        Value::List(items) => Value::List(
            items
                .into_iter()
                .map(|item| match item {
                    Value::Map(_) | Value::List(_) => cut(item, include, exclude),
                    scalar => scalar,
                })
                .collect(),
        ),
        other => other,
    }
}

/// Cut every sequence longer than `rows`, noting each cut as
/// `# <path>[] <old> -> <rows>`.
pub fn shrink(value: Value, rows: usize, notices: &mut Vec<String>) -> Value {
    shrink_at(value, rows, "_", notices)
}

fn shrink_at(value: Value, rows: usize, path: &str, notices: &mut Vec<String>) -> Value {
    match value {
        Value::Map(map) => Value::Map(
            map.into_iter()
                .map(|(k, v)| {
                    let child = shrink_at(v, rows, &format!("{path}.{k}"), notices);
                    (k, child)
                })
                .collect(),
        ),
        Value::List(mut items) => {
            if items.len() > rows {
                notices.push(format!("# {path}[] {} -> {rows}", items.len()));
                items.truncate(rows);
            }
            Value::List(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| shrink_at(item, rows, &format!("{path}[{i}]"), notices))
                    .collect(),
            )
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn json(text: &str) -> Value {
        Value::from(serde_json::from_str::<serde_json::Value>(text).unwrap())
    }

    #[test]
    fn empty_filter_keeps_everything() {
        let filter = KeyFilter::new(Some(","), None);
        assert!(filter.is_empty());
        let value = json(r#"{"a": 1}"#);
        assert_eq!(filter.apply(value.clone()), value);
    }

    #[test]
    fn inclusion_is_case_insensitive_and_recursive() {
        let filter = KeyFilter::new(Some("Items,NAME"), None);
        let value = json(r#"{"items": [{"name": "a", "id": 1}], "other": 2}"#);
        assert_eq!(filter.apply(value), json(r#"{"items": [{"name": "a"}]}"#));
    }

    #[test]
    fn marked_keys_keep_their_subtree() {
        let filter = KeyFilter::new(Some("meta*"), None);
        let value = json(r#"{"meta": {"x": 1, "y": {"z": 2}}, "data": 3}"#);
        assert_eq!(filter.apply(value), json(r#"{"meta": {"x": 1, "y": {"z": 2}}}"#));
    }

    #[test]
    fn exclusion_applies_everywhere_after_inclusion() {
        let filter = KeyFilter::new(Some("meta+"), Some("secret"));
        let value = json(r#"{"meta": {"secret": 1, "ok": 2}}"#);
        assert_eq!(filter.apply(value), json(r#"{"meta": {"ok": 2}}"#));

        let filter = KeyFilter::new(None, Some("Secret"));
        let value = json(r#"[{"secret": 1, "deep": {"SECRET": 2, "keep": 3}}]"#);
        assert_eq!(filter.apply(value), json(r#"[{"deep": {"keep": 3}}]"#));
    }

    #[test]
    fn shrink_reports_each_cut() {
        let mut notices = Vec::new();
        let value = json(r#"{"a": [[1, 2, 3], [4], 5], "b": [1]}"#);
        let shrunk = shrink(value, 2, &mut notices);
        assert_eq!(shrunk, json(r#"{"a": [[1, 2], [4]], "b": [1]}"#));
        assert_eq!(notices, vec!["# _.a[] 3 -> 2", "# _.a[0][] 3 -> 2"]);
    }
}
