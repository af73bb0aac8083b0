//! Runtime values for qic.
//!
//! Documents decoded from JSON, YAML or XML and every intermediate result
//! of a query share one dynamically typed representation. Maps keep their
//! insertion order so that output mirrors the input document.

use std::fmt::{self, Write as _};
use std::rc::Rc;

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::ast::FunctionDef;

/// Insertion-ordered string-keyed map.
pub type Map = IndexMap<String, Value>;

/// A dynamically typed value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(Map),
    Func(Rc<Callable>),
    Module(Module),
}

/// Something that can be called with arguments.
#[derive(Debug, Clone)]
pub enum Callable {
    /// A builtin function, ambient helper or module function, by qualified name.
    Builtin(&'static str),
    /// A method bound to a copy of its receiver.
    Method { receiver: Value, name: String },
    /// A `def` or `lambda` function.
    User(Rc<FunctionDef>),
}

/// Whitelisted modules reachable through `import`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Module {
    Math,
    Re,
    Json,
}

impl Module {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "math" => Some(Module::Math),
            "re" => Some(Module::Re),
            "json" => Some(Module::Json),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Module::Math => "math",
            Module::Re => "re",
            Module::Json => "json",
        }
    }
}

impl Value {
    /// Python-style type name, used in error messages and `type()`.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Map(_) => "dict",
            Value::Func(c) => match c.as_ref() {
                Callable::Builtin(_) => "builtin_function_or_method",
                Callable::Method { .. } => "method",
                Callable::User(_) => "function",
            },
            Value::Module(_) => "module",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    /// Truthiness: empty containers, zero, "", None and False are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(map) => !map.is_empty(),
            Value::Func(_) | Value::Module(_) => true,
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self, Value::List(_) | Value::Map(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view used by arithmetic and comparisons. Bools count as ints.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Bool(b) => Some(i64::from(*b)),
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn builtin(name: &'static str) -> Self {
        Value::Func(Rc::new(Callable::Builtin(name)))
    }

    pub fn method(receiver: Value, name: impl Into<String>) -> Self {
        Value::Func(Rc::new(Callable::Method {
            receiver,
            name: name.into(),
        }))
    }

    /// The form `str()` produces: strings stay raw, everything else is repr.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            other => other.repr(),
        }
    }

    /// Python-like `repr()`.
    pub fn repr(&self) -> String {
        let mut out = String::new();
        self.write_repr(&mut out);
        out
    }

    fn write_repr(&self, out: &mut String) {
        match self {
            Value::None => out.push_str("None"),
            Value::Bool(true) => out.push_str("True"),
            Value::Bool(false) => out.push_str("False"),
            Value::Int(i) => {
                let _ = write!(out, "{i}");
            }
            Value::Float(f) => out.push_str(&format_float(*f)),
            Value::Str(s) => out.push_str(&quote_str(s)),
            Value::List(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.write_repr(out);
                }
                out.push(']');
            }
            Value::Map(map) => {
                out.push('{');
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(&quote_str(k));
                    out.push_str(": ");
                    v.write_repr(out);
                }
                out.push('}');
            }
            Value::Func(callable) => match callable.as_ref() {
                Callable::Builtin(name) => {
                    let _ = write!(out, "<built-in function {name}>");
                }
                Callable::Method { receiver, name } => {
                    let _ = write!(out, "<built-in method {name} of {} object>", receiver.type_name());
                }
                Callable::User(def) => {
                    let _ = write!(out, "<function {}>", def.name);
                }
            },
            Value::Module(m) => {
                let _ = write!(out, "<module '{}'>", m.name());
            }
        }
    }

    /// Deep copy with every map's keys sorted, for sorted-key encoders.
    pub fn sorted_keys(&self) -> Value {
        match self {
            Value::List(items) => Value::List(items.iter().map(Value::sorted_keys).collect()),
            Value::Map(map) => {
                let mut entries: Vec<(&String, &Value)> = map.iter().collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));
                Value::Map(
                    entries
                        .into_iter()
                        .map(|(k, v)| (k.clone(), v.sorted_keys()))
                        .collect(),
                )
            }
            other => other.clone(),
        }
    }
}

/// Float formatting close to Python's `repr(float)`.
pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        "nan".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { "inf".to_string() } else { "-inf".to_string() }
    } else if f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{f:.1}")
    } else {
        format!("{f}")
    }
}

/// Quote a string the way Python's repr does: single quotes unless the
/// text contains a single quote and no double quote.
pub fn quote_str(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len() && a.iter().all(|(k, v)| b.get(k) == Some(v))
            }
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Func(a), Value::Func(b)) => {
                Rc::ptr_eq(a, b)
                    || matches!((a.as_ref(), b.as_ref()), (Callable::Builtin(x), Callable::Builtin(y)) if x == y)
            }
            (Value::Module(a), Value::Module(b)) => a == b,
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display_string())
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::None => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Str(s) => serializer.serialize_str(s),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
            Value::Func(_) | Value::Module(_) => serializer.serialize_str(&self.repr()),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::None,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(obj) => {
                Value::Map(obj.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<serde_yaml::Value> for Value {
    fn from(yaml: serde_yaml::Value) -> Self {
        match yaml {
            serde_yaml::Value::Null => Value::None,
            serde_yaml::Value::Bool(b) => Value::Bool(b),
            serde_yaml::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_yaml::Value::String(s) => Value::Str(s),
            serde_yaml::Value::Sequence(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_yaml::Value::Mapping(mapping) => Value::Map(
                mapping
                    .into_iter()
                    .map(|(k, v)| (yaml_key(k), Value::from(v)))
                    .collect(),
            ),
            serde_yaml::Value::Tagged(tagged) => Value::from(tagged.value),
        }
    }
}

/// YAML allows non-string keys; they are stringified the way JSON encoders do.
fn yaml_key(key: serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s,
        serde_yaml::Value::Null => "null".to_string(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        other => Value::from(other).to_display_string(),
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness_follows_python() {
        assert!(!Value::None.is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(!Value::Str(String::new()).is_truthy());
        assert!(!Value::List(vec![]).is_truthy());
        assert!(Value::Str("x".into()).is_truthy());
        assert!(Value::Float(0.5).is_truthy());
    }

    #[test]
    fn repr_of_containers() {
        let mut map = Map::new();
        map.insert("a".into(), Value::List(vec![Value::Int(1), Value::Str("b".into())]));
        map.insert("c".into(), Value::None);
        assert_eq!(Value::Map(map).repr(), "{'a': [1, 'b'], 'c': None}");
        assert_eq!(Value::Float(2.0).repr(), "2.0");
        assert_eq!(Value::Str("it's".into()).repr(), "\"it's\"");
    }

    #[test]
    fn int_and_float_compare_equal() {
        assert_eq!(Value::Int(1), Value::Float(1.0));
        assert_eq!(Value::Bool(true), Value::Int(1));
        assert_ne!(Value::Str("1".into()), Value::Int(1));
    }

    #[test]
    fn json_conversion_keeps_order() {
        let json: serde_json::Value = serde_json::from_str(r#"{"z":1,"a":[true,null,1.5]}"#).unwrap();
        let value = Value::from(json);
        let Value::Map(map) = &value else { panic!("expected map") };
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["z", "a"]);
        assert_eq!(serde_json::to_string(&value).unwrap(), r#"{"z":1,"a":[true,null,1.5]}"#);
    }

    #[test]
    fn yaml_keys_are_stringified() {
        let yaml: serde_yaml::Value = serde_yaml::from_str("1: one\ntrue: yes").unwrap();
        let Value::Map(map) = Value::from(yaml) else { panic!("expected map") };
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["1", "true"]);
    }
}
