//! Methods on strings, lists and dicts.

use super::builtins::{self, Args};
use super::error::{EvalError, EvalResult};
use super::eval::Interpreter;
use super::ops;
use super::strformat;
use crate::value::Value;

const STR_METHODS: &[&str] = &[
    "capitalize", "count", "endswith", "find", "format", "isalpha", "isdigit", "join", "lower",
    "lstrip", "replace", "rstrip", "split", "splitlines", "startswith", "strip", "title", "upper",
];
const LIST_METHODS: &[&str] = &["copy", "count", "index"];
const LIST_MUTATORS: &[&str] = &[
    "append", "clear", "extend", "insert", "pop", "remove", "reverse", "sort",
];
const MAP_METHODS: &[&str] = &["copy", "get", "items", "keys", "values"];
const MAP_MUTATORS: &[&str] = &["clear", "pop", "setdefault", "update"];

pub(crate) fn has_method(value: &Value, name: &str) -> bool {
    match value {
        Value::Str(_) => STR_METHODS.contains(&name),
        Value::List(_) => LIST_METHODS.contains(&name) || LIST_MUTATORS.contains(&name),
        Value::Map(_) => MAP_METHODS.contains(&name) || MAP_MUTATORS.contains(&name),
        _ => false,
    }
}

/// Whether calling `name` changes the receiver.
pub(crate) fn is_mutating(value: &Value, name: &str) -> bool {
    match value {
        Value::List(_) => LIST_MUTATORS.contains(&name),
        Value::Map(_) => MAP_MUTATORS.contains(&name),
        _ => false,
    }
}

/// Call a method that leaves its receiver untouched.
pub(crate) fn call(receiver: &Value, name: &str, mut args: Args) -> EvalResult<Value> {
    let result = match receiver {
        Value::Str(s) => str_method(s, name, &mut args)?,
        Value::List(items) => match name {
            "copy" => Value::List(items.clone()),
            "count" => {
                let x = args.required(0, "x")?;
                Value::Int(items.iter().filter(|item| **item == x).count() as i64)
            }
            "index" => {
                let x = args.required(0, "x")?;
                let i = items
                    .iter()
                    .position(|item| *item == x)
                    .ok_or_else(|| EvalError::value_error(format!("{} is not in list", x.repr())))?;
                Value::Int(i as i64)
            }
            _ => return Err(unknown(receiver, name)),
        },
        Value::Map(map) => match name {
            "copy" => Value::Map(map.clone()),
            "keys" => Value::List(map.keys().cloned().map(Value::Str).collect()),
            "values" => Value::List(map.values().cloned().collect()),
            "items" => Value::List(
                map.iter()
                    .map(|(k, v)| Value::List(vec![Value::Str(k.clone()), v.clone()]))
                    .collect(),
            ),
            "get" => {
                let key = ops::map_key(&args.required(0, "key")?)?;
                let default = args.optional(1, "default").unwrap_or_default();
                map.get(&key).cloned().unwrap_or(default)
            }
            _ => return Err(unknown(receiver, name)),
        },
        other => return Err(unknown(other, name)),
    };
    args.finish()?;
    Ok(result)
}

/// Call a method that may change its receiver.
pub(crate) fn call_mut(
    interp: &mut Interpreter,
    receiver: &mut Value,
    name: &str,
    mut args: Args,
) -> EvalResult<Value> {
    let result = match receiver {
        Value::List(items) => match name {
            "append" => {
                items.push(args.required(0, "object")?);
                Value::None
            }
            "extend" => {
                items.extend(ops::iterate(args.required(0, "iterable")?)?);
                Value::None
            }
            "insert" => {
                let index = builtins::integer(&args.required(0, "index")?, "index")?;
                let object = args.required(1, "object")?;
                let len = items.len() as i64;
                let at = if index < 0 { (len + index).max(0) } else { index.min(len) };
                items.insert(at as usize, object);
                Value::None
            }
            "pop" => {
                if items.is_empty() {
                    return Err(EvalError::Index("pop from empty list".into()));
                }
                let index = match args.optional(0, "index") {
                    Some(i) => builtins::integer(&i, "index")?,
                    None => -1,
                };
                let len = items.len() as i64;
                let at = if index < 0 { len + index } else { index };
                if !(0..len).contains(&at) {
                    return Err(EvalError::Index("pop index out of range".into()));
                }
                items.remove(at as usize)
            }
            "remove" => {
                let x = args.required(0, "value")?;
                let i = items
                    .iter()
                    .position(|item| *item == x)
                    .ok_or_else(|| EvalError::value_error("list.remove(x): x not in list"))?;
                items.remove(i);
                Value::None
            }
            "sort" => {
                let key = args.keyword("key").filter(|k| !k.is_none());
                let reverse = args.keyword("reverse").is_some_and(|r| r.is_truthy());
                let sorted = builtins::sort_values(interp, std::mem::take(items), key, reverse)?;
                *items = sorted;
                Value::None
            }
            "reverse" => {
                items.reverse();
                Value::None
            }
            "clear" => {
                items.clear();
                Value::None
            }
            _ => return call(receiver, name, args),
        },
        Value::Map(map) => match name {
            "pop" => {
                let key = args.required(0, "key")?;
                let default = args.optional(1, "default");
                match map.shift_remove(&ops::map_key(&key)?) {
                    Some(value) => value,
                    None => default.ok_or_else(|| EvalError::Key(key.repr()))?,
                }
            }
            "setdefault" => {
                let key = ops::map_key(&args.required(0, "key")?)?;
                let default = args.optional(1, "default").unwrap_or_default();
                map.entry(key).or_insert(default).clone()
            }
            "update" => {
                if let Some(other) = args.optional(0, "other") {
                    match other {
                        Value::Map(other) => map.extend(other),
                        pairs => {
                            for pair in ops::iterate(pairs)? {
                                let [k, v]: [Value; 2] = ops::iterate(pair)?.try_into().map_err(
                                    |_| EvalError::value_error("dictionary update sequence element has wrong length"),
                                )?;
                                map.insert(ops::map_key(&k)?, v);
                            }
                        }
                    }
                }
                map.extend(args.take_keywords());
                Value::None
            }
            "clear" => {
                map.clear();
                Value::None
            }
            _ => return call(receiver, name, args),
        },
        other => return call(other, name, args),
    };
    args.finish()?;
    Ok(result)
}

fn unknown(value: &Value, name: &str) -> EvalError {
    EvalError::Attribute(format!("'{}' object has no attribute '{name}'", value.type_name()))
}

fn str_arg(args: &mut Args, pos: usize, name: &str) -> EvalResult<String> {
    builtins::string(&args.required(pos, name)?, name)
}

fn strip_chars(args: &mut Args) -> EvalResult<Option<Vec<char>>> {
    args.given(0, "chars")
        .map(|c| builtins::string(&c, "chars").map(|c| c.chars().collect()))
        .transpose()
}

/// Prefixes for `startswith`/`endswith`: one string or a list of them.
fn affixes(value: Value) -> EvalResult<Vec<String>> {
    match value {
        Value::Str(s) => Ok(vec![s]),
        Value::List(items) => items.iter().map(|v| builtins::string(v, "prefix")).collect(),
        other => Err(EvalError::type_error(format!(
            "startswith first arg must be str or a tuple of str, not {}",
            other.type_name()
        ))),
    }
}

fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_word = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}

fn split(s: &str, sep: Option<&str>, maxsplit: Option<usize>) -> EvalResult<Vec<Value>> {
    let parts: Vec<Value> = match (sep, maxsplit) {
        (Some(""), _) => return Err(EvalError::value_error("empty separator")),
        (Some(sep), Some(n)) => s.splitn(n + 1, sep).map(Value::from).collect(),
        (Some(sep), None) => s.split(sep).map(Value::from).collect(),
        (None, None) => s.split_whitespace().map(Value::from).collect(),
        (None, Some(n)) => {
            let mut parts = Vec::new();
            let mut rest = s.trim_start();
            while !rest.is_empty() && parts.len() < n {
                let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
                parts.push(Value::from(&rest[..end]));
                rest = rest[end..].trim_start();
            }
            if !rest.is_empty() {
                parts.push(Value::from(rest));
            }
            parts
        }
    };
    Ok(parts)
}

fn str_method(s: &str, name: &str, args: &mut Args) -> EvalResult<Value> {
    let value = match name {
        "lower" => Value::Str(s.to_lowercase()),
        "upper" => Value::Str(s.to_uppercase()),
        "strip" | "lstrip" | "rstrip" => {
            let chars = strip_chars(args)?;
            let matches = |c: char| match &chars {
                Some(set) => set.contains(&c),
                None => c.is_whitespace(),
            };
            Value::Str(
                match name {
                    "strip" => s.trim_matches(matches),
                    "lstrip" => s.trim_start_matches(matches),
                    _ => s.trim_end_matches(matches),
                }
                .to_string(),
            )
        }
        "split" => {
            let sep = args
                .given(0, "sep")
                .map(|v| builtins::string(&v, "sep"))
                .transpose()?;
            let maxsplit = match args.optional(1, "maxsplit") {
                Some(n) => usize::try_from(builtins::integer(&n, "maxsplit")?).ok(),
                None => None,
            };
            Value::List(split(s, sep.as_deref(), maxsplit)?)
        }
        "splitlines" => Value::List(s.lines().map(Value::from).collect()),
        "join" => {
            let parts = ops::iterate(args.required(0, "iterable")?)?
                .iter()
                .map(|v| match v {
                    Value::Str(part) => Ok(part.clone()),
                    other => Err(EvalError::type_error(format!(
                        "sequence item: expected str instance, {} found",
                        other.type_name()
                    ))),
                })
                .collect::<EvalResult<Vec<_>>>()?;
            Value::Str(parts.join(s))
        }
        "replace" => {
            let old = str_arg(args, 0, "old")?;
            let new = str_arg(args, 1, "new")?;
            let count = match args.optional(2, "count") {
                Some(c) => builtins::integer(&c, "count")?,
                None => -1,
            };
            Value::Str(match usize::try_from(count) {
                Ok(n) => s.replacen(&old, &new, n),
                Err(_) => s.replace(&old, &new),
            })
        }
        "startswith" => {
            let prefixes = affixes(args.required(0, "prefix")?)?;
            Value::Bool(prefixes.iter().any(|p| s.starts_with(p.as_str())))
        }
        "endswith" => {
            let suffixes = affixes(args.required(0, "suffix")?)?;
            Value::Bool(suffixes.iter().any(|p| s.ends_with(p.as_str())))
        }
        "find" => {
            let sub = str_arg(args, 0, "sub")?;
            Value::Int(
                s.find(&sub)
                    .map(|byte| s[..byte].chars().count() as i64)
                    .unwrap_or(-1),
            )
        }
        "count" => {
            let sub = str_arg(args, 0, "sub")?;
            let n = if sub.is_empty() {
                s.chars().count() + 1
            } else {
                s.matches(sub.as_str()).count()
            };
            Value::Int(n as i64)
        }
        "title" => Value::Str(title_case(s)),
        "capitalize" => {
            let mut chars = s.chars();
            Value::Str(match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            })
        }
        "isdigit" => Value::Bool(!s.is_empty() && s.chars().all(|c| c.is_ascii_digit())),
        "isalpha" => Value::Bool(!s.is_empty() && s.chars().all(char::is_alphabetic)),
        "format" => {
            let positional = args.rest(0);
            let keywords = args.take_keywords();
            Value::Str(strformat::format_template(s, &positional, &keywords)?)
        }
        _ => return Err(unknown(&Value::Str(String::new()), name)),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyIndex;
    use crate::value::Map;
    use rstest::rstest;
    use std::rc::Rc;

    fn eval(source: &str) -> Value {
        let mut interp = Interpreter::new(Value::Map(Map::new()), Rc::new(KeyIndex::default()));
        interp.eval_str(source).unwrap_or_else(|e| panic!("{source}: {e}"))
    }

    #[rstest]
    #[case("' a b '.strip()", r#""a b""#)]
    #[case("'xxaxx'.strip('x')", r#""a""#)]
    #[case("'a  b c'.split()", r#"["a","b","c"]"#)]
    #[case("'a b c'.split(None, 1)", r#"["a","b c"]"#)]
    #[case("'a,b,,c'.split(',')", r#"["a","b","","c"]"#)]
    #[case("'-'.join(['a', 'b'])", r#""a-b""#)]
    #[case("'aaa'.replace('a', 'b', 2)", r#""bba""#)]
    #[case("'hello'.startswith(['x', 'he'])", "true")]
    #[case("'héllo'.find('l')", "2")]
    #[case("'hello world'.title()", r#""Hello World""#)]
    #[case("'hELLO'.capitalize()", r#""Hello""#)]
    #[case("'{} is {age}'.format('bob', age=3)", r#""bob is 3""#)]
    #[case("[3, 1, 3].count(3)", "2")]
    #[case("[3, 1, 3].index(1)", "1")]
    #[case("{'a': 1}.get('b', 0)", "0")]
    #[case("{'a': 1, 'b': 2}.items()", r#"[["a",1],["b",2]]"#)]
    #[case("{'a': 1}.keys()", r#"["a"]"#)]
    fn method_calls(#[case] source: &str, #[case] expected: &str) {
        let expected = Value::from(serde_json::from_str::<serde_json::Value>(expected).unwrap());
        assert_eq!(eval(source), expected, "{source}");
    }

    #[test]
    fn mutators_change_local_values() {
        let mut interp = Interpreter::new(Value::None, Rc::new(KeyIndex::default()));
        interp
            .exec_str("l = [3, 1, 2]\nl.append(0)\nl.sort(reverse=True)\nlast = l.pop()\nd = {}\nd.update(a=1)\nseen = d.setdefault('b', 2)")
            .unwrap();
        assert_eq!(interp.eval_str("l").unwrap().repr(), "[3, 2, 1]");
        assert_eq!(interp.eval_str("last").unwrap(), Value::Int(0));
        assert_eq!(interp.eval_str("d").unwrap().repr(), "{'a': 1, 'b': 2}");
        assert_eq!(interp.eval_str("seen").unwrap(), Value::Int(2));
    }

    #[test]
    fn method_errors() {
        let mut interp = Interpreter::new(Value::None, Rc::new(KeyIndex::default()));
        assert_eq!(interp.eval_str("[].pop()").unwrap_err().to_string(), "IndexError: pop from empty list");
        assert_eq!(interp.eval_str("{}.pop('k')").unwrap_err().to_string(), "KeyError: 'k'");
        assert_eq!(
            interp.eval_str("'x'.nope()").unwrap_err().to_string(),
            "AttributeError: 'str' object has no attribute 'nope'"
        );
    }
}
