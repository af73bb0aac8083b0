//! Builtin functions, ambient helpers and whitelisted module functions.
//!
//! Builtins are called by name. Module functions use a qualified name such
//! as `math.sqrt` and are only reachable through an imported module.

use std::cmp::Ordering;

use regex::Regex;

use super::error::{EvalError, EvalResult};
use super::eval::Interpreter;
use super::ops;
use crate::formats::{self, Format};
use crate::helpers;
use crate::table::{self, Table};
use crate::value::{Map, Module, Value};

/// Functions bound in every environment.
const BUILTINS: &[&str] = &[
    "abs", "all", "any", "bool", "dict", "enumerate", "filter", "float", "int", "len", "list",
    "map", "max", "min", "print", "range", "repr", "reversed", "round", "set", "sorted", "str",
    "sum", "type", "zip",
    // ambient helpers
    "_j", "_json", "_y", "_yaml", "_x", "_xml", "_l", "_fl", "_flatlist", "_t", "_pt", "_l2t",
    "_l2pt", "_rawstr", "_qx",
];

const MODULE_FUNCTIONS: &[&str] = &[
    "math.sqrt", "math.floor", "math.ceil", "math.log", "math.exp", "math.pow", "math.fabs",
    "re.search", "re.match", "re.findall", "re.sub", "re.split",
    "json.dumps", "json.loads",
];

/// Names of the ambient helpers, for completion.
pub fn helper_names() -> impl Iterator<Item = &'static str> {
    BUILTINS.iter().copied().filter(|name| name.starts_with('_'))
}

/// Largest list `range()` will build.
const MAX_RANGE: i128 = 10_000_000;

/// Resolve a builtin or helper name.
pub(crate) fn lookup(name: &str) -> Option<&'static str> {
    BUILTINS.iter().copied().find(|b| *b == name)
}

/// Qualified name of a module function.
pub(crate) fn module_function(module: Module, name: &str) -> EvalResult<&'static str> {
    if let Some(qualified) = MODULE_FUNCTIONS
        .iter()
        .copied()
        .find(|q| q.split_once('.') == Some((module.name(), name)))
    {
        return Ok(qualified);
    }
    match module_attr(module, name) {
        Some(value) => Err(EvalError::type_error(format!(
            "'{}' object is not callable",
            value.type_name()
        ))),
        None => Err(EvalError::Attribute(format!(
            "module '{}' has no attribute '{name}'",
            module.name()
        ))),
    }
}

/// A module member: a constant or a function.
pub(crate) fn module_attr(module: Module, name: &str) -> Option<Value> {
    match (module, name) {
        (Module::Math, "pi") => Some(Value::Float(std::f64::consts::PI)),
        (Module::Math, "e") => Some(Value::Float(std::f64::consts::E)),
        _ => MODULE_FUNCTIONS
            .iter()
            .copied()
            .find(|q| q.split_once('.') == Some((module.name(), name)))
            .map(Value::builtin),
    }
}

/// Call arguments with positional slots that can be taken once.
#[derive(Debug)]
pub(crate) struct Args {
    func: String,
    positional: Vec<Option<Value>>,
    keywords: Vec<(String, Value)>,
}

impl Args {
    pub(crate) fn new(func: &str, positional: Vec<Value>, keywords: Vec<(String, Value)>) -> Self {
        Self {
            func: func.rsplit('.').next().unwrap_or(func).to_string(),
            positional: positional.into_iter().map(Some).collect(),
            keywords,
        }
    }

    pub(crate) fn keyword(&mut self, name: &str) -> Option<Value> {
        let i = self.keywords.iter().position(|(k, _)| k == name)?;
        Some(self.keywords.remove(i).1)
    }

    /// Take an argument by position or keyword.
    pub(crate) fn optional(&mut self, pos: usize, name: &str) -> Option<Value> {
        self.positional
            .get_mut(pos)
            .and_then(Option::take)
            .or_else(|| self.keyword(name))
    }

    /// Like [`Args::optional`], treating an explicit `None` as absent.
    pub(crate) fn given(&mut self, pos: usize, name: &str) -> Option<Value> {
        self.optional(pos, name).filter(|v| !v.is_none())
    }

    pub(crate) fn required(&mut self, pos: usize, name: &str) -> EvalResult<Value> {
        self.optional(pos, name).ok_or_else(|| {
            EvalError::type_error(format!(
                "{}() missing required argument: '{name}'",
                self.func
            ))
        })
    }

    /// All positional arguments from `from` onwards.
    pub(crate) fn rest(&mut self, from: usize) -> Vec<Value> {
        self.positional
            .iter_mut()
            .skip(from)
            .filter_map(Option::take)
            .collect()
    }

    pub(crate) fn take_keywords(&mut self) -> Vec<(String, Value)> {
        std::mem::take(&mut self.keywords)
    }

    /// Fail on arguments nobody took.
    pub(crate) fn finish(self) -> EvalResult<()> {
        if let Some((name, _)) = self.keywords.first() {
            return Err(EvalError::type_error(format!(
                "{}() got an unexpected keyword argument '{name}'",
                self.func
            )));
        }
        if self.positional.iter().any(Option::is_some) {
            return Err(EvalError::type_error(format!(
                "{}() takes at most {} arguments ({} given)",
                self.func,
                self.positional.iter().filter(|v| v.is_none()).count(),
                self.positional.len()
            )));
        }
        Ok(())
    }
}

pub(crate) fn string(value: &Value, what: &str) -> EvalResult<String> {
    match value {
        Value::Str(s) => Ok(s.clone()),
        other => Err(EvalError::type_error(format!(
            "{what} must be str, not {}",
            other.type_name()
        ))),
    }
}

pub(crate) fn integer(value: &Value, what: &str) -> EvalResult<i64> {
    value.as_i64().ok_or_else(|| {
        EvalError::type_error(format!(
            "{what} must be an integer, not {}",
            value.type_name()
        ))
    })
}

fn number(value: &Value) -> EvalResult<f64> {
    value.as_f64().ok_or_else(|| {
        EvalError::type_error(format!("must be real number, not {}", value.type_name()))
    })
}

fn float_to_int(f: f64) -> EvalResult<i64> {
    if f.is_nan() {
        return Err(EvalError::value_error("cannot convert float NaN to integer"));
    }
    if f.is_infinite() || f.abs() >= 9.2e18 {
        return Err(EvalError::Overflow("cannot convert float to integer".into()));
    }
    Ok(f as i64)
}

fn string_list(value: Value, what: &str) -> EvalResult<Vec<String>> {
    ops::iterate(value)?
        .iter()
        .map(|v| string(v, what))
        .collect()
}

/// Sort values, optionally by a key function. Stable in both directions.
pub(crate) fn sort_values(
    interp: &mut Interpreter,
    items: Vec<Value>,
    key: Option<Value>,
    reverse: bool,
) -> EvalResult<Vec<Value>> {
    let mut keyed = Vec::with_capacity(items.len());
    for item in items {
        let sort_key = match &key {
            Some(f) => interp.call_value(f, vec![item.clone()], Vec::new())?,
            None => item.clone(),
        };
        keyed.push((sort_key, item));
    }

    let mut error = None;
    keyed.sort_by(|a, b| {
        let (x, y) = if reverse { (&b.0, &a.0) } else { (&a.0, &b.0) };
        ops::partial_order(x, y).unwrap_or_else(|e| {
            error.get_or_insert(e);
            Ordering::Equal
        })
    });
    match error {
        Some(e) => Err(e),
        None => Ok(keyed.into_iter().map(|(_, v)| v).collect()),
    }
}

fn extreme(interp: &mut Interpreter, args: &mut Args, want: Ordering, func: &str) -> EvalResult<Value> {
    let key = args.keyword("key").filter(|k| !k.is_none());
    let default = args.keyword("default");
    let mut rest = args.rest(0);
    let items = if rest.len() == 1 {
        ops::iterate(rest.remove(0))?
    } else {
        rest
    };

    let mut best: Option<(Value, Value)> = None;
    for item in items {
        let k = match &key {
            Some(f) => interp.call_value(f, vec![item.clone()], Vec::new())?,
            None => item.clone(),
        };
        let replace = match &best {
            None => true,
            Some((best_key, _)) => ops::partial_order(&k, best_key)? == want,
        };
        if replace {
            best = Some((k, item));
        }
    }
    match best {
        Some((_, value)) => Ok(value),
        None => default.ok_or_else(|| {
            EvalError::value_error(format!("{func}() arg is an empty sequence"))
        }),
    }
}

fn range(args: &mut Args) -> EvalResult<Value> {
    let bounds = args
        .rest(0)
        .iter()
        .map(|v| integer(v, "range() argument"))
        .collect::<EvalResult<Vec<_>>>()?;
    let (start, stop, step) = match bounds.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        _ => {
            return Err(EvalError::type_error(format!(
                "range expected 1 to 3 arguments, got {}",
                bounds.len()
            )));
        }
    };
    if step == 0 {
        return Err(EvalError::value_error("range() arg 3 must not be zero"));
    }
    let (start, stop, step) = (i128::from(start), i128::from(stop), i128::from(step));
    let count = if step > 0 {
        (stop - start + step - 1) / step
    } else {
        (start - stop - step - 1) / -step
    };
    if count > MAX_RANGE {
        return Err(EvalError::Overflow("range() result is too large".into()));
    }
    Ok(Value::List(
        (0..count.max(0))
            .map(|i| Value::Int((start + i * step) as i64))
            .collect(),
    ))
}

fn to_int(value: Option<Value>) -> EvalResult<Value> {
    match value {
        None => Ok(Value::Int(0)),
        Some(Value::Float(f)) => float_to_int(f.trunc()).map(Value::Int),
        Some(Value::Str(s)) => s.trim().parse::<i64>().map(Value::Int).map_err(|_| {
            EvalError::value_error(format!("invalid literal for int() with base 10: {}", Value::Str(s.clone()).repr()))
        }),
        Some(other) => other.as_i64().map(Value::Int).ok_or_else(|| {
            EvalError::type_error(format!(
                "int() argument must be a string or a number, not '{}'",
                other.type_name()
            ))
        }),
    }
}

fn to_float(value: Option<Value>) -> EvalResult<Value> {
    match value {
        None => Ok(Value::Float(0.0)),
        Some(Value::Str(s)) => s.trim().parse::<f64>().map(Value::Float).map_err(|_| {
            EvalError::value_error(format!("could not convert string to float: {}", Value::Str(s.clone()).repr()))
        }),
        Some(other) => other.as_f64().map(Value::Float).ok_or_else(|| {
            EvalError::type_error(format!(
                "float() argument must be a string or a number, not '{}'",
                other.type_name()
            ))
        }),
    }
}

fn to_dict(source: Option<Value>, keywords: Vec<(String, Value)>) -> EvalResult<Value> {
    let mut map = match source {
        None => Map::new(),
        Some(Value::Map(map)) => map,
        Some(other) => {
            let mut map = Map::new();
            for pair in ops::iterate(other)? {
                match ops::iterate(pair)?.as_slice() {
                    [k, v] => {
                        map.insert(ops::map_key(k)?, v.clone());
                    }
                    other => {
                        return Err(EvalError::value_error(format!(
                            "dictionary update sequence element has length {}; 2 is required",
                            other.len()
                        )));
                    }
                }
            }
            map
        }
    };
    map.extend(keywords);
    Ok(Value::Map(map))
}

fn type_of(value: &Value) -> Value {
    match value {
        Value::Bool(_) => Value::builtin("bool"),
        Value::Int(_) => Value::builtin("int"),
        Value::Float(_) => Value::builtin("float"),
        Value::Str(_) => Value::builtin("str"),
        Value::List(_) => Value::builtin("list"),
        Value::Map(_) => Value::builtin("dict"),
        other => Value::Str(format!("<class '{}'>", other.type_name())),
    }
}

fn round(value: &Value, digits: Option<i64>) -> EvalResult<Value> {
    match (value, digits) {
        (Value::Int(_) | Value::Bool(_), _) => Ok(Value::Int(integer(value, "round()")?)),
        (Value::Float(f), None) => float_to_int(f.round_ties_even()).map(Value::Int),
        (Value::Float(f), Some(n)) => Ok(Value::Float(round_float(*f, n))),
        (other, _) => Err(EvalError::type_error(format!(
            "type {} doesn't define __round__ method",
            other.type_name()
        ))),
    }
}

/// `f` rounded to `digits` decimal places. Past the range of `f64`
/// exponents the value is kept as is, or shrinks to a signed zero.
fn round_float(f: f64, digits: i64) -> f64 {
    if !f.is_finite() {
        return f;
    }
    // 10^±400 is outside f64 either way
    let digits = i32::try_from(digits.clamp(-400, 400)).unwrap_or(0);
    if digits >= 0 {
        let scale = 10f64.powi(digits);
        let scaled = f * scale;
        if !scaled.is_finite() {
            return f;
        }
        scaled.round_ties_even() / scale
    } else {
        let scale = 10f64.powi(-digits);
        if !scale.is_finite() {
            return 0.0 * f.signum();
        }
        (f / scale).round_ties_even() * scale
    }
}

fn compile_regex(pattern: &str) -> EvalResult<Regex> {
    Regex::new(pattern).map_err(|e| EvalError::value_error(format!("invalid pattern: {e}")))
}

/// Python replacement syntax (`\1`, `\g<name>`) to regex-crate syntax.
fn convert_replacement(repl: &str) -> String {
    let mut out = String::with_capacity(repl.len());
    let mut chars = repl.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '$' => out.push_str("$$"),
            '\\' => match chars.peek().copied() {
                Some(d) if d.is_ascii_digit() => {
                    let mut group = String::new();
                    while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                        group.push(d);
                        chars.next();
                    }
                    out.push_str(&format!("${{{group}}}"));
                }
                Some('g') => {
                    chars.next();
                    if chars.peek() == Some(&'<') {
                        chars.next();
                        let group: String = chars.by_ref().take_while(|&ch| ch != '>').collect();
                        out.push_str(&format!("${{{group}}}"));
                    } else {
                        out.push_str("\\g");
                    }
                }
                Some('n') => {
                    chars.next();
                    out.push('\n');
                }
                Some('t') => {
                    chars.next();
                    out.push('\t');
                }
                Some('\\') => {
                    chars.next();
                    out.push('\\');
                }
                _ => out.push('\\'),
            },
            other => out.push(other),
        }
    }
    out
}

fn call_regex(name: &str, args: &mut Args) -> EvalResult<Value> {
    let pattern = string(&args.required(0, "pattern")?, "pattern")?;
    match name {
        "re.search" | "re.match" => {
            let text = string(&args.required(1, "string")?, "string")?;
            let pattern = if name == "re.match" { format!("^(?:{pattern})") } else { pattern };
            let re = compile_regex(&pattern)?;
            Ok(re
                .find(&text)
                .map(|m| Value::Str(m.as_str().to_string()))
                .unwrap_or_default())
        }
        "re.findall" => {
            let text = string(&args.required(1, "string")?, "string")?;
            let re = compile_regex(&pattern)?;
            let groups = re.captures_len() - 1;
            let found = re
                .captures_iter(&text)
                .map(|caps| {
                    let group = |i: usize| {
                        Value::Str(caps.get(i).map(|m| m.as_str().to_string()).unwrap_or_default())
                    };
                    match groups {
                        0 => group(0),
                        1 => group(1),
                        n => Value::List((1..=n).map(group).collect()),
                    }
                })
                .collect();
            Ok(Value::List(found))
        }
        "re.sub" => {
            let repl = string(&args.required(1, "repl")?, "repl")?;
            let text = string(&args.required(2, "string")?, "string")?;
            let count = args.given(3, "count").map(|c| integer(&c, "count")).transpose()?;
            let re = compile_regex(&pattern)?;
            let limit = usize::try_from(count.unwrap_or(0)).unwrap_or(0);
            Ok(Value::Str(
                re.replacen(&text, limit, convert_replacement(&repl).as_str())
                    .into_owned(),
            ))
        }
        _ => {
            let text = string(&args.required(1, "string")?, "string")?;
            let maxsplit = args.given(2, "maxsplit").map(|c| integer(&c, "maxsplit")).transpose()?;
            let re = compile_regex(&pattern)?;
            let parts: Vec<Value> = match maxsplit.and_then(|n| usize::try_from(n).ok()).filter(|n| *n > 0) {
                Some(n) => re.splitn(&text, n + 1).map(Value::from).collect(),
                None => re.split(&text).map(Value::from).collect(),
            };
            Ok(Value::List(parts))
        }
    }
}

fn table_rows(data: Value) -> EvalResult<Vec<Vec<String>>> {
    ops::iterate(data)?
        .into_iter()
        .map(|row| {
            Ok(match row {
                Value::List(cells) => cells.iter().map(Value::to_display_string).collect(),
                Value::Map(map) => map.values().map(Value::to_display_string).collect(),
                scalar => vec![scalar.to_display_string()],
            })
        })
        .collect()
}

fn header_arg(args: &mut Args, pos: usize) -> EvalResult<Option<Vec<String>>> {
    args.given(pos, "header")
        .map(|h| string_list(h, "header"))
        .transpose()
}

fn width_arg(args: &mut Args, pos: usize) -> EvalResult<usize> {
    match args.given(pos, "maxcolwidth") {
        Some(w) => Ok(usize::try_from(integer(&w, "maxcolwidth")?).unwrap_or(0)),
        None => Ok(table::DEFAULT_MAX_WIDTH),
    }
}

fn encode(value: &Value, format: Format) -> EvalResult<Value> {
    formats::encode(value, format)
        .map(Value::Str)
        .map_err(|e| EvalError::value_error(e.to_string()))
}

/// Call a builtin, helper or module function by name.
pub(crate) fn call(interp: &mut Interpreter, name: &str, mut args: Args) -> EvalResult<Value> {
    let result = match name {
        "len" => match &args.required(0, "obj")? {
            Value::Str(s) => Value::Int(s.chars().count() as i64),
            Value::List(items) => Value::Int(items.len() as i64),
            Value::Map(map) => Value::Int(map.len() as i64),
            other => {
                return Err(EvalError::type_error(format!(
                    "object of type '{}' has no len()",
                    other.type_name()
                )));
            }
        },
        "str" => Value::Str(
            args.optional(0, "object")
                .map(|v| v.to_display_string())
                .unwrap_or_default(),
        ),
        "repr" => Value::Str(args.required(0, "obj")?.repr()),
        "int" => to_int(args.optional(0, "x"))?,
        "float" => to_float(args.optional(0, "x"))?,
        "bool" => Value::Bool(args.optional(0, "x").is_some_and(|v| v.is_truthy())),
        "list" => match args.optional(0, "iterable") {
            Some(v) => Value::List(ops::iterate(v)?),
            None => Value::List(Vec::new()),
        },
        "dict" => {
            let source = args.optional(0, "iterable");
            let keywords = args.take_keywords();
            to_dict(source, keywords)?
        }
        "set" => {
            let mut unique: Vec<Value> = Vec::new();
            if let Some(v) = args.optional(0, "iterable") {
                for item in ops::iterate(v)? {
                    if !unique.contains(&item) {
                        unique.push(item);
                    }
                }
            }
            Value::List(unique)
        }
        "type" => type_of(&args.required(0, "object")?),
        "sorted" => {
            let items = ops::iterate(args.required(0, "iterable")?)?;
            let key = args.keyword("key").filter(|k| !k.is_none());
            let reverse = args.keyword("reverse").is_some_and(|r| r.is_truthy());
            Value::List(sort_values(interp, items, key, reverse)?)
        }
        "reversed" => {
            let mut items = ops::iterate(args.required(0, "sequence")?)?;
            items.reverse();
            Value::List(items)
        }
        "sum" => {
            let items = ops::iterate(args.required(0, "iterable")?)?;
            let mut total = args.optional(1, "start").unwrap_or(Value::Int(0));
            for item in &items {
                total = ops::binary(crate::ast::BinaryOp::Add, &total, item)?;
            }
            total
        }
        "min" => extreme(interp, &mut args, Ordering::Less, "min")?,
        "max" => extreme(interp, &mut args, Ordering::Greater, "max")?,
        "abs" => match args.required(0, "x")? {
            Value::Float(f) => Value::Float(f.abs()),
            other => {
                let i = integer(&other, "abs() argument").map_err(|_| {
                    EvalError::type_error(format!("bad operand type for abs(): '{}'", other.type_name()))
                })?;
                Value::Int(i.checked_abs().ok_or_else(|| EvalError::Overflow("integer overflow".into()))?)
            }
        },
        "round" => {
            let value = args.required(0, "number")?;
            let digits = args.given(1, "ndigits").map(|d| integer(&d, "ndigits")).transpose()?;
            round(&value, digits)?
        }
        "range" => range(&mut args)?,
        "enumerate" => {
            let items = ops::iterate(args.required(0, "iterable")?)?;
            let start = match args.optional(1, "start") {
                Some(s) => integer(&s, "start")?,
                None => 0,
            };
            Value::List(
                items
                    .into_iter()
                    .zip(start..)
                    .map(|(item, i)| Value::List(vec![Value::Int(i), item]))
                    .collect(),
            )
        }
        "zip" => {
            let columns = args
                .rest(0)
                .into_iter()
                .map(ops::iterate)
                .collect::<EvalResult<Vec<_>>>()?;
            let len = columns.iter().map(Vec::len).min().unwrap_or(0);
            Value::List(
                (0..len)
                    .map(|i| Value::List(columns.iter().map(|c| c[i].clone()).collect()))
                    .collect(),
            )
        }
        "any" => Value::Bool(ops::iterate(args.required(0, "iterable")?)?.iter().any(Value::is_truthy)),
        "all" => Value::Bool(ops::iterate(args.required(0, "iterable")?)?.iter().all(Value::is_truthy)),
        "map" => {
            let func = args.required(0, "function")?;
            let columns = args
                .rest(1)
                .into_iter()
                .map(ops::iterate)
                .collect::<EvalResult<Vec<_>>>()?;
            let len = columns.iter().map(Vec::len).min().unwrap_or(0);
            let mut out = Vec::with_capacity(len);
            for i in 0..len {
                let call_args = columns.iter().map(|c| c[i].clone()).collect();
                out.push(interp.call_value(&func, call_args, Vec::new())?);
            }
            Value::List(out)
        }
        "filter" => {
            let func = args.required(0, "function")?;
            let items = ops::iterate(args.required(1, "iterable")?)?;
            let mut out = Vec::new();
            for item in items {
                let keep = if func.is_none() {
                    item.is_truthy()
                } else {
                    interp.call_value(&func, vec![item.clone()], Vec::new())?.is_truthy()
                };
                if keep {
                    out.push(item);
                }
            }
            Value::List(out)
        }
        "print" => {
            let sep = args.keyword("sep").filter(|v| !v.is_none()).map(|v| v.to_display_string());
            let end = args.keyword("end").filter(|v| !v.is_none()).map(|v| v.to_display_string());
            let line = args
                .rest(0)
                .iter()
                .map(Value::to_display_string)
                .collect::<Vec<_>>()
                .join(sep.as_deref().unwrap_or(" "));
            interp.write_output(&line);
            interp.write_output(end.as_deref().unwrap_or("\n"));
            Value::None
        }

        // ── ambient helpers ────────────────────────────────────────────
        "_j" | "_json" => encode(&args.required(0, "ds")?, Format::Json)?,
        "_y" | "_yaml" => encode(&args.required(0, "ds")?, Format::Yaml)?,
        "_x" | "_xml" => encode(&args.required(0, "ds")?, Format::Xml)?,
        "_l" => {
            let items = ops::iterate(args.required(0, "ds")?)?;
            let brk = match args.optional(1, "brk") {
                Some(b) => string(&b, "brk")?,
                None => "\n".to_string(),
            };
            Value::Str(
                items
                    .iter()
                    .map(Value::to_display_string)
                    .collect::<Vec<_>>()
                    .join(&brk),
            )
        }
        "_fl" | "_flatlist" => Value::List(helpers::flatten(args.required(0, "ds")?)),
        "_t" | "_pt" => {
            let rows = table_rows(args.optional(0, "data").unwrap_or(Value::List(Vec::new())))?;
            let header = header_arg(&mut args, 1)?;
            let data_only = args.optional(2, "dataonly").is_some_and(|v| v.is_truthy());
            let mut table = Table::new(rows).with_header(header).data_only(data_only);
            if name == "_t" {
                table = table.max_width(width_arg(&mut args, 3)?);
                Value::Str(table.render())
            } else {
                Value::Str(table.render_pivot())
            }
        }
        "_l2t" | "_l2pt" => {
            let records = ops::iterate(args.required(0, "xjson")?)?;
            let header = header_arg(&mut args, 1)?;
            let mut table = table::from_records(&records, header);
            if name == "_l2t" {
                table = table.max_width(width_arg(&mut args, 2)?);
                Value::Str(table.render())
            } else {
                Value::Str(table.render_pivot())
            }
        }
        "_rawstr" => {
            let value = args.required(0, "ds")?;
            let last = match args.optional(1, "last") {
                Some(l) => string(&l, "last")?,
                None => "_".to_string(),
            };
            Value::Str(helpers::rawstr(&value, &last))
        }
        "_qx" => {
            let cmd = string(&args.required(0, "cmd")?, "cmd")?;
            match helpers::run_shell(&cmd) {
                Ok((out, err)) => {
                    interp.write_output(&out);
                    interp.write_output("\n");
                    if !err.is_empty() {
                        interp.write_output(&err);
                        interp.write_output("\n");
                    }
                }
                Err(e) => interp.write_output(&format!("{cmd}: {e}\n")),
            }
            Value::None
        }

        // ── modules ────────────────────────────────────────────────────
        "math.sqrt" => {
            let x = number(&args.required(0, "x")?)?;
            if x < 0.0 {
                return Err(EvalError::value_error("math domain error"));
            }
            Value::Float(x.sqrt())
        }
        "math.floor" | "math.ceil" => match args.required(0, "x")? {
            Value::Float(f) => {
                let rounded = if name == "math.floor" { f.floor() } else { f.ceil() };
                Value::Int(float_to_int(rounded)?)
            }
            other => Value::Int(integer(&other, "x")?),
        },
        "math.log" => {
            let x = number(&args.required(0, "x")?)?;
            let base = args.given(1, "base").map(|b| number(&b)).transpose()?;
            if x <= 0.0 || base.is_some_and(|b| b <= 0.0 || b == 1.0) {
                return Err(EvalError::value_error("math domain error"));
            }
            Value::Float(match base {
                Some(b) => x.ln() / b.ln(),
                None => x.ln(),
            })
        }
        "math.exp" => Value::Float(number(&args.required(0, "x")?)?.exp()),
        "math.pow" => {
            let x = number(&args.required(0, "x")?)?;
            let y = number(&args.required(1, "y")?)?;
            Value::Float(x.powf(y))
        }
        "math.fabs" => Value::Float(number(&args.required(0, "x")?)?.abs()),
        "re.search" | "re.match" | "re.findall" | "re.sub" | "re.split" => call_regex(name, &mut args)?,
        "json.dumps" => {
            let value = args.required(0, "obj")?;
            let indent = args.given(1, "indent").map(|i| integer(&i, "indent")).transpose()?;
            let sort_keys = args.keyword("sort_keys").is_some_and(|v| v.is_truthy());
            let indent = indent.map(|i| usize::try_from(i).unwrap_or(0));
            Value::Str(
                formats::json_string(&value, indent, sort_keys)
                    .map_err(|e| EvalError::value_error(e.to_string()))?,
            )
        }
        "json.loads" => {
            let text = string(&args.required(0, "s")?, "s")?;
            formats::decode(&text, Format::Json).map_err(|e| EvalError::value_error(e.to_string()))?
        }
        other => return Err(EvalError::Name(other.to_string())),
    };
    args.finish()?;
    Ok(result)
}
