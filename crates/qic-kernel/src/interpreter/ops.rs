//! Operators, comparisons and container access.
//!
//! Integer arithmetic is checked: overflow is an error rather than a wrap.
//! `//` and `%` floor toward negative infinity.

use std::cmp::Ordering;

use super::error::{EvalError, EvalResult};
use super::strformat;
use crate::ast::{BinaryOp, CmpOp, UnaryOp};
use crate::value::{format_float, Callable, Map, Value};

/// Sequences built by repetition are capped at this many elements.
pub(crate) const MAX_REPEAT: usize = 100_000_000;

#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

fn num(value: &Value) -> Option<Num> {
    match value {
        Value::Bool(b) => Some(Num::Int(i64::from(*b))),
        Value::Int(i) => Some(Num::Int(*i)),
        Value::Float(f) => Some(Num::Float(*f)),
        _ => None,
    }
}

fn as_float(n: Num) -> f64 {
    match n {
        Num::Int(i) => i as f64,
        Num::Float(f) => f,
    }
}

fn overflow() -> EvalError {
    EvalError::Overflow("integer overflow".to_string())
}

fn unsupported(op: BinaryOp, left: &Value, right: &Value) -> EvalError {
    EvalError::type_error(format!(
        "unsupported operand type(s) for {op}: '{}' and '{}'",
        left.type_name(),
        right.type_name()
    ))
}

/// Apply a binary arithmetic operator.
pub(crate) fn binary(op: BinaryOp, left: &Value, right: &Value) -> EvalResult<Value> {
    match (op, left, right) {
        (BinaryOp::Add, Value::Str(a), Value::Str(b)) => return Ok(Value::Str(format!("{a}{b}"))),
        (BinaryOp::Add, Value::List(a), Value::List(b)) => {
            let mut out = a.clone();
            out.extend(b.iter().cloned());
            return Ok(Value::List(out));
        }
        (BinaryOp::Mul, Value::Str(_) | Value::List(_), _) => return repeat(left, right),
        (BinaryOp::Mul, _, Value::Str(_) | Value::List(_)) => return repeat(right, left),
        (BinaryOp::Mod, Value::Str(fmt), args) => {
            return strformat::percent(fmt, args).map(Value::Str);
        }
        _ => {}
    }

    let (Some(a), Some(b)) = (num(left), num(right)) else {
        return Err(unsupported(op, left, right));
    };

    match (a, b) {
        (Num::Int(x), Num::Int(y)) => int_op(op, x, y),
        (x, y) => float_op(op, as_float(x), as_float(y)),
    }
}

fn int_op(op: BinaryOp, x: i64, y: i64) -> EvalResult<Value> {
    let result = match op {
        BinaryOp::Add => x.checked_add(y).ok_or_else(overflow)?,
        BinaryOp::Sub => x.checked_sub(y).ok_or_else(overflow)?,
        BinaryOp::Mul => x.checked_mul(y).ok_or_else(overflow)?,
        BinaryOp::Div => {
            if y == 0 {
                return Err(EvalError::ZeroDivision("division by zero".into()));
            }
            return Ok(Value::Float(x as f64 / y as f64));
        }
        BinaryOp::FloorDiv => {
            if y == 0 {
                return Err(EvalError::ZeroDivision("integer division or modulo by zero".into()));
            }
            let q = x.checked_div(y).ok_or_else(overflow)?;
            if x % y != 0 && ((x < 0) != (y < 0)) { q - 1 } else { q }
        }
        BinaryOp::Mod => {
            if y == 0 {
                return Err(EvalError::ZeroDivision("integer division or modulo by zero".into()));
            }
            let r = x.checked_rem(y).ok_or_else(overflow)?;
            if r != 0 && ((r < 0) != (y < 0)) { r + y } else { r }
        }
        BinaryOp::Pow => {
            if y < 0 {
                return Ok(Value::Float((x as f64).powf(y as f64)));
            }
            let exp = u32::try_from(y).map_err(|_| overflow())?;
            x.checked_pow(exp).ok_or_else(overflow)?
        }
    };
    Ok(Value::Int(result))
}

fn float_op(op: BinaryOp, x: f64, y: f64) -> EvalResult<Value> {
    let result = match op {
        BinaryOp::Add => x + y,
        BinaryOp::Sub => x - y,
        BinaryOp::Mul => x * y,
        BinaryOp::Div => {
            if y == 0.0 {
                return Err(EvalError::ZeroDivision("float division by zero".into()));
            }
            x / y
        }
        BinaryOp::FloorDiv => {
            if y == 0.0 {
                return Err(EvalError::ZeroDivision("float floor division by zero".into()));
            }
            (x / y).floor()
        }
        BinaryOp::Mod => {
            if y == 0.0 {
                return Err(EvalError::ZeroDivision("float modulo".into()));
            }
            let r = x % y;
            if r != 0.0 && ((r < 0.0) != (y < 0.0)) { r + y } else { r }
        }
        BinaryOp::Pow => x.powf(y),
    };
    Ok(Value::Float(result))
}

fn repeat(seq: &Value, count: &Value) -> EvalResult<Value> {
    let Some(Num::Int(n)) = num(count) else {
        return Err(EvalError::type_error(format!(
            "can't multiply sequence by non-int of type '{}'",
            count.type_name()
        )));
    };
    let n = usize::try_from(n).unwrap_or(0);
    let len = match seq {
        Value::Str(s) => s.len(),
        Value::List(items) => items.len(),
        _ => 0,
    };
    if len.saturating_mul(n) > MAX_REPEAT {
        return Err(EvalError::Overflow("repeated sequence is too large".into()));
    }
    match seq {
        Value::Str(s) => Ok(Value::Str(s.repeat(n))),
        Value::List(items) => Ok(Value::List(
            std::iter::repeat_n(items.iter(), n).flatten().cloned().collect(),
        )),
        other => Err(EvalError::type_error(format!(
            "can't multiply sequence of type '{}'",
            other.type_name()
        ))),
    }
}

/// Apply a unary operator.
pub(crate) fn unary(op: UnaryOp, operand: &Value) -> EvalResult<Value> {
    match (op, num(operand)) {
        (UnaryOp::Neg, Some(Num::Int(i))) => i.checked_neg().map(Value::Int).ok_or_else(overflow),
        (UnaryOp::Neg, Some(Num::Float(f))) => Ok(Value::Float(-f)),
        (UnaryOp::Pos, Some(Num::Int(i))) => Ok(Value::Int(i)),
        (UnaryOp::Pos, Some(Num::Float(f))) => Ok(Value::Float(f)),
        (op, None) => {
            let symbol = if op == UnaryOp::Neg { "-" } else { "+" };
            Err(EvalError::type_error(format!(
                "bad operand type for unary {symbol}: '{}'",
                operand.type_name()
            )))
        }
    }
}

/// Apply one link of a comparison chain.
pub(crate) fn compare(op: CmpOp, left: &Value, right: &Value) -> EvalResult<bool> {
    match op {
        CmpOp::Eq => Ok(left == right),
        CmpOp::NotEq => Ok(left != right),
        CmpOp::In => contains(right, left),
        CmpOp::NotIn => contains(right, left).map(|found| !found),
        CmpOp::Is => Ok(identical(left, right)),
        CmpOp::IsNot => Ok(!identical(left, right)),
        CmpOp::Lt | CmpOp::Gt | CmpOp::LtEq | CmpOp::GtEq => {
            // NaN compares false against everything.
            if let (Some(a), Some(b)) = (num(left), num(right))
                && as_float(a).partial_cmp(&as_float(b)).is_none()
            {
                return Ok(false);
            }
            let ord = order_for(op, left, right)?;
            Ok(match op {
                CmpOp::Lt => ord == Ordering::Less,
                CmpOp::Gt => ord == Ordering::Greater,
                CmpOp::LtEq => ord != Ordering::Greater,
                _ => ord != Ordering::Less,
            })
        }
    }
}

fn order_for(op: CmpOp, left: &Value, right: &Value) -> EvalResult<Ordering> {
    partial_order(left, right).map_err(|_| {
        EvalError::type_error(format!(
            "'{op}' not supported between instances of '{}' and '{}'",
            left.type_name(),
            right.type_name()
        ))
    })
}

/// Total order used by comparisons and sorting.
pub(crate) fn partial_order(left: &Value, right: &Value) -> EvalResult<Ordering> {
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
        (Value::List(a), Value::List(b)) => {
            for (x, y) in a.iter().zip(b) {
                let ord = partial_order(x, y)?;
                if ord != Ordering::Equal {
                    return Ok(ord);
                }
            }
            Ok(a.len().cmp(&b.len()))
        }
        _ => match (num(left), num(right)) {
            (Some(Num::Int(a)), Some(Num::Int(b))) => Ok(a.cmp(&b)),
            (Some(a), Some(b)) => Ok(as_float(a)
                .partial_cmp(&as_float(b))
                .unwrap_or(Ordering::Equal)),
            _ => Err(EvalError::type_error(format!(
                "'<' not supported between instances of '{}' and '{}'",
                left.type_name(),
                right.type_name()
            ))),
        },
    }
}

fn identical(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::None, Value::None) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Int(a), Value::Int(b)) => a == b,
        (Value::Str(a), Value::Str(b)) => a == b,
        (Value::Module(a), Value::Module(b)) => a == b,
        (Value::Func(_), Value::Func(_)) => left == right,
        _ => false,
    }
}

/// Membership test: `item in container`.
pub(crate) fn contains(container: &Value, item: &Value) -> EvalResult<bool> {
    match container {
        Value::Str(haystack) => match item {
            Value::Str(needle) => Ok(haystack.contains(needle.as_str())),
            other => Err(EvalError::type_error(format!(
                "'in <string>' requires string as left operand, not {}",
                other.type_name()
            ))),
        },
        Value::List(items) => Ok(items.contains(item)),
        Value::Map(map) => Ok(map.contains_key(map_key(item)?.as_str())),
        other => Err(EvalError::type_error(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

/// Convert a subscript value into a map key.
///
/// Scalars are stringified the way decoded YAML keys are, so `d[1]` finds
/// a key written as `1:` in the source document.
pub(crate) fn map_key(key: &Value) -> EvalResult<String> {
    match key {
        Value::Str(s) => Ok(s.clone()),
        Value::Int(i) => Ok(i.to_string()),
        Value::Float(f) => Ok(format_float(*f)),
        Value::Bool(b) => Ok(b.to_string()),
        Value::None => Ok("null".to_string()),
        other => Err(EvalError::type_error(format!("unhashable type: '{}'", other.type_name()))),
    }
}

fn map_get<'a>(map: &'a Map, key: &Value) -> EvalResult<&'a Value> {
    let found = match key {
        Value::Str(s) => map.get(s.as_str()),
        other => map.get(map_key(other)?.as_str()),
    };
    found.ok_or_else(|| EvalError::Key(key.repr()))
}

fn index_of(index: &Value, len: usize, container: &str) -> EvalResult<Option<usize>> {
    let Some(Num::Int(i)) = num(index) else {
        return Err(EvalError::type_error(format!(
            "{container} indices must be integers or slices, not {}",
            index.type_name()
        )));
    };
    let len = i64::try_from(len).unwrap_or(i64::MAX);
    let i = if i < 0 { i + len } else { i };
    Ok((0..len).contains(&i).then_some(i as usize))
}

/// Borrow a child of a map or list. Other values yield `None` and are
/// handled by [`subscript`].
pub(crate) fn child<'a>(object: &'a Value, index: &Value) -> EvalResult<Option<&'a Value>> {
    match object {
        Value::Map(map) => map_get(map, index).map(Some),
        Value::List(items) => match index_of(index, items.len(), "list")? {
            Some(i) => Ok(items.get(i)),
            None => Err(EvalError::Index("list index out of range".into())),
        },
        _ => Ok(None),
    }
}

/// Mutable access to a child of a map or list.
pub(crate) fn child_mut<'a>(object: &'a mut Value, index: &Value) -> EvalResult<&'a mut Value> {
    match object {
        Value::Map(map) => {
            let key = map_key(index)?;
            map.get_mut(key.as_str()).ok_or_else(|| EvalError::Key(index.repr()))
        }
        Value::List(items) => match index_of(index, items.len(), "list")? {
            Some(i) => items
                .get_mut(i)
                .ok_or_else(|| EvalError::Index("list index out of range".into())),
            None => Err(EvalError::Index("list index out of range".into())),
        },
        other => Err(not_subscriptable(other)),
    }
}

fn not_subscriptable(value: &Value) -> EvalError {
    EvalError::type_error(format!("'{}' object is not subscriptable", value.type_name()))
}

/// `object[index]` producing an owned value.
pub(crate) fn subscript(object: &Value, index: &Value) -> EvalResult<Value> {
    if let Some(found) = child(object, index)? {
        return Ok(found.clone());
    }
    match object {
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            match index_of(index, chars.len(), "string")? {
                Some(i) => Ok(Value::Str(chars[i].to_string())),
                None => Err(EvalError::Index("string index out of range".into())),
            }
        }
        other => Err(not_subscriptable(other)),
    }
}

/// `object[index] = value`.
pub(crate) fn set_item(object: &mut Value, index: Value, value: Value) -> EvalResult<()> {
    match object {
        Value::Map(map) => {
            map.insert(map_key(&index)?, value);
            Ok(())
        }
        Value::List(items) => match index_of(&index, items.len(), "list")? {
            Some(i) => {
                items[i] = value;
                Ok(())
            }
            None => Err(EvalError::Index("list assignment index out of range".into())),
        },
        other => Err(EvalError::type_error(format!(
            "'{}' object does not support item assignment",
            other.type_name()
        ))),
    }
}

/// `del object[index]`.
pub(crate) fn del_item(object: &mut Value, index: &Value) -> EvalResult<()> {
    match object {
        Value::Map(map) => map
            .shift_remove(map_key(index)?.as_str())
            .map(|_| ())
            .ok_or_else(|| EvalError::Key(index.repr())),
        Value::List(items) => match index_of(index, items.len(), "list")? {
            Some(i) => {
                items.remove(i);
                Ok(())
            }
            None => Err(EvalError::Index("list assignment index out of range".into())),
        },
        other => Err(EvalError::type_error(format!(
            "'{}' object doesn't support item deletion",
            other.type_name()
        ))),
    }
}

fn slice_bound(bound: Option<&Value>) -> EvalResult<Option<i64>> {
    match bound {
        None | Some(Value::None) => Ok(None),
        Some(value) => match num(value) {
            Some(Num::Int(i)) => Ok(Some(i)),
            _ => Err(EvalError::type_error(
                "slice indices must be integers or None",
            )),
        },
    }
}

/// Positions selected by `[start:stop:step]` on a sequence of `len` items.
fn slice_positions(len: usize, start: Option<i64>, stop: Option<i64>, step: i64) -> Vec<usize> {
    let len = i64::try_from(len).unwrap_or(i64::MAX);
    let normalize = |i: i64, low: i64, high: i64| {
        let i = if i < 0 { i + len } else { i };
        i.clamp(low, high)
    };
    let mut out = Vec::new();
    if step > 0 {
        let mut i = start.map_or(0, |s| normalize(s, 0, len));
        let stop = stop.map_or(len, |s| normalize(s, 0, len));
        while i < stop {
            out.push(i as usize);
            i += step;
        }
    } else {
        let mut i = start.map_or(len - 1, |s| normalize(s, -1, len - 1));
        let stop = stop.map_or(-1, |s| normalize(s, -1, len - 1));
        while i > stop {
            out.push(i as usize);
            i += step;
        }
    }
    out
}

/// `object[start:stop:step]` on lists and strings.
pub(crate) fn slice(
    object: &Value,
    start: Option<&Value>,
    stop: Option<&Value>,
    step: Option<&Value>,
) -> EvalResult<Value> {
    let step = slice_bound(step)?.unwrap_or(1);
    if step == 0 {
        return Err(EvalError::value_error("slice step cannot be zero"));
    }
    let (start, stop) = (slice_bound(start)?, slice_bound(stop)?);
    match object {
        Value::List(items) => Ok(Value::List(
            slice_positions(items.len(), start, stop, step)
                .into_iter()
                .map(|i| items[i].clone())
                .collect(),
        )),
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            Ok(Value::Str(
                slice_positions(chars.len(), start, stop, step)
                    .into_iter()
                    .map(|i| chars[i])
                    .collect(),
            ))
        }
        other => Err(not_subscriptable(other)),
    }
}

/// Items produced by iterating a value: list items, map keys or characters.
pub(crate) fn iterate(value: Value) -> EvalResult<Vec<Value>> {
    match value {
        Value::List(items) => Ok(items),
        Value::Map(map) => Ok(map.into_keys().map(Value::Str).collect()),
        Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string())).collect()),
        other => Err(EvalError::type_error(format!(
            "'{}' object is not iterable",
            other.type_name()
        ))),
    }
}

/// Whether a value is a method bound to a receiver.
pub(crate) fn is_bound_method(value: &Value) -> bool {
    matches!(value, Value::Func(c) if matches!(c.as_ref(), Callable::Method { .. }))
}
