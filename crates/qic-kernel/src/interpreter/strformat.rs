//! `%` interpolation and `str.format`.
//!
//! Supports the common subset: `%s %r %d %i %f %%` with width and precision,
//! and `{}` / `{0}` / `{name}` fields with `!r`/`!s` conversions and a
//! `[[fill]align][width][.precision][type]` spec.

use super::error::{EvalError, EvalResult};
use super::ops::MAX_REPEAT;
use crate::value::Value;

/// `fmt % args`.
pub(crate) fn percent(fmt: &str, args: &Value) -> EvalResult<String> {
    let mut values: Vec<&Value> = match args {
        Value::List(items) => items.iter().collect(),
        other => vec![other],
    };
    values.reverse();

    let mut out = String::with_capacity(fmt.len());
    let mut chars = fmt.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let mut spec = String::new();
        while let Some(&next) = chars.peek() {
            if next.is_ascii_digit() || next == '.' || next == '-' {
                spec.push(next);
                chars.next();
            } else {
                break;
            }
        }
        let Some(conversion) = chars.next() else {
            return Err(EvalError::value_error("incomplete format"));
        };
        if conversion == '%' {
            out.push('%');
            continue;
        }
        let value = values
            .pop()
            .ok_or_else(|| EvalError::type_error("not enough arguments for format string"))?;
        let (left, spec) = match spec.strip_prefix('-') {
            Some(rest) => (true, rest.to_string()),
            None => (false, spec),
        };
        let (width, precision) = split_width(&spec)?;
        let text = match conversion {
            's' => value.to_display_string(),
            'r' => value.repr(),
            'd' | 'i' => integer(value)?.to_string(),
            'f' => format!("{:.*}", precision.unwrap_or(6), float(value)?),
            other => {
                return Err(EvalError::value_error(format!(
                    "unsupported format character '{other}'"
                )));
            }
        };
        let align = if left { '<' } else { '>' };
        out.push_str(&pad(&text, ' ', align, width));
    }
    if !values.is_empty() {
        return Err(EvalError::type_error(
            "not all arguments converted during string formatting",
        ));
    }
    Ok(out)
}

/// Width and precision of a spec, each capped like sequence repetition.
fn split_width(spec: &str) -> EvalResult<(usize, Option<usize>)> {
    let (width, precision) = match spec.split_once('.') {
        Some((w, p)) => (w, bounded(p)?),
        None => (spec, None),
    };
    Ok((bounded(width)?.unwrap_or(0), precision))
}

/// A run of digits as a size. Anything else is ignored.
fn bounded(digits: &str) -> EvalResult<Option<usize>> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(None);
    }
    let n: usize = digits
        .parse()
        .map_err(|_| EvalError::value_error("Too many decimal digits in format string"))?;
    if n > MAX_REPEAT {
        return Err(EvalError::Overflow("formatted width or precision is too large".into()));
    }
    Ok(Some(n))
}

fn integer(value: &Value) -> EvalResult<i64> {
    match value {
        Value::Float(f) => Ok(f.trunc() as i64),
        other => other.as_i64().ok_or_else(|| {
            EvalError::type_error(format!(
                "%d format: a real number is required, not {}",
                other.type_name()
            ))
        }),
    }
}

fn float(value: &Value) -> EvalResult<f64> {
    value.as_f64().ok_or_else(|| {
        EvalError::type_error(format!("must be real number, not {}", value.type_name()))
    })
}

fn pad(text: &str, fill: char, align: char, width: usize) -> String {
    let len = text.chars().count();
    if len >= width {
        return text.to_string();
    }
    let gap = width - len;
    let fill_n = |n: usize| std::iter::repeat_n(fill, n).collect::<String>();
    match align {
        '<' => format!("{text}{}", fill_n(gap)),
        '^' => format!("{}{text}{}", fill_n(gap / 2), fill_n(gap - gap / 2)),
        _ => format!("{}{text}", fill_n(gap)),
    }
}

/// Render one value according to a format spec.
pub(crate) fn format_value(value: &Value, spec: &str) -> EvalResult<String> {
    let mut chars: Vec<char> = spec.chars().collect();
    let (fill, align, consumed) = match chars.as_slice() {
        &[f, a, ..] if matches!(a, '<' | '>' | '^') => (f, Some(a), 2),
        &[a, ..] if matches!(a, '<' | '>' | '^') => (' ', Some(a), 1),
        _ => (' ', None, 0),
    };
    chars.drain(..consumed);
    let kind = match chars.last() {
        Some(c) if c.is_ascii_alphabetic() || *c == '%' => chars.pop(),
        _ => None,
    };
    let rest: String = chars.into_iter().collect();
    let (width, precision) = split_width(&rest)?;

    let numeric = value.as_f64().is_some() && !matches!(value, Value::Bool(_));
    let text = match kind {
        Some('d') => integer(value)?.to_string(),
        Some('f') => format!("{:.*}", precision.unwrap_or(6), float(value)?),
        Some('%') => format!("{:.*}%", precision.unwrap_or(6), float(value)? * 100.0),
        Some('s') | None => match (precision, numeric) {
            (Some(p), true) => format!("{:.*}", p, float(value)?),
            (Some(p), false) => value.to_display_string().chars().take(p).collect(),
            (None, _) => value.to_display_string(),
        },
        Some(other) => {
            return Err(EvalError::value_error(format!(
                "Unknown format code '{other}' for object of type '{}'",
                value.type_name()
            )));
        }
    };
    let align = align.unwrap_or(if numeric { '>' } else { '<' });
    Ok(pad(&text, fill, align, width))
}

/// `template.format(*args, **kwargs)`.
pub(crate) fn format_template(
    template: &str,
    args: &[Value],
    kwargs: &[(String, Value)],
) -> EvalResult<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    let mut auto = 0usize;
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut field = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(ch) => field.push(ch),
                        None => {
                            return Err(EvalError::value_error(
                                "expected '}' before end of string",
                            ));
                        }
                    }
                }
                let (name, spec) = field.split_once(':').unwrap_or((field.as_str(), ""));
                let (name, conversion) = match name.split_once('!') {
                    Some((n, conv)) => (n, Some(conv)),
                    None => (name, None),
                };
                let value = if name.is_empty() {
                    auto += 1;
                    args.get(auto - 1)
                } else if let Ok(i) = name.parse::<usize>() {
                    args.get(i)
                } else {
                    kwargs.iter().find(|(k, _)| k == name).map(|(_, v)| v)
                };
                let value = value.ok_or_else(|| {
                    if name.is_empty() || name.parse::<usize>().is_ok() {
                        EvalError::Index("Replacement index out of range for positional args tuple".into())
                    } else {
                        EvalError::Key(format!("'{name}'"))
                    }
                })?;
                let value = match conversion {
                    Some("r") => Value::Str(value.repr()),
                    Some("s") => Value::Str(value.to_display_string()),
                    _ => value.clone(),
                };
                out.push_str(&format_value(&value, spec)?);
            }
            '}' => return Err(EvalError::value_error("Single '}' encountered in format string")),
            other => out.push(other),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn percent_interpolation() {
        let args = Value::List(vec![Value::Str("a".into()), Value::Int(3), Value::Float(0.5)]);
        assert_eq!(percent("%s-%d-%.2f", &args).unwrap(), "a-3-0.50");
        assert_eq!(percent("100%%", &Value::List(vec![])).unwrap(), "100%");
        assert_eq!(percent("[%5s]", &Value::Str("ab".into())).unwrap(), "[   ab]");
        assert_eq!(percent("[%-4d]", &Value::Int(7)).unwrap(), "[7   ]");
    }

    #[test]
    fn percent_argument_count_is_checked() {
        assert!(percent("%s %s", &Value::Int(1)).is_err());
        assert!(percent("%s", &Value::List(vec![Value::Int(1), Value::Int(2)])).is_err());
    }

    #[test]
    fn template_fields() {
        let args = [Value::Str("x".into()), Value::Float(1.0 / 3.0)];
        let kwargs = [("name".to_string(), Value::Int(5))];
        assert_eq!(
            format_template("{} {:.3f} {name:>3} {0!r} {{}}", &args, &kwargs).unwrap(),
            "x 0.333   5 'x' {}"
        );
    }

    #[test]
    fn template_missing_field() {
        let err = format_template("{missing}", &[], &[]).unwrap_err();
        assert_eq!(err.to_string(), "KeyError: 'missing'");
    }

    #[rstest]
    #[case::percent_width(percent("%99999999999s", &Value::Int(1)))]
    #[case::percent_precision(percent("%.99999999999f", &Value::Float(1.0)))]
    #[case::format_width(format_template("{:>99999999999}", &[Value::Int(1)], &[]))]
    #[case::format_float_precision(format_template("{:.99999999999f}", &[Value::Float(1.0)], &[]))]
    #[case::format_str_precision(format_value(&Value::Str("ab".into()), ".99999999999"))]
    fn huge_widths_are_refused(#[case] result: EvalResult<String>) {
        assert!(matches!(result, Err(EvalError::Overflow(_))), "{result:?}");
    }

    #[test]
    fn unparsable_width_is_a_value_error() {
        let err = format_value(&Value::Int(1), "99999999999999999999999999").unwrap_err();
        assert!(matches!(err, EvalError::Value(_)));
    }

    #[test]
    fn fill_and_center() {
        assert_eq!(format_value(&Value::Str("ab".into()), "*^6").unwrap(), "**ab**");
        assert_eq!(format_value(&Value::Float(0.25), ".0%").unwrap(), "25%");
    }
}
