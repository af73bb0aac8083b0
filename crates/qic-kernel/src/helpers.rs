//! Ambient helpers that are not tied to the interpreter.

use std::process::Command;

use tracing::debug;

use crate::value::Value;

/// Flatten nested sequences into one list. Non-sequences are kept whole.
pub fn flatten(value: Value) -> Vec<Value> {
    fn walk(value: Value, out: &mut Vec<Value>) {
        match value {
            Value::List(items) => items.into_iter().for_each(|item| walk(item, out)),
            other => out.push(other),
        }
    }
    let mut out = Vec::new();
    walk(value, &mut out);
    out
}

/// Render a value as `path=value` lines, one per scalar leaf.
///
/// Paths start at `last` and extend with `.key` for maps and `[i]` for
/// sequences. Strings are double-quoted with inner quotes escaped.
pub fn rawstr(value: &Value, last: &str) -> String {
    let mut out = String::new();
    write_raw(value, last, &mut out);
    out
}

fn write_raw(value: &Value, path: &str, out: &mut String) {
    let children: Vec<(String, &Value)> = match value {
        Value::Map(map) => map.iter().map(|(k, v)| (format!("{path}.{k}"), v)).collect(),
        Value::List(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| (format!("{path}[{i}]"), v))
            .collect(),
        _ => return,
    };
    for (child_path, child) in children {
        match child {
            Value::Map(_) | Value::List(_) => write_raw(child, &child_path, out),
            Value::Str(s) => {
                out.push_str(&format!("{child_path}=\"{}\"\n", s.replace('"', "\\\"")));
            }
            scalar => out.push_str(&format!("{child_path}={}\n", scalar.to_display_string())),
        }
    }
}

/// Run a command through `sh -c`, returning trimmed stdout and stderr.
pub fn run_shell(cmd: &str) -> std::io::Result<(String, String)> {
    debug!(cmd, "running shell command");
    let output = Command::new("sh").arg("-c").arg(cmd).output()?;
    let stdout = String::from_utf8_lossy(&output.stdout).trim_end().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).trim_end().to_string();
    Ok((stdout, stderr))
}
