//! `path.{k1,k2}` choice shorthand: a record of several fields of one path.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::DOT_PLACEHOLDER;
use crate::report::{Level, Report};

static CHOICE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"((?:\w|\.|\[|\]|\(|\))+?)\.\{(\S+?(?:,\S+?)*)\}").expect("choice pattern is valid")
});

/// Rewrite the first choice group. More than one brace group on the line is
/// refused with a warning and the text is returned unchanged.
pub(super) fn expand(code: &str, report: &mut Report) -> String {
    let Some(caps) = CHOICE.captures(code) else {
        return code.to_string();
    };
    if code.matches('{').count() > 1 {
        debug!(code, "nested choice refused");
        report.diagnostic(Level::Warning, "# recursive choices are not supported.");
        return code.to_string();
    }
    let (Some(whole), Some(base), Some(keys)) = (caps.get(0), caps.get(1), caps.get(2)) else {
        return code.to_string();
    };
    let fields: Vec<String> = keys
        .as_str()
        .split(',')
        .map(|key| {
            format!(
                "'{}':{}.{key}",
                key.replace('.', DOT_PLACEHOLDER),
                base.as_str()
            )
        })
        .collect();
    format!(
        "{}{{{}}}{}",
        &code[..whole.start()],
        fields.join(","),
        &code[whole.end()..]
    )
}
