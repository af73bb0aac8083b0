//! Turning a query result into the text shown to the user.

use tracing::warn;

use crate::filter::{KeyFilter, shrink};
use crate::formats::json_string;
use crate::helpers::rawstr;
use crate::value::Value;

/// Display options from the command line and REPL toggles.
#[derive(Debug, Clone)]
pub struct DisplayConfig {
    /// Maximum sequence length shown at any depth.
    pub rows: usize,
    pub keys: KeyFilter,
    /// No colour.
    pub plain: bool,
    /// One-line JSON instead of two-space indentation.
    pub compact: bool,
    /// `path=value` lines instead of JSON.
    pub raw: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            rows: 1 << 30,
            keys: KeyFilter::default(),
            plain: false,
            compact: false,
            raw: false,
        }
    }
}

/// Rendered result text, tagged with how it was produced so the front end
/// knows whether to colour it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
    /// A string result, shown as-is.
    Text(String),
    Json(String),
    Raw(String),
}

impl Rendered {
    pub fn text(&self) -> &str {
        match self {
            Rendered::Text(s) | Rendered::Json(s) | Rendered::Raw(s) => s,
        }
    }
}

/// Render `value`. `None` results are not shown. Row cuts are described in
/// `notices`.
pub fn render(value: Value, config: &DisplayConfig, notices: &mut Vec<String>) -> Option<Rendered> {
    match value {
        Value::None => None,
        Value::Str(s) => Some(Rendered::Text(s)),
        other => {
            let shown = shrink(config.keys.apply(other), config.rows, notices);
            if config.raw {
                let text = rawstr(&shown, "_");
                return Some(Rendered::Raw(text.trim_end_matches('\n').to_string()));
            }
            let indent = if config.compact { None } else { Some(2) };
            match json_string(&shown, indent, false) {
                Ok(text) => Some(Rendered::Json(text)),
                Err(err) => {
                    warn!(%err, "result is not JSON encodable");
                    Some(Rendered::Text(shown.repr()))
                }
            }
        }
    }
}
