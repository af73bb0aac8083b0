//! Shorthand expansion.
//!
//! Queries are written in a terse shorthand that is rewritten into plain
//! expression syntax before evaluation. Three stages run in a fixed order,
//! each a no-op when its trigger is absent:
//!
//! - **list**: `a[].b` maps over a sequence, `[ _q0.b for _q0 in a ]`
//! - **choice**: `user.{name,id}` builds a record from several fields
//! - **dot**: `a.b.c` becomes `a['b']['c']`, with keys resolved
//!   case-insensitively through the [`KeyIndex`] when unambiguous
//!
//! Rewriting is purely textual. Text inside string literals is left alone.

mod choice;
mod dot;
mod list;

use crate::keys::KeyIndex;
use crate::report::{Level, Report};

/// Stands in for `.` inside choice keys so the dot stage leaves them alone.
pub(crate) const DOT_PLACEHOLDER: &str = "__QIC_DOT__";

/// Answers whether a piece of code is already a resolvable reference.
///
/// The dot stage keeps a chain verbatim when it resolves on its own, such as
/// a variable bound in an earlier turn or an imported module attribute.
pub trait ReferenceProbe {
    fn resolves(&mut self, code: &str) -> bool;
}

impl<F: FnMut(&str) -> bool> ReferenceProbe for F {
    fn resolves(&mut self, code: &str) -> bool {
        self(code)
    }
}

/// A probe that resolves nothing, so every segment goes through the index.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProbe;

impl ReferenceProbe for NoProbe {
    fn resolves(&mut self, _code: &str) -> bool {
        false
    }
}

/// Runs the expansion stages over one query.
pub struct Expander<'a> {
    keys: &'a KeyIndex,
    probe: &'a mut dyn ReferenceProbe,
    dot_resolution: bool,
}

impl<'a> Expander<'a> {
    pub fn new(keys: &'a KeyIndex, probe: &'a mut dyn ReferenceProbe) -> Self {
        Self {
            keys,
            probe,
            dot_resolution: true,
        }
    }

    /// Skip the dot stage, as the REPL's `nodotkey` toggle does.
    pub fn dot_resolution(mut self, enabled: bool) -> Self {
        self.dot_resolution = enabled;
        self
    }

    pub fn expand(&mut self, code: &str, report: &mut Report) -> String {
        let listed = list::expand(code);
        log_stage(report, "list", code, &listed);

        let chosen = choice::expand(&listed, report);
        log_stage(report, "choice", &listed, &chosen);

        let dotted = if self.dot_resolution {
            let dotted = dot::expand(&chosen, self.keys, &mut *self.probe, report);
            log_stage(report, "dot", &chosen, &dotted);
            dotted
        } else {
            chosen
        };
        dotted.replace(DOT_PLACEHOLDER, ".")
    }
}

/// Expand with document keys only, without probing an environment.
pub fn expand(code: &str, keys: &KeyIndex, report: &mut Report) -> String {
    let mut probe = NoProbe;
    Expander::new(keys, &mut probe).expand(code, report)
}

fn log_stage(report: &mut Report, stage: &str, before: &str, after: &str) {
    if report.verbosity() > 2 {
        report.diagnostic(Level::Plain, format!("# [{stage:^6}] before = {before}"));
        report.diagnostic(Level::Plain, format!("# [{stage:^6}] after  = {after}"));
    }
}

/// For each byte of `code`, whether it lies inside a string literal
/// (quotes included).
pub(crate) fn string_mask(code: &str) -> Vec<bool> {
    let bytes = code.as_bytes();
    let mut mask = vec![false; bytes.len()];
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                mask[i] = true;
                if b == b'\\' && i + 1 < bytes.len() {
                    mask[i + 1] = true;
                    i += 1;
                } else if b == q {
                    quote = None;
                }
            }
            None if b == b'\'' || b == b'"' => {
                mask[i] = true;
                quote = Some(b);
            }
            None => {}
        }
        i += 1;
    }
    mask
}

/// Characters that make up a path: identifiers, `.` and the `+` escape.
pub(crate) fn is_path_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '.' | '+')
}
