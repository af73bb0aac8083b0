//! The kernel: one loaded document, its key index and an environment that
//! persists across queries.
//!
//! Front ends hand query text to [`Kernel::run`] or [`Kernel::run_function`]
//! and drain the resulting [`Emission`]s with [`Kernel::take_emissions`].
//! Failures never escape as errors; they become warning diagnostics so an
//! interactive session can carry on.
//!
//! ```
//! use qic_kernel::{Kernel, KernelConfig, Value};
//! use qic_kernel::report::Emission;
//!
//! let document = Value::from(serde_json::json!({"user": {"Name": "ann", "id": 7}}));
//! let mut kernel = Kernel::new(document, KernelConfig::default()).unwrap();
//! kernel.run("user.name", true);
//! assert_eq!(kernel.take_emissions(), vec![Emission::Result(Value::from("ann"))]);
//! ```

use std::rc::Rc;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use crate::expand::Expander;
use crate::function;
use crate::interpreter::{EvalResult, Interpreter};
use crate::keys::KeyIndex;
use crate::report::{Emission, Level, Report};
use crate::strategy::{self, Outcome};
use crate::value::Value;

static HELPER_SHORTCUT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*_\w+\s*$").expect("helper shortcut pattern is valid"));

/// Configuration for a kernel instance.
#[derive(Debug, Clone)]
pub struct KernelConfig {
    /// Spaces used to indent function bodies.
    pub indent: usize,

    /// Modules made available before the first query, e.g. `math` or
    /// `from math import sqrt`.
    pub imports: Vec<String>,

    /// How much of the expansion and evaluation process is narrated.
    pub verbosity: u8,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            indent: 4,
            imports: Vec::new(),
            verbosity: 0,
        }
    }
}

impl KernelConfig {
    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }

    /// Set imports from a comma-separated list.
    pub fn with_imports(mut self, list: &str) -> Self {
        self.imports = list
            .split(',')
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .collect();
        self
    }

    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// One statement per import: `from` forms as written, others prefixed
    /// with `import`.
    pub fn import_statements(&self) -> Vec<String> {
        self.imports
            .iter()
            .map(|m| {
                if m.starts_with("from ") {
                    m.clone()
                } else {
                    format!("import {m}")
                }
            })
            .collect()
    }
}

/// A query session over one document.
pub struct Kernel {
    config: KernelConfig,
    interp: Interpreter,
    keys: Rc<KeyIndex>,
    report: Report,
}

impl Kernel {
    /// Index `document`, bind it to `_` and run the configured imports.
    pub fn new(document: Value, config: KernelConfig) -> EvalResult<Self> {
        let keys = Rc::new(KeyIndex::build(&document));
        let mut interp = Interpreter::new(document, Rc::clone(&keys));
        let imports = config.import_statements();
        if !imports.is_empty() {
            interp.exec_str(&imports.join("\n"))?;
        }
        info!(keys = keys.len(), imports = imports.len(), "kernel ready");

        let mut report = Report::new(config.verbosity);
        if report.verbosity() >= 2 {
            let collected: Vec<String> = keys
                .iter()
                .map(|(lowered, spellings)| {
                    let spellings: Vec<&str> = spellings.iter().map(String::as_str).collect();
                    format!("{lowered}: {}", spellings.join("|"))
                })
                .collect();
            report.diagnostic(Level::Notice, "# keys collected :");
            report.diagnostic(Level::Plain, collected.join(", "));
        }
        Ok(Self {
            config,
            interp,
            keys,
            report,
        })
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn keys(&self) -> &KeyIndex {
        &self.keys
    }

    pub fn document(&self) -> &Value {
        self.interp.document()
    }

    /// Names bound in the session, for completion.
    pub fn variables(&self) -> Vec<String> {
        self.interp
            .scope()
            .all_names()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Expand shorthand, keeping chains that already resolve in the session.
    pub fn expand(&mut self, code: &str, dot_resolution: bool) -> String {
        let interp = &mut self.interp;
        let mut probe = |candidate: &str| interp.probe(candidate);
        Expander::new(&self.keys, &mut probe)
            .dot_resolution(dot_resolution)
            .expand(code, &mut self.report)
    }

    /// Expand and run a query, as an expression if possible.
    pub fn run(&mut self, code: &str, dot_resolution: bool) {
        let code = code.replace("\\n", "\n");
        if code.trim().is_empty() {
            return;
        }
        let expanded = self.expand(&code, dot_resolution);
        self.report.debug(1, Level::Notice, "# run :");
        self.report.debug(1, Level::Plain, expanded.as_str());

        match strategy::evaluate(&mut self.interp, &expanded, &mut self.report) {
            Outcome::Expression(value) => self.report.result(value),
            Outcome::Statements => {}
            Outcome::Failed {
                expression,
                statements,
            } => {
                debug!(%statements, "query failed");
                self.report.diagnostic(Level::Warning, "# expanded code :");
                self.report.diagnostic(Level::Warning, expanded.as_str());
                if let Some(err) = expression {
                    self.report.debug(3, Level::Warning, format!("# as expression : {err}"));
                }
                self.report.diagnostic(Level::Warning, format!("# {statements}"));
            }
        }
    }

    /// Expand a query and run it as the body of a function of `_`.
    pub fn run_function(&mut self, code: &str, dot_resolution: bool) {
        let code = code.replace("\\n", "\n");
        let expanded = self.expand(&code, dot_resolution);
        let imports = self.config.import_statements();
        let result = function::run(
            &mut self.interp,
            &expanded,
            &imports,
            self.config.indent,
            &mut self.report,
        );
        self.report.print(self.interp.take_output());
        match result {
            Ok(value) => self.report.result(value),
            Err(err) => {
                debug!(%err, "compiled query failed");
                self.report.diagnostic(Level::Critical, format!("# {err}"));
            }
        }
    }

    /// Everything produced since the last call, in order.
    pub fn take_emissions(&mut self) -> Vec<Emission> {
        self.report.take()
    }
}

/// A bare helper name such as `_j` means "apply it to the document".
pub fn prepare_query(code: &str) -> String {
    if HELPER_SHORTCUT.is_match(code) {
        format!("{}(_)", code.trim())
    } else {
        code.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn kernel(json: serde_json::Value) -> Kernel {
        Kernel::new(Value::from(json), KernelConfig::default()).unwrap()
    }

    #[rstest]
    #[case("_j", "_j(_)")]
    #[case("  _flatlist ", "_flatlist(_)")]
    #[case("_j(x)", "_j(x)")]
    #[case("name", "name")]
    fn helper_shortcut(#[case] code: &str, #[case] expected: &str) {
        assert_eq!(prepare_query(code), expected);
    }

    #[test]
    fn import_statements() {
        let config = KernelConfig::default().with_imports("math, from re import sub,");
        assert_eq!(
            config.import_statements(),
            vec!["import math".to_string(), "from re import sub".to_string()]
        );
    }

    #[test]
    fn unknown_import_fails_construction() {
        let config = KernelConfig::default().with_imports("os");
        assert!(Kernel::new(Value::None, config).is_err());
    }

    #[test]
    fn bindings_persist_between_queries() {
        let mut k = kernel(serde_json::json!({"a": [1, 2, 3]}));
        k.run("n = len(a)", true);
        k.run("n * 2", true);
        assert_eq!(k.take_emissions(), vec![Emission::Result(Value::Int(6))]);
        assert!(k.variables().contains(&"n".to_string()));
    }

    #[test]
    fn escaped_newlines_become_lines() {
        let mut k = kernel(serde_json::json!({}));
        k.run(r"x = 1\ny = x + 1", true);
        k.run("y", true);
        assert_eq!(k.take_emissions(), vec![Emission::Result(Value::Int(2))]);
    }

    #[test]
    fn failure_reports_expanded_code() {
        let mut k = kernel(serde_json::json!({"a": {"b": 1}}));
        k.run("a.b + nope", true);
        let texts: Vec<String> = k
            .take_emissions()
            .into_iter()
            .map(|e| match e {
                Emission::Diagnostic(d) => {
                    assert_eq!(d.level, Level::Warning);
                    d.text
                }
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(
            texts,
            vec![
                "# expanded code :".to_string(),
                "a['b'] + nope".to_string(),
                "# NameError: name 'nope' is not defined".to_string(),
            ]
        );
    }

    #[test]
    fn session_variables_are_not_rewritten() {
        let mut k = kernel(serde_json::json!({"rows": [{"id": 1}]}));
        k.run("import math", true);
        k.run("math.floor(2.5)", true);
        assert_eq!(k.take_emissions(), vec![Emission::Result(Value::Int(2))]);
    }

    #[test]
    fn function_route_reports_errors() {
        let mut k = kernel(serde_json::json!({}));
        k.run_function("return nope", true);
        let emissions = k.take_emissions();
        assert_eq!(emissions.len(), 1);
        assert!(matches!(&emissions[0], Emission::Diagnostic(d) if d.level == Level::Critical));
    }

    #[test]
    fn function_route_changes_are_seen_by_later_queries() {
        let mut k = kernel(serde_json::json!({"a": [1]}));
        k.run_function("_['z'] = 5\nreturn 0", true);
        k.run("_", true);
        assert_eq!(
            k.take_emissions(),
            vec![
                Emission::Result(Value::Int(0)),
                Emission::Result(Value::from(serde_json::json!({"a": [1], "z": 5}))),
            ]
        );
    }
}
