//! Compiling a multi-line query into a one-parameter function.
//!
//! Code that uses `return` cannot run as an expression or at top level, so
//! it becomes the body of a function whose parameter `_` is the document.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::interpreter::{EvalError, EvalResult, Interpreter};
use crate::report::{Level, Report};
use crate::value::Value;

/// Name the compiled function is bound to while it runs.
const ENTRY: &str = "__qic_main";

static RETURN_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\breturn\b").expect("return pattern is valid"));

fn starts_with_return(part: &str) -> bool {
    part.trim_start()
        .strip_prefix("return")
        .is_some_and(|rest| !rest.starts_with(|c: char| c.is_alphanumeric() || c == '_'))
}

/// Whether a query must be compiled as a function: some line, or some
/// `;`-separated part, starts with `return`, or the query spans several
/// lines and mentions `return` anywhere. Escaped `\n` counts as a newline.
pub fn wants_function(code: &str) -> bool {
    let code = code.replace("\\n", "\n");
    if code.lines().count() > 1 && mentions_return(&code) {
        return true;
    }
    code.lines().chain(code.split(';')).any(starts_with_return)
}

/// Looser check used by the REPL: `return` appears anywhere as a word.
pub fn mentions_return(code: &str) -> bool {
    RETURN_WORD.is_match(code)
}

/// Import statements followed by the function definition wrapping `body`.
pub fn compile_source(body: &str, imports: &[String], indent: usize) -> String {
    let pad = " ".repeat(indent.max(1));
    let mut source = String::new();
    for import in imports {
        source.push_str(import);
        source.push('\n');
    }
    source.push_str(&format!("def {ENTRY}(_):\n"));
    for line in body.lines() {
        source.push_str(&pad);
        source.push_str(line.trim_end());
        source.push('\n');
    }
    source
}

/// Compile `body`, call it on the live document and return the value it
/// returned. Changes made through `_` stay in the document.
pub fn run(
    interp: &mut Interpreter,
    body: &str,
    imports: &[String],
    indent: usize,
    report: &mut Report,
) -> EvalResult<Value> {
    let source = compile_source(body, imports, indent);
    report.debug(1, Level::Notice, "# code to compile :");
    report.debug(1, Level::Plain, source.trim_end());

    interp.exec_str(&source)?;
    let entry = interp
        .scope()
        .get(ENTRY)
        .cloned()
        .ok_or_else(|| EvalError::Name(ENTRY.to_string()))?;
    let result = interp.call_on_document(&entry);
    interp.scope.remove(ENTRY);
    debug!(ok = result.is_ok(), "compiled function finished");
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyIndex;
    use rstest::rstest;
    use std::rc::Rc;

    fn interpreter(json: serde_json::Value) -> Interpreter {
        let document = Value::from(json);
        let keys = Rc::new(KeyIndex::build(&document));
        Interpreter::new(document, keys)
    }

    #[rstest]
    #[case("return 1", true)]
    #[case("x = 1\n  return x", true)]
    #[case("x = 1; return x", true)]
    #[case("for x in a:\n    if x: return x", true)]
    #[case(r"x = 1\nreturn x", true)]
    #[case("returned = 1", false)]
    #[case("x = 'return'", false)]
    #[case("len(a)", false)]
    fn routing(#[case] code: &str, #[case] expected: bool) {
        assert_eq!(wants_function(code), expected);
    }

    #[test]
    fn mention_is_a_word_match() {
        assert!(mentions_return("if x: return 1"));
        assert!(!mentions_return("returns"));
    }

    #[test]
    fn source_layout() {
        let source = compile_source("x = 1  \nreturn x", &["import math".to_string()], 2);
        assert_eq!(source, "import math\ndef __qic_main(_):\n  x = 1\n  return x\n");
    }

    #[test]
    fn returns_value() {
        let mut interp = interpreter(serde_json::json!({"items": [1, 2, 3]}));
        let mut report = Report::new(0);
        let body = "total = 0\nfor i in _['items']:\n    total += i\nreturn total";
        let value = run(&mut interp, body, &[], 4, &mut report).unwrap();
        assert_eq!(value, Value::Int(6));
        assert!(!interp.scope().contains(ENTRY));
    }

    #[test]
    fn mutations_reach_the_document() {
        let mut interp = interpreter(serde_json::json!({"a": [1]}));
        let mut report = Report::new(0);
        let body = "_['z'] = 5\na.append(2)\nreturn len(_)";
        assert_eq!(run(&mut interp, body, &[], 4, &mut report).unwrap(), Value::Int(2));
        assert_eq!(interp.document(), &Value::from(serde_json::json!({"a": [1, 2], "z": 5})));
    }

    #[test]
    fn mutations_survive_a_failing_body() {
        let mut interp = interpreter(serde_json::json!({}));
        let mut report = Report::new(0);
        let body = "_['k'] = 1\nreturn missing";
        let err = run(&mut interp, body, &[], 4, &mut report).unwrap_err();
        assert!(matches!(err, EvalError::Name(_)));
        assert_eq!(interp.document(), &Value::from(serde_json::json!({"k": 1})));
    }

    #[test]
    fn missing_return_gives_none() {
        let mut interp = interpreter(serde_json::json!({}));
        let mut report = Report::new(0);
        assert_eq!(run(&mut interp, "x = 1", &[], 4, &mut report).unwrap(), Value::None);
    }

    #[test]
    fn syntax_error_is_returned() {
        let mut interp = interpreter(serde_json::json!({}));
        let mut report = Report::new(0);
        let err = run(&mut interp, "return (", &[], 4, &mut report).unwrap_err();
        assert!(matches!(err, EvalError::Syntax(_)));
    }

    #[test]
    fn source_is_shown_when_debugging() {
        let mut interp = interpreter(serde_json::json!({}));
        let mut report = Report::new(1);
        run(&mut interp, "return 1", &[], 4, &mut report).unwrap();
        assert_eq!(report.emissions().len(), 2);
    }
}
