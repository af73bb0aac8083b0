//! Choosing between expression and statement execution.
//!
//! Expanded code is first tried as a single expression so its value can be
//! displayed. Assignments, multi-line code and loops skip that attempt and
//! run as statements. Only when both fail is the error surfaced.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::interpreter::{EvalError, Interpreter};
use crate::report::{Level, Report};
use crate::value::Value;

static ASSIGNMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\w+\s*=[^=]").expect("assignment pattern is valid"));
static LOOP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(for|while)\s+").expect("loop pattern is valid"));

/// How a piece of code ended up being run.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Evaluated as an expression.
    Expression(Value),
    /// Executed as statements; there is no value.
    Statements,
    /// Both attempts failed.
    Failed {
        expression: Option<EvalError>,
        statements: EvalError,
    },
}

/// Whether the expression attempt is skipped for `code`.
pub fn skips_expression(code: &str) -> bool {
    ASSIGNMENT.is_match(code) || code.lines().count() > 1 || LOOP.is_match(code)
}

/// Run `code`, printed output going to `report`.
pub fn evaluate(interp: &mut Interpreter, code: &str, report: &mut Report) -> Outcome {
    let mut expression = None;
    if !skips_expression(code) {
        report.debug(2, Level::Notice, "# eval :");
        report.debug(2, Level::Plain, code);
        let mark = interp.output_len();
        match interp.eval_str(code) {
            Ok(value) => {
                report.print(interp.take_output());
                return Outcome::Expression(value);
            }
            Err(err) => {
                debug!(%err, "expression attempt failed");
                interp.truncate_output(mark);
                expression = Some(err);
            }
        }
    }

    report.debug(2, Level::Notice, "# exec :");
    report.debug(2, Level::Plain, code);
    let executed = interp.exec_str(code);
    report.print(interp.take_output());
    match executed {
        Ok(()) => Outcome::Statements,
        Err(statements) => {
            debug!(%statements, "statement attempt failed");
            Outcome::Failed {
                expression,
                statements,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyIndex;
    use rstest::rstest;
    use std::rc::Rc;

    fn interpreter() -> Interpreter {
        let document = Value::from(serde_json::json!({"a": [1, 2]}));
        let keys = Rc::new(KeyIndex::build(&document));
        Interpreter::new(document, keys)
    }

    #[rstest]
    #[case("x = 1", true)]
    #[case("x=1", true)]
    #[case("x == 1", false)]
    #[case("a\nb", true)]
    #[case("for i in a: print(i)", true)]
    #[case("while False: pass", true)]
    #[case("format(x)", false)]
    fn skip_rules(#[case] code: &str, #[case] skipped: bool) {
        assert_eq!(skips_expression(code), skipped);
    }

    #[test]
    fn expression_value_is_returned() {
        let mut interp = interpreter();
        let mut report = Report::new(0);
        assert_eq!(evaluate(&mut interp, "len(a)", &mut report), Outcome::Expression(Value::Int(2)));
    }

    #[test]
    fn statements_have_no_value() {
        let mut interp = interpreter();
        let mut report = Report::new(0);
        assert_eq!(evaluate(&mut interp, "x = len(a)", &mut report), Outcome::Statements);
        assert_eq!(evaluate(&mut interp, "x", &mut report), Outcome::Expression(Value::Int(2)));
    }

    #[test]
    fn semicolons_fall_back_to_statements() {
        let mut interp = interpreter();
        let mut report = Report::new(0);
        assert_eq!(evaluate(&mut interp, "y = 1; z = 2", &mut report), Outcome::Statements);
        assert_eq!(evaluate(&mut interp, "print(y + z); print('done')", &mut report), Outcome::Statements);
        assert_eq!(report.take(), vec![crate::report::Emission::Print("3\ndone\n".into())]);
    }

    #[test]
    fn both_failures_are_kept() {
        let mut interp = interpreter();
        let mut report = Report::new(0);
        let Outcome::Failed { expression, statements } = evaluate(&mut interp, "nope", &mut report) else {
            panic!("expected failure");
        };
        assert_eq!(expression, Some(EvalError::Name("nope".into())));
        assert_eq!(statements, EvalError::Name("nope".into()));
    }

    #[test]
    fn attempts_are_traced_at_level_two() {
        let mut interp = interpreter();
        let mut report = Report::new(2);
        evaluate(&mut interp, "len(a)", &mut report);
        assert_eq!(report.emissions().len(), 2);
    }
}
