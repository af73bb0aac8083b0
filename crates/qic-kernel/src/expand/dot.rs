//! Dotted path shorthand: `a.b.c` becomes `a['b']['c']`.
//!
//! Each segment after the first becomes a quoted subscript, spelled the
//! way the document spells it when the lowercase form matches exactly one
//! key. Ambiguous or unknown segments are used lowercased and never guessed.
//!
//! A `+` prefix (`a.+keys()`) or a final segment followed by `(` is kept as
//! an attribute. `{a.b}` is an escaped literal key: `x.{a.b}` is
//! `x['a.b']`.

use std::sync::LazyLock;

use regex::Regex;

use super::{ReferenceProbe, string_mask};
use crate::keys::{KeyIndex, KeyMatch};
use crate::report::{Level, Report};

static CHAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{(?:\w|\.)+\}|(?:\w+|\]|\))(?:\.\w+|\.\+\w+)+").expect("chain pattern is valid")
});

pub(super) fn expand(
    code: &str,
    keys: &KeyIndex,
    probe: &mut dyn ReferenceProbe,
    report: &mut Report,
) -> String {
    let mask = string_mask(code);
    let mut out = String::with_capacity(code.len() + 16);
    let mut last = 0;
    for found in CHAIN.find_iter(code) {
        out.push_str(&code[last..found.start()]);
        last = found.end();
        let chain = found.as_str();

        if mask[found.start()] {
            out.push_str(chain);
            continue;
        }
        if let Some(inner) = chain.strip_prefix('{').and_then(|c| c.strip_suffix('}')) {
            if out.ends_with('.') {
                out.pop();
                out.push_str(&format!("['{inner}']"));
            } else {
                out.push_str(inner);
            }
            continue;
        }
        let call_follows = code[found.end()..].starts_with('(');
        out.push_str(&rewrite(chain, call_follows, keys, probe, report));
    }
    out.push_str(&code[last..]);
    out
}

fn rewrite(
    chain: &str,
    call_follows: bool,
    keys: &KeyIndex,
    probe: &mut dyn ReferenceProbe,
    report: &mut Report,
) -> String {
    // numeric literals such as 1.5
    if chain.starts_with(|c: char| c.is_ascii_digit()) {
        return chain.to_string();
    }

    let words: Vec<&str> = chain.split('.').collect();
    let mut built = String::new();
    for (i, word) in words.iter().enumerate() {
        let is_last = i + 1 == words.len();
        if let Some(attr) = word.strip_prefix('+') {
            built.push('.');
            built.push_str(attr);
            continue;
        }
        if is_last && call_follows {
            built.push('.');
            built.push_str(word);
            continue;
        }

        let candidate = if built.is_empty() {
            word.to_string()
        } else {
            format!("{built}.{word}")
        };
        if probe.resolves(&candidate) {
            built = candidate;
            continue;
        }

        let key = resolve(word, keys, report);
        if built.is_empty() {
            built = key;
        } else {
            built.push_str(&format!("['{key}']"));
        }
    }
    built
}

fn resolve(word: &str, keys: &KeyIndex, report: &mut Report) -> String {
    match keys.resolve(word) {
        KeyMatch::Unique(spelling) => {
            if spelling != word {
                report.debug(1, Level::Notice, format!("# keyword replacement : {word} -> {spelling}"));
            }
            spelling.to_string()
        }
        KeyMatch::Ambiguous | KeyMatch::Missing => word.to_lowercase(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expand::NoProbe;
    use crate::report::Emission;
    use crate::value::Value;
    use rstest::rstest;

    fn index(json: &str) -> KeyIndex {
        KeyIndex::build(&Value::from(serde_json::from_str::<serde_json::Value>(json).unwrap()))
    }

    fn run(code: &str, json: &str) -> String {
        let keys = index(json);
        let mut report = Report::new(0);
        expand(code, &keys, &mut NoProbe, &mut report)
    }

    #[rstest]
    #[case("a.b.c", r#"{"a": {"b": {"c": 1}}}"#, "a['b']['c']")]
    #[case("_.user.NAME", r#"{"user": {"Name": "x"}}"#, "_['user']['Name']")]
    #[case("_.Name", r#"{"Name": 1, "name": 2}"#, "_['name']")]
    #[case("_.Missing", r#"{}"#, "_['missing']")]
    #[case("x[0].b", r#"{"b": 1}"#, "x[0]['b']")]
    #[case("f(x).b", r#"{"b": 1}"#, "f(x)['b']")]
    #[case("a.b.keys()", r#"{"b": 1}"#, "a['b'].keys()")]
    #[case("a.+items", r#"{"items": 1}"#, "a.items")]
    #[case("x = 1.5 + a.b", r#"{"b": 1}"#, "x = 1.5 + a['b']")]
    #[case("'a.b' + c.d", r#"{"d": 1}"#, "'a.b' + c['d']")]
    #[case("_.{a.b}", r#"{"a.b": 1}"#, "_['a.b']")]
    #[case("{a.b}", r#"{}"#, "a.b")]
    #[case("no dots here", r#"{}"#, "no dots here")]
    fn rewrites(#[case] code: &str, #[case] json: &str, #[case] expected: &str) {
        assert_eq!(run(code, json), expected);
    }

    #[test]
    fn case_substitution_is_reported_when_debugging() {
        let keys = index(r#"{"Name": 1}"#);
        let mut report = Report::new(1);
        assert_eq!(expand("_.name", &keys, &mut NoProbe, &mut report), "_['Name']");
        let Emission::Diagnostic(diag) = &report.emissions()[0] else {
            panic!("expected a diagnostic");
        };
        assert_eq!(diag.text, "# keyword replacement : name -> Name");
        assert_eq!(diag.level, Level::Notice);
    }

    #[test]
    fn probed_prefix_is_kept() {
        let keys = index(r#"{"row": {"id": 1}}"#);
        let mut report = Report::new(0);
        let mut probe = |code: &str| code == "row";
        assert_eq!(expand("row.ID", &keys, &mut probe, &mut report), "row['id']");
    }

    #[test]
    fn expansion_is_idempotent() {
        let once = run("a.b.c", r#"{"a": {"b": {"c": 1}}}"#);
        assert_eq!(run(&once, r#"{"a": {"b": {"c": 1}}}"#), once);
    }
}
