//! Tests for the `qic` binary in batch mode.

use std::io::Write;
use std::process::{Command, Output, Stdio};

use tempfile::NamedTempFile;

/// Run `qic` with `args`, feeding `stdin`.
fn qic(args: &[&str], stdin: &str) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_qic"))
        .args(args)
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("qic should start");
    if let Some(mut pipe) = child.stdin.take() {
        // qic may exit before reading, e.g. on a bad --srctype
        let _ = pipe.write_all(stdin.as_bytes());
    }
    child.wait_with_output().expect("qic should finish")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn temp_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(contents.as_bytes()).expect("write temp file");
    file
}

#[test]
fn default_query_prints_the_document() {
    let out = qic(&[], r#"{"b": 1, "a": [1, 2]}"#);
    assert!(out.status.success());
    assert_eq!(stdout(&out), "{\n  \"b\": 1,\n  \"a\": [\n    1,\n    2\n  ]\n}\n");
}

#[test]
fn list_shorthand() {
    let out = qic(&["-c", "a[].b"], r#"{"a": [{"b": 1}, {"b": 2}]}"#);
    assert_eq!(stdout(&out), "[1,2]\n");
}

#[test]
fn case_insensitive_keys() {
    let out = qic(&["name"], r#"{"Name": "x"}"#);
    assert_eq!(stdout(&out), "x\n");
    let out = qic(&["name"], r#"{"Name": "x", "name": "y"}"#);
    assert_eq!(stdout(&out), "y\n");
}

#[test]
fn document_from_file_in_yaml() {
    let doc = temp_file("servers:\n  - host: a\n    port: 1\n  - host: b\n    port: 2\n");
    let path = doc.path().to_str().expect("utf-8 path");
    let out = qic(&["-f", path, "-t", "yaml", "-c", "servers[].{host}"], "");
    assert!(out.status.success(), "{}", stderr(&out));
    assert_eq!(stdout(&out), r#"[{"host":"a"},{"host":"b"}]"#.to_string() + "\n");
}

#[test]
fn code_from_file_with_return() {
    let code = temp_file("total = 0\nfor x in a:\n    total += x\nreturn total\n");
    let path = code.path().to_str().expect("utf-8 path");
    let out = qic(&[path], r#"{"a": [1, 2, 3]}"#);
    assert_eq!(stdout(&out), "6\n");
}

#[test]
fn escaped_newlines_and_functionize() {
    let out = qic(&["-F", r"x = len(a)\nreturn x * 2"], r#"{"a": [1, 2]}"#);
    assert_eq!(stdout(&out), "4\n");
}

#[test]
fn key_filters_and_rows() {
    let doc = r#"{"keep": {"x": 1, "secret": 2}, "drop": 3, "list": [1, 2, 3]}"#;
    let out = qic(&["-c", "-K", "keep+,list", "-E", "secret", "-l", "2"], doc);
    assert_eq!(stdout(&out), r#"{"keep":{"x":1},"list":[1,2]}"#.to_string() + "\n");
    assert!(stderr(&out).contains("# _.list[] 3 -> 2"));
}

#[test]
fn raw_lines() {
    let out = qic(&["-s"], r#"{"a": {"b": "x"}, "c": [true]}"#);
    assert_eq!(stdout(&out), "_.a.b=\"x\"\n_.c[0]=True\n");
}

#[test]
fn ansi_codes_are_stripped_from_input() {
    let out = qic(&["a"], "\x1b[32m{\"a\": 1}\x1b[0m");
    assert_eq!(stdout(&out), "1\n");
}

#[test]
fn empty_input_is_an_empty_map() {
    let out = qic(&["len(_)"], "   \n");
    assert_eq!(stdout(&out), "0\n");
}

#[test]
fn malformed_input_fails() {
    let out = qic(&[], "{not json");
    assert!(!out.status.success());
    assert!(stderr(&out).contains("# invalid JSON/YAML/XML."));
}

#[test]
fn unsupported_type_fails() {
    let out = qic(&["-t", "toml"], "{}");
    assert!(!out.status.success());
    assert!(stderr(&out).contains("# unsupported file type."));
}

#[test]
fn query_failure_shows_expanded_code() {
    let out = qic(&["a.b + missing"], r#"{"a": {"b": 1}}"#);
    let err = stderr(&out);
    assert!(err.contains("# expanded code :"));
    assert!(err.contains("a['b'] + missing"));
    assert!(err.contains("# NameError: name 'missing' is not defined"));
    assert_eq!(stdout(&out), "");
}

#[test]
fn modules_are_imported() {
    let out = qic(&["-m", "math", "math.floor(math.sqrt(n))"], r#"{"n": 17}"#);
    assert_eq!(stdout(&out), "4\n");
}

#[test]
fn debug_shows_expanded_code() {
    let out = qic(&["-X", "a.b"], r#"{"a": {"B": 1}}"#);
    let err = stderr(&out);
    assert!(err.contains("# run :"));
    assert!(err.contains("a['B']"));
    assert!(err.contains("# keyword replacement : b -> B"));
}

#[test]
fn interactive_session_reads_stdin() {
    let doc = temp_file(r#"{"a": 1}"#);
    let path = doc.path().to_str().expect("utf-8 path");
    let out = qic(&["-f", path, "-I"], "a\nquit()\n");
    assert!(out.status.success());
    assert!(stdout(&out).contains("1\n"));
}

#[test]
fn interactive_reports_end_of_input() {
    let doc = temp_file(r#"{"a": 1}"#);
    let path = doc.path().to_str().expect("utf-8 path");
    let out = qic(&["-f", path, "-I"], "a + 1\n");
    assert!(out.status.success());
    assert!(stdout(&out).contains("2\n"));
    assert!(stderr(&out).contains("# IO Error. Pipeline input is not supported in interactive mode"));
}
