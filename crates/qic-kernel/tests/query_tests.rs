//! End-to-end query tests: document text in, emissions out.

use qic_kernel::formats::decode;
use qic_kernel::function::wants_function;
use qic_kernel::{Emission, Format, Kernel, KernelConfig, Level, Value};
use rstest::rstest;

fn kernel(json: &str) -> Kernel {
    let document = decode(json, Format::Json).expect("valid JSON");
    Kernel::new(document, KernelConfig::default()).expect("kernel")
}

fn value(json: &str) -> Value {
    decode(json, Format::Json).expect("valid JSON")
}

/// Run one query and return its single result.
fn query(document: &str, code: &str) -> Value {
    let mut k = kernel(document);
    k.run(code, true);
    let emissions = k.take_emissions();
    match emissions.as_slice() {
        [Emission::Result(v)] => v.clone(),
        other => panic!("expected one result for {code:?}, got {other:?}"),
    }
}

// ============================================================================
// Shorthand
// ============================================================================

#[rstest]
#[case(r#"{"user":{"name":"Al","id":7}}"#, "user.{name,id}", r#"{"name":"Al","id":7}"#)]
#[case(r#"{"a":[{"b":1},{"b":2}]}"#, "a[].b", "[1, 2]")]
#[case(r#"{"Name":"x"}"#, "name", r#""x""#)]
#[case(r#"{"Name":"x","name":"y"}"#, "name", r#""y""#)]
#[case(r#"{"User":{"Profile":{"Age":3}}}"#, "user.profile.age", "3")]
#[case(r#"{"a":[{"b":[{"c":1},{"c":2}]},{"b":[{"c":3}]}]}"#, "a[].b[].c", "[[1, 2], [3]]")]
#[case(r#"{"users":[{"Name":"a","id":1},{"Name":"b","id":2}]}"#, "users[].{name,id}", r#"[{"name":"a","id":1},{"name":"b","id":2}]"#)]
#[case(r#"{"a":[3,1,2]}"#, "sorted(a)[-1]", "3")]
#[case(r#"{"a":{"b":1}}"#, "a.b + 1", "2")]
#[case(r#"{"items":[1,2,3]}"#, "[x * 2 for x in items if x > 1]", "[4, 6]")]
fn shorthand_queries(#[case] document: &str, #[case] code: &str, #[case] expected: &str) {
    assert_eq!(query(document, code), value(expected));
}

#[test]
fn ambiguous_key_without_literal_spelling_fails() {
    let mut k = kernel(r#"{"Name":"x","NAME":"y"}"#);
    k.run("_.name", true);
    let emissions = k.take_emissions();
    assert!(
        emissions
            .iter()
            .all(|e| matches!(e, Emission::Diagnostic(d) if d.level == Level::Warning))
    );
    assert!(matches!(
        emissions.last(),
        Some(Emission::Diagnostic(d)) if d.text.starts_with("# KeyError")
    ));
}

#[test]
fn dot_resolution_can_be_disabled() {
    let mut k = kernel(r#"{"a":{"b":1}}"#);
    k.run("a['b']", false);
    k.run("a.b", false);
    let emissions = k.take_emissions();
    assert_eq!(emissions[0], Emission::Result(Value::Int(1)));
    assert!(matches!(&emissions[1], Emission::Diagnostic(_)));
}

// ============================================================================
// Strategies
// ============================================================================

#[test]
fn statements_then_expression() {
    let mut k = kernel(r#"{"a":[1,2,3]}"#);
    k.run("total = 0", true);
    k.run(r"for x in a:\n    total += x", true);
    k.run("total", true);
    assert_eq!(k.take_emissions(), vec![Emission::Result(Value::Int(6))]);
}

#[test]
fn printed_output_comes_before_result() {
    let mut k = kernel(r#"{"a":1}"#);
    k.run("print('hi') or a", true);
    assert_eq!(
        k.take_emissions(),
        vec![Emission::Print("hi\n".into()), Emission::Result(Value::Int(1))]
    );
}

#[test]
fn multi_line_return_is_compiled() {
    let code = "out = []\nfor u in users:\n    if u.id > 1: out.append(u.name)\nreturn out";
    assert!(wants_function(code));

    let mut k = kernel(r#"{"users":[{"Name":"a","id":1},{"Name":"b","id":2}]}"#);
    k.run_function(code, true);
    assert_eq!(k.take_emissions(), vec![Emission::Result(value(r#"["b"]"#))]);
}

#[test]
fn compiled_functions_see_imports() {
    let config = KernelConfig::default().with_imports("math");
    let document = value(r#"{"r":2}"#);
    let mut k = Kernel::new(document, config).expect("kernel");
    k.run_function("return math.floor(math.pi * r)", true);
    assert_eq!(k.take_emissions(), vec![Emission::Result(Value::Int(6))]);
}

// ============================================================================
// Formats
// ============================================================================

#[test]
fn yaml_documents_are_queryable() {
    let document = decode("servers:\n  - Host: a\n  - Host: b\n", Format::Yaml).expect("yaml");
    let mut k = Kernel::new(document, KernelConfig::default()).expect("kernel");
    k.run("servers[].host", true);
    assert_eq!(k.take_emissions(), vec![Emission::Result(value(r#"["a","b"]"#))]);
}

#[test]
fn xml_documents_are_queryable() {
    let document = decode(r#"<cfg><item id="1">a</item><item id="2">b</item></cfg>"#, Format::Xml).expect("xml");
    let mut k = Kernel::new(document, KernelConfig::default()).expect("kernel");
    k.run("[i['@id'] for i in cfg.item]", true);
    k.run("cfg.item[0]['#text']", true);
    assert_eq!(
        k.take_emissions(),
        vec![
            Emission::Result(value(r#"["1","2"]"#)),
            Emission::Result(Value::from("a")),
        ]
    );
}
