//! Specialization: compiled and interpreted evaluation must agree on every
//! expression, with the compiler silently degrading to interpretation
//! where it cannot specialize.

mod common;

use common::{engine, hash, root};
use ognav::{Engine, Value};

/// Evaluate interpreted, then compile against the same root and evaluate
/// again; both results must be equal.
fn both_modes(engine: &Engine, source: &str, root: &Value) -> Value {
    let interpreted = engine
        .parse(source)
        .unwrap_or_else(|e| panic!("parse '{source}': {e}"));
    let before = engine
        .get_value(&interpreted, root)
        .unwrap_or_else(|e| panic!("interpret '{source}': {e}"));

    engine.compile_expression(&interpreted, root);
    assert!(interpreted.is_compiled());
    let after = engine
        .get_value(&interpreted, root)
        .unwrap_or_else(|e| panic!("compiled '{source}': {e}"));

    assert_eq!(before, after, "modes diverged on '{source}'");
    after
}

#[test]
fn test_compiled_agrees_with_interpreted() {
    let engine = engine();
    let root = root();
    for source in [
        "count",
        "count + 1",
        "property.bean3.value",
        "property.bean3.value != null",
        "!'false'",
        "list[0]",
        "list[count - 2]",
        "list.length",
        "catalog.item[1]",
        "service.run(1)",
        "service.run(1.5)",
        "service.sum(1, 2, 3)",
        "service.exec(count)",
        "longChild.save(5)",
        "@Root@SIZE_STRING",
        "@MathUtil@max(3, 9)",
        "count == 3 && list[2] > 25",
        "count == 99 || 'fallback'",
        "count, list[1]",
        "-count",
        "property.count",
        "#root == #this",
    ] {
        both_modes(&engine, source, &root);
    }
}

#[test]
fn test_compiled_chain_null_comparison() {
    let engine = engine();
    let root = root();
    assert_eq!(
        both_modes(&engine, "property.bean3.value != null", &root),
        Value::Bool(true)
    );
}

#[test]
fn test_compiled_set_round_trips() {
    let engine = engine();
    let root = root();

    let expr = engine.parse("property.bean3.value").unwrap();
    engine.compile_expression(&expr, &root);
    engine.set_value(&expr, &root, Value::Int(77)).unwrap();
    assert_eq!(engine.get_value(&expr, &root).unwrap(), Value::Int(77));

    let expr = engine.parse("list[0]").unwrap();
    engine.compile_expression(&expr, &root);
    engine.set_value(&expr, &root, Value::Int(5)).unwrap();
    assert_eq!(engine.get_value(&expr, &root).unwrap(), Value::Int(5));

    let expr = engine.parse("catalog.item[0]").unwrap();
    engine.compile_expression(&expr, &root);
    engine.set_value(&expr, &root, Value::from("x")).unwrap();
    assert_eq!(engine.get_value(&expr, &root).unwrap(), Value::from("x"));
}

#[test]
fn test_compiled_accessor_reused_across_roots() {
    let engine = engine();
    let sample = root();
    let expr = engine.parse("property.bean3.value").unwrap();
    engine.compile_expression(&expr, &sample);

    // A different root of the same shape flows through the specialized
    // steps.
    let other = root();
    engine.set_value(&expr, &other, Value::Int(1234)).unwrap();
    assert_eq!(engine.get_value(&expr, &other).unwrap(), Value::Int(1234));
    // The sample root is untouched by the write to the other root.
    assert_eq!(engine.get_value(&expr, &sample).unwrap(), Value::Int(42));
}

#[test]
fn test_variables_force_interpreter_fallback() {
    let engine = engine();
    let root = root();
    let expr = engine.parse("count + #extra").unwrap();
    engine.compile_expression(&expr, &root);
    // The shim still answers correctly, reading the per-call variable.
    let mut vars = rustc_hash::FxHashMap::default();
    vars.insert("extra".to_string(), Value::Int(4));
    assert_eq!(engine.get_value_with(&expr, &root, vars).unwrap(), Value::Int(7));
}

#[test]
fn test_uncompilable_set_falls_back() {
    let engine = engine();
    let root = root();
    // A bare read-only expression has no writable translation; assignment
    // through the compiled accessor reports the same error interpretation
    // would.
    let expr = engine.parse("service.describe()").unwrap();
    engine.compile_expression(&expr, &root);
    assert!(engine.set_value(&expr, &root, Value::Int(1)).is_err());
}

#[test]
fn test_compile_specializes_against_observed_class_only() {
    let engine = engine();
    let root = root();
    let expr = engine.parse("longChild.save(7)").unwrap();
    engine.compile_expression(&expr, &root);
    assert_eq!(engine.get_value(&expr, &root).unwrap(), Value::Int(7));
    // Sibling subclass resolution through its own expression is unaffected
    // by the specialized sibling.
    assert_eq!(
        engine.evaluate("stringChild.save('ok')", &root).unwrap(),
        Value::from("ok")
    );
}

#[test]
fn test_compile_does_not_leak_into_unrelated_roots() {
    let engine = engine();
    let root = root();
    let expr = engine.parse("count").unwrap();
    engine.compile_expression(&expr, &root);

    // A root of a different class hits the dynamic re-resolution path.
    let lone = Value::object(
        hash("Bean3"),
        common::Bean3 { value: Value::Int(1) },
    );
    assert!(engine.get_value(&expr, &lone).is_err());
    assert_eq!(
        engine.evaluate("value", &lone).unwrap(),
        Value::Int(1)
    );
}
