//! Overload resolution determinism and cache behavior across repeated
//! evaluation, invalidation, and admission-policy swaps.

mod common;

use std::sync::Arc;

use common::{engine, hash, root};
use ognav::{CacheInspector, ClassBuilder, Engine, TypeHash, TypeRegistry, TypeTag, Value};

#[test]
fn test_overload_choice_is_stable_across_cache_clears() {
    let engine = engine();
    let root = root();
    for _ in 0..3 {
        assert_eq!(
            engine.evaluate("service.run(1)", &root).unwrap(),
            Value::from("int")
        );
        assert_eq!(
            engine.evaluate("service.run(1.5)", &root).unwrap(),
            Value::from("float")
        );
        engine.clear_cache();
    }
}

#[test]
fn test_widening_overload_picked_when_no_exact_match() {
    let engine = engine();
    let root = root();
    // No run(String) exists; the call is rejected rather than coerced.
    assert!(engine.evaluate("service.run('oops')", &root).is_err());
}

#[test]
fn test_member_cache_fills_and_clears() {
    let engine = engine();
    let root = root();
    assert_eq!(engine.cache_size(), 0);

    engine.evaluate("property.bean3.value", &root).unwrap();
    let after_first = engine.cache_size();
    assert!(after_first >= 3, "chain should cache one entry per segment");

    // Re-evaluation hits the cache without growing it.
    engine.evaluate("property.bean3.value", &root).unwrap();
    assert_eq!(engine.cache_size(), after_first);

    engine.clear_cache();
    assert_eq!(engine.cache_size(), 0);
}

#[test]
fn test_cache_size_for_counts_per_class() {
    let engine = engine();
    let root = root();
    engine.evaluate("property.bean3.value", &root).unwrap();
    assert_eq!(engine.cache_size_for(hash("Root")), 1);
    assert_eq!(engine.cache_size_for(hash("Bean2")), 1);
    assert_eq!(engine.cache_size_for(hash("Bean3")), 1);
    assert_eq!(engine.cache_size_for(hash("Service")), 0);
}

#[test]
fn test_failed_lookups_are_not_cached() {
    let engine = engine();
    let root = root();
    assert!(engine.evaluate("nonsense", &root).is_err());
    assert_eq!(engine.cache_size_for(hash("Root")), 0);
}

struct RejectClass(TypeHash);

impl CacheInspector for RejectClass {
    fn should_cache(&self, class: TypeHash) -> bool {
        class != self.0
    }
}

#[test]
fn test_inspector_excludes_a_class_from_the_cache() {
    let engine = engine();
    let root = root();
    engine.set_cache_inspector(Arc::new(RejectClass(hash("Bean2"))));

    engine.evaluate("property.bean3.value", &root).unwrap();
    assert_eq!(engine.cache_size_for(hash("Root")), 1);
    assert_eq!(engine.cache_size_for(hash("Bean2")), 0);
    assert_eq!(engine.cache_size_for(hash("Bean3")), 1);

    // Rejected classes still resolve correctly every time.
    assert_eq!(
        engine.evaluate("property.bean3.value", &root).unwrap(),
        Value::Int(42)
    );
}

#[test]
fn test_generic_bindings_do_not_bleed_between_subclasses() {
    let engine = engine();
    let root = root();
    // Interleave to force both materializations into the generics cache.
    assert_eq!(
        engine.evaluate("longChild.save(1)", &root).unwrap(),
        Value::Int(1)
    );
    assert_eq!(
        engine.evaluate("stringChild.save('s')", &root).unwrap(),
        Value::from("s")
    );
    assert_eq!(
        engine.evaluate("longChild.save(2)", &root).unwrap(),
        Value::Int(2)
    );
    assert!(engine.evaluate("longChild.save('nope')", &root).is_err());
    assert!(engine.evaluate("stringChild.save(3)", &root).is_err());
}

#[test]
fn test_read_path_prefers_property_over_field() {
    struct Toggle {
        on: bool,
    }
    let mut registry = TypeRegistry::new();
    registry
        .register(
            ClassBuilder::<Toggle>::new("Toggle")
                .property("enabled", TypeTag::Bool, |t: &Toggle| Value::Bool(t.on))
                .field(
                    "enabled",
                    TypeTag::Bool,
                    |_: &Toggle| Value::Bool(false),
                    |_, _| Ok(()),
                )
                .build(),
        )
        .unwrap();
    let engine = Engine::new(registry);
    let toggle = Value::object(hash("Toggle"), Toggle { on: true });
    // Two readable members share the name; the property getter wins, the
    // bare field is only consulted when no property matches.
    assert_eq!(
        engine.evaluate("enabled", &toggle).unwrap(),
        Value::Bool(true)
    );
}

#[test]
fn test_variadic_resolution_is_cached_per_shape() {
    let engine = engine();
    let root = root();
    assert_eq!(
        engine.evaluate("service.sum(1, 2)", &root).unwrap(),
        Value::Int(3)
    );
    assert_eq!(
        engine.evaluate("service.sum(1, 2, 3, 4)", &root).unwrap(),
        Value::Int(10)
    );
    assert_eq!(
        engine.evaluate("service.sum()", &root).unwrap(),
        Value::Int(0)
    );
}
