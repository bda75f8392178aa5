//! Sandbox enforcement through the engine. These run in their own test
//! binary so the process-wide sandbox state cannot interfere with the
//! navigation and resolution suites, and the state transitions live in one
//! sequential test.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use common::{engine, hash, root};
use ognav::{
    ClassBuilder, Engine, OgnavError, TypeRegistry, TypeTag, Value, sandbox,
};

struct Gate {
    release: Arc<AtomicBool>,
}

struct Breaker;

fn breaker_engine() -> Engine {
    let mut registry = TypeRegistry::new();
    registry
        .register(
            ClassBuilder::<Breaker>::new("Breaker")
                .method("escape", &[], TypeTag::Bool, |_: &mut Breaker, _args| {
                    sandbox::disable();
                    Ok(Value::Bool(sandbox::is_enabled()))
                })
                .build(),
        )
        .unwrap();
    Engine::new(registry)
}

fn gate_engine() -> Engine {
    let mut registry = TypeRegistry::new();
    registry
        .register(
            ClassBuilder::<Gate>::new("Gate")
                .method("wait", &[], TypeTag::Int, |gate: &mut Gate, _args| {
                    while !gate.release.load(Ordering::SeqCst) {
                        thread::sleep(Duration::from_millis(1));
                    }
                    Ok(Value::Int(1))
                })
                .build(),
        )
        .unwrap();
    Engine::new(registry)
}

#[test]
fn test_sandbox_enforcement() {
    let engine = engine();
    let root = root();

    // Disabled by default: denylisted names run unchecked.
    assert!(!sandbox::is_enabled());
    assert_eq!(
        engine.evaluate("service.exec(2)", &root).unwrap(),
        Value::Int(4)
    );

    sandbox::enable();

    // "exec" matches the default denylist for every class; the rejection
    // surfaces unwrapped so callers can distinguish policy from failure.
    let err = engine.evaluate("service.exec(2)", &root).unwrap_err();
    assert!(matches!(
        err,
        ognav::EngineError::Eval(OgnavError::Security { .. })
    ));

    // Methods outside the denylist still run while enabled.
    assert_eq!(
        engine.evaluate("service.describe()", &root).unwrap(),
        Value::from("a service")
    );

    // Denial is consistent under concurrent evaluation.
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = engine.clone();
            let root = root.clone();
            thread::spawn(move || engine.evaluate("service.exec(1)", &root))
        })
        .collect();
    for handle in handles {
        let err = handle.join().unwrap().unwrap_err();
        assert!(matches!(
            err,
            ognav::EngineError::Eval(OgnavError::Security { .. })
        ));
    }

    // Custom rules stack on the defaults and match the superclass chain.
    sandbox::deny("Service", "*");
    assert!(engine.evaluate("service.describe()", &root).is_err());
    sandbox::reset_rules();
    assert!(engine.evaluate("service.describe()", &root).is_ok());

    // Host code reached through a guarded call cannot switch the sandbox
    // off; the disable is ignored and enforcement continues.
    let breaker = breaker_engine();
    let breaker_root = Value::object(hash("Breaker"), Breaker);
    assert_eq!(
        breaker.evaluate("escape()", &breaker_root).unwrap(),
        Value::Bool(true)
    );
    assert!(sandbox::is_enabled());
    let err = engine.evaluate("service.exec(2)", &root).unwrap_err();
    assert!(matches!(
        err,
        ognav::EngineError::Eval(OgnavError::Security { .. })
    ));

    // A call admitted while enabled holds a resident token and runs to
    // completion even when the sandbox is disabled mid-flight.
    let release = Arc::new(AtomicBool::new(false));
    let gated = gate_engine();
    let gated_root = Value::object(
        hash("Gate"),
        Gate {
            release: Arc::clone(&release),
        },
    );
    let baseline = sandbox::resident_count();
    let in_flight = {
        let gated = gated.clone();
        let gated_root = gated_root.clone();
        thread::spawn(move || gated.evaluate("wait()", &gated_root))
    };
    while sandbox::resident_count() == baseline {
        thread::sleep(Duration::from_millis(1));
    }
    sandbox::disable();
    release.store(true, Ordering::SeqCst);
    assert_eq!(in_flight.join().unwrap().unwrap(), Value::Int(1));
    assert_eq!(sandbox::resident_count(), baseline);

    // Disabled again: the denylisted name is callable once more.
    assert_eq!(
        engine.evaluate("service.exec(3)", &root).unwrap(),
        Value::Int(6)
    );
}
