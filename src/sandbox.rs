//! Process-wide execution sandbox for guarded invocations.
//!
//! Every reflective invocation the engine performs on behalf of an
//! expression (instance methods, static methods) passes through
//! [`guard`]. When the sandbox is disabled (the default) the call runs
//! unchecked. When enabled, the invocation is matched against a denylist of
//! (class, method) patterns over the declaring class and its superclass
//! chain; a match fails with [`OgnavError::Security`] before the underlying
//! call executes.
//!
//! Admission is token-based so enable/disable transitions cannot corrupt
//! calls already in flight: each admitted call holds a random resident token
//! for its duration, and [`disable`] flips the flag without draining the
//! resident set.

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashSet;
use once_cell::sync::Lazy;
use parking_lot::RwLock;

use ognav_core::OgnavError;

/// One denylist pattern. `*` on either side matches anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenyRule {
    pub class: String,
    pub method: String,
}

impl DenyRule {
    pub fn new(class: impl Into<String>, method: impl Into<String>) -> Self {
        DenyRule {
            class: class.into(),
            method: method.into(),
        }
    }

    fn matches(&self, class: &str, method: &str) -> bool {
        (self.class == "*" || self.class == class)
            && (self.method == "*" || self.method == method)
    }
}

struct Sandbox {
    enabled: AtomicBool,
    residents: DashSet<u64>,
    rules: RwLock<Vec<DenyRule>>,
}

/// Methods that terminate the process, spawn processes, tamper with
/// security state, or construct loaders.
fn default_rules() -> Vec<DenyRule> {
    vec![
        DenyRule::new("*", "exit"),
        DenyRule::new("*", "abort"),
        DenyRule::new("*", "halt"),
        DenyRule::new("*", "exec"),
        DenyRule::new("*", "spawn"),
        DenyRule::new("*", "command"),
        DenyRule::new("*", "setSecurityManager"),
        DenyRule::new("*", "defineClass"),
        DenyRule::new("*", "newClassLoader"),
        DenyRule::new("Sandbox", "*"),
    ]
}

static SANDBOX: Lazy<Sandbox> = Lazy::new(|| Sandbox {
    enabled: AtomicBool::new(false),
    residents: DashSet::new(),
    rules: RwLock::new(default_rules()),
});

thread_local! {
    /// Depth of guarded invocations on this thread. Non-zero means the
    /// caller is host code reached from an expression, which must not be
    /// able to loosen the sandbox.
    static GUARD_DEPTH: Cell<u32> = const { Cell::new(0) };
}

fn in_guarded_call() -> bool {
    GUARD_DEPTH.with(|depth| depth.get() > 0)
}

/// Turn guarding on for all subsequent invocations, process-wide.
pub fn enable() {
    SANDBOX.enabled.store(true, Ordering::SeqCst);
}

/// Turn guarding off. Calls already admitted keep their resident tokens
/// and complete normally. Ignored from inside a guarded invocation: an
/// expression cannot switch off the sandbox through a host method.
pub fn disable() {
    if in_guarded_call() {
        return;
    }
    SANDBOX.enabled.store(false, Ordering::SeqCst);
}

pub fn is_enabled() -> bool {
    SANDBOX.enabled.load(Ordering::SeqCst)
}

/// Add a denylist rule on top of the defaults.
pub fn deny(class: impl Into<String>, method: impl Into<String>) {
    SANDBOX.rules.write().push(DenyRule::new(class, method));
}

/// Restore the default denylist. Ignored from inside a guarded invocation,
/// like [`disable`].
pub fn reset_rules() {
    if in_guarded_call() {
        return;
    }
    *SANDBOX.rules.write() = default_rules();
}

/// Number of guarded calls currently in flight.
pub fn resident_count() -> usize {
    SANDBOX.residents.len()
}

fn denied(classes: &[String], method: &str) -> bool {
    let rules = SANDBOX.rules.read();
    classes
        .iter()
        .any(|class| rules.iter().any(|rule| rule.matches(class, method)))
}

/// Run a reflective invocation under the sandbox.
///
/// `classes` is the declaring class and its superclass chain, most-derived
/// first. The enabled check happens exactly once per call: a call admitted
/// before a disable runs to completion, and a call issued after a disable
/// is never checked.
pub(crate) fn guard<R>(
    classes: &[String],
    method: &str,
    invoke: impl FnOnce() -> Result<R, OgnavError>,
) -> Result<R, OgnavError> {
    if !SANDBOX.enabled.load(Ordering::SeqCst) {
        return invoke();
    }
    if denied(classes, method) {
        return Err(OgnavError::Security {
            class: classes.first().cloned().unwrap_or_default(),
            method: method.to_string(),
        });
    }
    let token = admit();
    GUARD_DEPTH.with(|depth| depth.set(depth.get() + 1));
    let result = invoke();
    GUARD_DEPTH.with(|depth| depth.set(depth.get() - 1));
    SANDBOX.residents.remove(&token);
    result
}

fn admit() -> u64 {
    loop {
        let token = rand::random::<u64>();
        if SANDBOX.residents.insert(token) {
            return token;
        }
    }
}
