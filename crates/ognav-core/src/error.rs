//! Unified error types for the expression engine.
//!
//! Resolution and invocation failures surface to the caller of
//! `get_value`/`set_value`; registration problems are reported separately at
//! setup time. The compiler's internal "cannot statically translate this
//! node" condition is deliberately *not* part of this hierarchy: it never
//! escapes compilation (the compiler falls back to interpretation) and lives
//! in the engine crate instead.

use thiserror::Error;

/// Errors produced while evaluating or assigning through an expression.
#[derive(Debug, Error)]
pub enum OgnavError {
    /// The named member does not resolve on the target's registered shape.
    #[error("{class} has no readable or writable property '{name}'")]
    NoSuchProperty { class: String, name: String },

    /// No applicable overload for the given argument shapes.
    #[error("no applicable method '{name}' on {class} for argument types ({args})")]
    NoSuchMethod {
        class: String,
        name: String,
        args: String,
    },

    /// Two candidates (or two generic bindings) tie and cannot be ordered.
    #[error("ambiguous resolution of '{name}' on {class}: {detail}")]
    AmbiguousResolution {
        class: String,
        name: String,
        detail: String,
    },

    /// Name-to-class lookup failed.
    #[error("class '{name}' is not registered")]
    ClassNotFound { name: String },

    /// The sandbox denied a guarded invocation.
    #[error("sandbox denied invocation of {class}.{method}")]
    Security { class: String, method: String },

    /// The invoked member itself failed; the original cause is preserved.
    #[error("method '{name}' failed")]
    MethodFailed {
        name: String,
        #[source]
        source: Box<OgnavError>,
    },

    /// The target value cannot be navigated the way the expression asks
    /// (e.g. indexing a bool, or assigning through a literal).
    #[error("inappropriate expression: {detail}")]
    InappropriateExpression { detail: String },

    /// A native accessor rejected its inputs (bad downcast, bad index,
    /// wrong value type for a setter). Raised from registered closures.
    #[error("native accessor error: {detail}")]
    Native { detail: String },
}

impl OgnavError {
    /// Wrap an invocation failure, preserving the cause.
    pub fn method_failed(name: impl Into<String>, cause: OgnavError) -> Self {
        OgnavError::MethodFailed {
            name: name.into(),
            source: Box::new(cause),
        }
    }

    pub fn native(detail: impl Into<String>) -> Self {
        OgnavError::Native {
            detail: detail.into(),
        }
    }

    pub fn inappropriate(detail: impl Into<String>) -> Self {
        OgnavError::InappropriateExpression {
            detail: detail.into(),
        }
    }
}

/// Errors raised while registering classes into the type registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("class '{name}' is already registered")]
    DuplicateClass { name: String },

    #[error("class '{name}' declares duplicate member '{member}'")]
    DuplicateMember { name: String, member: String },

    #[error("superclass {superclass} of '{name}' is not registered")]
    UnknownSuperclass { name: String, superclass: String },
}
