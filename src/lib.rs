//! ognav: an embeddable expression engine for navigating and mutating
//! object graphs.
//!
//! Expressions such as `property.bean3.value != null` or `list[0]` are
//! parsed once and then evaluated against arbitrary root objects, in one of
//! two interchangeable modes:
//!
//! - **Interpreted**: a tree walk resolving members reflectively through a
//!   registration table, with concurrent cross-call caches.
//! - **Compiled**: [`Engine::compile_expression`] specializes the tree into
//!   typed closures against a sample root; any part that resists static
//!   translation silently falls back to interpretation, so both modes
//!   always agree on results.
//!
//! Host types become navigable by registering their shape (properties,
//! indexed properties, fields, method overloads, statics, generics) with
//! [`ClassBuilder`] into a [`TypeRegistry`]. Reflective invocations can be
//! globally guarded by the [`sandbox`] denylist.
//!
//! ```
//! use ognav::{ClassBuilder, Engine, TypeHash, TypeRegistry, TypeTag, Value};
//!
//! struct Point { x: i64 }
//!
//! let mut registry = TypeRegistry::new();
//! registry
//!     .register(
//!         ClassBuilder::<Point>::new("Point")
//!             .property("x", TypeTag::Int, |p| Value::Int(p.x))
//!             .build(),
//!     )
//!     .unwrap();
//!
//! let engine = Engine::new(registry);
//! let root = Value::object(TypeHash::from_name("Point"), Point { x: 7 });
//! assert_eq!(engine.evaluate("x + 1", &root).unwrap(), Value::Int(8));
//! ```

mod compiler;
mod context;
mod engine;
mod error;
mod interp;
pub mod sandbox;

pub use compiler::CompiledAccessor;
pub use context::OgnvContext;
pub use engine::{Engine, EngineBuilder, Expression};
pub use error::EngineError;

// The registration and value surface from the core crate, re-exported so
// embedders depend on this crate alone.
pub use ognav_core::{
    ArrayRef, BinaryOp, CacheEverything, CacheInspector, ClassBuilder, ClassResolver,
    MemberDescriptorProvider, NullHandler, NullStaysNull, ObjectRef, OgnavError,
    RegistrationError, TypeHash, TypeRegistry, TypeTag, Value,
};
pub use ognav_parser::{Ast, ParseError};
