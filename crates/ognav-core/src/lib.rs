//! Core types for the ognav expression engine.
//!
//! This crate provides:
//! - The dynamic [`Value`] model and shared object/array handles
//! - [`TypeHash`]/[`TypeTag`] type identity and assignability ranking
//! - Registration-table reflection ([`TypeRegistry`], [`ClassBuilder`])
//! - The member/method [`Resolver`] with its concurrent [`ResolutionCache`]
//! - The pluggable policies (member descriptors, class resolution, null
//!   handling, cache admission) the engine consumes
//! - Value coercion and operator semantics ([`ops`])
//!
//! The evaluator, specialization compiler and sandbox live in the `ognav`
//! crate; the expression parser lives in `ognav-parser`.

pub mod cache;
pub mod error;
pub mod ops;
pub mod policy;
pub mod registry;
pub mod resolve;
pub mod type_hash;
pub mod type_tag;
pub mod value;

pub use cache::{CacheEverything, CacheInspector, ResolutionCache};
pub use error::{OgnavError, RegistrationError};
pub use ops::BinaryOp;
pub use policy::{
    ClassResolver, MemberDescriptorProvider, NullHandler, NullStaysNull,
    RegistryClassResolver, RegistryDescriptorProvider,
};
pub use registry::{ClassBuilder, ClassEntry, MethodEntry, TypeRegistry};
pub use resolve::{ResolvedMember, ResolvedMethod, ResolvedStaticMethod, Resolver};
pub use type_hash::TypeHash;
pub use type_tag::{ClassHierarchy, TypeTag};
pub use value::{ArrayRef, ObjectRef, Value};
