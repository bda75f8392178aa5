//! Registry entry types: the registered shape of a host class.
//!
//! Rust has no runtime reflection, so navigable host types are described by
//! explicit entries built once at startup. Accessors and methods are native
//! closures over the shared object state; everything here is immutable after
//! registration.

use std::any::Any;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::error::OgnavError;
use crate::type_hash::TypeHash;
use crate::type_tag::TypeTag;
use crate::value::Value;

/// Read a property off an object's state. The state is the erased host
/// value, already projected to the declaring class's host type; the closure
/// performs the final downcast.
pub type GetterFn = Arc<dyn Fn(&dyn Any) -> Result<Value, OgnavError> + Send + Sync>;
/// Write a property on an object's state.
pub type SetterFn = Arc<dyn Fn(&mut dyn Any, Value) -> Result<(), OgnavError> + Send + Sync>;
/// Read an indexed property: distinct from array indexing, the index is an
/// explicit argument to the read method.
pub type IndexedReadFn =
    Arc<dyn Fn(&dyn Any, &Value) -> Result<Value, OgnavError> + Send + Sync>;
/// Write an indexed property.
pub type IndexedWriteFn =
    Arc<dyn Fn(&mut dyn Any, &Value, Value) -> Result<(), OgnavError> + Send + Sync>;
/// Invoke an instance method.
pub type MethodFn =
    Arc<dyn Fn(&mut dyn Any, &[Value]) -> Result<Value, OgnavError> + Send + Sync>;
/// Invoke a static method.
pub type StaticFn = Arc<dyn Fn(&[Value]) -> Result<Value, OgnavError> + Send + Sync>;

/// View an object state as the superclass's host type, or return it
/// unchanged when the state is not this class's host.
pub type ProjectRefFn = Arc<dyn for<'s> Fn(&'s dyn Any) -> &'s (dyn Any) + Send + Sync>;
/// Mutable counterpart of [`ProjectRefFn`].
pub type ProjectMutFn =
    Arc<dyn for<'s> Fn(&'s mut dyn Any) -> &'s mut (dyn Any) + Send + Sync>;

/// A named property exposed through a getter/setter pair.
#[derive(Clone)]
pub struct PropertyEntry {
    pub name: String,
    pub ty: TypeTag,
    pub getter: Option<GetterFn>,
    pub setter: Option<SetterFn>,
}

/// A property exposed through paired read/write methods taking an explicit
/// index argument.
#[derive(Clone)]
pub struct IndexedPropertyEntry {
    pub name: String,
    pub element: TypeTag,
    pub read: IndexedReadFn,
    pub write: Option<IndexedWriteFn>,
}

/// A bare field: looked up only after properties and indexed properties.
#[derive(Clone)]
pub struct FieldEntry {
    pub name: String,
    pub ty: TypeTag,
    pub get: GetterFn,
    pub set: Option<SetterFn>,
}

/// One overload of an instance method.
#[derive(Clone)]
pub struct MethodEntry {
    /// Stable identity, used as the generic-materialization cache key.
    pub id: TypeHash,
    /// Class the method was declared on (not the class it was resolved
    /// against; the distinction matters for generic variable lookup).
    pub declaring: TypeHash,
    pub name: String,
    /// Declared parameter types; may contain [`TypeTag::Var`].
    pub params: Vec<TypeTag>,
    pub ret: TypeTag,
    /// Trailing parameter absorbs any number of extra arguments.
    pub variadic: bool,
    pub invoke: MethodFn,
}

/// One overload of a static method.
#[derive(Clone)]
pub struct StaticMethodEntry {
    pub id: TypeHash,
    pub declaring: TypeHash,
    pub name: String,
    pub params: Vec<TypeTag>,
    pub ret: TypeTag,
    pub invoke: StaticFn,
}

/// The full registered shape of one host class.
#[derive(Clone)]
pub struct ClassEntry {
    pub name: String,
    pub hash: TypeHash,
    pub superclass: Option<TypeHash>,
    /// Projects this class's host state to the superclass's host type, for
    /// classes whose host embeds the parent as a field. Absent when the
    /// subclass shares the superclass's host type.
    pub parent_ref: Option<ProjectRefFn>,
    pub parent_mut: Option<ProjectMutFn>,
    /// Bindings this class supplies for generic variables declared by a
    /// (transitive) superclass, e.g. `("T", TypeTag::Int)`.
    pub generics: Vec<(&'static str, TypeTag)>,
    pub properties: FxHashMap<String, PropertyEntry>,
    pub indexed: FxHashMap<String, IndexedPropertyEntry>,
    pub fields: FxHashMap<String, FieldEntry>,
    /// Overloads per name, in declaration order. Declaration order is the
    /// final overload tie-break, so it must be preserved.
    pub methods: FxHashMap<String, Vec<MethodEntry>>,
    pub static_fields: FxHashMap<String, Value>,
    pub static_methods: FxHashMap<String, Vec<StaticMethodEntry>>,
    /// Member names registered more than once within one table; rejected at
    /// registry insertion.
    pub(crate) duplicates: Vec<String>,
}

impl ClassEntry {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let hash = TypeHash::from_name(&name);
        ClassEntry {
            name,
            hash,
            superclass: None,
            parent_ref: None,
            parent_mut: None,
            generics: Vec::new(),
            properties: FxHashMap::default(),
            indexed: FxHashMap::default(),
            fields: FxHashMap::default(),
            methods: FxHashMap::default(),
            static_fields: FxHashMap::default(),
            static_methods: FxHashMap::default(),
            duplicates: Vec::new(),
        }
    }
}
