//! Dynamic runtime value for object-graph navigation.
//!
//! [`Value`] is the unified representation all expressions read and write.
//! Registered host objects are held behind [`ObjectRef`], a shared handle
//! whose clones alias the same state, so a write performed through an
//! expression is visible to every other holder of the graph. Arrays work the
//! same way, which is what makes `assign("list[0]", root, v)` observable via
//! a later `evaluate("list[0]", root)`.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::OgnavError;
use crate::type_hash::TypeHash;
use crate::type_tag::TypeTag;

/// Shared handle to a registered host object.
///
/// Carries the concrete registered class (for member resolution) and the
/// object state behind a reader/writer lock. Cloning aliases the state.
#[derive(Clone)]
pub struct ObjectRef {
    class: TypeHash,
    state: Arc<RwLock<dyn Any + Send + Sync>>,
}

impl ObjectRef {
    /// Wrap a host value as a navigable object of the given registered class.
    pub fn new<T: Any + Send + Sync>(class: TypeHash, value: T) -> Self {
        ObjectRef {
            class,
            state: Arc::new(RwLock::new(value)),
        }
    }

    /// The concrete registered class of this object.
    pub fn class(&self) -> TypeHash {
        self.class
    }

    /// Run `f` against the object state, downcast to `T`.
    pub fn with<T: Any, R>(&self, f: impl FnOnce(&T) -> R) -> Result<R, OgnavError> {
        let guard = self.state.read();
        let value = guard
            .downcast_ref::<T>()
            .ok_or_else(|| OgnavError::native(format!("object is not a {}", std::any::type_name::<T>())))?;
        Ok(f(value))
    }

    /// Run `f` against the object state with write access, downcast to `T`.
    pub fn with_mut<T: Any, R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R, OgnavError> {
        let mut guard = self.state.write();
        let value = guard
            .downcast_mut::<T>()
            .ok_or_else(|| OgnavError::native(format!("object is not a {}", std::any::type_name::<T>())))?;
        Ok(f(value))
    }

    /// Run `f` against the erased object state. Callers that need a concrete
    /// type go through `TypeRegistry::with_instance` instead, which applies
    /// superclass projections before downcasting.
    pub fn with_state<R>(&self, f: impl FnOnce(&dyn Any) -> R) -> R {
        let guard = self.state.read();
        f(&*guard)
    }

    /// Run `f` against the erased object state with write access.
    pub fn with_state_mut<R>(&self, f: impl FnOnce(&mut dyn Any) -> R) -> R {
        let mut guard = self.state.write();
        f(&mut *guard)
    }

    /// Identity comparison: two refs are the same object iff they share state.
    pub fn same_object(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef({})", self.class)
    }
}

/// Shared, growable array of values with built-in index access.
#[derive(Clone, Default)]
pub struct ArrayRef {
    items: Arc<RwLock<Vec<Value>>>,
}

impl ArrayRef {
    pub fn new(items: Vec<Value>) -> Self {
        ArrayRef {
            items: Arc::new(RwLock::new(items)),
        }
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.items.read().get(index).cloned()
    }

    pub fn set(&self, index: usize, value: Value) -> Result<(), OgnavError> {
        let mut items = self.items.write();
        match items.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(OgnavError::native(format!(
                "index {index} out of bounds (len {})",
                items.len()
            ))),
        }
    }

    pub fn push(&self, value: Value) {
        self.items.write().push(value);
    }

    /// Snapshot of the current contents.
    pub fn to_vec(&self) -> Vec<Value> {
        self.items.read().clone()
    }

    pub fn same_array(&self, other: &ArrayRef) -> bool {
        Arc::ptr_eq(&self.items, &other.items)
    }
}

impl fmt::Debug for ArrayRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArrayRef(len {})", self.len())
    }
}

/// A dynamic value flowing through expression evaluation.
#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(ArrayRef),
    Object(ObjectRef),
}

impl Value {
    /// Wrap a host value as an object of the given registered class.
    pub fn object<T: Any + Send + Sync>(class: TypeHash, value: T) -> Self {
        Value::Object(ObjectRef::new(class, value))
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(ArrayRef::new(items))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The runtime type of this value, as seen by overload resolution.
    pub fn tag(&self) -> TypeTag {
        match self {
            Value::Null => TypeTag::Null,
            Value::Bool(_) => TypeTag::Bool,
            Value::Int(_) => TypeTag::Int,
            Value::Float(_) => TypeTag::Float,
            Value::String(_) => TypeTag::String,
            Value::Array(_) => TypeTag::Array,
            Value::Object(obj) => TypeTag::Object(obj.class()),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayRef> {
        match self {
            Value::Array(arr) => Some(arr),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                *a as f64 == *b
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                a.same_array(b) || a.to_vec() == b.to_vec()
            }
            (Value::Object(a), Value::Object(b)) => a.same_object(b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "{v}"),
            Value::Array(arr) => {
                write!(f, "[")?;
                for (i, item) in arr.to_vec().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Object(obj) => write!(f, "<object {}>", obj.class()),
        }
    }
}
