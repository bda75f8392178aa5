//! Fluent registration of host classes.
//!
//! [`ClassBuilder`] wraps an embedder's typed closures into the dynamic
//! accessor signatures the engine dispatches through. The type parameter is
//! the host type; every accessor downcasts the erased object state to it, so
//! a mis-typed object fails with a native error instead of panicking. A
//! subclass whose host embeds the parent host as a field registers with
//! [`ClassBuilder::extends_as`], which records the projection inherited
//! accessors need to reach the parent state.
//!
//! ```
//! use ognav_core::{ClassBuilder, TypeRegistry, TypeTag, Value};
//!
//! struct Point { x: i64 }
//!
//! let mut registry = TypeRegistry::new();
//! registry
//!     .register(
//!         ClassBuilder::<Point>::new("Point")
//!             .property_rw(
//!                 "x",
//!                 TypeTag::Int,
//!                 |p| Value::Int(p.x),
//!                 |p, v| match v {
//!                     Value::Int(n) => {
//!                         p.x = n;
//!                         Ok(())
//!                     }
//!                     other => Err(ognav_core::OgnavError::native(format!(
//!                         "x wants int, got {}",
//!                         other.type_name()
//!                     ))),
//!                 },
//!             )
//!             .build(),
//!     )
//!     .unwrap();
//! ```

use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::OgnavError;
use crate::type_hash::TypeHash;
use crate::type_tag::TypeTag;
use crate::value::Value;

use super::entries::{
    ClassEntry, FieldEntry, GetterFn, IndexedPropertyEntry, MethodEntry, PropertyEntry,
    SetterFn, StaticMethodEntry,
};

/// Builder for one host class's registry entry.
pub struct ClassBuilder<T> {
    entry: ClassEntry,
    next_method: u32,
    _host: PhantomData<fn(T)>,
}

impl<T: Any + Send + Sync> ClassBuilder<T> {
    pub fn new(name: impl Into<String>) -> Self {
        ClassBuilder {
            entry: ClassEntry::new(name),
            next_method: 0,
            _host: PhantomData,
        }
    }

    /// Declare the (already or separately registered) superclass by name.
    /// Only valid when the subclass shares the superclass's host type;
    /// otherwise use [`Self::extends_as`].
    pub fn extends(mut self, superclass: &str) -> Self {
        self.entry.superclass = Some(TypeHash::from_name(superclass));
        self
    }

    /// Declare the superclass together with projections from this class's
    /// host type to the superclass's. Inherited accessors and methods run
    /// against the projected parent state.
    pub fn extends_as<P: Any>(
        mut self,
        superclass: &str,
        as_parent: fn(&T) -> &P,
        as_parent_mut: fn(&mut T) -> &mut P,
    ) -> Self {
        self.entry.superclass = Some(TypeHash::from_name(superclass));
        self.entry.parent_ref = Some(Arc::new(move |state: &dyn Any| -> &dyn Any {
            match state.downcast_ref::<T>() {
                Some(host) => as_parent(host),
                None => state,
            }
        }));
        self.entry.parent_mut = Some(Arc::new(move |state: &mut dyn Any| -> &mut dyn Any {
            if !state.is::<T>() {
                return state;
            }
            match state.downcast_mut::<T>() {
                Some(host) => as_parent_mut(host),
                None => unreachable!("host type checked above"),
            }
        }));
        self
    }

    /// Bind a generic variable declared by a superclass to a concrete type
    /// for this class.
    pub fn bind_generic(mut self, var: &'static str, ty: TypeTag) -> Self {
        self.entry.generics.push((var, ty));
        self
    }

    /// Read-only property.
    pub fn property<G>(self, name: &str, ty: TypeTag, getter: G) -> Self
    where
        G: Fn(&T) -> Value + Send + Sync + 'static,
    {
        self.add_property(name, ty, Some(wrap_getter(getter)), None)
    }

    /// Read/write property.
    pub fn property_rw<G, S>(self, name: &str, ty: TypeTag, getter: G, setter: S) -> Self
    where
        G: Fn(&T) -> Value + Send + Sync + 'static,
        S: Fn(&mut T, Value) -> Result<(), OgnavError> + Send + Sync + 'static,
    {
        self.add_property(name, ty, Some(wrap_getter(getter)), Some(wrap_setter(setter)))
    }

    /// Write-only property (setter with no readable side).
    pub fn property_wo<S>(self, name: &str, ty: TypeTag, setter: S) -> Self
    where
        S: Fn(&mut T, Value) -> Result<(), OgnavError> + Send + Sync + 'static,
    {
        self.add_property(name, ty, None, Some(wrap_setter(setter)))
    }

    fn add_property(
        mut self,
        name: &str,
        ty: TypeTag,
        getter: Option<GetterFn>,
        setter: Option<SetterFn>,
    ) -> Self {
        if self.entry.properties.contains_key(name) {
            self.entry.duplicates.push(name.to_string());
        }
        self.entry.properties.insert(
            name.to_string(),
            PropertyEntry {
                name: name.to_string(),
                ty,
                getter,
                setter,
            },
        );
        self
    }

    /// Indexed property: read/write methods taking an explicit index.
    pub fn indexed_property<R, W>(
        mut self,
        name: &str,
        element: TypeTag,
        read: R,
        write: W,
    ) -> Self
    where
        R: Fn(&T, &Value) -> Result<Value, OgnavError> + Send + Sync + 'static,
        W: Fn(&mut T, &Value, Value) -> Result<(), OgnavError> + Send + Sync + 'static,
    {
        if self.entry.indexed.contains_key(name) {
            self.entry.duplicates.push(name.to_string());
        }
        self.entry.indexed.insert(
            name.to_string(),
            IndexedPropertyEntry {
                name: name.to_string(),
                element,
                read: Arc::new(move |state, idx| read(host_ref::<T>(state)?, idx)),
                write: Some(Arc::new(move |state, idx, value| {
                    write(host_mut::<T>(state)?, idx, value)
                })),
            },
        );
        self
    }

    /// Bare field: resolved only after properties and indexed properties.
    pub fn field<G, S>(mut self, name: &str, ty: TypeTag, get: G, set: S) -> Self
    where
        G: Fn(&T) -> Value + Send + Sync + 'static,
        S: Fn(&mut T, Value) -> Result<(), OgnavError> + Send + Sync + 'static,
    {
        if self.entry.fields.contains_key(name) {
            self.entry.duplicates.push(name.to_string());
        }
        self.entry.fields.insert(
            name.to_string(),
            FieldEntry {
                name: name.to_string(),
                ty,
                get: wrap_getter(get),
                set: Some(wrap_setter(set)),
            },
        );
        self
    }

    /// Instance method overload. Declaration order is preserved and is the
    /// final overload tie-break.
    pub fn method<F>(self, name: &str, params: &[TypeTag], ret: TypeTag, body: F) -> Self
    where
        F: Fn(&mut T, &[Value]) -> Result<Value, OgnavError> + Send + Sync + 'static,
    {
        self.add_method(name, params, ret, false, body)
    }

    /// Instance method whose trailing parameter absorbs extra arguments.
    pub fn variadic_method<F>(
        self,
        name: &str,
        params: &[TypeTag],
        ret: TypeTag,
        body: F,
    ) -> Self
    where
        F: Fn(&mut T, &[Value]) -> Result<Value, OgnavError> + Send + Sync + 'static,
    {
        self.add_method(name, params, ret, true, body)
    }

    fn add_method<F>(
        mut self,
        name: &str,
        params: &[TypeTag],
        ret: TypeTag,
        variadic: bool,
        body: F,
    ) -> Self
    where
        F: Fn(&mut T, &[Value]) -> Result<Value, OgnavError> + Send + Sync + 'static,
    {
        let id = TypeHash::member(self.entry.hash, name, self.next_method);
        self.next_method += 1;
        self.entry
            .methods
            .entry(name.to_string())
            .or_default()
            .push(MethodEntry {
                id,
                declaring: self.entry.hash,
                name: name.to_string(),
                params: params.to_vec(),
                ret,
                variadic,
                invoke: Arc::new(move |state, args| body(host_mut::<T>(state)?, args)),
            });
        self
    }

    /// Static field (constant on the class surface).
    pub fn static_field(mut self, name: &str, value: Value) -> Self {
        if self.entry.static_fields.contains_key(name) {
            self.entry.duplicates.push(name.to_string());
        }
        self.entry.static_fields.insert(name.to_string(), value);
        self
    }

    /// Static method overload.
    pub fn static_method<F>(
        mut self,
        name: &str,
        params: &[TypeTag],
        ret: TypeTag,
        body: F,
    ) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, OgnavError> + Send + Sync + 'static,
    {
        let id = TypeHash::member(self.entry.hash, name, self.next_method);
        self.next_method += 1;
        self.entry
            .static_methods
            .entry(name.to_string())
            .or_default()
            .push(StaticMethodEntry {
                id,
                declaring: self.entry.hash,
                name: name.to_string(),
                params: params.to_vec(),
                ret,
                invoke: Arc::new(body),
            });
        self
    }

    pub fn build(self) -> ClassEntry {
        self.entry
    }
}

fn wrap_getter<T: Any, G>(getter: G) -> GetterFn
where
    G: Fn(&T) -> Value + Send + Sync + 'static,
{
    Arc::new(move |state| Ok(getter(host_ref::<T>(state)?)))
}

fn wrap_setter<T: Any, S>(setter: S) -> SetterFn
where
    S: Fn(&mut T, Value) -> Result<(), OgnavError> + Send + Sync + 'static,
{
    Arc::new(move |state, value| setter(host_mut::<T>(state)?, value))
}

fn host_ref<T: Any>(state: &dyn Any) -> Result<&T, OgnavError> {
    state.downcast_ref::<T>().ok_or_else(|| {
        OgnavError::native(format!("object is not a {}", std::any::type_name::<T>()))
    })
}

fn host_mut<T: Any>(state: &mut dyn Any) -> Result<&mut T, OgnavError> {
    state.downcast_mut::<T>().ok_or_else(|| {
        OgnavError::native(format!("object is not a {}", std::any::type_name::<T>()))
    })
}
