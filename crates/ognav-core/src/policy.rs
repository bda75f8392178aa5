//! Pluggable policies consumed by the resolution engine.
//!
//! Three seams the embedder can replace: how member descriptors are found
//! for a class (the bean-introspection analog), how class names resolve to
//! registered classes, and what a null property read yields. The defaults
//! are registry-backed and are what `Engine::new` installs.

use rustc_hash::FxHashMap;
use std::sync::Arc;

use crate::error::OgnavError;
use crate::registry::TypeRegistry;
use crate::resolve::ResolvedMember;
use crate::type_hash::TypeHash;
use crate::value::Value;

/// Supplies member descriptors for a class: whether and how a named
/// property is readable or writable. The core depends on this abstractly
/// and does not define introspection policy.
pub trait MemberDescriptorProvider: Send + Sync {
    fn has_readable(&self, class: TypeHash, name: &str) -> bool {
        self.describe(class, name)
            .map(|member| member.is_readable())
            .unwrap_or(false)
    }

    fn has_writable(&self, class: TypeHash, name: &str) -> bool {
        self.describe(class, name)
            .map(|member| member.is_writable())
            .unwrap_or(false)
    }

    /// Describe the member, or `None` if the name does not resolve on the
    /// class's shape.
    fn describe(&self, class: TypeHash, name: &str) -> Option<ResolvedMember>;
}

/// Default provider: walks the registered class chain with the lookup order
/// explicit property -> indexed property -> bare field.
pub struct RegistryDescriptorProvider {
    registry: Arc<TypeRegistry>,
}

impl RegistryDescriptorProvider {
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        RegistryDescriptorProvider { registry }
    }
}

impl MemberDescriptorProvider for RegistryDescriptorProvider {
    fn describe(&self, class: TypeHash, name: &str) -> Option<ResolvedMember> {
        for entry in self.registry.class_chain(class) {
            if let Some(property) = entry.properties.get(name) {
                return Some(ResolvedMember::Accessor {
                    declaring: entry.hash,
                    ty: property.ty,
                    getter: property.getter.clone(),
                    setter: property.setter.clone(),
                });
            }
            if let Some(indexed) = entry.indexed.get(name) {
                return Some(ResolvedMember::Indexed {
                    declaring: entry.hash,
                    element: indexed.element,
                    read: indexed.read.clone(),
                    write: indexed.write.clone(),
                });
            }
            if let Some(field) = entry.fields.get(name) {
                return Some(ResolvedMember::Field {
                    declaring: entry.hash,
                    ty: field.ty,
                    get: field.get.clone(),
                    set: field.set.clone(),
                });
            }
        }
        None
    }
}

/// Resolves a class name (plus contextual aliases) to a registered class.
pub trait ClassResolver: Send + Sync {
    fn resolve_class(
        &self,
        name: &str,
        aliases: &FxHashMap<String, String>,
    ) -> Result<TypeHash, OgnavError>;
}

/// Default resolver: contextual alias first, then the registry name index.
pub struct RegistryClassResolver {
    registry: Arc<TypeRegistry>,
}

impl RegistryClassResolver {
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        RegistryClassResolver { registry }
    }
}

impl ClassResolver for RegistryClassResolver {
    fn resolve_class(
        &self,
        name: &str,
        aliases: &FxHashMap<String, String>,
    ) -> Result<TypeHash, OgnavError> {
        let target = aliases.get(name).map(String::as_str).unwrap_or(name);
        self.registry
            .by_name(target)
            .map(|entry| entry.hash)
            .ok_or_else(|| OgnavError::ClassNotFound {
                name: name.to_string(),
            })
    }
}

/// Decides the value of a property read that resolved to null.
pub trait NullHandler: Send + Sync {
    fn null_property_value(&self, root: &Value, owner: &Value, name: &str) -> Value;
}

/// Default null handling: a null property stays null.
pub struct NullStaysNull;

impl NullHandler for NullStaysNull {
    fn null_property_value(&self, _root: &Value, _owner: &Value, _name: &str) -> Value {
        Value::Null
    }
}
