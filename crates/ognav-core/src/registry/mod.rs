//! Registration-table reflection: the type registry.
//!
//! [`TypeRegistry`] is the central store of registered host classes, keyed by
//! [`TypeHash`] with a name index for class-by-name resolution. Registration
//! happens single-threaded at startup; after that the registry is read-only
//! and shared behind an `Arc`, so evaluation never takes a lock on it.

mod builder;
mod entries;

pub use builder::ClassBuilder;
pub use entries::{
    ClassEntry, FieldEntry, GetterFn, IndexedPropertyEntry, IndexedReadFn, IndexedWriteFn,
    MethodEntry, MethodFn, ProjectMutFn, ProjectRefFn, PropertyEntry, SetterFn, StaticFn,
    StaticMethodEntry,
};

use std::any::Any;

use rustc_hash::FxHashMap;

use crate::error::RegistrationError;
use crate::type_hash::TypeHash;
use crate::type_tag::ClassHierarchy;
use crate::value::ObjectRef;

/// Store of all registered host classes.
#[derive(Default)]
pub struct TypeRegistry {
    classes: FxHashMap<TypeHash, ClassEntry>,
    names: FxHashMap<String, TypeHash>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class entry. Fails on duplicate names and on a declared
    /// superclass that is not registered yet (register bases first).
    pub fn register(&mut self, entry: ClassEntry) -> Result<(), RegistrationError> {
        if self.classes.contains_key(&entry.hash) {
            return Err(RegistrationError::DuplicateClass {
                name: entry.name.clone(),
            });
        }
        if let Some(superclass) = entry.superclass {
            if !self.classes.contains_key(&superclass) {
                return Err(RegistrationError::UnknownSuperclass {
                    name: entry.name.clone(),
                    superclass: superclass.to_string(),
                });
            }
        }
        if let Some(member) = entry.duplicates.first() {
            return Err(RegistrationError::DuplicateMember {
                name: entry.name.clone(),
                member: member.clone(),
            });
        }
        self.names.insert(entry.name.clone(), entry.hash);
        self.classes.insert(entry.hash, entry);
        Ok(())
    }

    pub fn get(&self, class: TypeHash) -> Option<&ClassEntry> {
        self.classes.get(&class)
    }

    pub fn by_name(&self, name: &str) -> Option<&ClassEntry> {
        self.names.get(name).and_then(|hash| self.classes.get(hash))
    }

    /// Human-readable class name for diagnostics; falls back to the hash.
    pub fn class_name(&self, class: TypeHash) -> String {
        self.classes
            .get(&class)
            .map(|entry| entry.name.clone())
            .unwrap_or_else(|| class.to_string())
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Iterate a class and its transitive superclasses, most-derived first.
    pub fn class_chain(&self, class: TypeHash) -> ClassChain<'_> {
        ClassChain {
            registry: self,
            next: Some(class),
        }
    }

    /// Run `f` against `obj`'s state viewed as `declaring`'s host type.
    ///
    /// Accessor and method closures downcast to the host type of the class
    /// they were declared on. When a member resolved through the superclass
    /// chain is applied to a subclass instance, the subclass's registered
    /// parent projections bridge the two host types. Classes that share a
    /// host type with their superclass register no projection and the walk
    /// stops early, leaving the state as-is.
    pub fn with_instance<R>(
        &self,
        obj: &ObjectRef,
        declaring: TypeHash,
        f: impl FnOnce(&dyn Any) -> R,
    ) -> R {
        obj.with_state(|state| f(self.project_ref(obj.class(), declaring, state)))
    }

    /// Mutable counterpart of [`Self::with_instance`].
    pub fn with_instance_mut<R>(
        &self,
        obj: &ObjectRef,
        declaring: TypeHash,
        f: impl FnOnce(&mut dyn Any) -> R,
    ) -> R {
        obj.with_state_mut(|state| f(self.project_mut(obj.class(), declaring, state)))
    }

    fn project_ref<'s>(
        &self,
        mut class: TypeHash,
        declaring: TypeHash,
        mut view: &'s dyn Any,
    ) -> &'s dyn Any {
        while class != declaring {
            let Some(entry) = self.classes.get(&class) else { break };
            let Some(superclass) = entry.superclass else { break };
            let Some(project) = &entry.parent_ref else { break };
            view = project(view);
            class = superclass;
        }
        view
    }

    fn project_mut<'s>(
        &self,
        mut class: TypeHash,
        declaring: TypeHash,
        mut view: &'s mut dyn Any,
    ) -> &'s mut dyn Any {
        while class != declaring {
            let Some(entry) = self.classes.get(&class) else { break };
            let Some(superclass) = entry.superclass else { break };
            let Some(project) = &entry.parent_mut else { break };
            view = project(view);
            class = superclass;
        }
        view
    }
}

impl ClassHierarchy for TypeRegistry {
    fn superclass_of(&self, class: TypeHash) -> Option<TypeHash> {
        self.classes.get(&class).and_then(|entry| entry.superclass)
    }
}

/// Iterator over a class's superclass chain.
pub struct ClassChain<'r> {
    registry: &'r TypeRegistry,
    next: Option<TypeHash>,
}

impl<'r> Iterator for ClassChain<'r> {
    type Item = &'r ClassEntry;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.registry.get(self.next?)?;
        self.next = entry.superclass;
        Some(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::type_tag::TypeTag;
    use crate::value::Value;

    struct Base;
    struct Derived;

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = TypeRegistry::new();
        registry
            .register(ClassBuilder::<Base>::new("Base").build())
            .unwrap();
        let err = registry
            .register(ClassBuilder::<Base>::new("Base").build())
            .unwrap_err();
        assert!(matches!(err, RegistrationError::DuplicateClass { .. }));
    }

    #[test]
    fn test_member_registered_twice_rejected() {
        let mut registry = TypeRegistry::new();
        let err = registry
            .register(
                ClassBuilder::<Base>::new("Base")
                    .property("size", TypeTag::Int, |_: &Base| Value::Int(1))
                    .property("size", TypeTag::Int, |_: &Base| Value::Int(2))
                    .build(),
            )
            .unwrap_err();
        match err {
            RegistrationError::DuplicateMember { name, member } => {
                assert_eq!(name, "Base");
                assert_eq!(member, "size");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_same_name_allowed_across_member_kinds() {
        let mut registry = TypeRegistry::new();
        registry
            .register(
                ClassBuilder::<Base>::new("Base")
                    .property("size", TypeTag::Int, |_: &Base| Value::Int(1))
                    .field(
                        "size",
                        TypeTag::Int,
                        |_: &Base| Value::Int(2),
                        |_, _| Ok(()),
                    )
                    .build(),
            )
            .unwrap();
    }

    #[test]
    fn test_superclass_must_exist() {
        let mut registry = TypeRegistry::new();
        let err = registry
            .register(ClassBuilder::<Derived>::new("Derived").extends("Base").build())
            .unwrap_err();
        assert!(matches!(err, RegistrationError::UnknownSuperclass { .. }));
    }

    #[test]
    fn test_inherited_accessor_projects_to_parent_state() {
        struct Parent {
            n: i64,
        }
        struct Child {
            parent: Parent,
        }
        let mut registry = TypeRegistry::new();
        registry
            .register(
                ClassBuilder::<Parent>::new("Parent")
                    .property("n", TypeTag::Int, |p: &Parent| Value::Int(p.n))
                    .build(),
            )
            .unwrap();
        registry
            .register(
                ClassBuilder::<Child>::new("Child")
                    .extends_as(
                        "Parent",
                        |c: &Child| &c.parent,
                        |c: &mut Child| &mut c.parent,
                    )
                    .build(),
            )
            .unwrap();

        let child = Value::object(
            TypeHash::from_name("Child"),
            Child {
                parent: Parent { n: 7 },
            },
        );
        let obj = child.as_object().unwrap();
        let parent = TypeHash::from_name("Parent");
        let getter = registry
            .by_name("Parent")
            .unwrap()
            .properties["n"]
            .getter
            .clone()
            .unwrap();
        let read = registry.with_instance(obj, parent, |state| getter(state));
        assert_eq!(read.unwrap(), Value::Int(7));
    }

    #[test]
    fn test_class_chain_walks_most_derived_first() {
        let mut registry = TypeRegistry::new();
        registry
            .register(
                ClassBuilder::<Base>::new("Base")
                    .static_field("KIND", Value::from("base"))
                    .build(),
            )
            .unwrap();
        registry
            .register(
                ClassBuilder::<Derived>::new("Derived")
                    .extends("Base")
                    .bind_generic("T", TypeTag::Int)
                    .build(),
            )
            .unwrap();

        let chain: Vec<_> = registry
            .class_chain(TypeHash::from_name("Derived"))
            .map(|entry| entry.name.clone())
            .collect();
        assert_eq!(chain, vec!["Derived", "Base"]);
        assert_eq!(
            registry.superclass_of(TypeHash::from_name("Derived")),
            Some(TypeHash::from_name("Base"))
        );
    }
}
