//! The reflective member-resolution engine.
//!
//! Resolves property and method references against a registered class shape:
//! property lookup order (explicit property -> indexed property -> bare
//! field, walking the superclass chain), cost-ranked overload resolution
//! with declaration order as the final deterministic tie-break, and generic
//! parameter materialization per concrete subclass. Everything resolved here
//! is memoized through [`ResolutionCache`](crate::cache::ResolutionCache),
//! gated by the cache-admission policy; failed lookups are never inserted.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::cache::{CacheInspector, ResolutionCache};
use crate::error::OgnavError;
use crate::policy::MemberDescriptorProvider;
use crate::registry::{
    GetterFn, IndexedReadFn, IndexedWriteFn, MethodEntry, SetterFn, StaticMethodEntry,
    TypeRegistry,
};
use crate::type_hash::TypeHash;
use crate::type_tag::{conversion_cost, ClassHierarchy, TypeTag};
use crate::value::Value;

/// A member resolved on a class shape: getter/setter pair, indexed
/// read/write pair, or bare field. Immutable once cached.
#[derive(Clone)]
pub enum ResolvedMember {
    Accessor {
        declaring: TypeHash,
        ty: TypeTag,
        getter: Option<GetterFn>,
        setter: Option<SetterFn>,
    },
    Indexed {
        declaring: TypeHash,
        element: TypeTag,
        read: IndexedReadFn,
        write: Option<IndexedWriteFn>,
    },
    Field {
        declaring: TypeHash,
        ty: TypeTag,
        get: GetterFn,
        set: Option<SetterFn>,
    },
}

impl ResolvedMember {
    /// Class the member was found on (may be a superclass of the lookup
    /// target).
    pub fn declaring(&self) -> TypeHash {
        match self {
            ResolvedMember::Accessor { declaring, .. }
            | ResolvedMember::Indexed { declaring, .. }
            | ResolvedMember::Field { declaring, .. } => *declaring,
        }
    }

    /// Declared type of the readable side (element type for indexed).
    pub fn ty(&self) -> TypeTag {
        match self {
            ResolvedMember::Accessor { ty, .. } | ResolvedMember::Field { ty, .. } => *ty,
            ResolvedMember::Indexed { element, .. } => *element,
        }
    }

    pub fn is_readable(&self) -> bool {
        match self {
            ResolvedMember::Accessor { getter, .. } => getter.is_some(),
            ResolvedMember::Indexed { .. } | ResolvedMember::Field { .. } => true,
        }
    }

    pub fn is_writable(&self) -> bool {
        match self {
            ResolvedMember::Accessor { setter, .. } => setter.is_some(),
            ResolvedMember::Indexed { write, .. } => write.is_some(),
            ResolvedMember::Field { set, .. } => set.is_some(),
        }
    }

    pub fn is_indexed(&self) -> bool {
        matches!(self, ResolvedMember::Indexed { .. })
    }
}

impl fmt::Debug for ResolvedMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedMember::Accessor { ty, .. } => write!(f, "Accessor({ty})"),
            ResolvedMember::Indexed { element, .. } => write!(f, "Indexed({element})"),
            ResolvedMember::Field { ty, .. } => write!(f, "Field({ty})"),
        }
    }
}

/// A ranked method overload with its generic parameters materialized for
/// the concrete class it was resolved against.
#[derive(Clone)]
pub struct ResolvedMethod {
    pub method: MethodEntry,
    /// Parameter types after substituting generic variables.
    pub params: Vec<TypeTag>,
    /// Return type after substitution.
    pub ret: TypeTag,
}

/// A ranked static method overload.
#[derive(Clone)]
pub struct ResolvedStaticMethod {
    pub method: StaticMethodEntry,
}

/// Member/method resolution over one registry, cache and policy set.
///
/// Cheap to construct per call; all state lives in the borrowed
/// collaborators.
pub struct Resolver<'a> {
    pub registry: &'a TypeRegistry,
    pub provider: &'a dyn MemberDescriptorProvider,
    pub cache: &'a ResolutionCache,
    pub inspector: &'a dyn CacheInspector,
}

impl<'a> Resolver<'a> {
    /// Resolve a named property/indexed-property/field on a class.
    pub fn resolve_member(
        &self,
        class: TypeHash,
        name: &str,
    ) -> Result<Arc<ResolvedMember>, OgnavError> {
        if let Some(member) = self.cache.member(class, name) {
            return Ok(member);
        }
        let member = self
            .provider
            .describe(class, name)
            .map(Arc::new)
            .ok_or_else(|| OgnavError::NoSuchProperty {
                class: self.registry.class_name(class),
                name: name.to_string(),
            })?;
        self.cache
            .insert_member(class, name, Arc::clone(&member), self.inspector);
        Ok(member)
    }

    /// Resolve the most specific applicable overload of `name` on `class`
    /// for the given argument runtime types.
    pub fn resolve_method(
        &self,
        class: TypeHash,
        name: &str,
        args: &[TypeTag],
    ) -> Result<Arc<ResolvedMethod>, OgnavError> {
        if let Some(method) = self.cache.method(class, name, args) {
            return Ok(method);
        }

        // Candidates in declaration order, most-derived class first. The
        // collected index is the final tie-break.
        let mut best: Option<(u32, usize, ResolvedMethod)> = None;
        let mut index = 0usize;
        for entry in self.registry.class_chain(class) {
            let Some(overloads) = entry.methods.get(name) else {
                continue;
            };
            for method in overloads {
                let params = self.materialize(class, method)?;
                if let Some(cost) =
                    candidate_cost(&params, method.variadic, args, self.registry)
                {
                    let better = match &best {
                        Some((best_cost, best_index, _)) => {
                            cost < *best_cost || (cost == *best_cost && index < *best_index)
                        }
                        None => true,
                    };
                    if better {
                        let ret = self.substitute(class, method.ret, method)?;
                        best = Some((
                            cost,
                            index,
                            ResolvedMethod {
                                method: method.clone(),
                                params: params.as_ref().clone(),
                                ret,
                            },
                        ));
                    }
                }
                index += 1;
            }
        }

        let resolved = best
            .map(|(_, _, resolved)| Arc::new(resolved))
            .ok_or_else(|| OgnavError::NoSuchMethod {
                class: self.registry.class_name(class),
                name: name.to_string(),
                args: format_args_list(args),
            })?;
        self.cache
            .insert_method(class, name, args, Arc::clone(&resolved), self.inspector);
        Ok(resolved)
    }

    /// Resolve a static method overload on a class's static surface,
    /// exactly as an instance member would be resolved.
    pub fn resolve_static_method(
        &self,
        class: TypeHash,
        name: &str,
        args: &[TypeTag],
    ) -> Result<ResolvedStaticMethod, OgnavError> {
        let mut best: Option<(u32, usize, &StaticMethodEntry)> = None;
        let mut index = 0usize;
        for entry in self.registry.class_chain(class) {
            let Some(overloads) = entry.static_methods.get(name) else {
                continue;
            };
            for method in overloads {
                if let Some(cost) = candidate_cost(&method.params, false, args, self.registry)
                {
                    let better = match &best {
                        Some((best_cost, best_index, _)) => {
                            cost < *best_cost || (cost == *best_cost && index < *best_index)
                        }
                        None => true,
                    };
                    if better {
                        best = Some((cost, index, method));
                    }
                }
                index += 1;
            }
        }
        best.map(|(_, _, method)| ResolvedStaticMethod {
            method: method.clone(),
        })
        .ok_or_else(|| OgnavError::NoSuchMethod {
            class: self.registry.class_name(class),
            name: name.to_string(),
            args: format_args_list(args),
        })
    }

    /// Read a static field, walking the superclass chain.
    pub fn static_field(&self, class: TypeHash, name: &str) -> Result<Value, OgnavError> {
        for entry in self.registry.class_chain(class) {
            if let Some(value) = entry.static_fields.get(name) {
                return Ok(value.clone());
            }
        }
        Err(OgnavError::NoSuchProperty {
            class: self.registry.class_name(class),
            name: name.to_string(),
        })
    }

    /// Materialize a method's declared parameter types for a concrete
    /// class, substituting generic variables through the subclass's
    /// bindings. Cached per (concrete class, method identity); the mapping
    /// is stable for the lifetime of the class.
    pub fn find_parameter_types(
        &self,
        concrete: TypeHash,
        method: &MethodEntry,
    ) -> Result<Arc<Vec<TypeTag>>, OgnavError> {
        self.materialize(concrete, method)
    }

    fn materialize(
        &self,
        concrete: TypeHash,
        method: &MethodEntry,
    ) -> Result<Arc<Vec<TypeTag>>, OgnavError> {
        if !method.params.iter().any(|p| matches!(p, TypeTag::Var(_))) {
            return Ok(Arc::new(method.params.clone()));
        }
        if let Some(params) = self.cache.generics(concrete, method.id) {
            return Ok(params);
        }
        let bindings = self.collect_bindings(concrete, method)?;
        let params: Vec<TypeTag> = method
            .params
            .iter()
            .map(|param| substitute_tag(*param, &bindings))
            .collect();
        let params = Arc::new(params);
        self.cache
            .insert_generics(concrete, method.id, Arc::clone(&params), self.inspector);
        Ok(params)
    }

    fn substitute(
        &self,
        concrete: TypeHash,
        tag: TypeTag,
        method: &MethodEntry,
    ) -> Result<TypeTag, OgnavError> {
        if !matches!(tag, TypeTag::Var(_)) {
            return Ok(tag);
        }
        let bindings = self.collect_bindings(concrete, method)?;
        Ok(substitute_tag(tag, &bindings))
    }

    /// Walk from the concrete class toward the method's declaring class,
    /// collecting generic bindings. The most-derived binding wins; a single
    /// class binding the same variable twice to different types is a
    /// conflict that is surfaced, never guessed.
    fn collect_bindings(
        &self,
        concrete: TypeHash,
        method: &MethodEntry,
    ) -> Result<FxHashMap<&'static str, TypeTag>, OgnavError> {
        let mut bindings: FxHashMap<&'static str, TypeTag> = FxHashMap::default();
        for entry in self.registry.class_chain(concrete) {
            let mut seen_here: FxHashMap<&'static str, TypeTag> = FxHashMap::default();
            for &(var, ty) in &entry.generics {
                if let Some(previous) = seen_here.insert(var, ty) {
                    if previous != ty {
                        return Err(OgnavError::AmbiguousResolution {
                            class: self.registry.class_name(concrete),
                            name: method.name.clone(),
                            detail: format!(
                                "{} binds {var} to both {previous} and {ty}",
                                entry.name
                            ),
                        });
                    }
                }
                bindings.entry(var).or_insert(ty);
            }
            if entry.hash == method.declaring {
                break;
            }
        }
        Ok(bindings)
    }
}

fn substitute_tag(tag: TypeTag, bindings: &FxHashMap<&'static str, TypeTag>) -> TypeTag {
    match tag {
        // An unbound variable degrades to its upper bound, i.e. anything.
        TypeTag::Var(name) => bindings.get(name).copied().unwrap_or(TypeTag::Any),
        other => other,
    }
}

/// Total conversion cost of calling a candidate with the given argument
/// types, or `None` if the candidate is not applicable.
fn candidate_cost(
    params: &[TypeTag],
    variadic: bool,
    args: &[TypeTag],
    hierarchy: &dyn ClassHierarchy,
) -> Option<u32> {
    if variadic {
        let (fixed, rest) = params.split_last().map(|(last, fixed)| (fixed, last))?;
        if args.len() < fixed.len() {
            return None;
        }
        let mut total = 0;
        for (param, arg) in fixed.iter().zip(args) {
            total += conversion_cost(param, arg, hierarchy)?;
        }
        for arg in &args[fixed.len()..] {
            total += conversion_cost(rest, arg, hierarchy)?;
        }
        Some(total)
    } else {
        if args.len() != params.len() {
            return None;
        }
        let mut total = 0;
        for (param, arg) in params.iter().zip(args) {
            total += conversion_cost(param, arg, hierarchy)?;
        }
        Some(total)
    }
}

fn format_args_list(args: &[TypeTag]) -> String {
    args.iter()
        .map(|tag| tag.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheEverything;
    use crate::policy::RegistryDescriptorProvider;
    use crate::registry::ClassBuilder;

    struct Parent;
    struct LongChild;
    struct StringChild;

    fn generic_registry() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        registry
            .register(
                ClassBuilder::<Parent>::new("GenericParent")
                    .method("save", &[TypeTag::Var("T")], TypeTag::Var("T"), |_, args| {
                        Ok(args[0].clone())
                    })
                    .build(),
            )
            .unwrap();
        registry
            .register(
                ClassBuilder::<LongChild>::new("LongChild")
                    .extends("GenericParent")
                    .bind_generic("T", TypeTag::Int)
                    .build(),
            )
            .unwrap();
        registry
            .register(
                ClassBuilder::<StringChild>::new("StringChild")
                    .extends("GenericParent")
                    .bind_generic("T", TypeTag::String)
                    .build(),
            )
            .unwrap();
        registry
    }

    fn with_resolver<R>(registry: &TypeRegistry, f: impl FnOnce(&Resolver<'_>) -> R) -> R {
        let provider = RegistryDescriptorProvider::new(Arc::new(TypeRegistry::new()));
        // Member lookups in these tests go through resolve_method only, so
        // the provider registry can be empty.
        let cache = ResolutionCache::new();
        let resolver = Resolver {
            registry,
            provider: &provider,
            cache: &cache,
            inspector: &CacheEverything,
        };
        f(&resolver)
    }

    #[test]
    fn test_generic_materialization_per_subclass_without_bleed() {
        let registry = generic_registry();
        let cache = ResolutionCache::new();
        let provider = RegistryDescriptorProvider::new(Arc::new(TypeRegistry::new()));
        let resolver = Resolver {
            registry: &registry,
            provider: &provider,
            cache: &cache,
            inspector: &CacheEverything,
        };

        let long_child = TypeHash::from_name("LongChild");
        let string_child = TypeHash::from_name("StringChild");

        let long_save = resolver
            .resolve_method(long_child, "save", &[TypeTag::Int])
            .unwrap();
        assert_eq!(long_save.params, vec![TypeTag::Int]);
        assert_eq!(long_save.ret, TypeTag::Int);

        // The sibling subclass must see its own binding, not a cached copy
        // of the previous resolution.
        let string_save = resolver
            .resolve_method(string_child, "save", &[TypeTag::String])
            .unwrap();
        assert_eq!(string_save.params, vec![TypeTag::String]);
        assert_eq!(string_save.ret, TypeTag::String);
    }

    #[test]
    fn test_overload_resolution_deterministic_across_cache_clear() {
        struct Service;
        let mut registry = TypeRegistry::new();
        registry
            .register(
                ClassBuilder::<Service>::new("Service")
                    .method("run", &[TypeTag::Float], TypeTag::String, |_, _| {
                        Ok(Value::from("float"))
                    })
                    .method("run", &[TypeTag::Int], TypeTag::String, |_, _| {
                        Ok(Value::from("int"))
                    })
                    .build(),
            )
            .unwrap();

        let cache = ResolutionCache::new();
        let provider = RegistryDescriptorProvider::new(Arc::new(TypeRegistry::new()));
        let resolver = Resolver {
            registry: &registry,
            provider: &provider,
            cache: &cache,
            inspector: &CacheEverything,
        };
        let class = TypeHash::from_name("Service");

        let first = resolver
            .resolve_method(class, "run", &[TypeTag::Int])
            .unwrap();
        assert_eq!(first.params, vec![TypeTag::Int]);

        cache.clear();
        let second = resolver
            .resolve_method(class, "run", &[TypeTag::Int])
            .unwrap();
        assert_eq!(second.params, vec![TypeTag::Int]);
        assert_eq!(first.method.id, second.method.id);
    }

    #[test]
    fn test_null_argument_prefers_most_specific_reference_param() {
        struct Sink;
        let mut registry = TypeRegistry::new();
        registry
            .register(
                ClassBuilder::<Sink>::new("Sink")
                    .method("add", &[TypeTag::Any], TypeTag::String, |_, _| {
                        Ok(Value::from("any"))
                    })
                    .method("add", &[TypeTag::String], TypeTag::String, |_, _| {
                        Ok(Value::from("string"))
                    })
                    .build(),
            )
            .unwrap();

        with_resolver(&registry, |resolver| {
            let class = TypeHash::from_name("Sink");
            let resolved = resolver
                .resolve_method(class, "add", &[TypeTag::Null])
                .unwrap();
            // Null costs 4 against String, 8 against Any.
            assert_eq!(resolved.method.params, vec![TypeTag::String]);
        });
    }

    #[test]
    fn test_declaration_order_breaks_exact_ties() {
        struct Twice;
        let mut registry = TypeRegistry::new();
        registry
            .register(
                ClassBuilder::<Twice>::new("Twice")
                    .method("go", &[TypeTag::Any], TypeTag::Int, |_, _| Ok(Value::Int(1)))
                    .method("go", &[TypeTag::Any], TypeTag::Int, |_, _| Ok(Value::Int(2)))
                    .build(),
            )
            .unwrap();

        with_resolver(&registry, |resolver| {
            let class = TypeHash::from_name("Twice");
            let resolved = resolver
                .resolve_method(class, "go", &[TypeTag::Bool])
                .unwrap();
            assert_eq!(
                resolved.method.id,
                TypeHash::member(class, "go", 0),
                "earlier declaration must win an exact tie"
            );
        });
    }

    #[test]
    fn test_no_such_method_lists_argument_shape() {
        let registry = generic_registry();
        with_resolver(&registry, |resolver| {
            let err = resolver
                .resolve_method(TypeHash::from_name("LongChild"), "save", &[TypeTag::Bool])
                .unwrap_err();
            match err {
                OgnavError::NoSuchMethod { class, args, .. } => {
                    assert_eq!(class, "LongChild");
                    assert_eq!(args, "bool");
                }
                other => panic!("unexpected error {other:?}"),
            }
        });
    }
}
