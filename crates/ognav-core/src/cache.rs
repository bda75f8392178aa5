//! Cross-call resolution caches.
//!
//! Resolution cost (member lookup order, overload ranking, generic
//! materialization) is paid once per shape and memoized here. The maps are
//! concurrent and reader-favoring: readers of already-resolved entries never
//! block behind writers of unrelated keys. Failed lookups are never cached,
//! so a class whose registered shape is replaced cannot be masked by a stale
//! negative entry.

use std::sync::Arc;

use dashmap::DashMap;

use crate::resolve::{ResolvedMember, ResolvedMethod};
use crate::type_hash::TypeHash;
use crate::type_tag::TypeTag;

/// Cache-admission policy: consulted before any insertion.
///
/// Lets an embedder exclude dynamically generated or short-lived classes
/// from the caches, preventing unbounded growth. Rejected classes are still
/// resolved correctly on every call; they just never occupy a cache slot.
pub trait CacheInspector: Send + Sync {
    fn should_cache(&self, class: TypeHash) -> bool;
}

/// Default admission policy: cache everything.
pub struct CacheEverything;

impl CacheInspector for CacheEverything {
    fn should_cache(&self, _class: TypeHash) -> bool {
        true
    }
}

/// The engine's shared resolution caches.
#[derive(Default)]
pub struct ResolutionCache {
    /// (class, member name) -> resolved property/indexed/field descriptor.
    members: DashMap<(TypeHash, String), Arc<ResolvedMember>>,
    /// (class, method name, argument shape) -> ranked overload with
    /// materialized parameter types.
    methods: DashMap<(TypeHash, String, Vec<TypeTag>), Arc<ResolvedMethod>>,
    /// (concrete class, method id) -> materialized generic parameter types.
    generics: DashMap<(TypeHash, TypeHash), Arc<Vec<TypeTag>>>,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn member(&self, class: TypeHash, name: &str) -> Option<Arc<ResolvedMember>> {
        self.members
            .get(&(class, name.to_string()))
            .map(|entry| Arc::clone(&entry))
    }

    pub fn insert_member(
        &self,
        class: TypeHash,
        name: &str,
        member: Arc<ResolvedMember>,
        inspector: &dyn CacheInspector,
    ) {
        if inspector.should_cache(class) {
            self.members.insert((class, name.to_string()), member);
        }
    }

    pub fn method(
        &self,
        class: TypeHash,
        name: &str,
        args: &[TypeTag],
    ) -> Option<Arc<ResolvedMethod>> {
        self.methods
            .get(&(class, name.to_string(), args.to_vec()))
            .map(|entry| Arc::clone(&entry))
    }

    pub fn insert_method(
        &self,
        class: TypeHash,
        name: &str,
        args: &[TypeTag],
        method: Arc<ResolvedMethod>,
        inspector: &dyn CacheInspector,
    ) {
        if inspector.should_cache(class) {
            self.methods
                .insert((class, name.to_string(), args.to_vec()), method);
        }
    }

    pub fn generics(&self, class: TypeHash, method: TypeHash) -> Option<Arc<Vec<TypeTag>>> {
        self.generics
            .get(&(class, method))
            .map(|entry| Arc::clone(&entry))
    }

    pub fn insert_generics(
        &self,
        class: TypeHash,
        method: TypeHash,
        params: Arc<Vec<TypeTag>>,
        inspector: &dyn CacheInspector,
    ) {
        if inspector.should_cache(class) {
            self.generics.insert((class, method), params);
        }
    }

    /// Number of cached member descriptors.
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Number of cached member descriptors for one class.
    pub fn member_count_for(&self, class: TypeHash) -> usize {
        self.members
            .iter()
            .filter(|entry| entry.key().0 == class)
            .count()
    }

    /// Wholesale invalidation of all three maps.
    pub fn clear(&self) {
        self.members.clear();
        self.methods.clear();
        self.generics.clear();
    }
}
