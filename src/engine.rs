//! The engine: parsed expressions, policy wiring, and the public
//! evaluate/assign/compile surface.

use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use ognav_core::{
    CacheEverything, CacheInspector, ClassResolver, MemberDescriptorProvider, NullHandler,
    NullStaysNull, OgnavError, RegistryClassResolver, RegistryDescriptorProvider,
    ResolutionCache, ResolvedMember, ResolvedMethod, ResolvedStaticMethod, Resolver,
    TypeHash, TypeRegistry, TypeTag, Value,
};
use ognav_parser::{Ast, ParseError, Parser};

use crate::compiler::{CompiledAccessor, Compiler};
use crate::context::OgnvContext;
use crate::error::EngineError;
use crate::interp::Interp;

/// Shared engine state: registry, policies and caches. Everything here is
/// either immutable after construction or internally synchronized, so one
/// engine serves concurrent callers without external locking.
pub(crate) struct EngineInner {
    pub(crate) registry: Arc<TypeRegistry>,
    pub(crate) provider: Arc<dyn MemberDescriptorProvider>,
    pub(crate) class_resolver: Arc<dyn ClassResolver>,
    pub(crate) null_handler: Arc<dyn NullHandler>,
    pub(crate) cache: ResolutionCache,
    inspector: RwLock<Arc<dyn CacheInspector>>,
    pub(crate) aliases: FxHashMap<String, String>,
}

impl EngineInner {
    fn with_resolver<R>(&self, f: impl FnOnce(&Resolver<'_>) -> R) -> R {
        let inspector = Arc::clone(&self.inspector.read());
        let resolver = Resolver {
            registry: self.registry.as_ref(),
            provider: self.provider.as_ref(),
            cache: &self.cache,
            inspector: inspector.as_ref(),
        };
        f(&resolver)
    }

    pub(crate) fn resolve_member(
        &self,
        class: TypeHash,
        name: &str,
    ) -> Result<Arc<ResolvedMember>, OgnavError> {
        self.with_resolver(|r| r.resolve_member(class, name))
    }

    pub(crate) fn resolve_method(
        &self,
        class: TypeHash,
        name: &str,
        args: &[TypeTag],
    ) -> Result<Arc<ResolvedMethod>, OgnavError> {
        self.with_resolver(|r| r.resolve_method(class, name, args))
    }

    pub(crate) fn resolve_static_method(
        &self,
        class: TypeHash,
        name: &str,
        args: &[TypeTag],
    ) -> Result<ResolvedStaticMethod, OgnavError> {
        self.with_resolver(|r| r.resolve_static_method(class, name, args))
    }

    pub(crate) fn static_field(
        &self,
        class: TypeHash,
        name: &str,
    ) -> Result<Value, OgnavError> {
        self.with_resolver(|r| r.static_field(class, name))
    }

    /// Class names along the superclass chain, most-derived first. This is
    /// what the sandbox denylist matches against.
    pub(crate) fn class_chain_names(&self, class: TypeHash) -> Vec<String> {
        self.registry
            .class_chain(class)
            .map(|entry| entry.name.clone())
            .collect()
    }

    /// Whether the class (or a superclass) declares index-taking
    /// read/write methods under `name`.
    pub(crate) fn has_indexed_descriptor(&self, class: TypeHash, name: &str) -> bool {
        self.registry
            .class_chain(class)
            .any(|entry| entry.indexed.contains_key(name))
    }

    /// Whether the class (or a superclass) declares a plain property or
    /// field under `name`, i.e. a zero-argument read path.
    pub(crate) fn has_plain_descriptor(&self, class: TypeHash, name: &str) -> bool {
        self.registry.class_chain(class).any(|entry| {
            entry.properties.contains_key(name) || entry.fields.contains_key(name)
        })
    }
}

/// A parsed expression, reusable across roots and threads.
///
/// Holds the tree plus an optional specialized accessor installed by
/// [`Engine::compile_expression`]. The accessor slot is set-once; racing
/// first-time compilations may do redundant work but exactly one result is
/// installed.
pub struct Expression {
    source: String,
    ast: Arc<Ast>,
    compiled: OnceLock<CompiledAccessor>,
}

impl Expression {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn ast(&self) -> &Ast {
        &self.ast
    }

    /// Whether a specialized accessor has been installed.
    pub fn is_compiled(&self) -> bool {
        self.compiled.get().is_some()
    }
}

/// The expression engine.
///
/// Construct one per registry (cheap to clone via internal `Arc`), parse
/// expressions once, then evaluate or assign against any number of roots:
///
/// ```
/// use ognav::{ClassBuilder, Engine, TypeHash, TypeRegistry, TypeTag, Value};
///
/// struct Point { x: i64 }
///
/// let mut registry = TypeRegistry::new();
/// registry
///     .register(
///         ClassBuilder::<Point>::new("Point")
///             .property("x", TypeTag::Int, |p| Value::Int(p.x))
///             .build(),
///     )
///     .unwrap();
///
/// let engine = Engine::new(registry);
/// let root = Value::object(TypeHash::from_name("Point"), Point { x: 7 });
/// assert_eq!(engine.evaluate("x + 1", &root).unwrap(), Value::Int(8));
/// ```
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    /// An engine with the default registry-backed policies.
    pub fn new(registry: TypeRegistry) -> Self {
        Engine::builder(registry).build()
    }

    pub fn builder(registry: TypeRegistry) -> EngineBuilder {
        EngineBuilder::new(registry)
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.inner.registry
    }

    pub fn parse(&self, source: &str) -> Result<Expression, ParseError> {
        let ast = Parser::parse(source)?;
        Ok(Expression {
            source: source.to_string(),
            ast: Arc::new(ast),
            compiled: OnceLock::new(),
        })
    }

    fn context(&self, root: &Value) -> OgnvContext {
        let mut ctx = OgnvContext::new(root.clone());
        ctx.set_aliases(self.inner.aliases.clone());
        ctx
    }

    /// Evaluate a parsed expression against a root. Uses the installed
    /// specialized accessor when one exists, otherwise interprets.
    pub fn get_value(&self, expr: &Expression, root: &Value) -> Result<Value, OgnavError> {
        let mut ctx = self.context(root);
        self.get_with_context(expr, &mut ctx)
    }

    /// Like [`Engine::get_value`] with `#name` context variables bound.
    pub fn get_value_with(
        &self,
        expr: &Expression,
        root: &Value,
        variables: FxHashMap<String, Value>,
    ) -> Result<Value, OgnavError> {
        let mut ctx = OgnvContext::with_variables(root.clone(), variables);
        ctx.set_aliases(self.inner.aliases.clone());
        self.get_with_context(expr, &mut ctx)
    }

    fn get_with_context(
        &self,
        expr: &Expression,
        ctx: &mut OgnvContext,
    ) -> Result<Value, OgnavError> {
        if let Some(accessor) = expr.compiled.get() {
            return accessor.get(ctx);
        }
        Interp::new(&self.inner, &expr.ast).get(expr.ast.root(), ctx)
    }

    /// Assign a value through a parsed expression.
    pub fn set_value(
        &self,
        expr: &Expression,
        root: &Value,
        value: Value,
    ) -> Result<(), OgnavError> {
        let mut ctx = self.context(root);
        if let Some(accessor) = expr.compiled.get() {
            return accessor.set(&mut ctx, value);
        }
        Interp::new(&self.inner, &expr.ast).set(expr.ast.root(), &mut ctx, value)
    }

    /// Parse-and-evaluate convenience for one-off expressions.
    pub fn evaluate(&self, source: &str, root: &Value) -> Result<Value, EngineError> {
        let expr = self.parse(source)?;
        Ok(self.get_value(&expr, root)?)
    }

    /// Parse-and-assign convenience.
    pub fn assign(&self, source: &str, root: &Value, value: Value) -> Result<(), EngineError> {
        let expr = self.parse(source)?;
        Ok(self.set_value(&expr, root, value)?)
    }

    /// Specialize an expression against a sample root and install the
    /// result on the expression. Infallible: any node that cannot be
    /// statically translated degrades that axis to an interpreter shim,
    /// never to an error or a wrong answer. Idempotent after success.
    pub fn compile_expression<'e>(
        &self,
        expr: &'e Expression,
        root: &Value,
    ) -> &'e CompiledAccessor {
        expr.compiled.get_or_init(move || {
            let mut ctx = self.context(root);
            Compiler::new(&self.inner, &expr.ast).compile(&mut ctx)
        })
    }

    /// Drop every cached resolution.
    pub fn clear_cache(&self) {
        self.inner.cache.clear();
    }

    /// Number of cached member descriptors.
    pub fn cache_size(&self) -> usize {
        self.inner.cache.member_count()
    }

    /// Number of cached member descriptors for one class.
    pub fn cache_size_for(&self, class: TypeHash) -> usize {
        self.inner.cache.member_count_for(class)
    }

    /// Replace the cache-admission policy. Existing entries are kept;
    /// call [`Engine::clear_cache`] to evict them.
    pub fn set_cache_inspector(&self, inspector: Arc<dyn CacheInspector>) {
        *self.inner.inspector.write() = inspector;
    }
}

/// Builder for an [`Engine`] with non-default policies.
pub struct EngineBuilder {
    registry: Arc<TypeRegistry>,
    provider: Option<Arc<dyn MemberDescriptorProvider>>,
    class_resolver: Option<Arc<dyn ClassResolver>>,
    null_handler: Option<Arc<dyn NullHandler>>,
    inspector: Arc<dyn CacheInspector>,
    aliases: FxHashMap<String, String>,
}

impl EngineBuilder {
    fn new(registry: TypeRegistry) -> Self {
        EngineBuilder {
            registry: Arc::new(registry),
            provider: None,
            class_resolver: None,
            null_handler: None,
            inspector: Arc::new(CacheEverything),
            aliases: FxHashMap::default(),
        }
    }

    pub fn member_provider(mut self, provider: Arc<dyn MemberDescriptorProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn class_resolver(mut self, resolver: Arc<dyn ClassResolver>) -> Self {
        self.class_resolver = Some(resolver);
        self
    }

    pub fn null_handler(mut self, handler: Arc<dyn NullHandler>) -> Self {
        self.null_handler = Some(handler);
        self
    }

    pub fn cache_inspector(mut self, inspector: Arc<dyn CacheInspector>) -> Self {
        self.inspector = inspector;
        self
    }

    /// Register a contextual class alias usable in `@Alias@member`.
    pub fn alias(mut self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.aliases.insert(name.into(), target.into());
        self
    }

    pub fn build(self) -> Engine {
        let registry = self.registry;
        let provider = self
            .provider
            .unwrap_or_else(|| Arc::new(RegistryDescriptorProvider::new(Arc::clone(&registry))));
        let class_resolver = self
            .class_resolver
            .unwrap_or_else(|| Arc::new(RegistryClassResolver::new(Arc::clone(&registry))));
        let null_handler = self
            .null_handler
            .unwrap_or_else(|| Arc::new(NullStaysNull));
        Engine {
            inner: Arc::new(EngineInner {
                registry,
                provider,
                class_resolver,
                null_handler,
                cache: ResolutionCache::new(),
                inspector: RwLock::new(self.inspector),
                aliases: self.aliases,
            }),
        }
    }
}
