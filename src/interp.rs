//! Tree-walking evaluator.
//!
//! Implements get/set semantics per node kind: member resolution through
//! the engine's policies, chain threading with the one-shot root fallback,
//! short-circuit booleans through the shared coercion rules, and the
//! indexed-accessor handoff between a named property segment and the index
//! segment that follows it.

use ognav_core::ops::{self, boolean_value};
use ognav_core::{OgnavError, ResolvedMember, TypeHash, TypeTag, Value};
use ognav_parser::{Ast, Constant, NodeId, NodeKind};

use crate::context::OgnvContext;
use crate::engine::EngineInner;
use crate::sandbox;

/// Scratch keys for the indexed-accessor handoff: a named property segment
/// that resolves to index-taking read/write methods stashes itself here and
/// lets the following `[index]` segment complete the access.
pub(crate) const SCRATCH_INDEXED_NAME: &str = "indexed.name";
pub(crate) const SCRATCH_INDEXED_OWNER: &str = "indexed.owner";

pub(crate) struct Interp<'a> {
    engine: &'a EngineInner,
    ast: &'a Ast,
}

impl<'a> Interp<'a> {
    pub(crate) fn new(engine: &'a EngineInner, ast: &'a Ast) -> Self {
        Interp { engine, ast }
    }

    // =========================================
    // Reads
    // =========================================

    pub(crate) fn get(&self, id: NodeId, ctx: &mut OgnvContext) -> Result<Value, OgnavError> {
        match self.ast.kind(id) {
            NodeKind::Const(constant) => Ok(const_value(constant)),
            NodeKind::RootRef => Ok(ctx.root().clone()),
            NodeKind::ThisRef => Ok(ctx.current().clone()),
            NodeKind::VarRef(name) => {
                Ok(ctx.variable(name).cloned().unwrap_or(Value::Null))
            }
            NodeKind::Not => {
                let operand = self.get(self.ast.children(id)[0], ctx)?;
                Ok(Value::Bool(!boolean_value(&operand)))
            }
            NodeKind::Negate => {
                let operand = self.get(self.ast.children(id)[0], ctx)?;
                ops::negate(&operand)
            }
            NodeKind::And => {
                let children = self.ast.children(id);
                let left = self.get(children[0], ctx)?;
                if !boolean_value(&left) {
                    return Ok(left);
                }
                self.get(children[1], ctx)
            }
            NodeKind::Or => {
                let children = self.ast.children(id);
                let left = self.get(children[0], ctx)?;
                if boolean_value(&left) {
                    return Ok(left);
                }
                self.get(children[1], ctx)
            }
            NodeKind::Binary(op) => {
                let children = self.ast.children(id);
                let left = self.get(children[0], ctx)?;
                let right = self.get(children[1], ctx)?;
                ops::binary(*op, &left, &right)
            }
            NodeKind::Sequence => {
                let mut last = Value::Null;
                for &child in self.ast.children(id) {
                    last = self.get(child, ctx)?;
                }
                Ok(last)
            }
            NodeKind::Chain => self.chain_get(id, ctx),
            NodeKind::Property { indexed: false } => {
                let name = self.property_name(id, ctx)?;
                self.read_property(id, &name, ctx)
            }
            NodeKind::Property { indexed: true } => self.indexed_get(id, ctx),
            NodeKind::Method { name } => self.invoke_method(id, name, ctx),
            NodeKind::StaticField { class, field } => {
                let class = self
                    .engine
                    .class_resolver
                    .resolve_class(class, ctx.aliases())?;
                self.engine.static_field(class, field)
            }
            NodeKind::StaticMethod { class, method } => {
                self.invoke_static(id, class, method, ctx)
            }
        }
    }

    /// Chain threading: each segment's value becomes the cursor for the
    /// next. A segment that fails against the current object is retried
    /// once against the chain's root with the cursor restored afterward;
    /// only a failure on both paths propagates (as the original error).
    fn chain_get(&self, id: NodeId, ctx: &mut OgnvContext) -> Result<Value, OgnavError> {
        let saved = ctx.current().clone();
        for &segment in self.ast.children(id) {
            let value = match self.get(segment, ctx) {
                Ok(value) => value,
                Err(err) => {
                    let prior = ctx.current().clone();
                    ctx.set_current(ctx.root().clone());
                    let retry = self.get(segment, ctx);
                    ctx.set_current(prior);
                    match retry {
                        Ok(value) => value,
                        Err(_) => {
                            ctx.set_current(saved);
                            return Err(err);
                        }
                    }
                }
            };
            ctx.set_current(value);
        }
        let result = ctx.current().clone();
        ctx.set_current(saved);
        Ok(result)
    }

    /// Resolve the name of a property segment. The name is itself an
    /// expression (computed property names); it is evaluated against the
    /// root, not the chain cursor.
    fn property_name(&self, id: NodeId, ctx: &mut OgnvContext) -> Result<String, OgnavError> {
        if let Some(name) = self.ast.property_name(id) {
            return Ok(name.to_string());
        }
        let name_node = self.ast.children(id)[0];
        let value = self.eval_at_root(name_node, ctx)?;
        match value {
            Value::String(name) => Ok(name),
            other => Ok(other.to_string()),
        }
    }

    fn read_property(
        &self,
        id: NodeId,
        name: &str,
        ctx: &mut OgnvContext,
    ) -> Result<Value, OgnavError> {
        let owner = ctx.current().clone();
        match &owner {
            Value::Object(obj) => {
                if self.wants_indexed_access(id, obj.class(), name) {
                    ctx.scratch_put(SCRATCH_INDEXED_NAME, Value::String(name.to_string()));
                    ctx.scratch_put(SCRATCH_INDEXED_OWNER, owner.clone());
                    // The following index segment completes the read, so the
                    // cursor stays on the owner.
                    return Ok(owner.clone());
                }
                let member = self.engine.resolve_member(obj.class(), name)?;
                let declaring = member.declaring();
                let registry = &self.engine.registry;
                let value = match member.as_ref() {
                    ResolvedMember::Accessor {
                        getter: Some(getter),
                        ..
                    } => registry.with_instance(obj, declaring, |state| getter(state))?,
                    ResolvedMember::Field { get, .. } => {
                        registry.with_instance(obj, declaring, |state| get(state))?
                    }
                    ResolvedMember::Indexed { .. } => {
                        return Err(OgnavError::inappropriate(format!(
                            "indexed property '{name}' requires an index"
                        )));
                    }
                    ResolvedMember::Accessor { getter: None, .. } => {
                        return Err(OgnavError::NoSuchProperty {
                            class: self.engine.registry.class_name(obj.class()),
                            name: name.to_string(),
                        });
                    }
                };
                if value.is_null() {
                    return Ok(self
                        .engine
                        .null_handler
                        .null_property_value(ctx.root(), &owner, name));
                }
                Ok(value)
            }
            Value::Array(arr) => match name {
                "length" | "size" => Ok(Value::Int(arr.len() as i64)),
                _ => Err(OgnavError::NoSuchProperty {
                    class: "array".to_string(),
                    name: name.to_string(),
                }),
            },
            Value::String(s) => match name {
                "length" => Ok(Value::Int(s.chars().count() as i64)),
                _ => Err(OgnavError::NoSuchProperty {
                    class: "string".to_string(),
                    name: name.to_string(),
                }),
            },
            Value::Null => Err(OgnavError::inappropriate(format!(
                "cannot read property '{name}' of null"
            ))),
            other => Err(OgnavError::inappropriate(format!(
                "cannot read property '{name}' of {}",
                other.type_name()
            ))),
        }
    }

    /// Whether a named segment should defer to index-taking read/write
    /// methods. Requires a following `[index]` segment and an indexed
    /// descriptor on the class. When a zero-argument getter also exists the
    /// getter wins at the head of a chain, the indexed methods elsewhere.
    fn wants_indexed_access(&self, id: NodeId, class: TypeHash, name: &str) -> bool {
        let followed_by_index = matches!(
            self.ast.next_sibling(id).map(|s| self.ast.kind(s)),
            Some(NodeKind::Property { indexed: true })
        );
        if !followed_by_index || !self.engine.has_indexed_descriptor(class, name) {
            return false;
        }
        if self.engine.has_plain_descriptor(class, name) {
            let at_chain_head = match self.ast.parent(id) {
                Some(parent) => self.ast.children(parent).first() == Some(&id),
                None => true,
            };
            return !at_chain_head;
        }
        true
    }

    fn indexed_get(&self, id: NodeId, ctx: &mut OgnvContext) -> Result<Value, OgnavError> {
        // Claim the handoff before evaluating the index expression; the
        // index may itself contain an indexed access that goes through the
        // same scratch keys.
        let handoff = self.take_handoff(ctx)?;
        let index = self.eval_at_root(self.ast.children(id)[0], ctx)?;
        if let Some((owner, name)) = handoff {
            let obj = owner
                .as_object()
                .ok_or_else(|| OgnavError::native("indexed handoff owner is not an object"))?;
            let member = self.engine.resolve_member(obj.class(), &name)?;
            let declaring = member.declaring();
            return match member.as_ref() {
                ResolvedMember::Indexed { read, .. } => self
                    .engine
                    .registry
                    .with_instance(obj, declaring, |state| read(state, &index)),
                _ => Err(OgnavError::inappropriate(format!(
                    "'{name}' is not an indexed property"
                ))),
            };
        }
        match ctx.current() {
            Value::Array(arr) => {
                let idx = array_index(&index)?;
                arr.get(idx).ok_or_else(|| {
                    OgnavError::native(format!("index {idx} out of bounds (len {})", arr.len()))
                })
            }
            other => Err(OgnavError::inappropriate(format!(
                "cannot index into {}",
                other.type_name()
            ))),
        }
    }

    /// Take the indexed-accessor stash left by the preceding named segment,
    /// if any. Both keys are claimed together so a nested indexed access
    /// inside the index expression sees an empty stash.
    fn take_handoff(
        &self,
        ctx: &mut OgnvContext,
    ) -> Result<Option<(Value, String)>, OgnavError> {
        let Some(owner) = ctx.scratch_take(SCRATCH_INDEXED_OWNER) else {
            return Ok(None);
        };
        match ctx.scratch_take(SCRATCH_INDEXED_NAME) {
            Some(Value::String(name)) => Ok(Some((owner, name))),
            _ => Err(OgnavError::native("indexed handoff lost its name")),
        }
    }

    // =========================================
    // Writes
    // =========================================

    pub(crate) fn set(
        &self,
        id: NodeId,
        ctx: &mut OgnvContext,
        value: Value,
    ) -> Result<(), OgnavError> {
        match self.ast.kind(id) {
            NodeKind::Chain => self.chain_set(id, ctx, value),
            NodeKind::Property { indexed: false } => {
                let name = self.property_name(id, ctx)?;
                self.write_property(&name, ctx, value)
            }
            NodeKind::Property { indexed: true } => self.indexed_set(id, ctx, value),
            NodeKind::VarRef(name) => {
                ctx.set_variable(name.clone(), value);
                Ok(())
            }
            other => Err(OgnavError::inappropriate(format!(
                "cannot assign through {other:?}"
            ))),
        }
    }

    fn chain_set(
        &self,
        id: NodeId,
        ctx: &mut OgnvContext,
        value: Value,
    ) -> Result<(), OgnavError> {
        let children = self.ast.children(id);
        let (last, prefix) = children
            .split_last()
            .ok_or_else(|| OgnavError::inappropriate("empty chain"))?;
        let saved = ctx.current().clone();
        for &segment in prefix {
            let next = match self.get(segment, ctx) {
                Ok(next) => next,
                Err(err) => {
                    let prior = ctx.current().clone();
                    ctx.set_current(ctx.root().clone());
                    let retry = self.get(segment, ctx);
                    ctx.set_current(prior);
                    match retry {
                        Ok(next) => next,
                        Err(_) => {
                            ctx.set_current(saved);
                            return Err(err);
                        }
                    }
                }
            };
            ctx.set_current(next);
        }
        let result = self.set(*last, ctx, value);
        ctx.set_current(saved);
        result
    }

    fn write_property(
        &self,
        name: &str,
        ctx: &mut OgnvContext,
        value: Value,
    ) -> Result<(), OgnavError> {
        let owner = ctx.current().clone();
        match &owner {
            Value::Object(obj) => {
                let member = self.engine.resolve_member(obj.class(), name)?;
                let declaring = member.declaring();
                let registry = &self.engine.registry;
                match member.as_ref() {
                    ResolvedMember::Accessor {
                        setter: Some(setter),
                        ..
                    } => registry.with_instance_mut(obj, declaring, |state| setter(state, value)),
                    ResolvedMember::Field {
                        set: Some(set), ..
                    } => registry.with_instance_mut(obj, declaring, |state| set(state, value)),
                    ResolvedMember::Indexed { .. } => Err(OgnavError::inappropriate(format!(
                        "indexed property '{name}' requires an index"
                    ))),
                    _ => Err(OgnavError::NoSuchProperty {
                        class: self.engine.registry.class_name(obj.class()),
                        name: name.to_string(),
                    }),
                }
            }
            Value::Null => Err(OgnavError::inappropriate(format!(
                "cannot assign property '{name}' of null"
            ))),
            other => Err(OgnavError::inappropriate(format!(
                "cannot assign property '{name}' of {}",
                other.type_name()
            ))),
        }
    }

    fn indexed_set(
        &self,
        id: NodeId,
        ctx: &mut OgnvContext,
        value: Value,
    ) -> Result<(), OgnavError> {
        let handoff = self.take_handoff(ctx)?;
        let index = self.eval_at_root(self.ast.children(id)[0], ctx)?;
        if let Some((owner, name)) = handoff {
            let obj = owner
                .as_object()
                .ok_or_else(|| OgnavError::native("indexed handoff owner is not an object"))?;
            let member = self.engine.resolve_member(obj.class(), &name)?;
            let declaring = member.declaring();
            return match member.as_ref() {
                ResolvedMember::Indexed {
                    write: Some(write), ..
                } => self
                    .engine
                    .registry
                    .with_instance_mut(obj, declaring, |state| write(state, &index, value)),
                ResolvedMember::Indexed { write: None, .. } => {
                    Err(OgnavError::NoSuchProperty {
                        class: self.engine.registry.class_name(obj.class()),
                        name,
                    })
                }
                _ => Err(OgnavError::inappropriate(format!(
                    "'{name}' is not an indexed property"
                ))),
            };
        }
        match ctx.current() {
            Value::Array(arr) => {
                let idx = array_index(&index)?;
                arr.set(idx, value)
            }
            other => Err(OgnavError::inappropriate(format!(
                "cannot index into {}",
                other.type_name()
            ))),
        }
    }

    // =========================================
    // Invocation
    // =========================================

    fn invoke_method(
        &self,
        id: NodeId,
        name: &str,
        ctx: &mut OgnvContext,
    ) -> Result<Value, OgnavError> {
        let target = ctx.current().clone();
        let obj = target.as_object().ok_or_else(|| {
            OgnavError::inappropriate(format!(
                "cannot invoke '{name}' on {}",
                target.type_name()
            ))
        })?;
        let args = self.eval_args(id, ctx)?;
        let tags: Vec<TypeTag> = args.iter().map(Value::tag).collect();
        let resolved = self.engine.resolve_method(obj.class(), name, &tags)?;
        let declaring = resolved.method.declaring;
        let chain = self.engine.class_chain_names(declaring);
        match sandbox::guard(&chain, name, || {
            self.engine
                .registry
                .with_instance_mut(obj, declaring, |state| (resolved.method.invoke)(state, &args))
        }) {
            Ok(value) => Ok(value),
            Err(err @ OgnavError::Security { .. }) => Err(err),
            Err(cause) => Err(OgnavError::method_failed(name, cause)),
        }
    }

    fn invoke_static(
        &self,
        id: NodeId,
        class: &str,
        method: &str,
        ctx: &mut OgnvContext,
    ) -> Result<Value, OgnavError> {
        let class = self
            .engine
            .class_resolver
            .resolve_class(class, ctx.aliases())
            .map_err(|cause| OgnavError::method_failed(method, cause))?;
        let args = self.eval_args(id, ctx)?;
        let tags: Vec<TypeTag> = args.iter().map(Value::tag).collect();
        let resolved = self.engine.resolve_static_method(class, method, &tags)?;
        let chain = self.engine.class_chain_names(resolved.method.declaring);
        match sandbox::guard(&chain, method, || (resolved.method.invoke)(&args)) {
            Ok(value) => Ok(value),
            Err(err @ OgnavError::Security { .. }) => Err(err),
            Err(cause) => Err(OgnavError::method_failed(method, cause)),
        }
    }

    /// Arguments are full expressions evaluated against the root, not the
    /// chain cursor, so `service.exec(count)` reads `count` off the root.
    fn eval_args(&self, id: NodeId, ctx: &mut OgnvContext) -> Result<Vec<Value>, OgnavError> {
        let mut args = Vec::with_capacity(self.ast.children(id).len());
        for &child in self.ast.children(id) {
            args.push(self.eval_at_root(child, ctx)?);
        }
        Ok(args)
    }

    fn eval_at_root(&self, id: NodeId, ctx: &mut OgnvContext) -> Result<Value, OgnavError> {
        let saved = ctx.current().clone();
        ctx.set_current(ctx.root().clone());
        let result = self.get(id, ctx);
        ctx.set_current(saved);
        result
    }
}

pub(crate) fn const_value(constant: &Constant) -> Value {
    match constant {
        Constant::Null => Value::Null,
        Constant::Bool(v) => Value::Bool(*v),
        Constant::Int(v) => Value::Int(*v),
        Constant::Float(v) => Value::Float(*v),
        Constant::Str(v) => Value::String(v.clone()),
    }
}

pub(crate) fn array_index(index: &Value) -> Result<usize, OgnavError> {
    match index {
        Value::Int(n) if *n >= 0 => Ok(*n as usize),
        other => Err(OgnavError::inappropriate(format!(
            "array index must be a non-negative int, got {other}"
        ))),
    }
}
