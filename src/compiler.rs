//! Specialization compiler.
//!
//! Promotes an expression tree from tree-walking to a pair of typed
//! closures. Compilation performs one sample walk against the provided
//! root: every node is evaluated once to observe concrete runtime types,
//! and a step closure is emitted that captures the member resolved for the
//! observed class. At runtime each emitted step re-checks the owner's
//! concrete class and falls back to dynamic resolution on mismatch, so a
//! specialized accessor can never disagree with the interpreter; the class
//! check is the closure analog of the narrowing cast.
//!
//! A node that cannot be statically translated (computed property names,
//! per-call variables, an untyped null in the middle of a chain, a sample
//! walk that fails) degrades the whole axis to a shim that delegates to the
//! interpreter. That failure mode trades speed for correctness and never
//! reaches the caller.

use std::sync::Arc;

use thiserror::Error;

use ognav_core::ops::{self, boolean_value};
use ognav_core::{ObjectRef, OgnavError, ResolvedMember, TypeTag, Value};
use ognav_parser::{Ast, NodeId, NodeKind};

use crate::context::OgnvContext;
use crate::engine::EngineInner;
use crate::interp::{array_index, const_value, Interp};
use crate::sandbox;

pub(crate) type GetStep =
    Arc<dyn Fn(&mut OgnvContext) -> Result<Value, OgnavError> + Send + Sync>;
pub(crate) type SetStep =
    Arc<dyn Fn(&mut OgnvContext, Value) -> Result<(), OgnavError> + Send + Sync>;

/// Raised per axis when a node has no static translation. Absorbed by the
/// shim fallback; callers of the engine never see it.
#[derive(Debug, Error)]
#[error("cannot specialize: {detail}")]
pub(crate) struct UncompilableExpression {
    detail: String,
}

impl UncompilableExpression {
    fn new(detail: impl Into<String>) -> Self {
        UncompilableExpression {
            detail: detail.into(),
        }
    }
}

/// The specialized get/set pair installed on an [`Expression`]
/// (crate::Expression). Set-once, read-many; absence means "interpret".
pub struct CompiledAccessor {
    get: GetStep,
    set: SetStep,
}

impl CompiledAccessor {
    pub fn get(&self, ctx: &mut OgnvContext) -> Result<Value, OgnavError> {
        (self.get)(ctx)
    }

    pub fn set(&self, ctx: &mut OgnvContext, value: Value) -> Result<(), OgnavError> {
        (self.set)(ctx, value)
    }
}

/// One emitted read step plus the value the sample walk observed for it.
/// The sample drives the typing of everything downstream.
struct Emitted {
    step: GetStep,
    sample: Value,
}

pub(crate) struct Compiler<'a> {
    engine: &'a Arc<EngineInner>,
    ast: &'a Arc<Ast>,
}

impl<'a> Compiler<'a> {
    pub(crate) fn new(engine: &'a Arc<EngineInner>, ast: &'a Arc<Ast>) -> Self {
        Compiler { engine, ast }
    }

    /// Compile both axes. Each axis independently falls back to the
    /// interpreter shim when its translation fails.
    pub(crate) fn compile(&self, ctx: &mut OgnvContext) -> CompiledAccessor {
        let get = match self.emit_get(self.ast.root(), ctx) {
            Ok(emitted) => emitted.step,
            Err(_) => self.shim_get(),
        };
        let mut set_ctx = OgnvContext::new(ctx.root().clone());
        set_ctx.set_aliases(ctx.aliases().clone());
        let set = match self.emit_set(self.ast.root(), &mut set_ctx) {
            Ok(step) => step,
            Err(_) => self.shim_set(),
        };
        CompiledAccessor { get, set }
    }

    fn shim_get(&self) -> GetStep {
        let engine = Arc::clone(self.engine);
        let ast = Arc::clone(self.ast);
        Arc::new(move |ctx| Interp::new(&engine, &ast).get(ast.root(), ctx))
    }

    fn shim_set(&self) -> SetStep {
        let engine = Arc::clone(self.engine);
        let ast = Arc::clone(self.ast);
        Arc::new(move |ctx, value| Interp::new(&engine, &ast).set(ast.root(), ctx, value))
    }

    // =========================================
    // Read axis
    // =========================================

    fn emit_get(
        &self,
        id: NodeId,
        ctx: &mut OgnvContext,
    ) -> Result<Emitted, UncompilableExpression> {
        match self.ast.kind(id) {
            NodeKind::Const(constant) => {
                let value = const_value(constant);
                let captured = value.clone();
                Ok(Emitted {
                    step: Arc::new(move |_| Ok(captured.clone())),
                    sample: value,
                })
            }
            NodeKind::RootRef => Ok(Emitted {
                step: Arc::new(|ctx| Ok(ctx.root().clone())),
                sample: ctx.root().clone(),
            }),
            NodeKind::ThisRef => Ok(Emitted {
                step: Arc::new(|ctx| Ok(ctx.current().clone())),
                sample: ctx.current().clone(),
            }),
            NodeKind::VarRef(_) => Err(UncompilableExpression::new(
                "context variables are bound per call",
            )),
            NodeKind::Not => {
                let child = self.emit_get(self.ast.children(id)[0], ctx)?;
                let sample = Value::Bool(!boolean_value(&child.sample));
                let step = child.step;
                Ok(Emitted {
                    step: Arc::new(move |ctx| Ok(Value::Bool(!boolean_value(&step(ctx)?)))),
                    sample,
                })
            }
            NodeKind::Negate => {
                let child = self.emit_get(self.ast.children(id)[0], ctx)?;
                let sample = ops::negate(&child.sample)
                    .map_err(|e| UncompilableExpression::new(e.to_string()))?;
                let step = child.step;
                Ok(Emitted {
                    step: Arc::new(move |ctx| ops::negate(&step(ctx)?)),
                    sample,
                })
            }
            NodeKind::And => {
                let children = self.ast.children(id);
                let left = self.emit_get(children[0], ctx)?;
                let right = self.emit_get(children[1], ctx)?;
                let sample = if boolean_value(&left.sample) {
                    right.sample
                } else {
                    left.sample
                };
                let (l, r) = (left.step, right.step);
                Ok(Emitted {
                    step: Arc::new(move |ctx| {
                        let value = l(ctx)?;
                        if !boolean_value(&value) {
                            return Ok(value);
                        }
                        r(ctx)
                    }),
                    sample,
                })
            }
            NodeKind::Or => {
                let children = self.ast.children(id);
                let left = self.emit_get(children[0], ctx)?;
                let right = self.emit_get(children[1], ctx)?;
                let sample = if boolean_value(&left.sample) {
                    left.sample
                } else {
                    right.sample
                };
                let (l, r) = (left.step, right.step);
                Ok(Emitted {
                    step: Arc::new(move |ctx| {
                        let value = l(ctx)?;
                        if boolean_value(&value) {
                            return Ok(value);
                        }
                        r(ctx)
                    }),
                    sample,
                })
            }
            NodeKind::Binary(op) => {
                let children = self.ast.children(id);
                let left = self.emit_get(children[0], ctx)?;
                let right = self.emit_get(children[1], ctx)?;
                let sample = ops::binary(*op, &left.sample, &right.sample)
                    .map_err(|e| UncompilableExpression::new(e.to_string()))?;
                let op = *op;
                let (l, r) = (left.step, right.step);
                Ok(Emitted {
                    step: Arc::new(move |ctx| {
                        let left = l(ctx)?;
                        let right = r(ctx)?;
                        ops::binary(op, &left, &right)
                    }),
                    sample,
                })
            }
            NodeKind::Sequence => {
                let mut steps = Vec::new();
                let mut sample = Value::Null;
                for &child in self.ast.children(id) {
                    let emitted = self.emit_get(child, ctx)?;
                    sample = emitted.sample;
                    steps.push(emitted.step);
                }
                Ok(Emitted {
                    step: Arc::new(move |ctx| {
                        let mut last = Value::Null;
                        for step in &steps {
                            last = step(ctx)?;
                        }
                        Ok(last)
                    }),
                    sample,
                })
            }
            NodeKind::Chain => {
                let (steps, sample) = self.emit_chain_get(self.ast.children(id), ctx)?;
                Ok(Emitted {
                    step: chain_step(steps),
                    sample,
                })
            }
            NodeKind::Property { indexed: false } => self.emit_property_get(id, ctx),
            NodeKind::Property { indexed: true } => self.emit_builtin_index_get(id, ctx),
            NodeKind::Method { name } => self.emit_method(id, name.clone(), ctx),
            NodeKind::StaticField { class, field } => {
                let class = self
                    .engine
                    .class_resolver
                    .resolve_class(class, ctx.aliases())
                    .map_err(|e| UncompilableExpression::new(e.to_string()))?;
                let value = self
                    .engine
                    .static_field(class, field)
                    .map_err(|e| UncompilableExpression::new(e.to_string()))?;
                // Static fields are immutable after registration, so the
                // resolved value itself is captured.
                let captured = value.clone();
                Ok(Emitted {
                    step: Arc::new(move |_| Ok(captured.clone())),
                    sample: value,
                })
            }
            NodeKind::StaticMethod { class, method } => {
                self.emit_static_method(id, class, method.clone(), ctx)
            }
        }
    }

    /// Emit the units of a chain, threading the sample cursor. A named
    /// property segment directly followed by an index segment fuses into
    /// one unit when the observed class prefers its index-taking accessors.
    fn emit_chain_get(
        &self,
        children: &[NodeId],
        ctx: &mut OgnvContext,
    ) -> Result<(Vec<GetStep>, Value), UncompilableExpression> {
        let saved = ctx.current().clone();
        let mut steps = Vec::new();
        let mut i = 0;
        while i < children.len() {
            let emitted = if self.wants_pair(children, i, ctx) {
                let pair = self.emit_pair_get(children[i], children[i + 1], ctx)?;
                i += 2;
                pair
            } else {
                let single = self.emit_get(children[i], ctx)?;
                i += 1;
                single
            };
            ctx.set_current(emitted.sample);
            steps.push(emitted.step);
        }
        let sample = ctx.current().clone();
        ctx.set_current(saved);
        Ok((steps, sample))
    }

    /// Mirror of the interpreter's indexed-access preference, decided at
    /// emit time from the sample cursor.
    fn wants_pair(&self, children: &[NodeId], i: usize, ctx: &OgnvContext) -> bool {
        if i + 1 >= children.len() {
            return false;
        }
        let named = children[i];
        if !matches!(self.ast.kind(named), NodeKind::Property { indexed: false }) {
            return false;
        }
        if !matches!(
            self.ast.kind(children[i + 1]),
            NodeKind::Property { indexed: true }
        ) {
            return false;
        }
        let Some(name) = self.ast.property_name(named) else {
            return false;
        };
        let Some(obj) = ctx.current().as_object() else {
            return false;
        };
        if !self.engine.has_indexed_descriptor(obj.class(), name) {
            return false;
        }
        if self.engine.has_plain_descriptor(obj.class(), name) {
            return i != 0;
        }
        true
    }

    fn emit_pair_get(
        &self,
        named: NodeId,
        index: NodeId,
        ctx: &mut OgnvContext,
    ) -> Result<Emitted, UncompilableExpression> {
        let name = self
            .ast
            .property_name(named)
            .ok_or_else(|| UncompilableExpression::new("computed property name"))?
            .to_string();
        let owner = ctx.current().clone();
        let obj = sample_object(&owner, &name)?;
        let class = obj.class();
        let member = self
            .engine
            .resolve_member(class, &name)
            .map_err(|e| UncompilableExpression::new(e.to_string()))?;
        let index_emitted = self.emit_at_root(self.ast.children(index)[0], ctx)?;
        let declaring = member.declaring();
        let sample = match member.as_ref() {
            ResolvedMember::Indexed { read, .. } => self
                .engine
                .registry
                .with_instance(obj, declaring, |state| read(state, &index_emitted.sample))
                .map_err(|e| UncompilableExpression::new(e.to_string()))?,
            _ => {
                return Err(UncompilableExpression::new(format!(
                    "'{name}' is not an indexed property"
                )));
            }
        };

        let engine = Arc::clone(self.engine);
        let index_step = index_emitted.step;
        Ok(Emitted {
            step: Arc::new(move |ctx| {
                let owner = ctx.current().clone();
                let obj = owner.as_object().ok_or_else(|| {
                    OgnavError::inappropriate(format!(
                        "cannot read indexed property '{name}' of {}",
                        owner.type_name()
                    ))
                })?;
                let idx = index_step(ctx)?;
                let member = if obj.class() == class {
                    Arc::clone(&member)
                } else {
                    engine.resolve_member(obj.class(), &name)?
                };
                let declaring = member.declaring();
                match member.as_ref() {
                    ResolvedMember::Indexed { read, .. } => engine
                        .registry
                        .with_instance(obj, declaring, |state| read(state, &idx)),
                    _ => Err(OgnavError::inappropriate(format!(
                        "'{name}' is not an indexed property"
                    ))),
                }
            }),
            sample,
        })
    }

    fn emit_property_get(
        &self,
        id: NodeId,
        ctx: &mut OgnvContext,
    ) -> Result<Emitted, UncompilableExpression> {
        let name = self
            .ast
            .property_name(id)
            .ok_or_else(|| UncompilableExpression::new("computed property name"))?
            .to_string();
        let owner = ctx.current().clone();
        match &owner {
            Value::Object(obj) => {
                let class = obj.class();
                let member = self
                    .engine
                    .resolve_member(class, &name)
                    .map_err(|e| UncompilableExpression::new(e.to_string()))?;
                let sample =
                    member_read(self.engine, &member, obj, &owner, &name, ctx.root())
                        .map_err(|e| UncompilableExpression::new(e.to_string()))?;

                let engine = Arc::clone(self.engine);
                Ok(Emitted {
                    step: Arc::new(move |ctx| {
                        let owner = ctx.current().clone();
                        let obj = owner.as_object().ok_or_else(|| {
                            OgnavError::inappropriate(format!(
                                "cannot read property '{name}' of {}",
                                owner.type_name()
                            ))
                        })?;
                        let member = if obj.class() == class {
                            Arc::clone(&member)
                        } else {
                            engine.resolve_member(obj.class(), &name)?
                        };
                        member_read(&engine, &member, obj, &owner, &name, ctx.root())
                    }),
                    sample,
                })
            }
            // Built-in pseudo-properties carry no class to specialize on;
            // the emitted step stays dynamic and needs no narrowing.
            Value::Array(arr) => match name.as_str() {
                "length" | "size" => {
                    let sample = Value::Int(arr.len() as i64);
                    Ok(Emitted {
                        step: Arc::new(move |ctx| match ctx.current() {
                            Value::Array(arr) => Ok(Value::Int(arr.len() as i64)),
                            other => Err(OgnavError::NoSuchProperty {
                                class: other.type_name().to_string(),
                                name: name.clone(),
                            }),
                        }),
                        sample,
                    })
                }
                _ => Err(UncompilableExpression::new(format!(
                    "array has no property '{name}'"
                ))),
            },
            Value::String(s) if name == "length" => {
                let sample = Value::Int(s.chars().count() as i64);
                Ok(Emitted {
                    step: Arc::new(move |ctx| match ctx.current() {
                        Value::String(s) => Ok(Value::Int(s.chars().count() as i64)),
                        other => Err(OgnavError::NoSuchProperty {
                            class: other.type_name().to_string(),
                            name: name.clone(),
                        }),
                    }),
                    sample,
                })
            }
            Value::Null => Err(UncompilableExpression::new(format!(
                "owner of '{name}' is an untyped null"
            ))),
            other => Err(UncompilableExpression::new(format!(
                "cannot read property '{name}' of {}",
                other.type_name()
            ))),
        }
    }

    fn emit_builtin_index_get(
        &self,
        id: NodeId,
        ctx: &mut OgnvContext,
    ) -> Result<Emitted, UncompilableExpression> {
        let index = self.emit_at_root(self.ast.children(id)[0], ctx)?;
        let sample = match ctx.current() {
            Value::Array(arr) => {
                let idx = array_index(&index.sample)
                    .map_err(|e| UncompilableExpression::new(e.to_string()))?;
                arr.get(idx).ok_or_else(|| {
                    UncompilableExpression::new(format!("sample index {idx} out of bounds"))
                })?
            }
            other => {
                return Err(UncompilableExpression::new(format!(
                    "cannot index into {}",
                    other.type_name()
                )));
            }
        };
        let index_step = index.step;
        Ok(Emitted {
            step: Arc::new(move |ctx| {
                let idx = array_index(&index_step(ctx)?)?;
                match ctx.current() {
                    Value::Array(arr) => arr.get(idx).ok_or_else(|| {
                        OgnavError::native(format!(
                            "index {idx} out of bounds (len {})",
                            arr.len()
                        ))
                    }),
                    other => Err(OgnavError::inappropriate(format!(
                        "cannot index into {}",
                        other.type_name()
                    ))),
                }
            }),
            sample,
        })
    }

    fn emit_method(
        &self,
        id: NodeId,
        name: String,
        ctx: &mut OgnvContext,
    ) -> Result<Emitted, UncompilableExpression> {
        let target = ctx.current().clone();
        let obj = sample_object(&target, &name)?;
        let class = obj.class();

        let mut arg_steps = Vec::new();
        let mut sample_args = Vec::new();
        for &child in self.ast.children(id) {
            let emitted = self.emit_at_root(child, ctx)?;
            sample_args.push(emitted.sample);
            arg_steps.push(emitted.step);
        }
        let expected: Vec<TypeTag> = sample_args.iter().map(Value::tag).collect();
        let resolved = self
            .engine
            .resolve_method(class, &name, &expected)
            .map_err(|e| UncompilableExpression::new(e.to_string()))?;
        let declaring = resolved.method.declaring;
        let chain = self.engine.class_chain_names(declaring);
        let sample = sandbox::guard(&chain, &name, || {
            self.engine.registry.with_instance_mut(obj, declaring, |state| {
                (resolved.method.invoke)(state, &sample_args)
            })
        })
        .map_err(|e| UncompilableExpression::new(e.to_string()))?;

        let engine = Arc::clone(self.engine);
        Ok(Emitted {
            step: Arc::new(move |ctx| {
                let target = ctx.current().clone();
                let obj = target.as_object().ok_or_else(|| {
                    OgnavError::inappropriate(format!(
                        "cannot invoke '{name}' on {}",
                        target.type_name()
                    ))
                })?;
                let mut args = Vec::with_capacity(arg_steps.len());
                for step in &arg_steps {
                    args.push(step(ctx)?);
                }
                let tags: Vec<TypeTag> = args.iter().map(Value::tag).collect();
                let (method, names) = if obj.class() == class && tags == expected {
                    (Arc::clone(&resolved), chain.clone())
                } else {
                    let fresh = engine.resolve_method(obj.class(), &name, &tags)?;
                    let names = engine.class_chain_names(fresh.method.declaring);
                    (fresh, names)
                };
                match sandbox::guard(&names, &name, || {
                    engine
                        .registry
                        .with_instance_mut(obj, method.method.declaring, |state| {
                            (method.method.invoke)(state, &args)
                        })
                }) {
                    Ok(value) => Ok(value),
                    Err(err @ OgnavError::Security { .. }) => Err(err),
                    Err(cause) => Err(OgnavError::method_failed(&name, cause)),
                }
            }),
            sample,
        })
    }

    fn emit_static_method(
        &self,
        id: NodeId,
        class_name: &str,
        method: String,
        ctx: &mut OgnvContext,
    ) -> Result<Emitted, UncompilableExpression> {
        let class = self
            .engine
            .class_resolver
            .resolve_class(class_name, ctx.aliases())
            .map_err(|e| UncompilableExpression::new(e.to_string()))?;

        let mut arg_steps = Vec::new();
        let mut sample_args = Vec::new();
        for &child in self.ast.children(id) {
            let emitted = self.emit_at_root(child, ctx)?;
            sample_args.push(emitted.sample);
            arg_steps.push(emitted.step);
        }
        let expected: Vec<TypeTag> = sample_args.iter().map(Value::tag).collect();
        let resolved = self
            .engine
            .resolve_static_method(class, &method, &expected)
            .map_err(|e| UncompilableExpression::new(e.to_string()))?;
        let chain = self.engine.class_chain_names(resolved.method.declaring);
        let sample = sandbox::guard(&chain, &method, || (resolved.method.invoke)(&sample_args))
            .map_err(|e| UncompilableExpression::new(e.to_string()))?;

        let engine = Arc::clone(self.engine);
        Ok(Emitted {
            step: Arc::new(move |ctx| {
                let mut args = Vec::with_capacity(arg_steps.len());
                for step in &arg_steps {
                    args.push(step(ctx)?);
                }
                let tags: Vec<TypeTag> = args.iter().map(Value::tag).collect();
                let invoke = |entry: &ognav_core::ResolvedStaticMethod,
                              names: &[String]|
                 -> Result<Value, OgnavError> {
                    match sandbox::guard(names, &method, || (entry.method.invoke)(&args)) {
                        Ok(value) => Ok(value),
                        Err(err @ OgnavError::Security { .. }) => Err(err),
                        Err(cause) => Err(OgnavError::method_failed(&method, cause)),
                    }
                };
                if tags == expected {
                    invoke(&resolved, &chain)
                } else {
                    let fresh = engine.resolve_static_method(class, &method, &tags)?;
                    let names = engine.class_chain_names(fresh.method.declaring);
                    invoke(&fresh, &names)
                }
            }),
            sample,
        })
    }

    /// Emit a node whose evaluation context is the root (method arguments,
    /// index expressions, computed names), keeping the chain cursor intact
    /// around both the sample walk and the runtime step.
    fn emit_at_root(
        &self,
        id: NodeId,
        ctx: &mut OgnvContext,
    ) -> Result<Emitted, UncompilableExpression> {
        let saved = ctx.current().clone();
        ctx.set_current(ctx.root().clone());
        let emitted = self.emit_get(id, ctx);
        ctx.set_current(saved);
        let emitted = emitted?;
        let inner = emitted.step;
        Ok(Emitted {
            step: Arc::new(move |ctx| {
                let saved = ctx.current().clone();
                ctx.set_current(ctx.root().clone());
                let result = inner(ctx);
                ctx.set_current(saved);
                result
            }),
            sample: emitted.sample,
        })
    }

    // =========================================
    // Write axis
    // =========================================

    fn emit_set(
        &self,
        id: NodeId,
        ctx: &mut OgnvContext,
    ) -> Result<SetStep, UncompilableExpression> {
        match self.ast.kind(id) {
            NodeKind::Chain => self.emit_chain_set(self.ast.children(id), ctx),
            NodeKind::Property { indexed: false } => self.emit_property_set(id, ctx),
            NodeKind::Property { indexed: true } => self.emit_builtin_index_set(id, ctx),
            other => Err(UncompilableExpression::new(format!(
                "cannot assign through {other:?}"
            ))),
        }
    }

    fn emit_chain_set(
        &self,
        children: &[NodeId],
        ctx: &mut OgnvContext,
    ) -> Result<SetStep, UncompilableExpression> {
        if children.is_empty() {
            return Err(UncompilableExpression::new("empty chain"));
        }
        let saved = ctx.current().clone();
        let mut prefix = Vec::new();
        let mut i = 0;
        let last_set = loop {
            let paired = self.wants_pair(children, i, ctx);
            let unit_len = if paired { 2 } else { 1 };
            if i + unit_len == children.len() {
                break if paired {
                    self.emit_pair_set(children[i], children[i + 1], ctx)
                } else {
                    self.emit_segment_set(children[i], ctx)
                };
            }
            let emitted = if paired {
                self.emit_pair_get(children[i], children[i + 1], ctx)
            } else {
                self.emit_get(children[i], ctx)
            };
            let emitted = match emitted {
                Ok(emitted) => emitted,
                Err(err) => {
                    ctx.set_current(saved);
                    return Err(err);
                }
            };
            ctx.set_current(emitted.sample);
            prefix.push(emitted.step);
            i += unit_len;
        };
        ctx.set_current(saved);
        let last_set = last_set?;

        Ok(Arc::new(move |ctx, value| {
            let saved = ctx.current().clone();
            for step in &prefix {
                let next = match step(ctx) {
                    Ok(next) => next,
                    Err(err) => {
                        let prior = ctx.current().clone();
                        ctx.set_current(ctx.root().clone());
                        let retry = step(ctx);
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
            let result = last_set(ctx, value);
            ctx.set_current(saved);
            result
        }))
    }

    fn emit_segment_set(
        &self,
        id: NodeId,
        ctx: &mut OgnvContext,
    ) -> Result<SetStep, UncompilableExpression> {
        match self.ast.kind(id) {
            NodeKind::Property { indexed: false } => self.emit_property_set(id, ctx),
            NodeKind::Property { indexed: true } => self.emit_builtin_index_set(id, ctx),
            other => Err(UncompilableExpression::new(format!(
                "cannot assign through {other:?}"
            ))),
        }
    }

    fn emit_property_set(
        &self,
        id: NodeId,
        ctx: &mut OgnvContext,
    ) -> Result<SetStep, UncompilableExpression> {
        let name = self
            .ast
            .property_name(id)
            .ok_or_else(|| UncompilableExpression::new("computed property name"))?
            .to_string();
        let owner = ctx.current().clone();
        let obj = sample_object(&owner, &name)?;
        let class = obj.class();
        let member = self
            .engine
            .resolve_member(class, &name)
            .map_err(|e| UncompilableExpression::new(e.to_string()))?;
        if !member.is_writable() {
            return Err(UncompilableExpression::new(format!(
                "'{name}' has no writable side"
            )));
        }

        let engine = Arc::clone(self.engine);
        Ok(Arc::new(move |ctx, value| {
            let owner = ctx.current().clone();
            let obj = owner.as_object().ok_or_else(|| {
                OgnavError::inappropriate(format!(
                    "cannot assign property '{name}' of {}",
                    owner.type_name()
                ))
            })?;
            let member = if obj.class() == class {
                Arc::clone(&member)
            } else {
                engine.resolve_member(obj.class(), &name)?
            };
            member_write(&engine, &member, obj, &name, value)
        }))
    }

    fn emit_pair_set(
        &self,
        named: NodeId,
        index: NodeId,
        ctx: &mut OgnvContext,
    ) -> Result<SetStep, UncompilableExpression> {
        let name = self
            .ast
            .property_name(named)
            .ok_or_else(|| UncompilableExpression::new("computed property name"))?
            .to_string();
        let owner = ctx.current().clone();
        let obj = sample_object(&owner, &name)?;
        let class = obj.class();
        let member = self
            .engine
            .resolve_member(class, &name)
            .map_err(|e| UncompilableExpression::new(e.to_string()))?;
        if !matches!(
            member.as_ref(),
            ResolvedMember::Indexed {
                write: Some(_),
                ..
            }
        ) {
            return Err(UncompilableExpression::new(format!(
                "'{name}' has no indexed write method"
            )));
        }
        let index_emitted = self.emit_at_root(self.ast.children(index)[0], ctx)?;

        let engine = Arc::clone(self.engine);
        let index_step = index_emitted.step;
        Ok(Arc::new(move |ctx, value| {
            let owner = ctx.current().clone();
            let obj = owner.as_object().ok_or_else(|| {
                OgnavError::inappropriate(format!(
                    "cannot assign indexed property '{name}' of {}",
                    owner.type_name()
                ))
            })?;
            let idx = index_step(ctx)?;
            let member = if obj.class() == class {
                Arc::clone(&member)
            } else {
                engine.resolve_member(obj.class(), &name)?
            };
            let declaring = member.declaring();
            match member.as_ref() {
                ResolvedMember::Indexed {
                    write: Some(write), ..
                } => engine
                    .registry
                    .with_instance_mut(obj, declaring, |state| write(state, &idx, value)),
                _ => Err(OgnavError::NoSuchProperty {
                    class: engine.registry.class_name(obj.class()),
                    name: name.clone(),
                }),
            }
        }))
    }

    fn emit_builtin_index_set(
        &self,
        id: NodeId,
        ctx: &mut OgnvContext,
    ) -> Result<SetStep, UncompilableExpression> {
        if !matches!(ctx.current(), Value::Array(_)) {
            return Err(UncompilableExpression::new(format!(
                "cannot index into {}",
                ctx.current().type_name()
            )));
        }
        let index_emitted = self.emit_at_root(self.ast.children(id)[0], ctx)?;
        let index_step = index_emitted.step;
        Ok(Arc::new(move |ctx, value| {
            let idx = array_index(&index_step(ctx)?)?;
            match ctx.current() {
                Value::Array(arr) => arr.set(idx, value),
                other => Err(OgnavError::inappropriate(format!(
                    "cannot index into {}",
                    other.type_name()
                ))),
            }
        }))
    }
}

/// Compose chain unit steps with the per-unit root fallback retry.
fn chain_step(steps: Vec<GetStep>) -> GetStep {
    Arc::new(move |ctx| {
        let saved = ctx.current().clone();
        for step in &steps {
            let value = match step(ctx) {
                Ok(value) => value,
                Err(err) => {
                    let prior = ctx.current().clone();
                    ctx.set_current(ctx.root().clone());
                    let retry = step(ctx);
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
    })
}

fn sample_object<'v>(
    owner: &'v Value,
    name: &str,
) -> Result<&'v ObjectRef, UncompilableExpression> {
    owner.as_object().ok_or_else(|| {
        UncompilableExpression::new(format!(
            "owner of '{name}' is {}, not a registered object",
            owner.type_name()
        ))
    })
}

fn member_read(
    engine: &EngineInner,
    member: &ResolvedMember,
    obj: &ObjectRef,
    owner: &Value,
    name: &str,
    root: &Value,
) -> Result<Value, OgnavError> {
    let declaring = member.declaring();
    let value = match member {
        ResolvedMember::Accessor {
            getter: Some(getter),
            ..
        } => engine
            .registry
            .with_instance(obj, declaring, |state| getter(state))?,
        ResolvedMember::Field { get, .. } => {
            engine.registry.with_instance(obj, declaring, |state| get(state))?
        }
        ResolvedMember::Indexed { .. } => {
            return Err(OgnavError::inappropriate(format!(
                "indexed property '{name}' requires an index"
            )));
        }
        ResolvedMember::Accessor { getter: None, .. } => {
            return Err(OgnavError::NoSuchProperty {
                class: engine.registry.class_name(obj.class()),
                name: name.to_string(),
            });
        }
    };
    if value.is_null() {
        return Ok(engine.null_handler.null_property_value(root, owner, name));
    }
    Ok(value)
}

fn member_write(
    engine: &EngineInner,
    member: &ResolvedMember,
    obj: &ObjectRef,
    name: &str,
    value: Value,
) -> Result<(), OgnavError> {
    let declaring = member.declaring();
    match member {
        ResolvedMember::Accessor {
            setter: Some(setter),
            ..
        } => engine
            .registry
            .with_instance_mut(obj, declaring, |state| setter(state, value)),
        ResolvedMember::Field {
            set: Some(set), ..
        } => engine
            .registry
            .with_instance_mut(obj, declaring, |state| set(state, value)),
        ResolvedMember::Indexed { .. } => Err(OgnavError::inappropriate(format!(
            "indexed property '{name}' requires an index"
        ))),
        _ => Err(OgnavError::NoSuchProperty {
            class: engine.registry.class_name(obj.class()),
            name: name.to_string(),
        }),
    }
}
