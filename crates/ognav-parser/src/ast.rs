//! Index-arena AST for navigation expressions.
//!
//! Nodes live in a flat vector and reference children and parents by
//! [`NodeId`], which gives every node a weak back-reference to its parent
//! without ownership cycles. Context-sensitive decisions ("is this the last
//! segment of its chain?", "is the next sibling an index expression?") are
//! answered through the arena.

use std::fmt;

use ognav_core::ops::BinaryOp;

/// Index of a node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Literal constant payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

/// Expression node kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Literal constant.
    Const(Constant),
    /// Property access. Child 0 is the name expression (usually a string
    /// constant, but any expression works: computed property names).
    /// `indexed` marks an index segment `[expr]` whose child is the index.
    Property { indexed: bool },
    /// Instance method call; children are the arguments.
    Method { name: String },
    /// Static field access `@Class@FIELD`.
    StaticField { class: String, field: String },
    /// Static method call `@Class@method(args)`; children are arguments.
    StaticMethod { class: String, method: String },
    /// Left-to-right navigation chain; each child's result becomes the next
    /// child's current object.
    Chain,
    /// Comma sequence; evaluates children left-to-right, yields the last.
    Sequence,
    /// `#root`
    RootRef,
    /// `#this`
    ThisRef,
    /// `#name` context variable.
    VarRef(String),
    /// Logical negation (boolean-coerced operand).
    Not,
    /// Arithmetic negation.
    Negate,
    /// Short-circuit conjunction.
    And,
    /// Short-circuit disjunction.
    Or,
    /// Non-short-circuit binary operator.
    Binary(BinaryOp),
}

/// One node of the arena.
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub children: Vec<NodeId>,
    pub parent: Option<NodeId>,
}

/// A parsed expression tree.
#[derive(Debug, Clone)]
pub struct Ast {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Ast {
    pub(crate) fn new(nodes: Vec<Node>, root: NodeId) -> Self {
        Ast { nodes, root }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.node(id).kind
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The constant name of a property node, if its name expression is a
    /// string constant (i.e. not a computed property name).
    pub fn property_name(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            NodeKind::Property { indexed: false } => {
                let name_child = *self.children(id).first()?;
                match self.kind(name_child) {
                    NodeKind::Const(Constant::Str(name)) => Some(name),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// Whether `id` is the last child of its parent (or has no parent).
    /// Chain segments use this to decide read-vs-write on indexed members.
    pub fn is_last_segment(&self, id: NodeId) -> bool {
        match self.parent(id) {
            None => true,
            Some(parent) => self.children(parent).last() == Some(&id),
        }
    }

    /// The next sibling within the parent, if any.
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let siblings = self.children(parent);
        let position = siblings.iter().position(|&c| c == id)?;
        siblings.get(position + 1).copied()
    }

    fn render(&self, id: NodeId, out: &mut String) {
        match self.kind(id) {
            NodeKind::Const(Constant::Null) => out.push_str("null"),
            NodeKind::Const(Constant::Bool(v)) => out.push_str(if *v { "true" } else { "false" }),
            NodeKind::Const(Constant::Int(v)) => out.push_str(&v.to_string()),
            NodeKind::Const(Constant::Float(v)) => out.push_str(&v.to_string()),
            NodeKind::Const(Constant::Str(s)) => {
                out.push('\'');
                out.push_str(s);
                out.push('\'');
            }
            NodeKind::Property { indexed: true } => {
                out.push('[');
                self.render(self.children(id)[0], out);
                out.push(']');
            }
            NodeKind::Property { indexed: false } => {
                if let Some(name) = self.property_name(id) {
                    out.push_str(name);
                } else {
                    out.push('(');
                    self.render(self.children(id)[0], out);
                    out.push(')');
                }
            }
            NodeKind::Method { name } => {
                out.push_str(name);
                out.push('(');
                self.render_list(self.children(id), out);
                out.push(')');
            }
            NodeKind::StaticField { class, field } => {
                out.push('@');
                out.push_str(class);
                out.push('@');
                out.push_str(field);
            }
            NodeKind::StaticMethod { class, method } => {
                out.push('@');
                out.push_str(class);
                out.push('@');
                out.push_str(method);
                out.push('(');
                self.render_list(self.children(id), out);
                out.push(')');
            }
            NodeKind::Chain => {
                for (i, &child) in self.children(id).iter().enumerate() {
                    let is_index = matches!(self.kind(child), NodeKind::Property { indexed: true });
                    if i > 0 && !is_index {
                        out.push('.');
                    }
                    self.render(child, out);
                }
            }
            NodeKind::Sequence => self.render_list(self.children(id), out),
            NodeKind::RootRef => out.push_str("#root"),
            NodeKind::ThisRef => out.push_str("#this"),
            NodeKind::VarRef(name) => {
                out.push('#');
                out.push_str(name);
            }
            NodeKind::Not => {
                out.push('!');
                self.render(self.children(id)[0], out);
            }
            NodeKind::Negate => {
                out.push('-');
                self.render(self.children(id)[0], out);
            }
            NodeKind::And | NodeKind::Or | NodeKind::Binary(_) => {
                let symbol = match self.kind(id) {
                    NodeKind::And => "&&",
                    NodeKind::Or => "||",
                    NodeKind::Binary(op) => op.symbol(),
                    _ => unreachable!(),
                };
                self.render(self.children(id)[0], out);
                out.push(' ');
                out.push_str(symbol);
                out.push(' ');
                self.render(self.children(id)[1], out);
            }
        }
    }

    fn render_list(&self, children: &[NodeId], out: &mut String) {
        for (i, &child) in children.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            self.render(child, out);
        }
    }
}

impl fmt::Display for Ast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.render(self.root, &mut out);
        f.write_str(&out)
    }
}
