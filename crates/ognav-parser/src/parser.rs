//! Recursive-descent parser for navigation expressions.
//!
//! Precedence, loosest to tightest: sequence (`,`), `||`, `&&`, equality,
//! relational, additive, multiplicative, unary (`!`, `-`), navigation
//! postfix (`.name`, `.name(args)`, `[index]`), primary.

use ognav_core::ops::BinaryOp;

use crate::ast::{Ast, Constant, Node, NodeId, NodeKind};
use crate::error::ParseError;
use crate::lexer::Lexer;
use crate::token::{Token, TokenKind};

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    nodes: Vec<Node>,
}

impl Parser {
    /// Parse a complete expression.
    pub fn parse(source: &str) -> Result<Ast, ParseError> {
        let tokens = Lexer::tokenize(source)?;
        let mut parser = Parser {
            tokens,
            pos: 0,
            nodes: Vec::new(),
        };
        let root = parser.parse_sequence()?;
        match parser.peek() {
            TokenKind::Eof => {}
            _ => {
                return Err(ParseError::TrailingInput {
                    offset: parser.current_offset(),
                });
            }
        }
        let mut nodes = parser.nodes;
        link_parents(&mut nodes);
        Ok(Ast::new(nodes, root))
    }

    // =========================================
    // Token helpers
    // =========================================

    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos].kind
    }

    fn current_offset(&self) -> usize {
        self.tokens[self.pos].offset
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.tokens[self.pos].kind.clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), ParseError> {
        if self.peek() == &kind {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(&kind.to_string()))
        }
    }

    fn expect_ident(&mut self) -> Result<String, ParseError> {
        match self.peek() {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        if self.peek() == &TokenKind::Eof {
            ParseError::UnexpectedEof
        } else {
            ParseError::UnexpectedToken {
                expected: expected.to_string(),
                found: self.peek().to_string(),
                offset: self.current_offset(),
            }
        }
    }

    fn push(&mut self, kind: NodeKind, children: Vec<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            kind,
            children,
            parent: None,
        });
        id
    }

    // =========================================
    // Grammar
    // =========================================

    fn parse_sequence(&mut self) -> Result<NodeId, ParseError> {
        let first = self.parse_or()?;
        if self.peek() != &TokenKind::Comma {
            return Ok(first);
        }
        let mut children = vec![first];
        while self.eat(&TokenKind::Comma) {
            children.push(self.parse_or()?);
        }
        Ok(self.push(NodeKind::Sequence, children))
    }

    fn parse_or(&mut self) -> Result<NodeId, ParseError> {
        let mut left = self.parse_and()?;
        while self.eat(&TokenKind::OrOr) {
            let right = self.parse_and()?;
            left = self.push(NodeKind::Or, vec![left, right]);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<NodeId, ParseError> {
        let mut left = self.parse_equality()?;
        while self.eat(&TokenKind::AndAnd) {
            let right = self.parse_equality()?;
            left = self.push(NodeKind::And, vec![left, right]);
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<NodeId, ParseError> {
        let mut left = self.parse_relational()?;
        loop {
            let op = match self.peek() {
                TokenKind::EqEq => BinaryOp::Equal,
                TokenKind::NotEq => BinaryOp::NotEqual,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_relational()?;
            left = self.push(NodeKind::Binary(op), vec![left, right]);
        }
    }

    fn parse_relational(&mut self) -> Result<NodeId, ParseError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                TokenKind::Less => BinaryOp::Less,
                TokenKind::LessEq => BinaryOp::LessEqual,
                TokenKind::Greater => BinaryOp::Greater,
                TokenKind::GreaterEq => BinaryOp::GreaterEqual,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_additive()?;
            left = self.push(NodeKind::Binary(op), vec![left, right]);
        }
    }

    fn parse_additive(&mut self) -> Result<NodeId, ParseError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = self.push(NodeKind::Binary(op), vec![left, right]);
        }
    }

    fn parse_multiplicative(&mut self) -> Result<NodeId, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Rem,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_unary()?;
            left = self.push(NodeKind::Binary(op), vec![left, right]);
        }
    }

    fn parse_unary(&mut self) -> Result<NodeId, ParseError> {
        if self.eat(&TokenKind::Bang) {
            let operand = self.parse_unary()?;
            return Ok(self.push(NodeKind::Not, vec![operand]));
        }
        if self.eat(&TokenKind::Minus) {
            let operand = self.parse_unary()?;
            return Ok(self.push(NodeKind::Negate, vec![operand]));
        }
        self.parse_navigation()
    }

    /// A primary expression followed by any number of `.segment` and
    /// `[index]` postfix steps. Multiple steps fold into a chain node.
    fn parse_navigation(&mut self) -> Result<NodeId, ParseError> {
        let first = self.parse_primary()?;
        let mut segments = vec![first];

        loop {
            if self.eat(&TokenKind::Dot) {
                let name = self.expect_ident()?;
                if self.eat(&TokenKind::LParen) {
                    let args = self.parse_call_args()?;
                    segments.push(self.push(NodeKind::Method { name }, args));
                } else {
                    let name_node = self.push(NodeKind::Const(Constant::Str(name)), vec![]);
                    segments
                        .push(self.push(NodeKind::Property { indexed: false }, vec![name_node]));
                }
            } else if self.eat(&TokenKind::LBracket) {
                let index = self.parse_or()?;
                self.expect(TokenKind::RBracket)?;
                segments.push(self.push(NodeKind::Property { indexed: true }, vec![index]));
            } else {
                break;
            }
        }

        if segments.len() == 1 {
            Ok(segments.pop().expect("one segment"))
        } else {
            Ok(self.push(NodeKind::Chain, segments))
        }
    }

    fn parse_primary(&mut self) -> Result<NodeId, ParseError> {
        match self.peek().clone() {
            TokenKind::Int(v) => {
                self.advance();
                Ok(self.push(NodeKind::Const(Constant::Int(v)), vec![]))
            }
            TokenKind::Float(v) => {
                self.advance();
                Ok(self.push(NodeKind::Const(Constant::Float(v)), vec![]))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(self.push(NodeKind::Const(Constant::Str(s)), vec![]))
            }
            TokenKind::True => {
                self.advance();
                Ok(self.push(NodeKind::Const(Constant::Bool(true)), vec![]))
            }
            TokenKind::False => {
                self.advance();
                Ok(self.push(NodeKind::Const(Constant::Bool(false)), vec![]))
            }
            TokenKind::Null => {
                self.advance();
                Ok(self.push(NodeKind::Const(Constant::Null), vec![]))
            }
            TokenKind::Ident(name) => {
                self.advance();
                if self.eat(&TokenKind::LParen) {
                    let args = self.parse_call_args()?;
                    Ok(self.push(NodeKind::Method { name }, args))
                } else {
                    let name_node = self.push(NodeKind::Const(Constant::Str(name)), vec![]);
                    Ok(self.push(NodeKind::Property { indexed: false }, vec![name_node]))
                }
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_sequence()?;
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::At => {
                self.advance();
                self.parse_static_reference()
            }
            TokenKind::Hash => {
                self.advance();
                let name = self.expect_ident()?;
                let kind = match name.as_str() {
                    "root" => NodeKind::RootRef,
                    "this" => NodeKind::ThisRef,
                    _ => NodeKind::VarRef(name),
                };
                Ok(self.push(kind, vec![]))
            }
            _ => Err(self.unexpected("expression")),
        }
    }

    /// `@Class@member` or `@Class@method(args)`. Class names may be dotted.
    fn parse_static_reference(&mut self) -> Result<NodeId, ParseError> {
        let mut class = self.expect_ident()?;
        while self.eat(&TokenKind::Dot) {
            class.push('.');
            class.push_str(&self.expect_ident()?);
        }
        self.expect(TokenKind::At)?;
        let member = self.expect_ident()?;
        if self.eat(&TokenKind::LParen) {
            let args = self.parse_call_args()?;
            Ok(self.push(NodeKind::StaticMethod { class, method: member }, args))
        } else {
            Ok(self.push(NodeKind::StaticField { class, field: member }, vec![]))
        }
    }

    /// Arguments after an already-consumed `(`. Commas separate arguments,
    /// so sequence expressions need parentheses here.
    fn parse_call_args(&mut self) -> Result<Vec<NodeId>, ParseError> {
        let mut args = Vec::new();
        if self.eat(&TokenKind::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_or()?);
            if self.eat(&TokenKind::Comma) {
                continue;
            }
            self.expect(TokenKind::RParen)?;
            return Ok(args);
        }
    }
}

/// Fill in parent back-references from the children lists.
fn link_parents(nodes: &mut [Node]) {
    let links: Vec<(usize, NodeId)> = nodes
        .iter()
        .enumerate()
        .flat_map(|(index, node)| {
            node.children
                .iter()
                .map(move |&child| (child.index(), NodeId(index as u32)))
        })
        .collect();
    for (child, parent) in links {
        nodes[child].parent = Some(parent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_property_chain() {
        let ast = Parser::parse("property.bean3.value").unwrap();
        assert!(matches!(ast.kind(ast.root()), NodeKind::Chain));
        let segments = ast.children(ast.root());
        assert_eq!(segments.len(), 3);
        assert_eq!(ast.property_name(segments[0]), Some("property"));
        assert_eq!(ast.property_name(segments[2]), Some("value"));
        assert_eq!(ast.parent(segments[1]), Some(ast.root()));
        assert_eq!(ast.to_string(), "property.bean3.value");
    }

    #[test]
    fn test_parse_indexed_chain() {
        let ast = Parser::parse("list[0]").unwrap();
        let segments = ast.children(ast.root());
        assert_eq!(segments.len(), 2);
        assert!(matches!(
            ast.kind(segments[1]),
            NodeKind::Property { indexed: true }
        ));
        assert_eq!(ast.to_string(), "list[0]");
    }

    #[test]
    fn test_parse_bang_string() {
        let ast = Parser::parse("!'false'").unwrap();
        assert!(matches!(ast.kind(ast.root()), NodeKind::Not));
    }

    #[test]
    fn test_parse_comparison_with_null() {
        let ast = Parser::parse("property.bean3.value != null").unwrap();
        assert!(matches!(
            ast.kind(ast.root()),
            NodeKind::Binary(BinaryOp::NotEqual)
        ));
    }

    #[test]
    fn test_parse_static_method_and_field() {
        let ast = Parser::parse("@Math@max(1, 2)").unwrap();
        match ast.kind(ast.root()) {
            NodeKind::StaticMethod { class, method } => {
                assert_eq!(class, "Math");
                assert_eq!(method, "max");
            }
            other => panic!("unexpected root {other:?}"),
        }
        assert_eq!(ast.children(ast.root()).len(), 2);

        let ast = Parser::parse("@org.example.Root@SIZE_STRING").unwrap();
        match ast.kind(ast.root()) {
            NodeKind::StaticField { class, field } => {
                assert_eq!(class, "org.example.Root");
                assert_eq!(field, "SIZE_STRING");
            }
            other => panic!("unexpected root {other:?}"),
        }
    }

    #[test]
    fn test_parse_method_call_in_chain() {
        let ast = Parser::parse("service.exec(0)").unwrap();
        let segments = ast.children(ast.root());
        assert!(matches!(ast.kind(segments[1]), NodeKind::Method { .. }));
    }

    #[test]
    fn test_parse_sequence_and_vars() {
        let ast = Parser::parse("#root, #this, #name").unwrap();
        assert!(matches!(ast.kind(ast.root()), NodeKind::Sequence));
        assert_eq!(ast.children(ast.root()).len(), 3);
    }

    #[test]
    fn test_short_circuit_precedence() {
        let ast = Parser::parse("a == 1 || b == 2 && c == 3").unwrap();
        // `&&` binds tighter than `||`.
        assert!(matches!(ast.kind(ast.root()), NodeKind::Or));
    }

    #[test]
    fn test_trailing_input_rejected() {
        assert!(matches!(
            Parser::parse("a b"),
            Err(ParseError::TrailingInput { .. })
        ));
    }

    #[test]
    fn test_unexpected_eof() {
        assert!(matches!(Parser::parse("a."), Err(ParseError::UnexpectedEof)));
    }
}
