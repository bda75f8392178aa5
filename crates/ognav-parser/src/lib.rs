//! Expression lexer, parser, and AST for the navigation engine.
//!
//! The entry point is [`Parser::parse`], which turns an expression string
//! into an [`Ast`]: a flat arena of nodes with parent back-references so
//! evaluators can make context-sensitive decisions per segment.
//!
//! ```
//! use ognav_parser::{NodeKind, Parser};
//!
//! let ast = Parser::parse("property.bean3.value").unwrap();
//! assert!(matches!(ast.kind(ast.root()), NodeKind::Chain));
//! assert_eq!(ast.to_string(), "property.bean3.value");
//! ```

pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod token;

pub use ast::{Ast, Constant, Node, NodeId, NodeKind};
pub use error::{LexError, ParseError};
pub use lexer::Lexer;
pub use parser::Parser;
pub use token::{Token, TokenKind};
