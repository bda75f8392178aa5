//! Lexer and parser error types.

use thiserror::Error;

/// Errors raised during tokenization.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexError {
    #[error("unexpected character '{ch}' at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },

    #[error("unterminated string starting at offset {offset}")]
    UnterminatedString { offset: usize },

    #[error("invalid number at offset {offset}: {detail}")]
    InvalidNumber { offset: usize, detail: String },
}

/// Errors raised while parsing the token stream.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error("expected {expected} but found {found} at offset {offset}")]
    UnexpectedToken {
        expected: String,
        found: String,
        offset: usize,
    },

    #[error("unexpected end of expression")]
    UnexpectedEof,

    #[error("trailing input at offset {offset}")]
    TrailingInput { offset: usize },
}
