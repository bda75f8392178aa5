//! Hand-written lexer for navigation expressions.
//!
//! Uses direct dispatch on the first character of each token; single-quoted
//! and double-quoted string literals are equivalent.

use crate::error::LexError;
use crate::token::{lookup_keyword, Token, TokenKind};

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Lexer {
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    /// Tokenize the whole source, ending with an `Eof` token.
    pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
        let mut lexer = Lexer::new(source);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn next_token(&mut self) -> Result<Token, LexError> {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.advance();
        }
        let offset = self.pos;
        let Some(c) = self.peek() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                offset,
            });
        };

        let kind = match c {
            '\'' | '"' => return self.scan_string(c, offset),
            c if c.is_ascii_digit() => return self.scan_number(offset),
            c if is_ident_start(c) => return Ok(self.scan_identifier(offset)),
            '.' => {
                self.advance();
                TokenKind::Dot
            }
            ',' => {
                self.advance();
                TokenKind::Comma
            }
            '(' => {
                self.advance();
                TokenKind::LParen
            }
            ')' => {
                self.advance();
                TokenKind::RParen
            }
            '[' => {
                self.advance();
                TokenKind::LBracket
            }
            ']' => {
                self.advance();
                TokenKind::RBracket
            }
            '@' => {
                self.advance();
                TokenKind::At
            }
            '#' => {
                self.advance();
                TokenKind::Hash
            }
            '+' => {
                self.advance();
                TokenKind::Plus
            }
            '-' => {
                self.advance();
                TokenKind::Minus
            }
            '*' => {
                self.advance();
                TokenKind::Star
            }
            '/' => {
                self.advance();
                TokenKind::Slash
            }
            '%' => {
                self.advance();
                TokenKind::Percent
            }
            '!' => {
                self.advance();
                if self.peek() == Some('=') {
                    self.advance();
                    TokenKind::NotEq
                } else {
                    TokenKind::Bang
                }
            }
            '=' => {
                self.advance();
                if self.peek() == Some('=') {
                    self.advance();
                    TokenKind::EqEq
                } else {
                    return Err(LexError::UnexpectedChar { ch: '=', offset });
                }
            }
            '<' => {
                self.advance();
                if self.peek() == Some('=') {
                    self.advance();
                    TokenKind::LessEq
                } else {
                    TokenKind::Less
                }
            }
            '>' => {
                self.advance();
                if self.peek() == Some('=') {
                    self.advance();
                    TokenKind::GreaterEq
                } else {
                    TokenKind::Greater
                }
            }
            '&' => {
                self.advance();
                if self.peek() == Some('&') {
                    self.advance();
                    TokenKind::AndAnd
                } else {
                    return Err(LexError::UnexpectedChar { ch: '&', offset });
                }
            }
            '|' => {
                self.advance();
                if self.peek() == Some('|') {
                    self.advance();
                    TokenKind::OrOr
                } else {
                    return Err(LexError::UnexpectedChar { ch: '|', offset });
                }
            }
            other => return Err(LexError::UnexpectedChar { ch: other, offset }),
        };

        Ok(Token { kind, offset })
    }

    fn scan_string(&mut self, quote: char, offset: usize) -> Result<Token, LexError> {
        self.advance();
        let mut text = String::new();
        loop {
            match self.advance() {
                Some(c) if c == quote => break,
                Some('\\') => match self.advance() {
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some(escaped) => text.push(escaped),
                    None => return Err(LexError::UnterminatedString { offset }),
                },
                Some(c) => text.push(c),
                None => return Err(LexError::UnterminatedString { offset }),
            }
        }
        Ok(Token {
            kind: TokenKind::Str(text),
            offset,
        })
    }

    fn scan_number(&mut self, offset: usize) -> Result<Token, LexError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }
        // A dot only continues the number if a digit follows; `1.name` is
        // a chain off an integer literal.
        let mut is_float = false;
        if self.peek() == Some('.')
            && matches!(self.peek_next(), Some(c) if c.is_ascii_digit())
        {
            is_float = true;
            self.advance();
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.advance();
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        let kind = if is_float {
            TokenKind::Float(text.parse().map_err(|e| LexError::InvalidNumber {
                offset,
                detail: format!("{e}"),
            })?)
        } else {
            TokenKind::Int(text.parse().map_err(|e| LexError::InvalidNumber {
                offset,
                detail: format!("{e}"),
            })?)
        };
        Ok(Token { kind, offset })
    }

    fn scan_identifier(&mut self, offset: usize) -> Token {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if is_ident_continue(c)) {
            self.advance();
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        let kind = lookup_keyword(&text).unwrap_or(TokenKind::Ident(text));
        Token { kind, offset }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}
