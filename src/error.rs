//! Top-level error for the parse-and-evaluate conveniences.

use thiserror::Error;

use ognav_core::OgnavError;
use ognav_parser::ParseError;

/// Either phase of a one-shot `evaluate`/`assign` call can fail; the
/// long-form surface (`parse` then `get_value`/`set_value`) keeps the two
/// apart.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Eval(#[from] OgnavError),
}
