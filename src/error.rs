//! Process-edge error types.
//!
//! The matching core itself reports soft failures through return values
//! ([`crate::command::ExecResult`], `bool`) and treats invariant breaches
//! as fatal; `EngineError` covers the fallible edges around it: file I/O,
//! configuration parsing and feed validation.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid price band `{0}`, expected `min:max` with min < max")]
    InvalidPriceBand(String),
}
