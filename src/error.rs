//! Crate-wide error type.
//!
//! Shaped after `ballista_core::error::BallistaError`: one enum, one variant
//! per failure mode, `thiserror` for `Display`/`From` wiring instead of a
//! hand-written impl.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StreamError>;

#[derive(Error, Debug)]
pub enum StreamError {
    /// Malformed expression or logical-plan input.
    #[error("parse error: {0}")]
    Parse(String),

    /// Type mismatch in evaluation, unknown function, strict-context field
    /// resolution failure.
    #[error("eval error: {0}")]
    Eval(String),

    /// Queue closed, emit after stop, sink panic (caught and reported).
    #[error("runtime error: {0}")]
    Runtime(String),

    /// Invalid window spec, invalid timestamp unit.
    #[error("config error: {0}")]
    Config(String),
}

impl StreamError {
    pub fn parse(msg: impl Into<String>) -> Self {
        StreamError::Parse(msg.into())
    }

    pub fn eval(msg: impl Into<String>) -> Self {
        StreamError::Eval(msg.into())
    }

    pub fn runtime(msg: impl Into<String>) -> Self {
        StreamError::Runtime(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        StreamError::Config(msg.into())
    }
}

impl From<std::num::ParseFloatError> for StreamError {
    fn from(e: std::num::ParseFloatError) -> Self {
        StreamError::Parse(format!("invalid number: {e}"))
    }
}

impl From<std::num::ParseIntError> for StreamError {
    fn from(e: std::num::ParseIntError) -> Self {
        StreamError::Parse(format!("invalid integer: {e}"))
    }
}
