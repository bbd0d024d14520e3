//! Crate-wide error type.
//!
//! Every checked operation in this crate returns [`Result`]. Validation errors
//! are raised before any computation starts, so a failed call never leaves a
//! partially written result behind.

use thiserror::Error;

/// Shorthand for results produced by this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by matrix operations, the worker pool and the network layer.
#[derive(Debug, Error)]
pub enum Error {
    /// Operand or construction shapes are incompatible.
    #[error("dimension error: {0}")]
    Dimension(String),

    /// A matrix was converted into a form its shape does not allow.
    #[error("shape error: {0}")]
    Shape(String),

    /// Element access outside the valid range.
    #[error("index {index} out of range for length {len}")]
    Index { index: usize, len: usize },

    /// A worker task panicked; the pool is no longer usable.
    #[error("worker pool fatal: {0}")]
    PoolFatal(String),

    /// The pool has been shut down and rejects new work.
    #[error("worker pool has been shut down")]
    PoolTerminated,

    /// Malformed training data.
    #[error("invalid data: {0}")]
    Data(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub(crate) fn dimension(msg: impl Into<String>) -> Error {
    Error::Dimension(msg.into())
}

pub(crate) fn shape(msg: impl Into<String>) -> Error {
    Error::Shape(msg.into())
}

pub(crate) fn data(msg: impl Into<String>) -> Error {
    Error::Data(msg.into())
}
