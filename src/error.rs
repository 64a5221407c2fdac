//! Recoverable errors.
//!
//! Contract violations (unchecked indexing, oversized pages, touching memory
//! outside a page) panic instead of showing up here.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A checked accessor was given a key past the current bucket count.
    #[error("key {key} out of range for {len} buckets")]
    OutOfRange { key: usize, len: usize },

    /// A ragged input did not have the depth the index was built for.
    #[error("expected ragged input of depth {expected}, found depth {found}")]
    DepthMismatch { expected: usize, found: usize },

    /// Raw fields handed to `from_fields` break a container invariant.
    #[error("invalid layout: {0}")]
    InvalidLayout(String),
}

pub type Result<T> = std::result::Result<T, Error>;
