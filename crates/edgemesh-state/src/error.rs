//! State store errors.

use thiserror::Error;

pub type StateResult<T> = Result<T, StateError>;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("cannot open state database: {0}")]
    Open(String),

    /// redb refused a transaction, table, or row operation.
    #[error("storage {op} failed: {reason}")]
    Storage { op: &'static str, reason: String },

    #[error("stored value codec: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// A device id was found in some partitions but not in others.
    #[error("device partitions out of sync for: {0}")]
    Inconsistent(String),
}
