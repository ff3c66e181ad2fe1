//! Symbolic Memory Error Types

use thiserror::Error;

/// Errors produced by the symbolic memory core.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MemoryError {
    /// Construction, union, path, or condition input was malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A lookup found nothing. The hot paths of the core prefer returning
    /// empty collections over this variant; it exists for callers that want
    /// a strict, typed "miss" rather than an empty `Option`/`Vec`.
    #[error("not found: {0}")]
    NotFound(String),

    /// A capacity policy silently evicted or rejected something.
    /// Never returned from the hot paths directly; surfaced through
    /// statistics counters instead, per the error handling design.
    #[error("capacity policy triggered: {0}")]
    CapacityPolicy(String),

    /// A working-memory context expired.
    #[error("timeout: {0}")]
    Timeout(String),
}

/// Result type used throughout the symbolic memory core.
pub type MemoryResult<T> = Result<T, MemoryError>;
