use thiserror::Error;

/// Errors from token and field decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The token matches none of the grammar's rules.
    #[error("unrecognized token: {0:?}")]
    UnrecognizedToken(String),

    /// An all-digit token too large for an unsigned 64-bit integer.
    #[error("integer token out of range: {0}")]
    IntegerOutOfRange(String),

    /// Positional values do not match the descriptor's property count.
    #[error("arity mismatch for shape {signature}: expected {expected} values, got {actual}")]
    ArityMismatch {
        signature: String,
        expected: usize,
        actual: usize,
    },

    /// Field names do not follow the descriptor's property order.
    #[error("field {found:?} at position {position} does not match shape {signature}")]
    ShapeMismatch {
        signature: String,
        position: usize,
        found: String,
    },
}

/// Result alias for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;
