/// Errors from shape description and interning.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShapeError {
    /// Only objects and arrays have a shape; scalars cannot be described.
    #[error("cannot describe a non-structured value ({0})")]
    NotStructured(&'static str),

    /// Property names may not be empty or contain the `#` separator.
    #[error("invalid property name {0:?}")]
    InvalidPropertyName(String),

    /// A signature received from elsewhere does not follow the
    /// `<o|a>#name#...#` format.
    #[error("malformed shape signature {signature:?}: {reason}")]
    MalformedSignature { signature: String, reason: String },
}

/// Result alias for shape operations.
pub type ShapeResult<T> = Result<T, ShapeError>;
