use shoal_codec::CodecError;
use shoal_shape::ShapeError;
use shoal_types::{ObjectId, TypeError};

/// Errors from store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The handle has not been attached to a router.
    #[error("store is not started")]
    NotStarted,

    /// `start` was called on a handle that is already attached.
    #[error("store is already started")]
    AlreadyStarted,

    /// A second primary was constructed for a group.
    #[error("group {group:?} already has a primary store")]
    PrimaryExists { group: String },

    /// No primary is registered with the router.
    #[error("no primary store is registered")]
    NoPrimary,

    /// Only the group's coordinator may construct the primary.
    #[error("this process is not the group coordinator")]
    NotCoordinator,

    /// The referenced object is not in the local table.
    #[error("object not found: {0}")]
    ObjectNotFound(ObjectId),

    /// Property names may not contain the shape separator `#`.
    #[error("invalid property name: {0:?}")]
    InvalidProperty(String),

    /// The transaction handler gave up.
    #[error("transaction aborted: {0}")]
    Aborted(String),

    /// Another transaction committed a newer version of an object first.
    #[error("conflict on {object}: expected version {expected}, found {found}")]
    Conflict {
        object: ObjectId,
        expected: u64,
        found: u64,
    },

    /// The primary refused the commit for a reason other than a conflict.
    #[error("commit rejected: {0}")]
    Rejected(String),

    /// Undo is only offered by secondary handles.
    #[error("the primary store does not support undo")]
    UndoUnsupported,

    /// The undo stack is empty.
    #[error("nothing to undo")]
    NothingToUndo,

    /// An encoded object refers to a descriptor that was not announced.
    #[error("unknown shape descriptor: {0}")]
    UnknownShape(ObjectId),

    #[error("shape error: {0}")]
    Shape(#[from] ShapeError),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("identifier error: {0}")]
    Type(#[from] TypeError),

    /// Router-level failure (unreachable endpoint, timeout, dropped reply).
    #[error("transport error: {0}")]
    Transport(String),

    /// Wire serialization or deserialization failure.
    #[error("wire error: {0}")]
    Wire(String),

    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("framing error: {0}")]
    Framing(String),

    /// A peer answered with a message of the wrong kind.
    #[error("unexpected message: {0}")]
    UnexpectedMessage(&'static str),

    /// A peer answered with an explicit error.
    #[error("remote error: code={code}, message={message}")]
    Remote { code: u32, message: String },

    /// The commit log refused or failed to record a transaction.
    #[error("commit log integrity violation at seq {seq}: {reason}")]
    LogIntegrity { seq: u64, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
