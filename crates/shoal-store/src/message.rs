use serde::{Deserialize, Serialize};
use shoal_types::ObjectId;

/// Identifies a store handle on the router.
pub type Endpoint = ObjectId;

/// Binds a descriptor identifier, as chosen by the sender, to its shape
/// signature. Receivers intern the signature in their own type store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeAnnouncement {
    pub descriptor: ObjectId,
    pub signature: String,
}

/// An object as positional value tokens against an announced descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedObject {
    pub id: ObjectId,
    pub descriptor: ObjectId,
    /// In a commit request, the version the writer started from; elsewhere
    /// the committed version.
    pub version: u64,
    pub values: Vec<String>,
}

/// Everything a secondary sends to have a transaction committed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxPayload {
    pub tx: ObjectId,
    /// Version of every object the transaction read or wrote, as seen when
    /// it first touched them.
    pub base_versions: Vec<(ObjectId, u64)>,
    pub shapes: Vec<ShapeAnnouncement>,
    pub writes: Vec<EncodedObject>,
}

/// The primary's verdict on a commit request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Committed {
        seq: u64,
    },
    Conflict {
        object: ObjectId,
        expected: u64,
        found: u64,
    },
    Rejected {
        reason: String,
    },
}

/// A committed transaction, as fanned out to every secondary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitNotice {
    pub seq: u64,
    pub tx: ObjectId,
    pub origin: Endpoint,
    pub shapes: Vec<ShapeAnnouncement>,
    pub objects: Vec<EncodedObject>,
}

/// Full table state, sent to a secondary when it attaches or settles.
///
/// `shapes` announces every descriptor the primary has announced to the
/// group so far, so later notices may refer to any of them by id alone.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub seq: u64,
    pub shapes: Vec<ShapeAnnouncement>,
    pub objects: Vec<EncodedObject>,
    /// Answer to a [`StoreMessage::SettleRequest`]: the sequence number the
    /// transaction committed at, or `None` if it never will.
    pub settled: Option<u64>,
}

/// Every message exchanged between store handles.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreMessage {
    SyncRequest,
    SyncResponse(Snapshot),
    CommitRequest(TxPayload),
    CommitDecision(Decision),
    Committed(CommitNotice),
    /// Sent after a commit request went unanswered. The primary settles
    /// the transaction's fate and replies with a [`Snapshot`].
    SettleRequest(ObjectId),
    Error { code: u32, message: String },
}

impl StoreMessage {
    pub fn type_tag(&self) -> u8 {
        match self {
            Self::SyncRequest => 1,
            Self::SyncResponse(_) => 2,
            Self::CommitRequest(_) => 3,
            Self::CommitDecision(_) => 4,
            Self::Committed(_) => 5,
            Self::SettleRequest(_) => 6,
            Self::Error { .. } => 255,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::SyncRequest => "SyncRequest",
            Self::SyncResponse(_) => "SyncResponse",
            Self::CommitRequest(_) => "CommitRequest",
            Self::CommitDecision(_) => "CommitDecision",
            Self::Committed(_) => "Committed",
            Self::SettleRequest(_) => "SettleRequest",
            Self::Error { .. } => "Error",
        }
    }
}

/// Error codes carried by [`StoreMessage::Error`].
pub mod codes {
    pub const NOT_PRIMARY: u32 = 1;
    pub const UNSUPPORTED: u32 = 2;
    pub const INTERNAL: u32 = 500;
}
